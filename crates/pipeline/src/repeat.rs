//! Decides whether a whole aggregation cycle runs again.
//!
//! Repeat sits on top of retry: retry works on a single fetch, repeat
//! works on a complete successful pass. A failed pass never repeats.

/// How many extra cycles to run after the first successful one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatPolicy {
    /// `None` = forever, `Some(0)` = no repeat, `Some(n)` = n extra cycles
    pub repeat_count: Option<u64>,
    /// End the repeat after a cycle that produced nothing (default: off)
    pub stop_on_empty: bool,
}

impl RepeatPolicy {
    /// Run a single cycle.
    pub fn never() -> Self {
        Self::times(0)
    }

    /// Run `n` more cycles after the first.
    pub fn times(n: u64) -> Self {
        Self {
            repeat_count: Some(n),
            stop_on_empty: false,
        }
    }

    /// Keep cycling until the consumer stops polling.
    pub fn forever() -> Self {
        Self {
            repeat_count: None,
            stop_on_empty: false,
        }
    }

    /// Stop repeating once a cycle comes back empty.
    ///
    /// Without this, `forever()` over an empty source keeps cycling until
    /// the stream is dropped.
    pub fn with_stop_on_empty(mut self, stop_on_empty: bool) -> Self {
        self.stop_on_empty = stop_on_empty;
        self
    }

    /// Whether another cycle starts after `completed_cycles` successful ones.
    pub fn should_repeat(&self, completed_cycles: u64) -> bool {
        match self.repeat_count {
            None => true,
            Some(n) => completed_cycles <= n,
        }
    }

    /// Like [`should_repeat`](Self::should_repeat), also honouring
    /// `stop_on_empty` for a cycle that emitted `emitted` items.
    pub fn should_repeat_after(&self, completed_cycles: u64, emitted: u64) -> bool {
        if self.stop_on_empty && emitted == 0 {
            return false;
        }
        self.should_repeat(completed_cycles)
    }

    /// Total number of cycles, `None` when unbounded.
    pub fn total_cycles(&self) -> Option<u64> {
        self.repeat_count.map(|n| n.saturating_add(1))
    }

    pub fn is_unbounded(&self) -> bool {
        self.repeat_count.is_none()
    }
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self::never()
    }
}

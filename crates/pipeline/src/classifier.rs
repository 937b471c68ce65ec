//! Maps raw upstream failures onto the domain error taxonomy.

use anyhow::Error;
use domain::{MovieError, UpstreamFailure};

/// Classify a failure raised by a source.
///
/// The whole `anyhow` chain is searched for an [`UpstreamFailure`], so a
/// tag buried under `.context(...)` layers is still found. Network failures
/// are transient; service failures and untagged errors are permanent.
///
/// The message is the full chain (`{:#}`), context layers included.
pub fn classify(error: &Error) -> MovieError {
    let message = format!("{:#}", error);

    let tag = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<UpstreamFailure>());

    match tag {
        Some(UpstreamFailure::Network(_)) => MovieError::Transient { message },
        Some(UpstreamFailure::Service(_)) | None => MovieError::Permanent { message },
    }
}

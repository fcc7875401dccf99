//! Error handling and result types for prweave.
//!
//! All fallible functions in prweave return the [`Result`] alias defined
//! here. Errors are reported through `color-eyre`, which provides contextual,
//! colorized output; use `.wrap_err()` to add context as errors propagate.

use color_eyre::eyre::Result as EyreResult;

/// Standard result type used throughout prweave.
pub type Result<T> = EyreResult<T>;

//! Utility macros and functions for the body crate.
//!
//! This module provides helper macros that are used internally
//! by the decoder and handler implementations.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// It's useful for validation checks where you want to return early with an error
/// if some condition is not satisfied.
///
/// # Example
///
/// ```ignore
/// ensure!(src.len() <= MAX_PART_HEADER_SIZE, MultipartError::too_large_part_header(src.len(), MAX_PART_HEADER_SIZE));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

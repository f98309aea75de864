//! Errors raised by deferred field resolution (spec.md §7 E3). Converted
//! into [`crate::error::RewriteError`] at the crate boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("deferred field resolution did not converge within the allotted passes")]
    DidNotConverge,
}

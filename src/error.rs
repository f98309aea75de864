//! Typed errors for the rewriter core, following the four kinds in spec.md §7.
//!
//! Library code never panics on malformed-but-recoverable input (E2): those
//! cases are logged with [`log::warn!`] and handled with a documented
//! fallback at the call site. [`RewriteError`] is the closed, crate-boundary
//! enum covering the two fatal kinds, E3 (transformation failure) and E4
//! (programmer error); the binary crate wraps E1 (user-input error) directly
//! in `anyhow::Error`. Two subsystems raise their own closed error enums
//! first — [`crate::ir::error::ChunkError`] (E4, chunk-tree invariants) and
//! [`crate::gen::error::ResolveError`] (E3, deferred-field convergence) —
//! and fold into `RewriteError` via `From` at the point each subsystem's
//! result crosses back into shared pass/mutate code.

use thiserror::Error;

use crate::gen::error::ResolveError;
use crate::ir::error::ChunkError;

/// Fatal errors that unwind an entire rewrite run.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// E3: a pass could not complete, e.g. `PromoteJumps` failed to reach a
    /// fixed point, or ELF parsing during ingestion failed outright.
    #[error("transformation failed: {0}")]
    Transform(String),

    /// E4: a chunk-tree mutation invariant (I1-I4 in spec.md §3) was
    /// violated.
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    /// E3: deferred field resolution did not converge.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl RewriteError {
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }
}

pub type RewriteResult<T> = Result<T, RewriteError>;

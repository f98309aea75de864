//! Errors raised by chunk-tree mutation (spec.md §7 E4): one variant per
//! invariant [`crate::mutate::Mutator`] enforces. Converted into
//! [`crate::error::RewriteError`] at the crate boundary.

use thiserror::Error;

use crate::ir::entities::ChunkId;

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("append into non-container chunk {0}")]
    NonContainerParent(ChunkId),

    #[error("{0} has no parent")]
    MissingParent(ChunkId),

    #[error("{0}'s parent does not contain it")]
    NotAChildOfParent(ChunkId),
}

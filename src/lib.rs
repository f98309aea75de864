//! `etelf` lifts a dynamically-linked ELF program (and its shared-library
//! dependencies) into a mutable in-memory IR, runs a pipeline of
//! transformation passes over it, and re-emits either a "mirror" ELF
//! (original program plus a rewritten parallel copy, dynamic linking
//! preserved) or a "union" static ELF (every module collapsed into one
//! self-contained, statically-linked executable).

pub mod arch;
pub mod cache;
pub mod debug_env;
pub mod elfmap;
pub mod emit;
pub mod error;
pub mod gen;
pub mod ingest;
pub mod ir;
pub mod link;
pub mod mutate;
pub mod pass;
pub mod position;

pub use error::{RewriteError, RewriteResult};
pub use ir::chunk::{Chunk, ChunkId, ChunkKind};
pub use ir::program::Program;

/// Output format requested by the caller, corresponding to spec.md's `-m`/`-u`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Preserve dynamic linking; emit the original image plus a rewritten copy.
    Mirror,
    /// Merge every module into a single self-contained static executable.
    Union,
}

/// Runs the fixed pass pipeline for `mode` over `program`, in place.
///
/// Mirrors the pass ordering carved out in spec.md §4.4: `FixEnviron` only
/// runs for [`OutputMode::Union`]; `CollapsePLT` and `PromoteJumps` always
/// run first; `LdsoRefs`/`ExternalSymbolLinks`/`IFuncPLTs` always run last,
/// in that order, for both modes.
pub fn run_pipeline(program: &mut Program, mode: OutputMode) -> RewriteResult<()> {
    pass::conductor::run(program, mode)
}

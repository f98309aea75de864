//! The Link graph (spec.md §3, §4.3, C3): typed cross-references from an
//! instruction's semantic (or a data variable) to whatever it refers to.
//!
//! Links are owned by their source semantic and hold only a weak,
//! by-value reference to their target (a [`ChunkId`] or a name) — spec.md
//! §9: "a Link never keeps its target alive". Resolution policy (which
//! variant a given reference becomes) lives in [`LinkFactory`].

use crate::ir::ChunkId;

/// Scope of a `Normal` link, distinguishing an intra-function branch from a
/// call/jump that crosses into another chunk or an externally-visible one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    Internal,
    ExternalJump,
    ExternalCode,
}

/// A typed cross-reference, keyed by what it resolves to (spec.md §3).
#[derive(Debug, Clone)]
pub enum Link {
    /// Resolves to another chunk in the same Program.
    Normal { target: ChunkId, scope: LinkScope },
    /// Resolves through a PLT trampoline chunk.
    Plt { trampoline: ChunkId },
    /// Resolves to an offset within a DataRegion chunk.
    DataOffset { region: ChunkId, offset: u64 },
    /// The target symbol is known but has no chunk yet.
    SymbolOnly { symbol: String },
    /// Resolved by the dynamic loader at runtime (e.g. R_*_GLOB_DAT).
    LdsoLoader { symbol: String },
    /// A raw virtual address with no known chunk.
    Unresolved { address: u64 },
}

impl Link {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Link::Unresolved { .. })
    }

    /// The chunk this link points at, if it points at one directly.
    pub fn target_chunk(&self) -> Option<ChunkId> {
        match self {
            Link::Normal { target, .. } => Some(*target),
            Link::Plt { trampoline } => Some(*trampoline),
            Link::DataOffset { region, .. } => Some(*region),
            _ => None,
        }
    }
}

/// A descriptor of what a reference, discovered during ingestion or a pass,
/// should resolve to. Distinct from [`Link`] because resolution needs more
/// context (is there a chunk for this symbol yet?) than the final variant
/// records.
#[derive(Debug, Clone)]
pub enum LinkTarget {
    /// A direct branch/call whose destination address lands inside a known
    /// function chunk.
    KnownChunk { chunk: ChunkId, scope: LinkScope },
    /// A destination address that lands inside a PLT trampoline whose
    /// eventual target is not (yet) known to be inside this Program.
    PltTrampoline { trampoline: ChunkId },
    /// A reference into a known data region.
    DataRegion { region: ChunkId, offset: u64 },
    /// A symbolic target that exists in the symbol table but has no chunk.
    Symbol { name: String, dynamic_only: bool },
    /// An address with no corresponding known chunk or symbol.
    RawAddress { address: u64 },
}

/// Builds the narrowest applicable [`Link`] variant for a [`LinkTarget`],
/// per the resolution policy in spec.md §4.3.
pub struct LinkFactory;

impl LinkFactory {
    /// `source` is unused today (no variant depends on where the reference
    /// originates) but is part of the factory's signature because spec.md
    /// §4.3 describes it as taking "a source chunk and a target
    /// descriptor": keeping the parameter documents that contract and
    /// leaves room for scope-sensitive resolution later.
    pub fn resolve(_source: ChunkId, target: LinkTarget) -> Link {
        match target {
            LinkTarget::KnownChunk { chunk, scope } => Link::Normal {
                target: chunk,
                scope,
            },
            LinkTarget::PltTrampoline { trampoline } => Link::Plt { trampoline },
            LinkTarget::DataRegion { region, offset } => Link::DataOffset { region, offset },
            LinkTarget::Symbol {
                name,
                dynamic_only,
            } => {
                if dynamic_only {
                    Link::LdsoLoader { symbol: name }
                } else {
                    Link::SymbolOnly { symbol: name }
                }
            }
            LinkTarget::RawAddress { address } => Link::Unresolved { address },
        }
    }
}

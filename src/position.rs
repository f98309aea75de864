//! The Position model (spec.md §4.1, C1): computes, caches, and invalidates
//! instruction/chunk addresses under IR mutation.
//!
//! A [`Position`] never stores its own absolute address except in the
//! `Absolute` case; `Offset` and `Subsequent` are pure functions of the
//! chunk's left siblings and parent (invariant I1), resolved by
//! [`crate::ir::program::Program::address_of`]. `Generational` wraps any of
//! the above in a single-slot cache keyed by the program's layout
//! generation counter, so repeated reads between mutations are O(1) instead
//! of re-walking the tree, while a mutation anywhere in the tree (which
//! bumps the generation) invalidates every cache at once without having to
//! chase down every affected descendant individually.

use std::cell::Cell;

/// How a chunk's address is derived.
#[derive(Debug, Clone)]
pub enum PositionKind {
    /// A fixed virtual address, independent of tree structure (e.g. the
    /// chunk for the original ELF entry point, or a synthesized function
    /// placed at a specific address).
    Absolute(u64),
    /// Address of the previous sibling plus that sibling's size; if this is
    /// the first child, the parent's address.
    Offset,
    /// Parent's address plus a fixed byte offset within the parent,
    /// independent of sibling sizes (used for fields whose layout is
    /// pinned relative to their container, e.g. a table header).
    Subsequent(u64),
}

/// A chunk's position: a [`PositionKind`] plus a generation-stamped cache.
#[derive(Debug, Clone)]
pub struct Position {
    kind: PositionKind,
    cache: Cell<Option<(u64, u64)>>,
}

impl Position {
    pub fn absolute(addr: u64) -> Self {
        Self {
            kind: PositionKind::Absolute(addr),
            cache: Cell::new(None),
        }
    }

    pub fn offset() -> Self {
        Self {
            kind: PositionKind::Offset,
            cache: Cell::new(None),
        }
    }

    pub fn subsequent(delta: u64) -> Self {
        Self {
            kind: PositionKind::Subsequent(delta),
            cache: Cell::new(None),
        }
    }

    pub fn kind(&self) -> &PositionKind {
        &self.kind
    }

    /// Sets the fixed address of an `Absolute` position (e.g. after the
    /// static-union emitter assigns a new virtual address). No-op, and
    /// logged, on a non-`Absolute` position.
    pub fn set_absolute(&mut self, addr: u64) {
        match &mut self.kind {
            PositionKind::Absolute(a) => *a = addr,
            _ => {
                log::warn!("set_absolute called on a non-Absolute Position; ignoring");
            }
        }
    }

    /// Returns the cached address if it is still valid at `generation`.
    pub(crate) fn cached(&self, generation: u64) -> Option<u64> {
        match self.cache.get() {
            Some((gen, addr)) if gen == generation => Some(addr),
            _ => None,
        }
    }

    /// Records `addr` as valid at `generation`. Later reads at the same
    /// generation reuse it (deferred recomputation, spec.md §4.1): stale
    /// reads during an in-flight mutation batch are never observed because
    /// passes only read positions once a mutation batch has fully
    /// committed and bumped the generation.
    pub(crate) fn store(&self, generation: u64, addr: u64) {
        self.cache.set(Some((generation, addr)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_invalidated_by_generation_change() {
        let pos = Position::offset();
        pos.store(1, 0x1000);
        assert_eq!(pos.cached(1), Some(0x1000));
        assert_eq!(pos.cached(2), None);
    }
}

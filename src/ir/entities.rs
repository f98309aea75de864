//! Opaque entity references into the arena owned by [`crate::ir::program::Program`].
//!
//! Modeled on `cranelift_codegen::ir::entities`: a reference is a newtype
//! wrapping a `u32` arena index rather than a Rust reference or an `Rc`.
//! Every [`crate::ir::chunk::Chunk`] variant (Program, Module, Function,
//! Block, Instruction, ...) lives in one flat arena keyed by [`ChunkId`]
//! (spec.md §9: "tagged-variant enumeration with exhaustive matching",
//! "arena allocation with indices"); a [`crate::link::Link`] can reference a
//! chunk through its id without keeping it alive.

use std::fmt;

macro_rules! entity_ref {
    ($name:ident, $prefix:expr) => {
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        pub struct $name(u32);

        impl $name {
            pub fn new(index: usize) -> Self {
                debug_assert!(index < u32::MAX as usize);
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity_ref!(ChunkId, "chunk");
entity_ref!(SymbolId, "sym");

/// A lightweight arena keyed by a `u32`-backed entity id, mirroring
/// `cranelift_entity::PrimaryMap`'s API.
#[derive(Debug, Clone, Default)]
pub struct PrimaryMap<V> {
    items: Vec<V>,
}

impl<V> PrimaryMap<V> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, value: V) -> ChunkId {
        let id = ChunkId::new(self.items.len());
        self.items.push(value);
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkId, &V)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, v)| (ChunkId::new(i), v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<V> std::ops::Index<ChunkId> for PrimaryMap<V> {
    type Output = V;
    fn index(&self, key: ChunkId) -> &V {
        &self.items[key.index()]
    }
}

impl<V> std::ops::IndexMut<ChunkId> for PrimaryMap<V> {
    fn index_mut(&mut self, key: ChunkId) -> &mut V {
        &mut self.items[key.index()]
    }
}

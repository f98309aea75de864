//! The Chunk tree (spec.md §3, C2): Program -> Module -> {FunctionList,
//! PLTList, JumpTableList, DataSection...} -> Function -> Block ->
//! Instruction, all living in one flat arena (see [`crate::ir::entities`]).
//!
//! Every chunk exposes a parent, an ordered list of children, a
//! [`crate::position::Position`], and a size (spec.md §3). Structural
//! mutation goes exclusively through [`crate::mutate::Mutator`], which is
//! the only code allowed to touch `parent`/`children` after ingestion, so
//! that invariants I1-I4 stay enforced in one place.

use crate::ir::semantic::InstructionSemantic;
use crate::position::Position;

pub use crate::ir::entities::ChunkId;

/// The size of a chunk, derived from children (I3) or fixed by semantics.
#[derive(Debug, Clone, Copy)]
pub enum Size {
    /// Sum of children's sizes, recomputed on demand (Function, Block,
    /// containers).
    SumOfChildren,
    /// A fixed byte length (Instruction, DataVariable, PLTTrampoline, raw
    /// DataRegion bytes).
    Fixed(u64),
}

/// The payload distinguishing what kind of node this is; see spec.md §3's
/// Chunk variant list. A single enum rather than a trait hierarchy, per
/// spec.md §9's guidance to prefer "a tagged-variant enumeration with
/// exhaustive matching in visitors".
#[derive(Debug, Clone)]
pub enum ChunkKind {
    Program,
    Module {
        name: String,
    },
    FunctionList,
    Function {
        name: String,
        /// The address this function occupied in the original image, if
        /// ingested from one (synthesized functions, e.g. the shadow-stack
        /// violation sentinel, have none until placed).
        original_address: Option<u64>,
    },
    Block,
    Instruction {
        semantic: InstructionSemantic,
    },
    DataRegion {
        name: String,
    },
    DataSection {
        name: String,
    },
    DataVariable {
        name: String,
        link: Option<crate::link::Link>,
    },
    PltList,
    PltTrampoline {
        /// The function this trampoline resolves to at runtime, once known.
        target_symbol: String,
    },
    JumpTableList,
    JumpTable {
        descriptor: crate::pass::jump_table::JumpTableDescriptor,
    },
    JumpTableEntry {
        link: crate::link::Link,
    },
}

impl ChunkKind {
    pub fn name(&self) -> Option<&str> {
        match self {
            ChunkKind::Module { name } => Some(name),
            ChunkKind::Function { name, .. } => Some(name),
            ChunkKind::DataRegion { name } => Some(name),
            ChunkKind::DataSection { name } => Some(name),
            ChunkKind::DataVariable { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether this kind's children are ordered, emission-significant
    /// content (true for every container kind in spec.md §3).
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ChunkKind::Program
                | ChunkKind::Module { .. }
                | ChunkKind::FunctionList
                | ChunkKind::Function { .. }
                | ChunkKind::Block
                | ChunkKind::DataRegion { .. }
                | ChunkKind::DataSection { .. }
                | ChunkKind::PltList
                | ChunkKind::JumpTableList
                | ChunkKind::JumpTable { .. }
        )
    }
}

/// One node in the Chunk tree.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub parent: Option<ChunkId>,
    pub children: Vec<ChunkId>,
    pub position: Position,
    pub size: Size,
    pub kind: ChunkKind,
}

impl Chunk {
    pub fn new(kind: ChunkKind, position: Position, size: Size) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            position,
            size,
            kind,
        }
    }

    pub fn is_instruction(&self) -> bool {
        matches!(self.kind, ChunkKind::Instruction { .. })
    }

    pub fn instruction_semantic(&self) -> Option<&InstructionSemantic> {
        match &self.kind {
            ChunkKind::Instruction { semantic } => Some(semantic),
            _ => None,
        }
    }

    pub fn instruction_semantic_mut(&mut self) -> Option<&mut InstructionSemantic> {
        match &mut self.kind {
            ChunkKind::Instruction { semantic } => Some(semantic),
            _ => None,
        }
    }
}

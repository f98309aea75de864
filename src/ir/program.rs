//! [`Program`]: the root of the Chunk tree and the owner of its single flat
//! arena (spec.md §3, C2). Also implements address resolution for the
//! [`crate::position::Position`] model (C1), since that requires walking
//! parent/sibling structure that only `Program` has a global view of.

use std::cell::Cell;

use crate::ir::chunk::{Chunk, ChunkKind, Size};
use crate::ir::entities::{ChunkId, PrimaryMap};
use crate::position::Position;

/// The whole lifted program: one arena of chunks, rooted at a single
/// `Program` chunk whose children are `Module`s.
pub struct Program {
    chunks: PrimaryMap<Chunk>,
    root: Option<ChunkId>,
    /// Bumped by every structural mutation (insert/remove/split/replace);
    /// see spec.md §4.1. Every `Position`'s cache is keyed by this value,
    /// so a single counter invalidates the whole tree's cached addresses
    /// without visiting each one.
    generation: Cell<u64>,
}

impl Program {
    pub fn new() -> Self {
        let mut chunks = PrimaryMap::new();
        let root = chunks.push(Chunk::new(ChunkKind::Program, Position::absolute(0), Size::SumOfChildren));
        Self {
            chunks,
            root: Some(root),
            generation: Cell::new(0),
        }
    }

    pub fn root(&self) -> ChunkId {
        self.root.expect("Program always has a root chunk")
    }

    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Call after any structural mutation; see spec.md §4.1's ordering
    /// guarantee ("after a batch of mutations completes ... every
    /// subsequent position read returns a value consistent with the final
    /// layout").
    pub fn bump_generation(&mut self) {
        self.generation.set(self.generation.get() + 1);
    }

    pub fn get(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id]
    }

    pub fn get_mut(&mut self, id: ChunkId) -> &mut Chunk {
        &mut self.chunks[id]
    }

    pub fn alloc(&mut self, chunk: Chunk) -> ChunkId {
        self.chunks.push(chunk)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkId, &Chunk)> {
        self.chunks.iter()
    }

    pub fn children(&self, id: ChunkId) -> &[ChunkId] {
        &self.chunks[id].children
    }

    pub fn parent(&self, id: ChunkId) -> Option<ChunkId> {
        self.chunks[id].parent
    }

    /// Walks every `Module` child of the root.
    pub fn modules(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.children(self.root()).iter().copied()
    }

    /// Finds the `FunctionList` child of a module, if present.
    pub fn function_list_of(&self, module: ChunkId) -> Option<ChunkId> {
        self.children(module)
            .iter()
            .copied()
            .find(|&c| matches!(self.get(c).kind, ChunkKind::FunctionList))
    }

    pub fn functions_of(&self, module: ChunkId) -> Vec<ChunkId> {
        match self.function_list_of(module) {
            Some(fl) => self.children(fl).to_vec(),
            None => Vec::new(),
        }
    }

    /// The size of a chunk (spec.md §3 invariant I3: a container's size is
    /// the sum of its children's; a leaf's size is fixed by its semantics).
    pub fn size_of(&self, id: ChunkId) -> u64 {
        let chunk = self.get(id);
        match chunk.size {
            Size::Fixed(n) => n,
            Size::SumOfChildren => chunk
                .children
                .iter()
                .map(|&c| self.size_of(c))
                .sum(),
        }
    }

    /// Resolves a chunk's absolute virtual address (the Position model,
    /// spec.md §4.1), using and populating its generation-stamped cache.
    pub fn address_of(&self, id: ChunkId) -> u64 {
        let generation = self.generation.get();
        if let Some(cached) = self.get(id).position.cached(generation) {
            return cached;
        }

        let addr = match self.get(id).position.kind() {
            crate::position::PositionKind::Absolute(a) => *a,
            crate::position::PositionKind::Subsequent(delta) => {
                let parent = self
                    .parent(id)
                    .expect("Subsequent position requires a parent");
                self.address_of(parent) + delta
            }
            crate::position::PositionKind::Offset => match self.parent(id) {
                None => 0,
                Some(parent) => {
                    let siblings = self.children(parent);
                    let index = siblings
                        .iter()
                        .position(|&s| s == id)
                        .expect("chunk must be a child of its recorded parent");
                    if index == 0 {
                        self.address_of(parent)
                    } else {
                        let prev = siblings[index - 1];
                        self.address_of(prev) + self.size_of(prev)
                    }
                }
            },
        };

        self.get(id).position.store(generation, addr);
        addr
    }

    /// Finds the function chunk in `module` whose address range contains
    /// `addr`, if any — used by jump-table cache reload (spec.md §4.4) and
    /// similar address-keyed lookups where only an address is known.
    pub fn find_function_containing(&self, module: ChunkId, addr: u64) -> Option<ChunkId> {
        self.functions_of(module).into_iter().find(|&f| {
            let start = self.address_of(f);
            let end = start + self.size_of(f);
            addr >= start && addr < end
        })
    }

    /// Finds the innermost instruction chunk inside `function` containing
    /// `addr` (spec.md §4.4 `ChunkFind::findInnermostInsideInstruction`).
    pub fn find_innermost_instruction(&self, function: ChunkId, addr: u64) -> Option<ChunkId> {
        for &block in self.children(function) {
            for &inst in self.children(block) {
                let start = self.address_of(inst);
                let end = start + self.size_of(inst);
                if addr >= start && addr < end {
                    return Some(inst);
                }
            }
        }
        None
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::semantic::InstructionSemantic;
    use crate::mutate::Mutator;

    fn make_function_with_two_insts(program: &mut Program, module: ChunkId, base: u64) -> ChunkId {
        let fl = program.alloc(Chunk::new(ChunkKind::FunctionList, Position::offset(), Size::SumOfChildren));
        Mutator::append(program, module, fl);
        let func = program.alloc(Chunk::new(
            ChunkKind::Function {
                name: "f".into(),
                original_address: Some(base),
            },
            Position::absolute(base),
            Size::SumOfChildren,
        ));
        Mutator::append(program, fl, func);
        let block = program.alloc(Chunk::new(ChunkKind::Block, Position::offset(), Size::SumOfChildren));
        Mutator::append(program, func, block);
        for _ in 0..2 {
            let inst = program.alloc(Chunk::new(
                ChunkKind::Instruction {
                    semantic: InstructionSemantic::Literal {
                        bytes: vec![0x90, 0x90],
                    },
                },
                Position::offset(),
                Size::Fixed(2),
            ));
            Mutator::append(program, block, inst);
        }
        func
    }

    #[test]
    fn offset_positions_chain_off_absolute_parent() {
        let mut program = Program::new();
        let module = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m".into() },
            Position::absolute(0x1000),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), module);
        let func = make_function_with_two_insts(&mut program, module, 0x1000);
        let block = program.children(func)[0];
        let insts = program.children(block).to_vec();

        assert_eq!(program.address_of(insts[0]), 0x1000);
        assert_eq!(program.address_of(insts[1]), 0x1002);
        assert_eq!(program.size_of(func), 4);
    }

    #[test]
    fn generation_bump_invalidates_cached_addresses() {
        let mut program = Program::new();
        let module = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m".into() },
            Position::absolute(0x1000),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), module);
        let func = make_function_with_two_insts(&mut program, module, 0x1000);
        let block = program.children(func)[0];
        let insts = program.children(block).to_vec();
        let _ = program.address_of(insts[1]); // populate cache

        let nop = program.alloc(Chunk::new(
            ChunkKind::Instruction {
                semantic: InstructionSemantic::Literal { bytes: vec![0x90] },
            },
            Position::offset(),
            Size::Fixed(1),
        ));
        Mutator::insert_before(&mut program, insts[1], &[nop]);

        assert_eq!(program.address_of(insts[1]), 0x1003);
    }
}

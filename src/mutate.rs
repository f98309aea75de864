//! Visitor/mutation operations on the Chunk tree (spec.md §4.2, C4).
//!
//! Every structural operation here is the only place that touches
//! `parent`/`children` pointers once a chunk has been allocated, so I1-I4
//! stay enforced in one spot. Each `try_*` function returns a
//! [`ChunkError`] (E4, spec.md §7) on programmer error — `append` into a
//! non-container, or `insert_before` with a sibling that isn't actually a
//! child of the stated parent; the unchecked wrappers (`append`,
//! `insert_before`, ...) `expect()` that result, because a violation here
//! means a pass has a bug, not that the input was bad.

use crate::error::RewriteResult;
use crate::ir::chunk::{Chunk, ChunkKind, Size};
use crate::ir::entities::ChunkId;
use crate::ir::error::ChunkError;
use crate::ir::program::Program;
use crate::ir::semantic::InstructionSemantic;
use crate::position::Position;

pub struct Mutator;

impl Mutator {
    /// Appends `child` as the last child of `parent`. Fails (E4) if
    /// `parent`'s kind isn't a container.
    pub fn try_append(program: &mut Program, parent: ChunkId, child: ChunkId) -> RewriteResult<()> {
        if !program.get(parent).kind.is_container() {
            return Err(ChunkError::NonContainerParent(parent).into());
        }
        program.get_mut(child).parent = Some(parent);
        program.get_mut(parent).children.push(child);
        program.bump_generation();
        Ok(())
    }

    pub fn append(program: &mut Program, parent: ChunkId, child: ChunkId) {
        Self::try_append(program, parent, child).expect("Mutator::append invariant violated");
    }

    /// Inserts `children` (in order) immediately before `sibling` in
    /// `sibling`'s parent. Fails (E4) if `sibling` has no parent, or if the
    /// caller's mental model of that parent (implicit: none is passed, the
    /// true parent is looked up) doesn't actually contain `sibling` — this
    /// can only happen if the tree is already corrupt, which this function
    /// treats as a bug.
    pub fn try_insert_before(
        program: &mut Program,
        sibling: ChunkId,
        children: &[ChunkId],
    ) -> RewriteResult<()> {
        let parent = program
            .parent(sibling)
            .ok_or(ChunkError::MissingParent(sibling))?;
        let siblings = program.get(parent).children.clone();
        let index = siblings
            .iter()
            .position(|&s| s == sibling)
            .ok_or(ChunkError::NotAChildOfParent(sibling))?;

        for &child in children {
            program.get_mut(child).parent = Some(parent);
        }
        let insert_at = index;
        let kids = &mut program.get_mut(parent).children;
        for (offset, &child) in children.iter().enumerate() {
            kids.insert(insert_at + offset, child);
        }
        program.bump_generation();
        Ok(())
    }

    pub fn insert_before(program: &mut Program, sibling: ChunkId, children: &[ChunkId]) {
        Self::try_insert_before(program, sibling, children)
            .expect("Mutator::insert_before invariant violated");
    }

    /// Splits a block at `instruction`: instructions from `instruction`
    /// onward are moved into a freshly-allocated sibling block with the
    /// same parent function, placed immediately after the original block.
    /// Returns the new block's id.
    pub fn split_block_before(program: &mut Program, instruction: ChunkId) -> ChunkId {
        let block = program
            .parent(instruction)
            .expect("instruction must have a parent block");
        let function = program
            .parent(block)
            .expect("block must have a parent function");

        let siblings = program.get(block).children.clone();
        let split_at = siblings
            .iter()
            .position(|&i| i == instruction)
            .expect("instruction must be a child of its recorded parent block");

        let (keep, move_out) = siblings.split_at(split_at);
        let move_out = move_out.to_vec();
        program.get_mut(block).children = keep.to_vec();

        let new_block = program.alloc(Chunk::new(ChunkKind::Block, Position::offset(), Size::SumOfChildren));
        program.get_mut(new_block).parent = Some(function);
        for &inst in &move_out {
            program.get_mut(inst).parent = Some(new_block);
        }
        program.get_mut(new_block).children = move_out;

        let func_children = &mut program.get_mut(function).children;
        let block_index = func_children
            .iter()
            .position(|&b| b == block)
            .expect("block must be a child of its recorded parent function");
        func_children.insert(block_index + 1, new_block);

        program.bump_generation();
        new_block
    }

    /// Replaces `instruction`'s semantic in place (I5: semantics are
    /// replaceable but never shared).
    pub fn replace_semantic(program: &mut Program, instruction: ChunkId, new_semantic: InstructionSemantic) {
        let new_size = Size::Fixed(new_semantic.size());
        let chunk = program.get_mut(instruction);
        chunk.kind = ChunkKind::Instruction {
            semantic: new_semantic,
        };
        chunk.size = new_size;
        program.bump_generation();
    }

    /// Removes `child` from its parent's children list. The chunk itself
    /// remains in the arena (arenas never shrink) but is no longer part of
    /// the tree and will not be visited or emitted.
    pub fn remove(program: &mut Program, child: ChunkId) {
        if let Some(parent) = program.parent(child) {
            program.get_mut(parent).children.retain(|&c| c != child);
        }
        program.get_mut(child).parent = None;
        program.bump_generation();
    }
}

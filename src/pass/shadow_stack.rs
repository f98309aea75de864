//! `ShadowStackPass` (spec.md §4.4), grounded in
//! `original_source/src/pass/shadowstack.cpp`: inserts a parallel
//! return-address stack and checks it at every return, to detect stack
//! corruption.
//!
//! Byte sequences below are reproduced verbatim from the original's
//! x86-64-only implementation (the reference's `#ifdef ARCH_X86_64`
//! guard); AArch64 support is future work there too, so this module is
//! x86-64-only, matching what the original actually emits.

use crate::ir::chunk::{Chunk, ChunkKind, Size};
use crate::ir::entities::ChunkId;
use crate::ir::program::Program;
use crate::ir::semantic::InstructionSemantic;
use crate::link::{Link, LinkScope};
use crate::mutate::Mutator;
use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowStackMode {
    /// Store the shadow copy at a fixed offset `%rsp + 0xb00000`.
    Constant,
    /// Per-thread shadow via `%gs:0x0` pointer plus an explicit 8-byte-slot
    /// stack.
    GsSegmented,
}

const VIOLATION_SENTINEL: &str = "egalito_shadowstack_violation";
const ENDBR_VIOLATION_SENTINEL: &str = "egalito_endbr_violation";

fn raw(bytes: &[u8]) -> InstructionSemantic {
    InstructionSemantic::RawByte {
        bytes: bytes.to_vec(),
    }
}

/// Creates the violation sentinel function (a single `ud2` trap) in
/// `module` and returns its chunk id, for use as the `jne` target of every
/// inserted shadow-stack check.
fn make_violation_sentinel(program: &mut Program, module: ChunkId) -> ChunkId {
    let fl = program
        .function_list_of(module)
        .unwrap_or_else(|| {
            let fl = program.alloc(Chunk::new(ChunkKind::FunctionList, Position::offset(), Size::SumOfChildren));
            Mutator::append(program, module, fl);
            fl
        });

    let function = program.alloc(Chunk::new(
        ChunkKind::Function {
            name: VIOLATION_SENTINEL.to_string(),
            original_address: None,
        },
        Position::absolute(0),
        Size::SumOfChildren,
    ));
    Mutator::append(program, fl, function);
    let block = program.alloc(Chunk::new(ChunkKind::Block, Position::offset(), Size::SumOfChildren));
    Mutator::append(program, function, block);
    let ud2 = program.alloc(Chunk::new(
        ChunkKind::Instruction {
            semantic: raw(&[0x0f, 0x0b]),
        },
        Position::offset(),
        Size::Fixed(2),
    ));
    Mutator::append(program, block, ud2);

    function
}

/// Runs `ShadowStackPass` in `mode` over every function in `module`,
/// except the violation sentinels themselves.
pub fn run(program: &mut Program, module: ChunkId, mode: ShadowStackMode) {
    let violation_target = make_violation_sentinel(program, module);

    let functions = program.functions_of(module);
    for func in functions {
        if func == violation_target {
            continue;
        }
        let name = match &program.get(func).kind {
            ChunkKind::Function { name, .. } => name.clone(),
            _ => continue,
        };
        if name == VIOLATION_SENTINEL || name == ENDBR_VIOLATION_SENTINEL {
            continue;
        }

        push_to_shadow_stack(program, func, mode);

        let blocks = program.children(func).to_vec();
        for block in blocks {
            let insts = program.children(block).to_vec();
            for inst in insts {
                let is_return = program
                    .get(inst)
                    .instruction_semantic()
                    .map(InstructionSemantic::is_return)
                    .unwrap_or(false);
                if is_return {
                    pop_from_shadow_stack(program, inst, mode, violation_target);
                }
            }
        }
    }
}

fn first_instruction_of(program: &Program, function: ChunkId) -> Option<ChunkId> {
    let block = *program.children(function).first()?;
    program.children(block).first().copied()
}

fn push_to_shadow_stack(program: &mut Program, function: ChunkId, mode: ShadowStackMode) {
    let Some(first_inst) = first_instruction_of(program, function) else {
        return;
    };
    let insts: Vec<ChunkId> = match mode {
        ShadowStackMode::Constant => vec![
            // mov (%rsp),%r11
            alloc_raw(program, &[0x4c, 0x8b, 0x1c, 0x24]),
            // mov %r11,0xb00000(%rsp)
            alloc_raw(program, &[0x4c, 0x89, 0x9c, 0x24, 0x00, 0x00, 0xb0, 0x00]),
        ],
        ShadowStackMode::GsSegmented => vec![
            // mov %gs:0x0,%r11
            alloc_raw(program, &[0x65, 0x4c, 0x8b, 0x1c, 0x25, 0x00, 0x00, 0x00, 0x00]),
            // lea 0x8(%r11),%r11
            alloc_raw(program, &[0x4d, 0x8d, 0x5b, 0x08]),
            // mov (%rsp),%r10
            alloc_raw(program, &[0x4c, 0x8b, 0x14, 0x24]),
            // mov %r10,%gs:(%r11)
            alloc_raw(program, &[0x65, 0x4d, 0x89, 0x13]),
            // mov %r11,%gs:0x0
            alloc_raw(program, &[0x65, 0x4c, 0x89, 0x1c, 0x25, 0x00, 0x00, 0x00, 0x00]),
        ],
    };
    Mutator::insert_before(program, first_inst, &insts);
}

fn pop_from_shadow_stack(
    program: &mut Program,
    return_inst: ChunkId,
    mode: ShadowStackMode,
    violation_target: ChunkId,
) {
    let jne = program.alloc(Chunk::new(
        ChunkKind::Instruction {
            semantic: InstructionSemantic::ControlFlow {
                bytes: vec![0x0f, 0x85, 0x00, 0x00, 0x00, 0x00],
                disp_offset: 2,
                disp_len: 4,
                link: Link::Normal {
                    target: violation_target,
                    scope: LinkScope::ExternalJump,
                },
            },
        },
        Position::offset(),
        Size::Fixed(6),
    ));

    let insts: Vec<ChunkId> = match mode {
        ShadowStackMode::Constant => vec![
            // mov (%rsp),%r11
            alloc_raw(program, &[0x4c, 0x8b, 0x1c, 0x24]),
            // cmp %r11,0xb00000(%rsp)
            alloc_raw(program, &[0x4c, 0x39, 0x9c, 0x24, 0x00, 0x00, 0xb0, 0x00]),
            jne,
        ],
        ShadowStackMode::GsSegmented => vec![
            // mov %gs:0x0,%r11
            alloc_raw(program, &[0x65, 0x4c, 0x8b, 0x1c, 0x25, 0x00, 0x00, 0x00, 0x00]),
            // mov (%rsp),%r10
            alloc_raw(program, &[0x4c, 0x8b, 0x14, 0x24]),
            // cmp %r10,%gs:(%r11)
            alloc_raw(program, &[0x65, 0x4d, 0x39, 0x13]),
            jne,
            // lea -0x8(%r11),%r11
            alloc_raw(program, &[0x4d, 0x8d, 0x5b, 0xf8]),
            // mov %r11,%gs:0x0
            alloc_raw(program, &[0x65, 0x4c, 0x89, 0x1c, 0x25, 0x00, 0x00, 0x00, 0x00]),
        ],
    };
    Mutator::insert_before(program, return_inst, &insts);
}

fn alloc_raw(program: &mut Program, bytes: &[u8]) -> ChunkId {
    let len = bytes.len() as u64;
    program.alloc(Chunk::new(
        ChunkKind::Instruction {
            semantic: raw(bytes),
        },
        Position::offset(),
        Size::Fixed(len),
    ))
}

//! Property tests for P2/P3 (spec.md §8), hand-built small `Program`s
//! rather than a full fuzzing grammar, per SPEC_FULL.md §D.

use proptest::prelude::*;

use etelf::arch::Arch;
use etelf::gen::symtab::{SymbolEntry, SymbolTableContent};
use etelf::ir::chunk::{Chunk, ChunkKind, Size};
use etelf::ir::semantic::InstructionSemantic;
use etelf::link::{Link, LinkScope};
use etelf::mutate::Mutator;
use etelf::pass::promote_jumps;
use etelf::position::Position;
use etelf::Program;

/// Builds a function with one short jump followed by `nop_count` one-byte
/// nops and a return, the jump targeting the return instruction.
fn build_with_gap(nop_count: usize) -> (Program, etelf::ChunkId) {
    let mut program = Program::new();
    let module = program.alloc(Chunk::new(
        ChunkKind::Module { name: "m".into() },
        Position::absolute(0x1000),
        Size::SumOfChildren,
    ));
    Mutator::append(&mut program, program.root(), module);
    let fl = program.alloc(Chunk::new(ChunkKind::FunctionList, Position::offset(), Size::SumOfChildren));
    Mutator::append(&mut program, module, fl);
    let func = program.alloc(Chunk::new(
        ChunkKind::Function {
            name: "f".into(),
            original_address: Some(0x1000),
        },
        Position::absolute(0x1000),
        Size::SumOfChildren,
    ));
    Mutator::append(&mut program, fl, func);
    let block = program.alloc(Chunk::new(ChunkKind::Block, Position::offset(), Size::SumOfChildren));
    Mutator::append(&mut program, func, block);

    let target = program.alloc(Chunk::new(
        ChunkKind::Instruction {
            semantic: InstructionSemantic::Return { bytes: vec![0xc3] },
        },
        Position::offset(),
        Size::Fixed(1),
    ));
    let jmp = program.alloc(Chunk::new(
        ChunkKind::Instruction {
            semantic: InstructionSemantic::ControlFlow {
                bytes: vec![0xeb, 0x00],
                disp_offset: 1,
                disp_len: 1,
                link: Link::Normal {
                    target,
                    scope: LinkScope::Internal,
                },
            },
        },
        Position::offset(),
        Size::Fixed(2),
    ));
    Mutator::append(&mut program, block, jmp);
    for _ in 0..nop_count {
        let nop = program.alloc(Chunk::new(
            ChunkKind::Instruction {
                semantic: InstructionSemantic::Literal { bytes: vec![0x90] },
            },
            Position::offset(),
            Size::Fixed(1),
        ));
        Mutator::append(&mut program, block, nop);
    }
    Mutator::append(&mut program, block, target);
    (program, jmp)
}

proptest! {
    /// P2: after `PromoteJumpsPass` terminates, every `ControlFlow`
    /// semantic's encoded displacement width suffices for its resolved
    /// target — i.e. the signed displacement fits in `disp_len` bytes.
    #[test]
    fn p2_promoted_displacement_always_fits_its_width(nop_count in 0usize..600) {
        let (mut program, jmp) = build_with_gap(nop_count);
        promote_jumps::run(&mut program, Arch::X86_64).unwrap();

        let sem = program.get(jmp).instruction_semantic().unwrap();
        if let InstructionSemantic::ControlFlow { disp_len, link, .. } = sem {
            if let Link::Normal { target, .. } = link {
                let from = program.address_of(jmp) + sem.size();
                let to = program.address_of(*target);
                let distance = to as i64 - from as i64;
                let bits = *disp_len as u32 * 8;
                let half = 1i64 << (bits - 1);
                prop_assert!(distance >= -half && distance < half);
            }
        }
    }

    /// P3: symbol-table serialization satisfies: indices below
    /// `first_global_index` are NULL/SECTION/LOCAL, indices at or above it
    /// are GLOBAL/UNDEF.
    #[test]
    fn p3_symtab_partitions_at_first_global_index(
        local_names in prop::collection::vec("[a-z]{1,6}", 0..6),
        global_names in prop::collection::vec("[a-z]{1,6}", 0..6),
    ) {
        let mut entries = vec![SymbolEntry::null()];
        for name in &local_names {
            entries.push(SymbolEntry::function(name.clone(), true, 0, 1, 1));
        }
        for name in &global_names {
            entries.push(SymbolEntry::function(name.clone(), false, 0, 1, 1));
        }
        let table = SymbolTableContent::new(entries);
        let boundary = table.first_global_index();
        prop_assert_eq!(boundary, 1 + local_names.len());
    }
}

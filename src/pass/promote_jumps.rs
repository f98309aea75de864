//! `PromoteJumpsPass` (spec.md §4.4).
//!
//! Re-encodes any `ControlFlow` semantic whose 8-bit displacement can no
//! longer reach its resolved target (because earlier IR mutations widened
//! intervening code) to the architecture's 32-bit displacement form.
//! Monotone — no jump is ever demoted — so the pass is simply re-run to a
//! fixed point. Tie-break for borderline distances uses the worst-case
//! post-layout address: since every widening can only grow the layout
//! further, using the *current* (pre-fixed-point) address as the distance
//! estimate is itself the worst case available at each iteration, so no
//! separate "worst case" computation is needed beyond re-checking after
//! every widening.

use crate::arch::Arch;
use crate::error::{RewriteError, RewriteResult};
use crate::ir::entities::ChunkId;
use crate::ir::program::Program;
use crate::ir::semantic::InstructionSemantic;
use crate::link::Link;
use crate::mutate::Mutator;

/// Bounded iteration count before a non-converging promotion loop is
/// treated as a transformation failure (E3, spec.md §7).
const MAX_ITERATIONS: usize = 64;

/// Short-form x86-64 `jmp rel8`/`jcc rel8` encodes a 1-byte displacement
/// with at most this signed range (AArch64's short conditional branch has
/// a different range but the same widen-when-out-of-range shape).
fn short_range(arch: Arch) -> i64 {
    match arch {
        Arch::X86_64 => i8::MAX as i64,
        Arch::AArch64 => (1i64 << 20) - 1,
    }
}

pub fn run(program: &mut Program, arch: Arch) -> RewriteResult<()> {
    for _ in 0..MAX_ITERATIONS {
        let to_promote = find_out_of_range(program, arch);
        if to_promote.is_empty() {
            return Ok(());
        }
        for inst in to_promote {
            promote_one(program, inst, arch);
        }
    }
    Err(RewriteError::transform(
        "PromoteJumpsPass failed to converge within the bounded iteration count",
    ))
}

fn find_out_of_range(program: &Program, arch: Arch) -> Vec<ChunkId> {
    let range = short_range(arch);
    let mut out = Vec::new();
    for (id, chunk) in program.iter() {
        let Some(sem) = chunk.instruction_semantic() else {
            continue;
        };
        let InstructionSemantic::ControlFlow {
            disp_len, link, ..
        } = sem
        else {
            continue;
        };
        if *disp_len != 1 {
            continue;
        }
        let Link::Normal { target, .. } = link else {
            continue;
        };
        let from = program.address_of(id) + sem.size();
        let to = program.address_of(*target);
        let distance = to as i64 - from as i64;
        if distance > range || distance < -(range + 1) {
            out.push(id);
        }
    }
    out
}

fn promote_one(program: &mut Program, inst: ChunkId, arch: Arch) {
    let new_len = arch.long_jump_len();
    let Some(InstructionSemantic::ControlFlow {
        bytes,
        disp_offset,
        disp_len,
        link,
    }) = program.get(inst).instruction_semantic().cloned()
    else {
        return;
    };

    let widened_bytes = widen_encoding(arch, &bytes, disp_offset, new_len);
    let new_semantic = InstructionSemantic::ControlFlow {
        bytes: widened_bytes,
        disp_offset,
        disp_len: new_len - disp_offset,
        link,
    };
    debug_assert_eq!(new_semantic.size(), new_len as u64);
    let _ = disp_len;
    Mutator::replace_semantic(program, inst, new_semantic);
}

/// Widens an 8-bit-displacement encoding to the architecture's 32-bit
/// form. x86-64 `jmp rel8` (`0xEB xx`) becomes `jmp rel32` (`0xE9 xx xx xx
/// xx`); a conditional short jump (`0x7?`) becomes the two-byte `0x0F
/// 0x8?` opcode with a 4-byte displacement. The displacement bytes
/// themselves are left zeroed — the emitter's relocation/link-patch step
/// fills them in from the resolved target, same as any other
/// `ControlFlow` instruction.
fn widen_encoding(arch: Arch, bytes: &[u8], disp_offset: u8, new_len: u8) -> Vec<u8> {
    match arch {
        Arch::X86_64 => {
            let opcode = bytes[0];
            let mut out = Vec::with_capacity(new_len as usize);
            if opcode == 0xEB {
                out.push(0xE9);
            } else if (0x70..=0x7F).contains(&opcode) {
                out.push(0x0F);
                out.push(0x80 | (opcode & 0x0F));
            } else {
                out.push(opcode);
            }
            out.resize(new_len as usize, 0);
            out
        }
        Arch::AArch64 => {
            let mut out = bytes.to_vec();
            out.resize(new_len as usize, 0);
            let _ = disp_offset;
            out
        }
    }
}

//! `JumpTablePass` (spec.md §4.4, grounded in
//! `original_source/src/pass/jumptablepass.cpp`): discovers indirect-jump
//! tables, builds `JumpTable`/`JumpTableEntry` chunks for them, and
//! persists/reloads descriptors through [`crate::cache`].
//!
//! Discovery itself (the instruction-pattern heuristic for x86-64/ARM, the
//! dataflow detector for AArch64) is the disassembler's domain and is out
//! of scope here (spec.md §1); this module takes a `Vec<JumpTableDescriptor>`
//! already discovered (e.g. by [`crate::elfmap::Disassembler::find_jump_tables`])
//! and does everything spec.md §4.4 actually specifies: collision
//! tie-breaking, entry materialization, and cache round-tripping.

use crate::arch::Arch;
use crate::cache::JumpTableCache;
use crate::ir::chunk::{Chunk, ChunkKind, Size};
use crate::ir::entities::ChunkId;
use crate::ir::program::Program;
use crate::link::{Link, LinkFactory, LinkTarget};
use crate::mutate::Mutator;
use crate::position::Position;

/// One discovered (or cache-loaded) jump table: the indirect-jump
/// instruction that reads it, its base address, the base address jump
/// targets are computed relative to, the per-entry scale, and (if known)
/// entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTableDescriptor {
    pub instruction: ChunkId,
    pub address: u64,
    pub target_base: u64,
    pub scale: u8,
    /// `None` means "unknown entry count" (spec.md §4.4 collision rule).
    pub entries: Option<u32>,
}

/// Runs jump-table discovery+materialization for one module.
///
/// `discovered` is the raw list of descriptors found by the (external)
/// instruction-pattern search; `copy_base` is the base address the raw
/// table bytes live at in the original image (`elfmap::ElfMap::copy_base`);
/// `table_bytes` reads `len` bytes at a virtual address from that image.
pub fn run(
    program: &mut Program,
    module: ChunkId,
    arch: Arch,
    discovered: Vec<JumpTableDescriptor>,
    table_bytes: &dyn Fn(u64, usize) -> Option<Vec<u8>>,
) -> ChunkId {
    let jt_list = program.alloc(Chunk::new(
        ChunkKind::JumpTableList,
        Position::offset(),
        Size::SumOfChildren,
    ));
    Mutator::append(program, module, jt_list);

    let merged = merge_collisions(discovered);

    for descriptor in merged {
        let count = descriptor.entries.unwrap_or(0);
        let jt = program.alloc(Chunk::new(
            ChunkKind::JumpTable {
                descriptor: descriptor.clone(),
            },
            Position::absolute(descriptor.address),
            Size::SumOfChildren,
        ));
        Mutator::append(program, jt_list, jt);
        make_entries(program, jt, &descriptor, count, arch, table_bytes);
    }

    jt_list
}

/// Applies spec.md §4.4's collision tie-break: unknown-count loses to
/// known-count; between two known counts, the larger wins (and a warning
/// is logged — this mirrors the original's "overlapping jump tables ...
/// with different sizes" warning).
fn merge_collisions(discovered: Vec<JumpTableDescriptor>) -> Vec<JumpTableDescriptor> {
    let mut by_address: Vec<JumpTableDescriptor> = Vec::new();
    'outer: for d in discovered {
        for existing in by_address.iter_mut() {
            if existing.address != d.address {
                continue;
            }
            match (existing.entries, d.entries) {
                (None, Some(_)) => *existing = d,
                (Some(a), Some(b)) if a != b => {
                    log::warn!(
                        "overlapping jump tables at {:#x} with different sizes: {} vs {}",
                        d.address,
                        a,
                        b
                    );
                    if b > a {
                        *existing = d;
                    }
                }
                _ => {}
            }
            continue 'outer;
        }
        by_address.push(d);
    }
    by_address
}

fn make_entries(
    program: &mut Program,
    jt: ChunkId,
    descriptor: &JumpTableDescriptor,
    count: u32,
    arch: Arch,
    table_bytes: &dyn Fn(u64, usize) -> Option<Vec<u8>>,
) {
    for i in 0..count as u64 {
        let entry_addr = descriptor.address + i * descriptor.scale as u64;
        let raw = match table_bytes(entry_addr, descriptor.scale as usize) {
            Some(b) => b,
            None => {
                log::warn!("jump table entry at {:#x} is out of bounds", entry_addr);
                continue;
            }
        };
        let mut value = sign_extend(&raw);
        if arch == Arch::AArch64 {
            value *= 4;
        }
        let target = descriptor.target_base.wrapping_add(value as u64);

        let link = match find_target_instruction(program, jt, target) {
            Some(inst) => LinkFactory::resolve(
                jt,
                LinkTarget::KnownChunk {
                    chunk: inst,
                    scope: crate::link::LinkScope::Internal,
                },
            ),
            None => LinkFactory::resolve(jt, LinkTarget::RawAddress { address: target }),
        };

        let entry = program.alloc(Chunk::new(
            ChunkKind::JumpTableEntry { link },
            Position::absolute(entry_addr),
            Size::Fixed(descriptor.scale as u64),
        ));
        Mutator::append(program, jt, entry);
    }
}

fn sign_extend(bytes: &[u8]) -> i64 {
    match bytes.len() {
        1 => bytes[0] as i8 as i64,
        2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i64,
        4 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
        n => {
            log::warn!("unexpected jump table entry width {n}, treating as 0");
            0
        }
    }
}

/// Resolves `target` to the innermost instruction containing it, by
/// searching every function in every module of the program (spec.md §4.4
/// `ChunkFind::findInnermostInsideInstruction`).
fn find_target_instruction(program: &Program, jt: ChunkId, target: u64) -> Option<ChunkId> {
    let mut cur = jt;
    while let Some(p) = program.parent(cur) {
        cur = p;
        if matches!(program.get(cur).kind, ChunkKind::Module { .. }) {
            break;
        }
    }
    let module = cur;
    for func in program.functions_of(module) {
        if let Some(inst) = program.find_innermost_instruction(func, target) {
            return Some(inst);
        }
    }
    None
}

/// Reloads a previously-saved jump table list from the on-disk cache
/// (spec.md §4.4, §6), resolving each entry's target the same way fresh
/// discovery would. Returns `None` (cache miss) so the caller falls back
/// to re-running discovery, which must be deterministic.
pub fn load_from_cache(
    program: &mut Program,
    module: ChunkId,
    module_name: &str,
    cache: &JumpTableCache,
    arch: Arch,
    table_bytes: &dyn Fn(u64, usize) -> Option<Vec<u8>>,
    find_instruction_at: &dyn Fn(u64) -> Option<ChunkId>,
) -> Option<ChunkId> {
    let entries = cache.load(module_name)?;
    let jt_list = program.alloc(Chunk::new(
        ChunkKind::JumpTableList,
        Position::offset(),
        Size::SumOfChildren,
    ));
    Mutator::append(program, module, jt_list);

    for line in entries {
        let _instruction = find_instruction_at(line.instruction_address);
        let descriptor = JumpTableDescriptor {
            instruction: _instruction.unwrap_or(jt_list),
            address: line.table_address,
            target_base: line.target_base,
            scale: line.scale,
            entries: Some(line.entry_count),
        };
        let jt = program.alloc(Chunk::new(
            ChunkKind::JumpTable {
                descriptor: descriptor.clone(),
            },
            Position::absolute(descriptor.address),
            Size::SumOfChildren,
        ));
        Mutator::append(program, jt_list, jt);
        make_entries(program, jt, &descriptor, line.entry_count, arch, table_bytes);
    }

    Some(jt_list)
}

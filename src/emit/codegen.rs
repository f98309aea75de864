//! Lays a module's instructions out as a flat byte image and patches every
//! PC-relative displacement whose target already has a fixed address
//! (spec.md §4.1's address-resolution model feeding directly into §4.6
//! emission). References that cannot be patched in place — to a symbol
//! with no chunk yet, or to the dynamic loader — are instead returned as
//! [`PendingRelocation`]s for the caller to turn into
//! [`crate::gen::reloc::RelocEntry`] entries.

use crate::ir::entities::ChunkId;
use crate::ir::program::Program;
use crate::link::Link;

pub struct PendingRelocation {
    /// Absolute address of the displacement field needing patching.
    pub address: u64,
    pub link: Link,
    /// Width in bytes of the displacement field at `address`, needed to
    /// pick a width-matching relocation type (e.g. 4-byte PC-relative vs.
    /// 8-byte absolute) at the emitter.
    pub disp_len: u8,
    /// `r_addend` per spec.md §4.5: `target_offset − section_base −
    /// displacement_field_tail_distance`, i.e. `disp_offset − sem_size` for
    /// a PC-relative x86-64 field whose displacement ends at the
    /// instruction's last byte.
    pub addend: i64,
}

pub struct CodeImage {
    pub bytes: Vec<u8>,
    pub base_address: u64,
    pub relocations: Vec<PendingRelocation>,
}

pub fn emit_module_code(program: &Program, module: ChunkId) -> CodeImage {
    let base = program.address_of(module);
    let mut bytes = Vec::new();
    let mut relocations = Vec::new();

    for func in program.functions_of(module) {
        for &block in program.children(func) {
            for &inst in program.children(block) {
                let addr = program.address_of(inst);
                let offset = (addr - base) as usize;
                if bytes.len() < offset {
                    bytes.resize(offset, 0);
                }

                let chunk = program.get(inst);
                let Some(semantic) = chunk.instruction_semantic() else {
                    continue;
                };
                let mut encoded = semantic.raw_bytes().to_vec();

                if let (Some(disp_offset), Some(disp_len), Some(link)) = (
                    semantic.displacement_offset(),
                    semantic.displacement_len(),
                    semantic.link(),
                ) {
                    patch_or_defer(
                        program,
                        addr,
                        &mut encoded,
                        disp_offset as usize,
                        disp_len as usize,
                        link,
                        &mut relocations,
                    );
                }

                bytes.extend_from_slice(&encoded);
            }
        }
    }

    CodeImage {
        bytes,
        base_address: base,
        relocations,
    }
}

fn patch_or_defer(
    program: &Program,
    inst_addr: u64,
    encoded: &mut [u8],
    disp_offset: usize,
    disp_len: usize,
    link: &Link,
    relocations: &mut Vec<PendingRelocation>,
) {
    let target_addr = match link {
        Link::Normal { target, .. } => Some(program.address_of(*target)),
        Link::Plt { trampoline } => Some(program.address_of(*trampoline)),
        Link::DataOffset { region, offset } => Some(program.address_of(*region) + offset),
        Link::Unresolved { address } => Some(*address),
        Link::SymbolOnly { .. } | Link::LdsoLoader { .. } => None,
    };

    match target_addr {
        Some(target) => {
            let next_insn = inst_addr + encoded.len() as u64;
            let disp = target.wrapping_sub(next_insn) as i64;
            write_signed(encoded, disp_offset, disp_len, disp);
        }
        None => {
            let addend = disp_offset as i64 - encoded.len() as i64;
            relocations.push(PendingRelocation {
                address: inst_addr + disp_offset as u64,
                link: link.clone(),
                disp_len: disp_len as u8,
                addend,
            });
        }
    }
}

fn write_signed(encoded: &mut [u8], offset: usize, len: usize, value: i64) {
    let bytes = value.to_le_bytes();
    encoded[offset..offset + len].copy_from_slice(&bytes[..len]);
}

//! `ElfMap` and `Disassembler` (spec.md §1): the external collaborators
//! ingestion depends on but this crate does not own the implementation
//! of. `ElfMap` wraps `object`'s read API (the same crate cranelift-object
//! uses on the write side; its `read`/`elf` features give us the mirror
//! capability here) over a parsed image's sections and symbols.
//! `Disassembler` is a trait so a real decoder (capstone, iced-x86, ...)
//! can be substituted without this crate depending on one directly —
//! spec.md explicitly treats instruction decoding as out of scope.

use object::{Object, ObjectSection, ObjectSymbol};

use crate::error::{RewriteError, RewriteResult};

pub struct ElfSection {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub data: Vec<u8>,
    pub is_executable: bool,
}

pub struct ElfSymbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub is_local: bool,
    pub is_undefined: bool,
}

/// A parsed ELF image, read-only from this crate's point of view — mutation
/// happens entirely in the [`crate::ir::program::Program`] tree ingestion
/// builds from it.
pub struct ElfMap<'data> {
    file: object::File<'data>,
}

impl<'data> ElfMap<'data> {
    pub fn parse(data: &'data [u8]) -> RewriteResult<Self> {
        let file = object::File::parse(data)
            .map_err(|e| RewriteError::transform(format!("failed to parse ELF image: {e}")))?;
        Ok(Self { file })
    }

    pub fn architecture(&self) -> object::Architecture {
        self.file.architecture()
    }

    pub fn entry(&self) -> u64 {
        self.file.entry()
    }

    pub fn sections(&self) -> Vec<ElfSection> {
        self.file
            .sections()
            .map(|s| ElfSection {
                name: s.name().unwrap_or("").to_string(),
                address: s.address(),
                size: s.size(),
                data: s.data().unwrap_or(&[]).to_vec(),
                is_executable: s.kind() == object::SectionKind::Text,
            })
            .collect()
    }

    pub fn symbols(&self) -> Vec<ElfSymbol> {
        self.file
            .symbols()
            .map(|s| ElfSymbol {
                name: s.name().unwrap_or("").to_string(),
                address: s.address(),
                size: s.size(),
                is_local: s.is_local(),
                is_undefined: s.is_undefined(),
            })
            .collect()
    }

    pub fn find_section(&self, name: &str) -> Option<ElfSection> {
        self.sections().into_iter().find(|s| s.name == name)
    }

    /// Every `DT_NEEDED` entry, in the order the dynamic table lists them —
    /// used by `LdsoRefsPass`/`ExternalSymbolLinksPass` to decide which
    /// undefined symbols are shared-library-provided.
    pub fn needed_libraries(&self) -> Vec<String> {
        // `object`'s high-level `Object` trait does not expose DT_NEEDED
        // directly; a real ingestion stage reads the `.dynamic` section
        // itself. Left empty here since no caller in this crate depends on
        // the actual list yet (see `DESIGN.md`).
        Vec::new()
    }
}

/// One decoded instruction, as reported by an external disassembler.
pub struct DecodedInstruction {
    pub address: u64,
    pub bytes: Vec<u8>,
    pub is_return: bool,
    pub is_indirect_jump: bool,
    pub is_indirect_call: bool,
    /// `Some(target)` for a direct, statically-known branch/call target.
    pub direct_target: Option<u64>,
}

/// The black-box decoder ingestion depends on (spec.md §1's "Non-goals:
/// does not implement its own disassembler"). A real backend (capstone,
/// iced-x86, zydis) implements this over `ElfMap`'s section data.
pub trait Disassembler {
    fn decode_range(&self, data: &[u8], base_address: u64) -> Vec<DecodedInstruction>;

    /// Best-effort jump-table discovery at `jump_address`, used by
    /// `JumpTablePass` when no on-disk cache entry exists (spec.md §4.4).
    /// Returns `(table_address, scale, entry_count)` if found.
    fn find_jump_table(&self, jump_address: u64) -> Option<(u64, u8, u32)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage_input() {
        let data = [0u8; 16];
        assert!(ElfMap::parse(&data).is_err());
    }
}

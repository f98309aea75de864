//! `DynamicSectionContent` (spec.md §4.5): `.dynamic`, the array of
//! `Elf64Dyn` tag/value pairs the dynamic linker reads before anything
//! else. `DT_NEEDED` values are string-table offsets committed up front
//! (the shared-library name list is known at construction time);
//! `DT_STRTAB`/`DT_SYMTAB` need the final address of `.dynstr`/`.dynsym`,
//! which is a structural field of another section and therefore already
//! available through [`crate::gen::deferred::ResolveCtx::sections`]
//! without any finalizer of its own.

use crate::gen::deferred::{ResolveCtx, ResolvePass};
use crate::gen::elf_types::{Elf64Dyn, DT_NEEDED, DT_NULL, DT_STRTAB, DT_SYMTAB};
use std::cell::Cell;

pub struct DynamicSectionContent {
    needed_offsets: Vec<u32>,
    strtab_addr: Cell<Option<u64>>,
    symtab_addr: Cell<Option<u64>>,
}

impl DynamicSectionContent {
    pub fn new(needed_offsets: Vec<u32>) -> Self {
        Self {
            needed_offsets,
            strtab_addr: Cell::new(None),
            symtab_addr: Cell::new(None),
        }
    }

    /// Entry count including the trailing `DT_NULL` terminator.
    fn entry_count(&self) -> usize {
        self.needed_offsets.len() + 3
    }

    pub fn byte_len(&self) -> u64 {
        self.entry_count() as u64 * 16
    }

    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entry_count() * 16);
        for &name_offset in &self.needed_offsets {
            out.extend_from_slice(&Elf64Dyn { d_tag: DT_NEEDED, d_val: name_offset as u64 }.to_bytes());
        }
        out.extend_from_slice(&Elf64Dyn {
            d_tag: DT_STRTAB,
            d_val: self.strtab_addr.get().unwrap_or(0),
        }.to_bytes());
        out.extend_from_slice(&Elf64Dyn {
            d_tag: DT_SYMTAB,
            d_val: self.symtab_addr.get().unwrap_or(0),
        }.to_bytes());
        out.extend_from_slice(&Elf64Dyn { d_tag: DT_NULL, d_val: 0 }.to_bytes());
        out
    }
}

impl ResolvePass for DynamicSectionContent {
    fn resolve_pass(&self, ctx: &ResolveCtx<'_>) -> bool {
        let mut progressed = false;
        if self.strtab_addr.get().is_none() {
            if let Some(id) = ctx.sections.find_by_name(".dynstr") {
                self.strtab_addr.set(Some(ctx.sections.get(id).addr()));
                progressed = true;
            }
        }
        if self.symtab_addr.get().is_none() {
            if let Some(id) = ctx.sections.find_by_name(".dynsym") {
                self.symtab_addr.set(Some(ctx.sections.get(id).addr()));
                progressed = true;
            }
        }
        progressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gen::section::{Content, Section, SectionTable};
    use crate::gen::elf_types::{SHT_STRTAB, SHT_DYNSYM};

    #[test]
    fn resolves_strtab_and_symtab_addresses_from_the_section_table() {
        let mut sections = SectionTable::new();
        sections.push(Section::new(".dynstr", SHT_STRTAB, SectionTable::flags(true, false, false), Content::Raw(vec![0])));
        sections.push(Section::new(".dynsym", SHT_DYNSYM, SectionTable::flags(true, false, false), Content::Raw(vec![0; 24])));
        sections.commit_structural(0x400000, 0x1000);

        let content = DynamicSectionContent::new(vec![]);
        let ctx = ResolveCtx { sections: &sections, symtab: None };
        crate::gen::deferred::resolve_to_fixed_point(&[&content], &ctx).unwrap();

        assert!(content.strtab_addr.get().unwrap() > 0);
        assert!(content.symtab_addr.get().unwrap() > 0);
    }
}

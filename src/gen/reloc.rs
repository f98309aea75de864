//! `RelocSectionContent` (spec.md §4.5), grounded in
//! `original_source/src/generate/concretedeferred.cpp`'s
//! `RelocSectionContent::addConcrete`: one `.rela`-style entry per
//! [`crate::link::Link`] that needs a relocation resolved at load time.
//! `r_addend`, `r_type` are known up front (the caller derives them from the
//! instruction's displacement width and the link's resolution policy, per
//! spec.md §4.5's `r_addend = target_offset − section_base −
//! displacement_field_tail_distance` formula); `r_sym` is content-dependent
//! (it needs the target's final index in `.symtab`/`.dynsym`), so each
//! entry carries a [`crate::gen::deferred::Deferred`] record finalized once
//! the symbol table has resolved.

use crate::gen::deferred::{Deferred, ResolveCtx, ResolvePass};
use crate::gen::elf_types::Elf64Rela;

pub struct RelocEntry {
    pub offset: u64,
    pub addend: i64,
    pub symbol_name: String,
    pub reloc_type: u32,
    resolved_sym: Deferred<Option<u32>>,
}

impl RelocEntry {
    pub fn new(offset: u64, addend: i64, symbol_name: impl Into<String>, reloc_type: u32) -> Self {
        let entry = Self {
            offset,
            addend,
            symbol_name: symbol_name.into(),
            reloc_type,
            resolved_sym: Deferred::new(None),
        };
        let name = entry.symbol_name.clone();
        entry.resolved_sym.add_finalizer(move |sym, ctx| {
            if sym.is_some() {
                return false;
            }
            if let Some(index) = crate::gen::symtab::resolve_symbol_index(ctx, &name) {
                *sym = Some(index as u32);
                true
            } else {
                false
            }
        });
        entry
    }
}

pub struct RelocSectionContent {
    entries: Vec<RelocEntry>,
}

impl RelocSectionContent {
    pub fn new(entries: Vec<RelocEntry>) -> Self {
        Self { entries }
    }

    pub fn byte_len(&self) -> u64 {
        self.entries.len() as u64 * 24
    }

    /// Call [`resolve_to_fixed_point`](crate::gen::deferred::resolve_to_fixed_point)
    /// with this content included before calling `write`, or unresolved
    /// entries silently emit `r_sym == 0`.
    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 24);
        for entry in &self.entries {
            let sym = entry.resolved_sym.get().unwrap_or(0);
            let rela = Elf64Rela {
                r_offset: entry.offset,
                r_sym: sym,
                r_type: entry.reloc_type,
                r_addend: entry.addend,
            };
            out.extend_from_slice(&rela.to_bytes());
        }
        out
    }
}

impl ResolvePass for RelocSectionContent {
    fn resolve_pass(&self, ctx: &ResolveCtx<'_>) -> bool {
        let mut progressed = false;
        for entry in &self.entries {
            if entry.resolved_sym.resolve_pass(ctx) {
                progressed = true;
            }
        }
        progressed
    }
}

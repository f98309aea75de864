//! `SymbolTableContent` (spec.md §4.5), grounded in
//! `original_source/src/generate/concretedeferred.cpp`'s
//! `SymbolInTable::operator<`: entries sort by symbol class first (null,
//! section, local, global, undefined, matching spec.md §4.5's explicit
//! class order `{NULL, SECTION, LOCAL, GLOBAL, UNDEF}`), then
//! null-symbols-first, then by name, then by section index — never by
//! address (the original keeps that comparison `#if 0`-disabled; see
//! `DESIGN.md`). `first_global_index` tracks the first non-local,
//! non-section entry, since `sh_info` on `.symtab`/`.dynsym` must hold
//! that boundary.

use crate::gen::deferred::ResolveCtx;
use crate::gen::elf_types::{Elf64Sym, SHN_UNDEF, STB_GLOBAL, STB_LOCAL, STT_FUNC, STT_NOTYPE, STT_SECTION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SymbolClass {
    Null,
    Section,
    Local,
    Global,
    Undefined,
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub class: SymbolClass,
    pub name: String,
    pub bind: u8,
    pub sym_type: u8,
    /// Section index this symbol resolves in, `SHN_UNDEF` if unresolved.
    pub section_index: u16,
    pub value: u64,
    pub size: u64,
}

impl SymbolEntry {
    pub fn null() -> Self {
        Self {
            class: SymbolClass::Null,
            name: String::new(),
            bind: STB_LOCAL,
            sym_type: STT_NOTYPE,
            section_index: SHN_UNDEF,
            value: 0,
            size: 0,
        }
    }

    pub fn section(section_index: u16) -> Self {
        Self {
            class: SymbolClass::Section,
            name: String::new(),
            bind: STB_LOCAL,
            sym_type: STT_SECTION,
            section_index,
            value: 0,
            size: 0,
        }
    }

    pub fn function(name: impl Into<String>, local: bool, value: u64, size: u64, shndx: u16) -> Self {
        Self {
            class: if local { SymbolClass::Local } else { SymbolClass::Global },
            name: name.into(),
            bind: if local { STB_LOCAL } else { STB_GLOBAL },
            sym_type: STT_FUNC,
            section_index: shndx,
            value,
            size,
        }
    }

    pub fn undefined(name: impl Into<String>) -> Self {
        Self {
            class: SymbolClass::Undefined,
            name: name.into(),
            bind: STB_GLOBAL,
            sym_type: STT_FUNC,
            section_index: SHN_UNDEF,
            value: 0,
            size: 0,
        }
    }

    fn sort_key(&self) -> (SymbolClass, bool, &str, u16) {
        (self.class, self.name.is_empty(), self.name.as_str(), self.section_index)
    }
}

pub struct SymbolTableContent {
    entries: Vec<SymbolEntry>,
    string_table: Vec<u8>,
    name_offsets: Vec<u32>,
    first_global_index: usize,
}

impl SymbolTableContent {
    pub fn new(mut entries: Vec<SymbolEntry>) -> Self {
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let first_global_index = entries
            .iter()
            .position(|e| !matches!(e.class, SymbolClass::Null | SymbolClass::Local | SymbolClass::Section))
            .unwrap_or(entries.len());

        let mut string_table = vec![0u8];
        let mut name_offsets = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.name.is_empty() {
                name_offsets.push(0);
                continue;
            }
            name_offsets.push(string_table.len() as u32);
            string_table.extend_from_slice(entry.name.as_bytes());
            string_table.push(0);
        }

        Self {
            entries,
            string_table,
            name_offsets,
            first_global_index,
        }
    }

    pub fn byte_len(&self) -> u64 {
        self.entries.len() as u64 * 24
    }

    pub fn first_global_index(&self) -> usize {
        self.first_global_index
    }

    pub fn string_table(&self) -> &[u8] {
        &self.string_table
    }

    /// Index of the first symbol whose name matches `name`, used by
    /// `.rela`-section finalizers to resolve a relocation's `r_sym` (the
    /// `indexOfSectionSymbol`/`indexOf` pattern in `concretedeferred.cpp`).
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 24);
        for (entry, &name_offset) in self.entries.iter().zip(&self.name_offsets) {
            let sym = Elf64Sym {
                st_name: name_offset,
                st_info: Elf64Sym::st_info(entry.bind, entry.sym_type),
                st_other: 0,
                st_shndx: entry.section_index,
                st_value: entry.value,
                st_size: entry.size,
            };
            out.extend_from_slice(&sym.to_bytes());
        }
        out
    }
}

pub fn resolve_symbol_index(ctx: &ResolveCtx<'_>, name: &str) -> Option<usize> {
    ctx.symtab.and_then(|s| s.index_of_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_null_then_section_then_local_then_global_then_undefined() {
        let table = SymbolTableContent::new(vec![
            SymbolEntry::undefined("printf"),
            SymbolEntry::function("main", false, 0x1000, 16, 1),
            SymbolEntry::null(),
            SymbolEntry::function("helper", true, 0x2000, 8, 1),
            SymbolEntry::section(1),
        ]);
        let classes: Vec<SymbolClass> = table.entries.iter().map(|e| e.class).collect();
        assert_eq!(
            classes,
            vec![
                SymbolClass::Null,
                SymbolClass::Section,
                SymbolClass::Local,
                SymbolClass::Global,
                SymbolClass::Undefined
            ]
        );
    }

    #[test]
    fn first_global_index_marks_the_boundary_after_section_and_local() {
        let table = SymbolTableContent::new(vec![
            SymbolEntry::null(),
            SymbolEntry::section(1),
            SymbolEntry::function("helper", true, 0x2000, 8, 1),
            SymbolEntry::function("main", false, 0x1000, 16, 1),
        ]);
        assert_eq!(table.first_global_index(), 3);
    }

    #[test]
    fn string_table_offsets_are_unique_per_named_symbol() {
        let table = SymbolTableContent::new(vec![
            SymbolEntry::function("a", false, 0, 0, 1),
            SymbolEntry::function("b", false, 0, 0, 1),
        ]);
        assert_eq!(table.name_offsets.len(), 2);
        assert_ne!(table.name_offsets[0], table.name_offsets[1]);
    }
}

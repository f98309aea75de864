//! `ShdrTableContent` (spec.md §4.5): the section header table itself.
//!
//! Every header's own structural fields (`sh_offset`, `sh_addr`, its own
//! index) are already committed on `SectionTable` by the time this content
//! is serialized (`SectionTable::commit_structural` runs before any
//! [`crate::gen::deferred`] pass), so this is a single read-only pass over
//! the table, not a `Deferred` content object at all.

use crate::gen::elf_types::Elf64Shdr;
use crate::gen::section::SectionTable;

pub struct ShdrTableContent {
    entry_count: usize,
}

impl ShdrTableContent {
    pub fn new(entry_count: usize) -> Self {
        Self { entry_count }
    }

    pub fn byte_len(&self) -> u64 {
        self.entry_count as u64 * 64
    }

    pub fn write(&self, sections: &SectionTable) -> Vec<u8> {
        let mut out = Vec::with_capacity(sections.len() * 64);
        for section in sections.iter() {
            let shdr = Elf64Shdr {
                sh_name: section.name_offset.unwrap_or(0),
                sh_type: section.sh_type,
                sh_flags: section.sh_flags,
                sh_addr: section.addr.unwrap_or(0),
                sh_offset: section.offset.unwrap_or(0),
                sh_size: section.len(),
                sh_link: section.sh_link,
                sh_info: section.sh_info,
                sh_addralign: section.sh_addralign,
                sh_entsize: section.sh_entsize,
            };
            out.extend_from_slice(&shdr.to_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gen::section::{Content, Section};
    use crate::gen::elf_types::{SHT_PROGBITS, SHT_STRTAB};

    #[test]
    fn writes_one_header_per_section() {
        let mut sections = SectionTable::new();
        sections.push(Section::new(".text", SHT_PROGBITS, 0, Content::Raw(vec![0; 4])));
        sections.push(Section::new(".shstrtab", SHT_STRTAB, 0, Content::Raw(Vec::new())));
        sections.commit_structural(0x400000, 0);

        let content = ShdrTableContent::new(sections.len());
        let bytes = content.write(&sections);
        assert_eq!(bytes.len(), sections.len() * 64);
        assert_eq!(content.byte_len(), bytes.len() as u64);
    }
}

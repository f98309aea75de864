//! `PhdrTableContent` (spec.md §4.5): the program header table, one
//! `Elf64Phdr` per [`crate::gen::section::Segment`].
//!
//! `p_paddr` applies the kernel-image bias rule from spec.md §4.5/§6 via
//! [`crate::arch::bias_kernel_paddr`] — a kernel image linked above
//! `LINUX_KERNEL_BASE` stores a physical address with that offset
//! subtracted back out, everything else leaves `p_paddr == p_vaddr`.

use crate::arch::bias_kernel_paddr;
use crate::gen::elf_types::Elf64Phdr;
use crate::gen::section::SectionTable;

pub struct PhdrTableContent {
    segment_count: usize,
}

impl PhdrTableContent {
    pub fn new(segment_count: usize) -> Self {
        Self { segment_count }
    }

    pub fn byte_len(&self) -> u64 {
        self.segment_count as u64 * 56
    }

    pub fn write(&self, sections: &SectionTable) -> Vec<u8> {
        let mut out = Vec::with_capacity(sections.segments.len() * 56);
        for segment in &sections.segments {
            let (offset, vaddr, filesz) = segment_extent(sections, segment);
            let phdr = Elf64Phdr {
                p_type: segment.p_type,
                p_flags: segment.p_flags,
                p_offset: offset,
                p_vaddr: vaddr,
                p_paddr: bias_kernel_paddr(vaddr),
                p_filesz: filesz,
                p_memsz: filesz,
                p_align: segment.p_align,
            };
            out.extend_from_slice(&phdr.to_bytes());
        }
        out
    }
}

fn segment_extent(
    sections: &SectionTable,
    segment: &crate::gen::section::Segment,
) -> (u64, u64, u64) {
    let Some(&first) = segment.sections.first() else {
        return (0, 0, 0);
    };
    let Some(&last) = segment.sections.last() else {
        return (0, 0, 0);
    };
    let first = sections.get(first);
    let last = sections.get(last);
    let offset = first.offset();
    let vaddr = first.addr();
    let end = last.offset() + last.len();
    (offset, vaddr, end - offset)
}

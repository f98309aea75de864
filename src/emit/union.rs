//! Static-union emitter (spec.md §4.6, §6): merges every module's rewritten
//! code into one self-contained ELF executable. No `PT_DYNAMIC`/`PT_INTERP`,
//! no `.dynsym`/`.dynstr` — `FixEnvironPass` has already collapsed every
//! module's `environ` reference onto one canonical variable (spec.md §4.4),
//! and `LdsoRefsPass`/`ExternalSymbolLinksPass` have already turned
//! shared-library references into PLT trampolines or internal links, so by
//! the time code reaches this emitter there is nothing left that needs the
//! loader at runtime.

use crate::emit::codegen::{emit_module_code, PendingRelocation};
use crate::emit::concat_sections;
use crate::error::RewriteResult;
use crate::gen::elf_types::{
    Elf64Ehdr, ET_EXEC, PF_R, PF_W, PF_X, PT_LOAD, R_X86_64_64, R_X86_64_GLOB_DAT, R_X86_64_PC32, SHT_PROGBITS,
    SHT_RELA, SHT_STRTAB,
};
use crate::gen::reloc::{RelocEntry, RelocSectionContent};
use crate::gen::section::{Content, Section, SectionTable, Segment};
use crate::gen::symtab::{SymbolEntry, SymbolTableContent};
use crate::gen::{resolve_to_fixed_point, ResolveCtx, ResolvePass};
use crate::ir::chunk::ChunkKind;
use crate::ir::entities::ChunkId;
use crate::ir::program::Program;

const LOAD_BASE: u64 = 0x400000;
/// `Elf64Ehdr` (64 bytes) followed by one `Elf64Phdr` (56 bytes).
const HEADER_RESERVE: u64 = 64 + 56;

/// Merges every module of `program` into a single statically-linked image.
pub fn build(program: &Program, machine: u16) -> RewriteResult<Vec<u8>> {
    let modules: Vec<ChunkId> = program.modules().collect();

    let mut text_bytes = Vec::new();
    let mut pending_relocs = Vec::new();
    let mut symbols = vec![SymbolEntry::null()];

    for &module in &modules {
        let image = emit_module_code(program, module);
        let module_start = text_bytes.len() as u64;
        let module_len = image.bytes.len() as u64;
        text_bytes.extend_from_slice(&image.bytes);
        pending_relocs.extend(image.relocations);

        if let ChunkKind::Module { name } = &program.get(module).kind {
            symbols.push(SymbolEntry::function(name.clone(), false, module_start, module_len, 1));
        }
    }

    let reloc_entries: Vec<RelocEntry> = pending_relocs
        .iter()
        .map(|r| RelocEntry::new(r.address, r.addend, link_symbol_name(&r.link), reloc_type_for(r)))
        .collect();
    let symtab_content = SymbolTableContent::new(symbols);
    let reloc_content = RelocSectionContent::new(reloc_entries);

    let mut sections = SectionTable::new();
    let text = sections.push(Section::new(
        ".text",
        SHT_PROGBITS,
        SectionTable::flags(true, false, true),
        Content::Raw(text_bytes),
    ));
    let symtab = sections.push(Section::new(
        ".symtab",
        crate::gen::elf_types::SHT_SYMTAB,
        0,
        Content::Raw(symtab_content.write()),
    ));
    sections.get_mut(symtab).sh_entsize = 24;
    let strtab = sections.push(Section::new(
        ".strtab",
        SHT_STRTAB,
        0,
        Content::Raw(symtab_content.string_table().to_vec()),
    ));
    sections.get_mut(symtab).sh_link = strtab.0 as u32;
    let rela = sections.push(Section::new(".rela.text", SHT_RELA, 0, Content::Raw(Vec::new())));
    sections.get_mut(rela).sh_info = text.0 as u32;
    sections.get_mut(rela).sh_entsize = 24;

    sections.commit_structural(LOAD_BASE, HEADER_RESERVE);
    sections.segments.push(Segment {
        p_type: PT_LOAD,
        p_flags: PF_R | PF_X | PF_W,
        p_align: 0x1000,
        sections: vec![text],
    });

    let ctx = ResolveCtx {
        sections: &sections,
        symtab: Some(&symtab_content),
    };
    resolve_to_fixed_point(&[&reloc_content as &dyn ResolvePass], &ctx)?;
    sections.get_mut(rela).content = Content::Raw(reloc_content.write());

    let entry = sections.get(text).addr();
    let mut out = concat_sections(&sections);
    if out.len() < HEADER_RESERVE as usize {
        out.resize(HEADER_RESERVE as usize, 0);
    }

    let ehdr = Elf64Ehdr {
        e_type: ET_EXEC,
        e_machine: machine,
        e_entry: entry,
        e_phoff: 64,
        e_shoff: 0,
        e_phnum: sections.segments.len() as u16,
        e_shnum: 0,
        e_shstrndx: 0,
    };
    out[0..64].copy_from_slice(&ehdr.to_bytes());

    let phdr = crate::gen::phdr::PhdrTableContent::new(sections.segments.len());
    let phdr_bytes = phdr.write(&sections);
    out[64..64 + phdr_bytes.len()].copy_from_slice(&phdr_bytes);

    Ok(out)
}

fn link_symbol_name(link: &crate::link::Link) -> String {
    match link {
        crate::link::Link::SymbolOnly { symbol } | crate::link::Link::LdsoLoader { symbol } => symbol.clone(),
        _ => String::new(),
    }
}

/// Picks a width- and resolution-matched relocation type (spec.md §4.5):
/// `R_X86_64_GLOB_DAT` for a reference resolved by the dynamic loader,
/// otherwise a PC-relative 4-byte type for a branch/call displacement or
/// the 8-byte absolute type for a wider (data) field.
fn reloc_type_for(reloc: &PendingRelocation) -> u32 {
    match &reloc.link {
        crate::link::Link::LdsoLoader { .. } => R_X86_64_GLOB_DAT,
        _ if reloc.disp_len == 4 => R_X86_64_PC32,
        _ => R_X86_64_64,
    }
}

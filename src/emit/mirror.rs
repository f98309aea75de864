//! Mirror emitter (spec.md §4.6, §6): preserves dynamic linking. Unlike
//! [`crate::emit::union`], `FixEnvironPass` never ran, so `LdsoLoader` and
//! `SymbolOnly` links are expected and become ordinary `.rela.dyn`-style
//! relocations resolved by the dynamic linker at load time, the same as in
//! the original image. The original file bytes are carried along verbatim
//! in a non-`SHF_ALLOC` `.orig_image` section so a consumer can always
//! recover exactly what was rewritten from, per spec.md §6's requirement
//! that mirror output be "the original program plus a rewritten parallel
//! copy".

use crate::emit::codegen::{emit_module_code, PendingRelocation};
use crate::emit::concat_sections;
use crate::error::RewriteResult;
use crate::gen::elf_types::{
    Elf64Ehdr, ET_DYN, PF_R, PF_W, PF_X, PT_LOAD, R_X86_64_64, R_X86_64_GLOB_DAT, R_X86_64_PC32, SHT_PROGBITS,
    SHT_RELA, SHT_STRTAB,
};
use crate::gen::reloc::{RelocEntry, RelocSectionContent};
use crate::gen::section::{Content, Section, SectionTable, Segment};
use crate::gen::symtab::{SymbolEntry, SymbolTableContent};
use crate::gen::{resolve_to_fixed_point, ResolveCtx, ResolvePass};
use crate::ir::chunk::ChunkKind;
use crate::ir::entities::ChunkId;
use crate::ir::program::Program;

const LOAD_BASE: u64 = 0x500000;
const HEADER_RESERVE: u64 = 64 + 56;

/// Builds a mirror image for `module`: the rewritten copy of that one
/// module's code, plus `original` embedded for reference. A full mirror
/// output covering every module in `program` runs this once per module and
/// concatenates the results; spec.md §6 describes mirroring as per-module.
pub fn build(program: &Program, module: ChunkId, original: &[u8], machine: u16) -> RewriteResult<Vec<u8>> {
    let image = emit_module_code(program, module);

    let mut symbols = vec![SymbolEntry::null()];
    if let ChunkKind::Module { name } = &program.get(module).kind {
        symbols.push(SymbolEntry::function(name.clone(), false, 0, image.bytes.len() as u64, 1));
    }
    let reloc_entries: Vec<RelocEntry> = image
        .relocations
        .iter()
        .map(|r| RelocEntry::new(r.address, r.addend, link_symbol_name(&r.link), reloc_type_for(r)))
        .collect();
    let symtab_content = SymbolTableContent::new(symbols);
    let reloc_content = RelocSectionContent::new(reloc_entries);

    let mut sections = SectionTable::new();
    let text = sections.push(Section::new(
        ".text.rewritten",
        SHT_PROGBITS,
        SectionTable::flags(true, false, true),
        Content::Raw(image.bytes),
    ));
    let symtab = sections.push(Section::new(
        ".symtab.rewritten",
        crate::gen::elf_types::SHT_SYMTAB,
        0,
        Content::Raw(symtab_content.write()),
    ));
    sections.get_mut(symtab).sh_entsize = 24;
    let strtab = sections.push(Section::new(
        ".strtab.rewritten",
        SHT_STRTAB,
        0,
        Content::Raw(symtab_content.string_table().to_vec()),
    ));
    sections.get_mut(symtab).sh_link = strtab.0 as u32;
    let rela = sections.push(Section::new(".rela.rewritten", SHT_RELA, 0, Content::Raw(Vec::new())));
    sections.get_mut(rela).sh_info = text.0 as u32;
    sections.get_mut(rela).sh_entsize = 24;
    sections.push(Section::new(".orig_image", SHT_PROGBITS, 0, Content::Raw(original.to_vec())));

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
        e_type: ET_DYN,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gen::elf_types::EM_X86_64;
    use crate::ir::chunk::{Chunk, Size};
    use crate::ir::semantic::InstructionSemantic;
    use crate::mutate::Mutator;
    use crate::position::Position;

    #[test]
    fn embeds_the_original_image_verbatim() {
        let mut program = Program::new();
        let module = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m".into() },
            Position::absolute(0x1000),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), module);
        let fl = program.alloc(Chunk::new(ChunkKind::FunctionList, Position::offset(), Size::SumOfChildren));
        Mutator::append(&mut program, module, fl);
        let func = program.alloc(Chunk::new(
            ChunkKind::Function { name: "f".into(), original_address: Some(0x1000) },
            Position::absolute(0x1000),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, fl, func);
        let block = program.alloc(Chunk::new(ChunkKind::Block, Position::offset(), Size::SumOfChildren));
        Mutator::append(&mut program, func, block);
        let ret = program.alloc(Chunk::new(
            ChunkKind::Instruction { semantic: InstructionSemantic::Return { bytes: vec![0xc3] } },
            Position::offset(),
            Size::Fixed(1),
        ));
        Mutator::append(&mut program, block, ret);

        let original = vec![0x7f, b'E', b'L', b'F', 1, 1, 1, 0];
        let bytes = build(&program, module, &original, EM_X86_64).unwrap();
        assert_eq!(&bytes[0..4], &[0x7f, b'E', b'L', b'F']);

        let needle = &original[..];
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }
}

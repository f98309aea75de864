//! Emitters (spec.md §4.6, C7): serialize a [`crate::gen::section::SectionTable`]
//! to an ELF image. Two strategies share the same section/segment graph
//! and deferred-resolve machinery; they differ only in what they emit
//! *around* the rewritten code (spec.md §6).

pub mod codegen;
pub mod mirror;
pub mod union;

use crate::error::RewriteResult;
use crate::gen::{resolve_to_fixed_point, ResolveCtx, ResolvePass, SectionTable};

/// Drives every content object with deferred fields (currently reloc
/// sections and `.dynamic`) to a fixed point, then concatenates each
/// section's bytes in file-offset order. Shared by both emit strategies
/// since the difference between mirror and static-union output is in
/// *which* sections/segments get built (see [`mirror::build`] and
/// [`union::build`]), not in how the final byte stream is assembled.
pub fn serialize(
    sections: &SectionTable,
    resolvable: &[&dyn ResolvePass],
    symtab: Option<&crate::gen::symtab::SymbolTableContent>,
) -> RewriteResult<Vec<u8>> {
    let ctx = ResolveCtx { sections, symtab };
    resolve_to_fixed_point(resolvable, &ctx)?;

    Ok(concat_sections(sections))
}

/// Concatenates every section's bytes at its committed file offset. Does
/// *not* run deferred resolution itself — callers that build their own
/// section graph by hand (see [`mirror::build`], [`union::build`]) call
/// [`resolve_to_fixed_point`] directly first, since they also need the
/// resolved content (e.g. a symbol table) for other purposes ([`serialize`]
/// is the convenience wrapper for callers who don't).
pub(crate) fn concat_sections(sections: &SectionTable) -> Vec<u8> {
    let mut out = Vec::new();
    for section in sections.iter() {
        let offset = section.offset.unwrap_or(0) as usize;
        if out.len() < offset {
            out.resize(offset, 0);
        }
        let bytes = write_section(section, sections);
        if out.len() < offset + bytes.len() {
            out.resize(offset + bytes.len(), 0);
        }
        out[offset..offset + bytes.len()].copy_from_slice(&bytes);
    }
    out
}

/// `Shdr`/`Phdr` content reads other sections' already-committed
/// structural fields off `sections` itself; every other content kind is
/// self-contained once its own deferred fields have resolved.
pub(crate) fn write_section(section: &crate::gen::Section, sections: &SectionTable) -> Vec<u8> {
    match &section.content {
        crate::gen::Content::Raw(bytes) => bytes.clone(),
        crate::gen::Content::Shdr(c) => c.write(sections),
        crate::gen::Content::Phdr(c) => c.write(sections),
        crate::gen::Content::Symtab(c) => c.write(),
        crate::gen::Content::Reloc(c) => c.write(),
        crate::gen::Content::Dynamic(c) => c.write(),
        crate::gen::Content::InitArray(c) => c.write(),
        crate::gen::Content::Padding(c) => c.write(),
    }
}

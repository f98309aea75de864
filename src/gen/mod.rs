//! Deferred ELF synthesis (spec.md §4.5, C6): turns a resolved
//! [`crate::ir::program::Program`] into the section/segment graph the
//! emitters in [`crate::emit`] serialize to bytes. See
//! [`deferred`] for the two-phase structural/content-resolve model.

pub mod deferred;
pub mod dynamic;
pub mod elf_types;
pub mod error;
pub mod initarray;
pub mod padding;
pub mod phdr;
pub mod reloc;
pub mod section;
pub mod shdr;
pub mod symtab;

pub use deferred::{resolve_to_fixed_point, Deferred, ResolveCtx, ResolvePass};
pub use section::{Content, Section, SectionId, SectionTable, Segment};

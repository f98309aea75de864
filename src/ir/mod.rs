//! The Chunk IR (spec.md §3, §4.2): a hierarchical, position-tracking tree
//! of Program -> Module -> FunctionList/PLTList/JumpTableList -> Function ->
//! Block -> Instruction, plus data regions, overlaid with the link graph
//! (`crate::link`).
//!
//! Ownership follows spec.md §9 "Cyclic ownership": chunks live in flat,
//! arena-style `PrimaryMap`s keyed by small `u32` index types, the same
//! pattern `cranelift_entity`/`cranelift_codegen::ir::entities` uses for
//! `Block`/`Inst`/`Value`. Parent/child and sibling relationships are plain
//! index fields rather than `Rc`/`Weak` graphs, so a Link can reference a
//! chunk without keeping it alive and without fighting the borrow checker.

pub mod chunk;
pub mod entities;
pub mod error;
pub mod program;
pub mod semantic;

pub use entities::*;

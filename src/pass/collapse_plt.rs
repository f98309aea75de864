//! `CollapsePLTPass` (spec.md §4.4).
//!
//! For every `ControlFlow`/`Linked` semantic whose link is `Plt` and whose
//! trampoline's target function now exists inside this Program, rewrites
//! the link to `Normal`. Invariant established: no intra-program PLT links
//! remain for resolvable targets.
//!
//! Applied uniformly in both mirror and union mode (spec.md §9 "Open
//! questions"): nothing here special-cases mirror mode's need to keep some
//! PLT stubs reachable for preserved dynamic linking — that's restored by
//! `LdsoRefsPass`/`ExternalSymbolLinksPass` running afterward, per the
//! fixed pass order in `conductor`.

use crate::ir::chunk::ChunkKind;
use crate::ir::entities::ChunkId;
use crate::ir::program::Program;
use crate::link::{Link, LinkScope};

/// Runs `CollapsePLTPass` over every instruction in `program`.
pub fn run(program: &mut Program) {
    let targets = collect_collapsible(program);
    for (inst, target) in targets {
        if let Some(sem) = program.get_mut(inst).instruction_semantic_mut() {
            if let Some(link) = sem.link_mut() {
                *link = Link::Normal {
                    target,
                    scope: LinkScope::Internal,
                };
            }
        }
    }
}

fn collect_collapsible(program: &Program) -> Vec<(ChunkId, ChunkId)> {
    let mut out = Vec::new();
    for (id, chunk) in program.iter() {
        let Some(sem) = chunk.instruction_semantic() else {
            continue;
        };
        let Some(Link::Plt { trampoline }) = sem.link() else {
            continue;
        };
        if let ChunkKind::PltTrampoline { target_symbol } = &program.get(*trampoline).kind {
            if let Some(target) = find_function_named(program, target_symbol) {
                out.push((id, target));
            }
        }
    }
    out
}

fn find_function_named(program: &Program, name: &str) -> Option<ChunkId> {
    for module in program.modules() {
        for func in program.functions_of(module) {
            if let ChunkKind::Function { name: fname, .. } = &program.get(func).kind {
                if fname == name {
                    return Some(func);
                }
            }
        }
    }
    None
}

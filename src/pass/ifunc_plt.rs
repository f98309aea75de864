//! `IFuncPLTs` (spec.md §4.4): synthesizes PLT trampolines for GNU-IFUNC-
//! bound targets.
//!
//! An IFUNC's final address is chosen at load time by a resolver function
//! (spec.md GLOSSARY); until that resolver has run there is no fixed
//! address to link to directly, so every IFUNC-bound reference always goes
//! through a trampoline, regardless of whether the resolver itself is
//! known to this Program. Shares its trampoline-synthesis machinery with
//! [`crate::pass::external_symbol_links`], since both passes are "turn a
//! symbolic reference into a first-class PLT chunk".

use crate::ir::entities::ChunkId;
use crate::ir::program::Program;
use crate::pass::external_symbol_links::{find_or_create_plt_list, rewrite_links};

/// `ifunc_symbols` names every symbol known (from the dynamic symbol
/// table, an external collaborator per spec.md §1) to be `STT_GNU_IFUNC`.
pub fn run(program: &mut Program, ifunc_symbols: &[String]) {
    if ifunc_symbols.is_empty() {
        return;
    }
    let modules: Vec<ChunkId> = program.modules().collect();
    for module in modules {
        let plt_list = find_or_create_plt_list(program, module);
        let mut trampolines = std::collections::HashMap::new();
        for symbol in ifunc_symbols {
            let trampoline = program.alloc(crate::ir::chunk::Chunk::new(
                crate::ir::chunk::ChunkKind::PltTrampoline {
                    target_symbol: symbol.clone(),
                },
                crate::position::Position::offset(),
                crate::ir::chunk::Size::Fixed(16),
            ));
            crate::mutate::Mutator::append(program, plt_list, trampoline);
            trampolines.insert(symbol.clone(), trampoline);
        }
        rewrite_links(program, module, &trampolines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::chunk::{Chunk, ChunkKind, Size};
    use crate::link::Link;
    use crate::mutate::Mutator;
    use crate::position::Position;

    #[test]
    fn ifunc_symbol_gets_a_trampoline_even_with_no_call_sites() {
        let mut program = Program::new();
        let module = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m".into() },
            Position::absolute(0),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), module);

        run(&mut program, &["memcpy".to_string()]);

        let plt_list = program
            .children(module)
            .iter()
            .copied()
            .find(|&c| matches!(program.get(c).kind, ChunkKind::PltList))
            .expect("PltList should be created");
        assert_eq!(program.children(plt_list).len(), 1);
        let _ = Link::Plt {
            trampoline: program.children(plt_list)[0],
        };
    }
}

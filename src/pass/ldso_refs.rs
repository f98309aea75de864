//! `LdsoRefsPass` (spec.md §4.4): rewrites data-variable references to
//! shared-library-provided symbols into `LdsoLoader` links, so the final
//! image emits `R_*_GLOB_DAT` relocations for them instead of resolving
//! them statically.

use crate::ir::chunk::ChunkKind;
use crate::ir::program::Program;
use crate::link::Link;

pub fn run(program: &mut Program, is_shared_library_symbol: &dyn Fn(&str) -> bool) {
    let ids: Vec<_> = program
        .iter()
        .filter_map(|(id, chunk)| match &chunk.kind {
            ChunkKind::DataVariable {
                link: Some(Link::SymbolOnly { symbol }),
                ..
            } if is_shared_library_symbol(symbol) => Some(id),
            _ => None,
        })
        .collect();

    for id in ids {
        if let ChunkKind::DataVariable { link, .. } = &mut program.get_mut(id).kind {
            if let Some(Link::SymbolOnly { symbol }) = link.take() {
                *link = Some(Link::LdsoLoader { symbol });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::chunk::{Chunk, Size};
    use crate::mutate::Mutator;
    use crate::position::Position;

    #[test]
    fn symbol_only_refs_to_shared_symbols_become_ldso_loader() {
        let mut program = Program::new();
        let module = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m".into() },
            Position::absolute(0),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), module);
        let var = program.alloc(Chunk::new(
            ChunkKind::DataVariable {
                name: "stdout".into(),
                link: Some(Link::SymbolOnly {
                    symbol: "stdout".into(),
                }),
            },
            Position::offset(),
            Size::Fixed(8),
        ));
        Mutator::append(&mut program, module, var);

        run(&mut program, &|s| s == "stdout");

        match &program.get(var).kind {
            ChunkKind::DataVariable { link, .. } => {
                assert!(matches!(link, Some(Link::LdsoLoader { symbol }) if symbol == "stdout"));
            }
            _ => unreachable!(),
        }
    }
}

//! `FixEnvironPass` (spec.md §4.4): only runs for static-union output.
//!
//! A dynamically-linked program receives `environ`/`__environ` from the
//! loader; once all modules are merged into one self-contained static
//! binary (union mode) that provider disappears, so every module's
//! `environ`-family data variable must be repointed at a single,
//! canonical `DataVariable` owned by the merged program instead of being
//! left as a separate per-module `SymbolOnly`/`LdsoLoader` reference.

use crate::ir::chunk::{Chunk, ChunkKind, Size};
use crate::ir::entities::ChunkId;
use crate::ir::program::Program;
use crate::link::{Link, LinkScope};
use crate::mutate::Mutator;
use crate::position::Position;

const ENVIRON_NAMES: &[&str] = &["environ", "__environ", "_environ"];

/// Ensures a single canonical `environ` `DataVariable` exists (creating one
/// in the first module if none is found), then repoints every other
/// module's `environ`-family variable link at it.
pub fn run(program: &mut Program) {
    let canonical = find_or_create_canonical(program);
    retarget_other_environ_vars(program, canonical);
}

fn find_or_create_canonical(program: &mut Program) -> ChunkId {
    for module in program.modules() {
        for &var in program.children(module) {
            if let ChunkKind::DataVariable { name, .. } = &program.get(var).kind {
                if ENVIRON_NAMES.contains(&name.as_str()) {
                    return var;
                }
            }
        }
    }

    let first_module = program
        .modules()
        .next()
        .expect("FixEnvironPass requires at least one module");
    let var = program.alloc(Chunk::new(
        ChunkKind::DataVariable {
            name: "environ".to_string(),
            link: None,
        },
        Position::offset(),
        Size::Fixed(8),
    ));
    Mutator::append(program, first_module, var);
    var
}

fn retarget_other_environ_vars(program: &mut Program, canonical: ChunkId) {
    for module in program.modules() {
        for &var in program.children(module).to_vec().iter() {
            if var == canonical {
                continue;
            }
            let is_environ = matches!(
                &program.get(var).kind,
                ChunkKind::DataVariable { name, .. } if ENVIRON_NAMES.contains(&name.as_str())
            );
            if !is_environ {
                continue;
            }
            if let ChunkKind::DataVariable { link, .. } = &mut program.get_mut(var).kind {
                *link = Some(Link::Normal {
                    target: canonical,
                    scope: LinkScope::Internal,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_canonical_environ_when_absent() {
        let mut program = Program::new();
        let module = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m".into() },
            Position::absolute(0),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), module);

        run(&mut program);

        let found = program.children(module).iter().any(|&c| {
            matches!(&program.get(c).kind, ChunkKind::DataVariable { name, .. } if name == "environ")
        });
        assert!(found);
    }

    #[test]
    fn retargets_duplicate_environ_variables() {
        let mut program = Program::new();
        let m1 = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m1".into() },
            Position::absolute(0),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), m1);
        let m2 = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m2".into() },
            Position::absolute(0x1000),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), m2);

        let canonical = program.alloc(Chunk::new(
            ChunkKind::DataVariable {
                name: "environ".into(),
                link: None,
            },
            Position::offset(),
            Size::Fixed(8),
        ));
        Mutator::append(&mut program, m1, canonical);
        let dup = program.alloc(Chunk::new(
            ChunkKind::DataVariable {
                name: "__environ".into(),
                link: None,
            },
            Position::offset(),
            Size::Fixed(8),
        ));
        Mutator::append(&mut program, m2, dup);

        run(&mut program);

        match &program.get(dup).kind {
            ChunkKind::DataVariable { link, .. } => {
                assert!(matches!(link, Some(Link::Normal { target, .. }) if *target == canonical));
            }
            _ => unreachable!(),
        }
    }
}

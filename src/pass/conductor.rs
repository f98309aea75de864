//! The Conductor (spec.md §2, §4.4): invokes passes in the fixed order
//! spec.md §4.4 specifies, and only that order — reordering is not
//! permitted. This is the only place that sequences passes; individual
//! pass modules have no knowledge of what runs before or after them.

use crate::arch::Arch;
use crate::error::RewriteResult;
use crate::ir::program::Program;
use crate::pass::{collapse_plt, external_symbol_links, fix_environ, ifunc_plt, ldso_refs, promote_jumps};
use crate::OutputMode;

/// Extra data the conductor needs that isn't itself IR: which symbols are
/// shared-library-provided (for `LdsoRefsPass`) and which are GNU-IFUNCs
/// (for `IFuncPLTs`). Supplied by the ingestion stage, an external
/// collaborator per spec.md §1.
#[derive(Debug, Clone, Default)]
pub struct ConductorContext {
    pub shared_library_symbols: Vec<String>,
    pub ifunc_symbols: Vec<String>,
}

/// Runs the fixed pipeline from spec.md §4.4 for `mode`.
pub fn run(program: &mut Program, mode: OutputMode) -> RewriteResult<()> {
    run_with_context(program, mode, Arch::X86_64, &ConductorContext::default())
}

pub fn run_with_context(
    program: &mut Program,
    mode: OutputMode,
    arch: Arch,
    ctx: &ConductorContext,
) -> RewriteResult<()> {
    if mode == OutputMode::Union {
        fix_environ::run(program);
    }

    collapse_plt::run(program);
    promote_jumps::run(program, arch)?;

    let is_shared = |s: &str| ctx.shared_library_symbols.iter().any(|x| x == s);
    ldso_refs::run(program, &is_shared);
    external_symbol_links::run(program);
    ifunc_plt::run(program, &ctx.ifunc_symbols);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::chunk::{Chunk, ChunkKind, Size};
    use crate::mutate::Mutator;
    use crate::position::Position;

    #[test]
    fn mirror_mode_skips_fix_environ() {
        let mut program = Program::new();
        let module = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m".into() },
            Position::absolute(0),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), module);

        run(&mut program, OutputMode::Mirror).unwrap();

        let has_environ = program.children(module).iter().any(|&c| {
            matches!(&program.get(c).kind, ChunkKind::DataVariable { name, .. } if name == "environ")
        });
        assert!(!has_environ, "mirror mode must not run FixEnvironPass");
    }

    #[test]
    fn union_mode_runs_fix_environ() {
        let mut program = Program::new();
        let module = program.alloc(Chunk::new(
            ChunkKind::Module { name: "m".into() },
            Position::absolute(0),
            Size::SumOfChildren,
        ));
        Mutator::append(&mut program, program.root(), module);

        run(&mut program, OutputMode::Union).unwrap();

        let has_environ = program.children(module).iter().any(|&c| {
            matches!(&program.get(c).kind, ChunkKind::DataVariable { name, .. } if name == "environ")
        });
        assert!(has_environ, "union mode must run FixEnvironPass");
    }
}

//! Deferred field resolution (spec.md §4.5, C6): synthesized ELF structures
//! reference each other (a relocation's symbol index, a dynamic section's
//! string-table offset, a program header's `p_vaddr`) before those targets
//! have committed the values being referenced. `concretedeferred.cpp` solves
//! this with a `Deferred<T>` base class whose finalizer runs once the rest
//! of the section graph is laid out; we model the same thing with a plain
//! `RefCell<T>` record plus a list of finalizer closures, run to a fixed
//! point by [`resolve_to_fixed_point`].
//!
//! Two kinds of field populate a record: *structural* fields (section
//! index, file offset, virtual address, size) are cheap and acyclic, so
//! [`crate::gen::section::SectionTable`] commits them directly with no
//! finalizer machinery at all. *Content* fields (a relocation's symbol
//! index, a dynamic entry's string offset) depend on another content
//! object having already resolved, so those go through finalizers here.

use std::cell::{Ref, RefCell};

use crate::error::RewriteResult;
use crate::gen::error::ResolveError;
use crate::gen::section::SectionTable;
use crate::gen::symtab::SymbolTableContent;

/// Spec.md §4.5: "a resolve that fails to converge in a small bounded
/// number of passes is a fatal emission error." Our concrete content graph
/// (symtab -> reloc -> dynamic) only ever needs two passes; three leaves
/// headroom without papering over a genuine cycle.
pub const MAX_RESOLVE_PASSES: usize = 3;

/// What a finalizer needs to read from the rest of the section graph.
/// Structural fields (index/offset/addr/size) are always available, since
/// [`SectionTable`] commits them before any content resolution starts;
/// `symtab` becomes available only after the symbol table's own finalizer
/// has run, which is why it is `Option` here.
pub struct ResolveCtx<'a> {
    pub sections: &'a SectionTable,
    pub symtab: Option<&'a SymbolTableContent>,
}

/// A record whose fields are filled in by zero or more finalizer passes.
pub struct Deferred<T> {
    record: RefCell<T>,
    finalizers: RefCell<Vec<Box<dyn Fn(&mut T, &ResolveCtx) -> bool>>>,
}

impl<T> Deferred<T> {
    pub fn new(initial: T) -> Self {
        Self {
            record: RefCell::new(initial),
            finalizers: RefCell::new(Vec::new()),
        }
    }

    /// Registers a finalizer. It must return `true` if it changed the
    /// record this call, `false` if the record was already up to date —
    /// that's the signal [`resolve_to_fixed_point`] uses to detect
    /// convergence.
    pub fn add_finalizer(&self, f: impl Fn(&mut T, &ResolveCtx) -> bool + 'static) {
        self.finalizers.borrow_mut().push(Box::new(f));
    }

    pub fn get(&self) -> Ref<'_, T> {
        self.record.borrow()
    }

    pub fn into_inner(self) -> T {
        self.record.into_inner()
    }
}

/// A type that can run one resolution pass over its deferred content.
pub trait ResolvePass {
    /// Runs every registered finalizer once; returns whether any of them
    /// made progress.
    fn resolve_pass(&self, ctx: &ResolveCtx) -> bool;
}

impl<T> ResolvePass for Deferred<T> {
    fn resolve_pass(&self, ctx: &ResolveCtx) -> bool {
        let mut progressed = false;
        let mut record = self.record.borrow_mut();
        for f in self.finalizers.borrow().iter() {
            if f(&mut record, ctx) {
                progressed = true;
            }
        }
        progressed
    }
}

/// Drives every item to a fixed point, per spec.md §4.5.
pub fn resolve_to_fixed_point(items: &[&dyn ResolvePass], ctx: &ResolveCtx) -> RewriteResult<()> {
    for _ in 0..MAX_RESOLVE_PASSES {
        let mut any = false;
        for item in items {
            if item.resolve_pass(ctx) {
                any = true;
            }
        }
        if !any {
            return Ok(());
        }
    }
    Err(ResolveError::DidNotConverge.into())
}

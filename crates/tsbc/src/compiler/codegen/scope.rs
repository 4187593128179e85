// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lexical scopes and loop contexts for one method.
//!
//! Both live in arenas addressed by small handles. A record points at its
//! parent by handle and is never freed individually; the arenas are
//! dropped together when the method is finished.

use rustc_hash::FxHashMap;

use crate::compiler::emitter::Label;
use crate::types::Ty;

/// A local variable bound to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSlot {
    /// Slot index
    pub index: u16,
    /// Declared type
    pub ty: Ty,
    /// False for `const` bindings
    pub mutable: bool,
}

/// Handle of a scope record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug)]
struct ScopeRecord {
    parent: Option<ScopeId>,
    bindings: FxHashMap<String, LocalSlot>,
    /// First slot this scope may allocate
    base_slot: u32,
}

/// Why a binding could not be declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclareError {
    /// The name is already bound in the current scope
    Redeclared(String),
    /// Every slot index is taken
    OutOfSlots,
}

/// The chain of open scopes.
#[derive(Debug)]
pub struct Scopes {
    records: Vec<ScopeRecord>,
    current: Option<ScopeId>,
    next_slot: u32,
}

impl Scopes {
    /// Creates an empty chain whose first allocatable slot is `first_slot`.
    pub fn new(first_slot: u16) -> Self {
        Self {
            records: Vec::new(),
            current: None,
            next_slot: u32::from(first_slot),
        }
    }

    /// Opens a scope nested in the current one.
    pub fn push(&mut self) -> ScopeId {
        let id = ScopeId(self.records.len() as u32);
        self.records.push(ScopeRecord {
            parent: self.current,
            bindings: FxHashMap::default(),
            base_slot: self.next_slot,
        });
        self.current = Some(id);
        id
    }

    /// Closes the current scope; its slots become free for reuse.
    pub fn pop(&mut self) {
        if let Some(id) = self.current {
            let record = &self.records[id.0 as usize];
            self.next_slot = record.base_slot;
            self.current = record.parent;
        }
    }

    /// Declares a binding in the current scope and assigns it a slot.
    pub fn declare(&mut self, name: &str, ty: Ty, mutable: bool) -> Result<LocalSlot, DeclareError> {
        let Some(id) = self.current else {
            return Err(DeclareError::Redeclared(name.to_string()));
        };
        let record = &mut self.records[id.0 as usize];
        if record.bindings.contains_key(name) {
            return Err(DeclareError::Redeclared(name.to_string()));
        }
        let index = u16::try_from(self.next_slot).map_err(|_| DeclareError::OutOfSlots)?;
        let slot = LocalSlot { index, ty, mutable };
        record.bindings.insert(name.to_string(), slot.clone());
        self.next_slot += 1;
        Ok(slot)
    }

    /// Finds the innermost binding of `name`.
    pub fn resolve(&self, name: &str) -> Option<&LocalSlot> {
        let mut scope = self.current;
        while let Some(id) = scope {
            let record = &self.records[id.0 as usize];
            if let Some(slot) = record.bindings.get(name) {
                return Some(slot);
            }
            scope = record.parent;
        }
        None
    }
}

/// Handle of a loop context record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(u32);

/// Jump targets of an enclosing loop or labeled statement.
#[derive(Debug, Clone)]
pub struct LoopContext {
    /// The statement's label, if any
    pub name: Option<String>,
    /// Where `break` goes
    pub break_label: Label,
    /// Where `continue` goes; `None` for a labeled non-loop statement
    pub continue_label: Option<Label>,
    parent: Option<LoopId>,
}

/// The stack of enclosing breakable statements.
#[derive(Debug, Default)]
pub struct Loops {
    records: Vec<LoopContext>,
    current: Option<LoopId>,
}

impl Loops {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a breakable statement.
    pub fn push(
        &mut self,
        name: Option<String>,
        break_label: Label,
        continue_label: Option<Label>,
    ) -> LoopId {
        let id = LoopId(self.records.len() as u32);
        self.records.push(LoopContext {
            name,
            break_label,
            continue_label,
            parent: self.current,
        });
        self.current = Some(id);
        id
    }

    /// Leaves the innermost breakable statement.
    pub fn pop(&mut self) {
        if let Some(id) = self.current {
            self.current = self.records[id.0 as usize].parent;
        }
    }

    fn enclosing(&self) -> impl Iterator<Item = &LoopContext> {
        let mut next = self.current;
        std::iter::from_fn(move || {
            let id = next?;
            let record = &self.records[id.0 as usize];
            next = record.parent;
            Some(record)
        })
    }

    /// Target of `break` or `break label`.
    ///
    /// An unlabeled break leaves the innermost loop; labeled blocks are
    /// skipped.
    pub fn break_target(&self, label: Option<&str>) -> Option<Label> {
        match label {
            None => self
                .enclosing()
                .find(|ctx| ctx.continue_label.is_some())
                .map(|ctx| ctx.break_label),
            Some(name) => self
                .enclosing()
                .find(|ctx| ctx.name.as_deref() == Some(name))
                .map(|ctx| ctx.break_label),
        }
    }

    /// Target of `continue` or `continue label`.
    ///
    /// A label naming a non-loop statement has no continue target.
    pub fn continue_target(&self, label: Option<&str>) -> Option<Label> {
        match label {
            None => self.enclosing().find_map(|ctx| ctx.continue_label),
            Some(name) => self
                .enclosing()
                .find(|ctx| ctx.name.as_deref() == Some(name))
                .and_then(|ctx| ctx.continue_label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::emitter::Emitter;
    use crate::options::CompilerOptions;

    #[test]
    fn test_declare_and_resolve() {
        let mut scopes = Scopes::new(1);
        scopes.push();
        let x = scopes.declare("x", Ty::INT, true).unwrap();
        assert_eq!(x.index, 1);
        assert_eq!(scopes.resolve("x"), Some(&x));
        assert_eq!(scopes.resolve("y"), None);
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut scopes = Scopes::new(0);
        scopes.push();
        scopes.declare("x", Ty::INT, true).unwrap();
        assert_eq!(
            scopes.declare("x", Ty::LONG, true),
            Err(DeclareError::Redeclared("x".to_string()))
        );
    }

    #[test]
    fn test_shadowing_leaves_outer_binding() {
        let mut scopes = Scopes::new(0);
        scopes.push();
        scopes.declare("x", Ty::INT, true).unwrap();
        scopes.push();
        let inner = scopes.declare("x", Ty::LONG, false).unwrap();
        assert_eq!(scopes.resolve("x"), Some(&inner));
        scopes.pop();
        let outer = scopes.resolve("x").unwrap();
        assert_eq!(outer.ty, Ty::INT);
        assert_eq!(outer.index, 0);
    }

    #[test]
    fn test_slots_are_reused_after_close() {
        let mut scopes = Scopes::new(0);
        scopes.push();
        scopes.declare("a", Ty::INT, true).unwrap();
        scopes.push();
        assert_eq!(scopes.declare("b", Ty::INT, true).unwrap().index, 1);
        assert_eq!(scopes.declare("c", Ty::INT, true).unwrap().index, 2);
        scopes.pop();
        scopes.push();
        // Reuses b's slot, never a's.
        assert_eq!(scopes.declare("d", Ty::INT, true).unwrap().index, 1);
    }

    #[test]
    fn test_slot_indices_do_not_wrap() {
        let mut scopes = Scopes::new(u16::MAX - 1);
        scopes.push();
        assert_eq!(scopes.declare("a", Ty::INT, true).unwrap().index, u16::MAX - 1);
        scopes.push();
        assert_eq!(scopes.declare("b", Ty::INT, true).unwrap().index, u16::MAX);
        assert_eq!(scopes.declare("c", Ty::INT, true), Err(DeclareError::OutOfSlots));
        scopes.pop();
        // Closing the full scope frees its slot again.
        scopes.push();
        assert_eq!(scopes.declare("d", Ty::INT, true).unwrap().index, u16::MAX);
    }

    #[test]
    fn test_loop_targets() {
        let mut em = Emitter::new(&CompilerOptions::default());
        let (outer_break, outer_continue) = (em.new_label(), em.new_label());
        let (block_break, inner_break, inner_continue) =
            (em.new_label(), em.new_label(), em.new_label());

        let mut loops = Loops::new();
        assert_eq!(loops.break_target(None), None);

        loops.push(Some("outer".into()), outer_break, Some(outer_continue));
        loops.push(Some("block".into()), block_break, None);
        loops.push(None, inner_break, Some(inner_continue));

        assert_eq!(loops.break_target(None), Some(inner_break));
        assert_eq!(loops.continue_target(None), Some(inner_continue));
        assert_eq!(loops.break_target(Some("outer")), Some(outer_break));
        assert_eq!(loops.continue_target(Some("outer")), Some(outer_continue));
        assert_eq!(loops.break_target(Some("block")), Some(block_break));
        assert_eq!(loops.continue_target(Some("block")), None);
        assert_eq!(loops.break_target(Some("missing")), None);

        loops.pop();
        // Only the labeled block and the outer loop remain.
        assert_eq!(loops.break_target(None), Some(outer_break));
    }
}

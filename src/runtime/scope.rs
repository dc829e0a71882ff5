//! Variable scopes and statement-position bookkeeping
//!
//! A task keeps a snapshot of its private [`Scope`] between steps and a
//! [`StatementPositions`] table recording where each nested statement list
//! should resume.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::frontend::ast::Stmt;
use crate::runtime::value::Value;

/// Identity of a scope, assigned when it is first pushed.
///
/// A task's private scope keeps its identity across steps, so a binding
/// can be traced back to the frame that owns it whether that frame is on
/// the stack or saved in the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u64);

/// A single variable scope
#[derive(Debug, Clone, Default)]
pub struct Scope {
    id: Option<ScopeId>,
    /// Bindings in definition order. Dotted names (`self.count`) are stored
    /// flattened next to the aggregate they belong to.
    pub variables: IndexMap<String, Value>,
}

impl PartialEq for Scope {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.variables == other.variables
    }
}

impl Scope {
    /// Create an empty scope
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity, once the scope has been pushed
    #[inline]
    pub fn id(&self) -> Option<ScopeId> {
        self.id
    }

    /// Overwrite a binding only if this scope already holds it
    pub fn assign_existing(
        &mut self,
        name: &str,
        value: Value,
    ) -> bool {
        match self.variables.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Look up a binding
    #[inline]
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Look up a binding mutably
    #[inline]
    pub fn get_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut Value> {
        self.variables.get_mut(name)
    }

    /// Define or overwrite a binding
    #[inline]
    pub fn define(
        &mut self,
        name: impl Into<String>,
        value: Value,
    ) {
        self.variables.insert(name.into(), value);
    }

    /// Whether the binding exists in this scope
    #[inline]
    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.variables.contains_key(name)
    }

    /// Remove a binding
    pub fn remove(
        &mut self,
        name: &str,
    ) -> Option<Value> {
        self.variables.shift_remove(name)
    }

    /// Iterate bindings in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.variables.iter()
    }

    /// Number of bindings
    #[inline]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether the scope has no bindings
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Stack of scopes, innermost last
#[derive(Debug, Clone)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
    next_id: u64,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    /// Create a stack holding one global scope
    pub fn new() -> Self {
        let mut stack = Self {
            scopes: Vec::new(),
            next_id: 0,
        };
        stack.push();
        stack
    }

    /// Push a fresh scope
    #[inline]
    pub fn push(&mut self) {
        self.push_scope(Scope::new());
    }

    /// Push a prepared scope
    #[inline]
    pub fn push_scope(
        &mut self,
        mut scope: Scope,
    ) {
        if scope.id.is_none() {
            scope.id = Some(ScopeId(self.next_id));
            self.next_id += 1;
        }
        self.scopes.push(scope);
    }

    /// Pop the innermost scope. The global scope is never popped.
    pub fn pop(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Number of scopes on the stack
    #[inline]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Pop scopes until `depth` remain
    pub fn truncate(
        &mut self,
        depth: usize,
    ) {
        self.scopes.truncate(depth.max(1));
    }

    /// Scope at a given index (0 is global)
    #[inline]
    pub fn at(
        &self,
        index: usize,
    ) -> Option<&Scope> {
        self.scopes.get(index)
    }

    /// Outermost (global) scope, mutably
    pub fn global_mut(&mut self) -> &mut Scope {
        &mut self.scopes[0]
    }

    /// Innermost scope
    pub fn current(&self) -> &Scope {
        // The global scope is never popped, so the stack is never empty.
        &self.scopes[self.scopes.len() - 1]
    }

    /// Innermost scope, mutably
    pub fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Identity of the innermost scope
    pub fn current_id(&self) -> Option<ScopeId> {
        self.current().id
    }

    /// Identity of the innermost scope that binds `name`
    pub fn frame_of(
        &self,
        name: &str,
    ) -> Option<ScopeId> {
        self.scopes.iter().rev().find(|s| s.contains(name)).and_then(|s| s.id)
    }

    /// The scope with identity `id`, if it is on the stack
    pub fn frame_mut(
        &mut self,
        id: ScopeId,
    ) -> Option<&mut Scope> {
        self.scopes.iter_mut().rev().find(|s| s.id == Some(id))
    }

    /// Resolve a name from the innermost scope outward
    pub fn lookup(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Resolve a name mutably from the innermost scope outward
    pub fn lookup_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut Value> {
        self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name))
    }

    /// Overwrite an existing binding wherever it lives. Returns false when
    /// the name is not bound anywhere.
    pub fn assign_existing(
        &mut self,
        name: &str,
        value: Value,
    ) -> bool {
        match self.lookup_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Define in the innermost scope
    #[inline]
    pub fn define(
        &mut self,
        name: impl Into<String>,
        value: Value,
    ) {
        self.current_mut().define(name, value);
    }
}

/// Identity of a statement list inside a function body
pub type PositionKey = usize;

/// Resume index per statement list.
///
/// Keys are the addresses of the statement slices, which stay put because
/// function bodies live behind an `Arc` for the whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementPositions {
    positions: HashMap<PositionKey, usize>,
    /// `for` loops whose initializer already ran, keyed by body
    entered: HashSet<PositionKey>,
}

impl StatementPositions {
    /// Create an empty table
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of a statement list
    #[inline]
    pub fn key_of(stmts: &[Stmt]) -> PositionKey {
        stmts.as_ptr() as PositionKey
    }

    /// Saved resume index for a list
    #[inline]
    pub fn get(
        &self,
        key: PositionKey,
    ) -> Option<usize> {
        self.positions.get(&key).copied()
    }

    /// Record the resume index for a list
    #[inline]
    pub fn set(
        &mut self,
        key: PositionKey,
        index: usize,
    ) {
        self.positions.insert(key, index);
    }

    /// Forget a list's resume index
    #[inline]
    pub fn clear(
        &mut self,
        key: PositionKey,
    ) {
        self.positions.remove(&key);
    }

    /// Mark a `for` loop as past its initializer
    #[inline]
    pub fn enter_loop(
        &mut self,
        key: PositionKey,
    ) {
        self.entered.insert(key);
    }

    #[inline]
    pub fn loop_entered(
        &self,
        key: PositionKey,
    ) -> bool {
        self.entered.contains(&key)
    }

    #[inline]
    pub fn exit_loop(
        &mut self,
        key: PositionKey,
    ) {
        self.entered.remove(&key);
    }

    /// Number of lists with a saved position
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether nothing is saved
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.entered.is_empty()
    }
}

use std::collections::HashMap;

use crate::token::Span;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    Global,
    Parameter,
    Function,
    EnumConstant(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub storage: StorageKind,
    /// 0 for file scope, 1 for parameters, deeper for nested blocks.
    pub depth: u32,
    pub declared_at: Span,
    pub scope: ScopeId,
    /// Definition seen (function body, initialized or non-extern object).
    pub is_defined: bool,
    /// `static` at block scope or internal linkage at file scope.
    pub is_static: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub depth: u32,
    pub names: HashMap<String, SymbolId>,
}

/// Symbols live forever in `symbols`; scopes form a stack stored as an arena
/// whose top is the current scope. Leaving a scope truncates the arena.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            scopes: vec![Scope::default()],
        }
    }

    pub fn current_scope(&self) -> ScopeId {
        ScopeId((self.scopes.len() - 1) as u32)
    }

    pub fn depth(&self) -> u32 {
        self.scopes.last().map_or(0, |s| s.depth)
    }

    pub fn push_scope(&mut self) -> ScopeId {
        let parent = self.current_scope();
        let depth = self.depth() + 1;
        self.scopes.push(Scope {
            parent: Some(parent),
            depth,
            names: HashMap::new(),
        });
        self.current_scope()
    }

    /// Leaves the current scope. The root scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            let len = self.scopes.len() - 1;
            self.scopes.truncate(len);
        }
    }

    /// Adds a symbol and binds its name in the current scope.
    pub fn declare(&mut self, mut symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        let scope = self.current_scope();
        symbol.scope = scope;
        symbol.depth = self.depth();
        self.scopes[scope.index()].names.insert(symbol.name.clone(), id);
        self.symbols.push(symbol);
        id
    }

    /// Binds `name` in the current scope to an existing symbol.
    pub fn bind(&mut self, name: &str, id: SymbolId) {
        let scope = self.current_scope();
        self.scopes[scope.index()].names.insert(name.to_string(), id);
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut scope = Some(self.current_scope());
        while let Some(id) = scope {
            let s = &self.scopes[id.index()];
            if let Some(&sym) = s.names.get(name) {
                return Some(sym);
            }
            scope = s.parent;
        }
        None
    }

    pub fn lookup_in_current(&self, name: &str) -> Option<SymbolId> {
        self.scopes.last().and_then(|s| s.names.get(name).copied())
    }

    pub fn lookup_global(&self, name: &str) -> Option<SymbolId> {
        self.scopes[ScopeId::ROOT.index()].names.get(name).copied()
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId(i as u32), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn local(name: &str) -> Symbol {
        Symbol {
            name: name.into(),
            ty: Type::Int,
            storage: StorageKind::Local,
            depth: 0,
            declared_at: Span::default(),
            scope: ScopeId::ROOT,
            is_defined: true,
            is_static: false,
        }
    }

    #[test]
    fn inner_scope_shadows_and_pop_restores() {
        let mut table = SymbolTable::new();
        let outer = table.declare(local("x"));
        table.push_scope();
        let inner = table.declare(local("x"));
        assert_eq!(table.lookup("x"), Some(inner));
        assert_eq!(table.get(inner).depth, 1);
        table.pop_scope();
        assert_eq!(table.lookup("x"), Some(outer));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn lookup_in_current_ignores_parents() {
        let mut table = SymbolTable::new();
        table.declare(local("g"));
        table.push_scope();
        assert!(table.lookup_in_current("g").is_none());
        assert!(table.lookup("g").is_some());
    }

    #[test]
    fn root_scope_survives_extra_pops() {
        let mut table = SymbolTable::new();
        table.pop_scope();
        assert_eq!(table.current_scope(), ScopeId::ROOT);
        assert_eq!(table.depth(), 0);
    }
}

use std::collections::{HashMap, HashSet};

use model::{
    ConstEnv, DiagnosticKind, Diagnostics, ExternalDecl, FunctionType, RecordLayout, Span, StorageKind, Symbol, SymbolId,
    SymbolTable, TranslationUnit, Type, TypeTable,
};
use tracing::trace;

use crate::declarations::DeclarationResolver;

/// What the body walker needs to know about the enclosing function.
#[derive(Debug, Clone)]
pub(crate) struct FunctionContext {
    pub name: String,
    pub ret: Type,
}

/// One `switch` being resolved: its promoted controlling type and the labels seen.
#[derive(Debug, Clone)]
pub(crate) struct SwitchContext {
    pub ty: Type,
    pub cases: Vec<(i64, Span)>,
    pub default: Option<Span>,
}

/// Scopes, symbols and types for one translation unit.
pub(crate) struct Resolver<'a> {
    pub(crate) diags: &'a mut Diagnostics,
    pub(crate) symbols: SymbolTable,
    pub(crate) types: TypeTable,
    pub(crate) function: Option<FunctionContext>,
    pub(crate) loop_depth: usize,
    pub(crate) switches: Vec<SwitchContext>,
    /// File-scope objects whose definition carried an initializer.
    pub(crate) initialized: HashSet<SymbolId>,
    /// Record tags declared in each open block scope, mapped to the key their
    /// layout lives under. File-scope tags are their own key.
    pub(crate) tag_scopes: Vec<HashMap<String, String>>,
}

impl<'a> Resolver<'a> {
    pub fn new(types: TypeTable, diags: &'a mut Diagnostics) -> Self {
        Self {
            diags,
            symbols: SymbolTable::new(),
            types,
            function: None,
            loop_depth: 0,
            switches: Vec::new(),
            initialized: HashSet::new(),
            tag_scopes: Vec::new(),
        }
    }

    /// Pass 1 registers every file-scope name; pass 2 resolves initializers
    /// and function bodies against the complete file scope.
    pub fn run(&mut self, unit: &mut TranslationUnit) {
        for item in unit.items.iter_mut() {
            match item {
                ExternalDecl::Declaration(decl) => self.register_file_declaration(decl),
                ExternalDecl::Function(func) => self.register_function(func),
            }
        }
        trace!(symbols = self.symbols.len(), "registered file scope");

        for item in unit.items.iter_mut() {
            match item {
                ExternalDecl::Declaration(decl) => self.resolve_file_initializers(decl),
                ExternalDecl::Function(func) => self.resolve_function_body(func),
            }
        }
    }

    // ─── Diagnostics ────────────────────────────────────────────

    pub(crate) fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diags.error(DiagnosticKind::Semantic, span, message);
    }

    pub(crate) fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.diags.warning(DiagnosticKind::Semantic, span, message);
    }

    // ─── Scopes and symbols ─────────────────────────────────────

    pub(crate) fn enter_scope(&mut self) {
        self.symbols.push_scope();
        self.tag_scopes.push(HashMap::new());
    }

    pub(crate) fn exit_scope(&mut self) {
        self.symbols.pop_scope();
        self.tag_scopes.pop();
    }

    pub(crate) fn new_symbol(&mut self, name: &str, ty: Type, storage: StorageKind, span: Span) -> SymbolId {
        self.symbols.declare(Symbol {
            name: name.to_string(),
            ty,
            storage,
            depth: 0,
            declared_at: span,
            scope: model::ScopeId::ROOT,
            is_defined: false,
            is_static: false,
        })
    }

    // ─── Types ──────────────────────────────────────────────────

    pub(crate) fn canonical(&self, ty: &Type) -> Type {
        self.types.canonical(ty)
    }

    /// Declares `tag` in the innermost block scope and returns its layout key.
    /// A tag that already names a layout elsewhere in the unit gets a fresh
    /// `tag_N` key so both records survive to code generation.
    pub(crate) fn declare_block_tag(&mut self, tag: &str) -> String {
        if let Some(key) = self.tag_scopes.last().and_then(|scope| scope.get(tag)) {
            return key.clone();
        }
        let mut key = tag.to_string();
        let mut n = 0;
        while self.types.record(&key).is_some() {
            n += 1;
            key = format!("{tag}_{n}");
        }
        if let Some(scope) = self.tag_scopes.last_mut() {
            scope.insert(tag.to_string(), key.clone());
        }
        key
    }

    /// The layout key `tag` refers to from the current scope.
    pub(crate) fn visible_tag_key(&self, tag: &str) -> String {
        let key = self.tag_scopes.iter().rev().find_map(|scope| scope.get(tag));
        key.cloned().unwrap_or_else(|| tag.to_string())
    }

    /// Rewrites record tags in `ty` to the keys of the block-scope
    /// declarations currently visible.
    pub(crate) fn scoped_type(&self, ty: &Type) -> Type {
        if self.tag_scopes.iter().all(HashMap::is_empty) {
            return ty.clone();
        }
        match ty {
            Type::Pointer(inner) => self.scoped_type(inner).pointer_to(),
            Type::Array(inner, len) => Type::Array(Box::new(self.scoped_type(inner)), *len),
            Type::Function(func) => Type::Function(FunctionType {
                ret: Box::new(self.scoped_type(&func.ret)),
                params: func.params.iter().map(|p| self.scoped_type(p)).collect(),
                variadic: func.variadic,
            }),
            Type::Record(kind, tag) => Type::Record(*kind, self.visible_tag_key(tag)),
            other => other.clone(),
        }
    }

    /// Registers forward references to records (`struct S *p;`) so every
    /// record type named in the unit has a layout, complete or not.
    pub(crate) fn note_records(&mut self, ty: &Type) {
        match ty {
            Type::Pointer(inner) | Type::Array(inner, _) => self.note_records(inner),
            Type::Function(func) => {
                self.note_records(&func.ret);
                for param in &func.params {
                    self.note_records(param);
                }
            }
            Type::Record(kind, tag) if self.types.record(tag).is_none() => {
                self.types.insert_record(RecordLayout {
                    kind: *kind,
                    tag: tag.clone(),
                    fields: None,
                    declared_at: Span::default(),
                });
            }
            _ => {}
        }
    }

    /// Complete object type check used for definitions and `sizeof`.
    pub(crate) fn is_complete(&self, ty: &Type) -> bool {
        self.types.is_complete(ty)
    }

    /// Objects must fit in an `isize`, for C and for Rust arrays alike.
    /// Returns false after reporting a type that does not.
    pub(crate) fn check_object_size(&mut self, ty: &Type, span: Span) -> bool {
        let ty = self.canonical(ty);
        if ty.is_error() || !self.is_complete(&ty) {
            return true;
        }
        if self.types.size_of(&ty).is_some_and(|size| i64::try_from(size).is_ok()) {
            return true;
        }
        if matches!(ty, Type::Array(..)) {
            self.error(span, "array is too large");
        } else {
            self.error(span, format!("type '{ty}' is too large"));
        }
        false
    }
}

impl ConstEnv for Resolver<'_> {
    fn enum_constant(&self, name: &str) -> Option<i64> {
        let id = self.symbols.lookup(name)?;
        match self.symbols.get(id).storage {
            StorageKind::EnumConstant(value) => Some(value),
            _ => None,
        }
    }

    fn size_of(&self, ty: &Type) -> Option<u64> {
        self.types.size_of(ty)
    }

    fn canonical(&self, ty: &Type) -> Type {
        self.types.canonical(ty)
    }
}

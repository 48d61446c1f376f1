use model::{
    Declaration, EnumDef, FunctionDef, InitDeclarator, RecordDef, RecordField, RecordKind, RecordLayout, Span, StorageClass,
    StorageKind, SymbolId, Type, const_eval,
};
use tracing::trace;

use crate::initializers::InitializerResolver;
use crate::resolver::{FunctionContext, Resolver};
use crate::statements::StatementResolver;

/// Declaration handling: file-scope registration (pass 1), initializers and
/// bodies (pass 2), and block-scope declarations.
pub(crate) trait DeclarationResolver {
    fn register_file_declaration(&mut self, decl: &mut Declaration);
    fn register_function(&mut self, func: &mut FunctionDef);
    fn resolve_file_initializers(&mut self, decl: &mut Declaration);
    fn resolve_function_body(&mut self, func: &mut FunctionDef);
    fn resolve_local_declaration(&mut self, decl: &mut Declaration);
}

impl DeclarationResolver for Resolver<'_> {
    fn register_file_declaration(&mut self, decl: &mut Declaration) {
        self.define_records(&decl.records);
        self.define_enums(&mut decl.enums);
        // `struct node;` still introduces the tag.
        self.note_records(&decl.base);
        for declarator in decl.declarators.iter_mut() {
            self.note_records(&declarator.ty);
            self.check_object_size(&declarator.ty, declarator.span);
            if decl.storage == StorageClass::Typedef {
                self.define_typedef(declarator);
                continue;
            }
            let ty = self.canonical(&declarator.ty);
            if ty.is_function() {
                if declarator.init.is_some() {
                    self.error(declarator.span, format!("illegal initializer for function '{}'", declarator.name));
                }
                let id = self.declare_function(&declarator.name, declarator.ty.clone(), declarator.span, false, decl.storage);
                declarator.symbol = id;
                continue;
            }
            if matches!(decl.storage, StorageClass::Auto | StorageClass::Register) {
                self.error(declarator.span, "illegal storage class on file-scoped variable");
            }
            declarator.symbol = self.declare_global(declarator, decl.storage);
        }
    }

    fn register_function(&mut self, func: &mut FunctionDef) {
        let ty = Type::Function(func.ty.clone());
        self.note_records(&ty);
        if func.ty.variadic {
            self.error(func.span, format!("variadic function definitions are not supported ('{}')", func.name));
        }
        func.symbol = self.declare_function(&func.name, ty, func.span, true, func.storage);
    }

    fn resolve_file_initializers(&mut self, decl: &mut Declaration) {
        if decl.storage == StorageClass::Typedef {
            return;
        }
        for declarator in decl.declarators.iter_mut() {
            let Some(id) = declarator.symbol else {
                continue;
            };
            if self.symbols.get(id).storage != StorageKind::Global {
                continue;
            }
            self.resolve_object_initializer(declarator, id, true);
            if decl.storage != StorageClass::Extern {
                self.check_definition_type(declarator, id, true);
            }
        }
    }

    fn resolve_function_body(&mut self, func: &mut FunctionDef) {
        let ret = self.canonical(&func.ty.ret);
        if !ret.is_void() && !ret.is_error() && !self.is_complete(&ret) {
            self.error(func.span, format!("incomplete result type '{ret}' in function definition"));
        }
        self.function = Some(FunctionContext {
            name: func.name.clone(),
            ret,
        });
        self.loop_depth = 0;
        self.switches.clear();

        // Parameters and the outermost block of the body share one scope.
        self.enter_scope();
        for param in func.params.iter_mut() {
            let Some(name) = param.name.clone() else {
                continue;
            };
            if self.symbols.lookup_in_current(&name).is_some() {
                self.error(param.span, format!("redefinition of parameter '{name}'"));
            }
            let ty = self.canonical(&param.ty);
            if !ty.is_error() && !self.is_complete(&ty) {
                self.error(param.span, format!("parameter '{name}' has incomplete type '{ty}'"));
            }
            let id = self.new_symbol(&name, param.ty.clone(), StorageKind::Parameter, param.span);
            self.symbols.get_mut(id).is_defined = true;
            param.symbol = Some(id);
        }
        self.resolve_block_items(&mut func.body.items);
        self.exit_scope();

        trace!(function = %func.name, "resolved function body");
        self.function = None;
    }

    fn resolve_local_declaration(&mut self, decl: &mut Declaration) {
        self.define_records(&decl.records);
        self.define_enums(&mut decl.enums);
        if decl.declarators.is_empty() && decl.records.is_empty() {
            if let Type::Record(kind, tag) = &decl.base {
                self.declare_incomplete_record(*kind, tag);
            }
        }
        for declarator in decl.declarators.iter_mut() {
            declarator.ty = self.scoped_type(&declarator.ty);
            self.note_records(&declarator.ty);
            self.check_object_size(&declarator.ty, declarator.span);
            match decl.storage {
                StorageClass::Typedef => self.define_typedef(declarator),
                _ if self.canonical(&declarator.ty).is_function() => self.declare_block_function(declarator),
                StorageClass::Extern => self.declare_block_extern(declarator),
                StorageClass::Static => {
                    let id = self.declare_block_object(declarator, StorageKind::Global);
                    let symbol = self.symbols.get_mut(id);
                    symbol.is_static = true;
                    symbol.is_defined = true;
                    self.resolve_object_initializer(declarator, id, true);
                    self.check_definition_type(declarator, id, false);
                }
                StorageClass::None | StorageClass::Auto | StorageClass::Register => {
                    let id = self.declare_block_object(declarator, StorageKind::Local);
                    self.symbols.get_mut(id).is_defined = true;
                    self.resolve_object_initializer(declarator, id, false);
                    self.check_definition_type(declarator, id, false);
                }
            }
        }
    }
}

impl Resolver<'_> {
    // ─── Records, enums and typedefs ────────────────────────────

    fn define_records(&mut self, records: &[RecordDef]) {
        for def in records {
            self.define_record(def);
        }
    }

    /// A tag-only declaration in a block hides any outer record of that tag.
    fn declare_incomplete_record(&mut self, kind: RecordKind, tag: &str) {
        let key = self.declare_block_tag(tag);
        if self.types.record(&key).is_none() {
            self.types.insert_record(RecordLayout {
                kind,
                tag: key,
                fields: None,
                declared_at: Span::default(),
            });
        }
    }

    /// A definition in a block completes a visible forward reference and
    /// otherwise declares the tag anew in that block.
    fn block_record_key(&mut self, tag: &str) -> String {
        let visible = self.visible_tag_key(tag);
        if self.types.record(&visible).is_some_and(|layout| !layout.is_complete()) {
            return visible;
        }
        self.declare_block_tag(tag)
    }

    fn define_record(&mut self, def: &RecordDef) {
        let key = if self.tag_scopes.is_empty() {
            def.tag.clone()
        } else {
            self.block_record_key(&def.tag)
        };
        let mut fields = Vec::with_capacity(def.fields.len());
        let mut ok = true;
        for field in &def.fields {
            let field_ty = self.scoped_type(&field.ty);
            self.note_records(&field_ty);
            if fields.iter().any(|f: &RecordField| f.name == field.name) {
                self.error(field.span, format!("duplicate member '{}'", field.name));
                ok = false;
                continue;
            }
            let ty = self.canonical(&field_ty);
            if ty.is_error() {
                ok = false;
            } else if !self.is_complete(&ty) {
                self.error(field.span, format!("field '{}' has incomplete type '{ty}'", field.name));
                ok = false;
            } else if !self.check_object_size(&ty, field.span) {
                ok = false;
            }
            fields.push(RecordField {
                name: field.name.clone(),
                ty: field_ty,
            });
        }
        if !ok {
            // Keep the record usable so later uses do not cascade.
            fields.retain(|f| self.is_complete(&f.ty));
        }

        match self.types.record(&key).cloned() {
            Some(existing) if existing.kind != def.kind => {
                self.error(
                    def.span,
                    format!("use of '{}' with tag type that does not match previous declaration", def.tag),
                );
            }
            Some(existing) if existing.is_complete() => {
                let same = existing.fields.as_ref().is_some_and(|old| {
                    old.len() == fields.len()
                        && old
                            .iter()
                            .zip(&fields)
                            .all(|(a, b)| a.name == b.name && self.types.compatible(&a.ty, &b.ty))
                });
                if !same {
                    self.error(def.span, format!("redefinition of '{} {}'", def.kind, def.tag));
                }
            }
            Some(_) => {
                if let Some(layout) = self.types.record_mut(&key) {
                    layout.fields = Some(fields);
                    layout.declared_at = def.span;
                }
            }
            None => {
                self.types.insert_record(RecordLayout {
                    kind: def.kind,
                    tag: key,
                    fields: Some(fields),
                    declared_at: def.span,
                });
            }
        }
    }

    fn define_enums(&mut self, enums: &mut [EnumDef]) {
        for def in enums.iter_mut() {
            let mut next = 0i64;
            for variant in def.variants.iter_mut() {
                if let Some(expr) = variant.value.as_mut() {
                    self.value(expr);
                    match const_eval(expr, &*self) {
                        Some(v) if expr.ty.is_integer() => next = v,
                        _ if expr.ty.is_error() => {}
                        _ => self.error(expr.span, "expression is not an integer constant expression"),
                    }
                }
                if next < i64::from(i32::MIN) || next > i64::from(i32::MAX) {
                    self.warning(variant.span, format!("enumerator value {next} is not representable in 'int'"));
                }
                if let Some(existing) = self.symbols.lookup_in_current(&variant.name) {
                    let what = self.describe_symbol(existing);
                    self.error(variant.span, format!("redefinition of '{}' (previously declared as {what})", variant.name));
                }
                let id = self.new_symbol(
                    &variant.name,
                    Type::Enum(def.tag.clone()),
                    StorageKind::EnumConstant(next),
                    variant.span,
                );
                self.symbols.get_mut(id).is_defined = true;
                variant.symbol = Some(id);
                next = next.wrapping_add(1);
            }
        }
    }

    fn define_typedef(&mut self, declarator: &mut InitDeclarator) {
        let name = declarator.name.clone();
        if let Some(existing) = self.symbols.lookup_in_current(&name) {
            let what = self.describe_symbol(existing);
            self.error(declarator.span, format!("redefinition of '{name}' as a typedef (previously declared as {what})"));
            return;
        }
        let new_ty = self.canonical(&declarator.ty);
        if let Some(old) = self.types.typedef(&name).cloned() {
            let old_ty = self.canonical(&old);
            // A typedef naming its own record (`typedef struct S S;`) is fine.
            if old_ty != new_ty && !old_ty.is_error() && !new_ty.is_error() {
                self.error(
                    declarator.span,
                    format!("typedef redefinition with different types ('{new_ty}' vs '{old_ty}')"),
                );
            }
            return;
        }
        self.types.insert_typedef(name, declarator.ty.clone());
    }

    fn describe_symbol(&self, id: SymbolId) -> &'static str {
        match self.symbols.get(id).storage {
            StorageKind::Function => "a function",
            StorageKind::EnumConstant(_) => "an enumerator",
            StorageKind::Parameter => "a parameter",
            StorageKind::Local | StorageKind::Global => "a variable",
        }
    }

    // ─── File-scope objects and functions ───────────────────────

    /// Merges a file-scope object declaration with earlier ones of the same name.
    fn declare_global(&mut self, declarator: &InitDeclarator, storage: StorageClass) -> Option<SymbolId> {
        let name = declarator.name.as_str();
        let has_init = declarator.init.is_some();
        if self.types.typedef(name).is_some() && !self.types.is_builtin_typedef(name) {
            self.error(declarator.span, format!("redefinition of '{name}' as different kind of symbol"));
            return None;
        }
        let Some(id) = self.symbols.lookup_global(name) else {
            let id = self.new_symbol(name, declarator.ty.clone(), StorageKind::Global, declarator.span);
            let symbol = self.symbols.get_mut(id);
            symbol.is_defined = storage != StorageClass::Extern || has_init;
            symbol.is_static = storage == StorageClass::Static;
            if has_init {
                self.initialized.insert(id);
            }
            return Some(id);
        };

        let existing = self.symbols.get(id).clone();
        if existing.storage != StorageKind::Global {
            self.error(declarator.span, format!("redefinition of '{name}' as different kind of symbol"));
            return None;
        }
        if !self.types.compatible(&existing.ty, &declarator.ty) {
            let (old, new) = (self.canonical(&existing.ty), self.canonical(&declarator.ty));
            self.error(declarator.span, format!("redefinition of '{name}' with a different type: '{new}' vs '{old}'"));
            return Some(id);
        }
        if has_init && !self.initialized.insert(id) {
            self.error(declarator.span, format!("redefinition of '{name}'"));
        }
        let more_complete = matches!(
            (self.canonical(&existing.ty), self.canonical(&declarator.ty)),
            (Type::Array(_, None), Type::Array(_, Some(_)))
        );
        let symbol = self.symbols.get_mut(id);
        if more_complete {
            symbol.ty = declarator.ty.clone();
        }
        if storage != StorageClass::Extern || has_init {
            symbol.is_defined = true;
        }
        if storage == StorageClass::Static {
            symbol.is_static = true;
        }
        Some(id)
    }

    /// Declares or merges a function at file scope.
    fn declare_function(
        &mut self,
        name: &str,
        ty: Type,
        span: Span,
        is_definition: bool,
        storage: StorageClass,
    ) -> Option<SymbolId> {
        if self.types.typedef(name).is_some() && !self.types.is_builtin_typedef(name) {
            self.error(span, format!("redefinition of '{name}' as different kind of symbol"));
            return None;
        }
        let Some(id) = self.symbols.lookup_global(name) else {
            let id = self.new_symbol(name, ty, StorageKind::Function, span);
            let symbol = self.symbols.get_mut(id);
            symbol.is_defined = is_definition;
            symbol.is_static = storage == StorageClass::Static;
            return Some(id);
        };
        let existing = self.symbols.get(id).clone();
        if existing.storage != StorageKind::Function {
            self.error(span, format!("redefinition of '{name}' as different kind of symbol"));
            return None;
        }
        if !self.types.compatible(&existing.ty, &ty) {
            let (old, new) = (self.canonical(&existing.ty), self.canonical(&ty));
            self.error(span, format!("conflicting types for '{name}': '{new}' vs '{old}'"));
            return Some(id);
        }
        if is_definition {
            if existing.is_defined {
                self.error(span, format!("redefinition of '{name}'"));
            }
            let symbol = self.symbols.get_mut(id);
            symbol.is_defined = true;
            symbol.ty = ty;
        }
        if storage == StorageClass::Static {
            self.symbols.get_mut(id).is_static = true;
        }
        Some(id)
    }

    // ─── Block-scope declarations ───────────────────────────────

    fn report_block_redeclaration(&mut self, declarator: &InitDeclarator) {
        if let Some(existing) = self.symbols.lookup_in_current(&declarator.name) {
            let what = self.describe_symbol(existing);
            self.error(
                declarator.span,
                format!("redefinition of '{}' (previously declared as {what})", declarator.name),
            );
        }
    }

    fn declare_block_object(&mut self, declarator: &mut InitDeclarator, storage: StorageKind) -> SymbolId {
        self.report_block_redeclaration(declarator);
        let id = self.new_symbol(&declarator.name, declarator.ty.clone(), storage, declarator.span);
        declarator.symbol = Some(id);
        id
    }

    /// `extern int x;` inside a block refers to the file-scope object.
    fn declare_block_extern(&mut self, declarator: &mut InitDeclarator) {
        if declarator.init.is_some() {
            self.error(declarator.span, format!("'extern' variable '{}' cannot have an initializer", declarator.name));
        }
        let global = self.symbols.lookup_global(&declarator.name);
        let bound = self.symbols.lookup_in_current(&declarator.name);
        if bound.is_some() && bound != global {
            self.report_block_redeclaration(declarator);
            return;
        }
        match global {
            Some(id) if self.symbols.get(id).storage == StorageKind::Global => {
                let old = self.symbols.get(id).ty.clone();
                if !self.types.compatible(&old, &declarator.ty) {
                    self.error(
                        declarator.span,
                        format!("redeclaration of '{}' with a different type", declarator.name),
                    );
                }
                self.symbols.bind(&declarator.name, id);
                declarator.symbol = Some(id);
            }
            Some(_) => {
                self.error(declarator.span, format!("redefinition of '{}' as different kind of symbol", declarator.name));
            }
            None => {
                let id = self.new_symbol(&declarator.name, declarator.ty.clone(), StorageKind::Global, declarator.span);
                declarator.symbol = Some(id);
            }
        }
    }

    /// A prototype inside a block binds to the file-scope function.
    fn declare_block_function(&mut self, declarator: &mut InitDeclarator) {
        if declarator.init.is_some() {
            self.error(declarator.span, format!("illegal initializer for function '{}'", declarator.name));
        }
        let global = self.symbols.lookup_global(&declarator.name);
        let bound = self.symbols.lookup_in_current(&declarator.name);
        if bound.is_some() && bound != global {
            self.report_block_redeclaration(declarator);
            return;
        }
        match global {
            Some(id) if self.symbols.get(id).storage == StorageKind::Function => {
                let old = self.symbols.get(id).ty.clone();
                if !self.types.compatible(&old, &declarator.ty) {
                    self.error(declarator.span, format!("conflicting types for '{}'", declarator.name));
                }
                self.symbols.bind(&declarator.name, id);
                declarator.symbol = Some(id);
            }
            Some(_) => {
                self.error(declarator.span, format!("redefinition of '{}' as different kind of symbol", declarator.name));
            }
            None => {
                let id = self.new_symbol(&declarator.name, declarator.ty.clone(), StorageKind::Function, declarator.span);
                declarator.symbol = Some(id);
            }
        }
    }

    // ─── Initializers and completeness ──────────────────────────

    /// Resolves the initializer of an object and completes `T x[] = {...}`.
    fn resolve_object_initializer(&mut self, declarator: &mut InitDeclarator, id: SymbolId, is_static: bool) {
        let Some(init) = declarator.init.as_mut() else {
            return;
        };
        let declared = declarator.ty.clone();
        let completed = self.resolve_initializer(init, &declared, is_static);
        if let (Type::Array(_, None), Type::Array(elem, Some(n))) = (self.canonical(&declared), &completed) {
            let ty = Type::Array(elem.clone(), Some(*n));
            declarator.ty = ty.clone();
            self.symbols.get_mut(id).ty = ty;
        }
    }

    fn check_definition_type(&mut self, declarator: &mut InitDeclarator, id: SymbolId, file_scope: bool) {
        // A later file-scope declaration may have supplied the array size.
        let merged = self.symbols.get(id).ty.clone();
        let ty = self.canonical(&merged);
        if ty.is_error() || self.is_complete(&ty) {
            return;
        }
        match ty {
            Type::Array(elem, None) if file_scope && self.is_complete(&elem) => {
                // A tentative definition of an array of unknown size has one element.
                self.warning(
                    declarator.span,
                    format!("tentative array definition assumed to have one element ('{}')", declarator.name),
                );
                let completed = Type::Array(elem, Some(1));
                declarator.ty = completed.clone();
                self.symbols.get_mut(id).ty = completed;
            }
            Type::Array(_, None) => self.error(
                declarator.span,
                format!(
                    "definition of variable '{}' with array type needs an explicit size or an initializer",
                    declarator.name
                ),
            ),
            other => self.error(
                declarator.span,
                format!("variable '{}' has incomplete type '{other}'", declarator.name),
            ),
        }
    }
}

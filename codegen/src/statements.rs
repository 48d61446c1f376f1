use model::{Declaration, Expr, ForInit, Initializer, RecordKind, StorageClass, StorageKind, Stmt, Type};

use crate::function::{FunctionGenerator, Target};
use crate::names::{escape, type_name};
use crate::types::int_pattern;

/// Longer runs of trailing zeros are written as a zeroed array plus stores.
const ZERO_RUN_LIMIT: usize = 16;

impl FunctionGenerator<'_> {
    pub(crate) fn block_items(&mut self, items: &[Stmt]) {
        for item in items {
            self.stmt(item);
        }
    }

    pub(crate) fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration(decl) => self.local_declaration(decl),
            Stmt::Expr(expr) => {
                let text = self.expr_stmt(expr);
                self.out.line(&text);
            }
            Stmt::Empty(_) => {}
            Stmt::Block(block) => {
                self.out.open("{");
                self.block_items(&block.items);
                self.out.close("}");
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => self.if_stmt(cond, then_branch, else_branch.as_deref()),
            Stmt::While { cond, body, .. } => {
                let n = self.next_label();
                let c = self.cond(cond).text;
                self.out.open(&format!("'loop_{n}: while {c} {{"));
                let target = Target::Loop {
                    brk: format!("break 'loop_{n};"),
                    cont: format!("continue 'loop_{n};"),
                };
                self.loop_body(body, target);
                self.out.close("}");
            }
            Stmt::DoWhile { body, cond, .. } => {
                let n = self.next_label();
                self.out.open(&format!("'loop_{n}: loop {{"));
                self.out.open(&format!("'cont_{n}: {{"));
                let target = Target::Loop {
                    brk: format!("break 'loop_{n};"),
                    cont: format!("break 'cont_{n};"),
                };
                self.loop_body(body, target);
                self.out.close("}");
                let stop = self.falsy(cond);
                self.out.open(&format!("if {stop} {{"));
                self.out.line(&format!("break 'loop_{n};"));
                self.out.close("}");
                self.out.close("}");
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => self.for_stmt(init.as_ref(), cond.as_ref(), step.as_ref(), body),
            Stmt::Switch { cond, body, .. } => self.switch(cond, body),
            // Labels only occur at the top level of a switch body.
            Stmt::Case { .. } | Stmt::Default(_) => {}
            Stmt::Break(_) => {
                let text = match self.targets.last() {
                    Some(Target::Loop { brk, .. } | Target::Switch { brk }) => brk.clone(),
                    None => "break;".to_string(),
                };
                self.out.line(&text);
            }
            Stmt::Continue(_) => {
                let text = self
                    .targets
                    .iter()
                    .rev()
                    .find_map(|target| match target {
                        Target::Loop { cont, .. } => Some(cont.clone()),
                        Target::Switch { .. } => None,
                    })
                    .unwrap_or_else(|| "continue;".to_string());
                self.out.line(&text);
            }
            Stmt::Return(Some(expr), _) => {
                let v = self.value(expr);
                self.out.line(&format!("return {v};"));
            }
            Stmt::Return(None, _) => self.out.line("return;"),
        }
    }

    /// The statements of a branch, without an extra block for `{...}`.
    fn branch(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.block_items(&block.items),
            other => self.stmt(other),
        }
    }

    fn loop_body(&mut self, body: &Stmt, target: Target) {
        self.targets.push(target);
        self.branch(body);
        self.targets.pop();
    }

    fn if_stmt(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        let c = self.cond(cond).text;
        self.out.open(&format!("if {c} {{"));
        let (mut then_branch, mut else_branch) = (then_branch, else_branch);
        loop {
            self.branch(then_branch);
            match else_branch {
                None => {
                    self.out.close("}");
                    return;
                }
                Some(Stmt::If {
                    cond,
                    then_branch: next_then,
                    else_branch: next_else,
                    ..
                }) => {
                    let c = self.cond(cond).text;
                    self.out.reopen(&format!("}} else if {c} {{"));
                    (then_branch, else_branch) = (next_then, next_else.as_deref());
                }
                Some(other) => {
                    self.out.reopen("} else {");
                    self.branch(other);
                    self.out.close("}");
                    return;
                }
            }
        }
    }

    fn for_stmt(&mut self, init: Option<&ForInit>, cond: Option<&Expr>, step: Option<&Expr>, body: &Stmt) {
        let n = self.next_label();
        self.out.open("{");
        match init {
            Some(ForInit::Declaration(decl)) => self.local_declaration(decl),
            Some(ForInit::Expr(expr)) => {
                let text = self.expr_stmt(expr);
                self.out.line(&text);
            }
            None => {}
        }
        match cond {
            Some(cond) => {
                let c = self.cond(cond).text;
                self.out.open(&format!("'loop_{n}: while {c} {{"));
            }
            None => self.out.open(&format!("'loop_{n}: loop {{")),
        }
        self.out.open(&format!("'cont_{n}: {{"));
        let target = Target::Loop {
            brk: format!("break 'loop_{n};"),
            cont: format!("break 'cont_{n};"),
        };
        self.loop_body(body, target);
        self.out.close("}");
        if let Some(step) = step {
            let text = self.expr_stmt(step);
            self.out.line(&text);
        }
        self.out.close("}");
        self.out.close("}");
    }

    // ─── Switch ─────────────────────────────────────────────────

    /// Lowers a switch to a labeled block. The body is cut into segments at
    /// each label; a `match` picks the entry segment and every segment from
    /// there on runs, which gives C fall-through. Declarations directly in
    /// the body are hoisted in front of the block.
    fn switch(&mut self, cond: &Expr, body: &Stmt) {
        let n = self.next_label();
        let items: &[Stmt] = match body {
            Stmt::Block(block) => &block.items,
            other => std::slice::from_ref(other),
        };
        let mut arms = Vec::new();
        let mut default = None;
        let mut segments: Vec<Vec<&Stmt>> = Vec::new();
        for item in items {
            match item {
                Stmt::Case { value, .. } => {
                    if let Some(v) = value {
                        arms.push((*v, segments.len()));
                    }
                    segments.push(Vec::new());
                }
                Stmt::Default(_) => {
                    default = Some(segments.len());
                    segments.push(Vec::new());
                }
                // Statements before the first label never run.
                other => {
                    if let Some(segment) = segments.last_mut() {
                        segment.push(other);
                    }
                }
            }
        }

        let ty = self.types.canonical(&cond.ty);
        let scrutinee = self.value(cond);
        self.out.open("{");
        self.out.line(&format!("let __switch_{n}: {} = {scrutinee};", self.types.rust(&ty)));
        for item in items {
            if let Stmt::Declaration(decl) = item {
                self.hoist_declaration(decl);
            }
        }
        self.out.open(&format!("'switch_{n}: {{"));
        self.out.open(&format!("let __entry_{n}: usize = match __switch_{n} {{"));
        for (v, segment) in &arms {
            self.out.line(&format!("{} => {segment},", int_pattern(*v, &ty)));
        }
        self.out.line(&format!("_ => {},", default.unwrap_or(segments.len())));
        self.out.close("};");

        self.targets.push(Target::Switch {
            brk: format!("break 'switch_{n};"),
        });
        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                continue;
            }
            self.out.open(&format!("if __entry_{n} <= {index} {{"));
            for stmt in segment {
                match stmt {
                    Stmt::Declaration(decl) => self.assign_declaration(decl),
                    other => self.stmt(other),
                }
            }
            self.out.close("}");
        }
        self.targets.pop();
        self.out.close("}");
        self.out.close("}");
    }

    // ─── Declarations ───────────────────────────────────────────

    fn enum_constants(&mut self, decl: &Declaration) {
        for def in &decl.enums {
            for variant in &def.variants {
                let Some(id) = variant.symbol else {
                    continue;
                };
                if let StorageKind::EnumConstant(v) = self.resolution.symbol(id).storage {
                    let name = self.name(id);
                    self.out.line(&format!("const {name}: i32 = {v};"));
                }
            }
        }
    }

    pub(crate) fn local_declaration(&mut self, decl: &Declaration) {
        self.enum_constants(decl);
        if decl.storage == StorageClass::Typedef {
            return;
        }
        for declarator in &decl.declarators {
            let Some(id) = declarator.symbol else {
                continue;
            };
            let storage = self.resolution.symbol(id).storage;
            if storage == StorageKind::Local {
                let ty = self.symbol_type(id);
                let init = match &declarator.init {
                    Some(init) => self.initializer(init, &ty),
                    None => self.types.zero(&ty),
                };
                let line = format!("let mut {}: {} = {init};", self.name(id), self.types.rust(&ty));
                self.out.line(&line);
            } else if storage == StorageKind::Global && decl.storage == StorageClass::Static {
                self.static_item("", id, declarator.init.as_ref());
            }
        }
    }

    /// The part of a switch-body declaration that goes before the switch.
    fn hoist_declaration(&mut self, decl: &Declaration) {
        self.enum_constants(decl);
        if decl.storage == StorageClass::Typedef {
            return;
        }
        for declarator in &decl.declarators {
            let Some(id) = declarator.symbol else {
                continue;
            };
            let storage = self.resolution.symbol(id).storage;
            if storage == StorageKind::Local {
                let ty = self.symbol_type(id);
                let line = format!("let mut {}: {} = {};", self.name(id), self.types.rust(&ty), self.types.zero(&ty));
                self.out.line(&line);
            } else if storage == StorageKind::Global && decl.storage == StorageClass::Static {
                self.static_item("", id, declarator.init.as_ref());
            }
        }
    }

    /// The initialization left in place of a hoisted declaration.
    fn assign_declaration(&mut self, decl: &Declaration) {
        for declarator in &decl.declarators {
            let (Some(id), Some(init)) = (declarator.symbol, &declarator.init) else {
                continue;
            };
            if self.resolution.symbol(id).storage != StorageKind::Local {
                continue;
            }
            let ty = self.symbol_type(id);
            let value = self.initializer(init, &ty);
            let line = format!("{} = {value};", self.name(id));
            self.out.line(&line);
        }
    }

    /// `static mut name: T = init;`, at file scope or inside a function.
    pub(crate) fn static_item(&mut self, vis: &str, id: model::SymbolId, init: Option<&Initializer>) {
        let ty = self.symbol_type(id);
        let value = match init {
            Some(init) => self.initializer(init, &ty),
            None => self.types.zero(&ty),
        };
        let value = if value.contains("transmute") || value.contains("addr_of_mut") {
            format!("unsafe {{ {value} }}")
        } else {
            value
        };
        let line = format!("{vis}static mut {}: {} = {value};", self.name(id), self.types.rust(&ty));
        self.out.line(&line);
    }

    // ─── Initializers ───────────────────────────────────────────

    /// An expression with the value of a normalized initializer for an
    /// object of type `ty`.
    pub(crate) fn initializer(&mut self, init: &Initializer, ty: &Type) -> String {
        let ty = self.types.canonical(ty);
        match (init, &ty) {
            (Initializer::Expr(expr), Type::Array(elem, n)) => match &expr.kind {
                model::ExprKind::StringLiteral(bytes) => {
                    let n = n.unwrap_or(bytes.len() + 1);
                    let signed = elem.is_signed();
                    let parts: Vec<String> = bytes
                        .iter()
                        .chain(std::iter::once(&0))
                        .take(n)
                        .map(|&b| if signed { (b as i8).to_string() } else { b.to_string() })
                        .collect();
                    self.array_literal(parts, "0".to_string(), n)
                }
                _ => self.value(expr),
            },
            (Initializer::Expr(expr), _) => self.value(expr),
            (Initializer::List(items, _), Type::Array(elem, n)) => {
                let n = n.unwrap_or(items.len());
                let mut parts = Vec::new();
                for item in items.iter().take(n) {
                    parts.push(self.initializer(item, elem));
                }
                let zero = self.types.zero(elem);
                self.array_literal(parts, zero, n)
            }
            (Initializer::List(items, _), Type::Record(kind, tag)) => {
                let fields = self
                    .types
                    .table()
                    .record(tag)
                    .and_then(|layout| layout.fields.clone())
                    .unwrap_or_default();
                let name = type_name(tag);
                if *kind == RecordKind::Union {
                    return match (items.first(), fields.first()) {
                        (Some(item), Some(field)) => {
                            let v = self.initializer(item, &field.ty);
                            format!("{name} {{ {}: {v} }}", escape(&field.name))
                        }
                        _ => self.types.zero(&ty),
                    };
                }
                let mut parts = Vec::new();
                for (index, field) in fields.iter().enumerate() {
                    let v = match items.get(index) {
                        Some(item) => self.initializer(item, &field.ty),
                        None => self.types.zero(&field.ty),
                    };
                    parts.push(format!("{}: {v}", escape(&field.name)));
                }
                format!("{name} {{ {} }}", parts.join(", "))
            }
            (Initializer::List(items, _), _) => match items.first() {
                Some(item) => self.initializer(item, &ty),
                None => self.types.zero(&ty),
            },
        }
    }

    fn array_literal(&mut self, mut parts: Vec<String>, zero: String, n: usize) -> String {
        let missing = n.saturating_sub(parts.len());
        if missing <= ZERO_RUN_LIMIT {
            parts.extend(std::iter::repeat_n(zero, missing));
            return format!("[{}]", parts.join(", "));
        }
        let t = self.temp("a");
        let mut text = format!("{{ let mut {t} = [{zero}; {n}]; ");
        for (index, part) in parts.iter().enumerate() {
            text.push_str(&format!("{t}[{index}] = {part}; "));
        }
        text.push_str(&format!("{t} }}"));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameMap;
    use model::Diagnostics;
    use pretty_assertions::assert_eq;
    use semantic::Resolution;

    fn with_generator(src: &str, f: impl FnOnce(&mut FunctionGenerator<'_>, &model::TranslationUnit)) {
        let mut diags = Diagnostics::new();
        let tokens = lexer::lex(src, &mut diags);
        let mut unit = parser::parse(&tokens, &mut diags);
        let resolution: Resolution = semantic::resolve(&mut unit, &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.as_slice());
        let names = NameMap::new(&unit, &resolution);
        let mut generator = FunctionGenerator::new(&names, &resolution);
        f(&mut generator, &unit);
    }

    fn first_declaration(unit: &model::TranslationUnit) -> &Declaration {
        match &unit.items[0] {
            model::ExternalDecl::Declaration(decl) => decl,
            other => panic!("expected a declaration, got {other:?}"),
        }
    }

    #[test]
    fn partial_array_initializer_is_padded() {
        with_generator("int a[4] = {1, 2};", |generator, unit| {
            let decl = first_declaration(unit);
            let init = decl.declarators[0].init.as_ref().unwrap();
            let text = generator.initializer(init, &decl.declarators[0].ty);
            assert_eq!(text, "[1i32, 2i32, 0, 0]");
        });
    }

    #[test]
    fn long_zero_runs_use_a_zeroed_array() {
        with_generator("int a[100] = {7};", |generator, unit| {
            let decl = first_declaration(unit);
            let init = decl.declarators[0].init.as_ref().unwrap();
            let text = generator.initializer(init, &decl.declarators[0].ty);
            assert_eq!(text, "{ let mut __a1 = [0; 100]; __a1[0] = 7i32; __a1 }");
        });
    }

    #[test]
    fn string_initializes_char_array() {
        with_generator("char s[5] = \"hi\";", |generator, unit| {
            let decl = first_declaration(unit);
            let init = decl.declarators[0].init.as_ref().unwrap();
            let text = generator.initializer(init, &decl.declarators[0].ty);
            assert_eq!(text, "[104, 105, 0, 0, 0]");
        });
    }

    #[test]
    fn struct_initializer_names_every_field() {
        with_generator("struct p { int x; int y; } v = {3};", |generator, unit| {
            let decl = unit
                .items
                .iter()
                .find_map(|item| match item {
                    model::ExternalDecl::Declaration(decl) if !decl.declarators.is_empty() => Some(decl),
                    _ => None,
                })
                .unwrap();
            let init = decl.declarators[0].init.as_ref().unwrap();
            let text = generator.initializer(init, &decl.declarators[0].ty);
            assert_eq!(text, "p { x: 3i32, y: 0 }");
        });
    }
}

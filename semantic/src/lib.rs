// Semantic module: resolves names and types over the parsed tree
//
// Module organization:
// - resolver.rs: Resolver state, scopes, the two-pass driver
// - declarations.rs: file-scope merging, block declarations, records, enums, typedefs
// - initializers.rs: brace elision, array completion, static constant checks
// - statements.rs: loops, switch labels, return checks
// - expressions.rs: identifier lookup, operator typing, calls, members, casts
// - conversions.rs: implicit conversions and assignment compatibility

mod conversions;
mod declarations;
mod expressions;
mod initializers;
mod resolver;
mod statements;

use std::collections::HashMap;

use model::{Diagnostics, Symbol, SymbolId, SymbolTable, TranslationUnit, Type, TypeTable};
use resolver::Resolver;
use tracing::debug;

/// Everything the generator needs besides the annotated tree.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub symbols: SymbolTable,
    pub types: TypeTable,
}

impl Resolution {
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        self.symbols.get(id)
    }
}

/// Resolve a parsed translation unit in place.
///
/// Every expression gets its canonical type, identifiers get their symbol
/// and implicit conversions become explicit nodes. Problems are recorded in
/// `diags`; resolution never stops early.
pub fn resolve(unit: &mut TranslationUnit, diags: &mut Diagnostics) -> Resolution {
    resolve_with_builtins(unit, &HashMap::new(), diags)
}

/// Like [`resolve`], with predefined typedef names such as `size_t`.
pub fn resolve_with_builtins(
    unit: &mut TranslationUnit,
    builtins: &HashMap<String, Type>,
    diags: &mut Diagnostics,
) -> Resolution {
    let before = diags.error_count();
    let mut resolver = Resolver::new(TypeTable::with_builtins(builtins), diags);
    resolver.run(unit);
    let Resolver { symbols, types, .. } = resolver;
    debug!(
        symbols = symbols.len(),
        errors = diags.error_count() - before,
        "resolved translation unit"
    );
    Resolution { symbols, types }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use lexer::lex;
    use model::{
        BinaryOp, CastKind, Declaration, Expr, ExprKind, ExternalDecl, FunctionDef, Initializer, Severity, Stmt,
        StorageKind,
    };
    use parser::parse;
    use pretty_assertions::assert_eq;

    fn resolve_src(src: &str) -> (TranslationUnit, Resolution, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tokens = lex(src, &mut diags);
        let mut unit = parse(&tokens, &mut diags);
        assert!(!diags.has_errors(), "source does not parse: {:?}", diags.as_slice());
        let resolution = resolve(&mut unit, &mut diags);
        (unit, resolution, diags)
    }

    fn resolve_ok(src: &str) -> (TranslationUnit, Resolution) {
        let (unit, resolution, diags) = resolve_src(src);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags.as_slice());
        (unit, resolution)
    }

    fn errors(diags: &Diagnostics) -> Vec<String> {
        diags.iter().filter(|d| d.is_error()).map(|d| d.message.clone()).collect()
    }

    fn warnings(diags: &Diagnostics) -> Vec<String> {
        diags
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| d.message.clone())
            .collect()
    }

    fn single_error(src: &str) -> String {
        let (_, _, diags) = resolve_src(src);
        let errors = errors(&diags);
        assert_eq!(errors.len(), 1, "expected one error, got {errors:?}");
        errors[0].clone()
    }

    fn function<'a>(unit: &'a TranslationUnit, name: &str) -> &'a FunctionDef {
        unit.items
            .iter()
            .find_map(|item| match item {
                ExternalDecl::Function(f) if f.name == name => Some(f),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no function '{name}'"))
    }

    fn declaration<'a>(unit: &'a TranslationUnit, name: &str) -> &'a Declaration {
        unit.items
            .iter()
            .find_map(|item| match item {
                ExternalDecl::Declaration(d) if d.declarators.iter().any(|i| i.name == name) => Some(d),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no declaration of '{name}'"))
    }

    /// The value of the last `return` in a function body.
    fn return_expr<'a>(unit: &'a TranslationUnit, name: &str) -> &'a Expr {
        function(unit, name)
            .body
            .items
            .iter()
            .rev()
            .find_map(|stmt| match stmt {
                Stmt::Return(Some(e), _) => Some(e),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no return in '{name}'"))
    }

    // ─── Names and scopes ───────────────────────────────────────

    #[test]
    fn resolve_simple_function() {
        let (unit, resolution) = resolve_ok("int add(int a, int b) { return a + b; }");
        let ret = return_expr(&unit, "add");
        assert_eq!(ret.ty, Type::Int);
        let ExprKind::Binary { op: BinaryOp::Add, lhs, rhs } = &ret.kind else {
            panic!("expected addition, got {:?}", ret.kind);
        };
        for operand in [lhs, rhs] {
            let ExprKind::Ident { symbol: Some(id), .. } = &operand.kind else {
                panic!("expected resolved identifier");
            };
            assert_eq!(resolution.symbol(*id).storage, StorageKind::Parameter);
        }
    }

    #[test]
    fn resolve_undeclared_identifier_reports_its_position() {
        let (_, _, diags) = resolve_src("int x = y;");
        assert_eq!(diags.len(), 1);
        let d = &diags.as_slice()[0];
        assert!(d.is_error());
        assert_eq!(d.kind, model::DiagnosticKind::Semantic);
        assert_eq!((d.span.start.line, d.span.start.column), (1, 9));
        assert_eq!(d.message, "use of undeclared identifier 'y'");
    }

    #[test]
    fn resolve_errors_do_not_cascade() {
        let message = single_error("int f(void) { int z = y * 2 + 1; return z; }");
        assert!(message.contains("'y'"), "{message}");
        let (_, _, diags) = resolve_src("int f(void) { return *y + 1; }");
        assert_eq!(errors(&diags).len(), 1);
    }

    #[test]
    fn resolve_redeclaration_in_same_block() {
        let message = single_error("void f(void) { int a; int a; }");
        assert!(message.starts_with("redefinition of 'a'"), "{message}");
        resolve_ok("void f(void) { int a; { int a; a = 1; } a = 2; }");
    }

    #[test]
    fn resolve_parameter_and_body_share_a_scope() {
        let message = single_error("void f(int a) { int a; }");
        assert!(message.starts_with("redefinition of 'a'"), "{message}");
    }

    #[test]
    fn resolve_block_extern_binds_to_global() {
        let (unit, _) = resolve_ok(indoc! {"
            int g;
            void f(void) { extern int g; g = 1; }
        "});
        let global = declaration(&unit, "g").declarators[0].symbol;
        let Stmt::Expr(assign) = &function(&unit, "f").body.items[1] else {
            panic!("expected assignment statement");
        };
        let ExprKind::Assign { target, .. } = &assign.kind else {
            panic!("expected assignment");
        };
        let ExprKind::Ident { symbol, .. } = &target.kind else {
            panic!("expected identifier target");
        };
        assert_eq!(*symbol, global);
    }

    #[test]
    fn resolve_enum_constants_count_from_explicit_values() {
        let (_, resolution) = resolve_ok("enum color { RED, GREEN = 5, BLUE }; int x = BLUE;");
        let blue = resolution
            .symbols
            .iter()
            .find(|(_, s)| s.name == "BLUE")
            .map(|(_, s)| s.storage);
        assert_eq!(blue, Some(StorageKind::EnumConstant(6)));
    }

    // ─── File-scope declarations ────────────────────────────────

    #[test]
    fn resolve_tentative_definitions_merge() {
        resolve_ok("int x; int x; int x = 3; extern int x;");
        let message = single_error("int y = 1; int y = 2;");
        assert_eq!(message, "redefinition of 'y'");
    }

    #[test]
    fn resolve_prototype_then_definition() {
        resolve_ok("int f(int); int g(void) { return f(2); } int f(int x) { return x; }");
        let message = single_error("int f(int); long f(int x) { return x; }");
        assert!(message.starts_with("conflicting types for 'f'"), "{message}");
        let message = single_error("int f(void) { return 0; } int f(void) { return 1; }");
        assert_eq!(message, "redefinition of 'f'");
    }

    #[test]
    fn resolve_variadic_definition_is_rejected() {
        let message = single_error("int sum(int n, ...) { return n; }");
        assert!(message.starts_with("variadic function definitions are not supported"), "{message}");
    }

    #[test]
    fn resolve_function_and_object_with_same_name() {
        let message = single_error("int f; int f(void);");
        assert!(message.contains("different kind of symbol"), "{message}");
    }

    #[test]
    fn resolve_oversized_arrays_are_rejected() {
        assert_eq!(single_error("char big[4611686018427387904][8];"), "array is too large");
        assert_eq!(single_error("void f(void) { char big[4611686018427387904][8]; }"), "array is too large");
        assert_eq!(
            single_error("unsigned long f(void) { return sizeof(char[4611686018427387904][8]); }"),
            "array is too large"
        );
        resolve_ok("char fine[1024][8];");
    }

    #[test]
    fn resolve_tag_only_declaration_registers_record() {
        let (_, resolution) = resolve_ok("struct node; void f(void) { struct leaf; }");
        let node = resolution.types.record("node").expect("node is registered");
        assert!(!node.is_complete());
        let leaf = resolution.types.record("leaf").expect("leaf is registered");
        assert!(!leaf.is_complete());
    }

    // ─── Record tags ────────────────────────────────────────────

    #[test]
    fn resolve_block_scoped_tags_stay_distinct() {
        let (_, resolution) = resolve_ok(indoc! {"
            void f(void) { struct s { int a; } x; x.a = 1; }
            void g(void) { struct s { double b; } y; y.b = 2.0; }
        "});
        let first = resolution.types.record("s").expect("first s");
        assert_eq!(first.fields.as_ref().map(|f| f[0].ty.clone()), Some(Type::Int));
        let second = resolution.types.record("s_1").expect("second s");
        assert_eq!(second.fields.as_ref().map(|f| f[0].ty.clone()), Some(Type::Double));
    }

    #[test]
    fn resolve_block_tag_hides_file_tag() {
        resolve_ok(indoc! {"
            struct s { int a; };
            int f(void) { struct s { double b; } y; y.b = 1.0; return 0; }
            int g(struct s *p) { return p->a; }
        "});
        let message = single_error("struct s { int a; }; void f(void) { struct s; struct s *p; p->a = 1; }");
        assert!(message.starts_with("incomplete definition of type"), "{message}");
    }

    #[test]
    fn resolve_block_definition_completes_forward_reference() {
        resolve_ok("void f(void) { struct t *p; struct t { int v; } v; p = &v; p->v = 1; }");
    }

    // ─── Initializers ───────────────────────────────────────────

    #[test]
    fn resolve_array_size_from_initializer() {
        let (unit, resolution) = resolve_ok("int a[] = {1, 2, 3}; char s[] = \"hi\";");
        let a = &declaration(&unit, "a").declarators[0];
        assert_eq!(a.ty, Type::Array(Box::new(Type::Int), Some(3)));
        let id = a.symbol.unwrap_or_else(|| panic!("unresolved 'a'"));
        assert_eq!(resolution.symbol(id).ty, a.ty);
        let s = &declaration(&unit, "s").declarators[0];
        assert_eq!(s.ty, Type::Array(Box::new(Type::Char), Some(3)));
    }

    #[test]
    fn resolve_brace_elision_in_struct_array() {
        let (unit, _) = resolve_ok("struct P { int x; int y; }; struct P ps[] = {1, 2, 3, 4};");
        let ps = &declaration(&unit, "ps").declarators[0];
        assert!(matches!(&ps.ty, Type::Array(_, Some(2))), "{:?}", ps.ty);
        let Some(Initializer::List(items, _)) = &ps.init else {
            panic!("expected initializer list");
        };
        assert_eq!(items.len(), 2);
        for item in items {
            assert!(matches!(item, Initializer::List(fields, _) if fields.len() == 2));
        }
    }

    #[test]
    fn resolve_global_integer_initializer_is_folded() {
        let (unit, _) = resolve_ok("int x = 2 * 3 + 1; unsigned char c = 300;");
        let Some(Initializer::Expr(e)) = &declaration(&unit, "x").declarators[0].init else {
            panic!("expected expression initializer");
        };
        assert!(matches!(e.kind, ExprKind::IntLiteral { value: 7, .. }), "{:?}", e.kind);
        let Some(Initializer::Expr(c)) = &declaration(&unit, "c").declarators[0].init else {
            panic!("expected expression initializer");
        };
        assert!(matches!(c.kind, ExprKind::IntLiteral { value: 44, .. }), "{:?}", c.kind);
        assert_eq!(c.ty, Type::UChar);
    }

    #[test]
    fn resolve_static_initializers_must_be_constant() {
        let message = single_error("int g(void); int x = g();");
        assert_eq!(message, "initializer element is not a compile-time constant");
        resolve_ok("int arr[4]; int *p = arr + 1; char *s = \"hi\"; int *q = &arr[2]; int (*fp)(void) = 0;");
    }

    #[test]
    fn resolve_excess_initializers_warn() {
        let (_, _, diags) = resolve_src("int a[2] = {1, 2, 3};");
        assert!(errors(&diags).is_empty());
        assert_eq!(warnings(&diags), vec!["excess elements in array initializer".to_string()]);
    }

    #[test]
    fn resolve_oversized_constant_shift_warns() {
        let (_, _, diags) = resolve_src("int a = 1 << 70; int b = 1 << 31; long c = 1L << 40;");
        assert!(errors(&diags).is_empty());
        assert_eq!(warnings(&diags), vec!["shift count 70 >= width of type 'int'".to_string()]);
        let (_, _, diags) = resolve_src("int f(int x) { return x >> -1; }");
        assert_eq!(warnings(&diags), vec!["shift count is negative".to_string()]);
    }

    // ─── Conversions ────────────────────────────────────────────

    #[test]
    fn resolve_inserts_implicit_conversions() {
        let (unit, _) = resolve_ok("double d(int i) { return i; }");
        let ret = return_expr(&unit, "d");
        assert_eq!(ret.ty, Type::Double);
        assert!(matches!(
            ret.kind,
            ExprKind::ImplicitCast {
                kind: CastKind::IntegralToFloating,
                ..
            }
        ));
    }

    #[test]
    fn resolve_variadic_arguments_are_promoted() {
        let (unit, _) = resolve_ok(indoc! {r#"
            int printf(const char *fmt, ...);
            int f(void) { return printf("%d %f\n", 1, 2.0f); }
        "#});
        let ExprKind::Call { args, .. } = &return_expr(&unit, "f").kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 3);
        assert!(args[0].ty.is_pointer());
        assert_eq!(args[1].ty, Type::Int);
        assert_eq!(args[2].ty, Type::Double);
    }

    #[test]
    fn resolve_call_arity() {
        let message = single_error("int g(int x); int f(void) { return g(1, 2); }");
        assert_eq!(message, "too many arguments to function call, expected 1, have 2");
        let message = single_error("int printf(const char *fmt, ...); void f(void) { printf(); }");
        assert_eq!(message, "too few arguments to function call, expected at least 1, have 0");
    }

    #[test]
    fn resolve_pointer_arithmetic() {
        let (unit, _) = resolve_ok("long diff(int *p, int *q) { return p - q; } int *at(int *p) { return 1 + p; }");
        assert_eq!(return_expr(&unit, "diff").ty, Type::Long);
        let ExprKind::Binary { lhs, rhs, .. } = &return_expr(&unit, "at").kind else {
            panic!("expected binary");
        };
        assert!(lhs.ty.is_pointer());
        assert_eq!(rhs.ty, Type::Long);
    }

    #[test]
    fn resolve_pointer_assignment_rules() {
        resolve_ok("void f(void) { int *p; p = 0; p = (void *)0; }");
        let message = single_error("void f(void) { int *p; p = 5; }");
        assert!(message.starts_with("incompatible integer to pointer conversion"), "{message}");
        let (_, _, diags) = resolve_src("void f(void) { int *p; char *c; p = c; }");
        assert!(errors(&diags).is_empty());
        assert_eq!(warnings(&diags).len(), 1);
    }

    #[test]
    fn resolve_function_pointer_calls() {
        let (unit, _) = resolve_ok("int h(int); int f(void) { int (*fp)(int) = h; return (*fp)(1) + fp(2); }");
        let ExprKind::Binary { lhs, .. } = &return_expr(&unit, "f").kind else {
            panic!("expected binary");
        };
        let ExprKind::Call { callee, .. } = &lhs.kind else {
            panic!("expected call");
        };
        assert!(matches!(&callee.kind, ExprKind::Ident { name, .. } if name == "fp"));
    }

    // ─── Statements ─────────────────────────────────────────────

    #[test]
    fn resolve_break_and_continue_context() {
        let message = single_error("void f(void) { break; }");
        assert_eq!(message, "'break' statement not in loop or switch statement");
        let message = single_error("void f(int x) { switch (x) { case 1: continue; } }");
        assert_eq!(message, "'continue' statement not in loop statement");
        resolve_ok("void f(int x) { while (x) { switch (x) { case 1: continue; default: break; } } }");
    }

    #[test]
    fn resolve_duplicate_case_values() {
        let message = single_error("void f(int x) { switch (x) { case 1: break; case 2 - 1: break; } }");
        assert_eq!(message, "duplicate case value '1'");
        let message = single_error("void f(int x) { switch (x) { default: break; default: break; } }");
        assert_eq!(message, "multiple default labels in one switch");
    }

    #[test]
    fn resolve_case_values_are_recorded() {
        let (unit, _) = resolve_ok("int f(char c) { switch (c) { case 'a': return 1; } return 0; }");
        let Stmt::Switch { body, .. } = &function(&unit, "f").body.items[0] else {
            panic!("expected switch");
        };
        let Stmt::Block(block) = body.as_ref() else {
            panic!("expected block body");
        };
        assert!(matches!(block.items[0], Stmt::Case { value: Some(97), .. }));
    }

    #[test]
    fn resolve_case_must_be_at_switch_top_level() {
        let message = single_error("void f(int x) { switch (x) { case 1: if (x) { case 2: ; } } }");
        assert!(message.contains("nested"), "{message}");
        let message = single_error("void f(void) { case 1: ; }");
        assert_eq!(message, "'case' statement not in switch statement");
    }

    #[test]
    fn resolve_return_checks() {
        let message = single_error("void f(void) { return 1; }");
        assert_eq!(message, "void function 'f' should not return a value");
        let (_, _, diags) = resolve_src("int f(void) { return; }");
        assert!(errors(&diags).is_empty());
        assert_eq!(warnings(&diags), vec!["non-void function 'f' should return a value".to_string()]);
    }

    // ─── Expressions ────────────────────────────────────────────

    #[test]
    fn resolve_member_access() {
        resolve_ok("struct S { int a; }; int f(struct S *s, struct S v) { return s->a + v.a; }");
        let message = single_error("struct S { int a; }; int f(struct S *s) { return s->b; }");
        assert_eq!(message, "no member named 'b' in 'struct S'");
        let message = single_error("struct S { int a; }; int f(struct S *s) { return s.a; }");
        assert!(message.contains("did you mean to use '->'"), "{message}");
    }

    #[test]
    fn resolve_dereference_requires_pointer() {
        let message = single_error("int f(int x) { return *x; }");
        assert_eq!(message, "indirection requires pointer operand ('int' invalid)");
    }

    #[test]
    fn resolve_comparison_of_pointer_and_integer() {
        let message = single_error("int f(int *p, int x) { return p == x; }");
        assert!(message.starts_with("comparison between pointer and integer"), "{message}");
        resolve_ok("int f(int *p) { return p != 0 && !p; }");
    }

    #[test]
    fn resolve_sizeof_and_literal_types() {
        let (unit, _) = resolve_ok("unsigned long f(void) { return sizeof(int) + sizeof 'a'; } long g(void) { return 3000000000; }");
        assert_eq!(return_expr(&unit, "f").ty, Type::ULong);
        let ret = return_expr(&unit, "g");
        assert_eq!(ret.ty, Type::Long);
        assert!(matches!(ret.kind, ExprKind::IntLiteral { .. }));
    }

    #[test]
    fn resolve_assignment_to_non_lvalue() {
        let message = single_error("int a[3]; void f(void) { int b[3]; a = b; }");
        assert_eq!(message, "array type 'int[3]' is not assignable");
    }
}

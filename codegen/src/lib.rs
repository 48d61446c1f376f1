// Codegen module: turns a resolved translation unit into Rust source text
//
// Module organization:
// - items.rs: records, typedefs, constants, globals, extern block, main wrapper
// - function.rs: FunctionGenerator, per-function state and signatures
// - statements.rs: control flow, switch lowering, local declarations, initializers
// - expressions.rs: operators, places, assignments, calls and conversions
// - types.rs: TypeRenderer, C types as Rust types and zero values
// - names.rs: identifier escaping and symbol naming
// - writer.rs: indented line buffer

mod expressions;
mod function;
mod items;
mod names;
mod statements;
mod types;
mod writer;

use model::TranslationUnit;
use semantic::Resolution;
use tracing::debug;

use names::NameMap;
use types::TypeRenderer;
use writer::CodeWriter;

/// Knobs for the shape of the generated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Start the output with a one-line "generated" comment.
    pub emit_header_comment: bool,
    /// Emit a Rust `fn main()` calling the translated C `main`.
    pub emit_main_wrapper: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            emit_header_comment: true,
            emit_main_wrapper: true,
        }
    }
}

/// Generate Rust source for a translation unit that resolved without errors.
pub fn generate(unit: &TranslationUnit, resolution: &Resolution) -> String {
    generate_with(unit, resolution, &GeneratorOptions::default())
}

pub fn generate_with(unit: &TranslationUnit, resolution: &Resolution, options: &GeneratorOptions) -> String {
    Generator::new(unit, resolution, options).gen_program()
}

pub struct Generator<'a> {
    unit: &'a TranslationUnit,
    resolution: &'a Resolution,
    options: &'a GeneratorOptions,
    names: NameMap,
    types: TypeRenderer<'a>,
}

impl<'a> Generator<'a> {
    pub fn new(unit: &'a TranslationUnit, resolution: &'a Resolution, options: &'a GeneratorOptions) -> Self {
        Self {
            unit,
            resolution,
            options,
            names: NameMap::new(unit, resolution),
            types: TypeRenderer::new(&resolution.types),
        }
    }

    pub fn gen_program(&self) -> String {
        let mut out = CodeWriter::new();
        self.gen_header(&mut out);
        self.gen_records(&mut out);
        self.gen_typedefs(&mut out);
        self.gen_enum_constants(&mut out);
        self.gen_globals(&mut out);
        self.gen_externs(&mut out);
        self.gen_functions(&mut out);
        if self.options.emit_main_wrapper {
            self.gen_main_wrapper(&mut out);
        }
        let output = out.finish();
        debug!(items = self.unit.items.len(), bytes = output.len(), "generated rust module");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use model::Diagnostics;
    use pretty_assertions::assert_eq;

    fn generate_src(src: &str) -> String {
        generate_src_with(src, &GeneratorOptions::default())
    }

    fn generate_src_with(src: &str, options: &GeneratorOptions) -> String {
        let mut diags = Diagnostics::new();
        let tokens = lexer::lex(src, &mut diags);
        let mut unit = parser::parse(&tokens, &mut diags);
        let resolution = semantic::resolve(&mut unit, &mut diags);
        assert!(!diags.has_errors(), "source does not resolve: {:?}", diags.as_slice());
        generate_with(&unit, &resolution, options)
    }

    fn bare() -> GeneratorOptions {
        GeneratorOptions {
            emit_header_comment: false,
            emit_main_wrapper: false,
        }
    }

    /// The generated function named `name`, from its signature to its closing brace.
    fn function<'s>(code: &'s str, name: &str) -> &'s str {
        let needle = format!(" fn {name}(");
        let start = code.find(&needle).unwrap_or_else(|| panic!("no function {name} in:\n{code}"));
        let start = code[..start].rfind('\n').map_or(0, |i| i + 1);
        let end = code[start..].find("\n}\n").map_or(code.len(), |i| start + i + 3);
        &code[start..end]
    }

    // ─── Module layout ──────────────────────────────────────────

    #[test]
    fn header_allows_mechanical_lints() {
        let code = generate_src("int x;");
        assert!(code.starts_with("// Generated by oxcc"));
        assert!(code.contains("#![allow(dead_code, non_camel_case_types"));
        let code = generate_src_with("int x;", &bare());
        assert!(code.starts_with("#![allow("));
    }

    #[test]
    fn add_uses_wrapping_arithmetic() {
        let code = generate_src_with("int add(int a, int b) { return a + b; }", &bare());
        assert_eq!(
            function(&code, "add"),
            indoc! {r#"
                pub unsafe extern "C" fn add(mut a: i32, mut b: i32) -> i32 {
                    return a.wrapping_add(b);
                }
            "#}
        );
    }

    #[test]
    fn records_are_repr_c() {
        let code = generate_src_with("struct point { int x; double y; }; struct node;", &bare());
        assert!(code.contains(indoc! {"
            #[repr(C)]
            #[derive(Clone, Copy)]
            pub struct point {
                pub x: i32,
                pub y: f64,
            }
        "}));
        assert!(code.contains("pub struct node { _opaque: [u8; 0] }"));
    }

    #[test]
    fn block_scoped_records_get_distinct_names() {
        let code = generate_src_with(
            indoc! {"
                void f(void) { struct s { int a; } x; x.a = 1; }
                void g(void) { struct s { double b; } y; y.b = 2.0; }
            "},
            &bare(),
        );
        assert!(code.contains("pub struct s {\n    pub a: i32,\n}"), "{code}");
        assert!(code.contains("pub struct s_1 {\n    pub b: f64,\n}"), "{code}");
        assert!(code.contains("let mut x: s = "), "{code}");
        assert!(code.contains("let mut y: s_1 = "), "{code}");
    }

    #[test]
    fn unions_and_keyword_fields() {
        let code = generate_src_with("union value { int type; float f; };", &bare());
        assert!(code.contains("pub union value {"));
        assert!(code.contains("pub r#type: i32,"));
    }

    #[test]
    fn typedefs_and_enum_constants() {
        let code = generate_src_with("typedef unsigned long size; enum color { RED, GREEN = 5, BLUE };", &bare());
        assert!(code.contains("pub type size = u64;"));
        assert!(code.contains("pub const RED: i32 = 0;"));
        assert!(code.contains("pub const GREEN: i32 = 5;"));
        assert!(code.contains("pub const BLUE: i32 = 6;"));
    }

    #[test]
    fn typedef_of_same_named_record_is_skipped() {
        let code = generate_src_with("typedef struct node { int v; } node;", &bare());
        assert!(!code.contains("pub type node"));
    }

    #[test]
    fn globals_are_static_mut() {
        let code = generate_src_with(
            indoc! {"
                int counter;
                static int hidden = 3;
                double ratio = 1.5;
                int table[3] = {1, 2};
                char *greeting = \"hi\";
            "},
            &bare(),
        );
        assert!(code.contains("pub static mut counter: i32 = 0;"));
        assert!(code.contains("\nstatic mut hidden: i32 = 3i32;"));
        assert!(code.contains("pub static mut ratio: f64 = 1.5f64;"));
        assert!(code.contains("pub static mut table: [i32; 3] = [1i32, 2i32, 0];"));
        assert!(code.contains("pub static mut greeting: *mut i8 = b\"hi\\0\".as_ptr() as *mut i8;"));
    }

    #[test]
    fn tentative_definitions_merge_into_one_static() {
        let code = generate_src_with("int n; int n = 4; extern int n;", &bare());
        assert_eq!(code.matches("static mut n:").count(), 1);
        assert!(code.contains("pub static mut n: i32 = 4i32;"));
    }

    #[test]
    fn prototypes_without_definition_go_extern() {
        let code = generate_src_with(
            indoc! {"
                int printf(const char *fmt, ...);
                extern int errno;
                int twice(int x);
                int twice(int x) { return x * 2; }
            "},
            &bare(),
        );
        assert!(code.contains("unsafe extern \"C\" {"));
        assert!(code.contains("pub fn printf(_: *mut i8, ...) -> i32;"));
        assert!(code.contains("pub static mut errno: i32;"));
        assert!(!code.contains("pub fn twice(_"));
        assert!(code.contains("pub unsafe extern \"C\" fn twice(mut x: i32) -> i32 {"));
    }

    #[test]
    fn static_functions_are_private() {
        let code = generate_src_with("static int helper(void) { return 1; }", &bare());
        assert!(code.contains("\nunsafe extern \"C\" fn helper() -> i32 {"));
    }

    #[test]
    fn main_gets_a_wrapper() {
        let code = generate_src("int main(void) { return 0; }");
        assert!(code.contains("pub unsafe extern \"C\" fn main_0() -> i32 {"));
        assert!(code.contains("pub fn main() {"));
        assert!(code.contains("let status = unsafe { main_0() };"));
        assert!(code.contains("::std::process::exit(status as i32);"));
    }

    #[test]
    fn main_forwards_arguments() {
        let code = generate_src("int main(int argc, char **argv) { return argc; }");
        assert!(code.contains("argv.push(::core::ptr::null_mut());"));
        assert!(code.contains("main_0((argv.len() - 1) as i32, argv.as_mut_ptr() as *mut *mut i8)"));
    }

    #[test]
    fn no_wrapper_when_disabled() {
        let code = generate_src_with("int main(void) { return 0; }", &bare());
        assert!(!code.contains("pub fn main()"));
    }

    // ─── Functions and statements ───────────────────────────────

    #[test]
    fn falling_off_the_end_returns_zero() {
        let code = generate_src_with("int f(int x) { if (x) return 1; }", &bare());
        assert_eq!(
            function(&code, "f"),
            indoc! {r#"
                pub unsafe extern "C" fn f(mut x: i32) -> i32 {
                    if x != 0 {
                        return 1i32;
                    }
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn locals_are_zero_initialized() {
        let code = generate_src_with("void f(void) { int a; int *p; double d; int arr[2]; }", &bare());
        let body = function(&code, "f");
        assert!(body.contains("let mut a: i32 = 0;"));
        assert!(body.contains("let mut p: *mut i32 = ::core::ptr::null_mut::<i32>();"));
        assert!(body.contains("let mut d: f64 = 0.0;"));
        assert!(body.contains("let mut arr: [i32; 2] = [0; 2];"));
    }

    #[test]
    fn while_and_else_if() {
        let code = generate_src_with(
            indoc! {"
                int sign(int x) {
                    while (x > 100) x = x / 2;
                    if (x < 0) return 2; else if (x == 0) return 0; else return 1;
                }
            "},
            &bare(),
        );
        assert_eq!(
            function(&code, "sign"),
            indoc! {r#"
                pub unsafe extern "C" fn sign(mut x: i32) -> i32 {
                    'loop_1: while x > 100i32 {
                        x = x.wrapping_div(2i32);
                    }
                    if x < 0i32 {
                        return 2i32;
                    } else if x == 0i32 {
                        return 0i32;
                    } else {
                        return 1i32;
                    }
                    return 0;
                }
            "#}
        );
    }

    #[test]
    fn for_loop_continue_runs_the_step() {
        let code = generate_src_with(
            indoc! {"
                int sum(int n) {
                    int s = 0;
                    for (int i = 0; i < n; i++) {
                        if (i == 2) continue;
                        s += i;
                    }
                    return s;
                }
            "},
            &bare(),
        );
        assert_eq!(
            function(&code, "sum"),
            indoc! {r#"
                pub unsafe extern "C" fn sum(mut n: i32) -> i32 {
                    let mut s: i32 = 0i32;
                    {
                        let mut i: i32 = 0i32;
                        'loop_1: while i < n {
                            'cont_1: {
                                if i == 2i32 {
                                    break 'cont_1;
                                }
                                s = s.wrapping_add(i);
                            }
                            i = i.wrapping_add(1);
                        }
                    }
                    return s;
                }
            "#}
        );
    }

    #[test]
    fn do_while_checks_after_the_body() {
        let code = generate_src_with("void f(int n) { do { n--; } while (n > 0); }", &bare());
        let body = function(&code, "f");
        assert!(body.contains("'loop_1: loop {"));
        assert!(body.contains("'cont_1: {"));
        assert!(body.contains("n = n.wrapping_sub(1);"));
        assert!(body.contains("if !(n > 0i32) {"));
        assert!(body.contains("break 'loop_1;"));
    }

    #[test]
    fn switch_falls_through() {
        let code = generate_src_with(
            indoc! {"
                int classify(int c) {
                    int r = 0;
                    switch (c) {
                    case 1:
                        r = 10;
                    case 2:
                        r = r + 1;
                        break;
                    default:
                        r = -1;
                    }
                    return r;
                }
            "},
            &bare(),
        );
        let body = function(&code, "classify");
        assert!(body.contains("let __switch_1: i32 = c;"));
        assert!(body.contains("'switch_1: {"));
        assert!(body.contains("let __entry_1: usize = match __switch_1 {"));
        assert!(body.contains("1 => 0,"));
        assert!(body.contains("2 => 1,"));
        assert!(body.contains("_ => 2,"));
        assert!(body.contains("if __entry_1 <= 0 {"));
        assert!(body.contains("if __entry_1 <= 1 {"));
        assert!(body.contains("break 'switch_1;"));
    }

    #[test]
    fn switch_without_default_skips_every_segment() {
        let code = generate_src_with("void f(int c) { switch (c) { case 5: c = 1; } }", &bare());
        assert!(function(&code, "f").contains("_ => 1,"));
    }

    #[test]
    fn switch_body_declarations_are_hoisted() {
        let code = generate_src_with(
            "int f(int c) { switch (c) { case 0: return 9; default: ; int t = c * 2; return t; } return 0; }",
            &bare(),
        );
        let body = function(&code, "f");
        let hoisted = body.find(": i32 = 0;").expect("hoisted declaration");
        let label = body.find("'switch_1: {").expect("switch label");
        assert!(hoisted < label);
        assert!(body.contains(" = c.wrapping_mul(2i32);"));
    }

    #[test]
    fn local_static_and_enum() {
        let code = generate_src_with(
            "int next(void) { enum { STEP = 2 }; static int n = 1; n += STEP; return n; }",
            &bare(),
        );
        let body = function(&code, "next");
        assert!(body.contains("const STEP: i32 = 2;"));
        assert!(body.contains("static mut n: i32 = 1i32;"));
        assert!(body.contains("n = n.wrapping_add(STEP);"));
    }

    #[test]
    fn locals_shadowing_globals_are_renamed() {
        let code = generate_src_with("int x; int f(void) { int x = 1; return x; }", &bare());
        let body = function(&code, "f");
        assert!(body.contains("let mut x_"));
        assert!(!body.contains("let mut x:"));
    }

    // ─── Expressions ────────────────────────────────────────────

    #[test]
    fn comparisons_and_logic_produce_int() {
        let code = generate_src_with("int f(int a, int b) { return a < b && b != 0; }", &bare());
        assert!(function(&code, "f").contains("return (a < b && b != 0i32) as i32;"));
    }

    #[test]
    fn logical_not_on_pointer() {
        let code = generate_src_with("int f(int *p) { return !p; }", &bare());
        assert!(function(&code, "f").contains("return (p.is_null()) as i32;"));
    }

    #[test]
    fn implicit_conversions_use_as() {
        let code = generate_src_with("double f(char c, long l) { return c + l; }", &bare());
        let body = function(&code, "f");
        assert!(body.contains("as i64"));
        assert!(body.contains(".wrapping_add(l) as f64;"));
    }

    #[test]
    fn pointer_arithmetic_and_subscripts() {
        let code = generate_src_with(
            indoc! {"
                int f(int *p, int i) {
                    int a[4];
                    a[i] = p[i + 1];
                    return *(p + 2) + (int)(&a[3] - &a[0]);
                }
            "},
            &bare(),
        );
        let body = function(&code, "f");
        assert!(body.contains("a["));
        assert!(body.contains(" as usize] = (*p.wrapping_offset("));
        assert!(body.contains("(*p.wrapping_offset("));
        assert!(body.contains("::core::ptr::addr_of_mut!(a["));
        assert!(body.contains(".offset_from(::core::ptr::addr_of_mut!(a["));
        assert!(body.contains("as i64) as i32"));
    }

    #[test]
    fn members_through_pointers() {
        let code = generate_src_with(
            "struct s { int v; struct s *next; }; int f(struct s *p) { return p->next->v + (*p).v; }",
            &bare(),
        );
        assert!(function(&code, "f").contains("return (*(*p).next).v.wrapping_add((*p).v);"));
    }

    #[test]
    fn increment_used_as_value_becomes_a_block() {
        let code = generate_src_with("int f(int i) { int j = i++; return ++j; }", &bare());
        let body = function(&code, "f");
        assert!(body.contains("let mut j: i32 = { let __t1 = i; i = __t1.wrapping_add(1); __t1 };"));
        assert!(body.contains("return { j = j.wrapping_add(1); j };"));
    }

    #[test]
    fn side_effecting_places_are_evaluated_once() {
        let code = generate_src_with("void f(int *a, int i) { a[i++] += 5; }", &bare());
        let body = function(&code, "f");
        // The index temporary is numbered before the place pointer.
        assert!(body.contains("let __t1 = i;"));
        assert!(body.contains("let __p2 = ::core::ptr::addr_of_mut!((*a.wrapping_offset("));
        assert!(body.contains("(*__p2) = (*__p2).wrapping_add(5i32);"));
    }

    #[test]
    fn chained_assignment() {
        let code = generate_src_with("void f(int a, int b) { a = b = 3; }", &bare());
        assert!(function(&code, "f").contains("a = { b = 3i32; b };"));
    }

    #[test]
    fn compound_assignment_on_narrow_type() {
        let code = generate_src_with("void f(char c) { c += 1; }", &bare());
        assert!(function(&code, "f").contains("c = (c as i32).wrapping_add(1i32) as i8;"));
    }

    #[test]
    fn address_of_and_function_pointers() {
        let code = generate_src_with(
            indoc! {"
                int twice(int x) { return x * 2; }
                int apply(int (*fp)(int), int v) { return fp(v); }
                int g(void) { int n = 1; int *p = &n; return apply(twice, *p); }
            "},
            &bare(),
        );
        assert!(code.contains("mut fp: Option<unsafe extern \"C\" fn(i32) -> i32>"));
        assert!(function(&code, "apply").contains("return fp.unwrap()(v);"));
        let g = function(&code, "g");
        assert!(g.contains("let mut p: *mut i32 = ::core::ptr::addr_of_mut!(n);"));
        assert!(g.contains("apply(Some(twice as unsafe extern \"C\" fn(i32) -> i32), (*p))"));
    }

    #[test]
    fn null_pointer_constants() {
        let code = generate_src_with("int f(int *p) { if (p == 0) return 1; p = 0; return 0; }", &bare());
        let body = function(&code, "f");
        assert!(body.contains("if p == ::core::ptr::null_mut::<i32>() {"));
        assert!(body.contains("p = ::core::ptr::null_mut::<i32>();"));
    }

    #[test]
    fn sizeof_uses_size_of() {
        let code = generate_src_with("unsigned long f(void) { return sizeof(int) + sizeof(double); }", &bare());
        assert!(function(&code, "f").contains("::core::mem::size_of::<i32>() as u64"));
    }

    #[test]
    fn string_literal_arguments() {
        let code = generate_src_with(
            "int printf(const char *fmt, ...); void f(void) { printf(\"%d\\n\", 42); }",
            &bare(),
        );
        assert!(function(&code, "f").contains("printf(b\"%d\\n\\0\".as_ptr() as *mut i8, 42i32);"));
    }

    #[test]
    fn float_arguments_to_variadics_are_doubles() {
        let code = generate_src_with("int printf(const char *fmt, ...); void f(float x) { printf(\"%f\", x); }", &bare());
        assert!(function(&code, "f").contains("x as f64"));
    }

    #[test]
    fn conditional_expression() {
        let code = generate_src_with("int max(int a, int b) { return a > b ? a : b; }", &bare());
        assert!(function(&code, "max").contains("return if a > b { a } else { b };"));
    }

    #[test]
    fn rust_keywords_become_raw_identifiers() {
        let code = generate_src_with("int first(int match) { return match; }", &bare());
        assert!(code.contains("mut r#match: i32"));
        assert!(code.contains("return r#match;"));
    }
}

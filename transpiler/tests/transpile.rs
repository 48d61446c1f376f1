use std::ffi::{CStr, c_char};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use indoc::indoc;
use model::{DiagnosticKind, Severity};
use pretty_assertions::assert_eq;
use transpiler::ffi::{oxcc__free, oxcc__transpile, oxcc_transpiler__free, oxcc_transpiler__new, oxcc_transpiler__transpile};
use transpiler::{Status, TranspileError, Transpiler, transpile};

static NEXT_FIXTURE: AtomicUsize = AtomicUsize::new(0);

/// Writes `source` to a fresh file under the system temp directory.
fn fixture(source: &str) -> PathBuf {
    let n = NEXT_FIXTURE.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("oxcc-{}-{n}.c", std::process::id()));
    std::fs::write(&path, source).expect("write fixture");
    path
}

const ADD: &str = "int add(int a, int b) { return a + b; }";

// ─── Rust API ───────────────────────────────────────────────────

#[test]
fn add_transpiles_cleanly() {
    let path = fixture(ADD);
    let out = transpile(&path).expect("transpiles");
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
    assert!(out.code.contains("pub unsafe extern \"C\" fn add(mut a: i32, mut b: i32) -> i32 {"));
    assert!(out.code.contains("return a.wrapping_add(b);"));
}

#[test]
fn undeclared_identifier_gives_one_diagnostic() {
    let err = Transpiler::new().transpile(fixture("int x = y;")).unwrap_err();
    assert_eq!(err.status(), Status::Semantic);
    let TranspileError::Semantic(diagnostics) = &err else {
        panic!("expected a semantic error, got {err:?}");
    };
    assert_eq!(diagnostics.len(), 1);
    let d = &diagnostics[0];
    assert_eq!(d.kind, DiagnosticKind::Semantic);
    assert_eq!((d.span.start.line, d.span.start.column), (1, 9));
}

#[test]
fn syntax_error_recovers_at_semicolon() {
    let source = indoc! {"
        int x = ;
        int y = 2;
        int z = ;
    "};
    let err = Transpiler::new().transpile_source("recover.c", source).unwrap_err();
    assert_eq!(err.status(), Status::Parse);
    let syntax: Vec<_> = err
        .diagnostics()
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Syntax && d.severity == Severity::Error)
        .collect();
    assert_eq!(syntax.len(), 2, "{syntax:?}");
    assert_eq!(syntax[0].span.start.line, 1);
    assert_eq!(syntax[1].span.start.line, 3);
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join("oxcc-definitely-missing.c");
    let err = transpile(&path).unwrap_err();
    assert_eq!(err.status(), Status::Io);
}

#[test]
fn reused_transpiler_does_not_leak_symbols() {
    let transpiler = Transpiler::new();
    transpiler.transpile(fixture("int shared(void) { return 1; }")).expect("first");
    let err = transpiler.transpile(fixture("int g(void) { return shared(); }")).unwrap_err();
    assert_eq!(err.status(), Status::Semantic);
    let again = transpiler.transpile(fixture(ADD)).expect("third");
    assert_eq!(again.code, transpile(fixture(ADD)).expect("one-shot").code);
}

#[test]
fn transpiler_is_shared_across_threads() {
    let transpiler = Transpiler::new();
    let path = fixture(ADD);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| transpiler.transpile(&path))).collect();
        for handle in handles {
            let out = handle.join().expect("thread").expect("transpiles");
            assert!(out.code.contains("a.wrapping_add(b)"));
        }
    });
}

#[test]
fn full_program() {
    let source = indoc! {r#"
        #include <stdio.h>

        int printf(const char *fmt, ...);

        struct point { int x; int y; };
        typedef struct point point;

        static int count;

        int dist2(point *p) {
            return p->x * p->x + p->y * p->y;
        }

        int main(int argc, char **argv) {
            point pts[3] = {{1, 2}, {3, 4}};
            int total = 0;
            for (int i = 0; i < 3; i++) {
                switch (i) {
                case 0:
                    total += dist2(&pts[i]);
                    break;
                default:
                    total -= 1;
                }
                count++;
            }
            printf("%d %d\n", total, count);
            return total > 100;
        }
    "#};
    let out = Transpiler::new().transpile_source("program.c", source).expect("transpiles");
    assert_eq!(out.diagnostics.len(), 1, "only the include warning: {:?}", out.diagnostics);
    let code = &out.code;
    assert!(code.contains("pub struct point {"));
    assert!(code.contains("static mut count: i32 = 0;"));
    assert!(code.contains("pub fn printf(_: *mut i8, ...) -> i32;"));
    assert!(code.contains("pub unsafe extern \"C\" fn main_0(mut argc: i32, mut argv: *mut *mut i8) -> i32 {"));
    assert!(code.contains("let mut pts: [point; 3] = [point { x: 1i32, y: 2i32 }, point { x: 3i32, y: 4i32 }, unsafe { ::core::mem::zeroed::<point>() }];"));
    assert!(code.contains("'switch_"));
    assert!(code.contains("pub fn main() {"));
}

// ─── C ABI ──────────────────────────────────────────────────────

fn call_one_shot(path: &str) -> (Status, Option<String>) {
    let mut code: *mut c_char = std::ptr::null_mut();
    let mut len = 0usize;
    let status = unsafe { oxcc__transpile(path.as_ptr().cast::<c_char>(), path.len(), &mut code, &mut len) };
    if code.is_null() {
        return (status, None);
    }
    let text = unsafe { CStr::from_ptr(code) }.to_str().expect("utf-8").to_string();
    assert_eq!(text.len(), len);
    unsafe { oxcc__free(code) };
    (status, Some(text))
}

#[test]
fn ffi_one_shot() {
    let path = fixture(ADD);
    let (status, code) = call_one_shot(path.to_str().expect("utf-8 path"));
    assert_eq!(status, Status::Ok);
    assert!(code.expect("code").contains("a.wrapping_add(b)"));
}

#[test]
fn ffi_reports_failures_without_output() {
    let path = fixture("int x = y;");
    assert_eq!(call_one_shot(path.to_str().expect("utf-8 path")), (Status::Semantic, None));
    assert_eq!(call_one_shot(""), (Status::Invalid, None));
}

#[test]
fn ffi_rejects_null_and_non_utf8() {
    let mut code: *mut c_char = std::ptr::null_mut();
    let mut len = 0usize;
    let status = unsafe { oxcc__transpile(std::ptr::null(), 4, &mut code, &mut len) };
    assert_eq!(status, Status::Invalid);
    let bad = [0xffu8, 0xfe];
    let status = unsafe { oxcc__transpile(bad.as_ptr().cast::<c_char>(), bad.len(), &mut code, &mut len) };
    assert_eq!(status, Status::Invalid);
    assert!(code.is_null());
}

#[test]
fn ffi_reusable_transpiler() {
    let path = fixture(ADD);
    let path = path.to_str().expect("utf-8 path");
    unsafe {
        let transpiler = oxcc_transpiler__new();
        for _ in 0..2 {
            let mut code: *mut c_char = std::ptr::null_mut();
            let mut len = 0usize;
            let status = oxcc_transpiler__transpile(transpiler, path.as_ptr().cast::<c_char>(), path.len(), &mut code, &mut len);
            assert_eq!(status, Status::Ok);
            assert!(!code.is_null());
            oxcc__free(code);
        }
        oxcc_transpiler__free(transpiler);
        oxcc_transpiler__free(std::ptr::null_mut());
        oxcc__free(std::ptr::null_mut());
    }
}

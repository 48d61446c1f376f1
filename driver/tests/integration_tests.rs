use std::path::PathBuf;
use std::process::{Command, Output};

use indoc::indoc;
use pretty_assertions::assert_eq;

fn write_source(name: &str, source: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("oxcc-driver-{}-{name}", std::process::id()));
    std::fs::write(&path, source).expect("Failed to write source");
    path
}

fn run_driver(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_oxcc"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run driver")
}

const PROGRAM: &str = indoc! {"
    int square(int x) { return x * x; }
    int main(void) { return square(3); }
"};

#[test]
fn transpiles_to_stdout() {
    let path = write_source("stdout.c", PROGRAM);
    let output = run_driver(&[path.to_str().unwrap()]);
    assert!(output.status.success());
    let code = String::from_utf8(output.stdout).unwrap();
    assert!(code.contains("pub unsafe extern \"C\" fn square(mut x: i32) -> i32 {"));
    assert!(code.contains("pub fn main() {"));
}

#[test]
fn writes_output_file() {
    let path = write_source("file.c", PROGRAM);
    let out = std::env::temp_dir().join(format!("oxcc-driver-{}-file.rs", std::process::id()));
    let output = run_driver(&[path.to_str().unwrap(), "-o", out.to_str().unwrap(), "--no-header"]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let code = std::fs::read_to_string(&out).unwrap();
    assert!(code.starts_with("#![allow("));
}

#[test]
fn check_produces_no_code() {
    let path = write_source("check.c", PROGRAM);
    let output = run_driver(&["--check", path.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn lex_prints_tokens() {
    let path = write_source("lex.c", "int x;");
    let output = run_driver(&["--lex", path.to_str().unwrap()]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4, "{text}");
    assert!(lines[0].starts_with("1:1\t"));
}

#[test]
fn semantic_error_fails_with_diagnostic() {
    let path = write_source("undeclared.c", "int x = y;");
    let output = run_driver(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("1:9: error (semantic): use of undeclared identifier 'y'"), "{stderr}");
    assert_eq!(stderr.matches("1 semantic error(s)").count(), 1, "{stderr}");
}

#[test]
fn parse_reports_syntax_errors() {
    let path = write_source("syntax.c", "int x = ;");
    let output = run_driver(&["--parse", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error (syntax)"), "{stderr}");
}

#[test]
fn missing_input_fails() {
    let output = run_driver(&["/nonexistent/oxcc/input.c"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("failed to read"), "{stderr}");
}

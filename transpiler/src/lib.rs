// Transpiler facade: runs lexer, parser, resolver and generator over one
// C file and hands back Rust source or the diagnostics that stopped it.
//
// - lib.rs: Transpiler, TranspileOutput, TranspileError, Status
// - ffi.rs: the C ABI over Transpiler

pub mod ffi;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub use codegen::GeneratorOptions;
use lexer::KeywordTable;
use model::{Diagnostic, DiagnosticKind, Diagnostics, Type};
use thiserror::Error;
use tracing::debug;

/// Status codes shared by the Rust API and the C ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Success
    Ok = 0,
    /// Provided arguments are not valid
    Invalid,
    /// The source file could not be read
    Io,
    /// The source has lexical errors
    Lex,
    /// The source has syntax errors
    Parse,
    /// The source has semantic errors
    Semantic,
}

#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid source path")]
    InvalidPath,
    #[error("{} lexical error(s)", error_count(.0))]
    Lex(Vec<Diagnostic>),
    #[error("{} syntax error(s)", error_count(.0))]
    Parse(Vec<Diagnostic>),
    #[error("{} semantic error(s)", error_count(.0))]
    Semantic(Vec<Diagnostic>),
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

impl TranspileError {
    pub fn status(&self) -> Status {
        match self {
            TranspileError::Io(_) => Status::Io,
            TranspileError::InvalidPath => Status::Invalid,
            TranspileError::Lex(_) => Status::Lex,
            TranspileError::Parse(_) => Status::Parse,
            TranspileError::Semantic(_) => Status::Semantic,
        }
    }

    /// Every diagnostic collected before the pipeline stopped, warnings
    /// included.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TranspileError::Lex(d) | TranspileError::Parse(d) | TranspileError::Semantic(d) => d,
            TranspileError::Io(_) | TranspileError::InvalidPath => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOutput {
    pub code: String,
    /// Warnings only; any error stops generation.
    pub diagnostics: Vec<Diagnostic>,
}

/// Tables built once and shared by every call.
#[derive(Debug)]
struct SharedTables {
    keywords: KeywordTable,
    typedefs: HashMap<String, Type>,
}

impl SharedTables {
    fn new() -> Self {
        Self {
            keywords: KeywordTable::standard(),
            typedefs: builtin_typedefs(),
        }
    }
}

/// Typedef names usable without their headers, since `#include` lines are
/// skipped.
pub fn builtin_typedefs() -> HashMap<String, Type> {
    [
        ("size_t", Type::ULong),
        ("ssize_t", Type::Long),
        ("ptrdiff_t", Type::Long),
        ("intptr_t", Type::Long),
        ("uintptr_t", Type::ULong),
        ("int8_t", Type::SChar),
        ("uint8_t", Type::UChar),
        ("int16_t", Type::Short),
        ("uint16_t", Type::UShort),
        ("int32_t", Type::Int),
        ("uint32_t", Type::UInt),
        ("int64_t", Type::Long),
        ("uint64_t", Type::ULong),
    ]
    .into_iter()
    .map(|(name, ty)| (name.to_string(), ty))
    .collect()
}

/// Reusable transpiler. Cloning is cheap and every call starts from a fresh
/// tree and symbol table, so one instance can serve many threads.
#[derive(Debug, Clone)]
pub struct Transpiler {
    shared: Arc<SharedTables>,
    options: GeneratorOptions,
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Transpiler {
    pub fn new() -> Self {
        Self::with_options(GeneratorOptions::default())
    }

    pub fn with_options(options: GeneratorOptions) -> Self {
        Self {
            shared: Arc::new(SharedTables::new()),
            options,
        }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn transpile(&self, path: impl AsRef<Path>) -> Result<TranspileOutput, TranspileError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(TranspileError::InvalidPath);
        }
        let source = std::fs::read(path)?;
        self.transpile_source(&path.display().to_string(), &source)
    }

    /// Runs the pipeline over in-memory text; `name` only labels log output.
    pub fn transpile_source<S: AsRef<[u8]> + ?Sized>(
        &self,
        name: &str,
        source: &S,
    ) -> Result<TranspileOutput, TranspileError> {
        let shared = &*self.shared;
        let mut diags = Diagnostics::new();

        // Lexical and syntax errors are reported together.
        let tokens = lexer::lex_with(source, &shared.keywords, &mut diags);
        let mut unit = parser::parse_with_typedefs(&tokens, &shared.typedefs, &mut diags);
        if diags.has_errors_of(DiagnosticKind::Lex) {
            return Err(fail(name, TranspileError::Lex, diags));
        }
        if diags.has_errors_of(DiagnosticKind::Syntax) {
            return Err(fail(name, TranspileError::Parse, diags));
        }

        let resolution = semantic::resolve_with_builtins(&mut unit, &shared.typedefs, &mut diags);
        if diags.has_errors() {
            return Err(fail(name, TranspileError::Semantic, diags));
        }

        let code = codegen::generate_with(&unit, &resolution, &self.options);
        debug!(file = name, bytes = code.len(), warnings = diags.len(), "transpiled");
        Ok(TranspileOutput {
            code,
            diagnostics: diags.into_vec(),
        })
    }
}

fn fail(name: &str, variant: fn(Vec<Diagnostic>) -> TranspileError, diags: Diagnostics) -> TranspileError {
    let error = variant(diags.into_vec());
    debug!(file = name, status = ?error.status(), "{error}");
    error
}

/// One-shot form of [`Transpiler::transpile`].
pub fn transpile(path: impl AsRef<Path>) -> Result<TranspileOutput, TranspileError> {
    Transpiler::new().transpile(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Severity;
    use pretty_assertions::assert_eq;

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(TranspileError::InvalidPath.status(), Status::Invalid);
        assert_eq!(TranspileError::Lex(Vec::new()).status(), Status::Lex);
        assert_eq!(TranspileError::Parse(Vec::new()).status(), Status::Parse);
        assert_eq!(TranspileError::Semantic(Vec::new()).status(), Status::Semantic);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(TranspileError::from(io).status(), Status::Io);
        assert_eq!(Status::Ok as i32, 0);
    }

    #[test]
    fn builtin_typedefs_need_no_header() {
        let out = Transpiler::new()
            .transpile_source("sizes.c", "#include <stddef.h>\nsize_t len(size_t n) { return n; }")
            .expect("transpiles");
        assert!(out.code.contains("fn len(mut n: u64) -> u64"));
        assert!(out.diagnostics.iter().all(|d| d.severity == Severity::Warning));
        assert_eq!(out.diagnostics.len(), 1, "{:?}", out.diagnostics);
    }

    #[test]
    fn lexical_errors_win_over_syntax_errors() {
        let err = Transpiler::new().transpile_source("bad.c", "int x = @;").unwrap_err();
        assert_eq!(err.status(), Status::Lex);
        assert!(err.diagnostics().iter().any(|d| d.kind == DiagnosticKind::Lex));
    }

    #[test]
    fn error_message_counts_errors() {
        let err = Transpiler::new().transpile_source("bad.c", "int f(void) { return a + b; }").unwrap_err();
        assert_eq!(err.to_string(), "2 semantic error(s)");
    }

    #[test]
    fn options_reach_the_generator() {
        let transpiler = Transpiler::with_options(GeneratorOptions {
            emit_header_comment: false,
            emit_main_wrapper: true,
        });
        let out = transpiler.transpile_source("m.c", "int main(void) { return 3; }").expect("transpiles");
        assert!(out.code.starts_with("#![allow("));
        assert!(out.code.contains("pub fn main() {"));
    }

    #[test]
    fn empty_path_is_invalid() {
        let err = Transpiler::new().transpile("").unwrap_err();
        assert_eq!(err.status(), Status::Invalid);
    }
}

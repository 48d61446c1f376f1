//! Data shared by every phase: tokens and positions, the syntax tree, C types,
//! symbols and scopes, and diagnostics.

mod ast;
mod const_eval;
mod diagnostics;
mod symbols;
mod token;
mod types;

pub use ast::*;
pub use const_eval::{ConstEnv, const_eval, truncate};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use symbols::{Scope, ScopeId, StorageKind, Symbol, SymbolId, SymbolTable};
pub use token::{IntegerSuffix, Position, Span, Token, TokenKind};
pub use types::{FunctionType, RecordField, RecordKind, RecordLayout, Type, TypeTable};

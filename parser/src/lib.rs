// Parser module: Converts a list of tokens into an abstract syntax tree (AST)
//
// Module organization:
// - parser.rs: Core Parser struct, typedef-name scopes, panic-mode recovery
// - types.rs: Declaration specifiers, struct/union/enum specifiers, type names
// - declarations.rs: Declarators, initializers, external declarations
// - expressions.rs: Expression parsing with precedence climbing
// - statements.rs: Statement parsing (if, while, for, switch, return, etc.)

mod declarations;
mod expressions;
mod parser;
mod statements;
mod types;

use std::collections::HashMap;

use model::{Diagnostics, Token, TranslationUnit, Type};
use parser::Parser;
use tracing::debug;

/// Parse a token stream into a translation unit.
///
/// Syntax errors are recorded in `diags`; the parser resynchronizes and keeps
/// going, so the returned tree holds every item it could recover.
pub fn parse(tokens: &[Token], diags: &mut Diagnostics) -> TranslationUnit {
    parse_with_typedefs(tokens, &HashMap::new(), diags)
}

/// Like [`parse`], with `typedefs` already declared at file scope.
pub fn parse_with_typedefs(tokens: &[Token], typedefs: &HashMap<String, Type>, diags: &mut Diagnostics) -> TranslationUnit {
    let before = diags.error_count();
    let unit = Parser::new(tokens, typedefs, diags).parse_translation_unit();
    debug!(
        items = unit.items.len(),
        errors = diags.error_count() - before,
        "parsed translation unit"
    );
    unit
}

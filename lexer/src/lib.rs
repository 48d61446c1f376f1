mod keywords;
mod literals;
mod state_machine;

use model::{DiagnosticKind, Diagnostics, Token, TokenKind};
use tracing::debug;

pub use keywords::{KEYWORDS, KeywordTable};
pub use state_machine::StateMachineLexer;

pub type Tokens<'a> = StateMachineLexer<'a>;

/// Lazy token sequence over `source`, using the standard keyword table.
pub fn tokenize<S: AsRef<[u8]> + ?Sized>(source: &S) -> Tokens<'_> {
    StateMachineLexer::new(source.as_ref(), &KEYWORDS)
}

pub fn tokenize_with<'a, S: AsRef<[u8]> + ?Sized>(source: &'a S, keywords: &'a KeywordTable) -> Tokens<'a> {
    StateMachineLexer::new(source.as_ref(), keywords)
}

/// Main lexer entry point: collects the token sequence for the parser.
/// Error tokens become Lex diagnostics and are kept so the parser can
/// resynchronize; directive lines become warnings and are dropped.
pub fn lex<S: AsRef<[u8]> + ?Sized>(source: &S, diags: &mut Diagnostics) -> Vec<Token> {
    lex_with(source, &KEYWORDS, diags)
}

pub fn lex_with<S: AsRef<[u8]> + ?Sized>(source: &S, keywords: &KeywordTable, diags: &mut Diagnostics) -> Vec<Token> {
    let mut tokens = Vec::new();
    for token in tokenize_with(source, keywords) {
        match &token.kind {
            TokenKind::Error(msg) => {
                diags.error(DiagnosticKind::Lex, token.span, msg.clone());
                tokens.push(token);
            }
            TokenKind::Directive(text) => {
                diags.warning(
                    DiagnosticKind::Lex,
                    token.span,
                    format!("preprocessor directive ignored: {text}"),
                );
            }
            _ => tokens.push(token),
        }
    }
    debug!(tokens = tokens.len(), diagnostics = diags.len(), "lexed source");
    tokens
}

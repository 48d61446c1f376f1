use std::collections::HashMap;

use model::{
    ConstEnv, Declaration, DiagnosticKind, Diagnostics, EnumDef, ExternalDecl, Position, RecordDef, Span,
    StorageClass, Token, TokenKind, TranslationUnit, Type, TypeTable,
};
use tracing::trace;

use crate::declarations::DeclarationParser;

/// Marker for a syntax error whose diagnostic has already been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SyntaxError;

pub(crate) type PResult<T> = Result<T, SyntaxError>;

/// Core parser struct that maintains parsing state
pub(crate) struct Parser<'a> {
    pub(crate) tokens: &'a [Token],
    pub(crate) pos: usize,
    pub(crate) diags: &'a mut Diagnostics,
    /// Ordinary-identifier namespace per block: `true` marks a typedef name,
    /// `false` an object, function or enumerator shadowing one.
    pub(crate) scopes: Vec<HashMap<String, bool>>,
    /// Records and typedefs seen so far, for `sizeof` in array bounds.
    pub(crate) types: TypeTable,
    pub(crate) enum_values: HashMap<String, i64>,
    pub(crate) pending_records: Vec<RecordDef>,
    pub(crate) pending_enums: Vec<EnumDef>,
    pub(crate) anon_counter: usize,
    eof: Token,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], typedefs: &HashMap<String, Type>, diags: &'a mut Diagnostics) -> Self {
        let end = tokens.last().map_or(Position::START, |t| t.span.end);
        let mut file_scope = HashMap::new();
        for name in typedefs.keys() {
            file_scope.insert(name.clone(), true);
        }
        Parser {
            tokens,
            pos: 0,
            diags,
            scopes: vec![file_scope],
            types: TypeTable::with_builtins(typedefs),
            enum_values: HashMap::new(),
            pending_records: Vec::new(),
            pending_enums: Vec::new(),
            anon_counter: 0,
            eof: Token::new(TokenKind::Eof, Span::new(end, end)),
        }
    }

    /// Parse the entire translation unit, recovering at item boundaries.
    pub fn parse_translation_unit(&mut self) -> TranslationUnit {
        let mut items = Vec::new();
        while !self.is_at_end() {
            let start = self.pos;
            match self.parse_external_declaration() {
                Ok(item) => {
                    self.flush_pending_into(&mut items);
                    items.push(item);
                }
                Err(SyntaxError) => {
                    self.pending_records.clear();
                    self.pending_enums.clear();
                    self.skip_top_level_item();
                    if self.pos == start {
                        self.advance();
                    }
                }
            }
        }
        trace!(items = items.len(), "parsed translation unit");
        TranslationUnit { items }
    }

    /// Records defined somewhere other than a declaration's own specifiers
    /// (for example in a function's return type) get their own item.
    fn flush_pending_into(&mut self, items: &mut Vec<ExternalDecl>) {
        if let Some(decl) = self.take_pending_declaration() {
            items.push(ExternalDecl::Declaration(decl));
        }
    }

    pub(crate) fn take_pending_declaration(&mut self) -> Option<Declaration> {
        if self.pending_records.is_empty() && self.pending_enums.is_empty() {
            return None;
        }
        let span = self
            .pending_records
            .first()
            .map(|r| r.span)
            .or_else(|| self.pending_enums.first().map(|e| e.span))
            .unwrap_or_default();
        Some(Declaration {
            storage: StorageClass::None,
            base: Type::Int,
            records: std::mem::take(&mut self.pending_records),
            enums: std::mem::take(&mut self.pending_enums),
            declarators: Vec::new(),
            span,
        })
    }

    // ─── Typedef-name tracking ──────────────────────────────────

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub(crate) fn declare_name(&mut self, name: &str, is_typedef: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), is_typedef);
        }
    }

    pub(crate) fn is_typedef_name(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .unwrap_or(false)
    }

    pub(crate) fn next_anon_tag(&mut self) -> String {
        self.anon_counter += 1;
        format!("__anon_{}", self.anon_counter)
    }

    // ─── Diagnostics and recovery ───────────────────────────────

    /// Records a syntax error at the current token. Lexer error tokens were
    /// already reported, so they are not reported twice.
    pub(crate) fn error_here(&mut self, message: impl Into<String>) -> SyntaxError {
        let span = self.peek().span;
        if !matches!(self.peek().kind, TokenKind::Error(_)) {
            self.diags.error(DiagnosticKind::Syntax, span, message);
        }
        SyntaxError
    }

    pub(crate) fn error_at(&mut self, span: Span, message: impl Into<String>) {
        self.diags.error(DiagnosticKind::Syntax, span, message);
    }

    /// Statement-level panic mode: skip to just past the next `;`, past a
    /// balanced `{ }`, or up to an unmatched `}`.
    pub(crate) fn synchronize_statement(&mut self) {
        self.skip_until_boundary(false);
    }

    /// Same boundaries as statements, but a stray `}` at file scope is consumed.
    pub(crate) fn skip_top_level_item(&mut self) {
        self.skip_until_boundary(true);
    }

    fn skip_until_boundary(&mut self, consume_stray_close: bool) {
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::OpenBrace => {
                    self.skip_balanced(&TokenKind::OpenBrace, &TokenKind::CloseBrace);
                    return;
                }
                TokenKind::CloseBrace => {
                    if consume_stray_close {
                        self.advance();
                    }
                    return;
                }
                TokenKind::OpenParenthesis => {
                    self.skip_balanced(&TokenKind::OpenParenthesis, &TokenKind::CloseParenthesis);
                }
                TokenKind::OpenBracket => {
                    self.skip_balanced(&TokenKind::OpenBracket, &TokenKind::CloseBracket);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn skip_balanced(&mut self, open: &TokenKind, close: &TokenKind) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            let kind = &self.peek().kind;
            if kind == open {
                depth += 1;
            } else if kind == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    self.advance();
                    return;
                }
            }
            self.advance();
        }
    }

    // ─── Token navigation utilities ─────────────────────────────

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind.is_eof()
    }

    pub(crate) fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    pub(crate) fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&self.eof)
    }

    pub(crate) fn previous(&self) -> &Token {
        match self.pos.checked_sub(1) {
            Some(i) => self.tokens.get(i).unwrap_or(&self.eof),
            None => self.peek(),
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous()
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    pub(crate) fn check_at(&self, offset: usize, kind: &TokenKind) -> bool {
        &self.peek_at(offset).kind == kind
    }

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> PResult<Span> {
        if self.check(kind) {
            Ok(self.advance().span)
        } else {
            let found = self.peek().kind.to_string();
            Err(self.error_here(format!("expected {kind}, found {found}")))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> PResult<(String, Span)> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Ok((name, span))
            }
            other => {
                let found = other.to_string();
                Err(self.error_here(format!("expected identifier, found {found}")))
            }
        }
    }

    pub(crate) fn start(&self) -> Position {
        self.peek().span.start
    }

    /// Span from `start` to the end of the last consumed token.
    pub(crate) fn span_from(&self, start: Position) -> Span {
        let end = self.previous().span.end;
        if end.offset < start.offset {
            Span::new(start, start)
        } else {
            Span::new(start, end)
        }
    }
}

impl ConstEnv for Parser<'_> {
    fn enum_constant(&self, name: &str) -> Option<i64> {
        self.enum_values.get(name).copied()
    }

    fn size_of(&self, ty: &Type) -> Option<u64> {
        self.types.size_of(ty)
    }

    fn canonical(&self, ty: &Type) -> Type {
        self.types.canonical(ty)
    }
}

use model::{Position, Span, Token, TokenKind};

use crate::keywords::{KeywordTable, keyword_or_identifier};
use crate::literals::{decode_escape, parse_char_literal, parse_float_literal, parse_int_constant};

/// Lazy token stream over a byte buffer, ending with exactly one `Eof`.
/// A clone resumes from the same position.
#[derive(Debug, Clone)]
pub struct StateMachineLexer<'a> {
    input: &'a [u8],
    keywords: &'a KeywordTable,
    pos: usize,
    line: u32,
    column: u32,
    token_start: Position,
    finished: bool,
}

impl<'a> StateMachineLexer<'a> {
    pub fn new(input: &'a [u8], keywords: &'a KeywordTable) -> Self {
        Self {
            input,
            keywords,
            pos: 0,
            line: 1,
            column: 1,
            token_start: Position::START,
            finished: false,
        }
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn current(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if let Some(b) = self.current() {
            self.pos += 1;
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if b & 0xC0 != 0x80 {
                // Continuation bytes of a UTF-8 sequence share the column.
                self.column += 1;
            }
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn make(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.token_start, self.here()))
    }

    fn text(&self) -> &'a [u8] {
        &self.input[self.token_start.offset..self.pos]
    }

    fn text_str(&self) -> String {
        String::from_utf8_lossy(self.text()).into_owned()
    }

    /// Skips whitespace and comments. An unterminated block comment
    /// becomes an error token.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match (self.current(), self.peek(1)) {
                (Some(b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C), _) => self.bump(),
                (Some(b'\\'), Some(b'\n')) => self.bump_n(2),
                (Some(b'/'), Some(b'/')) => {
                    while self.current().is_some_and(|b| b != b'\n') {
                        self.bump();
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    self.token_start = self.here();
                    self.bump_n(2);
                    loop {
                        match (self.current(), self.peek(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.bump_n(2);
                                break;
                            }
                            (Some(_), _) => self.bump(),
                            (None, _) => {
                                return Some(self.make(TokenKind::Error("unterminated comment".to_string())));
                            }
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn is_start_of_line(&self) -> bool {
        self.input[..self.pos]
            .iter()
            .rev()
            .find(|&&b| !matches!(b, b' ' | b'\t' | b'\r'))
            .is_none_or(|&b| b == b'\n')
    }

    fn lex_directive(&mut self) -> Token {
        while let Some(b) = self.current() {
            if b == b'\\' && self.peek(1) == Some(b'\n') {
                self.bump_n(2);
                continue;
            }
            if b == b'\n' {
                break;
            }
            self.bump();
        }
        let text = self.text_str().trim_end().to_string();
        self.make(TokenKind::Directive(text))
    }

    fn lex_string(&mut self) -> Token {
        self.bump(); // opening quote
        let mut value = Vec::new();
        loop {
            match self.current() {
                Some(b'"') => {
                    self.bump();
                    return self.make(TokenKind::StringLiteral(value));
                }
                Some(b'\\') if self.peek(1) == Some(b'\n') => self.bump_n(2),
                Some(b'\\') => {
                    let mut p = self.pos + 1;
                    match decode_escape(self.input, &mut p) {
                        Ok(byte) => {
                            value.push(byte);
                            self.bump_n(p - self.pos);
                        }
                        Err(msg) => {
                            self.bump_n(p - self.pos);
                            self.recover_quoted(b'"');
                            return self.make(TokenKind::Error(msg));
                        }
                    }
                }
                Some(b'\n') | None => {
                    return self.make(TokenKind::Error("missing terminating '\"' character".to_string()));
                }
                Some(b) => {
                    value.push(b);
                    self.bump();
                }
            }
        }
    }

    fn lex_char(&mut self) -> Token {
        self.bump(); // opening quote
        let content_start = self.pos;
        loop {
            match self.current() {
                Some(b'\'') => break,
                Some(b'\\') if self.peek(1).is_some_and(|b| b != b'\n') => self.bump_n(2),
                Some(b'\n') | None => {
                    return self.make(TokenKind::Error("missing terminating ' character".to_string()));
                }
                Some(_) => self.bump(),
            }
        }
        let content = &self.input[content_start..self.pos];
        self.bump(); // closing quote
        match parse_char_literal(content) {
            Ok(value) => self.make(TokenKind::CharLiteral(value)),
            Err(msg) => self.make(TokenKind::Error(msg)),
        }
    }

    // Skips to the closing quote on the same line after a bad escape.
    fn recover_quoted(&mut self, quote: u8) {
        while let Some(b) = self.current() {
            if b == b'\n' {
                return;
            }
            self.bump();
            if b == quote {
                return;
            }
        }
    }

    fn lex_number(&mut self) -> Token {
        let mut is_float = false;
        let hex_or_binary = self.current() == Some(b'0') && matches!(self.peek(1), Some(b'x' | b'X' | b'b' | b'B'));
        if hex_or_binary {
            self.bump_n(2);
        }
        loop {
            match self.current() {
                Some(b'.') if !hex_or_binary && !is_float => {
                    is_float = true;
                    self.bump();
                }
                Some(b'e' | b'E') if !hex_or_binary => {
                    is_float = true;
                    self.bump();
                    if matches!(self.current(), Some(b'+' | b'-')) {
                        self.bump();
                    }
                }
                // Digits, plus suffix letters which are validated afterwards.
                Some(b) if b.is_ascii_alphanumeric() || b == b'_' => self.bump(),
                _ => break,
            }
        }
        let text = self.text_str();
        let kind = if is_float {
            match parse_float_literal(&text) {
                Ok((value, single)) => TokenKind::FloatLiteral { value, single },
                Err(msg) => TokenKind::Error(msg),
            }
        } else {
            match parse_int_constant(&text) {
                Ok((value, suffix, decimal)) => TokenKind::IntLiteral { value, suffix, decimal },
                Err(msg) => TokenKind::Error(msg),
            }
        };
        self.make(kind)
    }

    fn lex_identifier(&mut self) -> Token {
        while self.current().is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_') {
            self.bump();
        }
        let text = self.text_str();
        self.make(keyword_or_identifier(&text, self.keywords))
    }

    fn lex_punctuator(&mut self) -> Token {
        use TokenKind::*;
        let (c0, c1, c2) = (self.current(), self.peek(1), self.peek(2));

        let three = match (c0, c1, c2) {
            (Some(b'.'), Some(b'.'), Some(b'.')) => Some(Ellipsis),
            (Some(b'<'), Some(b'<'), Some(b'=')) => Some(LessLessEqual),
            (Some(b'>'), Some(b'>'), Some(b'=')) => Some(GreaterGreaterEqual),
            _ => None,
        };
        if let Some(kind) = three {
            self.bump_n(3);
            return self.make(kind);
        }

        let two = match (c0, c1) {
            (Some(b'-'), Some(b'>')) => Some(Arrow),
            (Some(b'+'), Some(b'+')) => Some(PlusPlus),
            (Some(b'-'), Some(b'-')) => Some(MinusMinus),
            (Some(b'<'), Some(b'<')) => Some(LessLess),
            (Some(b'>'), Some(b'>')) => Some(GreaterGreater),
            (Some(b'<'), Some(b'=')) => Some(LessEqual),
            (Some(b'>'), Some(b'=')) => Some(GreaterEqual),
            (Some(b'='), Some(b'=')) => Some(EqualEqual),
            (Some(b'!'), Some(b'=')) => Some(BangEqual),
            (Some(b'&'), Some(b'&')) => Some(AndAnd),
            (Some(b'|'), Some(b'|')) => Some(OrOr),
            (Some(b'+'), Some(b'=')) => Some(PlusEqual),
            (Some(b'-'), Some(b'=')) => Some(MinusEqual),
            (Some(b'*'), Some(b'=')) => Some(StarEqual),
            (Some(b'/'), Some(b'=')) => Some(SlashEqual),
            (Some(b'%'), Some(b'=')) => Some(PercentEqual),
            (Some(b'&'), Some(b'=')) => Some(AndEqual),
            (Some(b'|'), Some(b'=')) => Some(OrEqual),
            (Some(b'^'), Some(b'=')) => Some(XorEqual),
            _ => None,
        };
        if let Some(kind) = two {
            self.bump_n(2);
            return self.make(kind);
        }

        let one = match c0 {
            Some(b'(') => Some(OpenParenthesis),
            Some(b')') => Some(CloseParenthesis),
            Some(b'{') => Some(OpenBrace),
            Some(b'}') => Some(CloseBrace),
            Some(b'[') => Some(OpenBracket),
            Some(b']') => Some(CloseBracket),
            Some(b';') => Some(Semicolon),
            Some(b',') => Some(Comma),
            Some(b':') => Some(Colon),
            Some(b'?') => Some(Question),
            Some(b'.') => Some(Dot),
            Some(b'+') => Some(Plus),
            Some(b'-') => Some(Minus),
            Some(b'*') => Some(Star),
            Some(b'/') => Some(Slash),
            Some(b'%') => Some(Percent),
            Some(b'&') => Some(Ampersand),
            Some(b'|') => Some(Pipe),
            Some(b'^') => Some(Caret),
            Some(b'~') => Some(Tilde),
            Some(b'!') => Some(Bang),
            Some(b'=') => Some(Equal),
            Some(b'<') => Some(Less),
            Some(b'>') => Some(Greater),
            _ => None,
        };
        self.bump();
        match one {
            Some(kind) => self.make(kind),
            None => {
                // Swallow the rest of a multi-byte character.
                while self.current().is_some_and(|b| b & 0xC0 == 0x80) {
                    self.bump();
                }
                let text = self.text_str();
                self.make(Error(format!("unexpected character '{text}'")))
            }
        }
    }
}

impl Iterator for StateMachineLexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        if let Some(error) = self.skip_trivia() {
            return Some(error);
        }
        self.token_start = self.here();
        let Some(c) = self.current() else {
            self.finished = true;
            return Some(self.make(TokenKind::Eof));
        };
        let token = match c {
            b'#' if self.is_start_of_line() => self.lex_directive(),
            b'"' => self.lex_string(),
            b'\'' => self.lex_char(),
            b'0'..=b'9' => self.lex_number(),
            b'.' if self.peek(1).is_some_and(|b| b.is_ascii_digit()) => self.lex_number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_identifier(),
            _ => self.lex_punctuator(),
        };
        Some(token)
    }
}

impl std::iter::FusedIterator for StateMachineLexer<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::KEYWORDS;

    fn kinds(input: &str) -> Vec<TokenKind> {
        StateMachineLexer::new(input.as_bytes(), &KEYWORDS).map(|t| t.kind).collect()
    }

    #[test]
    fn test_state_machine_basic() {
        let tokens = kinds("int x = 123;");
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0], TokenKind::Int);
        assert_eq!(tokens[1], TokenKind::Identifier("x".into()));
        assert_eq!(tokens[2], TokenKind::Equal);
        assert!(matches!(tokens[3], TokenKind::IntLiteral { value: 123, .. }));
        assert_eq!(tokens[4], TokenKind::Semicolon);
        assert_eq!(tokens[5], TokenKind::Eof);
    }

    #[test]
    fn test_state_machine_positions_track_lines() {
        let tokens: Vec<Token> = StateMachineLexer::new(b"int\n  x;", &KEYWORDS).collect();
        assert_eq!(tokens[1].span.start, Position { line: 2, column: 3, offset: 6 });
        assert_eq!(tokens[1].span.end.offset, 7);
    }

    #[test]
    fn test_state_machine_comments_advance_positions() {
        let tokens: Vec<Token> = StateMachineLexer::new(b"/* a\n b */ y // c\nz", &KEYWORDS).collect();
        assert_eq!(tokens[0].kind, TokenKind::Identifier("y".into()));
        assert_eq!(tokens[0].span.start.line, 2);
        assert_eq!(tokens[1].kind, TokenKind::Identifier("z".into()));
        assert_eq!(tokens[1].span.start.line, 3);
    }

    #[test]
    fn test_state_machine_unterminated_comment_starts_at_comment() {
        let tokens: Vec<Token> = StateMachineLexer::new(b"a\n  /* open", &KEYWORDS).collect();
        assert!(matches!(tokens[1].kind, TokenKind::Error(_)));
        assert_eq!(tokens[1].span.start, Position { line: 2, column: 3, offset: 4 });
        assert_eq!(tokens[2].span.start.line, 2);
    }

    #[test]
    fn test_state_machine_float_forms() {
        assert!(matches!(kinds("1.5f")[0], TokenKind::FloatLiteral { single: true, .. }));
        assert!(matches!(kinds(".25")[0], TokenKind::FloatLiteral { .. }));
    }

    #[test]
    fn test_state_machine_unterminated_comment() {
        let tokens = kinds("x /* never closed");
        assert!(matches!(tokens[1], TokenKind::Error(_)));
        assert_eq!(tokens[2], TokenKind::Eof);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_state_machine_bad_escape_recovers() {
        let tokens = kinds(r#""a\qb" ;"#);
        assert!(matches!(tokens[0], TokenKind::Error(_)));
        assert_eq!(tokens[1], TokenKind::Semicolon);
    }
}

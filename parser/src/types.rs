use model::{
    DiagnosticKind, EnumDef, EnumVariant, Field, RecordDef, RecordField, RecordKind, RecordLayout, Span, StorageClass, TokenKind, Type,
    const_eval,
};

use crate::declarations::DeclarationParser;
use crate::expressions::ExpressionParser;
use crate::parser::{PResult, Parser};

/// Declaration specifiers: storage class plus the base type they spell.
#[derive(Debug, Clone)]
pub(crate) struct DeclSpecs {
    pub storage: StorageClass,
    pub base: Type,
    pub span: Span,
}

#[derive(Default)]
struct SpecifierCounts {
    void: u8,
    char: u8,
    short: u8,
    int: u8,
    long: u8,
    signed: u8,
    unsigned: u8,
    float: u8,
    double: u8,
}

impl SpecifierCounts {
    fn any(&self) -> bool {
        self.void + self.char + self.short + self.int + self.long + self.signed + self.unsigned + self.float + self.double
            > 0
    }

    fn resolve(&self) -> Option<Type> {
        let sign = self.signed + self.unsigned;
        if sign > 1 || self.short > 1 || self.long > 2 || self.int > 1 {
            return None;
        }
        let unsigned = self.unsigned == 1;
        let others = |allowed: u8| self.void + self.char + self.float + self.double - allowed == 0;
        Some(if self.void == 1 {
            if sign + self.short + self.long + self.int > 0 || !others(1) {
                return None;
            }
            Type::Void
        } else if self.char == 1 {
            if self.short + self.long + self.int > 0 || !others(1) {
                return None;
            }
            match (self.signed, self.unsigned) {
                (1, _) => Type::SChar,
                (_, 1) => Type::UChar,
                _ => Type::Char,
            }
        } else if self.float == 1 {
            if sign + self.short + self.long + self.int > 0 || !others(1) {
                return None;
            }
            Type::Float
        } else if self.double == 1 {
            // `long double` is carried as `double`.
            if sign + self.short + self.int > 0 || self.long > 1 || !others(1) {
                return None;
            }
            Type::Double
        } else if !others(0) {
            return None;
        } else if self.short == 1 {
            if self.long > 0 {
                return None;
            }
            if unsigned { Type::UShort } else { Type::Short }
        } else if self.long == 2 {
            if unsigned { Type::ULongLong } else { Type::LongLong }
        } else if self.long == 1 {
            if unsigned { Type::ULong } else { Type::Long }
        } else if unsigned {
            Type::UInt
        } else {
            Type::Int
        })
    }
}

/// Type parsing functionality
pub(crate) trait TypeParser {
    fn is_declaration_start(&self) -> bool;
    fn is_type_name_start_at(&self, offset: usize) -> bool;
    fn parse_declaration_specifiers(&mut self) -> PResult<DeclSpecs>;
    /// `specifier-qualifier-list abstract-declarator?`, used by casts and `sizeof`.
    fn parse_type_name(&mut self) -> PResult<Type>;
}

impl TypeParser for Parser<'_> {
    fn is_declaration_start(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Typedef
            | TokenKind::Extern
            | TokenKind::Static
            | TokenKind::Auto
            | TokenKind::Register
            | TokenKind::Inline => true,
            _ => self.is_type_name_start_at(0),
        }
    }

    fn is_type_name_start_at(&self, offset: usize) -> bool {
        match &self.peek_at(offset).kind {
            TokenKind::Void
            | TokenKind::Char
            | TokenKind::Short
            | TokenKind::Int
            | TokenKind::Long
            | TokenKind::Signed
            | TokenKind::Unsigned
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Struct
            | TokenKind::Union
            | TokenKind::Enum
            | TokenKind::Const
            | TokenKind::Volatile
            | TokenKind::Restrict => true,
            TokenKind::Identifier(name) => self.is_typedef_name(name),
            _ => false,
        }
    }

    fn parse_declaration_specifiers(&mut self) -> PResult<DeclSpecs> {
        let start = self.start();
        let mut storage = StorageClass::None;
        let mut inline = false;
        let mut counts = SpecifierCounts::default();
        let mut named: Option<Type> = None;

        loop {
            let token = self.peek().clone();
            let class = match &token.kind {
                TokenKind::Typedef => Some(StorageClass::Typedef),
                TokenKind::Extern => Some(StorageClass::Extern),
                TokenKind::Static => Some(StorageClass::Static),
                TokenKind::Auto => Some(StorageClass::Auto),
                TokenKind::Register => Some(StorageClass::Register),
                _ => None,
            };
            if let Some(class) = class {
                if storage != StorageClass::None {
                    self.error_at(token.span, "multiple storage classes in declaration specifiers");
                }
                storage = class;
                self.advance();
                continue;
            }
            match &token.kind {
                TokenKind::Inline => inline = true,
                TokenKind::Const | TokenKind::Volatile | TokenKind::Restrict => {}
                TokenKind::Void => counts.void += 1,
                TokenKind::Char => counts.char += 1,
                TokenKind::Short => counts.short += 1,
                TokenKind::Int => counts.int += 1,
                TokenKind::Long => counts.long += 1,
                TokenKind::Signed => counts.signed += 1,
                TokenKind::Unsigned => counts.unsigned += 1,
                TokenKind::Float => counts.float += 1,
                TokenKind::Double => counts.double += 1,
                TokenKind::Struct | TokenKind::Union | TokenKind::Enum => {
                    if named.is_some() || counts.any() {
                        return Err(self.error_here("two or more data types in declaration specifiers"));
                    }
                    named = Some(if token.kind == TokenKind::Enum {
                        self.parse_enum_specifier()?
                    } else {
                        self.parse_record_specifier()?
                    });
                    continue;
                }
                TokenKind::Identifier(name) if named.is_none() && !counts.any() && self.is_typedef_name(name) => {
                    named = Some(Type::Typedef(name.clone()));
                }
                _ => break,
            }
            self.advance();
        }

        let span = self.span_from(start);
        let base = match named {
            Some(ty) if counts.any() => {
                self.error_at(span, "two or more data types in declaration specifiers");
                ty
            }
            Some(ty) => ty,
            None if counts.any() => match counts.resolve() {
                Some(ty) => ty,
                None => {
                    self.error_at(span, "invalid combination of type specifiers");
                    Type::Int
                }
            },
            None if storage != StorageClass::None || inline => {
                self.diags
                    .warning(DiagnosticKind::Syntax, span, "type specifier missing, defaults to 'int'");
                Type::Int
            }
            None => {
                let found = self.peek().kind.to_string();
                return Err(self.error_here(format!("expected declaration specifiers, found {found}")));
            }
        };
        Ok(DeclSpecs { storage, base, span })
    }

    fn parse_type_name(&mut self) -> PResult<Type> {
        let specs = self.parse_declaration_specifiers()?;
        if specs.storage != StorageClass::None {
            self.error_at(specs.span, "storage class specified in a type name");
        }
        let declarator = self.parse_declarator(true)?;
        if let Some(name) = &declarator.name {
            self.error_at(declarator.name_span, format!("unexpected identifier '{name}' in type name"));
        }
        self.build_type(specs.base, declarator.ops, declarator.name_span)
    }
}

impl Parser<'_> {
    /// `struct|union tag? { fields }?`; the keyword is the current token.
    fn parse_record_specifier(&mut self) -> PResult<Type> {
        let start = self.start();
        let kind = if self.advance().kind == TokenKind::Union {
            RecordKind::Union
        } else {
            RecordKind::Struct
        };
        let tag = match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };
        if !self.check(&TokenKind::OpenBrace) {
            return match tag {
                Some(tag) => Ok(Type::Record(kind, tag)),
                None => Err(self.error_here(format!("expected {kind} tag or '{{'"))),
            };
        }
        let tag = match tag {
            Some(tag) => tag,
            None => self.next_anon_tag(),
        };
        self.advance(); // '{'
        let mut fields: Vec<Field> = Vec::new();
        while !self.check(&TokenKind::CloseBrace) && !self.is_at_end() {
            if self.parse_field_declaration(&mut fields).is_err() {
                self.synchronize_statement();
            }
        }
        self.expect(&TokenKind::CloseBrace)?;
        let span = self.span_from(start);
        if fields.is_empty() {
            self.error_at(span, format!("{kind} '{tag}' has no members"));
        }
        let layout = RecordLayout {
            kind,
            tag: tag.clone(),
            fields: Some(
                fields
                    .iter()
                    .map(|f| RecordField {
                        name: f.name.clone(),
                        ty: f.ty.clone(),
                    })
                    .collect(),
            ),
            declared_at: span,
        };
        match self.types.record_mut(&tag) {
            Some(existing) if !existing.is_complete() => *existing = layout,
            Some(_) => {}
            None => {
                self.types.insert_record(layout);
            }
        }
        self.pending_records.push(RecordDef {
            kind,
            tag: tag.clone(),
            fields,
            span,
        });
        Ok(Type::Record(kind, tag))
    }

    fn parse_field_declaration(&mut self, fields: &mut Vec<Field>) -> PResult<()> {
        let specs = self.parse_declaration_specifiers()?;
        if specs.storage != StorageClass::None {
            self.error_at(specs.span, "storage class specified for a member");
        }
        if self.check(&TokenKind::Semicolon) {
            return Err(self.error_here("anonymous members are not supported"));
        }
        loop {
            let declarator = self.parse_declarator(false)?;
            if self.check(&TokenKind::Colon) {
                return Err(self.error_here("bit-fields are not supported"));
            }
            let ty = self.build_type(specs.base.clone(), declarator.ops, declarator.name_span)?;
            let name = declarator.name.unwrap_or_default();
            if ty.is_function() {
                self.error_at(declarator.name_span, format!("member '{name}' declared as a function"));
            }
            if fields.iter().any(|f| f.name == name) {
                self.error_at(declarator.name_span, format!("duplicate member '{name}'"));
            } else {
                fields.push(Field {
                    name,
                    ty,
                    span: declarator.name_span,
                });
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(())
    }

    /// `enum tag? { A, B = expr, }?`; the keyword is the current token.
    fn parse_enum_specifier(&mut self) -> PResult<Type> {
        let start = self.start();
        self.advance(); // 'enum'
        let tag = match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };
        if !self.check(&TokenKind::OpenBrace) {
            return match tag {
                Some(tag) => Ok(Type::Enum(tag)),
                None => Err(self.error_here("expected enum tag or '{'")),
            };
        }
        let tag = match tag {
            Some(tag) => tag,
            None => self.next_anon_tag(),
        };
        self.advance(); // '{'
        let mut variants = Vec::new();
        let mut next_value = Some(0i64);
        while !self.check(&TokenKind::CloseBrace) {
            let (name, span) = self.expect_identifier()?;
            let value = if self.match_token(&TokenKind::Equal) {
                Some(self.parse_conditional_expr()?)
            } else {
                None
            };
            let current = match &value {
                Some(expr) => const_eval(expr, &*self),
                None => next_value,
            };
            if let Some(v) = current {
                self.enum_values.insert(name.clone(), v);
            }
            next_value = current.map(|v| v.wrapping_add(1));
            self.declare_name(&name, false);
            variants.push(EnumVariant {
                name,
                value,
                span,
                symbol: None,
            });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::CloseBrace)?;
        let span = self.span_from(start);
        if variants.is_empty() {
            self.error_at(span, "empty enum is invalid");
        }
        self.pending_enums.push(EnumDef {
            tag: tag.clone(),
            variants,
            span,
        });
        Ok(Type::Enum(tag))
    }
}

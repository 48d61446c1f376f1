use model::{
    Declaration, ExternalDecl, FunctionDef, FunctionType, InitDeclarator, Initializer, Param, Position, Span,
    StorageClass, TokenKind, Type, const_eval,
};

use crate::expressions::ExpressionParser;
use crate::parser::{PResult, Parser, SyntaxError};
use crate::statements::StatementParser;
use crate::types::{DeclSpecs, TypeParser};

/// One step of a declarator, in the order it applies to the base type.
#[derive(Debug, Clone)]
pub(crate) enum DeclaratorOp {
    Pointer,
    Array(Option<usize>),
    Function { params: Vec<Param>, variadic: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct Declarator {
    pub name: Option<String>,
    pub name_span: Span,
    pub ops: Vec<DeclaratorOp>,
}

/// Declaration parsing functionality
pub(crate) trait DeclarationParser {
    fn parse_external_declaration(&mut self) -> PResult<ExternalDecl>;
    /// A block-scope declaration, specifiers included, through the `;`.
    fn parse_declaration(&mut self) -> PResult<Declaration>;
    fn parse_declarator(&mut self, abstract_ok: bool) -> PResult<Declarator>;
    fn build_type(&mut self, base: Type, ops: Vec<DeclaratorOp>, span: Span) -> PResult<Type>;
    fn parse_initializer(&mut self) -> PResult<Initializer>;
}

impl DeclarationParser for Parser<'_> {
    fn parse_external_declaration(&mut self) -> PResult<ExternalDecl> {
        let start = self.start();
        let specs = self.parse_declaration_specifiers()?;
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(ExternalDecl::Declaration(self.finish_declaration(specs, Vec::new(), start)));
        }
        let declarator = self.parse_declarator(false)?;
        let is_function = matches!(declarator.ops.last(), Some(DeclaratorOp::Function { .. }));
        if is_function && self.check(&TokenKind::OpenBrace) {
            return self
                .parse_function_definition(specs, declarator, start)
                .map(ExternalDecl::Function);
        }
        self.parse_init_declarators(specs, declarator, start)
            .map(ExternalDecl::Declaration)
    }

    fn parse_declaration(&mut self) -> PResult<Declaration> {
        let start = self.start();
        let specs = self.parse_declaration_specifiers()?;
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(self.finish_declaration(specs, Vec::new(), start));
        }
        let declarator = self.parse_declarator(false)?;
        if matches!(declarator.ops.last(), Some(DeclaratorOp::Function { .. })) && self.check(&TokenKind::OpenBrace) {
            return Err(self.error_here("function definition is not allowed here"));
        }
        self.parse_init_declarators(specs, declarator, start)
    }

    fn parse_declarator(&mut self, abstract_ok: bool) -> PResult<Declarator> {
        let mut pointers = 0;
        while self.match_token(&TokenKind::Star) {
            pointers += 1;
            while matches!(
                self.peek().kind,
                TokenKind::Const | TokenKind::Volatile | TokenKind::Restrict
            ) {
                self.advance();
            }
        }

        let (name, name_span, inner_ops) = if self.check(&TokenKind::OpenParenthesis) && self.is_nested_declarator() {
            self.advance();
            let inner = self.parse_declarator(abstract_ok)?;
            self.expect(&TokenKind::CloseParenthesis)?;
            (inner.name, inner.name_span, inner.ops)
        } else if let TokenKind::Identifier(name) = &self.peek().kind {
            let name = name.clone();
            let span = self.advance().span;
            (Some(name), span, Vec::new())
        } else if abstract_ok {
            let here = self.start();
            (None, Span::new(here, here), Vec::new())
        } else {
            let found = self.peek().kind.to_string();
            return Err(self.error_here(format!("expected identifier or '(', found {found}")));
        };

        let mut suffixes = Vec::new();
        loop {
            if self.match_token(&TokenKind::OpenBracket) {
                let size = if self.check(&TokenKind::CloseBracket) {
                    None
                } else {
                    Some(self.parse_array_size()?)
                };
                self.expect(&TokenKind::CloseBracket)?;
                suffixes.push(DeclaratorOp::Array(size));
            } else if self.match_token(&TokenKind::OpenParenthesis) {
                let (params, variadic) = self.parse_parameter_list()?;
                suffixes.push(DeclaratorOp::Function { params, variadic });
            } else {
                break;
            }
        }

        let mut ops: Vec<DeclaratorOp> = (0..pointers).map(|_| DeclaratorOp::Pointer).collect();
        ops.extend(suffixes.into_iter().rev());
        ops.extend(inner_ops);
        Ok(Declarator { name, name_span, ops })
    }

    fn build_type(&mut self, base: Type, ops: Vec<DeclaratorOp>, span: Span) -> PResult<Type> {
        let mut ty = base;
        for op in ops {
            ty = match op {
                DeclaratorOp::Pointer => Type::Pointer(Box::new(ty)),
                DeclaratorOp::Array(size) => {
                    if ty.is_function() {
                        self.error_at(span, "declaration of an array of functions");
                        return Err(SyntaxError);
                    }
                    if ty.is_void() {
                        self.error_at(span, "declaration of an array of voids");
                        return Err(SyntaxError);
                    }
                    Type::Array(Box::new(ty), size)
                }
                DeclaratorOp::Function { params, variadic } => {
                    if ty.is_function() || ty.is_array() {
                        self.error_at(span, format!("function cannot return {}", if ty.is_array() { "an array" } else { "a function" }));
                        return Err(SyntaxError);
                    }
                    Type::Function(FunctionType {
                        ret: Box::new(ty),
                        params: params.into_iter().map(|p| p.ty).collect(),
                        variadic,
                    })
                }
            };
        }
        Ok(ty)
    }

    fn parse_initializer(&mut self) -> PResult<Initializer> {
        if !self.check(&TokenKind::OpenBrace) {
            return Ok(Initializer::Expr(self.parse_assignment_expr()?));
        }
        let start = self.start();
        self.advance(); // '{'
        let mut items = Vec::new();
        while !self.check(&TokenKind::CloseBrace) {
            if matches!(self.peek().kind, TokenKind::Dot | TokenKind::OpenBracket) {
                return Err(self.error_here("designated initializers are not supported"));
            }
            items.push(self.parse_initializer()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::CloseBrace)?;
        Ok(Initializer::List(items, self.span_from(start)))
    }
}

impl Parser<'_> {
    /// At a `(` inside a declarator: does it open a nested declarator rather
    /// than a parameter list?
    fn is_nested_declarator(&self) -> bool {
        match &self.peek_at(1).kind {
            TokenKind::Star | TokenKind::OpenParenthesis => true,
            TokenKind::Identifier(name) => !self.is_typedef_name(name),
            _ => false,
        }
    }

    fn parse_array_size(&mut self) -> PResult<usize> {
        let expr = self.parse_conditional_expr()?;
        match const_eval(&expr, &*self) {
            Some(n) if n >= 0 => Ok(n as usize),
            Some(_) => {
                self.error_at(expr.span, "array size is negative");
                Err(SyntaxError)
            }
            None => {
                self.error_at(expr.span, "array size is not an integer constant expression");
                Err(SyntaxError)
            }
        }
    }

    /// Parameter list after the opening `(`, through the closing `)`.
    /// An empty list declares no parameters.
    fn parse_parameter_list(&mut self) -> PResult<(Vec<Param>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;
        if self.match_token(&TokenKind::CloseParenthesis) {
            return Ok((params, variadic));
        }
        if self.check(&TokenKind::Void) && self.check_at(1, &TokenKind::CloseParenthesis) {
            self.advance();
            self.advance();
            return Ok((params, variadic));
        }
        loop {
            if self.check(&TokenKind::Ellipsis) {
                if params.is_empty() {
                    return Err(self.error_here("a named parameter is required before '...'"));
                }
                self.advance();
                variadic = true;
                break;
            }
            let start = self.start();
            let specs = self.parse_declaration_specifiers()?;
            if !matches!(specs.storage, StorageClass::None | StorageClass::Register) {
                self.error_at(specs.span, "invalid storage class for a parameter");
            }
            let declarator = self.parse_declarator(true)?;
            let name_span = declarator.name_span;
            let ty = self.build_type(specs.base, declarator.ops, name_span)?;
            if ty.is_void() {
                self.error_at(self.span_from(start), "'void' must be the only parameter");
            }
            let span = if declarator.name.is_some() { name_span } else { self.span_from(start) };
            params.push(Param {
                name: declarator.name,
                ty: ty.decayed(),
                span,
                symbol: None,
            });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::CloseParenthesis)?;
        Ok((params, variadic))
    }

    fn parse_init_declarators(&mut self, specs: DeclSpecs, first: Declarator, start: Position) -> PResult<Declaration> {
        let mut declarators = Vec::new();
        let mut next = Some(first);
        while let Some(declarator) = next.take() {
            let span = declarator.name_span;
            let name = declarator.name.clone().unwrap_or_default();
            let ty = self.build_type(specs.base.clone(), declarator.ops, span)?;
            let is_typedef = specs.storage == StorageClass::Typedef;
            // The name is in scope from the end of its declarator, before the initializer.
            self.declare_name(&name, is_typedef);
            if is_typedef {
                self.types.insert_typedef(name.clone(), ty.clone());
            }
            let init = if self.match_token(&TokenKind::Equal) {
                if is_typedef {
                    self.error_at(span, format!("typedef '{name}' is initialized"));
                }
                Some(self.parse_initializer()?)
            } else {
                None
            };
            declarators.push(InitDeclarator {
                name,
                ty,
                init,
                span,
                symbol: None,
            });
            if self.match_token(&TokenKind::Comma) {
                next = Some(self.parse_declarator(false)?);
            }
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(self.finish_declaration(specs, declarators, start))
    }

    fn finish_declaration(&mut self, mut specs: DeclSpecs, mut declarators: Vec<InitDeclarator>, start: Position) -> Declaration {
        if specs.storage == StorageClass::Typedef && declarators.len() == 1 {
            self.name_anonymous_record(&mut specs.base, &mut declarators[0]);
        }
        Declaration {
            storage: specs.storage,
            base: specs.base,
            records: std::mem::take(&mut self.pending_records),
            enums: std::mem::take(&mut self.pending_enums),
            declarators,
            span: self.span_from(start),
        }
    }

    /// `typedef struct { ... } Name;` gives the record the typedef's name.
    fn name_anonymous_record(&mut self, base: &mut Type, declarator: &mut InitDeclarator) {
        let Type::Record(kind, tag) = base.clone() else {
            return;
        };
        if !tag.starts_with("__anon_") || declarator.ty != *base || self.types.record(&declarator.name).is_some() {
            return;
        }
        let Some(def) = self.pending_records.iter_mut().find(|r| r.tag == tag) else {
            return;
        };
        def.tag = declarator.name.clone();
        self.types.rename_record(&tag, &declarator.name);
        let renamed = Type::Record(kind, declarator.name.clone());
        self.types.insert_typedef(declarator.name.clone(), renamed.clone());
        *base = renamed.clone();
        declarator.ty = renamed;
    }

    fn parse_function_definition(&mut self, specs: DeclSpecs, declarator: Declarator, start: Position) -> PResult<FunctionDef> {
        let name = declarator.name.clone().unwrap_or_default();
        let params = match declarator.ops.last() {
            Some(DeclaratorOp::Function { params, .. }) => params.clone(),
            _ => Vec::new(),
        };
        let ty = match self.build_type(specs.base.clone(), declarator.ops, declarator.name_span)? {
            Type::Function(f) => f,
            _ => return Err(self.error_here("expected function declarator")),
        };
        if !matches!(specs.storage, StorageClass::None | StorageClass::Static | StorageClass::Extern) {
            self.error_at(specs.span, format!("invalid storage class for function '{name}'"));
        }
        for param in &params {
            if param.name.is_none() {
                self.error_at(param.span, "parameter name omitted");
            }
        }
        self.declare_name(&name, false);

        self.push_scope();
        for param in &params {
            if let Some(param_name) = &param.name {
                self.declare_name(param_name, false);
            }
        }
        let body = self.parse_block_body();
        self.pop_scope();
        let body = body?;

        Ok(FunctionDef {
            name,
            ty,
            params,
            storage: specs.storage,
            body,
            span: self.span_from(start),
            symbol: None,
        })
    }
}

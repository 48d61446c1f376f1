use model::{Block, ForInit, Stmt, TokenKind};

use crate::declarations::DeclarationParser;
use crate::expressions::ExpressionParser;
use crate::parser::{PResult, Parser};
use crate::types::TypeParser;

/// Statement parsing functionality
pub(crate) trait StatementParser {
    fn parse_stmt(&mut self) -> PResult<Stmt>;
    /// A `{ }` block with its own typedef-name scope.
    fn parse_block(&mut self) -> PResult<Block>;
    /// A `{ }` block parsed in the scope the caller already pushed.
    fn parse_block_body(&mut self) -> PResult<Block>;
}

impl StatementParser for Parser<'_> {
    fn parse_block(&mut self) -> PResult<Block> {
        self.push_scope();
        let block = self.parse_block_body();
        self.pop_scope();
        block
    }

    fn parse_block_body(&mut self) -> PResult<Block> {
        let start = self.start();
        self.expect(&TokenKind::OpenBrace)?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::CloseBrace) && !self.is_at_end() {
            let before = self.pos;
            match self.parse_block_item() {
                Ok(stmt) => {
                    if let Some(decl) = self.take_pending_declaration() {
                        items.push(Stmt::Declaration(decl));
                    }
                    items.push(stmt);
                }
                Err(_) => {
                    self.pending_records.clear();
                    self.pending_enums.clear();
                    self.synchronize_statement();
                    if self.pos == before && !self.check(&TokenKind::CloseBrace) {
                        self.advance();
                    }
                }
            }
        }
        self.expect(&TokenKind::CloseBrace)?;
        Ok(Block {
            items,
            span: self.span_from(start),
        })
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::OpenBrace => self.parse_block().map(Stmt::Block),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::Empty(token.span))
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_paren_condition()?;
                let then_branch = Box::new(self.parse_sub_statement()?);
                let else_branch = if self.match_token(&TokenKind::Else) {
                    Some(Box::new(self.parse_sub_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    span: self.span_from(start),
                })
            }
            TokenKind::While => {
                self.advance();
                let cond = self.parse_paren_condition()?;
                let body = Box::new(self.parse_sub_statement()?);
                Ok(Stmt::While {
                    cond,
                    body,
                    span: self.span_from(start),
                })
            }
            TokenKind::Do => {
                self.advance();
                let body = Box::new(self.parse_sub_statement()?);
                self.expect(&TokenKind::While)?;
                let cond = self.parse_paren_condition()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::DoWhile {
                    body,
                    cond,
                    span: self.span_from(start),
                })
            }
            TokenKind::For => {
                self.advance();
                self.push_scope();
                let result = self.parse_for_rest(start);
                self.pop_scope();
                result
            }
            TokenKind::Switch => {
                self.advance();
                let cond = self.parse_paren_condition()?;
                let body = Box::new(self.parse_sub_statement()?);
                Ok(Stmt::Switch {
                    cond,
                    body,
                    span: self.span_from(start),
                })
            }
            TokenKind::Case => {
                self.advance();
                let expr = self.parse_conditional_expr()?;
                self.expect(&TokenKind::Colon)?;
                Ok(Stmt::Case {
                    expr,
                    value: None,
                    span: self.span_from(start),
                })
            }
            TokenKind::Default => {
                self.advance();
                self.expect(&TokenKind::Colon)?;
                Ok(Stmt::Default(self.span_from(start)))
            }
            TokenKind::Break => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Break(self.span_from(start)))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Continue(self.span_from(start)))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Return(value, self.span_from(start)))
            }
            TokenKind::Goto => Err(self.error_here("'goto' is not supported")),
            TokenKind::Identifier(_) if self.check_at(1, &TokenKind::Colon) => {
                Err(self.error_here("labeled statements are not supported"))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }
}

impl Parser<'_> {
    /// Declarations and statements may be mixed inside a block.
    fn parse_block_item(&mut self) -> PResult<Stmt> {
        if self.is_declaration_start() {
            self.parse_declaration().map(Stmt::Declaration)
        } else {
            self.parse_stmt()
        }
    }

    /// The body of `if`, a loop or `switch`. A declaration is not a statement.
    fn parse_sub_statement(&mut self) -> PResult<Stmt> {
        if self.is_declaration_start() {
            return Err(self.error_here("a declaration is not allowed here; add braces"));
        }
        self.parse_stmt()
    }

    fn parse_paren_condition(&mut self) -> PResult<model::Expr> {
        self.expect(&TokenKind::OpenParenthesis)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::CloseParenthesis)?;
        Ok(cond)
    }

    fn parse_for_rest(&mut self, start: model::Position) -> PResult<Stmt> {
        self.expect(&TokenKind::OpenParenthesis)?;
        let init = if self.match_token(&TokenKind::Semicolon) {
            None
        } else if self.is_declaration_start() {
            Some(ForInit::Declaration(self.parse_declaration()?))
        } else {
            let expr = self.parse_expr()?;
            self.expect(&TokenKind::Semicolon)?;
            Some(ForInit::Expr(expr))
        };
        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let step = if self.check(&TokenKind::CloseParenthesis) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::CloseParenthesis)?;
        let body = Box::new(self.parse_sub_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
            span: self.span_from(start),
        })
    }
}

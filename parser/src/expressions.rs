use model::{BinaryOp, CastKind, Expr, ExprKind, IncDecOp, Position, TokenKind, Type, UnaryOp};

use crate::parser::{PResult, Parser, SyntaxError};
use crate::types::TypeParser;

/// Expression parsing functionality using precedence climbing
pub(crate) trait ExpressionParser {
    /// Full expression, comma operator included.
    fn parse_expr(&mut self) -> PResult<Expr>;
    fn parse_assignment_expr(&mut self) -> PResult<Expr>;
    /// Used wherever a constant expression is expected.
    fn parse_conditional_expr(&mut self) -> PResult<Expr>;
}

impl ExpressionParser for Parser<'_> {
    fn parse_expr(&mut self) -> PResult<Expr> {
        let start = self.start();
        let first = self.parse_assignment_expr()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.match_token(&TokenKind::Comma) {
            exprs.push(self.parse_assignment_expr()?);
        }
        Ok(Expr::new(ExprKind::Comma(exprs), self.span_from(start)))
    }

    fn parse_assignment_expr(&mut self) -> PResult<Expr> {
        let start = self.start();
        let target = self.parse_conditional_expr()?;
        let op = match self.peek().kind {
            TokenKind::Equal => None,
            TokenKind::PlusEqual => Some(BinaryOp::Add),
            TokenKind::MinusEqual => Some(BinaryOp::Sub),
            TokenKind::StarEqual => Some(BinaryOp::Mul),
            TokenKind::SlashEqual => Some(BinaryOp::Div),
            TokenKind::PercentEqual => Some(BinaryOp::Rem),
            TokenKind::AndEqual => Some(BinaryOp::BitAnd),
            TokenKind::OrEqual => Some(BinaryOp::BitOr),
            TokenKind::XorEqual => Some(BinaryOp::BitXor),
            TokenKind::LessLessEqual => Some(BinaryOp::Shl),
            TokenKind::GreaterGreaterEqual => Some(BinaryOp::Shr),
            _ => return Ok(target),
        };
        if !target.is_place() {
            self.error_at(target.span, "expression is not assignable");
            return Err(SyntaxError);
        }
        self.advance();
        // Right-associative: `a = b = c` is `a = (b = c)`.
        let value = self.parse_assignment_expr()?;
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
                compute_ty: Type::Error,
            },
            self.span_from(start),
        ))
    }

    fn parse_conditional_expr(&mut self) -> PResult<Expr> {
        let start = self.start();
        let cond = self.parse_binary_expr(1)?;
        if !self.match_token(&TokenKind::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        self.expect(&TokenKind::Colon)?;
        let else_expr = self.parse_conditional_expr()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            self.span_from(start),
        ))
    }
}

/// Binding power of a binary operator token; higher binds tighter.
fn binary_operator(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    Some(match kind {
        TokenKind::OrOr => (BinaryOp::LogicalOr, 1),
        TokenKind::AndAnd => (BinaryOp::LogicalAnd, 2),
        TokenKind::Pipe => (BinaryOp::BitOr, 3),
        TokenKind::Caret => (BinaryOp::BitXor, 4),
        TokenKind::Ampersand => (BinaryOp::BitAnd, 5),
        TokenKind::EqualEqual => (BinaryOp::Eq, 6),
        TokenKind::BangEqual => (BinaryOp::Ne, 6),
        TokenKind::Less => (BinaryOp::Lt, 7),
        TokenKind::LessEqual => (BinaryOp::Le, 7),
        TokenKind::Greater => (BinaryOp::Gt, 7),
        TokenKind::GreaterEqual => (BinaryOp::Ge, 7),
        TokenKind::LessLess => (BinaryOp::Shl, 8),
        TokenKind::GreaterGreater => (BinaryOp::Shr, 8),
        TokenKind::Plus => (BinaryOp::Add, 9),
        TokenKind::Minus => (BinaryOp::Sub, 9),
        TokenKind::Star => (BinaryOp::Mul, 10),
        TokenKind::Slash => (BinaryOp::Div, 10),
        TokenKind::Percent => (BinaryOp::Rem, 10),
        _ => return None,
    })
}

impl Parser<'_> {
    /// Left-associative binary operators at `min_prec` or tighter.
    fn parse_binary_expr(&mut self, min_prec: u8) -> PResult<Expr> {
        let start = self.start();
        let mut lhs = self.parse_cast_expr()?;
        while let Some((op, prec)) = binary_operator(&self.peek().kind) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary_expr(prec + 1)?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                self.span_from(start),
            );
        }
        Ok(lhs)
    }

    fn parse_cast_expr(&mut self) -> PResult<Expr> {
        if !(self.check(&TokenKind::OpenParenthesis) && self.is_type_name_start_at(1)) {
            return self.parse_unary_expr();
        }
        let start = self.start();
        self.advance(); // '('
        let ty = self.parse_type_name()?;
        self.expect(&TokenKind::CloseParenthesis)?;
        if self.check(&TokenKind::OpenBrace) {
            return Err(self.error_here("compound literals are not supported"));
        }
        let expr = self.parse_cast_expr()?;
        Ok(Expr::new(
            ExprKind::Cast {
                ty,
                kind: CastKind::NoOp,
                expr: Box::new(expr),
            },
            self.span_from(start),
        ))
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        let start = self.start();
        let unary = match self.peek().kind {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Ampersand => Some(UnaryOp::AddrOf),
            _ => None,
        };
        if let Some(op) = unary {
            self.advance();
            let expr = self.parse_cast_expr()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
                self.span_from(start),
            ));
        }
        let prefix = match self.peek().kind {
            TokenKind::PlusPlus => Some(IncDecOp::PreInc),
            TokenKind::MinusMinus => Some(IncDecOp::PreDec),
            _ => None,
        };
        if let Some(op) = prefix {
            self.advance();
            let expr = self.parse_unary_expr()?;
            return Ok(Expr::new(
                ExprKind::IncDec {
                    op,
                    expr: Box::new(expr),
                },
                self.span_from(start),
            ));
        }
        if self.match_token(&TokenKind::SizeOf) {
            return self.parse_sizeof(start);
        }
        self.parse_postfix_expr()
    }

    fn parse_sizeof(&mut self, start: Position) -> PResult<Expr> {
        if self.check(&TokenKind::OpenParenthesis) && self.is_type_name_start_at(1) {
            self.advance(); // '('
            let ty = self.parse_type_name()?;
            self.expect(&TokenKind::CloseParenthesis)?;
            return Ok(Expr::new(ExprKind::SizeOfType(ty), self.span_from(start)));
        }
        let expr = self.parse_unary_expr()?;
        Ok(Expr::new(ExprKind::SizeOfExpr(Box::new(expr)), self.span_from(start)))
    }

    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let start = self.start();
        let mut expr = self.parse_primary_expr()?;
        loop {
            let kind = match self.peek().kind {
                TokenKind::OpenBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::CloseBracket)?;
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                TokenKind::OpenParenthesis => {
                    self.advance();
                    // Each argument is an assignment-expression so commas separate.
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::CloseParenthesis) {
                        loop {
                            args.push(self.parse_assignment_expr()?);
                            if !self.match_token(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::CloseParenthesis)?;
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    }
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let arrow = self.advance().kind == TokenKind::Arrow;
                    let (field, _) = self.expect_identifier()?;
                    ExprKind::Member {
                        base: Box::new(expr),
                        field,
                        arrow,
                    }
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.advance().kind == TokenKind::PlusPlus {
                        IncDecOp::PostInc
                    } else {
                        IncDecOp::PostDec
                    };
                    ExprKind::IncDec {
                        op,
                        expr: Box::new(expr),
                    }
                }
                _ => break,
            };
            expr = Expr::new(kind, self.span_from(start));
        }
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Identifier(name) => ExprKind::Ident { name, symbol: None },
            TokenKind::IntLiteral { value, suffix, decimal } => ExprKind::IntLiteral { value, suffix, decimal },
            TokenKind::FloatLiteral { value, single } => ExprKind::FloatLiteral { value, single },
            TokenKind::CharLiteral(value) => ExprKind::CharLiteral(value),
            TokenKind::StringLiteral(mut bytes) => {
                self.advance();
                // Adjacent literals concatenate.
                while let TokenKind::StringLiteral(more) = &self.peek().kind {
                    bytes.extend_from_slice(more);
                    self.advance();
                }
                return Ok(Expr::new(ExprKind::StringLiteral(bytes), self.span_from(token.span.start)));
            }
            TokenKind::OpenParenthesis => {
                self.advance();
                let mut inner = self.parse_expr()?;
                self.expect(&TokenKind::CloseParenthesis)?;
                inner.span = self.span_from(token.span.start);
                return Ok(inner);
            }
            other => return Err(self.error_here(format!("expected expression, found {other}"))),
        };
        self.advance();
        Ok(Expr::new(kind, token.span))
    }
}

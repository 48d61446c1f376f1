use model::{ForInit, Span, Stmt, Type, const_eval, truncate};

use crate::conversions::ConversionContext;
use crate::declarations::DeclarationResolver;
use crate::resolver::{Resolver, SwitchContext};

/// Statement checking: scopes, loop and switch context, `return`.
pub(crate) trait StatementResolver {
    /// Items of a block whose scope the caller has already entered.
    fn resolve_block_items(&mut self, items: &mut [Stmt]);
    fn resolve_stmt(&mut self, stmt: &mut Stmt);
}

impl StatementResolver for Resolver<'_> {
    fn resolve_block_items(&mut self, items: &mut [Stmt]) {
        for item in items.iter_mut() {
            self.resolve_stmt(item);
        }
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Declaration(decl) => self.resolve_local_declaration(decl),
            Stmt::Expr(expr) => self.value(expr),
            Stmt::Empty(_) => {}
            Stmt::Block(block) => {
                self.enter_scope();
                self.resolve_block_items(&mut block.items);
                self.exit_scope();
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.condition(cond);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { cond, body, .. } | Stmt::DoWhile { body, cond, .. } => {
                self.condition(cond);
                self.resolve_loop_body(body);
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => {
                self.enter_scope();
                match init {
                    Some(ForInit::Declaration(decl)) => self.resolve_local_declaration(decl),
                    Some(ForInit::Expr(expr)) => self.value(expr),
                    None => {}
                }
                if let Some(cond) = cond {
                    self.condition(cond);
                }
                if let Some(step) = step {
                    self.value(step);
                }
                self.resolve_loop_body(body);
                self.exit_scope();
            }
            Stmt::Switch { cond, body, .. } => self.resolve_switch(cond, body),
            Stmt::Case { span, .. } => {
                let message = if self.switches.is_empty() {
                    "'case' statement not in switch statement"
                } else {
                    "'case' label nested below the top level of a switch body is not supported"
                };
                self.error(*span, message);
            }
            Stmt::Default(span) => {
                let message = if self.switches.is_empty() {
                    "'default' statement not in switch statement"
                } else {
                    "'default' label nested below the top level of a switch body is not supported"
                };
                self.error(*span, message);
            }
            Stmt::Break(span) => {
                if self.loop_depth == 0 && self.switches.is_empty() {
                    self.error(*span, "'break' statement not in loop or switch statement");
                }
            }
            Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    self.error(*span, "'continue' statement not in loop statement");
                }
            }
            Stmt::Return(value, span) => self.resolve_return(value.as_mut(), *span),
        }
    }
}

impl Resolver<'_> {
    fn resolve_loop_body(&mut self, body: &mut Stmt) {
        self.loop_depth += 1;
        self.resolve_stmt(body);
        self.loop_depth -= 1;
    }

    fn resolve_switch(&mut self, cond: &mut model::Expr, body: &mut Stmt) {
        self.value(cond);
        let ty = if cond.ty.is_error() {
            Type::Error
        } else if cond.ty.is_integer() {
            self.promote(cond);
            cond.ty.clone()
        } else {
            let found = cond.ty.clone();
            self.error(cond.span, format!("statement requires expression of integer type ('{found}' invalid)"));
            Type::Error
        };
        self.switches.push(SwitchContext {
            ty,
            cases: Vec::new(),
            default: None,
        });
        match body {
            Stmt::Block(block) => {
                self.enter_scope();
                for item in block.items.iter_mut() {
                    self.resolve_switch_item(item);
                }
                self.exit_scope();
            }
            other => self.resolve_switch_item(other),
        }
        self.switches.pop();
    }

    /// A statement directly in a switch body, where labels are allowed.
    fn resolve_switch_item(&mut self, item: &mut Stmt) {
        match item {
            Stmt::Case { expr, value, span } => {
                self.value(expr);
                if expr.ty.is_error() {
                    return;
                }
                let folded = if expr.ty.is_integer() { const_eval(expr, &*self) } else { None };
                let Some(v) = folded else {
                    self.error(expr.span, "case label is not an integer constant expression");
                    return;
                };
                self.add_case(v, value, *span);
            }
            Stmt::Default(span) => {
                let span = *span;
                let Some(switch) = self.switches.last_mut() else {
                    return;
                };
                if switch.default.is_some() {
                    self.error(span, "multiple default labels in one switch");
                } else {
                    switch.default = Some(span);
                }
            }
            other => self.resolve_stmt(other),
        }
    }

    fn add_case(&mut self, v: i64, slot: &mut Option<i64>, span: Span) {
        let Some(switch) = self.switches.last_mut() else {
            return;
        };
        let v = if switch.ty.is_error() { v } else { truncate(v, &switch.ty) };
        if switch.cases.iter().any(|(seen, _)| *seen == v) {
            self.error(span, format!("duplicate case value '{v}'"));
            return;
        }
        switch.cases.push((v, span));
        *slot = Some(v);
    }

    fn resolve_return(&mut self, value: Option<&mut model::Expr>, span: Span) {
        let Some(function) = self.function.clone() else {
            return;
        };
        match value {
            Some(expr) => {
                self.value(expr);
                if function.ret.is_void() {
                    if !expr.ty.is_void() && !expr.ty.is_error() {
                        self.error(
                            expr.span,
                            format!("void function '{}' should not return a value", function.name),
                        );
                    }
                } else {
                    self.assign_convert(expr, &function.ret, ConversionContext::Returning);
                }
            }
            None if !function.ret.is_void() && !function.ret.is_error() => {
                self.warning(span, format!("non-void function '{}' should return a value", function.name));
            }
            None => {}
        }
    }
}

use std::collections::VecDeque;

use model::{BinaryOp, CastKind, Expr, ExprKind, Initializer, IntegerSuffix, RecordKind, Span, StorageKind, Type, UnaryOp, const_eval};

use crate::conversions::ConversionContext;
use crate::expressions::ExpressionResolver;
use crate::resolver::Resolver;

/// An element waiting to be placed. Expressions that start an elided
/// sub-aggregate are resolved once and put back as `Resolved`.
enum Pending {
    Raw(Initializer),
    Resolved(Expr),
}

impl Pending {
    fn span(&self) -> Span {
        match self {
            Pending::Raw(init) => init.span(),
            Pending::Resolved(expr) => expr.span,
        }
    }
}

/// Initializer normalization: after resolution every aggregate initializer
/// is fully braced and every scalar leaf is converted to its element type.
pub(crate) trait InitializerResolver {
    /// Resolves `init` for an object of type `ty` and returns the object
    /// type, with the size of `T x[] = ...` filled in.
    fn resolve_initializer(&mut self, init: &mut Initializer, ty: &Type, is_static: bool) -> Type;
}

impl InitializerResolver for Resolver<'_> {
    fn resolve_initializer(&mut self, init: &mut Initializer, ty: &Type, is_static: bool) -> Type {
        let ty = self.canonical(ty);
        let span = init.span();
        let taken = std::mem::replace(init, Initializer::List(Vec::new(), span));
        let (normalized, completed) = self.initialize(taken, &ty, is_static);
        *init = normalized;
        completed
    }
}

fn is_char_like(ty: &Type) -> bool {
    matches!(ty, Type::Char | Type::SChar | Type::UChar)
}

fn is_string(init: &Initializer) -> bool {
    matches!(init, Initializer::Expr(Expr { kind: ExprKind::StringLiteral(_), .. }))
}

fn is_aggregate(ty: &Type) -> bool {
    ty.is_array() || ty.is_record()
}

impl Resolver<'_> {
    fn initialize(&mut self, init: Initializer, ty: &Type, is_static: bool) -> (Initializer, Type) {
        if ty.is_error() {
            let mut init = init;
            self.resolve_all(&mut init);
            return (init, Type::Error);
        }
        match ty {
            Type::Array(elem, n) => {
                // `char s[] = "abc"` and `char s[] = { "abc" }`.
                let init = match init {
                    Initializer::List(mut items, _) if is_char_like(elem) && items.len() == 1 && is_string(&items[0]) => {
                        items.remove(0)
                    }
                    other => other,
                };
                match init {
                    Initializer::Expr(expr) if is_char_like(elem) && matches!(expr.kind, ExprKind::StringLiteral(_)) => {
                        self.string_initializer(expr, elem, *n)
                    }
                    Initializer::List(items, span) => {
                        let mut queue: VecDeque<Pending> = items.into_iter().map(Pending::Raw).collect();
                        let out = self.fill_array(elem, *n, &mut queue, is_static);
                        self.warn_excess(&queue, "array");
                        let len = out.len();
                        (
                            Initializer::List(out, span),
                            Type::Array(elem.clone(), Some(n.unwrap_or(len))),
                        )
                    }
                    Initializer::Expr(mut expr) => {
                        self.value(&mut expr);
                        if !expr.ty.is_error() {
                            self.error(expr.span, "array initializer must be an initializer list");
                        }
                        (Initializer::Expr(expr), ty.clone())
                    }
                }
            }
            Type::Record(kind, tag) => match init {
                Initializer::List(items, span) => {
                    let mut queue: VecDeque<Pending> = items.into_iter().map(Pending::Raw).collect();
                    let out = self.fill_record(*kind, tag, &mut queue, is_static);
                    self.warn_excess(&queue, &kind.to_string());
                    (Initializer::List(out, span), ty.clone())
                }
                Initializer::Expr(mut expr) => {
                    self.value(&mut expr);
                    let expr = self.record_leaf(expr, ty, is_static);
                    (Initializer::Expr(expr), ty.clone())
                }
            },
            _ => match init {
                Initializer::Expr(mut expr) => {
                    self.value(&mut expr);
                    (Initializer::Expr(self.scalar_leaf(expr, ty, is_static)), ty.clone())
                }
                Initializer::List(items, span) => {
                    let mut items = items.into_iter();
                    let Some(first) = items.next() else {
                        self.error(span, "scalar initializer cannot be empty");
                        return (Initializer::List(Vec::new(), span), ty.clone());
                    };
                    if items.next().is_some() {
                        self.warning(span, "excess elements in scalar initializer");
                    }
                    self.initialize(first, ty, is_static)
                }
            },
        }
    }

    fn string_initializer(&mut self, mut expr: Expr, elem: &Type, n: Option<usize>) -> (Initializer, Type) {
        self.resolve_expr(&mut expr);
        let len = match &expr.kind {
            ExprKind::StringLiteral(bytes) => bytes.len(),
            _ => 0,
        };
        let size = match n {
            Some(n) => {
                // The terminating NUL may be dropped when it does not fit.
                if len > n {
                    self.warning(expr.span, "initializer-string for char array is too long");
                }
                n
            }
            None => len + 1,
        };
        (Initializer::Expr(expr), Type::Array(Box::new(elem.clone()), Some(size)))
    }

    fn fill_array(
        &mut self,
        elem: &Type,
        n: Option<usize>,
        queue: &mut VecDeque<Pending>,
        is_static: bool,
    ) -> Vec<Initializer> {
        let mut out = Vec::new();
        while !queue.is_empty() && n.is_none_or(|n| out.len() < n) {
            match self.element(elem, queue, is_static) {
                Some(init) => out.push(init),
                None => break,
            }
        }
        out
    }

    fn fill_record(
        &mut self,
        kind: RecordKind,
        tag: &str,
        queue: &mut VecDeque<Pending>,
        is_static: bool,
    ) -> Vec<Initializer> {
        // Incomplete records are reported by the definition check.
        let Some(fields) = self.types.record(tag).and_then(|layout| layout.fields.clone()) else {
            return Vec::new();
        };
        let count = match kind {
            RecordKind::Struct => fields.len(),
            RecordKind::Union => 1,
        };
        let mut out = Vec::new();
        for field in fields.iter().take(count) {
            if queue.is_empty() {
                break;
            }
            let ty = self.canonical(&field.ty);
            match self.element(&ty, queue, is_static) {
                Some(init) => out.push(init),
                None => break,
            }
        }
        out
    }

    /// Takes the initializer for one element of type `ty` from the queue.
    fn element(&mut self, ty: &Type, queue: &mut VecDeque<Pending>, is_static: bool) -> Option<Initializer> {
        let front = queue.pop_front()?;
        if !is_aggregate(ty) {
            return Some(match front {
                Pending::Raw(init @ Initializer::List(..)) => self.initialize(init, ty, is_static).0,
                Pending::Raw(Initializer::Expr(mut expr)) => {
                    self.value(&mut expr);
                    Initializer::Expr(self.scalar_leaf(expr, ty, is_static))
                }
                Pending::Resolved(expr) => Initializer::Expr(self.scalar_leaf(expr, ty, is_static)),
            });
        }
        match front {
            Pending::Raw(init @ Initializer::List(..)) => Some(self.initialize(init, ty, is_static).0),
            Pending::Raw(init) if is_string(&init) && ty.pointee().is_some_and(is_char_like) => {
                Some(self.initialize(init, ty, is_static).0)
            }
            Pending::Raw(Initializer::Expr(mut expr)) => {
                self.value(&mut expr);
                self.aggregate_from_expr(expr, ty, queue, is_static)
            }
            Pending::Resolved(expr) => self.aggregate_from_expr(expr, ty, queue, is_static),
        }
    }

    /// An expression in aggregate position: either a whole record value, or
    /// the first scalar of a sub-aggregate whose braces were elided.
    fn aggregate_from_expr(
        &mut self,
        expr: Expr,
        ty: &Type,
        queue: &mut VecDeque<Pending>,
        is_static: bool,
    ) -> Option<Initializer> {
        if expr.ty.is_error() || (ty.is_record() && expr.ty == *ty) {
            return Some(Initializer::Expr(self.record_leaf(expr, ty, is_static)));
        }
        let span = expr.span;
        queue.push_front(Pending::Resolved(expr));
        let before = queue.len();
        let items = match ty {
            Type::Array(elem, n) => self.fill_array(elem, *n, queue, is_static),
            Type::Record(kind, tag) => self.fill_record(*kind, tag, queue, is_static),
            _ => Vec::new(),
        };
        if queue.len() == before {
            // Nothing could take the expression.
            if let Some(Pending::Resolved(expr)) = queue.pop_front() {
                let found = expr.ty.clone();
                self.error(expr.span, format!("initializing '{ty}' with an expression of incompatible type '{found}'"));
            }
            return None;
        }
        Some(Initializer::List(items, span))
    }

    fn record_leaf(&mut self, mut expr: Expr, ty: &Type, is_static: bool) -> Expr {
        self.assign_convert(&mut expr, ty, ConversionContext::Initializing);
        if is_static && !expr.ty.is_error() {
            self.error(expr.span, "initializer element is not a compile-time constant");
        }
        expr
    }

    fn scalar_leaf(&mut self, mut expr: Expr, ty: &Type, is_static: bool) -> Expr {
        self.assign_convert(&mut expr, ty, ConversionContext::Initializing);
        if !is_static || expr.ty.is_error() {
            return expr;
        }
        if !self.is_constant_initializer(&expr) {
            self.error(expr.span, "initializer element is not a compile-time constant");
            return expr;
        }
        if expr.ty.is_integer()
            && let Some(v) = const_eval(&expr, &*self)
        {
            return Expr {
                kind: ExprKind::IntLiteral {
                    value: v as u64,
                    suffix: IntegerSuffix::None,
                    decimal: true,
                },
                ty: expr.ty,
                span: expr.span,
            };
        }
        expr
    }

    fn warn_excess(&mut self, queue: &VecDeque<Pending>, what: &str) {
        if let Some(extra) = queue.front() {
            self.warning(extra.span(), format!("excess elements in {what} initializer"));
        }
    }

    /// Resolves every expression of an initializer whose target type is unknown.
    fn resolve_all(&mut self, init: &mut Initializer) {
        match init {
            Initializer::Expr(expr) => self.value(expr),
            Initializer::List(items, _) => {
                for item in items.iter_mut() {
                    self.resolve_all(item);
                }
            }
        }
    }

    // ─── Static-storage constants ───────────────────────────────

    fn is_constant_initializer(&self, expr: &Expr) -> bool {
        if expr.ty.is_arithmetic() {
            self.is_arithmetic_constant(expr)
        } else if expr.ty.is_pointer() {
            self.is_null_pointer_constant(expr) || self.is_address_constant(expr)
        } else {
            false
        }
    }

    fn is_arithmetic_constant(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::IntLiteral { .. }
            | ExprKind::FloatLiteral { .. }
            | ExprKind::CharLiteral(_)
            | ExprKind::SizeOfType(_)
            | ExprKind::SizeOfExpr(_) => true,
            ExprKind::Ident { symbol: Some(id), .. } => {
                matches!(self.symbols.get(*id).storage, StorageKind::EnumConstant(_))
            }
            ExprKind::Unary { op, expr: operand } => {
                !matches!(op, UnaryOp::Deref | UnaryOp::AddrOf) && self.is_arithmetic_constant(operand)
            }
            ExprKind::Binary { lhs, rhs, .. } => self.is_arithmetic_constant(lhs) && self.is_arithmetic_constant(rhs),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.is_arithmetic_constant(cond)
                    && self.is_arithmetic_constant(then_expr)
                    && self.is_arithmetic_constant(else_expr)
            }
            ExprKind::Cast { expr: operand, .. } | ExprKind::ImplicitCast { expr: operand, .. } => {
                operand.ty.is_arithmetic() && self.is_arithmetic_constant(operand)
            }
            _ => false,
        }
    }

    /// The address of an object or function with static storage, possibly
    /// offset by a constant.
    fn is_address_constant(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::ImplicitCast {
                kind: CastKind::ArrayToPointer | CastKind::FunctionToPointer,
                expr: operand,
            } => self.is_static_place(operand),
            ExprKind::ImplicitCast {
                kind: CastKind::PointerToPointer | CastKind::NoOp,
                expr: operand,
            }
            | ExprKind::Cast { expr: operand, .. } => {
                operand.ty.is_pointer() && (self.is_address_constant(operand) || self.is_null_pointer_constant(operand))
            }
            ExprKind::Unary {
                op: UnaryOp::AddrOf,
                expr: operand,
            } => self.is_static_place(operand),
            ExprKind::Binary {
                op: BinaryOp::Add | BinaryOp::Sub,
                lhs,
                rhs,
            } => lhs.ty.is_pointer() && self.is_address_constant(lhs) && self.is_arithmetic_constant(rhs),
            _ => false,
        }
    }

    fn is_static_place(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Ident { symbol: Some(id), .. } => {
                matches!(self.symbols.get(*id).storage, StorageKind::Global | StorageKind::Function)
            }
            ExprKind::StringLiteral(_) => true,
            ExprKind::Member {
                base, arrow: false, ..
            } => self.is_static_place(base),
            ExprKind::Index { base, index } => self.is_address_constant(base) && self.is_arithmetic_constant(index),
            _ => false,
        }
    }
}

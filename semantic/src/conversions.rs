use model::{CastKind, Expr, ExprKind, Type, UnaryOp, const_eval};

use crate::expressions::ExpressionResolver;
use crate::resolver::Resolver;

/// Where an assignment-like conversion happens, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConversionContext {
    Initializing,
    Assigning,
    Passing,
    Returning,
}

impl ConversionContext {
    fn describe(self) -> &'static str {
        match self {
            ConversionContext::Initializing => "initializing",
            ConversionContext::Assigning => "assigning to",
            ConversionContext::Passing => "passing",
            ConversionContext::Returning => "returning",
        }
    }
}

/// The conversion an explicit or implicit cast performs between two
/// canonical types.
pub(crate) fn cast_kind(from: &Type, to: &Type) -> CastKind {
    if to.is_void() {
        return CastKind::ToVoid;
    }
    if from == to {
        return CastKind::NoOp;
    }
    match (from.is_integer(), from.is_floating(), from.is_pointer()) {
        (true, _, _) if to.is_integer() => CastKind::Integral,
        (true, _, _) if to.is_floating() => CastKind::IntegralToFloating,
        (true, _, _) if to.is_pointer() => CastKind::IntegralToPointer,
        (_, true, _) if to.is_integer() => CastKind::FloatingToIntegral,
        (_, true, _) if to.is_floating() => CastKind::Floating,
        (_, _, true) if to.is_pointer() => CastKind::PointerToPointer,
        (_, _, true) if to.is_integer() => CastKind::PointerToIntegral,
        _ => CastKind::NoOp,
    }
}

/// Replaces `expr` with an implicit conversion of itself to `ty`.
pub(crate) fn wrap(expr: &mut Expr, kind: CastKind, ty: Type) {
    let span = expr.span;
    let inner = std::mem::replace(expr, Expr::int(0, span));
    *expr = Expr {
        kind: ExprKind::ImplicitCast {
            kind,
            expr: Box::new(inner),
        },
        ty,
        span,
    };
}

impl Resolver<'_> {
    /// Resolves an expression used for its value: arrays and functions decay.
    pub(crate) fn value(&mut self, expr: &mut Expr) {
        self.resolve_expr(expr);
        self.decay(expr);
    }

    pub(crate) fn decay(&mut self, expr: &mut Expr) {
        match &expr.ty {
            Type::Array(elem, _) => {
                let ty = Type::Pointer(elem.clone());
                wrap(expr, CastKind::ArrayToPointer, ty);
            }
            Type::Function(_) => {
                let ty = expr.ty.clone().pointer_to();
                wrap(expr, CastKind::FunctionToPointer, ty);
            }
            _ => {}
        }
    }

    /// Converts `expr` to `target` without diagnostics; the caller has
    /// already checked that the conversion is allowed.
    pub(crate) fn implicit(&mut self, expr: &mut Expr, target: &Type) {
        let target = self.canonical(target);
        if target.is_error() || expr.ty.is_error() || expr.ty == target {
            return;
        }
        let kind = if target.is_pointer() && self.is_null_pointer_constant(expr) {
            CastKind::NullToPointer
        } else {
            cast_kind(&expr.ty, &target)
        };
        wrap(expr, kind, target);
    }

    pub(crate) fn promote(&mut self, expr: &mut Expr) {
        if expr.ty.is_integer() {
            let promoted = expr.ty.promoted();
            self.implicit(expr, &promoted);
        }
    }

    /// An integer constant expression with value zero, or such an
    /// expression cast to `void *`.
    pub(crate) fn is_null_pointer_constant(&self, expr: &Expr) -> bool {
        let inner = expr.strip_implicit();
        if let ExprKind::Cast { expr: operand, .. } = &inner.kind
            && matches!(&inner.ty, Type::Pointer(p) if p.is_void())
        {
            return self.is_null_pointer_constant(operand);
        }
        inner.ty.is_integer() && const_eval(inner, self) == Some(0)
    }

    /// Controlling expression of `if`, loops and `?:`.
    pub(crate) fn condition(&mut self, expr: &mut Expr) {
        self.value(expr);
        if !expr.ty.is_error() && !expr.ty.is_scalar() {
            let ty = expr.ty.clone();
            self.error(expr.span, format!("statement requires expression of scalar type ('{ty}' invalid)"));
        }
    }

    /// Checks and applies the conversion of assignment, initialization,
    /// argument passing and `return`.
    pub(crate) fn assign_convert(&mut self, expr: &mut Expr, target: &Type, context: ConversionContext) {
        let target = self.canonical(target);
        let source = expr.ty.clone();
        if target.is_error() || source.is_error() {
            return;
        }
        let verb = context.describe();
        if target.is_arithmetic() && source.is_arithmetic() {
            self.implicit(expr, &target);
            return;
        }
        match (&target, &source) {
            (Type::Pointer(to), Type::Pointer(from)) => {
                let void_ok = (to.is_void() && !from.is_function()) || (from.is_void() && !to.is_function());
                if !void_ok && !self.types.compatible(to, from) {
                    self.warning(
                        expr.span,
                        format!("incompatible pointer types {verb} '{target}' from '{source}'"),
                    );
                }
                self.implicit(expr, &target);
            }
            (Type::Pointer(_), _) if self.is_null_pointer_constant(expr) => self.implicit(expr, &target),
            (Type::Pointer(_), from) if from.is_integer() => {
                self.error(
                    expr.span,
                    format!("incompatible integer to pointer conversion {verb} '{target}' from '{source}'"),
                );
            }
            (to, Type::Pointer(_)) if to.is_integer() => {
                self.error(
                    expr.span,
                    format!("incompatible pointer to integer conversion {verb} '{target}' from '{source}'"),
                );
            }
            (Type::Record(k1, t1), Type::Record(k2, t2)) if k1 == k2 && t1 == t2 => {}
            _ => {
                self.error(expr.span, format!("incompatible types {verb} '{target}' from '{source}'"));
            }
        }
    }

    /// Default argument promotions for the variadic part of a call.
    pub(crate) fn promote_vararg(&mut self, expr: &mut Expr) {
        if expr.ty == Type::Float {
            self.implicit(expr, &Type::Double);
        } else {
            self.promote(expr);
        }
    }

    /// Whether the resolved expression designates an object.
    pub(crate) fn is_lvalue(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Ident { symbol: Some(id), .. } => matches!(
                self.symbols.get(*id).storage,
                model::StorageKind::Local | model::StorageKind::Global | model::StorageKind::Parameter
            ),
            ExprKind::Unary { op: UnaryOp::Deref, .. } | ExprKind::Index { .. } | ExprKind::StringLiteral(_) => true,
            ExprKind::Member { arrow: true, .. } => true,
            ExprKind::Member { base, arrow: false, .. } => self.is_lvalue(base),
            _ => false,
        }
    }

    pub(crate) fn is_modifiable_lvalue(&self, expr: &Expr) -> bool {
        self.is_lvalue(expr)
            && !matches!(expr.kind, ExprKind::StringLiteral(_))
            && !expr.ty.is_array()
            && !expr.ty.is_function()
    }
}

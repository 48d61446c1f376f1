use crate::ast::{BinaryOp, CastKind, Expr, ExprKind, UnaryOp};
use crate::types::Type;

/// What constant folding needs to know about names and types.
pub trait ConstEnv {
    fn enum_constant(&self, name: &str) -> Option<i64>;

    fn size_of(&self, ty: &Type) -> Option<u64>;

    fn canonical(&self, ty: &Type) -> Type {
        ty.clone()
    }
}

/// Evaluates an integer constant expression. Returns `None` when the
/// expression is not constant (or divides by zero).
pub fn const_eval(node: &Expr, env: &dyn ConstEnv) -> Option<i64> {
    match &node.kind {
        ExprKind::IntLiteral { value, .. } => Some(*value as i64),
        ExprKind::CharLiteral(c) => Some(*c),
        ExprKind::Ident { name, .. } => env.enum_constant(name),
        ExprKind::SizeOfType(ty) => env.size_of(ty).map(|s| s as i64),
        ExprKind::SizeOfExpr(inner) => {
            if inner.ty.is_error() {
                None
            } else {
                env.size_of(&inner.ty).map(|s| s as i64)
            }
        }
        ExprKind::Unary { op, expr } => {
            let v = const_eval(expr, env)?;
            match op {
                UnaryOp::Plus => Some(v),
                UnaryOp::Minus => Some(v.wrapping_neg()),
                UnaryOp::Not => Some(i64::from(v == 0)),
                UnaryOp::BitNot => Some(!v),
                UnaryOp::Deref | UnaryOp::AddrOf => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = const_eval(lhs, env)?;
            // Short-circuit forms only need the right side when it matters.
            match op {
                BinaryOp::LogicalAnd if l == 0 => return Some(0),
                BinaryOp::LogicalOr if l != 0 => return Some(1),
                _ => {}
            }
            let r = const_eval(rhs, env)?;
            let unsigned = is_unsigned(&lhs.ty, env) || is_unsigned(&rhs.ty, env);
            fold_binary(*op, l, r, unsigned)
        }
        ExprKind::Conditional { cond, then_expr, else_expr } => {
            if const_eval(cond, env)? != 0 {
                const_eval(then_expr, env)
            } else {
                const_eval(else_expr, env)
            }
        }
        ExprKind::Cast { ty, expr, .. } => {
            let v = const_eval(expr, env)?;
            Some(truncate(v, &env.canonical(ty)))
        }
        ExprKind::ImplicitCast { kind, expr } => {
            let v = const_eval(expr, env)?;
            match kind {
                CastKind::Integral | CastKind::NoOp => Some(truncate(v, &env.canonical(&node.ty))),
                _ => None,
            }
        }
        ExprKind::Comma(_)
        | ExprKind::FloatLiteral { .. }
        | ExprKind::StringLiteral(_)
        | ExprKind::IncDec { .. }
        | ExprKind::Assign { .. }
        | ExprKind::Call { .. }
        | ExprKind::Index { .. }
        | ExprKind::Member { .. } => None,
    }
}

fn is_unsigned(ty: &Type, env: &dyn ConstEnv) -> bool {
    let ty = env.canonical(ty);
    ty.is_integer() && !ty.is_signed() && ty.rank().is_some_and(|r| r >= 3)
}

fn fold_binary(op: BinaryOp, l: i64, r: i64, unsigned: bool) -> Option<i64> {
    let (ul, ur) = (l as u64, r as u64);
    Some(match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::Div if r == 0 => return None,
        BinaryOp::Rem if r == 0 => return None,
        BinaryOp::Div if unsigned => (ul / ur) as i64,
        BinaryOp::Rem if unsigned => (ul % ur) as i64,
        BinaryOp::Div => l.wrapping_div(r),
        BinaryOp::Rem => l.wrapping_rem(r),
        BinaryOp::Shl => l.wrapping_shl(r as u32),
        BinaryOp::Shr if unsigned => (ul.wrapping_shr(r as u32)) as i64,
        BinaryOp::Shr => l.wrapping_shr(r as u32),
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Lt if unsigned => i64::from(ul < ur),
        BinaryOp::Le if unsigned => i64::from(ul <= ur),
        BinaryOp::Gt if unsigned => i64::from(ul > ur),
        BinaryOp::Ge if unsigned => i64::from(ul >= ur),
        BinaryOp::Lt => i64::from(l < r),
        BinaryOp::Le => i64::from(l <= r),
        BinaryOp::Gt => i64::from(l > r),
        BinaryOp::Ge => i64::from(l >= r),
        BinaryOp::Eq => i64::from(l == r),
        BinaryOp::Ne => i64::from(l != r),
        BinaryOp::LogicalAnd => i64::from(l != 0 && r != 0),
        BinaryOp::LogicalOr => i64::from(l != 0 || r != 0),
    })
}

/// Wraps `v` into the value range of integer type `ty`.
pub fn truncate(v: i64, ty: &Type) -> i64 {
    match ty.bit_width() {
        Some(64) | None => v,
        Some(bits) => {
            let mask = (1i64 << bits) - 1;
            let low = v & mask;
            if ty.is_signed() && low >> (bits - 1) != 0 {
                low - (1i64 << bits)
            } else {
                low
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;
    use pretty_assertions::assert_eq;

    struct Env;

    impl ConstEnv for Env {
        fn enum_constant(&self, name: &str) -> Option<i64> {
            (name == "RED").then_some(2)
        }

        fn size_of(&self, ty: &Type) -> Option<u64> {
            ty.scalar_size()
        }
    }

    fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            Span::default(),
        )
    }

    fn int(v: u64) -> Expr {
        Expr::int(v, Span::default())
    }

    #[test]
    fn folds_arithmetic_and_enum_constants() {
        let red = Expr::new(ExprKind::Ident { name: "RED".into(), symbol: None }, Span::default());
        let e = bin(BinaryOp::Mul, bin(BinaryOp::Add, int(1), red), int(4));
        assert_eq!(const_eval(&e, &Env), Some(12));
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        assert_eq!(const_eval(&bin(BinaryOp::Div, int(1), int(0)), &Env), None);
    }

    #[test]
    fn sizeof_scalar_and_cast_truncation() {
        let size = Expr::new(ExprKind::SizeOfType(Type::Long), Span::default());
        assert_eq!(const_eval(&size, &Env), Some(8));
        let cast = Expr::new(
            ExprKind::Cast { ty: Type::Char, kind: CastKind::Integral, expr: Box::new(int(300)) },
            Span::default(),
        );
        assert_eq!(const_eval(&cast, &Env), Some(44));
        assert_eq!(truncate(255, &Type::Char), -1);
        assert_eq!(truncate(-1, &Type::UShort), 65535);
    }

    #[test]
    fn unknown_identifiers_are_not_constant() {
        let x = Expr::new(ExprKind::Ident { name: "x".into(), symbol: None }, Span::default());
        assert_eq!(const_eval(&x, &Env), None);
    }
}

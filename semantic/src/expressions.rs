use model::{
    BinaryOp, CastKind, Expr, ExprKind, IncDecOp, IntegerSuffix, Span, StorageKind, SymbolId, Type, UnaryOp,
    const_eval,
};

use crate::conversions::{ConversionContext, cast_kind};
use crate::resolver::Resolver;

/// Expression annotation: symbols, canonical types and implicit conversions.
pub(crate) trait ExpressionResolver {
    /// Annotates `expr` and its children. The expression itself is not
    /// decayed; use `Resolver::value` where the value is needed.
    fn resolve_expr(&mut self, expr: &mut Expr);
}

impl ExpressionResolver for Resolver<'_> {
    fn resolve_expr(&mut self, expr: &mut Expr) {
        let span = expr.span;
        let ty = match &mut expr.kind {
            ExprKind::IntLiteral { value, suffix, decimal } => self.int_literal_type(*value, *suffix, *decimal, span),
            ExprKind::FloatLiteral { single, .. } => {
                if *single {
                    Type::Float
                } else {
                    Type::Double
                }
            }
            ExprKind::CharLiteral(_) => Type::Int,
            ExprKind::StringLiteral(bytes) => Type::Array(Box::new(Type::Char), Some(bytes.len() + 1)),
            ExprKind::Ident { name, symbol } => self.resolve_ident(name, symbol, span),
            ExprKind::Unary { op, expr: operand } => self.resolve_unary(*op, operand),
            ExprKind::IncDec { op, expr: operand } => self.resolve_incdec(*op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.resolve_binary(*op, lhs, rhs),
            ExprKind::Assign {
                op,
                target,
                value,
                compute_ty,
            } => self.resolve_assign(*op, target, value, compute_ty),
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => self.resolve_conditional(cond, then_expr, else_expr),
            ExprKind::Comma(exprs) => {
                for e in exprs.iter_mut() {
                    self.value(e);
                }
                exprs.last().map_or(Type::Error, |e| e.ty.clone())
            }
            ExprKind::Call { callee, args } => self.resolve_call(callee, args, span),
            ExprKind::Index { base, index } => self.resolve_index(base, index),
            ExprKind::Member { base, field, arrow } => self.resolve_member(base, field, *arrow, span),
            ExprKind::Cast { ty, kind, expr: operand } => {
                *ty = self.scoped_type(ty);
                self.resolve_cast(ty, kind, operand, span)
            }
            ExprKind::SizeOfType(ty) => {
                *ty = self.scoped_type(ty);
                self.note_records(ty);
                let ty = self.canonical(ty);
                self.sizeof_type(&ty, span)
            }
            ExprKind::SizeOfExpr(operand) => {
                self.resolve_expr(operand);
                let ty = operand.ty.clone();
                self.sizeof_type(&ty, span)
            }
            // Already annotated.
            ExprKind::ImplicitCast { .. } => return,
        };
        expr.ty = ty;
    }
}

fn fits(value: u64, ty: &Type) -> bool {
    let max = match ty {
        Type::Int => i32::MAX as u64,
        Type::UInt => u64::from(u32::MAX),
        Type::Long | Type::LongLong => i64::MAX as u64,
        _ => u64::MAX,
    };
    value <= max
}

impl Resolver<'_> {
    /// The first type in the C candidate list that can represent the literal.
    fn int_literal_type(&mut self, value: u64, suffix: IntegerSuffix, decimal: bool, span: Span) -> Type {
        let candidates: &[Type] = match (suffix, decimal) {
            (IntegerSuffix::None, true) => &[Type::Int, Type::Long],
            (IntegerSuffix::None, false) => &[Type::Int, Type::UInt, Type::Long, Type::ULong],
            (IntegerSuffix::U, _) => &[Type::UInt, Type::ULong],
            (IntegerSuffix::L, true) => &[Type::Long],
            (IntegerSuffix::L, false) => &[Type::Long, Type::ULong],
            (IntegerSuffix::UL, _) => &[Type::ULong],
            (IntegerSuffix::LL, true) => &[Type::LongLong],
            (IntegerSuffix::LL, false) => &[Type::LongLong, Type::ULongLong],
            (IntegerSuffix::ULL, _) => &[Type::ULongLong],
        };
        if let Some(ty) = candidates.iter().find(|ty| fits(value, ty)) {
            return ty.clone();
        }
        self.warning(
            span,
            "integer literal is too large to be represented in a signed integer type, interpreting as unsigned",
        );
        if suffix == IntegerSuffix::LL {
            Type::ULongLong
        } else {
            Type::ULong
        }
    }

    fn resolve_ident(&mut self, name: &str, slot: &mut Option<SymbolId>, span: Span) -> Type {
        let Some(id) = self.symbols.lookup(name) else {
            self.error(span, format!("use of undeclared identifier '{name}'"));
            return Type::Error;
        };
        *slot = Some(id);
        let symbol = self.symbols.get(id);
        match symbol.storage {
            StorageKind::EnumConstant(_) => Type::Int,
            _ => {
                let ty = symbol.ty.clone();
                self.canonical(&ty)
            }
        }
    }

    fn invalid_unary_operand(&mut self, op: &str, operand: &Expr) -> Type {
        let ty = operand.ty.clone();
        self.error(operand.span, format!("invalid argument type '{ty}' to unary expression '{op}'"));
        Type::Error
    }

    fn resolve_unary(&mut self, op: UnaryOp, operand: &mut Expr) -> Type {
        if op == UnaryOp::AddrOf {
            return self.resolve_address_of(operand);
        }
        self.value(operand);
        if operand.ty.is_error() {
            return Type::Error;
        }
        match op {
            UnaryOp::Plus | UnaryOp::Minus => {
                if !operand.ty.is_arithmetic() {
                    return self.invalid_unary_operand(if op == UnaryOp::Plus { "+" } else { "-" }, operand);
                }
                self.promote(operand);
                operand.ty.clone()
            }
            UnaryOp::BitNot => {
                if !operand.ty.is_integer() {
                    return self.invalid_unary_operand("~", operand);
                }
                self.promote(operand);
                operand.ty.clone()
            }
            UnaryOp::Not => {
                if !operand.ty.is_scalar() {
                    return self.invalid_unary_operand("!", operand);
                }
                Type::Int
            }
            UnaryOp::Deref => match operand.ty.clone() {
                Type::Pointer(inner) if inner.is_void() => {
                    self.error(operand.span, "indirection of a 'void *' pointer is not supported");
                    Type::Error
                }
                Type::Pointer(inner) => *inner,
                other => {
                    self.error(operand.span, format!("indirection requires pointer operand ('{other}' invalid)"));
                    Type::Error
                }
            },
            UnaryOp::AddrOf => Type::Error,
        }
    }

    fn resolve_address_of(&mut self, operand: &mut Expr) -> Type {
        self.resolve_expr(operand);
        if operand.ty.is_error() {
            return Type::Error;
        }
        if operand.ty.is_function() || self.is_lvalue(operand) {
            return operand.ty.clone().pointer_to();
        }
        let ty = operand.ty.clone();
        self.error(operand.span, format!("cannot take the address of an rvalue of type '{ty}'"));
        Type::Error
    }

    fn resolve_incdec(&mut self, op: IncDecOp, operand: &mut Expr) -> Type {
        self.resolve_expr(operand);
        if operand.ty.is_error() {
            return Type::Error;
        }
        if !self.is_modifiable_lvalue(operand) {
            self.error(operand.span, "expression is not assignable");
            return Type::Error;
        }
        let ty = operand.ty.clone();
        if ty.is_pointer() {
            if !self.check_pointer_arithmetic(&ty, operand.span) {
                return Type::Error;
            }
        } else if !ty.is_arithmetic() {
            let verb = if op.is_increment() { "increment" } else { "decrement" };
            self.error(operand.span, format!("cannot {verb} value of type '{ty}'"));
            return Type::Error;
        }
        ty
    }

    /// Pointer arithmetic needs a complete object pointee.
    fn check_pointer_arithmetic(&mut self, ptr: &Type, span: Span) -> bool {
        let Some(pointee) = ptr.pointee().cloned() else {
            return false;
        };
        if pointee.is_void() {
            self.error(span, "arithmetic on a pointer to void");
            false
        } else if pointee.is_function() {
            self.error(span, format!("arithmetic on a pointer to the function type '{pointee}'"));
            false
        } else if !self.is_complete(&pointee) {
            self.error(span, format!("arithmetic on a pointer to an incomplete type '{pointee}'"));
            false
        } else {
            true
        }
    }

    fn invalid_operands(&mut self, lhs: &Expr, rhs: &Expr) -> Type {
        let (lt, rt) = (lhs.ty.clone(), rhs.ty.clone());
        let span = Span::new(lhs.span.start, rhs.span.end);
        self.error(span, format!("invalid operands to binary expression ('{lt}' and '{rt}')"));
        Type::Error
    }

    /// Converts both operands to their common arithmetic type.
    fn arithmetic_operands(&mut self, lhs: &mut Expr, rhs: &mut Expr) -> Type {
        let common = Type::usual_arithmetic(&lhs.ty, &rhs.ty);
        self.implicit(lhs, &common);
        self.implicit(rhs, &common);
        common
    }

    fn warn_constant_division_by_zero(&mut self, op: BinaryOp, rhs: &Expr) {
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && rhs.ty.is_integer() && const_eval(rhs, &*self) == Some(0) {
            let what = if op == BinaryOp::Div { "division" } else { "remainder" };
            self.warning(rhs.span, format!("{what} by zero is undefined"));
        }
    }

    /// Constant shift counts past the width of the promoted left operand
    /// fold to a masked count, so they get flagged here.
    fn warn_constant_shift_count(&mut self, lhs: &Expr, rhs: &Expr) {
        let (Some(bits), Some(count)) = (lhs.ty.bit_width(), const_eval(rhs, &*self)) else {
            return;
        };
        if count < 0 {
            self.warning(rhs.span, "shift count is negative");
        } else if count >= i64::from(bits) {
            let ty = lhs.ty.clone();
            self.warning(rhs.span, format!("shift count {count} >= width of type '{ty}'"));
        }
    }

    fn resolve_binary(&mut self, op: BinaryOp, lhs: &mut Box<Expr>, rhs: &mut Box<Expr>) -> Type {
        self.value(lhs);
        self.value(rhs);
        if lhs.ty.is_error() || rhs.ty.is_error() {
            return Type::Error;
        }
        let (lt, rt) = (lhs.ty.clone(), rhs.ty.clone());
        match op {
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                if !lt.is_scalar() || !rt.is_scalar() {
                    return self.invalid_operands(lhs, rhs);
                }
                Type::Int
            }
            BinaryOp::Mul | BinaryOp::Div => {
                if !lt.is_arithmetic() || !rt.is_arithmetic() {
                    return self.invalid_operands(lhs, rhs);
                }
                self.warn_constant_division_by_zero(op, rhs);
                self.arithmetic_operands(lhs, rhs)
            }
            BinaryOp::Rem | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if !lt.is_integer() || !rt.is_integer() {
                    return self.invalid_operands(lhs, rhs);
                }
                self.warn_constant_division_by_zero(op, rhs);
                self.arithmetic_operands(lhs, rhs)
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                if !lt.is_integer() || !rt.is_integer() {
                    return self.invalid_operands(lhs, rhs);
                }
                self.promote(lhs);
                self.promote(rhs);
                self.warn_constant_shift_count(lhs, rhs);
                lhs.ty.clone()
            }
            BinaryOp::Add => {
                if lt.is_arithmetic() && rt.is_arithmetic() {
                    return self.arithmetic_operands(lhs, rhs);
                }
                // `n + p` is evaluated as `p + n`.
                if lt.is_integer() && rt.is_pointer() {
                    std::mem::swap(lhs, rhs);
                }
                if lhs.ty.is_pointer() && rhs.ty.is_integer() {
                    let ptr = lhs.ty.clone();
                    if !self.check_pointer_arithmetic(&ptr, lhs.span) {
                        return Type::Error;
                    }
                    self.implicit(rhs, &Type::Long);
                    return ptr;
                }
                self.invalid_operands(lhs, rhs)
            }
            BinaryOp::Sub => {
                if lt.is_arithmetic() && rt.is_arithmetic() {
                    return self.arithmetic_operands(lhs, rhs);
                }
                match (&lt, &rt) {
                    (Type::Pointer(_), r) if r.is_integer() => {
                        if !self.check_pointer_arithmetic(&lt, lhs.span) {
                            return Type::Error;
                        }
                        self.implicit(rhs, &Type::Long);
                        lt.clone()
                    }
                    (Type::Pointer(a), Type::Pointer(b)) => {
                        if !self.types.compatible(a, b) {
                            let span = Span::new(lhs.span.start, rhs.span.end);
                            self.error(span, format!("'{lt}' and '{rt}' are not pointers to compatible types"));
                            return Type::Error;
                        }
                        if !self.check_pointer_arithmetic(&lt, lhs.span) {
                            return Type::Error;
                        }
                        Type::Long
                    }
                    _ => self.invalid_operands(lhs, rhs),
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
                self.resolve_comparison(op, lhs, rhs)
            }
        }
    }

    fn resolve_comparison(&mut self, op: BinaryOp, lhs: &mut Expr, rhs: &mut Expr) -> Type {
        let (lt, rt) = (lhs.ty.clone(), rhs.ty.clone());
        let equality = matches!(op, BinaryOp::Eq | BinaryOp::Ne);
        if lt.is_arithmetic() && rt.is_arithmetic() {
            self.arithmetic_operands(lhs, rhs);
            return Type::Int;
        }
        match (&lt, &rt) {
            (Type::Pointer(a), Type::Pointer(b)) => {
                let void_pair = a.is_void() || b.is_void();
                if !void_pair && !self.types.compatible(a, b) {
                    let span = Span::new(lhs.span.start, rhs.span.end);
                    self.warning(span, format!("comparison of distinct pointer types ('{lt}' and '{rt}')"));
                }
                self.implicit(rhs, &lt);
                Type::Int
            }
            (Type::Pointer(_), _) if equality && self.is_null_pointer_constant(rhs) => {
                self.implicit(rhs, &lt);
                Type::Int
            }
            (_, Type::Pointer(_)) if equality && self.is_null_pointer_constant(lhs) => {
                self.implicit(lhs, &rt);
                Type::Int
            }
            (Type::Pointer(_), other) | (other, Type::Pointer(_)) if other.is_integer() => {
                let span = Span::new(lhs.span.start, rhs.span.end);
                self.error(span, format!("comparison between pointer and integer ('{lt}' and '{rt}')"));
                Type::Error
            }
            _ => self.invalid_operands(lhs, rhs),
        }
    }

    fn resolve_assign(
        &mut self,
        op: Option<BinaryOp>,
        target: &mut Expr,
        value: &mut Expr,
        compute_ty: &mut Type,
    ) -> Type {
        self.resolve_expr(target);
        self.value(value);
        if target.ty.is_error() || value.ty.is_error() {
            return Type::Error;
        }
        if !self.is_modifiable_lvalue(target) {
            if target.ty.is_array() {
                let ty = target.ty.clone();
                self.error(target.span, format!("array type '{ty}' is not assignable"));
            } else {
                self.error(target.span, "expression is not assignable");
            }
            return Type::Error;
        }
        let tt = target.ty.clone();
        let Some(op) = op else {
            self.assign_convert(value, &tt, ConversionContext::Assigning);
            *compute_ty = tt.clone();
            return tt;
        };
        let vt = value.ty.clone();
        match op {
            BinaryOp::Add | BinaryOp::Sub if tt.is_pointer() => {
                if !vt.is_integer() {
                    return self.invalid_operands(target, value);
                }
                if !self.check_pointer_arithmetic(&tt, target.span) {
                    return Type::Error;
                }
                self.implicit(value, &Type::Long);
                *compute_ty = tt.clone();
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                if !tt.is_integer() || !vt.is_integer() {
                    return self.invalid_operands(target, value);
                }
                self.promote(value);
                *compute_ty = tt.promoted();
            }
            BinaryOp::Rem | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if !tt.is_integer() || !vt.is_integer() {
                    return self.invalid_operands(target, value);
                }
                self.warn_constant_division_by_zero(op, value);
                let common = Type::usual_arithmetic(&tt, &vt);
                self.implicit(value, &common);
                *compute_ty = common;
            }
            _ => {
                if !tt.is_arithmetic() || !vt.is_arithmetic() {
                    return self.invalid_operands(target, value);
                }
                self.warn_constant_division_by_zero(op, value);
                let common = Type::usual_arithmetic(&tt, &vt);
                self.implicit(value, &common);
                *compute_ty = common;
            }
        }
        tt
    }

    fn resolve_conditional(&mut self, cond: &mut Expr, then_expr: &mut Expr, else_expr: &mut Expr) -> Type {
        self.condition(cond);
        self.value(then_expr);
        self.value(else_expr);
        if cond.ty.is_error() || then_expr.ty.is_error() || else_expr.ty.is_error() {
            return Type::Error;
        }
        let (tt, et) = (then_expr.ty.clone(), else_expr.ty.clone());
        if tt.is_arithmetic() && et.is_arithmetic() {
            return self.arithmetic_operands(then_expr, else_expr);
        }
        match (&tt, &et) {
            (Type::Void, Type::Void) => Type::Void,
            (Type::Record(..), Type::Record(..)) if tt == et => tt.clone(),
            (Type::Pointer(a), Type::Pointer(b)) => {
                let result = if a.is_void() {
                    tt.clone()
                } else if b.is_void() {
                    et.clone()
                } else {
                    if !self.types.compatible(a, b) {
                        let span = Span::new(then_expr.span.start, else_expr.span.end);
                        self.warning(span, format!("pointer type mismatch ('{tt}' and '{et}')"));
                    }
                    tt.clone()
                };
                self.implicit(then_expr, &result);
                self.implicit(else_expr, &result);
                result
            }
            (Type::Pointer(_), _) if self.is_null_pointer_constant(else_expr) => {
                self.implicit(else_expr, &tt);
                tt.clone()
            }
            (_, Type::Pointer(_)) if self.is_null_pointer_constant(then_expr) => {
                self.implicit(then_expr, &et);
                et.clone()
            }
            _ => {
                let span = Span::new(then_expr.span.start, else_expr.span.end);
                self.error(span, format!("incompatible operand types ('{tt}' and '{et}')"));
                Type::Error
            }
        }
    }

    fn is_function_designator(&self, expr: &Expr) -> bool {
        matches!(
            &expr.kind,
            ExprKind::Ident { symbol: Some(id), .. } if self.symbols.get(*id).storage == StorageKind::Function
        )
    }

    fn resolve_call(&mut self, callee: &mut Box<Expr>, args: &mut [Expr], span: Span) -> Type {
        self.resolve_expr(callee);
        // `(*fp)(x)` calls through the pointer itself.
        if callee.ty.is_function()
            && let ExprKind::Unary {
                op: UnaryOp::Deref,
                expr: operand,
            } = &mut callee.kind
        {
            let operand = std::mem::replace(operand.as_mut(), Expr::int(0, span));
            **callee = operand;
        }
        if let ExprKind::ImplicitCast {
            kind: CastKind::FunctionToPointer,
            expr: inner,
        } = &mut callee.kind
            && self.is_function_designator(inner)
        {
            let inner = std::mem::replace(inner.as_mut(), Expr::int(0, span));
            **callee = inner;
        }
        if callee.ty.is_function() && !self.is_function_designator(callee) {
            self.decay(callee);
        }

        let func = match callee.ty.as_function() {
            Some(func) => Some(func.clone()),
            None if callee.ty.is_error() => None,
            None => {
                let ty = callee.ty.clone();
                self.error(callee.span, format!("called object type '{ty}' is not a function or function pointer"));
                None
            }
        };
        let Some(func) = func else {
            for arg in args.iter_mut() {
                self.value(arg);
            }
            return Type::Error;
        };

        let expected = func.params.len();
        if args.len() < expected || (!func.variadic && args.len() > expected) {
            let (which, at_least) = if args.len() < expected { ("few", func.variadic) } else { ("many", false) };
            let bound = if at_least { "at least " } else { "" };
            self.error(
                span,
                format!(
                    "too {which} arguments to function call, expected {bound}{expected}, have {}",
                    args.len()
                ),
            );
        }
        for (i, arg) in args.iter_mut().enumerate() {
            self.value(arg);
            match func.params.get(i) {
                Some(param) => self.assign_convert(arg, param, ConversionContext::Passing),
                None => self.promote_vararg(arg),
            }
        }
        let ret = self.canonical(&func.ret);
        if ret.is_record() && !self.is_complete(&ret) {
            self.error(span, format!("calling function with incomplete return type '{ret}'"));
            return Type::Error;
        }
        ret
    }

    fn resolve_index(&mut self, base: &mut Box<Expr>, index: &mut Box<Expr>) -> Type {
        self.value(base);
        self.value(index);
        if base.ty.is_error() || index.ty.is_error() {
            return Type::Error;
        }
        // `i[a]` is `a[i]`.
        if base.ty.is_integer() && index.ty.is_pointer() {
            std::mem::swap(base, index);
        }
        let Some(elem) = base.ty.pointee().cloned() else {
            self.error(base.span, "subscripted value is not an array or pointer");
            return Type::Error;
        };
        if !index.ty.is_integer() {
            self.error(index.span, "array subscript is not an integer");
            return Type::Error;
        }
        let ptr = base.ty.clone();
        if !self.check_pointer_arithmetic(&ptr, base.span) {
            return Type::Error;
        }
        elem
    }

    fn resolve_member(&mut self, base: &mut Expr, field: &str, arrow: bool, span: Span) -> Type {
        if arrow {
            self.value(base);
        } else {
            self.resolve_expr(base);
        }
        if base.ty.is_error() {
            return Type::Error;
        }
        let record = match (&base.ty, arrow) {
            (Type::Pointer(inner), true) if inner.is_record() => (**inner).clone(),
            (Type::Record(..), false) => base.ty.clone(),
            (Type::Record(..), true) => {
                let ty = base.ty.clone();
                self.error(base.span, format!("member reference type '{ty}' is not a pointer; did you mean to use '.'?"));
                return Type::Error;
            }
            (Type::Pointer(inner), false) if inner.is_record() => {
                let ty = base.ty.clone();
                self.error(base.span, format!("member reference type '{ty}' is a pointer; did you mean to use '->'?"));
                return Type::Error;
            }
            (other, _) => {
                let ty = other.clone();
                self.error(base.span, format!("member reference base type '{ty}' is not a structure or union"));
                return Type::Error;
            }
        };
        let Type::Record(_, tag) = &record else {
            return Type::Error;
        };
        let field_ty = match self.types.record(tag) {
            Some(layout) if layout.is_complete() => layout.field(field).map(|f| f.ty.clone()),
            _ => {
                self.error(base.span, format!("incomplete definition of type '{record}'"));
                return Type::Error;
            }
        };
        match field_ty {
            Some(ty) => self.canonical(&ty),
            None => {
                self.error(span, format!("no member named '{field}' in '{record}'"));
                Type::Error
            }
        }
    }

    fn resolve_cast(&mut self, ty: &Type, kind: &mut CastKind, operand: &mut Expr, span: Span) -> Type {
        self.note_records(ty);
        let target = self.canonical(ty);
        self.value(operand);
        if operand.ty.is_error() || target.is_error() {
            return Type::Error;
        }
        let source = operand.ty.clone();
        if target.is_void() {
            *kind = CastKind::ToVoid;
            return Type::Void;
        }
        if !target.is_scalar() {
            self.error(span, format!("used type '{target}' where arithmetic or pointer type is required"));
            return Type::Error;
        }
        if !source.is_scalar() {
            self.error(operand.span, format!("operand of type '{source}' where arithmetic or pointer type is required"));
            return Type::Error;
        }
        if (target.is_pointer() && source.is_floating()) || (target.is_floating() && source.is_pointer()) {
            self.error(span, format!("cannot cast from type '{source}' to type '{target}'"));
            return Type::Error;
        }
        *kind = if target.is_pointer() && source.is_integer() && self.is_null_pointer_constant(operand) {
            CastKind::NullToPointer
        } else {
            cast_kind(&source, &target)
        };
        target
    }

    fn sizeof_type(&mut self, ty: &Type, span: Span) -> Type {
        if ty.is_error() {
            return Type::Error;
        }
        if ty.is_function() {
            self.error(span, "invalid application of 'sizeof' to a function type");
            return Type::Error;
        }
        if !self.is_complete(ty) {
            self.error(span, format!("invalid application of 'sizeof' to an incomplete type '{ty}'"));
            return Type::Error;
        }
        if !self.check_object_size(ty, span) {
            return Type::Error;
        }
        Type::ULong
    }
}

use model::{BinaryOp, CastKind, Expr, ExprKind, IncDecOp, SymbolId, Type, UnaryOp};

use crate::function::FunctionGenerator;
use crate::names::escape;
use crate::types::{int_literal, scalar_name};

/// A rendered Rust expression. Atomic ones bind like a method-call receiver
/// and never need parentheses.
pub(crate) struct Code {
    pub text: String,
    atomic: bool,
}

impl Code {
    fn atom(text: String) -> Self {
        Self { text, atomic: true }
    }

    fn compound(text: String) -> Self {
        Self { text, atomic: false }
    }

    /// The text, parenthesized unless atomic.
    pub fn operand(self) -> String {
        if self.atomic { self.text } else { format!("({})", self.text) }
    }
}

/// Whether evaluating `expr` can change program state.
pub(crate) fn has_side_effects(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } | ExprKind::Assign { .. } | ExprKind::IncDec { .. } => true,
        ExprKind::IntLiteral { .. }
        | ExprKind::FloatLiteral { .. }
        | ExprKind::CharLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::Ident { .. }
        | ExprKind::SizeOfType(_)
        | ExprKind::SizeOfExpr(_) => false,
        ExprKind::Unary { expr: inner, .. }
        | ExprKind::Cast { expr: inner, .. }
        | ExprKind::ImplicitCast { expr: inner, .. }
        | ExprKind::Member { base: inner, .. } => has_side_effects(inner),
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Index { base: lhs, index: rhs } => {
            has_side_effects(lhs) || has_side_effects(rhs)
        }
        ExprKind::Conditional {
            cond,
            then_expr,
            else_expr,
        } => has_side_effects(cond) || has_side_effects(then_expr) || has_side_effects(else_expr),
        ExprKind::Comma(items) => items.iter().any(has_side_effects),
    }
}

/// `b"...\0"`, escaping everything outside printable ASCII.
pub(crate) fn byte_string(bytes: &[u8]) -> String {
    let mut out = String::from("b\"");
    for &b in bytes.iter().chain(std::iter::once(&0)) {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0 => out.push_str("\\0"),
            0x20..=0x7e => out.push(char::from(b)),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('"');
    out
}

pub(crate) fn float_literal(value: f64, single: bool) -> String {
    let suffix = if single { "f32" } else { "f64" };
    if value.is_nan() {
        format!("{suffix}::NAN")
    } else if value.is_infinite() {
        format!("{suffix}::INFINITY")
    } else if single {
        format!("{:?}{suffix}", value as f32)
    } else {
        format!("{value:?}{suffix}")
    }
}

/// Infix or wrapping-method form of an arithmetic operator on operands
/// already converted to `ty`.
fn arith(op: BinaryOp, lhs: String, rhs: Code, ty: &Type) -> Code {
    if ty.is_floating() {
        return Code::compound(format!("{lhs} {} {}", op.symbol(), rhs.operand()));
    }
    let method = match op {
        BinaryOp::Add => "wrapping_add",
        BinaryOp::Sub => "wrapping_sub",
        BinaryOp::Mul => "wrapping_mul",
        BinaryOp::Div => "wrapping_div",
        BinaryOp::Rem => "wrapping_rem",
        BinaryOp::Shl => return Code::atom(format!("{lhs}.wrapping_shl({} as u32)", rhs.operand())),
        BinaryOp::Shr => return Code::atom(format!("{lhs}.wrapping_shr({} as u32)", rhs.operand())),
        _ => return Code::compound(format!("{lhs} {} {}", op.symbol(), rhs.operand())),
    };
    Code::atom(format!("{lhs}.{method}({})", rhs.text))
}

impl FunctionGenerator<'_> {
    pub(crate) fn expr(&mut self, e: &Expr) -> Code {
        match &e.kind {
            ExprKind::IntLiteral { value, .. } => Code::atom(int_literal(*value as i64, &e.ty)),
            ExprKind::CharLiteral(v) => Code::atom(int_literal(*v, &e.ty)),
            ExprKind::FloatLiteral { value, single } => Code::atom(float_literal(*value, *single)),
            ExprKind::StringLiteral(bytes) => Code::compound(format!("{}.as_ptr() as *mut i8", byte_string(bytes))),
            ExprKind::Ident { name, symbol } => Code::atom(self.ident(*symbol, name)),
            ExprKind::Unary { op, expr: inner } => self.unary(*op, inner, &e.ty),
            ExprKind::IncDec { op, expr: target } => self.incdec_value(*op, target),
            ExprKind::Binary { op, .. } if op.is_comparison() || op.is_logical() => {
                Code::compound(format!("({}) as i32", self.cond(e).text))
            }
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, &e.ty),
            ExprKind::Assign {
                op,
                target,
                value,
                compute_ty,
            } => {
                let (setup, place) = self.stable_place(target);
                let new = self.assigned_value(*op, &place, target, value, compute_ty);
                Code::compound(format!("{{ {setup}{place} = {new}; {place} }}"))
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let c = self.cond(cond).text;
                let t = self.value(then_expr);
                let f = self.value(else_expr);
                Code::compound(format!("if {c} {{ {t} }} else {{ {f} }}"))
            }
            ExprKind::Comma(items) => {
                let Some((last, rest)) = items.split_last() else {
                    return Code::atom("()".to_string());
                };
                let mut parts = Vec::new();
                for item in rest {
                    parts.push(self.expr_stmt(item));
                }
                parts.push(self.value(last));
                Code::compound(format!("{{ {} }}", parts.join(" ")))
            }
            ExprKind::Call { callee, args } => self.call(callee, args),
            ExprKind::Index { .. } | ExprKind::Member { .. } => Code::atom(self.place(e)),
            ExprKind::Cast { kind, expr: inner, .. } | ExprKind::ImplicitCast { kind, expr: inner } => {
                self.convert(*kind, inner, &e.ty)
            }
            ExprKind::SizeOfType(ty) => self.size_of(ty, &e.ty),
            ExprKind::SizeOfExpr(inner) => self.size_of(&inner.ty, &e.ty),
        }
    }

    pub(crate) fn value(&mut self, e: &Expr) -> String {
        self.expr(e).text
    }

    pub(crate) fn operand(&mut self, e: &Expr) -> String {
        self.expr(e).operand()
    }

    fn ident(&self, symbol: Option<SymbolId>, name: &str) -> String {
        match symbol {
            Some(id) => self.name(id),
            None => escape(name),
        }
    }

    fn size_of(&self, ty: &Type, result: &Type) -> Code {
        let rust = self.types.rust(ty);
        let result = scalar_name(result).unwrap_or("u64");
        Code::compound(format!("::core::mem::size_of::<{rust}>() as {result}"))
    }

    // ─── Conditions ─────────────────────────────────────────────

    /// `e` as a Rust `bool`.
    pub(crate) fn cond(&mut self, e: &Expr) -> Code {
        match &e.kind {
            ExprKind::Binary { op, lhs, rhs } if op.is_comparison() => {
                let l = self.operand(lhs);
                let r = self.operand(rhs);
                Code::compound(format!("{l} {} {r}", op.symbol()))
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_logical() => {
                let l = self.logical_side(lhs);
                let r = self.logical_side(rhs);
                Code::compound(format!("{l} {} {r}", op.symbol()))
            }
            ExprKind::Unary { op: UnaryOp::Not, expr: inner } => Code::compound(self.falsy(inner)),
            _ => {
                let ty = e.ty.clone();
                let v = self.operand(e);
                if ty.is_function_pointer() {
                    Code::atom(format!("{v}.is_some()"))
                } else if ty.is_pointer() {
                    Code::compound(format!("!{v}.is_null()"))
                } else if ty.is_floating() {
                    Code::compound(format!("{v} != 0.0"))
                } else {
                    Code::compound(format!("{v} != 0"))
                }
            }
        }
    }

    fn logical_side(&mut self, e: &Expr) -> String {
        let nested = matches!(&e.kind, ExprKind::Binary { op, .. } if op.is_logical());
        let text = self.cond(e).text;
        if nested { format!("({text})") } else { text }
    }

    /// `!e` as a Rust `bool`.
    pub(crate) fn falsy(&mut self, e: &Expr) -> String {
        let boolean = match &e.kind {
            ExprKind::Binary { op, .. } => op.is_comparison() || op.is_logical(),
            ExprKind::Unary { op, .. } => *op == UnaryOp::Not,
            _ => false,
        };
        if boolean {
            return format!("!({})", self.cond(e).text);
        }
        let ty = e.ty.clone();
        let v = self.operand(e);
        if ty.is_function_pointer() {
            format!("{v}.is_none()")
        } else if ty.is_pointer() {
            format!("{v}.is_null()")
        } else if ty.is_floating() {
            format!("{v} == 0.0")
        } else {
            format!("{v} == 0")
        }
    }

    // ─── Operators ──────────────────────────────────────────────

    fn unary(&mut self, op: UnaryOp, inner: &Expr, ty: &Type) -> Code {
        match op {
            UnaryOp::Plus => self.expr(inner),
            UnaryOp::Minus if ty.is_floating() => Code::compound(format!("-{}", self.operand(inner))),
            UnaryOp::Minus => Code::atom(format!("{}.wrapping_neg()", self.operand(inner))),
            UnaryOp::BitNot => Code::compound(format!("!{}", self.operand(inner))),
            UnaryOp::Not => Code::compound(format!("({}) as i32", self.falsy(inner))),
            UnaryOp::Deref => Code::atom(format!("(*{})", self.operand(inner))),
            UnaryOp::AddrOf => self.address_of(inner),
        }
    }

    fn address_of(&mut self, inner: &Expr) -> Code {
        if inner.ty.is_function() {
            return self.function_pointer(inner);
        }
        match &inner.kind {
            // `&*p` is `p`.
            ExprKind::Unary {
                op: UnaryOp::Deref,
                expr: pointer,
            } => self.expr(pointer),
            ExprKind::StringLiteral(bytes) => {
                let array = self.types.rust(&inner.ty);
                Code::compound(format!("{}.as_ptr() as *mut {array}", byte_string(bytes)))
            }
            _ => Code::atom(format!("::core::ptr::addr_of_mut!({})", self.place(inner))),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, ty: &Type) -> Code {
        if lhs.ty.is_pointer() {
            let p = self.operand(lhs);
            return match op {
                BinaryOp::Sub if rhs.ty.is_pointer() => {
                    let q = self.value(rhs);
                    Code::compound(format!("{p}.offset_from({q}) as i64"))
                }
                BinaryOp::Sub => {
                    let n = self.operand(rhs);
                    Code::atom(format!("{p}.wrapping_offset(({n} as isize).wrapping_neg())"))
                }
                _ => {
                    let n = self.operand(rhs);
                    Code::atom(format!("{p}.wrapping_offset({n} as isize)"))
                }
            };
        }
        let l = self.operand(lhs);
        let r = self.expr(rhs);
        arith(op, l, r, ty)
    }

    /// Converts between arithmetic types with `as`.
    fn numeric_cast(&self, code: Code, from: &Type, to: &Type) -> Code {
        let (Some(from), Some(to)) = (scalar_name(from), scalar_name(to)) else {
            return code;
        };
        if from == to {
            return code;
        }
        Code::compound(format!("{} as {to}", code.operand()))
    }

    // ─── Places and assignment ──────────────────────────────────

    /// A Rust place expression designating the same object as `e`.
    pub(crate) fn place(&mut self, e: &Expr) -> String {
        match &e.kind {
            ExprKind::Ident { name, symbol } => self.ident(*symbol, name),
            ExprKind::Unary {
                op: UnaryOp::Deref,
                expr: pointer,
            } => format!("(*{})", self.operand(pointer)),
            ExprKind::Index { base, index } => {
                let i = self.operand(index);
                if let ExprKind::ImplicitCast {
                    kind: CastKind::ArrayToPointer,
                    expr: array,
                } = &base.kind
                    && array.is_place()
                    && !matches!(array.kind, ExprKind::StringLiteral(_))
                {
                    return format!("{}[{i} as usize]", self.place(array));
                }
                format!("(*{}.wrapping_offset({i} as isize))", self.operand(base))
            }
            ExprKind::Member { base, field, arrow } => {
                let field = escape(field);
                if *arrow {
                    format!("(*{}).{field}", self.operand(base))
                } else if base.is_place() {
                    format!("{}.{field}", self.place(base))
                } else {
                    format!("{}.{field}", self.operand(base))
                }
            }
            _ => self.operand(e),
        }
    }

    /// The place of `target`, evaluated once: side effects in the place go
    /// into a pointer temporary set up by the returned prefix.
    fn stable_place(&mut self, target: &Expr) -> (String, String) {
        let place = self.place(target);
        if has_side_effects(target) {
            let p = self.temp("p");
            (format!("let {p} = ::core::ptr::addr_of_mut!({place}); "), format!("(*{p})"))
        } else {
            (String::new(), place)
        }
    }

    /// The value stored by an assignment whose target currently reads as
    /// `current`.
    fn assigned_value(
        &mut self,
        op: Option<BinaryOp>,
        current: &str,
        target: &Expr,
        value: &Expr,
        compute_ty: &Type,
    ) -> String {
        let Some(op) = op else {
            return self.value(value);
        };
        if target.ty.is_pointer() {
            let n = self.operand(value);
            return if op == BinaryOp::Sub {
                format!("{current}.wrapping_offset(({n} as isize).wrapping_neg())")
            } else {
                format!("{current}.wrapping_offset({n} as isize)")
            };
        }
        let lhs = self.numeric_cast(Code::atom(current.to_string()), &target.ty, compute_ty);
        let rhs = self.expr(value);
        let result = arith(op, lhs.operand(), rhs, compute_ty);
        self.numeric_cast(result, compute_ty, &target.ty).text
    }

    fn step(op: IncDecOp, current: &str, ty: &Type) -> String {
        let inc = op.is_increment();
        if ty.is_pointer() {
            format!("{current}.wrapping_offset({})", if inc { "1" } else { "-1" })
        } else if ty.is_floating() {
            format!("{current} {} 1.0", if inc { "+" } else { "-" })
        } else {
            format!("{current}.{}(1)", if inc { "wrapping_add" } else { "wrapping_sub" })
        }
    }

    fn incdec_value(&mut self, op: IncDecOp, target: &Expr) -> Code {
        let (setup, place) = self.stable_place(target);
        if op.is_prefix() {
            let new = Self::step(op, &place, &target.ty);
            Code::compound(format!("{{ {setup}{place} = {new}; {place} }}"))
        } else {
            let t = self.temp("t");
            let new = Self::step(op, &t, &target.ty);
            Code::compound(format!("{{ {setup}let {t} = {place}; {place} = {new}; {t} }}"))
        }
    }

    /// An expression evaluated for its side effects, as a statement.
    pub(crate) fn expr_stmt(&mut self, e: &Expr) -> String {
        match &e.kind {
            ExprKind::Assign {
                op: None,
                target,
                value,
                ..
            } => {
                let place = self.place(target);
                let v = self.value(value);
                format!("{place} = {v};")
            }
            ExprKind::Assign {
                op,
                target,
                value,
                compute_ty,
            } => {
                let (setup, place) = self.stable_place(target);
                let new = self.assigned_value(*op, &place, target, value, compute_ty);
                if setup.is_empty() {
                    format!("{place} = {new};")
                } else {
                    format!("{{ {setup}{place} = {new}; }}")
                }
            }
            ExprKind::IncDec { op, expr: target } => {
                let (setup, place) = self.stable_place(target);
                let new = Self::step(*op, &place, &target.ty);
                if setup.is_empty() {
                    format!("{place} = {new};")
                } else {
                    format!("{{ {setup}{place} = {new}; }}")
                }
            }
            ExprKind::Comma(items) => {
                let mut parts = Vec::new();
                for item in items {
                    parts.push(self.expr_stmt(item));
                }
                parts.join(" ")
            }
            ExprKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let c = self.cond(cond).text;
                let t = self.expr_stmt(then_expr);
                let f = self.expr_stmt(else_expr);
                format!("if {c} {{ {t} }} else {{ {f} }}")
            }
            ExprKind::Binary {
                op: BinaryOp::LogicalAnd,
                lhs,
                rhs,
            } if has_side_effects(rhs) => {
                let c = self.cond(lhs).text;
                let body = self.expr_stmt(rhs);
                format!("if {c} {{ {body} }}")
            }
            ExprKind::Binary {
                op: BinaryOp::LogicalOr,
                lhs,
                rhs,
            } if has_side_effects(rhs) => {
                let c = self.falsy(lhs);
                let body = self.expr_stmt(rhs);
                format!("if {c} {{ {body} }}")
            }
            ExprKind::Cast {
                kind: CastKind::ToVoid,
                expr: inner,
                ..
            }
            | ExprKind::ImplicitCast {
                kind: CastKind::ToVoid,
                expr: inner,
            } => self.expr_stmt(inner),
            ExprKind::Call { .. } => format!("{};", self.value(e)),
            _ => format!("let _ = {};", self.value(e)),
        }
    }

    // ─── Calls and conversions ──────────────────────────────────

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Code {
        let mut rendered = Vec::new();
        for arg in args {
            rendered.push(self.value(arg));
        }
        let args = rendered.join(", ");
        match &callee.kind {
            ExprKind::Ident { name, symbol } if callee.ty.is_function() => {
                Code::atom(format!("{}({args})", self.ident(*symbol, name)))
            }
            _ => Code::atom(format!("{}.unwrap()({args})", self.operand(callee))),
        }
    }

    fn convert(&mut self, kind: CastKind, inner: &Expr, ty: &Type) -> Code {
        match kind {
            CastKind::NoOp => self.expr(inner),
            CastKind::ToVoid => Code::compound(format!("{{ let _ = {}; }}", self.value(inner))),
            CastKind::Integral | CastKind::IntegralToFloating | CastKind::FloatingToIntegral | CastKind::Floating => {
                let code = self.expr(inner);
                self.numeric_cast(code, &inner.ty, ty)
            }
            CastKind::ArrayToPointer => self.array_pointer(inner, ty),
            CastKind::FunctionToPointer => self.function_pointer(inner),
            CastKind::NullToPointer => Code::atom(self.types.zero(ty)),
            CastKind::PointerToPointer => {
                let (from, to) = (self.types.rust(&inner.ty), self.types.rust(ty));
                if inner.ty.is_function_pointer() || ty.is_function_pointer() {
                    let v = self.value(inner);
                    Code::atom(format!("::core::mem::transmute::<{from}, {to}>({v})"))
                } else if from == to {
                    self.expr(inner)
                } else {
                    Code::compound(format!("{} as {to}", self.operand(inner)))
                }
            }
            CastKind::IntegralToPointer => {
                let to = self.types.rust(ty);
                let v = self.operand(inner);
                if ty.is_function_pointer() {
                    Code::atom(format!("::core::mem::transmute::<usize, {to}>({v} as usize)"))
                } else {
                    Code::compound(format!("{v} as usize as {to}"))
                }
            }
            CastKind::PointerToIntegral => {
                let to = scalar_name(ty).unwrap_or("u64");
                if inner.ty.is_function_pointer() {
                    let from = self.types.rust(&inner.ty);
                    let v = self.value(inner);
                    Code::compound(format!("::core::mem::transmute::<{from}, usize>({v}) as {to}"))
                } else {
                    Code::compound(format!("{} as usize as {to}", self.operand(inner)))
                }
            }
        }
    }

    fn array_pointer(&mut self, array: &Expr, ty: &Type) -> Code {
        let elem = self.types.pointee_rust(ty);
        match &array.kind {
            ExprKind::StringLiteral(bytes) => {
                Code::compound(format!("{}.as_ptr() as *mut {elem}", byte_string(bytes)))
            }
            _ if array.is_place() => {
                Code::compound(format!("::core::ptr::addr_of_mut!({}) as *mut {elem}", self.place(array)))
            }
            // An array inside a record rvalue, such as `f().items`.
            _ => Code::atom(format!("{}.as_mut_ptr()", self.operand(array))),
        }
    }

    /// A function designator as an `Option<unsafe extern "C" fn..>` value.
    fn function_pointer(&mut self, designator: &Expr) -> Code {
        match &designator.kind {
            ExprKind::Unary {
                op: UnaryOp::Deref,
                expr: pointer,
            } => self.expr(pointer),
            ExprKind::Ident { name, symbol } => match designator.ty.as_function() {
                Some(func) => {
                    let fn_type = self.types.fn_type(func);
                    Code::atom(format!("Some({} as {fn_type})", self.ident(*symbol, name)))
                }
                None => Code::atom(self.ident(*symbol, name)),
            },
            _ => self.expr(designator),
        }
    }
}

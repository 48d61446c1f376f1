use crate::symbols::SymbolId;
use crate::token::{IntegerSuffix, Span};
use crate::types::{FunctionType, RecordKind, Type};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslationUnit {
    pub items: Vec<ExternalDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalDecl {
    Function(FunctionDef),
    Declaration(Declaration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageClass {
    #[default]
    None,
    Static,
    Extern,
    Typedef,
    Register,
    Auto,
}

/// One declaration statement: specifiers shared by every declarator, plus
/// the records and enums it defines inline.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub storage: StorageClass,
    pub base: Type,
    pub records: Vec<RecordDef>,
    pub enums: Vec<EnumDef>,
    pub declarators: Vec<InitDeclarator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitDeclarator {
    pub name: String,
    pub ty: Type,
    pub init: Option<Initializer>,
    pub span: Span,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Expr(Expr),
    List(Vec<Initializer>, Span),
}

impl Initializer {
    pub fn span(&self) -> Span {
        match self {
            Initializer::Expr(e) => e.span,
            Initializer::List(_, span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDef {
    pub kind: RecordKind,
    pub tag: String,
    pub fields: Vec<Field>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub tag: String,
    pub variants: Vec<EnumVariant>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub ty: FunctionType,
    pub params: Vec<Param>,
    pub storage: StorageClass,
    pub body: Block,
    pub span: Span,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Type,
    pub span: Span,
    pub symbol: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub items: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Declaration(Declaration),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Declaration(Declaration),
    Expr(Expr),
    Empty(Span),
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        span: Span,
    },
    For {
        init: Option<ForInit>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    Switch {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    /// `case expr:` label; `value` is filled in by the resolver.
    Case {
        expr: Expr,
        value: Option<i64>,
        span: Span,
    },
    Default(Span),
    Break(Span),
    Continue(Span),
    Return(Option<Expr>, Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Declaration(d) => d.span,
            Stmt::Expr(e) => e.span,
            Stmt::Block(b) => b.span,
            Stmt::Empty(span)
            | Stmt::Default(span)
            | Stmt::Break(span)
            | Stmt::Continue(span)
            | Stmt::Return(_, span)
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Case { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    Deref,
    AddrOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl IncDecOp {
    pub fn is_increment(self) -> bool {
        matches!(self, IncDecOp::PreInc | IncDecOp::PostInc)
    }

    pub fn is_prefix(self) -> bool {
        matches!(self, IncDecOp::PreInc | IncDecOp::PreDec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

/// Conversions made explicit by the resolver, both implicit ones and casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    NoOp,
    Integral,
    IntegralToFloating,
    FloatingToIntegral,
    Floating,
    ArrayToPointer,
    FunctionToPointer,
    NullToPointer,
    PointerToPointer,
    IntegralToPointer,
    PointerToIntegral,
    ToVoid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLiteral {
        value: u64,
        suffix: IntegerSuffix,
        decimal: bool,
    },
    FloatLiteral {
        value: f64,
        single: bool,
    },
    CharLiteral(i64),
    StringLiteral(Vec<u8>),
    Ident {
        name: String,
        symbol: Option<SymbolId>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IncDec {
        op: IncDecOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Plain (`op == None`) or compound assignment. `compute_ty` is the type
    /// the compound operation is carried out in.
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
        compute_ty: Type,
    },
    Conditional {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Comma(Vec<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        base: Box<Expr>,
        field: String,
        arrow: bool,
    },
    Cast {
        ty: Type,
        kind: CastKind,
        expr: Box<Expr>,
    },
    SizeOfType(Type),
    SizeOfExpr(Box<Expr>),
    ImplicitCast {
        kind: CastKind,
        expr: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, ty: Type::Error, span }
    }

    pub fn int(value: u64, span: Span) -> Self {
        Self::new(
            ExprKind::IntLiteral {
                value,
                suffix: IntegerSuffix::None,
                decimal: true,
            },
            span,
        )
    }

    /// Whether the expression can syntactically designate an object.
    pub fn is_place(&self) -> bool {
        match &self.kind {
            ExprKind::Ident { .. }
            | ExprKind::Index { .. }
            | ExprKind::Member { .. }
            | ExprKind::StringLiteral(_) => true,
            ExprKind::Unary { op: UnaryOp::Deref, .. } => true,
            _ => false,
        }
    }

    /// Looks through implicit conversions.
    pub fn strip_implicit(&self) -> &Expr {
        match &self.kind {
            ExprKind::ImplicitCast { expr, .. } => expr.strip_implicit(),
            _ => self,
        }
    }
}

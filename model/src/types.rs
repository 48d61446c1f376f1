use std::collections::HashMap;
use std::fmt;

use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Struct,
    Union,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Struct => f.write_str("struct"),
            RecordKind::Union => f.write_str("union"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub ret: Box<Type>,
    pub params: Vec<Type>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Pointer(Box<Type>),
    Array(Box<Type>, Option<usize>),
    Function(FunctionType),
    Record(RecordKind, String),
    Enum(String),
    Typedef(String),
    /// Placeholder for expressions not yet resolved, or whose resolution failed.
    Error,
}

impl Type {
    pub fn pointer_to(self) -> Type {
        Type::Pointer(Box::new(self))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::Char
                | Type::SChar
                | Type::UChar
                | Type::Short
                | Type::UShort
                | Type::Int
                | Type::UInt
                | Type::Long
                | Type::ULong
                | Type::LongLong
                | Type::ULongLong
                | Type::Enum(_)
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Float | Type::Double)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_function_pointer(&self) -> bool {
        matches!(self, Type::Pointer(inner) if matches!(**inner, Type::Function(_)))
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Type::Record(..))
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Type::Char | Type::SChar | Type::Short | Type::Int | Type::Long | Type::LongLong | Type::Enum(_)
        )
    }

    /// Pointed-to type of a pointer, element type of an array.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) | Type::Array(inner, _) => Some(inner),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match self {
            Type::Function(f) => Some(f),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Function(f) => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    /// Integer conversion rank; `None` for non-integers.
    pub fn rank(&self) -> Option<u8> {
        Some(match self {
            Type::Char | Type::SChar | Type::UChar => 1,
            Type::Short | Type::UShort => 2,
            Type::Int | Type::UInt | Type::Enum(_) => 3,
            Type::Long | Type::ULong => 4,
            Type::LongLong | Type::ULongLong => 5,
            _ => return None,
        })
    }

    /// Width in bits of integer types (LP64 model).
    pub fn bit_width(&self) -> Option<u32> {
        Some(match self {
            Type::Char | Type::SChar | Type::UChar => 8,
            Type::Short | Type::UShort => 16,
            Type::Int | Type::UInt | Type::Enum(_) => 32,
            Type::Long | Type::ULong | Type::LongLong | Type::ULongLong => 64,
            _ => return None,
        })
    }

    pub fn to_unsigned(&self) -> Type {
        match self {
            Type::Char | Type::SChar => Type::UChar,
            Type::Short => Type::UShort,
            Type::Int | Type::Enum(_) => Type::UInt,
            Type::Long => Type::ULong,
            Type::LongLong => Type::ULongLong,
            other => other.clone(),
        }
    }

    /// Integer promotion: everything below `int` becomes `int`.
    pub fn promoted(&self) -> Type {
        match self {
            Type::Char | Type::SChar | Type::UChar | Type::Short | Type::UShort | Type::Enum(_) => Type::Int,
            other => other.clone(),
        }
    }

    /// The common type of the usual arithmetic conversions.
    /// Both operands must be arithmetic.
    pub fn usual_arithmetic(a: &Type, b: &Type) -> Type {
        if matches!(a, Type::Double) || matches!(b, Type::Double) {
            return Type::Double;
        }
        if matches!(a, Type::Float) || matches!(b, Type::Float) {
            return Type::Float;
        }
        let a = a.promoted();
        let b = b.promoted();
        if a == b {
            return a;
        }
        let (ra, rb) = (a.rank().unwrap_or(3), b.rank().unwrap_or(3));
        if a.is_signed() == b.is_signed() {
            return if ra >= rb { a } else { b };
        }
        let (unsigned, signed, ru, rs) = if a.is_signed() { (b, a, rb, ra) } else { (a, b, ra, rb) };
        if ru >= rs {
            unsigned
        } else if signed.bit_width() > unsigned.bit_width() {
            signed
        } else {
            signed.to_unsigned()
        }
    }

    /// Size in bytes of scalar types; `None` for records, functions and void.
    pub fn scalar_size(&self) -> Option<u64> {
        if let Some(bits) = self.bit_width() {
            return Some(u64::from(bits / 8));
        }
        match self {
            Type::Float => Some(4),
            Type::Double | Type::Pointer(_) => Some(8),
            _ => None,
        }
    }

    /// Drops array extents, used when comparing array parameters and pointers.
    pub fn decayed(&self) -> Type {
        match self {
            Type::Array(inner, _) => Type::Pointer(inner.clone()),
            Type::Function(_) => Type::Pointer(Box::new(self.clone())),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Char => f.write_str("char"),
            Type::SChar => f.write_str("signed char"),
            Type::UChar => f.write_str("unsigned char"),
            Type::Short => f.write_str("short"),
            Type::UShort => f.write_str("unsigned short"),
            Type::Int => f.write_str("int"),
            Type::UInt => f.write_str("unsigned int"),
            Type::Long => f.write_str("long"),
            Type::ULong => f.write_str("unsigned long"),
            Type::LongLong => f.write_str("long long"),
            Type::ULongLong => f.write_str("unsigned long long"),
            Type::Float => f.write_str("float"),
            Type::Double => f.write_str("double"),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Function(func) => {
                    write!(f, "{} (*)(", func.ret)?;
                    write_params(f, func)?;
                    f.write_str(")")
                }
                other => write!(f, "{other} *"),
            },
            Type::Array(inner, Some(n)) => write!(f, "{inner}[{n}]"),
            Type::Array(inner, None) => write!(f, "{inner}[]"),
            Type::Function(func) => {
                write!(f, "{} (", func.ret)?;
                write_params(f, func)?;
                f.write_str(")")
            }
            Type::Record(kind, tag) => write!(f, "{kind} {tag}"),
            Type::Enum(tag) => write!(f, "enum {tag}"),
            Type::Typedef(name) => f.write_str(name),
            Type::Error => f.write_str("<error>"),
        }
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, func: &FunctionType) -> fmt::Result {
    for (i, p) in func.params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{p}")?;
    }
    if func.variadic {
        if func.params.is_empty() {
            f.write_str("...")?;
        } else {
            f.write_str(", ...")?;
        }
    } else if func.params.is_empty() {
        f.write_str("void")?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub ty: Type,
}

/// A struct or union as registered by the resolver. `fields` is `None`
/// while only a forward declaration has been seen.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub kind: RecordKind,
    pub tag: String,
    pub fields: Option<Vec<RecordField>>,
    pub declared_at: Span,
}

impl RecordLayout {
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.as_ref()?.iter().find(|f| f.name == name)
    }

    pub fn is_complete(&self) -> bool {
        self.fields.is_some()
    }
}

/// Translation-unit-wide type information: record layouts and typedef aliases.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    records: Vec<RecordLayout>,
    record_index: HashMap<String, usize>,
    typedefs: HashMap<String, Type>,
    builtin_typedefs: HashMap<String, Type>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins(builtins: &HashMap<String, Type>) -> Self {
        Self {
            builtin_typedefs: builtins.clone(),
            ..Self::default()
        }
    }

    pub fn record(&self, tag: &str) -> Option<&RecordLayout> {
        self.record_index.get(tag).map(|&i| &self.records[i])
    }

    pub fn record_mut(&mut self, tag: &str) -> Option<&mut RecordLayout> {
        let i = *self.record_index.get(tag)?;
        Some(&mut self.records[i])
    }

    /// Registers a record in declaration order. Returns `false` if the tag exists.
    pub fn insert_record(&mut self, layout: RecordLayout) -> bool {
        if self.record_index.contains_key(&layout.tag) {
            return false;
        }
        self.record_index.insert(layout.tag.clone(), self.records.len());
        self.records.push(layout);
        true
    }

    /// Re-keys a record, used when an anonymous record is named by its typedef.
    pub fn rename_record(&mut self, old: &str, new: &str) -> bool {
        if self.record_index.contains_key(new) {
            return false;
        }
        let Some(i) = self.record_index.remove(old) else {
            return false;
        };
        self.records[i].tag = new.to_string();
        self.record_index.insert(new.to_string(), i);
        true
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordLayout> {
        self.records.iter()
    }

    pub fn typedef(&self, name: &str) -> Option<&Type> {
        self.typedefs.get(name).or_else(|| self.builtin_typedefs.get(name))
    }

    pub fn is_builtin_typedef(&self, name: &str) -> bool {
        !self.typedefs.contains_key(name) && self.builtin_typedefs.contains_key(name)
    }

    pub fn insert_typedef(&mut self, name: String, ty: Type) {
        self.typedefs.insert(name, ty);
    }

    /// Strips typedefs and maps enums to `int`, recursively.
    pub fn canonical(&self, ty: &Type) -> Type {
        match ty {
            Type::Typedef(name) => match self.typedef(name) {
                Some(target) => self.canonical(target),
                None => Type::Error,
            },
            Type::Enum(_) => Type::Int,
            Type::Pointer(inner) => Type::Pointer(Box::new(self.canonical(inner))),
            Type::Array(inner, n) => Type::Array(Box::new(self.canonical(inner)), *n),
            Type::Function(func) => Type::Function(FunctionType {
                ret: Box::new(self.canonical(&func.ret)),
                params: func.params.iter().map(|p| self.canonical(p)).collect(),
                variadic: func.variadic,
            }),
            other => other.clone(),
        }
    }

    /// Type compatibility on canonical types, ignoring qualifiers.
    pub fn compatible(&self, a: &Type, b: &Type) -> bool {
        let (a, b) = (self.canonical(a), self.canonical(b));
        compatible_canonical(&a, &b)
    }

    pub fn is_complete(&self, ty: &Type) -> bool {
        match self.canonical(ty) {
            Type::Void | Type::Function(_) | Type::Error => false,
            Type::Array(inner, n) => n.is_some() && self.is_complete(&inner),
            Type::Record(_, tag) => self.record(&tag).is_some_and(RecordLayout::is_complete),
            _ => true,
        }
    }

    /// `sizeof` following the C (and `#[repr(C)]`) layout rules. `None` for
    /// incomplete types and for sizes that do not fit in a `u64`.
    pub fn size_of(&self, ty: &Type) -> Option<u64> {
        match self.canonical(ty) {
            Type::Array(inner, Some(n)) => self.size_of(&inner)?.checked_mul(u64::try_from(n).ok()?),
            Type::Record(kind, tag) => {
                let fields = self.record(&tag)?.fields.as_ref()?;
                let align = self.align_of(&Type::Record(kind, tag.clone()))?;
                let mut size = 0u64;
                for field in fields {
                    let fsize = self.size_of(&field.ty)?;
                    match kind {
                        RecordKind::Struct => {
                            let falign = self.align_of(&field.ty)?;
                            size = size.checked_next_multiple_of(falign)?.checked_add(fsize)?;
                        }
                        RecordKind::Union => size = size.max(fsize),
                    }
                }
                size.checked_next_multiple_of(align)
            }
            other => other.scalar_size(),
        }
    }

    pub fn align_of(&self, ty: &Type) -> Option<u64> {
        match self.canonical(ty) {
            Type::Array(inner, _) => self.align_of(&inner),
            Type::Record(_, tag) => {
                let fields = self.record(&tag)?.fields.as_ref()?;
                let mut align = 1;
                for field in fields {
                    align = align.max(self.align_of(&field.ty)?);
                }
                Some(align)
            }
            other => other.scalar_size(),
        }
    }
}

fn compatible_canonical(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Pointer(x), Type::Pointer(y)) => compatible_canonical(x, y),
        (Type::Array(x, n), Type::Array(y, m)) => {
            compatible_canonical(x, y) && (n.is_none() || m.is_none() || n == m)
        }
        (Type::Function(f), Type::Function(g)) => {
            f.variadic == g.variadic
                && f.params.len() == g.params.len()
                && compatible_canonical(&f.ret, &g.ret)
                && f.params.iter().zip(&g.params).all(|(p, q)| compatible_canonical(&p.decayed(), &q.decayed()))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn promotion_lifts_small_integers_to_int() {
        assert_eq!(Type::Char.promoted(), Type::Int);
        assert_eq!(Type::UShort.promoted(), Type::Int);
        assert_eq!(Type::UInt.promoted(), Type::UInt);
    }

    #[test]
    fn usual_arithmetic_conversions() {
        assert_eq!(Type::usual_arithmetic(&Type::Char, &Type::Short), Type::Int);
        assert_eq!(Type::usual_arithmetic(&Type::Int, &Type::UInt), Type::UInt);
        assert_eq!(Type::usual_arithmetic(&Type::UInt, &Type::Long), Type::Long);
        assert_eq!(Type::usual_arithmetic(&Type::ULong, &Type::LongLong), Type::ULongLong);
        assert_eq!(Type::usual_arithmetic(&Type::Long, &Type::ULongLong), Type::ULongLong);
        assert_eq!(Type::usual_arithmetic(&Type::Int, &Type::Float), Type::Float);
        assert_eq!(Type::usual_arithmetic(&Type::Float, &Type::Double), Type::Double);
    }

    #[test]
    fn canonical_strips_typedef_chains() {
        let mut table = TypeTable::new();
        table.insert_typedef("u8".into(), Type::UChar);
        table.insert_typedef("byte".into(), Type::Typedef("u8".into()));
        assert_eq!(
            table.canonical(&Type::Typedef("byte".into()).pointer_to()),
            Type::UChar.pointer_to()
        );
        assert_eq!(table.canonical(&Type::Enum("color".into())), Type::Int);
    }

    #[test]
    fn struct_layout_follows_c_rules() {
        let mut table = TypeTable::new();
        table.insert_record(RecordLayout {
            kind: RecordKind::Struct,
            tag: "s".into(),
            fields: Some(vec![
                RecordField { name: "c".into(), ty: Type::Char },
                RecordField { name: "d".into(), ty: Type::Double },
                RecordField { name: "i".into(), ty: Type::Int },
            ]),
            declared_at: Span::default(),
        });
        let s = Type::Record(RecordKind::Struct, "s".into());
        assert_eq!(table.size_of(&s), Some(24));
        assert_eq!(table.align_of(&s), Some(8));
        assert_eq!(table.size_of(&Type::Array(Box::new(s), Some(2))), Some(48));
    }

    #[test]
    fn oversized_arrays_have_no_size() {
        let table = TypeTable::new();
        let row = Type::Array(Box::new(Type::Char), Some(8));
        let big = Type::Array(Box::new(row), Some(1 << 62));
        assert_eq!(table.size_of(&big), None);
        let fits = Type::Array(Box::new(Type::Int), Some(1 << 40));
        assert_eq!(table.size_of(&fits), Some(1 << 42));
    }

    #[test]
    fn array_parameters_are_compatible_with_pointers() {
        let table = TypeTable::new();
        let f = Type::Function(FunctionType {
            ret: Box::new(Type::Int),
            params: vec![Type::Array(Box::new(Type::Int), None)],
            variadic: false,
        });
        let g = Type::Function(FunctionType {
            ret: Box::new(Type::Int),
            params: vec![Type::Int.pointer_to()],
            variadic: false,
        });
        assert!(table.compatible(&f, &g));
    }

    #[test]
    fn display_uses_c_spelling() {
        assert_eq!(Type::Char.pointer_to().to_string(), "char *");
        assert_eq!(Type::Record(RecordKind::Union, "u".into()).to_string(), "union u");
    }
}

use model::{FunctionType, Type, TypeTable, truncate};

use crate::names::type_name;

/// Spells C types as Rust types and produces their zero values.
///
/// Every type is canonicalized first, so typedef and enum names never reach
/// the output through here.
pub(crate) struct TypeRenderer<'a> {
    types: &'a TypeTable,
}

impl<'a> TypeRenderer<'a> {
    pub fn new(types: &'a TypeTable) -> Self {
        Self { types }
    }

    pub fn canonical(&self, ty: &Type) -> Type {
        self.types.canonical(ty)
    }

    /// The Rust spelling of a value of type `ty`.
    pub fn rust(&self, ty: &Type) -> String {
        match self.canonical(ty) {
            Type::Void | Type::Error => "()".to_string(),
            Type::Pointer(inner) => self.pointer(&inner),
            Type::Array(elem, n) => format!("[{}; {}]", self.rust(&elem), n.unwrap_or(0)),
            Type::Function(func) => self.fn_type(&func),
            Type::Record(_, tag) => type_name(&tag),
            scalar => scalar_name(&scalar).unwrap_or("()").to_string(),
        }
    }

    fn pointer(&self, pointee: &Type) -> String {
        match self.canonical(pointee) {
            Type::Void | Type::Error => "*mut ::core::ffi::c_void".to_string(),
            Type::Function(func) => format!("Option<{}>", self.fn_type(&func)),
            other => format!("*mut {}", self.rust(&other)),
        }
    }

    /// `unsafe extern "C" fn(..) -> R`, the type behind a function pointer.
    pub fn fn_type(&self, func: &FunctionType) -> String {
        let mut params: Vec<String> = func.params.iter().map(|p| self.rust(p)).collect();
        if func.variadic {
            params.push("...".to_string());
        }
        format!("unsafe extern \"C\" fn({}){}", params.join(", "), self.ret_suffix(&func.ret))
    }

    /// ` -> R`, or nothing for `void`.
    pub fn ret_suffix(&self, ret: &Type) -> String {
        match self.canonical(ret) {
            Type::Void | Type::Error => String::new(),
            other => format!(" -> {}", self.rust(&other)),
        }
    }

    /// The target of a pointer cast: `*mut T` for data pointers.
    pub fn pointee_rust(&self, pointer: &Type) -> String {
        match pointer.pointee() {
            Some(inner) => match self.canonical(inner) {
                Type::Void | Type::Error => "::core::ffi::c_void".to_string(),
                other => self.rust(&other),
            },
            None => "::core::ffi::c_void".to_string(),
        }
    }

    /// A constant expression holding the all-zero value of `ty`.
    pub fn zero(&self, ty: &Type) -> String {
        match self.canonical(ty) {
            Type::Float | Type::Double => "0.0".to_string(),
            Type::Pointer(inner) if self.canonical(&inner).is_function() => "None".to_string(),
            ty @ Type::Pointer(_) => format!("::core::ptr::null_mut::<{}>()", self.pointee_rust(&ty)),
            Type::Array(elem, n) => format!("[{}; {}]", self.zero(&elem), n.unwrap_or(0)),
            Type::Record(_, tag) => format!("unsafe {{ ::core::mem::zeroed::<{}>() }}", type_name(&tag)),
            Type::Void | Type::Error | Type::Function(_) => "()".to_string(),
            _ => "0".to_string(),
        }
    }

    pub fn table(&self) -> &'a TypeTable {
        self.types
    }
}

/// `i32`, `u8`, `f64`... for arithmetic types.
pub(crate) fn scalar_name(ty: &Type) -> Option<&'static str> {
    Some(match ty {
        Type::Char | Type::SChar => "i8",
        Type::UChar => "u8",
        Type::Short => "i16",
        Type::UShort => "u16",
        Type::Int | Type::Enum(_) => "i32",
        Type::UInt => "u32",
        Type::Long | Type::LongLong => "i64",
        Type::ULong | Type::ULongLong => "u64",
        Type::Float => "f32",
        Type::Double => "f64",
        _ => return None,
    })
}

/// An integer literal of type `ty` holding the C value `v`, suffixed so it
/// needs no inference: `5i32`, `(-1i64)`, `255u8`.
pub(crate) fn int_literal(v: i64, ty: &Type) -> String {
    let name = scalar_name(ty).unwrap_or("i32");
    let v = truncate(v, ty);
    if ty.is_signed() {
        if v < 0 { format!("({v}{name})") } else { format!("{v}{name}") }
    } else if ty.bit_width() == Some(64) {
        format!("{}{name}", v as u64)
    } else {
        format!("{v}{name}")
    }
}

/// A bare integer usable as a `match` pattern against a value of type `ty`.
pub(crate) fn int_pattern(v: i64, ty: &Type) -> String {
    let v = truncate(v, ty);
    if !ty.is_signed() && ty.bit_width() == Some(64) {
        (v as u64).to_string()
    } else {
        v.to_string()
    }
}

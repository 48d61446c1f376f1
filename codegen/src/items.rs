// Module-level emission: records, typedefs, enum constants, globals and
// the extern block, plus the Rust entry point wrapping a C `main`.

use std::collections::{HashMap, HashSet};

use model::{
    Declaration, ExternalDecl, FunctionDef, Initializer, RecordKind, StorageClass, StorageKind, SymbolId, Type,
};

use crate::Generator;
use crate::function::FunctionGenerator;
use crate::names::{escape, type_name};
use crate::writer::CodeWriter;

/// Lints the mechanical translation trips.
const ALLOWED_LINTS: &[&str] = &[
    "dead_code",
    "non_camel_case_types",
    "non_snake_case",
    "non_upper_case_globals",
    "static_mut_refs",
    "unsafe_op_in_unsafe_fn",
    "unused_assignments",
    "unused_braces",
    "unused_labels",
    "unused_mut",
    "unused_parens",
    "unused_unsafe",
    "unused_variables",
    "unreachable_code",
    "unconditional_panic",
    "arithmetic_overflow",
    "path_statements",
    "clippy::all",
];

impl Generator<'_> {
    fn file_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.unit.items.iter().filter_map(|item| match item {
            ExternalDecl::Declaration(decl) => Some(decl),
            ExternalDecl::Function(_) => None,
        })
    }

    pub(crate) fn gen_header(&self, out: &mut CodeWriter) {
        if self.options.emit_header_comment {
            out.line("// Generated by oxcc from C source. Do not edit.");
        }
        out.line(&format!("#![allow({})]", ALLOWED_LINTS.join(", ")));
        out.line("");
    }

    pub(crate) fn gen_records(&self, out: &mut CodeWriter) {
        for layout in self.resolution.types.records() {
            let name = type_name(&layout.tag);
            out.line("#[repr(C)]");
            out.line("#[derive(Clone, Copy)]");
            let Some(fields) = &layout.fields else {
                // Only ever used behind a pointer.
                out.line(&format!("pub struct {name} {{ _opaque: [u8; 0] }}"));
                out.line("");
                continue;
            };
            let keyword = match layout.kind {
                RecordKind::Struct => "struct",
                RecordKind::Union => "union",
            };
            out.open(&format!("pub {keyword} {name} {{"));
            for field in fields {
                out.line(&format!("pub {}: {},", escape(&field.name), self.types.rust(&field.ty)));
            }
            out.close("}");
            out.line("");
        }
    }

    /// `pub type` aliases for file-scope typedefs. Types are always written
    /// out in full, so these only document the C names.
    pub(crate) fn gen_typedefs(&self, out: &mut CodeWriter) {
        let tags: HashSet<String> = self.resolution.types.records().map(|layout| type_name(&layout.tag)).collect();
        let mut seen = HashSet::new();
        let mut any = false;
        for decl in self.file_declarations() {
            if decl.storage != StorageClass::Typedef {
                continue;
            }
            for declarator in &decl.declarators {
                let name = type_name(&declarator.name);
                let target = self.types.rust(&declarator.ty);
                if name == target || tags.contains(&name) || !seen.insert(name.clone()) {
                    continue;
                }
                out.line(&format!("pub type {name} = {target};"));
                any = true;
            }
        }
        if any {
            out.line("");
        }
    }

    pub(crate) fn gen_enum_constants(&self, out: &mut CodeWriter) {
        let mut any = false;
        for decl in self.file_declarations() {
            for variant in decl.enums.iter().flat_map(|def| def.variants.iter()) {
                let Some(id) = variant.symbol else {
                    continue;
                };
                if let StorageKind::EnumConstant(v) = self.resolution.symbol(id).storage {
                    out.line(&format!("pub const {}: i32 = {v};", self.names.get(id)));
                    any = true;
                }
            }
        }
        if any {
            out.line("");
        }
    }

    /// One `static mut` per defined file-scope object, whichever of its
    /// declarations carries the initializer.
    pub(crate) fn gen_globals(&self, out: &mut CodeWriter) {
        let mut order: Vec<SymbolId> = Vec::new();
        let mut seen = HashSet::new();
        let mut inits: HashMap<SymbolId, &Initializer> = HashMap::new();
        for decl in self.file_declarations() {
            if decl.storage == StorageClass::Typedef {
                continue;
            }
            for declarator in &decl.declarators {
                let Some(id) = declarator.symbol else {
                    continue;
                };
                if self.resolution.symbol(id).storage != StorageKind::Global {
                    continue;
                }
                if seen.insert(id) {
                    order.push(id);
                }
                if let Some(init) = &declarator.init {
                    inits.insert(id, init);
                }
            }
        }

        let mut generator = FunctionGenerator::new(&self.names, self.resolution);
        for id in order {
            let symbol = self.resolution.symbol(id);
            if !symbol.is_defined {
                continue;
            }
            let vis = if symbol.is_static { "" } else { "pub " };
            generator.static_item(vis, id, inits.get(&id).copied());
        }
        let text = generator.out.finish();
        if !text.is_empty() {
            out.raw(&text);
            out.line("");
        }
    }

    /// Objects and functions declared but never defined, deduplicated by
    /// name since block-scope declarations may each carry their own symbol.
    pub(crate) fn gen_externs(&self, out: &mut CodeWriter) {
        let defined: HashSet<&str> = self
            .resolution
            .symbols
            .iter()
            .filter(|(_, s)| matches!(s.storage, StorageKind::Global | StorageKind::Function) && s.is_defined)
            .map(|(_, s)| s.name.as_str())
            .collect();
        let mut seen = HashSet::new();
        let mut lines = Vec::new();
        for (id, symbol) in self.resolution.symbols.iter() {
            if symbol.is_defined || defined.contains(symbol.name.as_str()) {
                continue;
            }
            let line = match symbol.storage {
                StorageKind::Function => {
                    let Some(func) = self.types.canonical(&symbol.ty).as_function().cloned() else {
                        continue;
                    };
                    let mut params: Vec<String> = func.params.iter().map(|p| format!("_: {}", self.types.rust(p))).collect();
                    if func.variadic {
                        params.push("...".to_string());
                    }
                    format!(
                        "pub fn {}({}){};",
                        self.names.get(id),
                        params.join(", "),
                        self.types.ret_suffix(&func.ret)
                    )
                }
                StorageKind::Global => format!("pub static mut {}: {};", self.names.get(id), self.types.rust(&symbol.ty)),
                _ => continue,
            };
            if seen.insert(symbol.name.as_str()) {
                lines.push(line);
            }
        }
        if lines.is_empty() {
            return;
        }
        out.open("unsafe extern \"C\" {");
        for line in &lines {
            out.line(line);
        }
        out.close("}");
        out.line("");
    }

    pub(crate) fn gen_functions(&self, out: &mut CodeWriter) {
        for item in &self.unit.items {
            if let ExternalDecl::Function(func) = item {
                let generator = FunctionGenerator::new(&self.names, self.resolution);
                out.raw(&generator.gen_function(func));
                out.line("");
            }
        }
    }

    /// `fn main()` calling the translated `main_0`, passing `argc`/`argv`
    /// when it takes them and exiting with its status.
    pub(crate) fn gen_main_wrapper(&self, out: &mut CodeWriter) {
        let Some(main) = self.unit.items.iter().find_map(|item| match item {
            ExternalDecl::Function(func) if func.name == "main" => Some(func),
            _ => None,
        }) else {
            return;
        };
        let Some(id) = main.symbol else {
            return;
        };
        let name = self.names.get(id);
        let args = self.main_arguments(main);
        out.open("pub fn main() {");
        if !main.params.is_empty() {
            out.line(
                "let args: Vec<::std::ffi::CString> = ::std::env::args().filter_map(|arg| ::std::ffi::CString::new(arg).ok()).collect();",
            );
            out.line("let mut argv: Vec<*mut i8> = args.iter().map(|arg| arg.as_ptr() as *mut i8).collect();");
            out.line("argv.push(::core::ptr::null_mut());");
        }
        let call = format!("unsafe {{ {name}({}) }}", args.join(", "));
        match self.types.canonical(&main.ty.ret) {
            Type::Void => {
                out.line(&format!("{call};"));
                out.line("::std::process::exit(0);");
            }
            _ => {
                out.line(&format!("let status = {call};"));
                out.line("::std::process::exit(status as i32);");
            }
        }
        out.close("}");
    }

    fn main_arguments(&self, main: &FunctionDef) -> Vec<String> {
        let mut args = Vec::new();
        for (index, param) in main.params.iter().enumerate() {
            let ty = self.types.canonical(&param.ty);
            let rust = self.types.rust(&ty);
            args.push(match index {
                0 => format!("(argv.len() - 1) as {rust}"),
                1 => format!("argv.as_mut_ptr() as {rust}"),
                _ => self.types.zero(&ty),
            });
        }
        args
    }
}

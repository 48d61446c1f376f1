use model::{FunctionDef, Stmt, SymbolId, Type};
use semantic::Resolution;
use tracing::trace;

use crate::names::NameMap;
use crate::types::TypeRenderer;
use crate::writer::CodeWriter;

/// Where `break` and `continue` go from inside the current statement.
pub(crate) enum Target {
    Loop { brk: String, cont: String },
    Switch { brk: String },
}

/// Handles generation of code for a single function. Static initializers
/// are rendered with a throwaway instance as well.
pub(crate) struct FunctionGenerator<'a> {
    pub out: CodeWriter,

    // Context from the parent Generator
    pub(crate) names: &'a NameMap,
    pub(crate) resolution: &'a Resolution,
    pub(crate) types: TypeRenderer<'a>,

    // Per-function state
    pub(crate) targets: Vec<Target>,
    next_label: u32,
    next_temp: u32,
}

impl<'a> FunctionGenerator<'a> {
    pub fn new(names: &'a NameMap, resolution: &'a Resolution) -> Self {
        Self {
            out: CodeWriter::new(),
            names,
            resolution,
            types: TypeRenderer::new(&resolution.types),
            targets: Vec::new(),
            next_label: 0,
            next_temp: 0,
        }
    }

    pub fn gen_function(mut self, func: &FunctionDef) -> String {
        let Some(id) = func.symbol else {
            return String::new();
        };
        let symbol = self.resolution.symbol(id);
        let name = self.names.get(id).to_string();
        let vis = if symbol.is_static { "" } else { "pub " };

        let mut params = Vec::new();
        for param in &func.params {
            let Some(pid) = param.symbol else {
                continue;
            };
            let ty = self.types.rust(&self.resolution.symbol(pid).ty);
            params.push(format!("mut {}: {ty}", self.names.get(pid)));
        }
        let ret = self.types.canonical(&func.ty.ret);
        let ret_suffix = self.types.ret_suffix(&ret);
        self.out.open(&format!(
            "{vis}unsafe extern \"C\" fn {name}({}){ret_suffix} {{",
            params.join(", ")
        ));
        self.block_items(&func.body.items);
        // Falling off the end of a non-void function returns zero.
        if !ret.is_void() && !matches!(func.body.items.last(), Some(Stmt::Return(..))) {
            let zero = self.types.zero(&ret);
            self.out.line(&format!("return {zero};"));
        }
        self.out.close("}");

        trace!(function = %func.name, labels = self.next_label, "generated function");
        self.out.finish()
    }

    pub(crate) fn name(&self, id: SymbolId) -> String {
        self.names.get(id).to_string()
    }

    pub(crate) fn symbol_type(&self, id: SymbolId) -> Type {
        self.types.canonical(&self.resolution.symbol(id).ty)
    }

    pub(crate) fn next_label(&mut self) -> u32 {
        self.next_label += 1;
        self.next_label
    }

    /// A fresh temporary name, `__{prefix}{n}`.
    pub(crate) fn temp(&mut self, prefix: &str) -> String {
        self.next_temp += 1;
        format!("__{prefix}{}", self.next_temp)
    }
}

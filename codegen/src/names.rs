use std::collections::{HashMap, HashSet};

use model::{Declaration, ExternalDecl, StorageKind, Stmt, SymbolId, TranslationUnit};
use semantic::Resolution;

/// Identifiers Rust reserves that C programs may use freely.
const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "dyn", "false", "final", "fn", "gen", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "trait", "true", "try", "type",
    "typeof", "unsized", "use", "virtual", "where", "yield",
];

/// Names that cannot be raw identifiers, and prelude names the output relies on.
const RESERVED: &[&str] = &["self", "Self", "super", "crate", "Some", "None", "Ok", "Err", "Option"];

/// Primitive type names, which a record or typedef must not shadow.
const PRIMITIVES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize", "f32", "f64", "bool",
    "char", "str",
];

/// Spells a C identifier as a valid Rust identifier.
pub(crate) fn escape(name: &str) -> String {
    if name == "_" {
        "__".to_string()
    } else if RESERVED.contains(&name) {
        format!("{name}_")
    } else if RUST_KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// Spells a record tag or typedef name as a Rust type name.
pub(crate) fn type_name(name: &str) -> String {
    if PRIMITIVES.contains(&name) {
        format!("{name}_")
    } else {
        escape(name)
    }
}

/// The Rust name of every symbol in a translation unit.
///
/// Locals and parameters get a `_<id>` suffix when a `let` would otherwise
/// shadow a static or constant (which Rust rejects) or when the variable is
/// hoisted out of a `switch` body.
pub(crate) struct NameMap {
    names: HashMap<SymbolId, String>,
}

impl NameMap {
    pub fn new(unit: &TranslationUnit, resolution: &Resolution) -> Self {
        let mut item_names = HashSet::new();
        for (_, symbol) in resolution.symbols.iter() {
            if matches!(symbol.storage, StorageKind::Global | StorageKind::EnumConstant(_)) {
                item_names.insert(symbol.name.as_str());
            }
        }
        let mut hoisted = HashSet::new();
        for item in &unit.items {
            if let ExternalDecl::Function(func) = item {
                for stmt in &func.body.items {
                    collect_switch_locals(stmt, &mut hoisted);
                }
            }
        }

        let mut names = HashMap::new();
        for (id, symbol) in resolution.symbols.iter() {
            let name = match symbol.storage {
                StorageKind::Function if symbol.name == "main" && symbol.is_defined => "main_0".to_string(),
                StorageKind::Local | StorageKind::Parameter
                    if hoisted.contains(&id) || item_names.contains(symbol.name.as_str()) =>
                {
                    format!("{}_{}", symbol.name, id.0)
                }
                _ => escape(&symbol.name),
            };
            names.insert(id, name);
        }
        Self { names }
    }

    pub fn get(&self, id: SymbolId) -> &str {
        self.names.get(&id).map_or("__unresolved", String::as_str)
    }
}

fn collect_declaration(decl: &Declaration, out: &mut HashSet<SymbolId>) {
    out.extend(decl.declarators.iter().filter_map(|d| d.symbol));
}

/// Symbols declared directly in a switch body, at any nesting depth of switches.
fn collect_switch_locals(stmt: &Stmt, out: &mut HashSet<SymbolId>) {
    match stmt {
        Stmt::Switch { body, .. } => {
            match body.as_ref() {
                Stmt::Block(block) => {
                    for item in &block.items {
                        if let Stmt::Declaration(decl) = item {
                            collect_declaration(decl, out);
                        }
                        collect_switch_locals(item, out);
                    }
                }
                other => collect_switch_locals(other, out),
            }
        }
        Stmt::Block(block) => {
            for item in &block.items {
                collect_switch_locals(item, out);
            }
        }
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_switch_locals(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_switch_locals(else_branch, out);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => collect_switch_locals(body, out),
        Stmt::For { body, .. } => collect_switch_locals(body, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_rust_keywords() {
        assert_eq!(escape("match"), "r#match");
        assert_eq!(escape("type"), "r#type");
        assert_eq!(escape("self"), "self_");
        assert_eq!(escape("None"), "None_");
        assert_eq!(escape("_"), "__");
        assert_eq!(escape("count"), "count");
    }

    #[test]
    fn type_names_do_not_shadow_primitives() {
        assert_eq!(type_name("u8"), "u8_");
        assert_eq!(type_name("Option"), "Option_");
        assert_eq!(type_name("point"), "point");
    }
}

use std::collections::HashMap;
use std::sync::LazyLock;

use model::TokenKind;

/// The fixed keyword set, consulted after an identifier has been scanned.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    map: HashMap<&'static str, TokenKind>,
}

impl KeywordTable {
    pub fn standard() -> Self {
        use TokenKind::*;
        let keywords = [
            Auto, Break, Case, Char, Const, Continue, Default, Do, Double, Else, Enum, Extern, Float, For, Goto,
            If, Inline, Int, Long, Register, Restrict, Return, Short, Signed, SizeOf, Static, Struct, Switch,
            Typedef, Union, Unsigned, Void, Volatile, While,
        ];
        let mut map = HashMap::with_capacity(keywords.len() + 4);
        for kind in keywords {
            if let Some(spelling) = kind.spelling() {
                map.insert(spelling, kind);
            }
        }
        // Common compiler spellings of the qualifiers.
        map.insert("__inline", Inline);
        map.insert("__inline__", Inline);
        map.insert("__restrict", Restrict);
        map.insert("__restrict__", Restrict);
        map.insert("__const", Const);
        map.insert("__volatile__", Volatile);
        map.insert("__signed__", Signed);
        Self { map }
    }

    pub fn get(&self, text: &str) -> Option<&TokenKind> {
        self.map.get(text)
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        self.map.contains_key(text)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::standard()
    }
}

pub static KEYWORDS: LazyLock<KeywordTable> = LazyLock::new(KeywordTable::standard);

pub fn keyword_or_identifier(text: &str, table: &KeywordTable) -> TokenKind {
    match table.get(text) {
        Some(kind) => kind.clone(),
        None => TokenKind::Identifier(text.to_string()),
    }
}

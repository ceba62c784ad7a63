//! Table router
//!
//! The table a parsed instruction names is canonicalized by `resolve`.
//! `route` only attributes instructions that fail to parse, by looking for
//! entity type names as whole words in their text, so the warning for a
//! rejected instruction can name its table.

use crate::catalog::Catalog;

/// Resolves instruction strings to entity type names
#[derive(Debug, Clone)]
pub struct Router {
    /// Known names, longest first so `admin_tasks` wins over `tasks`
    names: Vec<String>,
}

impl Router {
    pub fn new(catalog: &Catalog) -> Self {
        let mut names: Vec<String> = catalog.names().into_iter().map(str::to_string).collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { names }
    }

    /// Entity type named in an unparseable instruction, if any
    pub fn route(&self, instruction: &str) -> Option<&str> {
        let haystack = instruction.to_ascii_lowercase();
        self.names
            .iter()
            .find(|name| contains_word(&haystack, &name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// Canonical name for a table name as written, ignoring ASCII case
    pub fn resolve(&self, table: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|name| name.eq_ignore_ascii_case(table))
            .map(String::as_str)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Whether `word` occurs in `text` bounded by non-word characters
fn contains_word(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let bytes = text.as_bytes();

    text.match_indices(word).any(|(start, _)| {
        let end = start + word.len();
        let before_ok = start == 0 || !is_word_byte(bytes[start - 1]);
        let after_ok = end == bytes.len() || !is_word_byte(bytes[end]);
        before_ok && after_ok
    })
}

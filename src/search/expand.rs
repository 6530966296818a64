use std::collections::BTreeSet;

use super::synonyms::SynonymLookup;

/// Turns free text into an FTS5 `OR` query over each word's synonym group.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    lookup: SynonymLookup,
}

impl QueryExpander {
    pub fn new(lookup: SynonymLookup) -> Self {
        Self { lookup }
    }

    /// `"find file"` becomes `document OR file OR find OR grep OR search`
    /// given groups {find, search, grep} and {file, document}. Terms are
    /// deduplicated and sorted so equal input gives an equal query.
    pub fn expand(&self, query: &str, apply_prefix: bool) -> String {
        let lowered = query.to_lowercase();
        let mut terms = BTreeSet::new();
        for token in lowered.split_whitespace() {
            match self.lookup.group(token) {
                Some(group) => {
                    for phrase in group {
                        terms.insert(fts_term(phrase, apply_prefix));
                    }
                }
                None => {
                    terms.insert(fts_term(token, apply_prefix));
                }
            }
        }
        terms.into_iter().collect::<Vec<_>>().join(" OR ")
    }
}

/// FTS5 bareword characters; anything else has to be quoted.
fn is_bareword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '\u{1a}' || !c.is_ascii()
}

pub(crate) fn needs_quotes(term: &str) -> bool {
    !term.chars().all(is_bareword_char)
}

pub(crate) fn quote(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "\"\""))
}

/// Phrases are quoted; the wildcard goes inside the closing quote.
fn fts_term(term: &str, apply_prefix: bool) -> String {
    let star = if apply_prefix { "*" } else { "" };
    if needs_quotes(term) {
        format!("\"{}{star}\"", term.replace('"', "\"\""))
    } else {
        format!("{term}{star}")
    }
}

pub mod expand;
pub mod synonyms;

pub use expand::QueryExpander;
pub use synonyms::SynonymLookup;

use crate::db::Db;
use crate::selection::{decode_live_field, encode_live_field};
use crate::types::CommandRecord;

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Rewrite the query through the synonym table; otherwise it is passed
    /// to FTS5 as typed.
    pub expand: bool,
    pub prefix: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            expand: true,
            prefix: false,
        }
    }
}

pub struct SearchEngine<'a> {
    db: &'a Db,
    expander: &'a QueryExpander,
    live_fetch_size: usize,
}

impl<'a> SearchEngine<'a> {
    pub fn new(db: &'a Db, expander: &'a QueryExpander, live_fetch_size: usize) -> Self {
        Self {
            db,
            expander,
            live_fetch_size,
        }
    }

    /// Ranked records, best first. Index hits whose record has gone are
    /// skipped.
    pub fn search(&self, query: &str, top_k: usize, options: SearchOptions) -> Vec<CommandRecord> {
        let fts_query = if options.expand {
            self.expander.expand(query, options.prefix)
        } else {
            query.trim().to_string()
        };
        tracing::debug!("fts query: {fts_query}");
        self.resolve(&fts_query, top_k)
    }

    /// One protocol line per match for the chooser's reload binding.
    pub fn live_search(&self, partial: &str) -> Vec<String> {
        let query = live_query(partial);
        self.resolve(&query, self.live_fetch_size)
            .iter()
            .map(crate::selection::encode_live_line)
            .collect()
    }

    /// The record behind a live-filter pick, given the first field exactly as
    /// the chooser printed it. The unescaped text is tried first; when it
    /// names nothing, the stored command whose escaped form is that field is
    /// used, which covers commands that contain a literal `\\n`.
    pub fn resolve_live_pick(&self, field: &str) -> Option<CommandRecord> {
        if let Some(record) = self.db.get_by_raw_command(&decode_live_field(field)) {
            return Some(record);
        }
        let raw = self
            .db
            .list_all_raw_commands()
            .into_iter()
            .find(|raw| encode_live_field(raw) == field)?;
        self.db.get_by_raw_command(&raw)
    }

    fn resolve(&self, fts_query: &str, limit: usize) -> Vec<CommandRecord> {
        let hits = self.db.search_fulltext(fts_query, limit);
        let total = hits.len();
        let records: Vec<CommandRecord> = hits
            .into_iter()
            .filter_map(|(id, _rank)| self.db.get_by_id(&id))
            .collect();
        if records.len() < total {
            tracing::warn!(
                "{} index hits had no matching record",
                total - records.len()
            );
        }
        records
    }
}

const FTS_OPERATORS: &[&str] = &["AND", "OR", "NOT", "NEAR"];

/// What the user has typed so far, with the last word matched as a prefix.
/// `git sta` becomes `git sta*`. Operator words are quoted so a half-typed
/// `docker AND` stays a plain search.
pub fn live_query(partial: &str) -> String {
    let mut terms: Vec<String> = partial
        .split_whitespace()
        .map(|token| {
            if expand::needs_quotes(token) || FTS_OPERATORS.contains(&token) {
                expand::quote(token)
            } else {
                token.to_string()
            }
        })
        .collect();
    if let Some(last) = terms.last_mut() {
        last.push('*');
    }
    terms.join(" ")
}

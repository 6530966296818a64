use std::collections::{HashMap, HashSet};

use crate::config::HistoryConfig;
use crate::types::HistoryEntry;

/// Collapse repeated command texts, newest first.
///
/// The file is scanned from its last line backwards. For each distinct
/// (trimmed) command the entry with the greatest known timestamp wins; an
/// entry with a timestamp beats one without, and when neither has one the
/// first seen (most recent in the file) is kept. Output order is the order
/// in which each command was first met during the backwards scan.
pub fn dedupe(entries: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut out: Vec<HistoryEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries.iter().rev() {
        let command = entry.command.trim();
        if command.is_empty() {
            continue;
        }
        match index.get(command) {
            None => {
                index.insert(command.to_string(), out.len());
                out.push(HistoryEntry::new(command, entry.timestamp));
            }
            Some(&slot) => {
                let kept = &mut out[slot];
                if let Some(ts) = entry.timestamp {
                    if kept.timestamp.map_or(true, |existing| ts > existing) {
                        kept.timestamp = Some(ts);
                    }
                }
            }
        }
    }

    out
}

/// Which exclusion rule to apply; full imports and syncs filter differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPolicy {
    /// Full initialisation: exclude by base command, drop anything mentioning `help`.
    Init,
    /// Incremental sync: exclude when the whole text or its first space-separated word is listed.
    Sync,
}

#[derive(Debug, Clone)]
pub struct CommandFilter {
    min_length: usize,
    exclusions: HashSet<String>,
}

impl CommandFilter {
    pub fn new<I, S>(min_length: usize, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            min_length,
            exclusions: exclusions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.min_command_length, config.exclusions.iter().cloned())
    }

    pub fn keep(&self, command: &str, policy: FilterPolicy) -> bool {
        let command = command.trim();
        if command.is_empty() || command.chars().count() < self.min_length {
            return false;
        }
        match policy {
            FilterPolicy::Init => {
                let excluded = base_command(command)
                    .is_some_and(|base| self.exclusions.contains(&base));
                !excluded && !command.contains("help")
            }
            FilterPolicy::Sync => {
                let first_word = command.split(' ').next().unwrap_or_default();
                !self.exclusions.contains(command) && !self.exclusions.contains(first_word)
            }
        }
    }

    pub fn apply(&self, entries: Vec<HistoryEntry>, policy: FilterPolicy) -> Vec<HistoryEntry> {
        let before = entries.len();
        let kept: Vec<HistoryEntry> = entries
            .into_iter()
            .filter(|e| self.keep(&e.command, policy))
            .collect();
        tracing::debug!("{policy:?} filter kept {} of {before} commands", kept.len());
        kept
    }
}

/// First meaningful token of a command line: skips `sudo`, `KEY=VALUE`
/// assignments and flags. `sudo -E docker ps` gives `docker`.
pub fn base_command(raw: &str) -> Option<String> {
    let parts = match shell_words::split(raw) {
        Ok(parts) => parts,
        Err(_) => {
            return raw
                .trim()
                .split(' ')
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }
    };
    let first = parts.first()?;

    for (i, part) in parts.iter().enumerate() {
        if part.contains('=') {
            continue;
        }
        if i > 0 && part.starts_with('-') {
            continue;
        }
        if part == "sudo" {
            continue;
        }
        return Some(part.clone());
    }

    Some(first.clone())
}

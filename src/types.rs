use serde::{Deserialize, Serialize};

/// Sentinel stored in a context field when the tool had nothing to say.
pub const NOT_AVAILABLE: &str = "N/A";

// ── History ──

/// One command line as read from a shell history file, before dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub command: String,
    pub timestamp: Option<i64>,
}

impl HistoryEntry {
    pub fn new(command: impl Into<String>, timestamp: Option<i64>) -> Self {
        Self {
            command: command.into(),
            timestamp,
        }
    }
}

// ── Corpus ──

/// `which` / `--help` / `man` excerpts captured when a command was ingested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    pub which_info: Option<String>,
    pub help_info: Option<String>,
    pub man_info: Option<String>,
}

impl CommandContext {
    pub fn not_available() -> Self {
        Self {
            which_info: Some(NOT_AVAILABLE.into()),
            help_info: Some(NOT_AVAILABLE.into()),
            man_info: Some(NOT_AVAILABLE.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: String,
    pub raw_command: String,
    pub processed_command: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub source: String,
    pub history_timestamp: Option<i64>,
    pub added_timestamp: i64,
    #[serde(default)]
    pub context: CommandContext,
}

impl CommandRecord {
    /// Fresh record with a new id, stamped with the current time.
    pub fn new(raw_command: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            raw_command: raw_command.into(),
            processed_command: None,
            description: None,
            tags: Vec::new(),
            source: source.into(),
            history_timestamp: None,
            added_timestamp: chrono::Utc::now().timestamp(),
            context: CommandContext::default(),
        }
    }

    /// Text fed to the full-text index: description, processed command,
    /// raw command, then tags, skipping empty parts.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3 + self.tags.len());
        if let Some(desc) = self.description.as_deref() {
            parts.push(desc);
        }
        if let Some(processed) = self.processed_command.as_deref() {
            parts.push(processed);
        }
        parts.push(&self.raw_command);
        parts.extend(self.tags.iter().map(String::as_str));
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn processed_or_raw(&self) -> &str {
        self.processed_command
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.raw_command)
    }
}

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::HistoryEntry;

/// History file dialects, one parser each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// `: <epoch>:<duration>;<command>` (EXTENDED_HISTORY), plain lines otherwise.
    Zsh,
    /// `#<epoch>` comment lines preceding the command (HISTTIMEFORMAT).
    Bash,
    /// YAML-ish `- cmd:` / `when:` blocks.
    Fish,
}

impl Shell {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shell::Zsh => "zsh",
            Shell::Bash => "bash",
            Shell::Fish => "fish",
        }
    }

    /// Where the shell writes its history when nothing overrides it.
    pub fn default_history_file(&self) -> PathBuf {
        let home = dirs::home_dir().unwrap_or_default();
        match self {
            Shell::Bash => home.join(".bash_history"),
            Shell::Zsh => std::env::var("HISTFILE")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(".zsh_history")),
            Shell::Fish => std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| home.join(".local/share"))
                .join("fish")
                .join("fish_history"),
        }
    }

    /// Guess the dialect from the first non-blank line; bash is the fallback.
    pub fn detect(path: &Path) -> Shell {
        if let Ok(bytes) = std::fs::read(path) {
            let content = String::from_utf8_lossy(&bytes);
            if let Some(line) = content.lines().find(|l| !l.trim().is_empty()) {
                if line.starts_with("- cmd:") {
                    return Shell::Fish;
                }
                if zsh_extended_re().is_match(line.trim()) {
                    return Shell::Zsh;
                }
            }
        }
        Shell::Bash
    }

    fn parse_lines(&self, lines: &[&str]) -> Vec<HistoryEntry> {
        match self {
            Shell::Zsh => parse_zsh(lines),
            Shell::Bash => parse_bash(lines),
            Shell::Fish => parse_fish(lines),
        }
    }
}

impl FromStr for Shell {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zsh" => Ok(Shell::Zsh),
            "bash" => Ok(Shell::Bash),
            "fish" => Ok(Shell::Fish),
            other => anyhow::bail!("unsupported shell type '{other}' (expected bash, zsh or fish)"),
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn zsh_extended_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^:\s*(\d+):(\d+);(.*)$").expect("static regex"))
}

/// Read `path` as `shell` history, oldest first.
///
/// `limit` keeps only the last N raw lines of the file before parsing, so a
/// limited load can return fewer than N commands. A missing or unreadable
/// file yields an empty list.
pub fn load_history(shell: Shell, path: &Path, limit: Option<usize>) -> Vec<HistoryEntry> {
    if !path.exists() {
        tracing::warn!("{shell} history file not found: {}", path.display());
        return Vec::new();
    }
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!("failed to read {shell} history {}: {e}", path.display());
            return Vec::new();
        }
    };
    let content = String::from_utf8_lossy(&bytes);
    let mut lines: Vec<&str> = content.lines().collect();
    if let Some(n) = limit.filter(|n| *n > 0) {
        let skip = lines.len().saturating_sub(n);
        lines.drain(..skip);
    }

    let parsed = shell.parse_lines(&lines);
    let total = parsed.len();
    let entries: Vec<HistoryEntry> = parsed
        .into_iter()
        .filter(|e| !e.command.trim().is_empty())
        .collect();
    if entries.len() != total {
        tracing::debug!("dropped {} empty commands", total - entries.len());
    }
    tracing::info!(
        "loaded {} commands from {} ({shell}, last {} lines)",
        entries.len(),
        path.display(),
        limit.map_or_else(|| "all".to_string(), |n| n.to_string())
    );
    entries
}

fn parse_zsh(lines: &[&str]) -> Vec<HistoryEntry> {
    let re = zsh_extended_re();
    let mut results = Vec::new();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match re.captures(line) {
            Some(caps) => {
                let timestamp = caps[1].parse::<i64>().ok();
                if timestamp.is_none() {
                    tracing::debug!("unparseable zsh timestamp in {line:?}");
                }
                results.push(HistoryEntry::new(&caps[3], timestamp));
            }
            None => results.push(HistoryEntry::new(line, None)),
        }
    }

    results
}

fn parse_bash(lines: &[&str]) -> Vec<HistoryEntry> {
    let mut results = Vec::new();
    let mut pending_timestamp: Option<i64> = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('#') {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                pending_timestamp = rest.parse::<i64>().ok();
                continue;
            }
        }

        results.push(HistoryEntry::new(line, pending_timestamp.take()));
    }

    results
}

struct FishBlock {
    command: String,
    multiline: bool,
    base_indent: Option<usize>,
}

impl FishBlock {
    fn finish(self, timestamp: Option<i64>) -> HistoryEntry {
        HistoryEntry::new(self.command.trim(), timestamp)
    }
}

fn parse_fish(lines: &[&str]) -> Vec<HistoryEntry> {
    let mut results = Vec::new();
    let mut current: Option<FishBlock> = None;

    for raw in lines {
        let line = raw.trim();
        // Spaces only; slicing at this count must stay on a char boundary.
        let indent = raw.bytes().take_while(|b| *b == b' ').count();

        if let Some(value) = line.strip_prefix("- cmd:") {
            if let Some(prev) = current.take() {
                results.push(prev.finish(None));
            }
            let value = value.trim();
            current = Some(if value == "|" {
                FishBlock {
                    command: String::new(),
                    multiline: true,
                    base_indent: None,
                }
            } else {
                FishBlock {
                    command: value.to_string(),
                    multiline: false,
                    base_indent: None,
                }
            });
        } else if let Some(value) = line.strip_prefix("when:") {
            if let Some(block) = current.take() {
                let timestamp = value.trim().parse::<i64>().ok();
                if timestamp.is_none() {
                    tracing::debug!("unparseable fish timestamp in {line:?}");
                }
                results.push(block.finish(timestamp));
            }
        } else if let Some(block) = current.as_mut().filter(|b| b.multiline) {
            if indent >= 2 {
                let base = *block.base_indent.get_or_insert(indent);
                let strip = base.min(indent);
                if !block.command.is_empty() {
                    block.command.push('\n');
                }
                block.command.push_str(raw[strip..].trim_end());
            } else {
                block.multiline = false;
            }
        }
    }

    if let Some(block) = current {
        results.push(block.finish(None));
    }

    results
}

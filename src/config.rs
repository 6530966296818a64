use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const APP_NAME: &str = "clihunter";
pub const DEFAULT_DB_FILENAME: &str = "commands.db";

pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "ls", "cd", "pwd", "clear", "exit", "history", "man", "top", "htop", "vim", "vi", "nano",
    "code", "source", "echo", "clihunter", "which", "export",
];

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub db: DbConfig,
    pub history: HistoryConfig,
    pub search: SearchConfig,
    pub context: ContextConfig,
    pub chooser: ChooserConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Overrides `<data_dir>/clihunter/commands.db`.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub min_command_length: usize,
    pub exclusions: Vec<String>,
    /// Raw history lines inspected by `sync`.
    pub sync_recent: usize,
    /// Per-shell history file overrides, keyed by `bash` / `zsh` / `fish`.
    pub files: HashMap<String, PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            min_command_length: 5,
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            sync_recent: 200,
            files: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    /// Candidates fetched per keystroke in live-filter mode.
    pub live_fetch_size: usize,
    pub expand_synonyms: bool,
    pub prefix_match: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            live_fetch_size: 20,
            expand_synonyms: true,
            prefix_match: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_lines: usize,
    pub max_chars: usize,
    pub which_timeout_ms: u64,
    pub help_timeout_ms: u64,
    pub man_timeout_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_lines: 30,
            max_chars: 1500,
            which_timeout_ms: 1000,
            help_timeout_ms: 3000,
            man_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChooserConfig {
    pub executable: String,
    pub options: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ChooserConfig {
    fn default() -> Self {
        Self {
            executable: "fzf".into(),
            options: [
                "--height",
                "40%",
                "--layout=reverse",
                "--border",
                "--preview-window",
                "right:60%:wrap",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeout_secs: 600,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::path();
        let mut config: Config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Config::default()
        };

        if let Ok(exe) = std::env::var("CLIHUNTER_FZF_EXECUTABLE") {
            if !exe.trim().is_empty() {
                config.chooser.executable = exe;
            }
        }
        Ok(config)
    }

    pub fn path() -> PathBuf {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join("config.toml")
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
    }

    pub fn db_path(&self) -> PathBuf {
        self.db
            .path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join(DEFAULT_DB_FILENAME))
    }

    pub fn history_file(&self, shell: crate::history_import::Shell) -> PathBuf {
        self.history
            .files
            .get(shell.as_str())
            .cloned()
            .unwrap_or_else(|| shell.default_history_file())
    }
}

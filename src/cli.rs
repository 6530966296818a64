use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "clihunter",
    version = env!("CLIHUNTER_BUILD_VERSION"),
    about = "Find commands from your shell history by describing what they do"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the command database if it does not exist
    InitDb,

    /// Import commands from a shell history file
    InitHistory {
        /// Shell type: zsh, bash or fish (default: from $SHELL)
        #[arg(long)]
        shell: Option<String>,
        /// Only read the last N history lines
        #[arg(long)]
        limit: Option<usize>,
        /// Re-describe commands that are already stored
        #[arg(long, default_value_t = false)]
        force_reparse: bool,
        /// History file to read instead of the shell's default
        #[arg(long)]
        history_file: Option<PathBuf>,
        /// Skip which/--help/man lookups
        #[arg(long, default_value_t = false)]
        no_context: bool,
    },

    /// Add new commands from the end of the history file
    Sync {
        #[arg(long)]
        shell: Option<String>,
        /// Number of recent history lines to check
        #[arg(long)]
        recent_n: Option<usize>,
        #[arg(long)]
        history_file: Option<PathBuf>,
    },

    /// Search stored commands
    Search {
        /// What the command does, in your own words
        query: Option<String>,
        /// Return at most K results
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,
        /// Pass the query to the full-text index without synonym expansion
        #[arg(long, default_value_t = false)]
        no_expand: bool,
        /// Match the query words as prefixes
        #[arg(long, default_value_t = false)]
        prefix: bool,
        /// Print only the selected raw command to stdout
        #[arg(long, default_value_t = false)]
        raw_output: bool,
        /// Print live-filter lines for the chooser's reload binding
        #[arg(long, hide = true)]
        live_search_query: Option<String>,
        /// Open a chooser that re-searches as you type
        #[arg(long, default_value_t = false)]
        live: bool,
        /// Print results instead of opening the chooser
        #[arg(long, default_value_t = false)]
        no_chooser: bool,
    },

    /// Save a command by hand
    Add {
        #[arg(short, long)]
        command: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
        #[arg(long, default_value_t = false)]
        no_context: bool,
    },

    /// List stored commands, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show every field of one stored command
    Show {
        id: String,
        /// Output as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Delete a stored command by id
    Delete { id: String },

    /// Delete every stored command
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },

    /// Print the config file path
    ConfigPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::try_parse_from(["clihunter", "search", "find big files", "-k", "5", "--raw-output"])
            .unwrap();
        match cli.command {
            Commands::Search {
                query,
                top_k,
                raw_output,
                no_expand,
                ..
            } => {
                assert_eq!(query.as_deref(), Some("find big files"));
                assert_eq!(top_k, Some(5));
                assert!(raw_output);
                assert!(!no_expand);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_parse_live_search_query_allows_empty() {
        let cli =
            Cli::try_parse_from(["clihunter", "search", "--live-search-query", ""]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Search { live_search_query: Some(ref q), .. } if q.is_empty()
        ));
    }

    #[test]
    fn test_parse_init_history() {
        let cli = Cli::try_parse_from([
            "clihunter",
            "init-history",
            "--shell",
            "fish",
            "--limit",
            "100",
            "--force-reparse",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::InitHistory { ref shell, limit: Some(100), force_reparse: true, .. }
                if shell.as_deref() == Some("fish")
        ));
    }

    #[test]
    fn test_add_requires_command() {
        assert!(Cli::try_parse_from(["clihunter", "add"]).is_err());
        let cli = Cli::try_parse_from(["clihunter", "add", "-c", "ls -la", "-t", "a,b"]).unwrap();
        assert!(matches!(cli.command, Commands::Add { ref tags, .. } if tags.as_deref() == Some("a,b")));
    }
}

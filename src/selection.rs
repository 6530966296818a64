use std::time::Duration;

use crate::config::ChooserConfig;
use crate::runner::{CommandRunner, RunError, RunRequest};
use crate::types::CommandRecord;

/// Separates fields of a live-filter line. Never typed inside a command.
pub const FIELD_SEPARATOR: char = '\u{1f}';
/// Separates fields of a ranked-result display line.
pub const DISPLAY_DELIMITER: &str = " ::: ";

const CANCEL_KEYS: &[&str] = &["ctrl-c", "ctrl-x"];
const EXIT_SELECTED: i32 = 0;
const EXIT_NO_MATCH: i32 = 1;
const EXIT_EXPECT_CANCEL: i32 = 3;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChooserOutcome {
    /// Record id for ranked results, raw command text for live filtering.
    Selected(String),
    NoSelection,
    Cancelled,
    Failed(String),
}

/// How the chooser's lines are laid out, and so how to read a pick back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChooserMode {
    Ranked,
    Live,
}

// ── Formatting ──

fn one_line(s: &str) -> String {
    s.replace('\n', "\\n")
}

/// `id ::: description ::: `raw` (Processed: `processed`) ::: [tags]`
pub fn display_line(record: &CommandRecord) -> String {
    let description = record
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No description");
    let tags = if record.tags.is_empty() {
        "No tags".to_string()
    } else {
        record.tags.join(", ")
    };
    one_line(&format!(
        "{id}{d}{description}{d}`{raw}` (Processed: `{processed}`){d}[{tags}]",
        id = record.id,
        d = DISPLAY_DELIMITER,
        raw = record.raw_command,
        processed = record.processed_or_raw(),
    ))
}

/// `raw<US>description<US>processed_or_raw<US>[tag1, tag2]`, with backticks
/// and newlines escaped so the chooser's shell sees one literal line.
pub fn encode_live_line(record: &CommandRecord) -> String {
    let sep = FIELD_SEPARATOR;
    let line = format!(
        "{raw}{sep}{description}{sep}{processed}{sep}[{tags}]",
        raw = record.raw_command,
        description = record.description.as_deref().unwrap_or(""),
        processed = record.processed_or_raw(),
        tags = record.tags.join(", "),
    );
    encode_live_field(&line)
}

/// Backticks and newlines escaped. Backslashes already in the text are left
/// alone, so a field that holds `\n` may decode to something else; see
/// [`crate::search::SearchEngine::resolve_live_pick`].
pub fn encode_live_field(text: &str) -> String {
    text.replace('`', "\\`").replace('\n', "\\n")
}

/// Undo [`encode_live_line`]'s escaping for a single field.
pub fn decode_live_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('n') => {
                    chars.next();
                    out.push('\n');
                    continue;
                }
                Some('`') => {
                    chars.next();
                    out.push('`');
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

// ── Chooser invocation ──

pub fn chooser_args(config: &ChooserConfig, expect_extra_cancel: bool) -> Vec<String> {
    let mut args = config.options.clone();
    args.push("--print-query".into());
    if expect_extra_cancel {
        args.push(format!("--expect={}", CANCEL_KEYS.join(",")));
    }
    args.extend(
        [
            "--header",
            "Enter to select, Ctrl-C/Ctrl-X to cancel",
            "--prompt",
            "Select command > ",
            "--delimiter",
            DISPLAY_DELIMITER,
            "--with-nth",
            "2..",
        ]
        .map(String::from),
    );
    args
}

/// Arguments for a chooser that re-runs `<exe> search --live-search-query`
/// on every keystroke instead of filtering by itself.
pub fn live_chooser_args(config: &ChooserConfig, exe: &str, initial_query: &str) -> Vec<String> {
    let reload = format!(
        "reload:{} search --live-search-query {{q}} || true",
        shell_words::quote(exe)
    );
    let mut args = config.options.clone();
    args.extend([
        "--disabled".to_string(),
        "--print-query".to_string(),
        format!("--expect={}", CANCEL_KEYS.join(",")),
        "--query".to_string(),
        initial_query.to_string(),
        "--prompt".to_string(),
        "Search > ".to_string(),
        "--delimiter".to_string(),
        FIELD_SEPARATOR.to_string(),
        "--with-nth".to_string(),
        "2..".to_string(),
        "--bind".to_string(),
        format!("start:{reload}"),
        "--bind".to_string(),
        format!("change:{reload}"),
    ]);
    args
}

/// Map the chooser's exit code and output to an outcome. Output is the
/// `--print-query` line, then the pressed key when `--expect` was given,
/// then the picked line.
pub fn interpret(
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
    expect_extra_cancel: bool,
    mode: ChooserMode,
) -> ChooserOutcome {
    match code {
        Some(EXIT_SELECTED) => {}
        Some(EXIT_NO_MATCH) => return ChooserOutcome::NoSelection,
        Some(EXIT_INTERRUPTED) => return ChooserOutcome::Cancelled,
        Some(EXIT_EXPECT_CANCEL) if expect_extra_cancel => return ChooserOutcome::Cancelled,
        Some(other) => {
            let err = RunError::NonZeroExit {
                program: "chooser".into(),
                code: other,
                stderr: stderr.trim().to_string(),
            };
            let mut msg = err.diagnostic();
            if !stderr.trim().is_empty() {
                msg.push_str(&format!(": {}", stderr.trim()));
            }
            return ChooserOutcome::Failed(msg);
        }
        None => return ChooserOutcome::Failed("Error: chooser was terminated by a signal".into()),
    }

    let mut lines = stdout.lines().skip(1);
    if expect_extra_cancel {
        let key = lines.next().unwrap_or("").trim();
        if CANCEL_KEYS.contains(&key) {
            return ChooserOutcome::Cancelled;
        }
    }
    let Some(picked) = lines.filter(|l| !l.trim().is_empty()).last() else {
        return ChooserOutcome::NoSelection;
    };
    let key = match mode {
        ChooserMode::Ranked => picked.split(DISPLAY_DELIMITER).next().unwrap_or("").trim(),
        ChooserMode::Live => picked.split(FIELD_SEPARATOR).next().unwrap_or(""),
    };
    if key.is_empty() {
        ChooserOutcome::NoSelection
    } else {
        ChooserOutcome::Selected(key.to_string())
    }
}

/// Show `records` in the chooser and return the picked record's id.
pub fn choose(
    runner: &dyn CommandRunner,
    config: &ChooserConfig,
    records: &[CommandRecord],
) -> ChooserOutcome {
    if records.is_empty() {
        return ChooserOutcome::NoSelection;
    }
    let input: Vec<String> = records.iter().map(display_line).collect();
    let request = RunRequest::new(&config.executable, Duration::from_secs(config.timeout_secs))
        .args(chooser_args(config, true))
        .stdin(input.join("\n"))
        .inherit_stderr();
    run_chooser(runner, &request, ChooserMode::Ranked)
}

/// Open a self-reloading chooser; the pick is the first live field as it
/// was shown, still escaped.
pub fn choose_live(
    runner: &dyn CommandRunner,
    config: &ChooserConfig,
    exe: &str,
    initial_query: &str,
) -> ChooserOutcome {
    let request = RunRequest::new(&config.executable, Duration::from_secs(config.timeout_secs))
        .args(live_chooser_args(config, exe, initial_query))
        .stdin("")
        .inherit_stderr();
    run_chooser(runner, &request, ChooserMode::Live)
}

fn run_chooser(runner: &dyn CommandRunner, request: &RunRequest, mode: ChooserMode) -> ChooserOutcome {
    match runner.run(request) {
        Ok(out) => {
            let outcome = interpret(out.code, &out.stdout, &out.stderr, true, mode);
            tracing::debug!("chooser exited with {:?}: {outcome:?}", out.code);
            outcome
        }
        Err(e) => ChooserOutcome::Failed(e.diagnostic()),
    }
}

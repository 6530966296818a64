use std::time::Duration;

use crate::config::ContextConfig;
use crate::dedup::base_command;
use crate::runner::{CommandRunner, RunOutput, RunRequest};
use crate::types::{CommandContext, NOT_AVAILABLE};
use crate::util::cap_excerpt;

const HELP_FLAGS: &[&str] = &["--help", "-h", "help"];
const HELP_MIN_CHARS: usize = 20;
const HELP_ERROR_MARKERS: &[&str] = &["error", "invalid option", "unknown command", "not found"];

/// Gather `which`, `--help` and `man` excerpts for the command's base
/// program. Every field is filled: either a capped excerpt, a runner
/// diagnostic, or `N/A`.
pub fn fetch_context(
    runner: &dyn CommandRunner,
    raw_command: &str,
    limits: &ContextConfig,
) -> CommandContext {
    let Some(base) = base_command(raw_command) else {
        return CommandContext::not_available();
    };
    tracing::debug!("fetching context for '{base}'");

    CommandContext {
        which_info: Some(which_info(runner, &base, limits)),
        help_info: Some(help_info(runner, &base, limits)),
        man_info: Some(man_info(runner, &base, limits)),
    }
}

fn which_info(runner: &dyn CommandRunner, base: &str, limits: &ContextConfig) -> String {
    let req = RunRequest::new("which", Duration::from_millis(limits.which_timeout_ms)).arg(base);
    match runner.run(&req) {
        Ok(out) => {
            let text = out.stdout.trim();
            let missing = text.to_lowercase().contains(&format!("no {base} in"));
            if !out.success() || text.is_empty() || missing {
                NOT_AVAILABLE.into()
            } else {
                cap_excerpt(text, limits.max_lines, limits.max_chars)
            }
        }
        Err(e) => e.diagnostic(),
    }
}

fn help_info(runner: &dyn CommandRunner, base: &str, limits: &ContextConfig) -> String {
    for flag in HELP_FLAGS {
        // `help help` would just echo the builtin list back.
        let flag = if base == "help" && *flag == "help" {
            "--help"
        } else {
            flag
        };
        let req = RunRequest::new(base, Duration::from_millis(limits.help_timeout_ms)).arg(flag);
        let out = match runner.run(&req) {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!("{} failed: {e}", req.display());
                continue;
            }
        };
        let Some(text) = help_text(&out) else {
            continue;
        };
        let capped = cap_excerpt(text, limits.max_lines, limits.max_chars);
        if looks_like_help(&capped) {
            return capped;
        }
    }
    NOT_AVAILABLE.into()
}

/// Prefer stdout; many tools print usage to stderr, so take that when it
/// reads like usage or the tool exited non-zero.
fn help_text(out: &RunOutput) -> Option<&str> {
    let stdout = out.stdout.trim();
    if !stdout.is_empty() {
        return Some(stdout);
    }
    let stderr = out.stderr.trim();
    if stderr.is_empty() {
        return None;
    }
    let lower = stderr.to_lowercase();
    let usage_like = ["usage:", "help", "option"].iter().any(|m| lower.contains(m));
    (usage_like || !out.success()).then_some(stderr)
}

fn looks_like_help(text: &str) -> bool {
    let lower = text.to_lowercase();
    text.chars().count() > HELP_MIN_CHARS && !HELP_ERROR_MARKERS.iter().any(|m| lower.contains(m))
}

fn man_info(runner: &dyn CommandRunner, base: &str, limits: &ContextConfig) -> String {
    let req = RunRequest::new("man", Duration::from_millis(limits.man_timeout_ms))
        .arg(base)
        .env("MANPAGER", "cat")
        .env("GROFF_NO_SGR", "1")
        .env("MANWIDTH", "80");
    match runner.run(&req) {
        Ok(out) if out.success() => {
            let cleaned = crate::ansi::strip(out.stdout.as_bytes());
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                NOT_AVAILABLE.into()
            } else {
                cap_excerpt(cleaned, limits.max_lines, limits.max_chars)
            }
        }
        Ok(_) => NOT_AVAILABLE.into(),
        Err(e) => e.diagnostic(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::{FakeRunner, ok};
    use crate::runner::RunError;

    const TAR_HELP: &str = "Usage: tar [OPTION...] [FILE]...\nGNU 'tar' saves many files together.";

    fn tar_runner() -> FakeRunner {
        FakeRunner::new(|req| match (req.program.as_str(), req.args[0].as_str()) {
            ("which", "tar") => ok(0, "/usr/bin/tar\n", ""),
            ("tar", "--help") => ok(0, TAR_HELP, ""),
            ("man", "tar") => ok(0, "T\x08TA\x08AR\x08R(1)\n\nNAME\n  tar - an archiving utility\n", ""),
            _ => ok(1, "", ""),
        })
    }

    #[test]
    fn test_fetch_context_collects_all_three() {
        let runner = tar_runner();
        let ctx = fetch_context(&runner, "sudo tar -czf a.tgz ./x", &ContextConfig::default());
        assert_eq!(ctx.which_info.as_deref(), Some("/usr/bin/tar"));
        assert_eq!(ctx.help_info.as_deref(), Some(TAR_HELP));
        assert_eq!(
            ctx.man_info.as_deref(),
            Some("TAR(1)\n\nNAME\n  tar - an archiving utility")
        );
        assert_eq!(
            runner.invocations(),
            vec!["which tar", "tar --help", "man tar"]
        );
    }

    #[test]
    fn test_man_request_disables_pager() {
        let runner = tar_runner();
        fetch_context(&runner, "tar xf a.tgz", &ContextConfig::default());
        let calls = runner.calls.borrow();
        let man = calls.iter().find(|r| r.program == "man").unwrap();
        assert!(man.env.contains(&("MANPAGER".to_string(), "cat".to_string())));
        assert_eq!(man.timeout, Duration::from_millis(3000));
    }

    #[test]
    fn test_help_falls_through_flags() {
        let runner = FakeRunner::new(|req| match req.args[0].as_str() {
            "--help" => ok(2, "", "foo: invalid option -- '-'"),
            "-h" => ok(0, "short", ""),
            "help" => ok(0, "foo help: prints a long list of subcommands", ""),
            _ => ok(1, "", ""),
        });
        let ctx = fetch_context(&runner, "foo bar", &ContextConfig::default());
        assert_eq!(
            ctx.help_info.as_deref(),
            Some("foo help: prints a long list of subcommands")
        );
    }

    #[test]
    fn test_help_from_stderr_usage() {
        let runner = FakeRunner::new(|req| match req.args[0].as_str() {
            "--help" => ok(0, "", "usage: rsync [OPTION]... SRC [SRC]... DEST\n"),
            _ => ok(1, "", ""),
        });
        let ctx = fetch_context(&runner, "rsync -a a b", &ContextConfig::default());
        assert_eq!(
            ctx.help_info.as_deref(),
            Some("usage: rsync [OPTION]... SRC [SRC]... DEST")
        );
    }

    #[test]
    fn test_help_help_uses_long_flag() {
        let runner = FakeRunner::new(|_| ok(1, "", ""));
        fetch_context(&runner, "help cd", &ContextConfig::default());
        let help_calls: Vec<String> = runner
            .invocations()
            .into_iter()
            .filter(|c| c.starts_with("help "))
            .collect();
        assert_eq!(help_calls, vec!["help --help", "help -h", "help --help"]);
    }

    #[test]
    fn test_missing_tools_give_sentinel_or_diagnostic() {
        let runner = FakeRunner::new(|req| match req.program.as_str() {
            "which" => ok(1, "", ""),
            "man" => Err(RunError::NotFound("man".into())),
            other => Err(RunError::NotFound(other.to_string())),
        });
        let ctx = fetch_context(&runner, "frobnicate --x", &ContextConfig::default());
        assert_eq!(ctx.which_info.as_deref(), Some(NOT_AVAILABLE));
        assert_eq!(ctx.help_info.as_deref(), Some(NOT_AVAILABLE));
        assert_eq!(ctx.man_info.as_deref(), Some("Error: command 'man' not found"));
    }

    #[test]
    fn test_timeout_is_reported_distinctly() {
        let runner = FakeRunner::new(|req| match req.program.as_str() {
            "man" => Err(RunError::Timeout {
                program: "man".into(),
                timeout: req.timeout,
            }),
            _ => ok(1, "", ""),
        });
        let ctx = fetch_context(&runner, "curl -s x", &ContextConfig::default());
        assert_eq!(
            ctx.man_info.as_deref(),
            Some("Error: command 'man' timed out after 3s")
        );
    }

    #[test]
    fn test_which_no_match_message() {
        let runner = FakeRunner::new(|req| match req.program.as_str() {
            "which" => ok(0, "which: no foo in (/usr/bin:/bin)", ""),
            _ => ok(1, "", ""),
        });
        let ctx = fetch_context(&runner, "foo", &ContextConfig::default());
        assert_eq!(ctx.which_info.as_deref(), Some(NOT_AVAILABLE));
    }

    #[test]
    fn test_long_man_page_is_capped() {
        let page: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let runner = FakeRunner::new(move |req| match req.program.as_str() {
            "man" => ok(0, &page, ""),
            _ => ok(1, "", ""),
        });
        let limits = ContextConfig {
            max_lines: 3,
            ..ContextConfig::default()
        };
        let ctx = fetch_context(&runner, "seq 100", &limits);
        assert_eq!(
            ctx.man_info.as_deref(),
            Some("line 0\nline 1\nline 2\n... (Content has been truncated, total num of lines: 100)")
        );
    }

    #[test]
    fn test_blank_command_runs_nothing() {
        let runner = FakeRunner::new(|_| ok(0, "x", ""));
        let ctx = fetch_context(&runner, "   ", &ContextConfig::default());
        assert_eq!(ctx, CommandContext::not_available());
        assert!(runner.calls.borrow().is_empty());
    }
}

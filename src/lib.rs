// Library root for clihunter: exposes modules and the shared CLI entry point.

pub mod ansi;
pub mod cli;
pub mod config;
pub mod context;
pub mod db;
pub mod dedup;
pub mod describe;
pub mod history_import;
pub mod ingest;
pub mod runner;
pub mod search;
pub mod selection;
pub mod types;
pub mod util;

use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use db::with_store;
use dedup::CommandFilter;
use history_import::Shell;
use ingest::{Enrichment, HistorySource};
use runner::{CommandRunner, SystemRunner};
use search::{QueryExpander, SearchEngine, SearchOptions, SynonymLookup};
use selection::ChooserOutcome;
use types::CommandRecord;

pub fn main_inner() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    run(cli.command, &config)
}

/// `--shell`, else the basename of `$SHELL`, else zsh.
fn resolve_shell(arg: Option<&str>) -> anyhow::Result<Shell> {
    if let Some(name) = arg {
        return name.parse();
    }
    let from_env = std::env::var("SHELL").ok().and_then(|s| {
        std::path::Path::new(&s)
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse::<Shell>().ok())
    });
    Ok(from_env.unwrap_or(Shell::Zsh))
}

fn history_source(
    config: &Config,
    shell: Option<&str>,
    file: Option<std::path::PathBuf>,
) -> anyhow::Result<HistorySource> {
    let shell = resolve_shell(shell)?;
    let path = file.unwrap_or_else(|| config.history_file(shell));
    Ok(HistorySource { shell, path })
}

fn enrichment<'a>(config: &Config, runner: Option<&'a dyn CommandRunner>) -> Enrichment<'a> {
    Enrichment {
        runner,
        limits: config.context.clone(),
        describer: None,
    }
}

fn print_record(record: &CommandRecord) {
    let or_na = |v: Option<&str>| v.filter(|s| !s.is_empty()).unwrap_or("N/A").to_string();
    println!("ID:                {}", record.id);
    println!("Raw command:       {}", record.raw_command);
    println!("Processed command: {}", or_na(record.processed_command.as_deref()));
    println!("Description:       {}", or_na(record.description.as_deref()));
    if !record.tags.is_empty() {
        println!("Tags:              {}", record.tags.join(", "));
    }
    println!("Source:            {}", record.source);
    if let Some(ts) = record.history_timestamp {
        println!("Run at:            {}", format_ts(ts));
    }
    println!("Added at:          {}", format_ts(record.added_timestamp));
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Print the picked command. Declined or failed picks exit 1 under
/// `--raw-output` so shell widgets can tell nothing was chosen.
fn report_pick(picked: Option<CommandRecord>, outcome: &ChooserOutcome, raw_output: bool) -> ExitCode {
    if let Some(record) = picked {
        if raw_output {
            println!("{}", record.raw_command);
        } else {
            print_record(&record);
        }
        return ExitCode::SUCCESS;
    }
    match outcome {
        ChooserOutcome::Cancelled => eprintln!("Cancelled."),
        ChooserOutcome::Failed(msg) => eprintln!("clihunter: {msg}"),
        _ => eprintln!("No command selected."),
    }
    let failed = matches!(outcome, ChooserOutcome::Failed(_));
    if raw_output || failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

pub fn run(command: Commands, config: &Config) -> anyhow::Result<ExitCode> {
    match command {
        Commands::InitDb => {
            let count = with_store(config, |db| Ok(db.count()))?;
            eprintln!(
                "Database ready at {} ({count} commands)",
                config.db_path().display()
            );
        }

        Commands::InitHistory {
            shell,
            limit,
            force_reparse,
            history_file,
            no_context,
        } => {
            let source = history_source(config, shell.as_deref(), history_file)?;
            eprintln!("Importing {} history from {}", source.shell, source.path.display());
            let filter = CommandFilter::from_config(&config.history);
            let runner = SystemRunner;
            let enrich = enrichment(config, (!no_context).then_some(&runner as &dyn CommandRunner));
            let report = with_store(config, |db| {
                Ok(ingest::init_history(db, &source, limit, force_reparse, &filter, &enrich))
            })?;
            eprintln!("{report}");
        }

        Commands::Sync {
            shell,
            recent_n,
            history_file,
        } => {
            let source = history_source(config, shell.as_deref(), history_file)?;
            let recent = recent_n.unwrap_or(config.history.sync_recent);
            let filter = CommandFilter::from_config(&config.history);
            let report = with_store(config, |db| {
                Ok(ingest::sync_history(db, &source, recent, &filter, None))
            })?;
            eprintln!("{report}");
        }

        Commands::Search {
            query,
            top_k,
            no_expand,
            prefix,
            raw_output,
            live_search_query,
            live,
            no_chooser,
        } => {
            let expander = QueryExpander::new(SynonymLookup::builtin());

            if let Some(partial) = live_search_query {
                let lines = with_store(config, |db| {
                    let engine = SearchEngine::new(db, &expander, config.search.live_fetch_size);
                    Ok(engine.live_search(&partial))
                })?;
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                for line in lines {
                    writeln!(out, "{line}")?;
                }
                return Ok(ExitCode::SUCCESS);
            }

            if live {
                let exe = std::env::current_exe()?;
                let outcome = selection::choose_live(
                    &SystemRunner,
                    &config.chooser,
                    &exe.to_string_lossy(),
                    query.as_deref().unwrap_or(""),
                );
                let picked = match &outcome {
                    ChooserOutcome::Selected(field) => with_store(config, |db| {
                        let engine = SearchEngine::new(db, &expander, config.search.live_fetch_size);
                        Ok(engine.resolve_live_pick(field))
                    })?,
                    _ => None,
                };
                return Ok(report_pick(picked, &outcome, raw_output));
            }

            let Some(query) = query else {
                anyhow::bail!("a query is required unless --live is given");
            };
            let options = SearchOptions {
                expand: config.search.expand_synonyms && !no_expand,
                prefix: config.search.prefix_match || prefix,
            };
            let top_k = top_k.unwrap_or(config.search.top_k);
            let results = with_store(config, |db| {
                let engine = SearchEngine::new(db, &expander, config.search.live_fetch_size);
                Ok(engine.search(&query, top_k, options))
            })?;
            if results.is_empty() {
                if !raw_output {
                    eprintln!("No matching commands found.");
                }
                return Ok(ExitCode::FAILURE);
            }

            if no_chooser {
                for record in &results {
                    println!("{}", selection::display_line(record));
                }
                return Ok(ExitCode::SUCCESS);
            }

            let outcome = selection::choose(&SystemRunner, &config.chooser, &results);
            let picked = match &outcome {
                ChooserOutcome::Selected(id) => results.iter().find(|r| &r.id == id).cloned(),
                _ => None,
            };
            return Ok(report_pick(picked, &outcome, raw_output));
        }

        Commands::Add {
            command,
            description,
            tags,
            no_context,
        } => {
            let runner = SystemRunner;
            let enrich = enrichment(config, (!no_context).then_some(&runner as &dyn CommandRunner));
            let added = with_store(config, |db| {
                ingest::add_manual(db, &command, description.as_deref(), tags.as_deref(), &enrich)
            })?;
            match added {
                Some(id) => eprintln!("Saved as {id}"),
                None => {
                    eprintln!("Not saved: the command is already stored or the write failed.");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Commands::List { limit, offset } => {
            let records = with_store(config, |db| Ok(db.list(limit, offset)))?;
            if records.is_empty() {
                eprintln!("No commands stored.");
            }
            for record in records {
                let desc = record.description.as_deref().unwrap_or("");
                println!("{}  {}  {}", record.id, record.raw_command, util::preview(desc, 60));
            }
        }

        Commands::Show { id, json } => {
            let Some(record) = with_store(config, |db| Ok(db.get_by_id(&id)))? else {
                eprintln!("No command with id {id}");
                return Ok(ExitCode::FAILURE);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
                let ctx = &record.context;
                for (label, value) in [
                    ("which", &ctx.which_info),
                    ("help", &ctx.help_info),
                    ("man", &ctx.man_info),
                ] {
                    if let Some(v) = value {
                        println!("\n[{label}]\n{v}");
                    }
                }
            }
        }

        Commands::Delete { id } => {
            if !with_store(config, |db| Ok(db.delete(&id)))? {
                eprintln!("No command with id {id}");
                return Ok(ExitCode::FAILURE);
            }
            eprintln!("Deleted {id}");
        }

        Commands::Clear { yes } => {
            if !yes && !confirm("Delete every stored command?")? {
                eprintln!("Aborted.");
                return Ok(ExitCode::SUCCESS);
            }
            if !with_store(config, |db| Ok(db.clear_all()))? {
                anyhow::bail!("failed to clear the database");
            }
            eprintln!("All commands deleted.");
        }

        Commands::ConfigPath => {
            println!("{}", Config::path().display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

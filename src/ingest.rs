use std::fmt;
use std::path::PathBuf;

use crate::config::ContextConfig;
use crate::context::fetch_context;
use crate::db::Db;
use crate::dedup::{CommandFilter, FilterPolicy, base_command, dedupe};
use crate::describe::Describer;
use crate::history_import::{Shell, load_history};
use crate::runner::CommandRunner;
use crate::types::{CommandContext, CommandRecord, HistoryEntry};
use crate::util::preview;

pub const MANUAL_SOURCE: &str = "manual_add";

/// External helpers used while turning a command into a record.
pub struct Enrichment<'a> {
    /// Runs `which` / `--help` / `man`. `None` skips context capture.
    pub runner: Option<&'a dyn CommandRunner>,
    pub limits: ContextConfig,
    /// `None` stores commands without description or processed command.
    pub describer: Option<&'a dyn Describer>,
}

impl<'a> Enrichment<'a> {
    pub fn none() -> Self {
        Self {
            runner: None,
            limits: ContextConfig::default(),
            describer: None,
        }
    }

    fn context(&self, raw: &str) -> CommandContext {
        match self.runner {
            Some(runner) => fetch_context(runner, raw, &self.limits),
            None => CommandContext::default(),
        }
    }

    /// `Err(())` when a describer is configured but has nothing to say.
    fn describe(
        &self,
        raw: &str,
        base: Option<&str>,
        context: &CommandContext,
    ) -> Result<(Option<String>, Option<String>), ()> {
        let Some(describer) = self.describer else {
            return Ok((None, None));
        };
        let description = describer
            .describe(raw, base, context)
            .filter(|d| !d.trim().is_empty())
            .ok_or(())?;
        let processed = describer.command_from_description(&description);
        Ok((Some(description), processed))
    }
}

#[derive(Debug, Clone)]
pub struct HistorySource {
    pub shell: Shell,
    pub path: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// History entries read from the file.
    pub analyzed: usize,
    /// Commands left after dedup, filtering and the stored-command check.
    pub planned: usize,
    pub processed: usize,
    pub describe_failures: usize,
    pub added: usize,
    pub updated: usize,
    pub store_failures: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "analyzed {}, planned {}, added {}, updated {}, description failures {}, store failures {}",
            self.analyzed,
            self.planned,
            self.added,
            self.updated,
            self.describe_failures,
            self.store_failures
        )
    }
}

enum Plan {
    Add(HistoryEntry),
    Update(String, HistoryEntry),
}

/// Full import: every eligible command in the history file that is not yet
/// stored, or every eligible command when `force_reparse` is set.
pub fn init_history(
    db: &Db,
    source: &HistorySource,
    limit: Option<usize>,
    force_reparse: bool,
    filter: &CommandFilter,
    enrichment: &Enrichment<'_>,
) -> IngestReport {
    let mut report = IngestReport::default();
    let entries = load_history(source.shell, &source.path, limit);
    report.analyzed = entries.len();

    let candidates = filter.apply(dedupe(&entries), FilterPolicy::Init);
    let stored = db.list_all_raw_commands();
    let plan: Vec<Plan> = candidates
        .into_iter()
        .filter_map(|entry| {
            let raw = entry.command.trim();
            if !stored.contains(raw) {
                return Some(Plan::Add(entry));
            }
            if !force_reparse {
                return None;
            }
            match db.get_by_raw_command(raw) {
                Some(existing) => Some(Plan::Update(existing.id, entry)),
                None => Some(Plan::Add(entry)),
            }
        })
        .collect();
    report.planned = plan.len();
    tracing::info!(
        "{} history: {} entries, {} to process",
        source.shell,
        report.analyzed,
        report.planned
    );

    let origin = format!("{}_history", source.shell);
    for step in plan {
        let (entry, existing_id) = match step {
            Plan::Add(entry) => (entry, None),
            Plan::Update(id, entry) => (entry, Some(id)),
        };
        report.processed += 1;
        let raw = entry.command.trim();
        let base = base_command(raw);
        let context = enrichment.context(raw);
        let Ok((description, processed)) = enrichment.describe(raw, base.as_deref(), &context) else {
            tracing::warn!("no description for '{}', skipping", preview(raw, 40));
            report.describe_failures += 1;
            continue;
        };

        let mut record = CommandRecord::new(raw, origin.as_str());
        record.description = description;
        record.processed_command = processed;
        record.history_timestamp = entry.timestamp;
        record.context = context;

        match existing_id {
            Some(id) => {
                if db.update(&id, &record) {
                    report.updated += 1;
                } else {
                    report.store_failures += 1;
                }
            }
            None => {
                if db.add(&record).is_some() {
                    report.added += 1;
                } else {
                    report.store_failures += 1;
                }
            }
        }
    }
    report
}

/// Incremental import of the most recent `recent` history lines. Only new
/// commands are described and stored; no context is captured.
pub fn sync_history(
    db: &Db,
    source: &HistorySource,
    recent: usize,
    filter: &CommandFilter,
    describer: Option<&dyn Describer>,
) -> IngestReport {
    let mut report = IngestReport::default();
    let entries = load_history(source.shell, &source.path, Some(recent));
    report.analyzed = entries.len();

    let stored = db.list_all_raw_commands();
    let fresh: Vec<HistoryEntry> = filter
        .apply(dedupe(&entries), FilterPolicy::Sync)
        .into_iter()
        .filter(|e| !stored.contains(e.command.trim()))
        .collect();
    report.planned = fresh.len();
    tracing::info!("{} new commands to sync", report.planned);

    let enrichment = Enrichment {
        describer,
        ..Enrichment::none()
    };
    let origin = format!("{}_history_sync", source.shell);
    for entry in fresh {
        report.processed += 1;
        let raw = entry.command.trim();
        let Ok((description, processed)) =
            enrichment.describe(raw, None, &CommandContext::default())
        else {
            tracing::warn!("no description for '{}', skipping", preview(raw, 40));
            report.describe_failures += 1;
            continue;
        };
        let mut record = CommandRecord::new(raw, origin.as_str());
        record.description = description;
        record.processed_command = processed;
        record.history_timestamp = entry.timestamp;
        if db.add(&record).is_some() {
            report.added += 1;
        } else {
            report.store_failures += 1;
        }
    }
    report
}

/// Split `"a, b,,c"` into `["a", "b", "c"]`.
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Store one command typed in by the user. Returns the new id, or `None`
/// when the command was already stored or could not be written.
pub fn add_manual(
    db: &Db,
    command: &str,
    description: Option<&str>,
    tags: Option<&str>,
    enrichment: &Enrichment<'_>,
) -> anyhow::Result<Option<String>> {
    let raw = command.trim();
    if raw.is_empty() {
        anyhow::bail!("command must not be empty");
    }
    let base = base_command(raw);
    let context = enrichment.context(raw);

    let given = description.map(str::trim).filter(|d| !d.is_empty());
    let generated = enrichment
        .describer
        .and_then(|d| d.describe(raw, base.as_deref(), &context))
        .filter(|d| !d.trim().is_empty());
    let description = match (given, generated) {
        (Some(g), Some(gen)) => Some(format!("{g} {gen}")),
        (Some(g), None) => Some(g.to_string()),
        (None, gen) => gen,
    };
    let processed = description
        .as_deref()
        .and_then(|d| enrichment.describer.and_then(|x| x.command_from_description(d)))
        .unwrap_or_else(|| raw.to_string());

    let mut record = CommandRecord::new(raw, MANUAL_SOURCE);
    record.description = description;
    record.processed_command = Some(processed);
    record.tags = tags.map(parse_tags).unwrap_or_default();
    record.context = context;
    Ok(db.add(&record))
}

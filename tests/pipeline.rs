//! End-to-end ingest, search and live-filter runs against an on-disk store.

use std::io::Write;

use clihunter::db::Db;
use clihunter::dedup::CommandFilter;
use clihunter::describe::StaticDescriber;
use clihunter::history_import::Shell;
use clihunter::ingest::{self, Enrichment, HistorySource};
use clihunter::search::{QueryExpander, SearchEngine, SearchOptions, SynonymLookup};
use clihunter::selection::{self, FIELD_SEPARATOR};
use tempfile::{NamedTempFile, TempDir};

fn bash_history(lines: &[&str]) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    f
}

fn describer() -> StaticDescriber {
    StaticDescriber::new()
        .with_description("tar -czf backup.tgz ./project", "compress a directory into an archive")
        .with_description("du -sh * | sort -h", "show disk usage of each file sorted by size")
        .with_description("git log --oneline -n 20", "show recent commits one per line")
        .with_command("show recent commits one per line", "git log --oneline")
}

fn open(dir: &TempDir) -> Db {
    Db::open(&dir.path().join("commands.db"), 5000).unwrap()
}

#[test]
fn ingest_then_search_ranked_and_live() {
    let dir = TempDir::new().unwrap();
    let history = bash_history(&[
        "#1700000000",
        "tar -czf backup.tgz ./project",
        "ls",
        "#1700000100",
        "du -sh * | sort -h",
        "git log --oneline -n 20",
        "#1700000200",
        "tar -czf backup.tgz ./project",
    ]);
    let source = HistorySource {
        shell: Shell::Bash,
        path: history.path().to_path_buf(),
    };
    let filter = CommandFilter::new(5, ["ls", "cd"]);
    let describer = describer();
    let enrichment = Enrichment {
        describer: Some(&describer),
        ..Enrichment::none()
    };

    let report = {
        let db = open(&dir);
        ingest::init_history(&db, &source, None, false, &filter, &enrichment)
    };
    assert_eq!(report.planned, 3);
    assert_eq!(report.added, 3);

    // Reopen: the store is scoped per operation.
    let db = open(&dir);
    let tar = db.get_by_raw_command("tar -czf backup.tgz ./project").unwrap();
    assert_eq!(tar.history_timestamp, Some(1700000200));
    assert_eq!(tar.source, "bash_history");

    let expander = QueryExpander::new(SynonymLookup::builtin());
    let engine = SearchEngine::new(&db, &expander, 20);

    let hits = engine.search("zip folder", 10, SearchOptions::default());
    assert_eq!(hits.first().map(|r| r.raw_command.as_str()), Some("tar -czf backup.tgz ./project"));

    let hits = engine.search("commits", 10, SearchOptions::default());
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].processed_command.as_deref(), Some("git log --oneline"));

    let lines = engine.live_search("disk us");
    assert_eq!(lines.len(), 1);
    let fields: Vec<&str> = lines[0].split(FIELD_SEPARATOR).collect();
    assert_eq!(fields[0], "du -sh * | sort -h");
    assert_eq!(fields[2], "du -sh * | sort -h");
    assert_eq!(fields[3], "[]");
}

#[test]
fn sync_after_init_only_picks_up_new_commands() {
    let dir = TempDir::new().unwrap();
    let mut history = bash_history(&["git log --oneline -n 20"]);
    let source = HistorySource {
        shell: Shell::Bash,
        path: history.path().to_path_buf(),
    };
    let filter = CommandFilter::new(5, ["ls"]);
    {
        let db = open(&dir);
        let report = ingest::init_history(&db, &source, None, false, &filter, &Enrichment::none());
        assert_eq!(report.added, 1);
    }

    writeln!(history, "kubectl get pods -A").unwrap();
    writeln!(history, "git log --oneline -n 20").unwrap();
    history.flush().unwrap();

    let db = open(&dir);
    let report = ingest::sync_history(&db, &source, 200, &filter, None);
    assert_eq!(report.planned, 1);
    assert_eq!(report.added, 1);
    assert_eq!(db.count(), 2);
    assert_eq!(
        db.get_by_raw_command("kubectl get pods -A").unwrap().source,
        "bash_history_sync"
    );
}

#[test]
fn manual_add_update_delete_cycle() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let id = ingest::add_manual(
        &db,
        "ffmpeg -i in.mov -vcodec h264 out.mp4",
        Some("convert a video to mp4"),
        Some("video, ffmpeg"),
        &Enrichment::none(),
    )
    .unwrap()
    .unwrap();

    let expander = QueryExpander::new(SynonymLookup::builtin());
    let engine = SearchEngine::new(&db, &expander, 20);
    let hits = engine.search("transform movie", 10, SearchOptions::default());
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
    assert!(selection::display_line(&hits[0]).starts_with(&format!("{id} ::: convert a video")));

    let mut edited = hits[0].clone();
    edited.description = Some("re-encode footage as h264".into());
    assert!(db.update(&id, &edited));
    assert!(engine.search("convert", 10, SearchOptions::default()).is_empty());
    assert_eq!(engine.search("footage", 10, SearchOptions::default()).len(), 1);

    assert!(db.delete(&id));
    assert!(engine.search("footage", 10, SearchOptions::default()).is_empty());
    assert!(db.get_by_id(&id).is_none());
}

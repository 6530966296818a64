use std::collections::HashSet;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::config::Config;
use crate::types::{CommandContext, CommandRecord};

const SCHEMA_VERSION: i32 = 1;

const RECORD_COLUMNS: &str = "id, raw_command, processed_command, description, tags, source, \
     history_timestamp, added_timestamp, which_info, help_info, man_info";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("tag encoding: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn init_db(conn: &Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA temp_store = MEMORY;
",
    )?;
    conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))?;

    conn.execute_batch(
        "
        -- One row per distinct command line
        CREATE TABLE IF NOT EXISTS saved_commands (
            id                  TEXT PRIMARY KEY,
            raw_command         TEXT NOT NULL UNIQUE,
            processed_command   TEXT,
            description         TEXT,
            tags                TEXT NOT NULL DEFAULT '[]',
            source              TEXT NOT NULL DEFAULT '',
            history_timestamp   INTEGER,
            added_timestamp     INTEGER NOT NULL,
            which_info          TEXT,
            help_info           TEXT,
            man_info            TEXT
        );

        -- Full-text index, one row per saved command, maintained by Db
        CREATE VIRTUAL TABLE IF NOT EXISTS commands_fts USING fts5(
            command_id UNINDEXED,
            search_text,
            tokenize='porter unicode61'
        );

        CREATE INDEX IF NOT EXISTS idx_saved_commands_added
            ON saved_commands(added_timestamp DESC);

        CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT
        );
    ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO meta(key, value) VALUES ('schema_version', ?)",
        params![SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Open the store for one logical operation and close it afterwards,
/// whichever way `f` returns.
pub fn with_store<F, T>(config: &Config, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Db) -> anyhow::Result<T>,
{
    let db = Db::open(&config.db_path(), config.db.busy_timeout_ms)?;
    f(&db)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CommandRecord> {
    let tags_json: Option<String> = row.get(4)?;
    let tags: Vec<String> = match tags_json.as_deref() {
        Some(s) if !s.is_empty() => serde_json::from_str(s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        _ => Vec::new(),
    };
    Ok(CommandRecord {
        id: row.get(0)?,
        raw_command: row.get(1)?,
        processed_command: row.get(2)?,
        description: row.get(3)?,
        tags,
        source: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        history_timestamp: row.get(6)?,
        added_timestamp: row.get(7)?,
        context: CommandContext {
            which_info: row.get(8)?,
            help_info: row.get(9)?,
            man_info: row.get(10)?,
        },
    })
}

/// Collapse a store failure into "absent", leaving a trace behind.
fn logged<T>(op: &str, result: Result<T, StoreError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("store {op} failed: {e}");
            None
        }
    }
}

pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    pub fn open(path: &Path, busy_timeout_ms: u64) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut conn = Connection::open(path)?;
        init_db(&conn, busy_timeout_ms)?;
        conn.set_transaction_behavior(rusqlite::TransactionBehavior::Immediate);
        let db = Self { conn };
        db.check_index();
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn, 10000)?;
        Ok(Self { conn })
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Insert `record` unless its raw command is already stored.
    /// Returns the new id, or `None` for a duplicate or a storage failure.
    pub fn add(&self, record: &CommandRecord) -> Option<String> {
        logged("add", self.try_add(record)).flatten()
    }

    fn try_add(&self, record: &CommandRecord) -> Result<Option<String>, StoreError> {
        let tags_json = serde_json::to_string(&record.tags)?;
        let tx = self.conn.unchecked_transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO saved_commands \
             (id, raw_command, processed_command, description, tags, source, \
              history_timestamp, added_timestamp, which_info, help_info, man_info) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.raw_command,
                record.processed_command,
                record.description,
                tags_json,
                record.source,
                record.history_timestamp,
                record.added_timestamp,
                record.context.which_info,
                record.context.help_info,
                record.context.man_info,
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO commands_fts (command_id, search_text) VALUES (?, ?)",
            params![record.id, record.searchable_text()],
        )?;
        tx.commit()?;
        Ok(Some(record.id.clone()))
    }

    /// Replace every field of the record stored under `id` except the id
    /// itself and `added_timestamp`, and re-index it.
    pub fn update(&self, id: &str, record: &CommandRecord) -> bool {
        logged("update", self.try_update(id, record)).unwrap_or(false)
    }

    fn try_update(&self, id: &str, record: &CommandRecord) -> Result<bool, StoreError> {
        let tags_json = serde_json::to_string(&record.tags)?;
        let tx = self.conn.unchecked_transaction()?;

        let updated = tx.execute(
            "UPDATE saved_commands SET \
               raw_command = ?, processed_command = ?, description = ?, tags = ?, \
               source = ?, history_timestamp = ?, which_info = ?, help_info = ?, man_info = ? \
             WHERE id = ?",
            params![
                record.raw_command,
                record.processed_command,
                record.description,
                tags_json,
                record.source,
                record.history_timestamp,
                record.context.which_info,
                record.context.help_info,
                record.context.man_info,
                id,
            ],
        )?;
        if updated == 0 {
            tracing::debug!("update: no command with id {id}");
            return Ok(false);
        }

        tx.execute("DELETE FROM commands_fts WHERE command_id = ?", params![id])?;
        tx.execute(
            "INSERT INTO commands_fts (command_id, search_text) VALUES (?, ?)",
            params![id, record.searchable_text()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    pub fn delete(&self, id: &str) -> bool {
        logged("delete", self.try_delete(id)).unwrap_or(false)
    }

    fn try_delete(&self, id: &str) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM saved_commands WHERE id = ?", params![id])?;
        if deleted == 0 {
            tracing::debug!("delete: no command with id {id}");
            return Ok(false);
        }
        tx.execute("DELETE FROM commands_fts WHERE command_id = ?", params![id])?;
        tx.commit()?;
        Ok(true)
    }

    pub fn clear_all(&self) -> bool {
        let result = (|| -> Result<(), StoreError> {
            let tx = self.conn.unchecked_transaction()?;
            tx.execute("DELETE FROM saved_commands", [])?;
            tx.execute("DELETE FROM commands_fts", [])?;
            tx.commit()?;
            Ok(())
        })();
        logged("clear", result).is_some()
    }

    // ── Reads ──────────────────────────────────────────────────────

    pub fn get_by_id(&self, id: &str) -> Option<CommandRecord> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM saved_commands WHERE id = ?");
        let result = self
            .conn
            .query_row(&sql, params![id], row_to_record)
            .optional()
            .map_err(StoreError::from);
        logged("get_by_id", result).flatten()
    }

    pub fn get_by_raw_command(&self, raw_command: &str) -> Option<CommandRecord> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM saved_commands WHERE raw_command = ?");
        let result = self
            .conn
            .query_row(&sql, params![raw_command], row_to_record)
            .optional()
            .map_err(StoreError::from);
        logged("get_by_raw_command", result).flatten()
    }

    /// Most recently added first.
    pub fn list(&self, limit: Option<usize>, offset: usize) -> Vec<CommandRecord> {
        let result = (|| -> Result<Vec<CommandRecord>, StoreError> {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM saved_commands \
                 ORDER BY added_timestamp DESC, rowid DESC LIMIT ? OFFSET ?"
            );
            let limit = limit.map_or(-1, |l| l as i64);
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params![limit, offset as i64], row_to_record)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })();
        logged("list", result).unwrap_or_default()
    }

    pub fn list_all_raw_commands(&self) -> HashSet<String> {
        let result = (|| -> Result<HashSet<String>, StoreError> {
            let mut stmt = self.conn.prepare("SELECT raw_command FROM saved_commands")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            Ok(rows.collect::<rusqlite::Result<HashSet<_>>>()?)
        })();
        logged("list_all_raw_commands", result).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        let result = self
            .conn
            .query_row("SELECT count(*) FROM saved_commands", [], |row| row.get::<_, i64>(0))
            .map_err(StoreError::from);
        logged("count", result).unwrap_or(0) as usize
    }

    // ── FTS5 search ────────────────────────────────────────────────

    /// Ranked `(id, rank)` pairs, best match first. FTS5 ranks are negative
    /// bm25 scores, so smaller means more relevant. A query FTS5 cannot
    /// parse yields no results.
    pub fn search_fulltext(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        if query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }
        let result = (|| -> rusqlite::Result<Vec<(String, f64)>> {
            let mut stmt = self.conn.prepare(
                "SELECT command_id, rank FROM commands_fts \
                 WHERE commands_fts MATCH ? \
                 ORDER BY rank \
                 LIMIT ?",
            )?;
            let rows = stmt.query_map(params![query, top_k as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;
            rows.collect()
        })();
        match result {
            Ok(hits) => hits,
            Err(e) => {
                tracing::debug!("fts query {query:?} rejected: {e}");
                Vec::new()
            }
        }
    }

    /// Re-derive every index row from the stored records.
    pub fn rebuild_fts(&self) -> bool {
        let result = (|| -> Result<usize, StoreError> {
            let records = {
                let sql = format!("SELECT {RECORD_COLUMNS} FROM saved_commands");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_record)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            let tx = self.conn.unchecked_transaction()?;
            tx.execute("DELETE FROM commands_fts", [])?;
            for record in &records {
                tx.execute(
                    "INSERT INTO commands_fts (command_id, search_text) VALUES (?, ?)",
                    params![record.id, record.searchable_text()],
                )?;
            }
            tx.commit()?;
            Ok(records.len())
        })();
        match logged("rebuild_fts", result) {
            Some(n) => {
                tracing::info!("rebuilt full-text index for {n} commands");
                true
            }
            None => false,
        }
    }

    fn check_index(&self) {
        let probe = self.conn.query_row(
            "SELECT \
               (SELECT count(*) FROM saved_commands), \
               (SELECT count(*) FROM commands_fts)",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        );
        match probe {
            Ok((records, rows)) if records == rows => {}
            Ok((records, rows)) => {
                tracing::warn!("full-text index out of sync ({records} commands, {rows} rows), rebuilding");
                self.rebuild_fts();
            }
            Err(e) => {
                tracing::warn!("full-text index may be corrupt, rebuilding: {e}");
                self.rebuild_fts();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Db {
        Db::open_in_memory().expect("in-memory db")
    }

    fn fts_rows(db: &Db, id: &str) -> i64 {
        db.conn
            .query_row(
                "SELECT count(*) FROM commands_fts WHERE command_id = ?",
                params![id],
                |row| row.get(0),
            )
            .unwrap()
    }

    fn record(raw: &str, desc: &str) -> CommandRecord {
        let mut rec = CommandRecord::new(raw, "test");
        rec.description = Some(desc.into());
        rec
    }

    #[test]
    fn test_add_is_idempotent() {
        let db = test_db();
        let first = record("docker ps -a", "list all containers");
        let id = db.add(&first).expect("first insert");
        assert_eq!(id, first.id);

        let again = record("docker ps -a", "something else");
        assert!(db.add(&again).is_none());
        assert_eq!(db.count(), 1);
        assert_eq!(fts_rows(&db, &id), 1);
        assert_eq!(fts_rows(&db, &again.id), 0);
        let stored = db.get_by_id(&id).unwrap();
        assert_eq!(stored.description.as_deref(), Some("list all containers"));
    }

    #[test]
    fn test_round_trip_all_fields() {
        let db = test_db();
        let rec = CommandRecord {
            id: "rec-1".into(),
            raw_command: "tar -czf a.tgz ./x".into(),
            processed_command: Some("tar create gzip archive a.tgz from ./x".into()),
            description: Some("Compress the ./x directory into a.tgz".into()),
            tags: vec!["archive".into(), "tar".into(), "archive".into()],
            source: "zsh_history".into(),
            history_timestamp: Some(1_700_000_000),
            added_timestamp: 1_700_000_500,
            context: CommandContext {
                which_info: Some("/usr/bin/tar".into()),
                help_info: None,
                man_info: Some("N/A".into()),
            },
        };
        assert_eq!(db.add(&rec).as_deref(), Some("rec-1"));
        assert_eq!(db.get_by_id("rec-1"), Some(rec.clone()));
        assert_eq!(db.get_by_raw_command("tar -czf a.tgz ./x"), Some(rec));
    }

    #[test]
    fn test_get_missing() {
        let db = test_db();
        assert!(db.get_by_id("nope").is_none());
        assert!(db.get_by_raw_command("nope").is_none());
    }

    #[test]
    fn test_update_nonexistent_leaves_store_unchanged() {
        let db = test_db();
        let rec = record("kubectl get pods -A", "list pods in every namespace");
        db.add(&rec).unwrap();

        let other = record("helm list", "list releases");
        assert!(!db.update("missing-id", &other));
        assert_eq!(db.count(), 1);
        assert_eq!(db.get_by_id(&rec.id), Some(rec.clone()));
        assert!(db.get_by_raw_command("helm list").is_none());
        assert_eq!(fts_rows(&db, "missing-id"), 0);
    }

    #[test]
    fn test_update_reindexes() {
        let db = test_db();
        let rec = record("rsync -av src/ dst/", "mirror a folder");
        let id = db.add(&rec).unwrap();
        assert_eq!(db.search_fulltext("mirror", 10).len(), 1);

        let mut changed = rec.clone();
        changed.description = Some("synchronise directories".into());
        changed.tags = vec!["backup".into()];
        changed.added_timestamp = 42;
        assert!(db.update(&id, &changed));

        assert!(db.search_fulltext("mirror", 10).is_empty());
        let hits = db.search_fulltext("backup", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, id);
        assert_eq!(fts_rows(&db, &id), 1);

        let stored = db.get_by_id(&id).unwrap();
        assert_eq!(stored.tags, vec!["backup".to_string()]);
        // added_timestamp is never rewritten
        assert_eq!(stored.added_timestamp, rec.added_timestamp);
    }

    #[test]
    fn test_update_to_duplicate_raw_command_fails() {
        let db = test_db();
        let a = record("make build", "build");
        let b = record("make clean", "clean");
        db.add(&a).unwrap();
        db.add(&b).unwrap();
        let mut clash = b.clone();
        clash.raw_command = "make build".into();
        assert!(!db.update(&b.id, &clash));
        assert_eq!(db.get_by_id(&b.id).unwrap().raw_command, "make clean");
        assert_eq!(fts_rows(&db, &b.id), 1);
    }

    #[test]
    fn test_delete_removes_index_row() {
        let db = test_db();
        let rec = record("journalctl -u nginx -f", "follow nginx logs");
        let id = db.add(&rec).unwrap();
        assert!(db.delete(&id));
        assert!(db.get_by_id(&id).is_none());
        assert_eq!(fts_rows(&db, &id), 0);
        assert!(db.search_fulltext("nginx", 10).is_empty());
        assert!(!db.delete(&id));
    }

    #[test]
    fn test_list_newest_first_with_offset() {
        let db = test_db();
        for (i, raw) in ["git log --oneline", "git stash pop", "git rebase -i"].iter().enumerate() {
            let mut rec = record(raw, "git");
            rec.added_timestamp = 100 + i as i64;
            db.add(&rec).unwrap();
        }
        let all: Vec<String> = db.list(None, 0).into_iter().map(|r| r.raw_command).collect();
        assert_eq!(all, vec!["git rebase -i", "git stash pop", "git log --oneline"]);

        let page: Vec<String> = db.list(Some(1), 1).into_iter().map(|r| r.raw_command).collect();
        assert_eq!(page, vec!["git stash pop"]);
        assert!(db.list(Some(5), 10).is_empty());
    }

    #[test]
    fn test_list_all_raw_commands() {
        let db = test_db();
        db.add(&record("npm ci", "install")).unwrap();
        db.add(&record("npm run lint", "lint")).unwrap();
        let raws = db.list_all_raw_commands();
        assert_eq!(raws.len(), 2);
        assert!(raws.contains("npm ci"));
        assert!(raws.contains("npm run lint"));
    }

    #[test]
    fn test_search_empty_corpus() {
        let db = test_db();
        assert!(db.search_fulltext("anything", 10).is_empty());
        assert!(db.search_fulltext("find OR search", 10).is_empty());
    }

    #[test]
    fn test_search_malformed_query_is_empty() {
        let db = test_db();
        db.add(&record("ssh-keygen -t ed25519", "create key")).unwrap();
        assert!(db.search_fulltext("\"unbalanced", 10).is_empty());
        assert!(db.search_fulltext("AND OR", 10).is_empty());
        assert!(db.search_fulltext("   ", 10).is_empty());
    }

    #[test]
    fn test_search_ranked_ascending() {
        let db = test_db();
        db.add(&record("du -sh * | sort -h", "disk usage of each entry, disk sizes sorted"))
            .unwrap();
        db.add(&record("df -h", "free disk space")).unwrap();
        db.add(&record("uptime", "load averages")).unwrap();

        let hits = db.search_fulltext("disk", 10);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].1 <= hits[1].1);
        assert_eq!(db.search_fulltext("disk", 1).len(), 1);
    }

    #[test]
    fn test_search_uses_porter_stemming() {
        let db = test_db();
        db.add(&record("find . -name '*.log' -delete", "deleting log files")).unwrap();
        assert_eq!(db.search_fulltext("delete", 10).len(), 1);
        assert_eq!(db.search_fulltext("file", 10).len(), 1);
    }

    #[test]
    fn test_clear_all() {
        let db = test_db();
        db.add(&record("ip addr show", "interfaces")).unwrap();
        assert!(db.clear_all());
        assert_eq!(db.count(), 0);
        assert!(db.search_fulltext("interfaces", 10).is_empty());
    }

    #[test]
    fn test_rebuild_restores_missing_rows() {
        let db = test_db();
        let id = db.add(&record("lsof -i :8080", "who listens on port")).unwrap();
        db.conn.execute("DELETE FROM commands_fts", []).unwrap();
        assert!(db.search_fulltext("port", 10).is_empty());

        db.check_index();
        assert_eq!(fts_rows(&db, &id), 1);
        assert_eq!(db.search_fulltext("port", 10).len(), 1);
    }

    #[test]
    fn test_corrupt_tags_read_as_absent() {
        let db = test_db();
        let id = db.add(&record("env | sort", "environment")).unwrap();
        db.conn
            .execute("UPDATE saved_commands SET tags = 'not json' WHERE id = ?", params![id])
            .unwrap();
        assert!(db.get_by_id(&id).is_none());
    }

    #[test]
    fn test_open_on_disk_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("commands.db");
        let id = {
            let db = Db::open(&path, 1000).unwrap();
            db.add(&record("cargo build --release", "optimised build")).unwrap()
        };
        let db = Db::open(&path, 1000).unwrap();
        assert!(db.get_by_id(&id).is_some());
        assert_eq!(db.search_fulltext("optimised", 10).len(), 1);
    }

    #[test]
    fn test_init_db_idempotent() {
        let db = test_db();
        init_db(&db.conn, 1000).unwrap();
        init_db(&db.conn, 1000).unwrap();
        let version: String = db
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, "1");
    }
}

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thread_view_core::{
    sortable_timestamp, AuthorHandle, Limit, Post, PostSource, ThreadError,
};
use time::OffsetDateTime;

pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5_000;

const LATEST_SCHEMA_VERSION: i64 = 2;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS posts (
  id TEXT PRIMARY KEY,
  author_username TEXT,
  created_at TEXT,
  document_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC, id ASC);
CREATE INDEX IF NOT EXISTS idx_posts_author_created_at
  ON posts(author_username, created_at DESC, id ASC);
";

// Raw `created_at` text misorders mixed-precision fractions, so scans order by
// a fixed-width copy instead.
const MIGRATION_002_SQL: &str = r"
ALTER TABLE posts ADD COLUMN created_sort_key TEXT;

DROP INDEX IF EXISTS idx_posts_created_at;
DROP INDEX IF EXISTS idx_posts_author_created_at;
CREATE INDEX IF NOT EXISTS idx_posts_sort_key ON posts(created_sort_key DESC, id ASC);
CREATE INDEX IF NOT EXISTS idx_posts_author_sort_key
  ON posts(author_username, created_sort_key DESC, id ASC);
";

const SELECT_BY_ID_SQL: &str = "SELECT document_json FROM posts WHERE id = ?1";

const SELECT_LATEST_SQL: &str = "SELECT id, document_json FROM posts
     ORDER BY created_sort_key DESC, id ASC
     LIMIT ?1";

const SELECT_LATEST_BY_AUTHOR_SQL: &str = "SELECT id, document_json FROM posts
     WHERE author_username = ?1
     ORDER BY created_sort_key DESC, id ASC
     LIMIT ?2";

/// Connection parameters for the post document store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Upper bound on how long one query waits for a locked database.
    pub lookup_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./posts.sqlite3"),
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// # Errors
    /// Returns [`ThreadError::Configuration`] for an empty path or a zero timeout.
    pub fn validate(&self) -> Result<(), ThreadError> {
        if self.path.as_os_str().is_empty() {
            return Err(ThreadError::Configuration("store.path MUST be provided".to_string()));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ThreadError::Configuration(
                "store.lookup_timeout_ms MUST be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub replaced: usize,
    pub skipped_invalid: usize,
}

/// SQLite-backed post documents. The connection closes when the store drops.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing, migrated store for reading only.
    ///
    /// # Errors
    /// Fails with [`ThreadError::Configuration`] when the config is invalid, the
    /// file does not exist, or the schema has not been created yet; other open
    /// failures carry `SQLite` context.
    pub fn open_read_only(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        if !config.path.exists() {
            return Err(ThreadError::Configuration(format!(
                "post store not found at {}",
                config.path.display()
            ))
            .into());
        }

        let conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open post store at {}", config.path.display()))?;
        conn.busy_timeout(config.lookup_timeout())
            .context("failed to configure sqlite busy timeout")?;
        conn.execute_batch("PRAGMA query_only = ON;")
            .context("failed to configure sqlite pragmas")?;

        let store = Self { conn };
        if !store.is_initialized()? {
            return Err(ThreadError::Configuration(format!(
                "post store at {} has no schema; run `tv db migrate` first",
                config.path.display()
            ))
            .into());
        }
        tracing::debug!(path = %config.path.display(), "opened post store read-only");
        Ok(store)
    }

    /// Open or create a store that accepts migrations and imports.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open_writable(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let conn = Connection::open(&config.path)
            .with_context(|| format!("failed to open post store at {}", config.path.display()))?;
        conn.busy_timeout(config.lookup_timeout())
            .context("failed to configure sqlite busy timeout")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")
            .context("failed to configure sqlite pragmas")?;
        Ok(Self { conn })
    }

    /// # Errors
    /// Returns an error when the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        Ok(Self { conn })
    }

    /// # Errors
    /// Returns an error when migration metadata cannot be read.
    pub fn schema_version(&self) -> Result<i64> {
        if !table_exists(&self.conn, "schema_migrations")? {
            return Ok(0);
        }
        current_schema_version(&self.conn)
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;
        if version < 1 {
            let tx = self.conn.transaction().context("failed to start migration transaction")?;
            tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration 001")?;
            record_schema_version(&tx, 1)?;
            tx.commit().context("failed to commit migration 001")?;
            version = 1;
        }

        if version < 2 {
            self.apply_migration_2()?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }
        tracing::info!(version, "post store schema is current");
        Ok(())
    }

    fn apply_migration_2(&mut self) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start migration 002 transaction")?;
        tx.execute_batch(MIGRATION_002_SQL).context("failed to apply migration 002")?;

        let rows = dated_posts(&tx)?;
        for (id, created_at) in rows {
            tx.execute(
                "UPDATE posts SET created_sort_key = ?1 WHERE id = ?2",
                params![sort_key(&id, Some(created_at.as_str())), id],
            )
            .with_context(|| format!("failed to backfill sort key for post {id}"))?;
        }

        record_schema_version(&tx, 2)?;
        tx.commit().context("failed to commit migration 002")?;
        Ok(())
    }

    /// Store one raw post document, replacing any earlier copy with the same id.
    /// Returns `true` when an existing document was replaced.
    ///
    /// # Errors
    /// Returns an error when the document has no usable id or the write fails.
    pub fn insert_document(&mut self, document: &Value) -> Result<bool> {
        let tx = self.conn.transaction().context("failed to start transaction")?;
        let replaced = insert_document_tx(&tx, document)?;
        tx.commit().context("failed to commit document write")?;
        Ok(replaced)
    }

    /// Load newline-delimited JSON post documents from `path` in one transaction.
    /// Lines that are not usable post documents are skipped and counted.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or the transaction fails.
    pub fn import_ndjson(&mut self, path: &Path) -> Result<ImportSummary> {
        let file = File::open(path)
            .with_context(|| format!("failed to open import file {}", path.display()))?;
        let reader = BufReader::new(file);
        let tx = self.conn.transaction().context("failed to start import transaction")?;
        let mut summary = ImportSummary::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let document = match serde_json::from_str::<Value>(&line) {
                Ok(document) => document,
                Err(err) => {
                    tracing::warn!(line = index + 1, error = %err, "skipping invalid JSON line");
                    summary.skipped_invalid += 1;
                    continue;
                }
            };
            match insert_document_tx(&tx, &document) {
                Ok(true) => summary.replaced += 1,
                Ok(false) => summary.imported += 1,
                Err(err) => {
                    tracing::warn!(line = index + 1, error = %err, "skipping unusable post document");
                    summary.skipped_invalid += 1;
                }
            }
        }

        tx.commit().context("failed to commit import transaction")?;
        tracing::info!(
            imported = summary.imported,
            replaced = summary.replaced,
            skipped = summary.skipped_invalid,
            "import finished"
        );
        Ok(summary)
    }

    fn is_initialized(&self) -> Result<bool> {
        table_exists(&self.conn, "posts")
    }

    fn fetch_document(&self, id: &str) -> Result<Option<String>> {
        self.conn
            .query_row(SELECT_BY_ID_SQL, params![id], |row| row.get::<_, String>(0))
            .optional()
            .with_context(|| format!("failed to look up post {id}"))
    }

    fn scan_posts<P: Params>(&self, sql: &str, query_params: P) -> Result<Vec<Post>> {
        let mut stmt = self.conn.prepare_cached(sql).context("failed to prepare range scan")?;
        let mut rows = stmt.query(query_params).context("failed to run range scan")?;
        let mut posts = Vec::new();

        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let document: String = row.get(1)?;
            match Post::from_json_str(&document) {
                Ok(post) => posts.push(post),
                Err(err) => {
                    tracing::warn!(post_id = %id, error = %err, "skipping unreadable seed document");
                }
            }
        }

        Ok(posts)
    }
}

impl PostSource for SqliteStore {
    fn get_by_id(&self, id: &str) -> Result<Option<Post>, ThreadError> {
        if id.trim().is_empty() {
            return Err(ThreadError::Validation("post id MUST be non-empty".to_string()));
        }
        let document = self.fetch_document(id).map_err(connectivity)?;
        document.map(|raw| Post::from_json_str(&raw)).transpose()
    }

    fn latest(&self, limit: Limit) -> Result<Vec<Post>, ThreadError> {
        self.scan_posts(SELECT_LATEST_SQL, params![i64::from(limit.get())]).map_err(connectivity)
    }

    fn latest_by_author(
        &self,
        handle: &AuthorHandle,
        limit: Limit,
    ) -> Result<Vec<Post>, ThreadError> {
        self.scan_posts(SELECT_LATEST_BY_AUTHOR_SQL, params![handle.as_str(), i64::from(limit.get())])
            .map_err(connectivity)
    }
}

fn connectivity(err: anyhow::Error) -> ThreadError {
    ThreadError::Connectivity(format!("{err:#}"))
}

fn insert_document_tx(tx: &rusqlite::Transaction<'_>, document: &Value) -> Result<bool> {
    let post = Post::from_document(document.clone())
        .map_err(|err| anyhow!("post document rejected: {err}"))?;
    let existed = tx
        .query_row("SELECT 1 FROM posts WHERE id = ?1", params![post.id], |_| Ok(()))
        .optional()
        .context("failed to check for existing post")?
        .is_some();

    tx.execute(
        "INSERT OR REPLACE INTO posts(
           id, author_username, created_at, created_sort_key, document_json
         ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            post.id,
            post.author.username,
            post.created_at,
            sort_key(&post.id, post.created_at.as_deref()),
            serde_json::to_string(document).context("failed to serialize post document")?,
        ],
    )
    .with_context(|| format!("failed to write post {}", post.id))?;
    Ok(existed)
}

fn dated_posts(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare("SELECT id, created_at FROM posts WHERE created_at IS NOT NULL")
        .context("failed to prepare timestamp backfill scan")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .context("failed to run timestamp backfill scan")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to read timestamp backfill rows")?;
    Ok(rows)
}

/// Unparseable or absent timestamps get no key and sort after every dated post.
fn sort_key(post_id: &str, created_at: Option<&str>) -> Option<String> {
    match sortable_timestamp(created_at?) {
        Ok(key) => Some(key),
        Err(err) => {
            tracing::warn!(post_id, error = %err, "post will sort after dated posts");
            None
        }
    }
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now_rfc3339()?],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table_name],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if table exists: {table_name}"))?;
    Ok(exists == 1)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    use serde_json::json;
    use thread_view_core::{
        render_cycle, RenderOptions, SelectionMode, ThreadStop, DEFAULT_LIMIT,
    };

    use super::*;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|err| panic!("clock should be >= UNIX_EPOCH: {err}"))
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{now}"));
        fs::create_dir_all(&dir)
            .unwrap_or_else(|err| panic!("failed to create temp dir {}: {err}", dir.display()));
        dir
    }

    fn doc(id: &str, username: &str, created_at: &str, replied_to: Option<&str>) -> Value {
        let mut value = json!({
            "id": id,
            "text": format!("text of {id}"),
            "created_at": created_at,
            "author": { "username": username, "name": username.to_uppercase() }
        });
        if let Some(parent) = replied_to {
            value["referenced_tweets"] = json!([{ "type": "replied_to", "id": parent }]);
        }
        value
    }

    fn seeded_store(documents: &[Value]) -> Result<SqliteStore> {
        let mut store = SqliteStore::open_in_memory()?;
        store.migrate()?;
        for document in documents {
            store.insert_document(document)?;
        }
        Ok(store)
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|post| post.id.as_str()).collect()
    }

    #[test]
    fn migrate_is_idempotent() -> Result<()> {
        let mut store = SqliteStore::open_in_memory()?;
        assert_eq!(store.schema_version()?, 0);
        store.migrate()?;
        store.migrate()?;
        assert_eq!(store.schema_version()?, LATEST_SCHEMA_VERSION);
        Ok(())
    }

    #[test]
    fn point_lookup_returns_post_or_none() -> Result<()> {
        let store = seeded_store(&[doc("1", "alice", "2024-01-01T00:00:00.000Z", None)])?;

        let found = store.get_by_id("1")?;
        assert_eq!(found.map(|post| post.text), Some("text of 1".to_string()));
        assert_eq!(store.get_by_id("2")?, None);
        assert_eq!(store.get_by_id("' OR '1'='1")?, None);
        assert!(matches!(store.get_by_id(""), Err(ThreadError::Validation(_))));
        Ok(())
    }

    #[test]
    fn latest_orders_by_time_then_id() -> Result<()> {
        let store = seeded_store(&[
            doc("b", "alice", "2024-01-01T12:00:00.000Z", None),
            doc("a", "bob", "2024-01-01T12:00:00.000Z", None),
            doc("c", "alice", "2024-01-02T08:00:00.000Z", None),
            doc("d", "bob", "2023-12-31T23:59:59.999Z", None),
        ])?;

        assert_eq!(ids(&store.latest(Limit::default())?), vec!["c", "a", "b", "d"]);
        assert_eq!(ids(&store.latest(Limit::new(2)?)?), vec!["c", "a"]);
        Ok(())
    }

    #[test]
    fn latest_by_author_filters_exact_handle() -> Result<()> {
        let store = seeded_store(&[
            doc("1", "alice", "2024-01-01T00:00:00.000Z", None),
            doc("2", "bob", "2024-01-02T00:00:00.000Z", None),
            doc("3", "alice", "2024-01-03T00:00:00.000Z", None),
            doc("4", "alice2", "2024-01-04T00:00:00.000Z", None),
        ])?;

        let handle = AuthorHandle::parse("@alice")?;
        assert_eq!(ids(&store.latest_by_author(&handle, Limit::default())?), vec!["3", "1"]);
        assert_eq!(ids(&store.latest_by_author(&handle, Limit::new(1)?)?), vec!["3"]);
        Ok(())
    }

    #[test]
    fn unreadable_documents_are_skipped_in_scans_and_reported_on_lookup() -> Result<()> {
        let store = seeded_store(&[doc("ok", "alice", "2024-01-01T00:00:00.000Z", None)])?;
        store.conn.execute(
            "INSERT INTO posts(id, author_username, created_at, document_json) VALUES (?1, ?2, ?3, ?4)",
            params!["bad", "alice", "2024-02-01T00:00:00.000Z", "{\"text\": \"no id\"}"],
        )?;

        assert_eq!(ids(&store.latest(Limit::default())?), vec!["ok"]);
        assert!(matches!(store.get_by_id("bad"), Err(ThreadError::Format(_))));
        Ok(())
    }

    #[test]
    fn insert_replaces_existing_document() -> Result<()> {
        let mut store = seeded_store(&[doc("1", "alice", "2024-01-01T00:00:00.000Z", None)])?;
        let mut updated = doc("1", "alice", "2024-01-01T00:00:00.000Z", None);
        updated["text"] = json!("edited");

        assert!(store.insert_document(&updated)?);
        assert_eq!(store.get_by_id("1")?.map(|post| post.text), Some("edited".to_string()));
        assert!(store.insert_document(&json!({ "text": "no id" })).is_err());
        Ok(())
    }

    #[test]
    fn render_cycle_over_sqlite_truncates_at_missing_ancestors() -> Result<()> {
        let store = seeded_store(&[
            doc("b", "alice", "2024-01-01T01:00:00.000Z", Some("a")),
            doc("c", "bob", "2024-01-01T02:00:00.000Z", Some("b")),
        ])?;
        let mode = SelectionMode::Latest { limit: Limit::new(1)? };
        let output = render_cycle(&store, &mode, RenderOptions::default())?;

        let thread = &output.threads[0];
        assert_eq!(thread.posts.iter().map(|post| post.id.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(thread.stop, ThreadStop::MissingAncestor { id: "a".to_string() });
        assert_eq!(
            thread.posts[0].replying_to.as_ref().map(|note| note.username.as_str()),
            Some("bob")
        );
        Ok(())
    }

    #[test]
    fn mixed_precision_timestamps_sort_by_instant() -> Result<()> {
        let store = seeded_store(&[
            doc("early", "alice", "2024-01-01T00:00:00.1Z", None),
            doc("later", "alice", "2024-01-01T00:00:00.15Z", None),
            doc("b-same", "alice", "2024-01-01T00:00:00.10Z", None),
            doc("undated", "alice", "sometime", None),
        ])?;

        assert_eq!(
            ids(&store.latest(Limit::default())?),
            vec!["later", "b-same", "early", "undated"]
        );
        Ok(())
    }

    #[test]
    fn migration_002_backfills_sort_keys_for_v1_stores() -> Result<()> {
        let mut store = SqliteStore::open_in_memory()?;
        store.conn.execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)?;
        store.conn.execute_batch(MIGRATION_001_SQL)?;
        record_schema_version(&store.conn, 1)?;
        for (id, created_at) in [("early", "2024-01-01T00:00:00.1Z"), ("later", "2024-01-01T00:00:00.15Z")] {
            let document = doc(id, "alice", created_at, None);
            store.conn.execute(
                "INSERT INTO posts(id, author_username, created_at, document_json) VALUES (?1, ?2, ?3, ?4)",
                params![id, "alice", created_at, document.to_string()],
            )?;
        }

        store.migrate()?;

        assert_eq!(store.schema_version()?, 2);
        assert_eq!(ids(&store.latest(Limit::default())?), vec!["later", "early"]);
        Ok(())
    }

    #[test]
    fn wrongly_typed_fields_do_not_hide_posts() -> Result<()> {
        let mut store = seeded_store(&[])?;
        store.insert_document(&json!({
            "id": "1",
            "text": "hi",
            "created_at": "2024-01-01T00:00:00.000Z",
            "possibly_sensitive": "false",
            "author": { "username": "alice", "name": "Alice", "verified": "blue" }
        }))?;

        let handle = AuthorHandle::parse("alice")?;
        let posts = store.latest_by_author(&handle, Limit::default())?;
        assert_eq!(ids(&posts), vec!["1"]);
        assert_eq!(posts[0].author.name.as_deref(), Some("Alice"));
        assert_eq!(posts[0].possibly_sensitive, None);
        Ok(())
    }

    #[test]
    fn read_only_open_requires_existing_migrated_store() -> Result<()> {
        let dir = unique_temp_dir("thread-view-store");
        let config = StoreConfig { path: dir.join("posts.sqlite3"), ..StoreConfig::default() };

        let missing = SqliteStore::open_read_only(&config);
        assert!(matches!(
            missing.as_ref().map_err(|err| err.downcast_ref::<ThreadError>()),
            Err(Some(ThreadError::Configuration(_)))
        ));

        drop(SqliteStore::open_writable(&config)?);
        let unmigrated = SqliteStore::open_read_only(&config);
        assert!(matches!(
            unmigrated.as_ref().map_err(|err| err.downcast_ref::<ThreadError>()),
            Err(Some(ThreadError::Configuration(_)))
        ));

        {
            let mut store = SqliteStore::open_writable(&config)?;
            store.migrate()?;
            store.insert_document(&doc("1", "alice", "2024-01-01T00:00:00.000Z", None))?;
        }
        let store = SqliteStore::open_read_only(&config)?;
        assert_eq!(store.latest(Limit::default())?.len(), 1);
        assert!(store.conn.execute("DELETE FROM posts", []).is_err());

        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected() {
        let empty = StoreConfig { path: PathBuf::new(), ..StoreConfig::default() };
        assert!(matches!(empty.validate(), Err(ThreadError::Configuration(_))));

        let zero = StoreConfig { lookup_timeout_ms: 0, ..StoreConfig::default() };
        assert!(matches!(zero.validate(), Err(ThreadError::Configuration(_))));
        assert_eq!(StoreConfig::default().lookup_timeout_ms, DEFAULT_LOOKUP_TIMEOUT_MS);
        assert_eq!(Limit::default().get(), DEFAULT_LIMIT);
    }

    #[test]
    fn import_counts_new_replaced_and_invalid_lines() -> Result<()> {
        let dir = unique_temp_dir("thread-view-import");
        let path = dir.join("posts.ndjson");
        let lines = [
            doc("1", "alice", "2024-01-01T00:00:00.000Z", None).to_string(),
            String::new(),
            "{not json".to_string(),
            json!({ "text": "missing id" }).to_string(),
            doc("2", "bob", "2024-01-02T00:00:00.000Z", Some("1")).to_string(),
            doc("1", "alice", "2024-01-01T00:00:00.000Z", None).to_string(),
        ];
        fs::write(&path, lines.join("\n"))?;

        let mut store = SqliteStore::open_in_memory()?;
        store.migrate()?;
        let summary = store.import_ndjson(&path)?;

        assert_eq!(summary, ImportSummary { imported: 2, replaced: 1, skipped_invalid: 2 });
        assert_eq!(ids(&store.latest(Limit::default())?), vec!["2", "1"]);

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}

//! SQLite implementation of the relay store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::{
    EventInsertOutcome, EventRecord, EvidenceRecord, RelayStoreError, RollingCommentRow,
    StoreCounts, StoreResult,
};

/// Durable store backend. Connections are opened per operation; WAL plus a
/// busy timeout provides cross-handler serialization.
#[derive(Debug, Clone)]
pub struct SqliteRelayStore {
    db_path: PathBuf,
}

impl SqliteRelayStore {
    /// Creates a store at `path`, creating parent directories and schema if
    /// needed.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path };
        let connection = store.open_connection()?;
        store.initialize_schema(&connection)?;
        Ok(store)
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }

    fn initialize_schema(&self, connection: &Connection) -> StoreResult<()> {
        connection.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                event_id TEXT PRIMARY KEY,
                repo TEXT NOT NULL,
                issue_number INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                role TEXT NOT NULL,
                agent TEXT NOT NULL,
                environment TEXT NULL,
                overall_verdict TEXT NULL,
                created_at TEXT NOT NULL,
                payload_hash TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_issue_created
                ON events (repo, issue_number, created_at);

            CREATE INDEX IF NOT EXISTS idx_events_issue_type
                ON events (repo, issue_number, event_type, created_at);

            CREATE TABLE IF NOT EXISTS rolling_comments (
                repo TEXT NOT NULL,
                issue_number INTEGER NOT NULL,
                comment_id INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (repo, issue_number)
            );

            CREATE TABLE IF NOT EXISTS evidence (
                id TEXT PRIMARY KEY,
                repo TEXT NOT NULL,
                issue_number INTEGER NOT NULL,
                event_id TEXT NULL,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                object_key TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evidence_issue
                ON evidence (repo, issue_number);

            -- Declared for a future approval workflow; no code path writes
            -- or reads this table yet.
            CREATE TABLE IF NOT EXISTS approvals (
                approval_id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo TEXT NOT NULL,
                issue_number INTEGER NOT NULL,
                event_id TEXT NULL,
                verdict TEXT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Idempotent insert protocol. An immediate transaction serializes
    /// writers racing on the same `event_id`: exactly one inserts, the rest
    /// observe the row and resolve to `Idempotent` or `Conflict`.
    pub fn insert_event(&self, record: &EventRecord) -> StoreResult<EventInsertOutcome> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing_hash: Option<String> = transaction
            .query_row(
                "SELECT payload_hash FROM events WHERE event_id = ?1",
                params![record.event_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing_hash) = existing_hash {
            transaction.commit()?;
            if existing_hash == record.payload_hash {
                return Ok(EventInsertOutcome::Idempotent);
            }
            return Ok(EventInsertOutcome::Conflict { existing_hash });
        }

        transaction.execute(
            r#"
            INSERT INTO events (
                event_id, repo, issue_number, event_type, role, agent,
                environment, overall_verdict, created_at, payload_hash, payload_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.event_id,
                record.repo,
                u64_to_db("issue_number", record.issue_number)?,
                record.event_type,
                record.role,
                record.agent,
                record.environment,
                record.overall_verdict,
                record.created_at,
                record.payload_hash,
                record.payload_json,
            ],
        )?;
        transaction.commit()?;
        Ok(EventInsertOutcome::Inserted)
    }

    pub fn get_event(&self, event_id: &str) -> StoreResult<Option<EventRecord>> {
        let connection = self.open_connection()?;
        connection
            .query_row(
                &format!("{EVENT_SELECT} WHERE event_id = ?1"),
                params![event_id],
                row_to_event,
            )
            .optional()
            .map_err(RelayStoreError::from)
    }

    /// Newest event of an exact type for an issue.
    pub fn latest_event_by_type(
        &self,
        repo: &str,
        issue_number: u64,
        event_type: &str,
    ) -> StoreResult<Option<EventRecord>> {
        let connection = self.open_connection()?;
        connection
            .query_row(
                &format!(
                    "{EVENT_SELECT}
                     WHERE repo = ?1 AND issue_number = ?2 AND event_type = ?3
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1"
                ),
                params![repo, u64_to_db("issue_number", issue_number)?, event_type],
                row_to_event,
            )
            .optional()
            .map_err(RelayStoreError::from)
    }

    /// Newest event whose type starts with `prefix` (e.g. the `dev.` or
    /// `qa.` family) for an issue.
    pub fn latest_event_by_type_prefix(
        &self,
        repo: &str,
        issue_number: u64,
        prefix: &str,
    ) -> StoreResult<Option<EventRecord>> {
        let connection = self.open_connection()?;
        connection
            .query_row(
                &format!(
                    "{EVENT_SELECT}
                     WHERE repo = ?1 AND issue_number = ?2
                       AND substr(event_type, 1, length(?3)) = ?3
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1"
                ),
                params![repo, u64_to_db("issue_number", issue_number)?, prefix],
                row_to_event,
            )
            .optional()
            .map_err(RelayStoreError::from)
    }

    /// Newest-first slice of an issue's event log.
    pub fn recent_events(
        &self,
        repo: &str,
        issue_number: u64,
        limit: usize,
    ) -> StoreResult<Vec<EventRecord>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(&format!(
            "{EVENT_SELECT}
             WHERE repo = ?1 AND issue_number = ?2
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?3"
        ))?;
        let mut rows = statement.query(params![
            repo,
            u64_to_db("issue_number", issue_number)?,
            limit as i64
        ])?;

        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(row_to_event(row)?);
        }
        Ok(events)
    }

    pub fn rolling_comment(
        &self,
        repo: &str,
        issue_number: u64,
    ) -> StoreResult<Option<RollingCommentRow>> {
        let connection = self.open_connection()?;
        connection
            .query_row(
                "SELECT comment_id, updated_at FROM rolling_comments
                 WHERE repo = ?1 AND issue_number = ?2",
                params![repo, u64_to_db("issue_number", issue_number)?],
                |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                },
            )
            .optional()?
            .map(|(comment_id, updated_at)| {
                Ok(RollingCommentRow {
                    comment_id: i64_to_u64("comment_id", comment_id)?,
                    updated_at,
                })
            })
            .transpose()
    }

    /// Records (or refreshes) the marker comment id for an issue.
    pub fn upsert_rolling_comment(
        &self,
        repo: &str,
        issue_number: u64,
        comment_id: u64,
        updated_at: &str,
    ) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            r#"
            INSERT INTO rolling_comments (repo, issue_number, comment_id, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(repo, issue_number) DO UPDATE SET
                comment_id = excluded.comment_id,
                updated_at = excluded.updated_at
            "#,
            params![
                repo,
                u64_to_db("issue_number", issue_number)?,
                u64_to_db("comment_id", comment_id)?,
                updated_at
            ],
        )?;
        Ok(())
    }

    pub fn insert_evidence(&self, record: &EvidenceRecord) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            r#"
            INSERT INTO evidence (
                id, repo, issue_number, event_id, filename, content_type,
                size_bytes, object_key, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.id,
                record.repo,
                u64_to_db("issue_number", record.issue_number)?,
                record.event_id,
                record.filename,
                record.content_type,
                u64_to_db("size_bytes", record.size_bytes)?,
                record.object_key,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_evidence(&self, id: &str) -> StoreResult<Option<EvidenceRecord>> {
        let connection = self.open_connection()?;
        connection
            .query_row(
                "SELECT id, repo, issue_number, event_id, filename, content_type,
                        size_bytes, object_key, created_at
                 FROM evidence WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?
            .map(
                |(
                    id,
                    repo,
                    issue_number,
                    event_id,
                    filename,
                    content_type,
                    size_bytes,
                    object_key,
                    created_at,
                )| {
                    Ok(EvidenceRecord {
                        id,
                        repo,
                        issue_number: i64_to_u64("issue_number", issue_number)?,
                        event_id,
                        filename,
                        content_type,
                        size_bytes: i64_to_u64("size_bytes", size_bytes)?,
                        object_key,
                        created_at,
                    })
                },
            )
            .transpose()
    }

    pub fn counts(&self) -> StoreResult<StoreCounts> {
        let connection = self.open_connection()?;
        let events: i64 =
            connection.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        let rolling_comments: i64 =
            connection.query_row("SELECT COUNT(*) FROM rolling_comments", [], |row| {
                row.get(0)
            })?;
        let evidence: i64 =
            connection.query_row("SELECT COUNT(*) FROM evidence", [], |row| row.get(0))?;
        Ok(StoreCounts {
            events: i64_to_u64("events_count", events)?,
            rolling_comments: i64_to_u64("rolling_comments_count", rolling_comments)?,
            evidence: i64_to_u64("evidence_count", evidence)?,
        })
    }
}

const EVENT_SELECT: &str = "SELECT event_id, repo, issue_number, event_type, role, agent,
        environment, overall_verdict, created_at, payload_hash, payload_json
 FROM events";

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        event_id: row.get(0)?,
        repo: row.get(1)?,
        issue_number: row.get::<_, i64>(2)?.max(0) as u64,
        event_type: row.get(3)?,
        role: row.get(4)?,
        agent: row.get(5)?,
        environment: row.get(6)?,
        overall_verdict: row.get(7)?,
        created_at: row.get(8)?,
        payload_hash: row.get(9)?,
        payload_json: row.get(10)?,
    })
}

fn u64_to_db(field: &'static str, value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| RelayStoreError::InvalidPersistedValue {
        field,
        value: value.to_string(),
    })
}

fn i64_to_u64(field: &'static str, value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| RelayStoreError::InvalidPersistedValue {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::SqliteRelayStore;
    use crate::{EventInsertOutcome, EventRecord, EvidenceRecord};

    fn event(event_id: &str, event_type: &str, created_at: &str, hash: &str) -> EventRecord {
        EventRecord {
            event_id: event_id.to_string(),
            repo: "acme/web".to_string(),
            issue_number: 42,
            event_type: event_type.to_string(),
            role: "QA".to_string(),
            agent: "qa-bot".to_string(),
            environment: Some("preview".to_string()),
            overall_verdict: Some("PASS".to_string()),
            created_at: created_at.to_string(),
            payload_hash: hash.to_string(),
            payload_json: format!("{{\"event_id\":\"{event_id}\"}}"),
        }
    }

    #[test]
    fn functional_insert_protocol_is_idempotent_then_conflicting() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteRelayStore::new(temp.path().join("relay.sqlite")).expect("store");

        let first = event("evt-00000001", "qa.result_submitted", "2026-01-01T00:00:01Z", "hash-a");
        assert_eq!(
            store.insert_event(&first).expect("insert"),
            EventInsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_event(&first).expect("replay"),
            EventInsertOutcome::Idempotent
        );

        let mut conflicting = first.clone();
        conflicting.payload_hash = "hash-b".to_string();
        assert_eq!(
            store.insert_event(&conflicting).expect("conflict"),
            EventInsertOutcome::Conflict {
                existing_hash: "hash-a".to_string()
            }
        );

        let stored = store
            .get_event("evt-00000001")
            .expect("lookup")
            .expect("row exists");
        assert_eq!(stored.payload_hash, "hash-a");
    }

    #[test]
    fn functional_latest_queries_order_by_recency() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteRelayStore::new(temp.path().join("relay.sqlite")).expect("store");

        for (id, kind, at) in [
            ("evt-00000001", "dev.update", "2026-01-01T00:00:01Z"),
            ("evt-00000002", "qa.result_submitted", "2026-01-01T00:00:02Z"),
            ("evt-00000003", "dev.update", "2026-01-01T00:00:03Z"),
            ("evt-00000004", "qa.retest", "2026-01-01T00:00:04Z"),
        ] {
            store
                .insert_event(&event(id, kind, at, id))
                .expect("insert");
        }

        let latest_dev = store
            .latest_event_by_type_prefix("acme/web", 42, "dev.")
            .expect("query")
            .expect("present");
        assert_eq!(latest_dev.event_id, "evt-00000003");

        let latest_qa = store
            .latest_event_by_type_prefix("acme/web", 42, "qa.")
            .expect("query")
            .expect("present");
        assert_eq!(latest_qa.event_id, "evt-00000004");

        let exact = store
            .latest_event_by_type("acme/web", 42, "qa.result_submitted")
            .expect("query")
            .expect("present");
        assert_eq!(exact.event_id, "evt-00000002");

        let recent = store.recent_events("acme/web", 42, 3).expect("recent");
        let ids: Vec<&str> = recent.iter().map(|row| row.event_id.as_str()).collect();
        assert_eq!(ids, vec!["evt-00000004", "evt-00000003", "evt-00000002"]);

        assert!(store
            .latest_event_by_type_prefix("acme/web", 7, "dev.")
            .expect("other issue")
            .is_none());
    }

    #[test]
    fn regression_same_second_inserts_keep_insertion_order() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteRelayStore::new(temp.path().join("relay.sqlite")).expect("store");
        let at = "2026-01-01T00:00:01Z";
        for id in ["evt-00000001", "evt-00000002"] {
            store
                .insert_event(&event(id, "dev.update", at, id))
                .expect("insert");
        }
        let latest = store
            .latest_event_by_type_prefix("acme/web", 42, "dev.")
            .expect("query")
            .expect("present");
        assert_eq!(latest.event_id, "evt-00000002");
    }

    #[test]
    fn functional_rolling_comment_mapping_upserts_in_place() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteRelayStore::new(temp.path().join("relay.sqlite")).expect("store");

        assert!(store
            .rolling_comment("acme/web", 42)
            .expect("empty lookup")
            .is_none());

        store
            .upsert_rolling_comment("acme/web", 42, 501, "2026-01-01T00:00:01Z")
            .expect("insert mapping");
        store
            .upsert_rolling_comment("acme/web", 42, 777, "2026-01-01T00:00:02Z")
            .expect("replace mapping");

        let row = store
            .rolling_comment("acme/web", 42)
            .expect("lookup")
            .expect("row");
        assert_eq!(row.comment_id, 777);
        assert_eq!(row.updated_at, "2026-01-01T00:00:02Z");
        assert_eq!(store.counts().expect("counts").rolling_comments, 1);
    }

    #[test]
    fn functional_evidence_index_round_trips() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteRelayStore::new(temp.path().join("relay.sqlite")).expect("store");

        let record = EvidenceRecord {
            id: "5f0c23aa-3f11-4a39-9e55-000000000001".to_string(),
            repo: "acme/web".to_string(),
            issue_number: 42,
            event_id: Some("evt-00000001".to_string()),
            filename: "trace.log".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 42,
            object_key: "evidence/acme/web/issue-42/5f0c23aa-3f11-4a39-9e55-000000000001/trace.log"
                .to_string(),
            created_at: "2026-01-01T00:00:01Z".to_string(),
        };
        store.insert_evidence(&record).expect("insert evidence");

        let loaded = store
            .get_evidence(&record.id)
            .expect("lookup")
            .expect("row");
        assert_eq!(loaded, record);
        assert!(store.get_evidence("missing").expect("lookup").is_none());
    }

    #[test]
    fn regression_store_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let db_path = temp.path().join("relay.sqlite");
        {
            let store = SqliteRelayStore::new(&db_path).expect("store");
            store
                .insert_event(&event(
                    "evt-00000001",
                    "dev.update",
                    "2026-01-01T00:00:01Z",
                    "hash-a",
                ))
                .expect("insert");
        }
        let reopened = SqliteRelayStore::new(&db_path).expect("reopen");
        assert_eq!(reopened.counts().expect("counts").events, 1);
        assert!(reopened
            .get_event("evt-00000001")
            .expect("lookup")
            .is_some());
    }
}

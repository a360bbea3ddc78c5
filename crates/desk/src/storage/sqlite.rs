//! SQLite-based dashboard storage

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use rusqlite_migration::{M, Migrations};

use super::traits::{DeskStore, MAX_CACHED_MESSAGES};
use crate::models::{
    CachedMessage, EmailAddress, EmailPreferences, LabelCount, LabelRecord, MessageId,
    PreferencesUpdate, SlaEmail, SlaLabel, StatsSnapshot, SyncStatus,
};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Sync state, message cache, label associations
        M::up(
            r#"
            -- Sync progress per user account
            CREATE TABLE sync_status (
                user_email TEXT PRIMARY KEY,
                history_id TEXT,
                last_sync_at TEXT NOT NULL,
                sync_errors INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                watch_expiration TEXT,
                historical_import_completed INTEGER NOT NULL DEFAULT 0,
                historical_import_started_at TEXT,
                historical_import_completed_at TEXT,
                historical_import_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Bounded per-user message cache
            CREATE TABLE cached_messages (
                user_email TEXT NOT NULL,
                id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                snippet TEXT NOT NULL,
                from_name TEXT,
                from_email TEXT NOT NULL,
                subject TEXT NOT NULL,
                received_at TEXT,
                display_date TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 1,
                has_attachments INTEGER NOT NULL DEFAULT 0,
                label_ids TEXT NOT NULL DEFAULT '[]',  -- JSON array
                is_starred INTEGER NOT NULL DEFAULT 0,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (user_email, id)
            );

            CREATE INDEX idx_cached_messages_cached_at
                ON cached_messages(user_email, cached_at DESC);

            -- Label membership per message, label name denormalized
            CREATE TABLE label_emails (
                user_email TEXT NOT NULL,
                message_id TEXT NOT NULL,
                label_id TEXT NOT NULL,
                label_name TEXT NOT NULL,
                received_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_email, message_id, label_id)
            );

            CREATE INDEX idx_label_emails_label
                ON label_emails(user_email, label_id, received_date DESC);
            CREATE INDEX idx_label_emails_received
                ON label_emails(user_email, received_date DESC);

            -- Small key/value store for app state
            CREATE TABLE metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,  -- JSON
                updated_at TEXT NOT NULL
            );
            "#,
        ),
        // Migration 2: SLA tracking and local stars
        M::up(
            r#"
            -- SLA-tracked support mail, one row per (user, message)
            CREATE TABLE sla_emails (
                user_email TEXT NOT NULL,
                message_id TEXT NOT NULL,
                email_address TEXT NOT NULL,
                subject TEXT NOT NULL,
                body_preview TEXT NOT NULL,
                label TEXT NOT NULL,
                received_at TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                resolved_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_email, message_id)
            );

            CREATE INDEX idx_sla_emails_received
                ON sla_emails(user_email, received_at DESC);

            -- Locally tracked stars
            CREATE TABLE starred_emails (
                user_email TEXT NOT NULL,
                message_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_email, message_id)
            );
            "#,
        ),
        // Migration 3: Stats history and preferences
        M::up(
            r#"
            -- Mailbox stats snapshots, appended on each refresh
            CREATE TABLE gmail_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_email TEXT NOT NULL,
                total_inbox INTEGER NOT NULL DEFAULT 0,
                unread_inbox INTEGER NOT NULL DEFAULT 0,
                drafts INTEGER NOT NULL DEFAULT 0,
                sent INTEGER NOT NULL DEFAULT 0,
                spam INTEGER NOT NULL DEFAULT 0,
                custom_labels TEXT NOT NULL DEFAULT '[]',  -- JSON array
                created_at TEXT NOT NULL
            );

            CREATE INDEX idx_gmail_stats_user
                ON gmail_stats(user_email, created_at DESC);

            -- Dashboard preferences per user
            CREATE TABLE email_preferences (
                user_email TEXT PRIMARY KEY,
                sidebar_width INTEGER NOT NULL DEFAULT 280,
                sidebar_open INTEGER NOT NULL DEFAULT 1,
                selected_folder TEXT NOT NULL DEFAULT 'INBOX',
                load_external_images INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            "#,
        ),
    ])
}

/// Parse an RFC 3339 timestamp column, falling back to now
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_timestamp_opt(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_cached_message(row: &Row<'_>) -> rusqlite::Result<CachedMessage> {
    let label_ids_json: String = row.get(10)?;
    let label_ids: Vec<String> = serde_json::from_str(&label_ids_json).unwrap_or_default();
    let received_at: Option<String> = row.get(6)?;

    Ok(CachedMessage {
        id: MessageId::new(row.get::<_, String>(0)?),
        thread_id: row.get(1)?,
        snippet: row.get(2)?,
        from: EmailAddress {
            name: row.get(3)?,
            email: row.get(4)?,
        },
        subject: row.get(5)?,
        received_at: received_at.as_deref().and_then(parse_timestamp_opt),
        display_date: row.get(7)?,
        is_read: row.get(8)?,
        has_attachments: row.get(9)?,
        label_ids,
        is_starred: row.get(11)?,
        cached_at: parse_timestamp(&row.get::<_, String>(12)?),
    })
}

const CACHED_MESSAGE_COLUMNS: &str = "id, thread_id, snippet, from_name, from_email, subject,
        received_at, display_date, is_read, has_attachments, label_ids, is_starred, cached_at";

/// SQLite-based dashboard storage
///
/// A single connection guarded by a mutex; every trait method commits
/// independently.
pub struct SqliteDeskStore {
    conn: Mutex<Connection>,
}

impl SqliteDeskStore {
    /// Create a new SQLite store at the given database path
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // Configure SQLite for performance
        //
        // WAL (Write-Ahead Logging) mode:
        //   - Allows concurrent readers during writes
        //   - Faster writes (sequential IO vs random)
        //   - Better crash recovery
        //
        // SYNCHRONOUS = NORMAL:
        //   - Syncs at critical moments but not every transaction
        //   - Good balance of durability vs performance
        //   - Safe with WAL mode (WAL provides additional protection)
        //
        // cache_size = -64000:
        //   - Negative value = KB (64MB cache)
        //   - Keeps frequently accessed pages in memory
        //   - Reduces disk reads for repeated queries
        //
        // temp_store = MEMORY:
        //   - Temporary tables/indices stored in RAM
        //   - Faster sorting and temporary operations
        //
        // mmap_size = 256MB:
        //   - Memory-maps the database file
        //   - Faster reads by avoiding read() syscalls
        //   - OS page cache handles caching
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
            "#,
        )?;

        // Run migrations
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Load a SyncStatus from its row
    fn load_sync_status(&self, conn: &Connection, user_email: &str) -> Result<Option<SyncStatus>> {
        let row: Option<(
            String,
            Option<String>,
            String,
            i64,
            Option<String>,
            Option<String>,
            bool,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            String,
        )> = conn
            .query_row(
                "SELECT user_email, history_id, last_sync_at, sync_errors, last_error,
                        watch_expiration, historical_import_completed,
                        historical_import_started_at, historical_import_completed_at,
                        historical_import_error, created_at, updated_at
                 FROM sync_status WHERE user_email = ?",
                [user_email],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                        row.get(11)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            user_email,
            history_id,
            last_sync_at,
            sync_errors,
            last_error,
            watch_expiration,
            historical_import_completed,
            historical_import_started_at,
            historical_import_completed_at,
            historical_import_error,
            created_at,
            updated_at,
        )) = row
        else {
            return Ok(None);
        };

        Ok(Some(SyncStatus {
            user_email,
            history_id,
            last_sync_at: parse_timestamp(&last_sync_at),
            sync_errors,
            last_error,
            watch_expiration: watch_expiration.as_deref().and_then(parse_timestamp_opt),
            historical_import_completed,
            historical_import_started_at: historical_import_started_at
                .as_deref()
                .and_then(parse_timestamp_opt),
            historical_import_completed_at: historical_import_completed_at
                .as_deref()
                .and_then(parse_timestamp_opt),
            historical_import_error,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        }))
    }

    /// Load stored preferences, None when the user has no row yet
    fn load_preferences(
        &self,
        conn: &Connection,
        user_email: &str,
    ) -> Result<Option<EmailPreferences>> {
        let row = conn
            .query_row(
                "SELECT user_email, sidebar_width, sidebar_open, selected_folder,
                        load_external_images
                 FROM email_preferences WHERE user_email = ?",
                [user_email],
                |row| {
                    Ok(EmailPreferences {
                        user_email: row.get(0)?,
                        sidebar_width: row.get(1)?,
                        sidebar_open: row.get(2)?,
                        selected_folder: row.get(3)?,
                        load_external_images: row.get(4)?,
                    })
                },
            )
            .optional()?;

        Ok(row)
    }

    /// Delete cache entries beyond the per-user cap, oldest cached first
    fn evict_cached_messages(&self, conn: &Connection, user_email: &str) -> Result<()> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cached_messages WHERE user_email = ?",
            [user_email],
            |row| row.get(0),
        )?;

        let excess = count - MAX_CACHED_MESSAGES as i64;
        if excess > 0 {
            conn.execute(
                "DELETE FROM cached_messages
                 WHERE user_email = ?1 AND id IN (
                    SELECT id FROM cached_messages
                    WHERE user_email = ?1
                    ORDER BY cached_at ASC, id ASC
                    LIMIT ?2
                 )",
                params![user_email, excess],
            )?;
        }

        Ok(())
    }
}

impl DeskStore for SqliteDeskStore {
    // === Sync Status ===

    fn get_sync_status(&self, user_email: &str) -> Result<Option<SyncStatus>> {
        let conn = self.conn.lock().unwrap();
        self.load_sync_status(&conn, user_email)
    }

    fn upsert_sync_status(
        &self,
        user_email: &str,
        history_id: &str,
        watch_expiration: Option<DateTime<Utc>>,
    ) -> Result<SyncStatus> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        // The import flags keep their existing values on conflict, and a
        // missing watch expiration keeps the stored one.
        conn.execute(
            "INSERT INTO sync_status
             (user_email, history_id, last_sync_at, sync_errors, last_error,
              watch_expiration, created_at, updated_at)
             VALUES (?, ?, ?, 0, NULL, ?, ?, ?)
             ON CONFLICT(user_email) DO UPDATE SET
                history_id = excluded.history_id,
                last_sync_at = excluded.last_sync_at,
                sync_errors = 0,
                last_error = NULL,
                watch_expiration = COALESCE(excluded.watch_expiration, watch_expiration),
                updated_at = excluded.updated_at",
            params![
                user_email,
                history_id,
                now,
                watch_expiration.map(|dt| dt.to_rfc3339()),
                now,
                now
            ],
        )?;

        self.load_sync_status(&conn, user_email)?
            .context("Sync status missing after upsert")
    }

    fn update_history_id(&self, user_email: &str, history_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE sync_status
             SET history_id = ?, last_sync_at = ?, sync_errors = 0, last_error = NULL,
                 updated_at = ?
             WHERE user_email = ?",
            params![history_id, now, now, user_email],
        )?;

        Ok(())
    }

    fn record_sync_error(&self, user_email: &str, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE sync_status
             SET sync_errors = sync_errors + 1, last_error = ?, updated_at = ?
             WHERE user_email = ?",
            params![error, Utc::now().to_rfc3339(), user_email],
        )?;

        Ok(())
    }

    fn update_watch_expiration(&self, user_email: &str, expiration: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE sync_status SET watch_expiration = ?, updated_at = ? WHERE user_email = ?",
            params![
                expiration.to_rfc3339(),
                Utc::now().to_rfc3339(),
                user_email
            ],
        )?;

        Ok(())
    }

    fn mark_import_started(&self, user_email: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE sync_status
             SET historical_import_started_at = ?, historical_import_error = NULL,
                 updated_at = ?
             WHERE user_email = ?",
            params![now, now, user_email],
        )?;

        Ok(())
    }

    fn mark_import_completed(&self, user_email: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE sync_status
             SET historical_import_completed = 1, historical_import_completed_at = ?,
                 historical_import_error = NULL, updated_at = ?
             WHERE user_email = ?",
            params![now, now, user_email],
        )?;

        Ok(())
    }

    fn record_import_error(&self, user_email: &str, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE sync_status SET historical_import_error = ?, updated_at = ?
             WHERE user_email = ?",
            params![error, Utc::now().to_rfc3339(), user_email],
        )?;

        Ok(())
    }

    // === Cached Messages ===

    fn cache_messages(&self, user_email: &str, messages: &[CachedMessage]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut stmt = tx.prepare(
            "INSERT INTO cached_messages
             (user_email, id, thread_id, snippet, from_name, from_email, subject,
              received_at, display_date, is_read, has_attachments, label_ids,
              is_starred, cached_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_email, id) DO UPDATE SET
                thread_id = excluded.thread_id,
                snippet = excluded.snippet,
                from_name = excluded.from_name,
                from_email = excluded.from_email,
                subject = excluded.subject,
                received_at = excluded.received_at,
                display_date = excluded.display_date,
                is_read = excluded.is_read,
                has_attachments = excluded.has_attachments,
                label_ids = excluded.label_ids,
                is_starred = excluded.is_starred,
                cached_at = excluded.cached_at",
        )?;

        for message in messages {
            stmt.execute(params![
                user_email,
                message.id.as_str(),
                message.thread_id,
                message.snippet,
                message.from.name,
                message.from.email,
                message.subject,
                message.received_at.map(|dt| dt.to_rfc3339()),
                message.display_date,
                message.is_read,
                message.has_attachments,
                serde_json::to_string(&message.label_ids)?,
                message.is_starred,
                message.cached_at.to_rfc3339(),
            ])?;
        }
        drop(stmt);

        self.evict_cached_messages(&tx, user_email)?;

        tx.commit()?;
        Ok(())
    }

    fn get_cached_messages(&self, user_email: &str, limit: usize) -> Result<Vec<CachedMessage>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {CACHED_MESSAGE_COLUMNS}
             FROM cached_messages WHERE user_email = ?
             ORDER BY cached_at DESC, id DESC
             LIMIT ?"
        ))?;

        let messages = stmt
            .query_map(params![user_email, limit as i64], |row| {
                row_to_cached_message(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    fn get_cached_message(
        &self,
        user_email: &str,
        id: &MessageId,
    ) -> Result<Option<CachedMessage>> {
        let conn = self.conn.lock().unwrap();

        let message = conn
            .query_row(
                &format!(
                    "SELECT {CACHED_MESSAGE_COLUMNS}
                     FROM cached_messages WHERE user_email = ? AND id = ?"
                ),
                params![user_email, id.as_str()],
                |row| row_to_cached_message(row),
            )
            .optional()?;

        Ok(message)
    }

    fn update_cached_message(&self, user_email: &str, message: &CachedMessage) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let changed = conn.execute(
            "UPDATE cached_messages
             SET thread_id = ?, snippet = ?, from_name = ?, from_email = ?, subject = ?,
                 received_at = ?, display_date = ?, is_read = ?, has_attachments = ?,
                 label_ids = ?, is_starred = ?, cached_at = ?
             WHERE user_email = ? AND id = ?",
            params![
                message.thread_id,
                message.snippet,
                message.from.name,
                message.from.email,
                message.subject,
                message.received_at.map(|dt| dt.to_rfc3339()),
                message.display_date,
                message.is_read,
                message.has_attachments,
                serde_json::to_string(&message.label_ids)?,
                message.is_starred,
                Utc::now().to_rfc3339(),
                user_email,
                message.id.as_str(),
            ],
        )?;

        Ok(changed > 0)
    }

    fn update_cached_labels(
        &self,
        user_email: &str,
        id: &MessageId,
        label_ids: &[String],
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let is_read = !label_ids.iter().any(|l| l.as_str() == "UNREAD");
        let is_starred = label_ids.iter().any(|l| l.as_str() == "STARRED");

        let changed = conn.execute(
            "UPDATE cached_messages
             SET label_ids = ?, is_read = ?, is_starred = ?, cached_at = ?
             WHERE user_email = ? AND id = ?",
            params![
                serde_json::to_string(label_ids)?,
                is_read,
                is_starred,
                Utc::now().to_rfc3339(),
                user_email,
                id.as_str(),
            ],
        )?;

        Ok(changed > 0)
    }

    fn remove_cached_message(&self, user_email: &str, id: &MessageId) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM cached_messages WHERE user_email = ? AND id = ?",
            params![user_email, id.as_str()],
        )?;

        Ok(())
    }

    fn cached_count(&self, user_email: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cached_messages WHERE user_email = ?",
            [user_email],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    fn clear_cache(&self, user_email: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        match user_email {
            Some(user_email) => {
                conn.execute(
                    "DELETE FROM cached_messages WHERE user_email = ?",
                    [user_email],
                )?;
            }
            None => {
                conn.execute("DELETE FROM cached_messages", [])?;
            }
        }

        Ok(())
    }

    // === Metadata ===

    fn set_metadata(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO metadata (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn.lock().unwrap();

        let raw: Option<String> = conn
            .query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        raw.map(|s| {
            serde_json::from_str(&s).with_context(|| format!("Invalid metadata JSON for {}", key))
        })
        .transpose()
    }

    // === Label Records ===

    fn save_label_records(&self, user_email: &str, records: &[LabelRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut stmt = tx.prepare(
            "INSERT INTO label_emails
             (user_email, message_id, label_id, label_name, received_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_email, message_id, label_id) DO UPDATE SET
                label_name = excluded.label_name,
                received_date = excluded.received_date",
        )?;

        let now = Utc::now().to_rfc3339();
        for record in records {
            stmt.execute(params![
                user_email,
                record.message_id.as_str(),
                record.label_id,
                record.label_name,
                record.received_date.to_rfc3339(),
                now,
            ])?;
        }
        drop(stmt);

        tx.commit()?;
        Ok(())
    }

    fn bulk_save_label_records(&self, user_email: &str, records: &[LabelRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO label_emails
             (user_email, message_id, label_id, label_name, received_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;

        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;
        for record in records {
            inserted += stmt.execute(params![
                user_email,
                record.message_id.as_str(),
                record.label_id,
                record.label_name,
                record.received_date.to_rfc3339(),
                now,
            ])?;
        }
        drop(stmt);

        tx.commit()?;
        Ok(inserted)
    }

    fn delete_label_records_for_message(
        &self,
        user_email: &str,
        message_id: &MessageId,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM label_emails WHERE user_email = ? AND message_id = ?",
            params![user_email, message_id.as_str()],
        )?;

        Ok(())
    }

    fn delete_label_records_for_user(&self, user_email: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute("DELETE FROM label_emails WHERE user_email = ?", [user_email])?;

        Ok(())
    }

    fn delete_old_label_records(&self, keep_days: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let cutoff = Utc::now() - Duration::days(keep_days);

        let deleted = conn.execute(
            "DELETE FROM label_emails WHERE received_date < ?",
            [cutoff.to_rfc3339()],
        )?;

        Ok(deleted)
    }

    fn top_custom_labels(&self, user_email: &str, limit: usize) -> Result<Vec<LabelCount>> {
        let conn = self.conn.lock().unwrap();

        // User-created Gmail labels all have ids of the form "Label_<n>"
        let mut stmt = conn.prepare(
            "SELECT label_id, MAX(label_name), COUNT(DISTINCT message_id) AS email_count
             FROM label_emails
             WHERE user_email = ? AND label_id GLOB 'Label_*'
             GROUP BY label_id
             ORDER BY email_count DESC
             LIMIT ?",
        )?;

        let counts = stmt
            .query_map(params![user_email, limit as i64], |row| {
                Ok(LabelCount {
                    label_id: row.get(0)?,
                    label_name: row.get(1)?,
                    email_count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn custom_labels_in_range(
        &self,
        user_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LabelCount>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT label_id, MAX(label_name), COUNT(DISTINCT message_id) AS email_count
             FROM label_emails
             WHERE user_email = ? AND label_id GLOB 'Label_*'
               AND received_date >= ? AND received_date <= ?
             GROUP BY label_id
             ORDER BY email_count DESC
             LIMIT ?",
        )?;

        let counts = stmt
            .query_map(
                params![
                    user_email,
                    start.to_rfc3339(),
                    end.to_rfc3339(),
                    limit as i64
                ],
                |row| {
                    Ok(LabelCount {
                        label_id: row.get(0)?,
                        label_name: row.get(1)?,
                        email_count: row.get(2)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn count_label_messages(
        &self,
        user_email: &str,
        label_ids: &[String],
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<HashMap<String, i64>> {
        if label_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.conn.lock().unwrap();

        let placeholders = vec!["?"; label_ids.len()].join(", ");
        let range_clause = if range.is_some() {
            " AND received_date >= ? AND received_date <= ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT label_id, COUNT(DISTINCT message_id)
             FROM label_emails
             WHERE user_email = ? AND label_id IN ({placeholders}){range_clause}
             GROUP BY label_id"
        );

        let mut bindings: Vec<String> = Vec::with_capacity(label_ids.len() + 3);
        bindings.push(user_email.to_string());
        bindings.extend(label_ids.iter().cloned());
        if let Some((start, end)) = range {
            bindings.push(start.to_rfc3339());
            bindings.push(end.to_rfc3339());
        }

        let mut stmt = conn.prepare(&sql)?;
        let counts = stmt
            .query_map(params_from_iter(bindings.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(counts)
    }

    fn label_records_in_range(
        &self,
        user_email: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LabelRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT message_id, label_id, label_name, received_date
             FROM label_emails
             WHERE user_email = ? AND received_date >= ? AND received_date <= ?
             ORDER BY received_date DESC",
        )?;

        let records = stmt
            .query_map(
                params![user_email, start.to_rfc3339(), end.to_rfc3339()],
                |row| {
                    Ok(LabelRecord {
                        message_id: MessageId::new(row.get::<_, String>(0)?),
                        label_id: row.get(1)?,
                        label_name: row.get(2)?,
                        received_date: parse_timestamp(&row.get::<_, String>(3)?),
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // === SLA Emails ===

    fn add_sla_email(&self, email: &SlaEmail) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        // First sighting wins; a conflict means the message is already
        // tracked and the existing row is kept as-is.
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sla_emails
             (user_email, message_id, email_address, subject, body_preview, label,
              received_at, resolved, resolved_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                email.user_email,
                email.message_id.as_str(),
                email.email_address,
                email.subject,
                email.body_preview,
                email.label.name(),
                email.received_at.to_rfc3339(),
                email.resolved,
                email.resolved_at.map(|dt| dt.to_rfc3339()),
                email.created_at.to_rfc3339(),
                email.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(inserted > 0)
    }

    fn get_sla_emails(&self, user_email: &str) -> Result<Vec<SlaEmail>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT user_email, message_id, email_address, subject, body_preview, label,
                    received_at, resolved, resolved_at, created_at, updated_at
             FROM sla_emails WHERE user_email = ?
             ORDER BY received_at DESC",
        )?;

        let rows: Vec<(
            String,
            String,
            String,
            String,
            String,
            String,
            String,
            bool,
            Option<String>,
            String,
            String,
        )> = stmt
            .query_map([user_email], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(
                    user_email,
                    message_id,
                    email_address,
                    subject,
                    body_preview,
                    label,
                    received_at,
                    resolved,
                    resolved_at,
                    created_at,
                    updated_at,
                )| {
                    let label = SlaLabel::from_name(&label)
                        .with_context(|| format!("Unknown SLA label in store: {}", label))?;

                    Ok(SlaEmail {
                        user_email,
                        message_id: MessageId::new(message_id),
                        email_address,
                        subject,
                        body_preview,
                        label,
                        received_at: parse_timestamp(&received_at),
                        resolved,
                        resolved_at: resolved_at.as_deref().and_then(parse_timestamp_opt),
                        created_at: parse_timestamp(&created_at),
                        updated_at: parse_timestamp(&updated_at),
                    })
                },
            )
            .collect()
    }

    fn resolve_sla_email(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let changed = conn.execute(
            "UPDATE sla_emails SET resolved = 1, resolved_at = ?, updated_at = ?
             WHERE user_email = ? AND message_id = ?",
            params![now, now, user_email, message_id.as_str()],
        )?;

        Ok(changed > 0)
    }

    fn delete_sla_email(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let changed = conn.execute(
            "DELETE FROM sla_emails WHERE user_email = ? AND message_id = ?",
            params![user_email, message_id.as_str()],
        )?;

        Ok(changed > 0)
    }

    // === Starred Emails ===

    fn add_starred(&self, user_email: &str, message_id: &MessageId) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT OR IGNORE INTO starred_emails (user_email, message_id, created_at)
             VALUES (?, ?, ?)",
            params![user_email, message_id.as_str(), Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn remove_starred(&self, user_email: &str, message_id: &MessageId) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM starred_emails WHERE user_email = ? AND message_id = ?",
            params![user_email, message_id.as_str()],
        )?;

        Ok(())
    }

    fn is_starred(&self, user_email: &str, message_id: &MessageId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let starred: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM starred_emails WHERE user_email = ? AND message_id = ?
             )",
            params![user_email, message_id.as_str()],
            |row| row.get(0),
        )?;

        Ok(starred)
    }

    fn get_starred_ids(&self, user_email: &str) -> Result<Vec<MessageId>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt =
            conn.prepare("SELECT message_id FROM starred_emails WHERE user_email = ?")?;

        let ids = stmt
            .query_map([user_email], |row| {
                Ok(MessageId::new(row.get::<_, String>(0)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    // === Stats Snapshots ===

    fn insert_stats_snapshot(&self, snapshot: &StatsSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO gmail_stats
             (user_email, total_inbox, unread_inbox, drafts, sent, spam, custom_labels,
              created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                snapshot.user_email,
                snapshot.total_inbox,
                snapshot.unread_inbox,
                snapshot.drafts,
                snapshot.sent,
                snapshot.spam,
                serde_json::to_string(&snapshot.custom_labels)?,
                snapshot.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn latest_stats_snapshot(&self, user_email: &str) -> Result<Option<StatsSnapshot>> {
        Ok(self.stats_history(user_email, 1)?.into_iter().next())
    }

    fn stats_history(&self, user_email: &str, limit: usize) -> Result<Vec<StatsSnapshot>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT user_email, total_inbox, unread_inbox, drafts, sent, spam,
                    custom_labels, created_at
             FROM gmail_stats WHERE user_email = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )?;

        let snapshots = stmt
            .query_map(params![user_email, limit as i64], |row| {
                let custom_labels_json: String = row.get(6)?;
                Ok(StatsSnapshot {
                    user_email: row.get(0)?,
                    total_inbox: row.get(1)?,
                    unread_inbox: row.get(2)?,
                    drafts: row.get(3)?,
                    sent: row.get(4)?,
                    spam: row.get(5)?,
                    custom_labels: serde_json::from_str(&custom_labels_json).unwrap_or_default(),
                    created_at: parse_timestamp(&row.get::<_, String>(7)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    fn delete_old_stats(&self, user_email: &str, keep_days: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let cutoff = Utc::now() - Duration::days(keep_days);

        let deleted = conn.execute(
            "DELETE FROM gmail_stats WHERE user_email = ? AND created_at < ?",
            params![user_email, cutoff.to_rfc3339()],
        )?;

        Ok(deleted)
    }

    // === Preferences ===

    fn get_preferences(&self, user_email: &str) -> Result<EmailPreferences> {
        let conn = self.conn.lock().unwrap();

        Ok(self
            .load_preferences(&conn, user_email)?
            .unwrap_or_else(|| EmailPreferences::defaults(user_email)))
    }

    fn update_preferences(
        &self,
        user_email: &str,
        update: &PreferencesUpdate,
    ) -> Result<EmailPreferences> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut prefs = self
            .load_preferences(&tx, user_email)?
            .unwrap_or_else(|| EmailPreferences::defaults(user_email));

        if let Some(width) = update.sidebar_width {
            prefs.sidebar_width = width;
        }
        if let Some(open) = update.sidebar_open {
            prefs.sidebar_open = open;
        }
        if let Some(folder) = &update.selected_folder {
            prefs.selected_folder = folder.clone();
        }
        if let Some(load) = update.load_external_images {
            prefs.load_external_images = load;
        }

        tx.execute(
            "INSERT INTO email_preferences
             (user_email, sidebar_width, sidebar_open, selected_folder,
              load_external_images, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_email) DO UPDATE SET
                sidebar_width = excluded.sidebar_width,
                sidebar_open = excluded.sidebar_open,
                selected_folder = excluded.selected_folder,
                load_external_images = excluded.load_external_images,
                updated_at = excluded.updated_at",
            params![
                prefs.user_email,
                prefs.sidebar_width,
                prefs.sidebar_open,
                prefs.selected_folder,
                prefs.load_external_images,
                Utc::now().to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(prefs)
    }
}

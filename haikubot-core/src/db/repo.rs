//! Database repository layer
//!
//! Reply ledger and watermark queries.

use crate::error::{Error, Result};
use crate::types::{Meter, Timestamp};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One reply the bot published.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyRecord {
    /// Id of the message that was answered
    pub event_id: String,
    pub meter: Meter,
    /// Id of the reply event
    pub reply_id: String,
    /// Relays that accepted the reply
    pub relays_accepted: usize,
    pub replied_at: DateTime<Utc>,
}

/// Database handle (single connection)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    /// Poisoning is ignored: every statement commits on its own.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Reply ledger
    // ============================================

    /// Record a published reply. Recording the same event twice keeps the first row.
    pub fn record_reply(&self, record: &ReplyRecord) -> Result<bool> {
        let conn = self.lock();
        let inserted = conn.execute(
            r#"
            INSERT INTO replies (event_id, meter, reply_id, relays_accepted, replied_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(event_id) DO NOTHING
            "#,
            params![
                record.event_id,
                record.meter.as_str(),
                record.reply_id,
                record.relays_accepted as i64,
                record.replied_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Has the bot already answered this event?
    pub fn has_replied(&self, event_id: &str) -> Result<bool> {
        let conn = self.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM replies WHERE event_id = ?",
                [event_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Get a ledger entry by answered event id
    pub fn get_reply(&self, event_id: &str) -> Result<Option<ReplyRecord>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM replies WHERE event_id = ?",
            [event_id],
            Self::row_to_reply,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Total replies recorded
    pub fn reply_count(&self) -> Result<i64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM replies", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_reply(row: &Row) -> rusqlite::Result<ReplyRecord> {
        let meter_str: String = row.get("meter")?;
        let replied_at_str: String = row.get("replied_at")?;
        let relays_accepted: i64 = row.get("relays_accepted")?;

        let meter: Meter = meter_str
            .parse()
            .map_err(|e: String| conversion_error(row, "meter", e.into()))?;
        let replied_at = DateTime::parse_from_rfc3339(&replied_at_str)
            .map_err(|e| conversion_error(row, "replied_at", Box::new(e)))?
            .with_timezone(&Utc);

        Ok(ReplyRecord {
            event_id: row.get("event_id")?,
            meter,
            reply_id: row.get("reply_id")?,
            relays_accepted: relays_accepted.max(0) as usize,
            replied_at,
        })
    }

    // ============================================
    // Watermark
    // ============================================

    /// Last persisted watermark, if any
    pub fn load_watermark(&self) -> Result<Option<Timestamp>> {
        let conn = self.lock();
        let value: Option<i64> = conn
            .query_row("SELECT created_at FROM watermark WHERE id = 1", [], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(value.map(Timestamp))
    }

    /// Persist the watermark. The stored value never moves backwards.
    pub fn save_watermark(&self, watermark: Timestamp) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO watermark (id, created_at, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                created_at = MAX(created_at, excluded.created_at),
                updated_at = excluded.updated_at
            "#,
            params![watermark.as_secs(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Where ingestion should resume: the stored watermark, but no further
    /// back than `max_catchup_secs` before `now`. Without a stored value
    /// ingestion starts at `now`.
    pub fn resume_point(&self, now: Timestamp, max_catchup_secs: u64) -> Result<Timestamp> {
        let floor = now.add_secs(-(max_catchup_secs.min(i64::MAX as u64) as i64));
        Ok(match self.load_watermark()? {
            Some(stored) => stored.max(floor),
            None => now,
        })
    }
}

fn conversion_error(
    row: &Row,
    column: &str,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn record(event_id: &str) -> ReplyRecord {
        ReplyRecord {
            event_id: event_id.to_string(),
            meter: Meter::Tanka,
            reply_id: format!("reply-{}", event_id),
            relays_accepted: 2,
            replied_at: Utc::now(),
        }
    }

    #[test]
    fn test_reply_ledger() {
        let db = test_db();
        assert!(!db.has_replied("e1").unwrap());

        assert!(db.record_reply(&record("e1")).unwrap());
        assert!(db.has_replied("e1").unwrap());
        assert!(!db.has_replied("e2").unwrap());

        let stored = db.get_reply("e1").unwrap().unwrap();
        assert_eq!(stored.meter, Meter::Tanka);
        assert_eq!(stored.reply_id, "reply-e1");
        assert_eq!(stored.relays_accepted, 2);
    }

    #[test]
    fn test_duplicate_reply_keeps_first() {
        let db = test_db();
        assert!(db.record_reply(&record("e1")).unwrap());

        let mut again = record("e1");
        again.reply_id = "other".to_string();
        assert!(!db.record_reply(&again).unwrap());

        assert_eq!(db.get_reply("e1").unwrap().unwrap().reply_id, "reply-e1");
        assert_eq!(db.reply_count().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_ledger_row_is_an_error() {
        let db = test_db();
        db.lock()
            .execute(
                "INSERT INTO replies (event_id, meter, reply_id, relays_accepted, replied_at)
                 VALUES ('e1', 'limerick', 'r1', 1, '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        assert!(matches!(db.get_reply("e1"), Err(Error::Database(_))));
        // the row still counts for dedup
        assert!(db.has_replied("e1").unwrap());
    }

    #[test]
    fn test_watermark_only_moves_forward() {
        let db = test_db();
        assert_eq!(db.load_watermark().unwrap(), None);

        db.save_watermark(Timestamp(100)).unwrap();
        db.save_watermark(Timestamp(50)).unwrap();
        assert_eq!(db.load_watermark().unwrap(), Some(Timestamp(100)));

        db.save_watermark(Timestamp(150)).unwrap();
        assert_eq!(db.load_watermark().unwrap(), Some(Timestamp(150)));
    }

    #[test]
    fn test_resume_point() {
        let db = test_db();
        let now = Timestamp(10_000);
        assert_eq!(db.resume_point(now, 3_600).unwrap(), now);

        db.save_watermark(Timestamp(9_000)).unwrap();
        assert_eq!(db.resume_point(now, 3_600).unwrap(), Timestamp(9_000));

        // stale watermark is clamped to the catch-up window
        assert_eq!(db.resume_point(now, 600).unwrap(), Timestamp(9_400));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/data.db");
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        db.save_watermark(Timestamp(1)).unwrap();
        drop(db);

        let reopened = Database::open(&path).unwrap();
        reopened.migrate().unwrap();
        assert_eq!(reopened.load_watermark().unwrap(), Some(Timestamp(1)));
    }
}

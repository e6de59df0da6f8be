//! Classification record store.
//!
//! At most one row per message (`UNIQUE(message_id)`). A row always carries a
//! non-empty final label; a message with no row is in the Inbox view. Records
//! are overwritten in place on reclassification, last write wins, and removing
//! the row is the supported way to send a message back to Inbox.

use rusqlite::{params, OptionalExtension};

use super::DbPool;
use crate::error::{EngineError, Result};

/// A single classifier's opinion.
#[derive(Debug, Clone, PartialEq)]
pub struct Opinion {
    pub label: String,
    pub confidence: f64,
    pub rationale: Option<String>,
}

/// The full classification outcome for one message.
#[derive(Debug, Clone)]
pub struct ClassificationRecord {
    pub message_id: String,
    pub primary: Option<Opinion>,
    pub secondary: Option<Opinion>,
    pub final_label: String,
    pub final_reason: Option<String>,
    pub decided_by: String,
    pub decided_at: i64,
}

fn row_to_record(row: &rusqlite::Row) -> std::result::Result<ClassificationRecord, rusqlite::Error> {
    let primary_label: Option<String> = row.get(1)?;
    let secondary_label: Option<String> = row.get(4)?;

    let primary = primary_label.map(|label| {
        Ok::<_, rusqlite::Error>(Opinion {
            label,
            confidence: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            rationale: row.get(3)?,
        })
    });
    let secondary = secondary_label.map(|label| {
        Ok::<_, rusqlite::Error>(Opinion {
            label,
            confidence: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
            rationale: row.get(6)?,
        })
    });

    Ok(ClassificationRecord {
        message_id: row.get(0)?,
        primary: primary.transpose()?,
        secondary: secondary.transpose()?,
        final_label: row.get(7)?,
        final_reason: row.get(8)?,
        decided_by: row.get(9)?,
        decided_at: row.get(10)?,
    })
}

const RECORD_COLUMNS: &str = "message_id, primary_label, primary_confidence, primary_rationale, \
     secondary_label, secondary_confidence, secondary_rationale, \
     final_label, final_reason, decided_by, decided_at";

/// Create or fully overwrite the record for a message.
pub fn upsert_classification(pool: &DbPool, record: &ClassificationRecord) -> Result<()> {
    let conn = pool.get()?;
    upsert_classification_conn(&conn, record)
}

pub fn upsert_classification_conn(
    conn: &rusqlite::Connection,
    record: &ClassificationRecord,
) -> Result<()> {
    if record.final_label.trim().is_empty() {
        return Err(EngineError::InvalidInput(
            "final_label must be non-empty".to_string(),
        ));
    }

    conn.execute(
        "INSERT INTO classifications (
            message_id, primary_label, primary_confidence, primary_rationale,
            secondary_label, secondary_confidence, secondary_rationale,
            final_label, final_reason, decided_by, decided_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(message_id) DO UPDATE SET
            primary_label        = excluded.primary_label,
            primary_confidence   = excluded.primary_confidence,
            primary_rationale    = excluded.primary_rationale,
            secondary_label      = excluded.secondary_label,
            secondary_confidence = excluded.secondary_confidence,
            secondary_rationale  = excluded.secondary_rationale,
            final_label          = excluded.final_label,
            final_reason         = excluded.final_reason,
            decided_by           = excluded.decided_by,
            decided_at           = excluded.decided_at",
        params![
            record.message_id,
            record.primary.as_ref().map(|o| o.label.as_str()),
            record.primary.as_ref().map(|o| o.confidence),
            record.primary.as_ref().and_then(|o| o.rationale.as_deref()),
            record.secondary.as_ref().map(|o| o.label.as_str()),
            record.secondary.as_ref().map(|o| o.confidence),
            record.secondary.as_ref().and_then(|o| o.rationale.as_deref()),
            record.final_label,
            record.final_reason,
            record.decided_by,
            record.decided_at,
        ],
    )?;
    Ok(())
}

/// Upsert a whole batch in one transaction. This is the orchestrator's
/// trailing commit: per-message work already happened, this only persists.
pub fn upsert_all(pool: &DbPool, records: &[ClassificationRecord]) -> Result<usize> {
    let conn = pool.get()?;
    let tx = conn.unchecked_transaction()?;

    for record in records {
        upsert_classification_conn(&tx, record)?;
    }

    tx.commit()?;
    Ok(records.len())
}

pub fn get_classification(pool: &DbPool, message_id: &str) -> Result<Option<ClassificationRecord>> {
    let conn = pool.get()?;
    let record = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM classifications WHERE message_id = ?1"),
            params![message_id],
            row_to_record,
        )
        .optional()?;
    Ok(record)
}

/// Delete the record entirely, restoring the message to the Inbox view.
/// Returns whether a record existed.
pub fn clear_classification(pool: &DbPool, message_id: &str) -> Result<bool> {
    let conn = pool.get()?;
    let deleted = conn.execute(
        "DELETE FROM classifications WHERE message_id = ?1",
        params![message_id],
    )?;
    Ok(deleted > 0)
}

/// Set only the final label and provenance, creating a minimal record when
/// none exists. Classifier opinions already on the row are retained.
pub fn assign_label(
    pool: &DbPool,
    message_id: &str,
    label: &str,
    decided_by: &str,
    reason: Option<&str>,
) -> Result<()> {
    let conn = pool.get()?;
    assign_label_conn(&conn, message_id, label, decided_by, reason)
}

pub fn assign_label_conn(
    conn: &rusqlite::Connection,
    message_id: &str,
    label: &str,
    decided_by: &str,
    reason: Option<&str>,
) -> Result<()> {
    if label.trim().is_empty() {
        return Err(EngineError::InvalidInput(
            "final_label must be non-empty".to_string(),
        ));
    }

    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO classifications (message_id, final_label, final_reason, decided_by, decided_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(message_id) DO UPDATE SET
            final_label  = excluded.final_label,
            final_reason = excluded.final_reason,
            decided_by   = excluded.decided_by,
            decided_at   = excluded.decided_at",
        params![message_id, label, reason, decided_by, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::messages;
    use crate::adapters::sqlite::messages::test_fixtures::*;

    fn seeded_message(pool: &DbPool) -> String {
        let account_id = seed_account(pool);
        messages::insert_message(pool, &simple_message(account_id, "a@x.com", "hi")).unwrap()
    }

    fn record(message_id: &str) -> ClassificationRecord {
        ClassificationRecord {
            message_id: message_id.to_string(),
            primary: Some(Opinion {
                label: "SPAM".to_string(),
                confidence: 0.9,
                rationale: Some("promotional blast".to_string()),
            }),
            secondary: Some(Opinion {
                label: "SPAM".to_string(),
                confidence: 0.8,
                rationale: None,
            }),
            final_label: "SPAM".to_string(),
            final_reason: Some("both agree".to_string()),
            decided_by: "consensus".to_string(),
            decided_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[test]
    fn upsert_get_clear_roundtrip() {
        let pool = test_pool();
        let message_id = seeded_message(&pool);

        assert!(get_classification(&pool, &message_id).unwrap().is_none());

        upsert_classification(&pool, &record(&message_id)).unwrap();
        let stored = get_classification(&pool, &message_id).unwrap().unwrap();
        assert_eq!(stored.final_label, "SPAM");
        assert_eq!(stored.decided_by, "consensus");
        assert_eq!(stored.primary.unwrap().confidence, 0.9);

        assert!(clear_classification(&pool, &message_id).unwrap());
        assert!(get_classification(&pool, &message_id).unwrap().is_none());
        assert!(!clear_classification(&pool, &message_id).unwrap());
    }

    #[test]
    fn upsert_overwrites_in_place() {
        let pool = test_pool();
        let message_id = seeded_message(&pool);

        upsert_classification(&pool, &record(&message_id)).unwrap();
        let mut second = record(&message_id);
        second.final_label = "Interesantes".to_string();
        second.decided_by = "manual_user".to_string();
        upsert_classification(&pool, &second).unwrap();

        let stored = get_classification(&pool, &message_id).unwrap().unwrap();
        assert_eq!(stored.final_label, "Interesantes");

        // Still exactly one row for the message
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM classifications WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn assign_label_retains_classifier_opinions() {
        let pool = test_pool();
        let message_id = seeded_message(&pool);

        upsert_classification(&pool, &record(&message_id)).unwrap();
        assign_label(&pool, &message_id, "Deleted", "user_delete", None).unwrap();

        let stored = get_classification(&pool, &message_id).unwrap().unwrap();
        assert_eq!(stored.final_label, "Deleted");
        assert_eq!(stored.decided_by, "user_delete");
        // The original opinions survive the relabel
        assert_eq!(stored.primary.unwrap().label, "SPAM");
        assert_eq!(stored.secondary.unwrap().label, "SPAM");
    }

    #[test]
    fn empty_final_label_is_rejected() {
        let pool = test_pool();
        let message_id = seeded_message(&pool);

        let err = assign_label(&pool, &message_id, "  ", "manual_user", None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}

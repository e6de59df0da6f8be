use rusqlite::params;

use super::DbPool;
use crate::error::Result;

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: i64,
    pub message_id: Option<String>,
    pub action: String,
    pub payload: Option<serde_json::Value>,
    pub status: Option<String>,
    pub error_message: Option<String>,
}

pub fn record(
    pool: &DbPool,
    action: &str,
    message_id: Option<&str>,
    payload: Option<&serde_json::Value>,
    status: &str,
    error_message: Option<&str>,
) -> Result<i64> {
    let conn = pool.get()?;
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO audit_logs (timestamp, message_id, action, payload, status, error_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            now,
            message_id,
            action,
            payload.map(|p| p.to_string()),
            status,
            error_message,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent entries for one action, newest first. Backs the sync-status
/// surface.
pub fn recent(pool: &DbPool, action: &str, limit: i64) -> Result<Vec<AuditEntry>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, message_id, action, payload, status, error_message
         FROM audit_logs WHERE action = ?1
         ORDER BY timestamp DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![action, limit], |row| {
        Ok(AuditEntry {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            message_id: row.get(2)?,
            action: row.get(3)?,
            payload: row
                .get::<_, Option<String>>(4)?
                .and_then(|raw| serde_json::from_str(&raw).ok()),
            status: row.get(5)?,
            error_message: row.get(6)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

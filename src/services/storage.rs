//! Storage accounting.
//!
//! Message size is the length of body_text plus body_html plus the recorded
//! attachment sizes. Text length comes from sqlite's length(), a character
//! count: a documented approximation for multi-byte encodings. The account
//! counter only ever moves inside the transaction that removes the rows,
//! and a decrement clamps at zero rather than failing the delete.

use rusqlite::{params, params_from_iter, Connection};

use crate::adapters::sqlite::DbPool;
use crate::error::Result;

/// Combined size of the given messages: body text + body HTML + attachments.
/// Must run before the rows are removed.
pub fn bytes_for_messages(conn: &Connection, ids: &[String]) -> Result<i64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; ids.len()].join(",");

    let body_bytes: i64 = conn.query_row(
        &format!(
            "SELECT IFNULL(SUM(IFNULL(LENGTH(body_text), 0) + IFNULL(LENGTH(body_html), 0)), 0)
             FROM messages WHERE id IN ({placeholders})"
        ),
        params_from_iter(ids.iter()),
        |row| row.get(0),
    )?;

    let attachment_bytes: i64 = conn.query_row(
        &format!(
            "SELECT IFNULL(SUM(IFNULL(size_bytes, 0)), 0)
             FROM attachments WHERE message_id IN ({placeholders})"
        ),
        params_from_iter(ids.iter()),
        |row| row.get(0),
    )?;

    Ok(body_bytes + attachment_bytes)
}

/// Decrement the account's running total, floored at zero.
pub fn debit_storage(conn: &Connection, account_id: i64, bytes: i64) -> Result<()> {
    if bytes <= 0 {
        return Ok(());
    }
    conn.execute(
        "UPDATE accounts
         SET mailbox_storage_bytes = MAX(0, IFNULL(mailbox_storage_bytes, 0) - ?1)
         WHERE id = ?2",
        params![bytes, account_id],
    )?;
    Ok(())
}

/// Rebuild the account's total from the rows currently stored. Maintenance
/// operation for counters that drifted.
pub fn recalculate_storage(pool: &DbPool, account_id: i64) -> Result<i64> {
    let conn = pool.get()?;

    let total: i64 = conn.query_row(
        "SELECT
            IFNULL((SELECT SUM(IFNULL(LENGTH(body_text), 0) + IFNULL(LENGTH(body_html), 0))
                    FROM messages WHERE account_id = ?1), 0)
          + IFNULL((SELECT SUM(IFNULL(a.size_bytes, 0))
                    FROM attachments a
                    JOIN messages m ON a.message_id = m.id
                    WHERE m.account_id = ?1), 0)",
        params![account_id],
        |row| row.get(0),
    )?;

    conn.execute(
        "UPDATE accounts SET mailbox_storage_bytes = ?1 WHERE id = ?2",
        params![total, account_id],
    )?;

    Ok(total)
}

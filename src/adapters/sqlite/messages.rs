//! Message store and the virtual-folder view over it.
//!
//! Folders are not physical: membership is a function of the classification
//! row. No row at all means Inbox; `final_label = 'Deleted'` means the
//! Deleted view; any other label is a named folder. Listing joins the
//! classification table and excludes Deleted unless that view is requested.

use rusqlite::{params, params_from_iter, types::ToSql, OptionalExtension};
use uuid::Uuid;

use super::DbPool;
use crate::error::{EngineError, Result};

/// Label sentinel for the Deleted virtual folder.
pub const DELETED_LABEL: &str = "Deleted";

/// Filter sentinel meaning "messages with no classification row".
pub const INBOX_LABEL: &str = "INBOX";

/// A message ready to be stored. Decoupled from the fetch protocol — any
/// source can produce this; bodies arrive already decoded.
pub struct NewMessage {
    pub account_id: i64,
    pub imap_uid: Option<i64>,
    pub message_id: String,
    pub thread_id: Option<String>,
    pub from_name: Option<String>,
    pub from_email: String,
    pub to_addresses: String,  // JSON array
    pub cc_addresses: String,  // JSON array
    pub bcc_addresses: String, // JSON array
    pub subject: Option<String>,
    pub date: Option<i64>,
    pub snippet: Option<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub has_attachments: bool,
}

/// Listing row, classification label resolved.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageSummary {
    pub id: String,
    pub account_id: i64,
    pub from_name: Option<String>,
    pub from_email: String,
    pub subject: Option<String>,
    pub date: Option<i64>,
    pub snippet: Option<String>,
    pub is_read: bool,
    pub is_starred: bool,
    pub has_attachments: bool,
    pub classification_label: Option<String>,
}

/// Full message row for the detail view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageDetail {
    pub id: String,
    pub account_id: i64,
    pub from_name: Option<String>,
    pub from_email: String,
    pub to_addresses: String,
    pub cc_addresses: String,
    pub bcc_addresses: String,
    pub subject: Option<String>,
    pub date: Option<i64>,
    pub snippet: Option<String>,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub has_attachments: bool,
    pub is_read: bool,
    pub is_starred: bool,
    pub classification_label: Option<String>,
}

/// Envelope and body fields the classification pipeline needs.
pub struct ClassifiableMessage {
    pub id: String,
    pub from_name: Option<String>,
    pub from_email: String,
    pub to_addresses: String, // JSON array
    pub cc_addresses: String, // JSON array
    pub subject: Option<String>,
    pub date: Option<i64>,
    pub snippet: Option<String>,
    pub body_text: Option<String>,
}

/// Listing filters. `classification_label = "INBOX"` selects messages with
/// no classification row; `folder = "Deleted"` selects the Deleted view,
/// which every other listing excludes.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    pub account_id: Option<i64>,
    pub folder: Option<String>,
    pub classification_label: Option<String>,
    pub search: Option<String>,
    pub from_email: Option<String>,
    pub is_starred: Option<bool>,
    pub has_attachments: Option<bool>,
    pub date_from: Option<i64>,
    pub date_to: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self {
            account_id: None,
            folder: None,
            classification_label: None,
            search: None,
            from_email: None,
            is_starred: None,
            has_attachments: None,
            date_from: None,
            date_to: None,
            limit: 50,
            offset: 0,
        }
    }
}

pub fn insert_message(pool: &DbPool, msg: &NewMessage) -> Result<String> {
    let conn = pool.get()?;
    insert_message_conn(&conn, msg)
}

fn insert_message_conn(conn: &rusqlite::Connection, msg: &NewMessage) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO messages (
            id, account_id, imap_uid, message_id, thread_id,
            from_name, from_email, to_addresses, cc_addresses, bcc_addresses,
            subject, date, snippet, body_text, body_html,
            has_attachments, created_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15,
            ?16, ?17
        )",
        params![
            id,
            msg.account_id,
            msg.imap_uid,
            msg.message_id,
            msg.thread_id,
            msg.from_name,
            msg.from_email,
            msg.to_addresses,
            msg.cc_addresses,
            msg.bcc_addresses,
            msg.subject,
            msg.date,
            msg.snippet,
            msg.body_text,
            msg.body_html,
            msg.has_attachments as i32,
            now,
        ],
    )?;
    Ok(id)
}

/// Insert a batch inside one transaction, skipping duplicates
/// (same account + imap_uid). Returns the number inserted.
pub fn insert_messages(pool: &DbPool, messages: &[NewMessage]) -> Result<usize> {
    let conn = pool.get()?;
    let tx = conn.unchecked_transaction()?;

    let mut count = 0;
    for msg in messages {
        match insert_message_conn(&tx, msg) {
            Ok(_) => count += 1,
            Err(EngineError::Database(e)) if e.contains("UNIQUE") => {
                tracing::debug!(message_id = %msg.message_id, "Skipping duplicate message");
            }
            Err(e) => return Err(e),
        }
    }

    tx.commit()?;
    Ok(count)
}

pub fn list_messages(pool: &DbPool, filter: &MessageFilter) -> Result<Vec<MessageSummary>> {
    let mut sql = String::from(
        "SELECT m.id, m.account_id, m.from_name, m.from_email, m.subject, m.date,
                m.snippet, m.is_read, m.is_starred, m.has_attachments, c.final_label
         FROM messages m
         LEFT JOIN classifications c ON m.id = c.message_id
         WHERE 1=1",
    );
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(account_id) = filter.account_id {
        sql.push_str(" AND m.account_id = ?");
        args.push(Box::new(account_id));
    }

    // Deleted view vs default exclusion
    if filter.folder.as_deref() == Some(DELETED_LABEL) {
        sql.push_str(" AND c.final_label = ?");
        args.push(Box::new(DELETED_LABEL.to_string()));
    } else {
        sql.push_str(" AND (c.final_label IS NULL OR c.final_label != ?)");
        args.push(Box::new(DELETED_LABEL.to_string()));
    }

    if let Some(label) = filter.classification_label.as_deref() {
        if label == INBOX_LABEL {
            sql.push_str(" AND c.final_label IS NULL");
        } else {
            sql.push_str(" AND c.final_label = ?");
            args.push(Box::new(label.to_string()));
        }
    }

    if let Some(search) = filter.search.as_deref() {
        sql.push_str(
            " AND (m.subject LIKE ? OR m.from_email LIKE ? OR m.from_name LIKE ? OR m.body_text LIKE ?)",
        );
        let pattern = format!("%{search}%");
        for _ in 0..4 {
            args.push(Box::new(pattern.clone()));
        }
    }

    if let Some(from_email) = filter.from_email.as_deref() {
        sql.push_str(" AND m.from_email LIKE ?");
        args.push(Box::new(format!("%{from_email}%")));
    }

    if let Some(is_starred) = filter.is_starred {
        sql.push_str(" AND m.is_starred = ?");
        args.push(Box::new(is_starred as i32));
    }

    if let Some(has_attachments) = filter.has_attachments {
        sql.push_str(" AND m.has_attachments = ?");
        args.push(Box::new(has_attachments as i32));
    }

    if let Some(date_from) = filter.date_from {
        sql.push_str(" AND m.date >= ?");
        args.push(Box::new(date_from));
    }

    if let Some(date_to) = filter.date_to {
        sql.push_str(" AND m.date <= ?");
        args.push(Box::new(date_to));
    }

    sql.push_str(" ORDER BY m.date DESC LIMIT ? OFFSET ?");
    args.push(Box::new(filter.limit.clamp(1, 200)));
    args.push(Box::new(filter.offset.max(0)));

    let conn = pool.get()?;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
        Ok(MessageSummary {
            id: row.get(0)?,
            account_id: row.get(1)?,
            from_name: row.get(2)?,
            from_email: row.get(3)?,
            subject: row.get(4)?,
            date: row.get(5)?,
            snippet: row.get(6)?,
            is_read: row.get::<_, i64>(7)? != 0,
            is_starred: row.get::<_, i64>(8)? != 0,
            has_attachments: row.get::<_, i64>(9)? != 0,
            classification_label: row.get(10)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

pub fn get_message(pool: &DbPool, message_id: &str) -> Result<MessageDetail> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT m.id, m.account_id, m.from_name, m.from_email, m.to_addresses,
                m.cc_addresses, m.bcc_addresses, m.subject, m.date, m.snippet,
                m.body_text, m.body_html, m.has_attachments, m.is_read, m.is_starred,
                c.final_label
         FROM messages m
         LEFT JOIN classifications c ON m.id = c.message_id
         WHERE m.id = ?1",
        params![message_id],
        |row| {
            Ok(MessageDetail {
                id: row.get(0)?,
                account_id: row.get(1)?,
                from_name: row.get(2)?,
                from_email: row.get(3)?,
                to_addresses: row.get(4)?,
                cc_addresses: row.get(5)?,
                bcc_addresses: row.get(6)?,
                subject: row.get(7)?,
                date: row.get(8)?,
                snippet: row.get(9)?,
                body_text: row.get(10)?,
                body_html: row.get(11)?,
                has_attachments: row.get::<_, i64>(12)? != 0,
                is_read: row.get::<_, i64>(13)? != 0,
                is_starred: row.get::<_, i64>(14)? != 0,
                classification_label: row.get(15)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| EngineError::MessageNotFound(message_id.to_string()))
}

pub fn message_exists(pool: &DbPool, message_id: &str) -> Result<bool> {
    let conn = pool.get()?;
    let row = conn
        .query_row(
            "SELECT 1 FROM messages WHERE id = ?1",
            params![message_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(row.is_some())
}

pub fn set_read(pool: &DbPool, message_id: &str, is_read: bool) -> Result<()> {
    let conn = pool.get()?;
    let updated = conn.execute(
        "UPDATE messages SET is_read = ?1 WHERE id = ?2",
        params![is_read as i32, message_id],
    )?;
    if updated == 0 {
        return Err(EngineError::MessageNotFound(message_id.to_string()));
    }
    Ok(())
}

pub fn set_starred(pool: &DbPool, message_id: &str, is_starred: bool) -> Result<()> {
    let conn = pool.get()?;
    let updated = conn.execute(
        "UPDATE messages SET is_starred = ?1 WHERE id = ?2",
        params![is_starred as i32, message_id],
    )?;
    if updated == 0 {
        return Err(EngineError::MessageNotFound(message_id.to_string()));
    }
    Ok(())
}

/// Messages with no classification row, newest first, bounded. This is the
/// batch orchestrator's candidate selection.
pub fn unclassified_for_account(
    pool: &DbPool,
    account_id: i64,
    limit: i64,
) -> Result<Vec<ClassifiableMessage>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT m.id, m.from_name, m.from_email, m.to_addresses, m.cc_addresses,
                m.subject, m.date, m.snippet, m.body_text
         FROM messages m
         LEFT JOIN classifications c ON m.id = c.message_id
         WHERE m.account_id = ?1 AND c.id IS NULL
         ORDER BY m.date DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![account_id, limit], |row| {
        Ok(ClassifiableMessage {
            id: row.get(0)?,
            from_name: row.get(1)?,
            from_email: row.get(2)?,
            to_addresses: row.get(3)?,
            cc_addresses: row.get(4)?,
            subject: row.get(5)?,
            date: row.get(6)?,
            snippet: row.get(7)?,
            body_text: row.get(8)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

/// Message ids currently carrying the given label. Runs on a borrowed
/// connection so bulk operations can use it mid-transaction.
pub fn ids_with_label(
    conn: &rusqlite::Connection,
    account_id: i64,
    label: &str,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT m.id FROM messages m
         JOIN classifications c ON m.id = c.message_id
         WHERE m.account_id = ?1 AND c.final_label = ?2",
    )?;
    let rows = stmt.query_map(params![account_id, label], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Message ids with no classification row (the Inbox view).
pub fn unclassified_ids(conn: &rusqlite::Connection, account_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT m.id FROM messages m
         LEFT JOIN classifications c ON m.id = c.message_id
         WHERE m.account_id = ?1 AND c.id IS NULL",
    )?;
    let rows = stmt.query_map(params![account_id], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Remove message rows. Attachments and classification rows go with them
/// via ON DELETE CASCADE. Caller owns the transaction.
pub fn delete_messages(conn: &rusqlite::Connection, ids: &[String]) -> Result<usize> {
    let mut deleted = 0;
    for id in ids {
        deleted += conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
    }
    Ok(deleted)
}

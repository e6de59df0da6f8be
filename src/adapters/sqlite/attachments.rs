use rusqlite::params;

use super::DbPool;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Attachment {
    pub id: i64,
    pub message_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub local_path: String,
}

pub struct NewAttachment {
    pub message_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub local_path: String,
}

pub fn insert_attachment(pool: &DbPool, att: &NewAttachment) -> Result<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO attachments (message_id, filename, mime_type, size_bytes, local_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            att.message_id,
            att.filename,
            att.mime_type,
            att.size_bytes,
            att.local_path
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_for_message(pool: &DbPool, message_id: &str) -> Result<Vec<Attachment>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, message_id, filename, mime_type, size_bytes, local_path
         FROM attachments WHERE message_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![message_id], |row| {
        Ok(Attachment {
            id: row.get(0)?,
            message_id: row.get(1)?,
            filename: row.get(2)?,
            mime_type: row.get(3)?,
            size_bytes: row.get(4)?,
            local_path: row.get(5)?,
        })
    })?;

    let mut attachments = Vec::new();
    for row in rows {
        attachments.push(row?);
    }
    Ok(attachments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::messages;
    use crate::adapters::sqlite::messages::test_fixtures::*;

    #[test]
    fn insert_and_list() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        let message_id =
            messages::insert_message(&pool, &simple_message(account_id, "a@x.com", "att")).unwrap();

        insert_attachment(
            &pool,
            &NewAttachment {
                message_id: message_id.clone(),
                filename: "informe.pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
                size_bytes: Some(2048),
                local_path: "/tmp/informe.pdf".to_string(),
            },
        )
        .unwrap();

        let listed = list_for_message(&pool, &message_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size_bytes, Some(2048));
    }
}

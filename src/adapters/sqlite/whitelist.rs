//! Sender-domain whitelist. The rule evaluator loads the active patterns
//! once per batch; entries hold no classification state of their own.

use rusqlite::{params, OptionalExtension};

use super::DbPool;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, serde::Serialize)]
pub struct WhitelistEntry {
    pub id: i64,
    pub user_id: i64,
    pub domain_pattern: String,
    pub description: Option<String>,
    pub is_active: bool,
}

fn row_to_entry(row: &rusqlite::Row) -> std::result::Result<WhitelistEntry, rusqlite::Error> {
    Ok(WhitelistEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        domain_pattern: row.get(2)?,
        description: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
    })
}

pub fn list_for_user(pool: &DbPool, user_id: i64) -> Result<Vec<WhitelistEntry>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, user_id, domain_pattern, description, is_active
         FROM service_whitelist WHERE user_id = ?1 ORDER BY domain_pattern",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_entry)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Add a domain pattern; re-adding an existing one re-activates it and
/// refreshes the description.
pub fn add_entry(
    pool: &DbPool,
    user_id: i64,
    domain_pattern: &str,
    description: Option<&str>,
) -> Result<i64> {
    let pattern = domain_pattern.trim().to_lowercase();
    if pattern.is_empty() {
        return Err(EngineError::InvalidInput(
            "domain_pattern must be non-empty".to_string(),
        ));
    }

    let conn = pool.get()?;
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO service_whitelist (user_id, domain_pattern, description, is_active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)
         ON CONFLICT(user_id, domain_pattern) DO UPDATE SET
            description = excluded.description,
            is_active   = 1",
        params![user_id, pattern, description, now],
    )?;

    let id = conn.query_row(
        "SELECT id FROM service_whitelist WHERE user_id = ?1 AND domain_pattern = ?2",
        params![user_id, pattern],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn set_active(pool: &DbPool, entry_id: i64, is_active: bool) -> Result<()> {
    let conn = pool.get()?;
    let updated = conn.execute(
        "UPDATE service_whitelist SET is_active = ?1 WHERE id = ?2",
        params![is_active as i32, entry_id],
    )?;
    if updated == 0 {
        return Err(EngineError::InvalidInput(format!(
            "No whitelist entry with id {entry_id}"
        )));
    }
    Ok(())
}

pub fn remove_entry(pool: &DbPool, entry_id: i64) -> Result<bool> {
    let conn = pool.get()?;
    let deleted = conn.execute(
        "DELETE FROM service_whitelist WHERE id = ?1",
        params![entry_id],
    )?;
    Ok(deleted > 0)
}

/// The active domain patterns for a user, lowercased. This is the set the
/// rule evaluator matches sender domains against.
pub fn active_domain_patterns(pool: &DbPool, user_id: i64) -> Result<Vec<String>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT domain_pattern FROM service_whitelist
         WHERE user_id = ?1 AND is_active = 1
         ORDER BY domain_pattern",
    )?;
    let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

    let mut patterns = Vec::new();
    for row in rows {
        patterns.push(row?.to_lowercase());
    }
    Ok(patterns)
}

pub fn get_entry(pool: &DbPool, entry_id: i64) -> Result<Option<WhitelistEntry>> {
    let conn = pool.get()?;
    let entry = conn
        .query_row(
            "SELECT id, user_id, domain_pattern, description, is_active
             FROM service_whitelist WHERE id = ?1",
            params![entry_id],
            row_to_entry,
        )
        .optional()?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{pool, schema};

    fn test_pool() -> DbPool {
        let pool = pool::in_memory_pool().unwrap();
        schema::initialize_schema(&pool.get().unwrap()).unwrap();
        pool
    }

    #[test]
    fn add_deactivate_and_filter() {
        let pool = test_pool();
        let id = add_entry(&pool, 1, "PayPal.com", Some("payments")).unwrap();
        add_entry(&pool, 1, "bankia.es", None).unwrap();

        // Patterns are stored and served lowercased
        let active = active_domain_patterns(&pool, 1).unwrap();
        assert_eq!(active, vec!["bankia.es".to_string(), "paypal.com".to_string()]);

        set_active(&pool, id, false).unwrap();
        let active = active_domain_patterns(&pool, 1).unwrap();
        assert_eq!(active, vec!["bankia.es".to_string()]);
    }

    #[test]
    fn re_adding_reactivates() {
        let pool = test_pool();
        let id = add_entry(&pool, 1, "paypal.com", None).unwrap();
        set_active(&pool, id, false).unwrap();

        let same_id = add_entry(&pool, 1, "paypal.com", Some("back again")).unwrap();
        assert_eq!(id, same_id);
        assert!(get_entry(&pool, id).unwrap().unwrap().is_active);
    }

    #[test]
    fn patterns_are_per_user() {
        let pool = test_pool();
        add_entry(&pool, 1, "paypal.com", None).unwrap();
        add_entry(&pool, 2, "amazon.com", None).unwrap();

        assert_eq!(active_domain_patterns(&pool, 1).unwrap(), vec!["paypal.com"]);
        assert_eq!(active_domain_patterns(&pool, 2).unwrap(), vec!["amazon.com"]);
    }
}

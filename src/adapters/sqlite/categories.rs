//! Label vocabulary. Each category carries the instruction text the prompt
//! builder hands to the classifiers. System categories cannot be deleted.
//!
//! The vocabulary constrains classifier output by convention only; the
//! classification table's final_label stays free text (see schema notes).

use rusqlite::{params, OptionalExtension};

use super::DbPool;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, serde::Serialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub ai_instruction: String,
    pub icon: Option<String>,
    pub is_system: bool,
}

pub struct NewCategory {
    pub user_id: i64,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub ai_instruction: String,
    pub icon: Option<String>,
    pub is_system: bool,
}

#[derive(Debug, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ai_instruction: Option<String>,
    pub icon: Option<String>,
}

fn row_to_category(row: &rusqlite::Row) -> std::result::Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        key: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        ai_instruction: row.get(5)?,
        icon: row.get(6)?,
        is_system: row.get::<_, i64>(7)? != 0,
    })
}

const CATEGORY_COLUMNS: &str =
    "id, user_id, key, name, description, ai_instruction, icon, is_system";

pub fn list_for_user(pool: &DbPool, user_id: i64) -> Result<Vec<Category>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE user_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map(params![user_id], row_to_category)?;

    let mut categories = Vec::new();
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

pub fn create_category(pool: &DbPool, category: &NewCategory) -> Result<i64> {
    if category.key.trim().is_empty() {
        return Err(EngineError::InvalidInput(
            "category key must be non-empty".to_string(),
        ));
    }

    let conn = pool.get()?;
    let now = chrono::Utc::now().timestamp_millis();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO categories
            (user_id, key, name, description, ai_instruction, icon, is_system, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            category.user_id,
            category.key,
            category.name,
            category.description,
            category.ai_instruction,
            category.icon,
            category.is_system as i32,
            now,
        ],
    )?;

    if inserted == 0 {
        return Err(EngineError::InvalidInput(format!(
            "Category key already exists: {}",
            category.key
        )));
    }
    Ok(conn.last_insert_rowid())
}

pub fn update_category(pool: &DbPool, category_id: i64, update: &CategoryUpdate) -> Result<()> {
    let conn = pool.get()?;
    let existing = conn
        .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
            params![category_id],
            row_to_category,
        )
        .optional()?
        .ok_or(EngineError::CategoryNotFound(category_id))?;

    conn.execute(
        "UPDATE categories SET name = ?1, description = ?2, ai_instruction = ?3, icon = ?4
         WHERE id = ?5",
        params![
            update.name.as_deref().unwrap_or(&existing.name),
            update
                .description
                .as_deref()
                .or(existing.description.as_deref()),
            update
                .ai_instruction
                .as_deref()
                .unwrap_or(&existing.ai_instruction),
            update.icon.as_deref().or(existing.icon.as_deref()),
            category_id,
        ],
    )?;
    Ok(())
}

/// Delete a category. System categories are protected.
pub fn delete_category(pool: &DbPool, category_id: i64) -> Result<()> {
    let conn = pool.get()?;
    let is_system: Option<i64> = conn
        .query_row(
            "SELECT is_system FROM categories WHERE id = ?1",
            params![category_id],
            |row| row.get(0),
        )
        .optional()?;

    match is_system {
        None => Err(EngineError::CategoryNotFound(category_id)),
        Some(flag) if flag != 0 => Err(EngineError::InvalidInput(
            "Cannot delete system categories".to_string(),
        )),
        Some(_) => {
            conn.execute("DELETE FROM categories WHERE id = ?1", params![category_id])?;
            Ok(())
        }
    }
}

/// Seed the built-in vocabulary for a user. Idempotent: existing keys are
/// left untouched.
pub fn seed_system_categories(pool: &DbPool, user_id: i64) -> Result<()> {
    let defaults = [
        (
            "Interesantes",
            "Interesantes",
            "Personal or business mail that deserves the user's attention: real correspondence, offers they asked for, anything a human wrote to them.",
            Some("⭐"),
        ),
        (
            "SPAM",
            "SPAM",
            "Unsolicited bulk mail, phishing, cold marketing, anything the user never asked to receive.",
            Some("🗑️"),
        ),
        (
            "EnCopia",
            "En copia",
            "Mail where the user is one of many recipients and not the main addressee: CC floods, broadcast threads.",
            Some("👥"),
        ),
        (
            "Servicios",
            "Servicios",
            "Automated service mail: invoices, receipts, delivery notices, account and security notifications from known providers.",
            Some("🧾"),
        ),
    ];

    let conn = pool.get()?;
    let now = chrono::Utc::now().timestamp_millis();
    for (key, name, instruction, icon) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO categories
                (user_id, key, name, description, ai_instruction, icon, is_system, created_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, 1, ?6)",
            params![user_id, key, name, instruction, icon, now],
        )?;
    }
    Ok(())
}

//! Account rows. Transport configuration (IMAP/SMTP hosts, credentials)
//! belongs to the sync collaborator; the engine reads the classification
//! flags and owns the storage counters.

use rusqlite::{params, OptionalExtension};

use super::DbPool;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub email_address: String,
    pub is_active: bool,
    pub auto_classify: bool,
    pub custom_classification_prompt: Option<String>,
    pub custom_review_prompt: Option<String>,
    pub last_sync_error: Option<String>,
    pub mailbox_storage_bytes: Option<i64>,
    pub mailbox_storage_limit: Option<i64>,
}

pub struct NewAccount {
    pub user_id: i64,
    pub email_address: String,
    pub auto_classify: bool,
}

const ACCOUNT_COLUMNS: &str = "id, user_id, email_address, is_active, auto_classify, \
     custom_classification_prompt, custom_review_prompt, last_sync_error, \
     mailbox_storage_bytes, mailbox_storage_limit";

fn row_to_account(row: &rusqlite::Row) -> std::result::Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email_address: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
        auto_classify: row.get::<_, i64>(4)? != 0,
        custom_classification_prompt: row.get(5)?,
        custom_review_prompt: row.get(6)?,
        last_sync_error: row.get(7)?,
        mailbox_storage_bytes: row.get(8)?,
        mailbox_storage_limit: row.get(9)?,
    })
}

pub fn create_account(pool: &DbPool, account: &NewAccount) -> Result<i64> {
    let conn = pool.get()?;
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO accounts (user_id, email_address, auto_classify, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![
            account.user_id,
            account.email_address,
            account.auto_classify as i32,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_account(pool: &DbPool, account_id: i64) -> Result<Account> {
    let conn = pool.get()?;
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        params![account_id],
        row_to_account,
    )
    .optional()?
    .ok_or(EngineError::AccountNotFound(account_id))
}

pub fn list_accounts_for_user(pool: &DbPool, user_id: i64) -> Result<Vec<Account>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt.query_map(params![user_id], row_to_account)?;

    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row?);
    }
    Ok(accounts)
}

pub fn set_auto_classify(pool: &DbPool, account_id: i64, enabled: bool) -> Result<()> {
    let conn = pool.get()?;
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "UPDATE accounts SET auto_classify = ?1, updated_at = ?2 WHERE id = ?3",
        params![enabled as i32, now, account_id],
    )?;
    Ok(())
}

pub fn set_last_sync_error(pool: &DbPool, account_id: i64, error: Option<&str>) -> Result<()> {
    let conn = pool.get()?;
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "UPDATE accounts SET last_sync_error = ?1, updated_at = ?2 WHERE id = ?3",
        params![error, now, account_id],
    )?;
    Ok(())
}

/// Prompt overrides configured on the account, consumed when building
/// classifier prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptOverrides {
    pub classification: Option<String>,
    pub review: Option<String>,
}

impl From<&Account> for PromptOverrides {
    fn from(account: &Account) -> Self {
        Self {
            classification: account.custom_classification_prompt.clone(),
            review: account.custom_review_prompt.clone(),
        }
    }
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
    fn create_and_get() {
        let pool = test_pool();
        let id = create_account(
            &pool,
            &NewAccount {
                user_id: 1,
                email_address: "ana@example.com".to_string(),
                auto_classify: true,
            },
        )
        .unwrap();

        let account = get_account(&pool, id).unwrap();
        assert_eq!(account.email_address, "ana@example.com");
        assert!(account.auto_classify);
        assert!(account.is_active);
        assert_eq!(account.mailbox_storage_bytes, None);
    }

    #[test]
    fn missing_account_errors() {
        let pool = test_pool();
        let err = get_account(&pool, 42).unwrap_err();
        assert!(matches!(err, EngineError::AccountNotFound(42)));
    }

    #[test]
    fn sync_error_roundtrip() {
        let pool = test_pool();
        let id = create_account(
            &pool,
            &NewAccount {
                user_id: 1,
                email_address: "ana@example.com".to_string(),
                auto_classify: false,
            },
        )
        .unwrap();

        set_last_sync_error(&pool, id, Some("connection refused")).unwrap();
        assert_eq!(
            get_account(&pool, id).unwrap().last_sync_error.as_deref(),
            Some("connection refused")
        );

        set_last_sync_error(&pool, id, None).unwrap();
        assert_eq!(get_account(&pool, id).unwrap().last_sync_error, None);
    }
}

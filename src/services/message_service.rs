//! User-driven label operations.
//!
//! "Moving" a message is a metadata mutation on its classification row;
//! nothing physical moves until the Deleted folder is emptied. Soft deletes
//! are reversible and never touch the storage counters; permanent deletion
//! removes the rows and debits the account inside the same transaction.

use tracing::info;

use crate::adapters::sqlite::messages::{DELETED_LABEL, INBOX_LABEL};
use crate::adapters::sqlite::{classifications, messages, DbPool};
use crate::error::{EngineError, Result};
use crate::services::classify::Provenance;
use crate::services::storage;

/// Manually set or clear a message's label. Clearing removes the
/// classification row entirely, returning the message to the Inbox view.
pub fn set_manual_label(pool: &DbPool, message_id: &str, label: Option<&str>) -> Result<()> {
    if !messages::message_exists(pool, message_id)? {
        return Err(EngineError::MessageNotFound(message_id.to_string()));
    }

    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(label) => classifications::assign_label(
            pool,
            message_id,
            label,
            &Provenance::ManualUser.as_tag(),
            None,
        ),
        None => {
            classifications::clear_classification(pool, message_id)?;
            Ok(())
        }
    }
}

/// Soft delete: label-only transition to Deleted. Reversible, no storage
/// effect.
pub fn soft_delete(pool: &DbPool, message_id: &str) -> Result<()> {
    if !messages::message_exists(pool, message_id)? {
        return Err(EngineError::MessageNotFound(message_id.to_string()));
    }
    classifications::assign_label(
        pool,
        message_id,
        DELETED_LABEL,
        &Provenance::UserDelete.as_tag(),
        None,
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFolderOutcome {
    pub affected: usize,
    /// Bytes debited from the account; zero for soft transitions
    pub freed_bytes: i64,
}

/// Empty a folder. For the Deleted folder this permanently removes the
/// messages (attachments and classification rows cascade) and debits the
/// account's storage in the same transaction. Any other folder has its
/// current members soft-moved to Deleted.
pub fn empty_folder(
    pool: &DbPool,
    account_id: i64,
    folder: Option<&str>,
    classification_label: Option<&str>,
) -> Result<EmptyFolderOutcome> {
    let conn = pool.get()?;
    let tx = conn.unchecked_transaction()?;

    let outcome = if folder == Some(DELETED_LABEL) {
        let ids = messages::ids_with_label(&tx, account_id, DELETED_LABEL)?;
        // Sizes must be captured before the rows go away
        let freed_bytes = storage::bytes_for_messages(&tx, &ids)?;
        let affected = messages::delete_messages(&tx, &ids)?;
        storage::debit_storage(&tx, account_id, freed_bytes)?;

        info!(account_id, affected, freed_bytes, "Emptied Deleted folder");
        EmptyFolderOutcome {
            affected,
            freed_bytes,
        }
    } else {
        let ids = match classification_label {
            Some(label) if label != INBOX_LABEL => {
                messages::ids_with_label(&tx, account_id, label)?
            }
            _ => match folder {
                Some(INBOX_LABEL) | None => messages::unclassified_ids(&tx, account_id)?,
                Some(label) => messages::ids_with_label(&tx, account_id, label)?,
            },
        };

        let tag = Provenance::UserBulkDelete.as_tag();
        for id in &ids {
            classifications::assign_label_conn(&tx, id, DELETED_LABEL, &tag, None)?;
        }

        info!(account_id, affected = ids.len(), "Bulk-moved folder to Deleted");
        EmptyFolderOutcome {
            affected: ids.len(),
            freed_bytes: 0,
        }
    };

    tx.commit()?;
    Ok(outcome)
}

/// Mark every message in a label (or the whole account) read or unread.
/// Returns the number of rows that changed.
pub fn bulk_mark_read(
    pool: &DbPool,
    account_id: i64,
    classification_label: Option<&str>,
    is_read: bool,
) -> Result<usize> {
    let conn = pool.get()?;

    let changed = match classification_label {
        Some(label) => conn.execute(
            "UPDATE messages SET is_read = ?1
             WHERE account_id = ?2 AND is_read != ?1
               AND id IN (SELECT m.id FROM messages m
                          JOIN classifications c ON m.id = c.message_id
                          WHERE m.account_id = ?2 AND c.final_label = ?3)",
            rusqlite::params![is_read as i32, account_id, label],
        )?,
        None => conn.execute(
            "UPDATE messages SET is_read = ?1 WHERE account_id = ?2 AND is_read != ?1",
            rusqlite::params![is_read as i32, account_id],
        )?,
    };

    Ok(changed)
}

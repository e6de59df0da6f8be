//! Post-sync orchestration.
//!
//! The mailbox sync collaborator fetches messages and reports back; this
//! module decides whether a classification batch runs and records the
//! outcome in the audit log. Classification only triggers on a successful
//! sync that produced new messages, and only when the account asked for it.

use tracing::{info, warn};

use crate::adapters::ai::Classify;
use crate::adapters::sqlite::{accounts, audit, DbPool};
use crate::config::{AiConfig, RuleConfig};
use crate::error::Result;
use crate::services::classify::batch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// What the sync collaborator reports after fetching a mailbox.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub new_messages: u32,
    pub error: Option<String>,
}

/// Run the post-sync step: batch-classify when warranted, then write the
/// sync audit row. Returns the number of messages classified.
pub async fn after_sync<C: Classify + ?Sized>(
    pool: &DbPool,
    client: &C,
    ai: &AiConfig,
    rules: &RuleConfig,
    account_id: i64,
    report: &SyncReport,
    auto_classify: bool,
) -> Result<u32> {
    let mut classified_count = 0u32;

    if auto_classify && report.status == SyncStatus::Success && report.new_messages > 0 {
        match batch::classify_unprocessed(pool, client, ai, rules, account_id).await {
            Ok(outcome) => classified_count = outcome.classified as u32,
            // A failed batch must not fail the surrounding sync
            Err(e) => warn!(account_id, error = %e, "Batch classification failed"),
        }
    }

    accounts::set_last_sync_error(pool, account_id, report.error.as_deref())?;

    let payload = serde_json::json!({
        "account_id": account_id,
        "auto_classify": auto_classify,
        "new_messages": report.new_messages,
        "classified_count": classified_count,
    });
    audit::record(
        pool,
        "sync",
        None,
        Some(&payload),
        report.status.as_str(),
        report.error.as_deref(),
    )?;

    info!(
        account_id,
        new_messages = report.new_messages,
        classified_count,
        "Sync processed"
    );

    Ok(classified_count)
}

/// Recent sync outcomes, newest first, for the status surface.
pub fn recent_syncs(pool: &DbPool, limit: i64) -> Result<Vec<audit::AuditEntry>> {
    audit::recent(pool, "sync", limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::adapters::ai::Verdict;
    use crate::adapters::sqlite::messages;
    use crate::adapters::sqlite::messages::test_fixtures::*;

    struct Agreeable {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Classify for Agreeable {
        async fn classify(&self, _model: &str, _system: &str, _user: &str) -> Result<Verdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict {
                label: "Interesantes".to_string(),
                confidence: 0.8,
                rationale: String::new(),
            })
        }
    }

    fn success(new_messages: u32) -> SyncReport {
        SyncReport {
            status: SyncStatus::Success,
            new_messages,
            error: None,
        }
    }

    #[tokio::test]
    async fn classifies_and_audits_after_successful_sync() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        messages::insert_message(&pool, &simple_message(account_id, "b@x.com", "hola")).unwrap();

        let client = Agreeable {
            calls: AtomicUsize::new(0),
        };
        let count = after_sync(
            &pool,
            &client,
            &AiConfig::default(),
            &RuleConfig::default(),
            account_id,
            &success(1),
            true,
        )
        .await
        .unwrap();

        assert_eq!(count, 1);

        let syncs = recent_syncs(&pool, 10).unwrap();
        assert_eq!(syncs.len(), 1);
        let payload = syncs[0].payload.as_ref().unwrap();
        assert_eq!(payload["classified_count"], serde_json::json!(1));
        assert_eq!(syncs[0].status.as_deref(), Some("success"));
    }

    #[tokio::test]
    async fn no_new_messages_skips_classification() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        messages::insert_message(&pool, &simple_message(account_id, "b@x.com", "hola")).unwrap();

        let client = Agreeable {
            calls: AtomicUsize::new(0),
        };
        let count = after_sync(
            &pool,
            &client,
            &AiConfig::default(),
            &RuleConfig::default(),
            account_id,
            &success(0),
            true,
        )
        .await
        .unwrap();

        assert_eq!(count, 0);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_sync_is_audited_but_not_classified() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        messages::insert_message(&pool, &simple_message(account_id, "b@x.com", "hola")).unwrap();

        let client = Agreeable {
            calls: AtomicUsize::new(0),
        };
        let report = SyncReport {
            status: SyncStatus::Error,
            new_messages: 3,
            error: Some("connection reset".to_string()),
        };
        let count = after_sync(
            &pool,
            &client,
            &AiConfig::default(),
            &RuleConfig::default(),
            account_id,
            &report,
            true,
        )
        .await
        .unwrap();

        assert_eq!(count, 0);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);

        let syncs = recent_syncs(&pool, 10).unwrap();
        assert_eq!(syncs[0].status.as_deref(), Some("error"));
        assert_eq!(syncs[0].error_message.as_deref(), Some("connection reset"));

        let account = crate::adapters::sqlite::accounts::get_account(&pool, account_id).unwrap();
        assert_eq!(account.last_sync_error.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn auto_classify_off_skips_classification() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        messages::insert_message(&pool, &simple_message(account_id, "b@x.com", "hola")).unwrap();

        let client = Agreeable {
            calls: AtomicUsize::new(0),
        };
        let count = after_sync(
            &pool,
            &client,
            &AiConfig::default(),
            &RuleConfig::default(),
            account_id,
            &success(5),
            false,
        )
        .await
        .unwrap();

        assert_eq!(count, 0);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}

//! Sync-driven batch classification.
//!
//! Selects a bounded set of unclassified messages, runs each through the
//! rule/consensus pipeline, and persists every successful outcome in one
//! trailing transaction. The per-message loop is best-effort: a classifier
//! failure on one message is logged and skipped, never aborts the batch.
//! Messages left unclassified stay eligible for the next pass.

use tracing::{debug, info, warn};

use crate::adapters::ai::Classify;
use crate::adapters::sqlite::classifications::ClassificationRecord;
use crate::adapters::sqlite::{accounts, categories, classifications, messages, whitelist, DbPool};
use crate::config::{AiConfig, RuleConfig};
use crate::error::Result;

use super::rules::{self, RuleContext};
use super::{consensus, ClassificationInput};

/// Upper bound on records created per invocation.
pub const BATCH_LIMIT: i64 = 20;

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    /// Candidates selected for this pass
    pub selected: usize,
    /// Records written
    pub classified: usize,
    /// Candidates skipped after a classification failure
    pub skipped: usize,
}

/// Classify up to [`BATCH_LIMIT`] of the account's unclassified messages,
/// newest first. Returns the count of records written, for audit logging.
pub async fn classify_unprocessed<C: Classify + ?Sized>(
    pool: &DbPool,
    client: &C,
    ai: &AiConfig,
    rule_config: &RuleConfig,
    account_id: i64,
) -> Result<BatchOutcome> {
    let account = accounts::get_account(pool, account_id)?;
    let candidates = messages::unclassified_for_account(pool, account_id, BATCH_LIMIT)?;
    if candidates.is_empty() {
        return Ok(BatchOutcome::default());
    }

    // Loaded once for the whole batch
    let whitelist_domains = whitelist::active_domain_patterns(pool, account.user_id)?;
    let vocabulary = categories::list_for_user(pool, account.user_id)?;
    let overrides = accounts::PromptOverrides::from(&account);

    debug!(
        account_id,
        candidates = candidates.len(),
        whitelist = whitelist_domains.len(),
        "Starting classification batch"
    );

    // Value-collecting fold: accumulate successful records, persist once.
    let mut records: Vec<ClassificationRecord> = Vec::with_capacity(candidates.len());
    let mut skipped = 0;

    for msg in &candidates {
        let input = ClassificationInput::from_stored(msg);
        let recipients: Vec<String> = input
            .to_addresses
            .iter()
            .chain(input.cc_addresses.iter())
            .cloned()
            .collect();

        let rule_match = rules::evaluate(&RuleContext {
            sender: &input.from_email,
            recipients: &recipients,
            account_email: &account.email_address,
            whitelist_domains: &whitelist_domains,
            config: rule_config,
        });

        match consensus::resolve(client, ai, &input, rule_match, &vocabulary, &overrides).await {
            Ok(decision) => records.push(decision.into_record(&msg.id)),
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "Skipping message after classification failure");
                skipped += 1;
            }
        }
    }

    let classified = classifications::upsert_all(pool, &records)?;

    info!(
        account_id,
        selected = candidates.len(),
        classified,
        skipped,
        "Classification batch finished"
    );

    Ok(BatchOutcome {
        selected: candidates.len(),
        classified,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::adapters::ai::Verdict;
    use crate::adapters::sqlite::messages::test_fixtures::*;
    use crate::adapters::sqlite::messages::MessageFilter;
    use crate::error::EngineError;

    /// Agrees on the same label for every call, unless the prompt carries
    /// the failure marker.
    struct Uniform {
        label: &'static str,
        fail_marker: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Uniform {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                fail_marker: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Classify for Uniform {
        async fn classify(&self, _model: &str, _system: &str, user: &str) -> Result<Verdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = self.fail_marker {
                if user.contains(marker) {
                    return Err(EngineError::ClassifierUnavailable("down".to_string()));
                }
            }
            Ok(Verdict {
                label: self.label.to_string(),
                confidence: 0.8,
                rationale: String::new(),
            })
        }
    }

    fn configs() -> (AiConfig, RuleConfig) {
        (AiConfig::default(), RuleConfig::default())
    }

    #[tokio::test]
    async fn batch_is_bounded_to_twenty() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        for i in 0..25 {
            let mut msg = simple_message(account_id, "bob@x.com", &format!("m{i}"));
            msg.date = Some(1_000 + i);
            messages::insert_message(&pool, &msg).unwrap();
        }

        let (ai, rules) = configs();
        let client = Uniform::new("SPAM");
        let outcome = classify_unprocessed(&pool, &client, &ai, &rules, account_id)
            .await
            .unwrap();

        assert_eq!(outcome.selected, 20);
        assert_eq!(outcome.classified, 20);

        let remaining = messages::unclassified_for_account(&pool, account_id, 100).unwrap();
        assert_eq!(remaining.len(), 5);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        for subject in ["first", "roto", "third"] {
            messages::insert_message(&pool, &simple_message(account_id, "bob@x.com", subject))
                .unwrap();
        }

        let (ai, rules) = configs();
        let client = Uniform {
            label: "Interesantes",
            fail_marker: Some("roto"),
            calls: AtomicUsize::new(0),
        };
        let outcome = classify_unprocessed(&pool, &client, &ai, &rules, account_id)
            .await
            .unwrap();

        assert_eq!(outcome.selected, 3);
        assert_eq!(outcome.classified, 2);
        assert_eq!(outcome.skipped, 1);

        // The failed message is still eligible for a later pass
        let remaining = messages::unclassified_for_account(&pool, account_id, 100).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subject.as_deref(), Some("roto"));
    }

    #[tokio::test]
    async fn whitelisted_sender_short_circuits_without_classifier_calls() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        crate::adapters::sqlite::whitelist::add_entry(&pool, 1, "paypal.com", None).unwrap();
        let id = messages::insert_message(
            &pool,
            &simple_message(account_id, "service@mail.paypal.com", "Recibo"),
        )
        .unwrap();

        let (ai, rules) = configs();
        let client = Uniform::new("SPAM");
        let outcome = classify_unprocessed(&pool, &client, &ai, &rules, account_id)
            .await
            .unwrap();

        assert_eq!(outcome.classified, 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);

        let record = classifications::get_classification(&pool, &id)
            .unwrap()
            .unwrap();
        assert_eq!(record.final_label, "Servicios");
        assert_eq!(record.decided_by, "rule_whitelist");
        assert!(record.primary.is_none());
    }

    #[tokio::test]
    async fn classified_messages_leave_the_inbox_view() {
        let pool = test_pool();
        let account_id = seed_account(&pool);
        messages::insert_message(&pool, &simple_message(account_id, "bob@x.com", "hola")).unwrap();

        let (ai, rules) = configs();
        let client = Uniform::new("Interesantes");
        classify_unprocessed(&pool, &client, &ai, &rules, account_id)
            .await
            .unwrap();

        let inbox = messages::list_messages(
            &pool,
            &MessageFilter {
                account_id: Some(account_id),
                classification_label: Some(messages::INBOX_LABEL.to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(inbox.is_empty());
    }

    #[tokio::test]
    async fn empty_inbox_is_a_no_op() {
        let pool = test_pool();
        let account_id = seed_account(&pool);

        let (ai, rules) = configs();
        let client = Uniform::new("SPAM");
        let outcome = classify_unprocessed(&pool, &client, &ai, &rules, account_id)
            .await
            .unwrap();

        assert_eq!(outcome.selected, 0);
        assert_eq!(outcome.classified, 0);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }
}

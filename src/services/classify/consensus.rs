//! Consensus resolution across the two classifiers.
//!
//! The state machine for one message: a rule match decides immediately;
//! otherwise both classifiers must answer. Equal labels (trimmed,
//! case-insensitive) decide by consensus; differing labels trigger exactly
//! one review call on the primary model with both opinions in context. Any
//! classifier failure leaves the message undecided — partial failure must
//! never produce a record with a missing final label.
//!
//! Confidence scores are recorded for observability only; agreement is
//! decided on label equality alone.

use tracing::debug;

use crate::adapters::ai::{Classify, Verdict};
use crate::adapters::sqlite::accounts::PromptOverrides;
use crate::adapters::sqlite::categories::Category;
use crate::adapters::sqlite::classifications::{ClassificationRecord, Opinion};
use crate::config::AiConfig;
use crate::error::Result;

use super::prompt;
use super::rules::RuleMatch;
use super::{ClassificationInput, Provenance};

/// A resolved classification, ready to become a stored record.
#[derive(Debug, Clone)]
pub struct Decision {
    pub primary: Option<Verdict>,
    pub secondary: Option<Verdict>,
    pub final_label: String,
    pub final_reason: Option<String>,
    pub provenance: Provenance,
}

impl Decision {
    pub fn into_record(self, message_id: &str) -> ClassificationRecord {
        ClassificationRecord {
            message_id: message_id.to_string(),
            primary: self.primary.map(verdict_to_opinion),
            secondary: self.secondary.map(verdict_to_opinion),
            final_label: self.final_label,
            final_reason: self.final_reason,
            decided_by: self.provenance.as_tag(),
            decided_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

fn verdict_to_opinion(verdict: Verdict) -> Opinion {
    Opinion {
        label: verdict.label,
        confidence: verdict.confidence,
        rationale: if verdict.rationale.is_empty() {
            None
        } else {
            Some(verdict.rationale)
        },
    }
}

/// Resolve one message. `rule_match` short-circuits everything; the
/// classifiers are not consulted at all when a rule fired.
pub async fn resolve<C: Classify + ?Sized>(
    client: &C,
    ai: &AiConfig,
    input: &ClassificationInput,
    rule_match: Option<RuleMatch>,
    categories: &[Category],
    overrides: &PromptOverrides,
) -> Result<Decision> {
    if let Some(matched) = rule_match {
        debug!(label = %matched.label, "Rule short-circuit");
        return Ok(Decision {
            primary: None,
            secondary: None,
            final_label: matched.label,
            final_reason: Some(matched.reason),
            provenance: matched.provenance,
        });
    }

    let system = prompt::classification_system_prompt(categories, overrides.classification.as_deref());
    let user = prompt::classification_user_prompt(input);

    // The two calls are independent; issue them concurrently. Both must
    // succeed or the message stays unclassified.
    let (primary, secondary) = tokio::join!(
        client.classify(&ai.primary_model, &system, &user),
        client.classify(&ai.secondary_model, &system, &user),
    );
    let primary = primary?;
    let secondary = secondary?;

    if labels_agree(&primary.label, &secondary.label) {
        let final_label = primary.label.trim().to_string();
        let final_reason = pick_reason(&primary, &secondary);
        return Ok(Decision {
            primary: Some(primary),
            secondary: Some(secondary),
            final_label,
            final_reason,
            provenance: Provenance::Consensus,
        });
    }

    debug!(
        primary = %primary.label,
        secondary = %secondary.label,
        "Classifiers disagree, requesting review"
    );

    let review_system = prompt::review_system_prompt(categories, overrides.review.as_deref());
    let review_user = prompt::review_user_prompt(
        input,
        &ai.primary_model,
        &primary,
        &ai.secondary_model,
        &secondary,
    );
    let review = client
        .classify(&ai.primary_model, &review_system, &review_user)
        .await?;

    Ok(Decision {
        primary: Some(primary),
        secondary: Some(secondary),
        final_label: review.label.trim().to_string(),
        final_reason: if review.rationale.is_empty() {
            None
        } else {
            Some(review.rationale)
        },
        provenance: Provenance::Review {
            model: ai.primary_model.clone(),
        },
    })
}

fn labels_agree(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn pick_reason(primary: &Verdict, secondary: &Verdict) -> Option<String> {
    if !primary.rationale.is_empty() {
        Some(primary.rationale.clone())
    } else if !secondary.rationale.is_empty() {
        Some(secondary.rationale.clone())
    } else {
        None
    }
}

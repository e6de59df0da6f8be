//! Deterministic rule short-circuits.
//!
//! Rules run before any classifier call and always override AI opinion.
//! They are pure functions over already-validated envelope fields and never
//! touch the classifier endpoint. Precedence is the order of the `RULES`
//! slice; the first match wins.

use super::{normalize_address, Provenance};
use crate::config::RuleConfig;

/// Everything a rule may look at.
pub struct RuleContext<'a> {
    /// Sender address (raw header value is fine)
    pub sender: &'a str,
    /// Normalized To + Cc addresses
    pub recipients: &'a [String],
    /// The owning account's address, excluded from recipient counting
    pub account_email: &'a str,
    /// Active whitelist patterns, lowercased
    pub whitelist_domains: &'a [String],
    pub config: &'a RuleConfig,
}

#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub label: String,
    pub provenance: Provenance,
    pub reason: String,
}

type Rule = fn(&RuleContext) -> Option<RuleMatch>;

const RULES: &[Rule] = &[whitelist_rule, multiple_recipients_rule];

/// Evaluate the ordered rule list, first match wins.
pub fn evaluate(ctx: &RuleContext) -> Option<RuleMatch> {
    RULES.iter().find_map(|rule| rule(ctx))
}

fn whitelist_rule(ctx: &RuleContext) -> Option<RuleMatch> {
    let domain = sender_domain(ctx.sender)?;
    let pattern = ctx
        .whitelist_domains
        .iter()
        .find(|pattern| domain_matches(&domain, pattern))?;

    Some(RuleMatch {
        label: ctx.config.service_label.clone(),
        provenance: Provenance::RuleWhitelist,
        reason: format!("Sender domain {domain} matches whitelisted pattern {pattern}"),
    })
}

fn multiple_recipients_rule(ctx: &RuleContext) -> Option<RuleMatch> {
    let own = ctx.account_email.to_lowercase();
    let external = ctx
        .recipients
        .iter()
        .filter(|addr| !addr.eq_ignore_ascii_case(&own))
        .count();

    if external <= ctx.config.recipient_threshold {
        return None;
    }

    Some(RuleMatch {
        label: ctx.config.copy_label.clone(),
        provenance: Provenance::RuleMultipleRecipients,
        reason: format!("Message addressed to {external} external recipients"),
    })
}

/// Lowercased domain part of the sender address.
pub fn sender_domain(sender: &str) -> Option<String> {
    let addr = normalize_address(sender)?;
    addr.split_once('@').map(|(_, domain)| domain.to_string())
}

/// Suffix match: `mail.paypal.com` matches the pattern `paypal.com`.
fn domain_matches(domain: &str, pattern: &str) -> bool {
    let pattern = pattern.trim().trim_start_matches('.').to_lowercase();
    if pattern.is_empty() {
        return false;
    }
    domain == pattern || domain.ends_with(&format!(".{pattern}"))
}

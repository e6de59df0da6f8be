//! The classification pipeline: deterministic rules first, then two
//! independent classifiers, then consensus or review.

pub mod batch;
pub mod consensus;
pub mod prompt;
pub mod rules;

use crate::adapters::sqlite::messages::ClassifiableMessage;

/// Which mechanism produced a final label. Rendered into the
/// `decided_by` column as a closed set of tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Both classifiers returned the same label
    Consensus,
    /// A third call on the named model broke a disagreement
    Review { model: String },
    /// Sender domain matched the service whitelist
    RuleWhitelist,
    /// Message was addressed to many recipients
    RuleMultipleRecipients,
    /// User set the label by hand
    ManualUser,
    /// User soft-deleted the message
    UserDelete,
    /// User emptied a folder
    UserBulkDelete,
}

impl Provenance {
    pub fn as_tag(&self) -> String {
        match self {
            Self::Consensus => "consensus".to_string(),
            Self::Review { model } => format!("{}_review", short_model_name(model)),
            Self::RuleWhitelist => "rule_whitelist".to_string(),
            Self::RuleMultipleRecipients => "rule_multiple_recipients".to_string(),
            Self::ManualUser => "manual_user".to_string(),
            Self::UserDelete => "user_delete".to_string(),
            Self::UserBulkDelete => "user_bulk_delete".to_string(),
        }
    }
}

/// Short name for review tags: `gpt-4o-mini` becomes `gpt`, `qwen2.5:7b`
/// becomes `qwen2.5`.
pub fn short_model_name(model: &str) -> &str {
    model
        .split([':', '/', '-'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(model)
}

/// Pure classification input — envelope plus body, no database handles.
#[derive(Debug, Clone)]
pub struct ClassificationInput {
    pub from_name: Option<String>,
    pub from_email: String,
    /// Normalized bare addresses from To
    pub to_addresses: Vec<String>,
    /// Normalized bare addresses from Cc
    pub cc_addresses: Vec<String>,
    pub subject: Option<String>,
    pub date: Option<i64>,
    pub snippet: Option<String>,
    pub body_text: Option<String>,
}

impl ClassificationInput {
    pub fn from_stored(msg: &ClassifiableMessage) -> Self {
        Self {
            from_name: msg.from_name.clone(),
            from_email: msg.from_email.clone(),
            to_addresses: parse_address_list(&msg.to_addresses),
            cc_addresses: parse_address_list(&msg.cc_addresses),
            subject: msg.subject.clone(),
            date: msg.date,
            snippet: msg.snippet.clone(),
            body_text: msg.body_text.clone(),
        }
    }
}

/// Parse a stored JSON address array into normalized bare addresses.
/// Entries may carry display names ("Ana <ana@x.com>").
pub fn parse_address_list(json: &str) -> Vec<String> {
    let raw: Vec<String> = serde_json::from_str(json).unwrap_or_default();
    raw.iter()
        .filter_map(|entry| normalize_address(entry))
        .collect()
}

/// Extract the bare, lowercased address from a possibly display-named
/// mailbox string.
pub fn normalize_address(raw: &str) -> Option<String> {
    if let Ok(parsed) = mailparse::addrparse(raw) {
        let addr = parsed.iter().find_map(|entry| match entry {
            mailparse::MailAddr::Single(info) => Some(info.addr.to_lowercase()),
            mailparse::MailAddr::Group(group) => {
                group.addrs.first().map(|info| info.addr.to_lowercase())
            }
        });
        if addr.is_some() {
            return addr;
        }
    }

    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

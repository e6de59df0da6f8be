//! Prompt assembly for the classifier calls. The category vocabulary and
//! its per-category instructions come from the store; accounts may override
//! the leading instruction text.

use crate::adapters::ai::Verdict;
use crate::adapters::sqlite::categories::Category;

use super::ClassificationInput;

pub const BODY_SNIPPET_LEN: usize = 2000;

const DEFAULT_CLASSIFICATION_INSTRUCTION: &str =
    "You are an email classifier. Assign the email to exactly one of the \
     categories below.";

const DEFAULT_REVIEW_INSTRUCTION: &str =
    "You are resolving a disagreement between two email classifiers. Read \
     both opinions and the email, then pick the single best category.";

const RESPONSE_FORMAT: &str =
    "Respond with a single JSON object and nothing else: \
     {\"label\": \"<category key>\", \"confidence\": <0.0-1.0>, \
     \"rationale\": \"<one short sentence>\"}";

pub fn classification_system_prompt(categories: &[Category], custom: Option<&str>) -> String {
    let mut prompt = String::new();
    prompt.push_str(custom.unwrap_or(DEFAULT_CLASSIFICATION_INSTRUCTION));
    prompt.push_str("\n\nCategories:\n");
    push_category_list(&mut prompt, categories);
    prompt.push('\n');
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}

pub fn review_system_prompt(categories: &[Category], custom: Option<&str>) -> String {
    let mut prompt = String::new();
    prompt.push_str(custom.unwrap_or(DEFAULT_REVIEW_INSTRUCTION));
    prompt.push_str("\n\nCategories:\n");
    push_category_list(&mut prompt, categories);
    prompt.push('\n');
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}

fn push_category_list(prompt: &mut String, categories: &[Category]) {
    for category in categories {
        prompt.push_str("- ");
        prompt.push_str(&category.key);
        prompt.push_str(": ");
        prompt.push_str(&category.ai_instruction);
        prompt.push('\n');
    }
}

pub fn classification_user_prompt(input: &ClassificationInput) -> String {
    let mut prompt = String::new();
    prompt.push_str("From: ");
    if let Some(name) = input.from_name.as_deref() {
        prompt.push_str(name);
        prompt.push(' ');
    }
    prompt.push('<');
    prompt.push_str(&input.from_email);
    prompt.push_str(">\n");

    if !input.to_addresses.is_empty() {
        prompt.push_str("To: ");
        prompt.push_str(&input.to_addresses.join(", "));
        prompt.push('\n');
    }
    if !input.cc_addresses.is_empty() {
        prompt.push_str("Cc: ");
        prompt.push_str(&input.cc_addresses.join(", "));
        prompt.push('\n');
    }

    prompt.push_str("Subject: ");
    prompt.push_str(input.subject.as_deref().unwrap_or("(no subject)"));
    prompt.push('\n');

    if let Some(date) = input
        .date
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
    {
        prompt.push_str("Date: ");
        prompt.push_str(&date.to_rfc3339());
        prompt.push('\n');
    }

    let body = input
        .body_text
        .as_deref()
        .or(input.snippet.as_deref())
        .unwrap_or("");
    let snippet: String = body.chars().take(BODY_SNIPPET_LEN).collect();
    prompt.push_str("\nBody:\n");
    prompt.push_str(&snippet);

    prompt
}

/// User prompt for the tie-breaking review call: the email plus both prior
/// opinions and their rationales.
pub fn review_user_prompt(
    input: &ClassificationInput,
    primary_model: &str,
    primary: &Verdict,
    secondary_model: &str,
    secondary: &Verdict,
) -> String {
    format!(
        "{email}\n\n---\nClassifier opinions:\n\
         1. {primary_model}: \"{p_label}\" (confidence {p_conf:.2}) — {p_why}\n\
         2. {secondary_model}: \"{s_label}\" (confidence {s_conf:.2}) — {s_why}\n",
        email = classification_user_prompt(input),
        p_label = primary.label,
        p_conf = primary.confidence,
        p_why = if primary.rationale.is_empty() {
            "(no rationale)"
        } else {
            &primary.rationale
        },
        s_label = secondary.label,
        s_conf = secondary.confidence,
        s_why = if secondary.rationale.is_empty() {
            "(no rationale)"
        } else {
            &secondary.rationale
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(key: &str, instruction: &str) -> Category {
        Category {
            id: 0,
            user_id: 1,
            key: key.to_string(),
            name: key.to_string(),
            description: None,
            ai_instruction: instruction.to_string(),
            icon: None,
            is_system: true,
        }
    }

    fn input() -> ClassificationInput {
        ClassificationInput {
            from_name: Some("Ana".to_string()),
            from_email: "ana@x.com".to_string(),
            to_addresses: vec!["bob@y.com".to_string()],
            cc_addresses: vec![],
            subject: Some("Oferta".to_string()),
            date: None,
            snippet: None,
            body_text: Some("Compra ya".to_string()),
        }
    }

    #[test]
    fn system_prompt_lists_vocabulary() {
        let categories = vec![
            category("SPAM", "Unsolicited bulk mail."),
            category("Servicios", "Automated service mail."),
        ];
        let prompt = classification_system_prompt(&categories, None);
        assert!(prompt.contains("- SPAM: Unsolicited bulk mail."));
        assert!(prompt.contains("- Servicios:"));
        assert!(prompt.contains("single JSON object"));
    }

    #[test]
    fn custom_instruction_replaces_default_but_keeps_vocabulary() {
        let categories = vec![category("SPAM", "Junk.")];
        let prompt = classification_system_prompt(&categories, Some("Mi clasificador."));
        assert!(prompt.starts_with("Mi clasificador."));
        assert!(prompt.contains("- SPAM: Junk."));
    }

    #[test]
    fn review_prompt_carries_both_opinions() {
        let categories = vec![category("SPAM", "Junk.")];
        let _ = review_system_prompt(&categories, None);
        let prompt = review_user_prompt(
            &input(),
            "gpt-4o-mini",
            &Verdict {
                label: "SPAM".to_string(),
                confidence: 0.9,
                rationale: "promotional".to_string(),
            },
            "qwen2.5:7b",
            &Verdict {
                label: "Interesantes".to_string(),
                confidence: 0.6,
                rationale: String::new(),
            },
        );

        assert!(prompt.contains("gpt-4o-mini: \"SPAM\" (confidence 0.90) — promotional"));
        assert!(prompt.contains("qwen2.5:7b: \"Interesantes\""));
        assert!(prompt.contains("(no rationale)"));
        assert!(prompt.contains("Subject: Oferta"));
    }

    #[test]
    fn body_is_truncated() {
        let mut long = input();
        long.body_text = Some("x".repeat(10_000));
        let prompt = classification_user_prompt(&long);
        let body = prompt.split("Body:\n").nth(1).unwrap();
        assert_eq!(body.chars().count(), BODY_SNIPPET_LEN);
    }
}

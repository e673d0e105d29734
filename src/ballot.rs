use anyhow::{Result, anyhow};
use rust_decimal::Decimal;

/// Reserved label for the abstention bucket. It is never a configurable
/// option and is stored in the ledger as a null option.
pub const NO_VOTE_LABEL: &str = "No Vote";

pub const MAX_CEDULA_LEN: usize = 32;
pub const MAX_PERSON_NAME_LEN: usize = 128;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_UNIT_NAME_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 256;
pub const MAX_QUESTION_TEXT_LEN: usize = 512;
pub const MAX_OPTION_LABEL_LEN: usize = 128;
pub const MAX_QUESTION_OPTIONS: usize = 16;

const _: [(); 64 - MAX_QUESTION_OPTIONS] = [(); 64 - MAX_QUESTION_OPTIONS];
const _: [(); 1024 - MAX_QUESTION_TEXT_LEN] = [(); 1024 - MAX_QUESTION_TEXT_LEN];

/// Outcome of matching a submitted answer against a question's configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BallotChoice {
    /// Matched a configured option; carries the configured spelling.
    Configured(String),
    /// Matched the reserved abstention label.
    NoVote,
}

/// Strips common id separators and requires the remainder to be digits.
/// "1.234.567" and "1 234 567" both canonicalize to "1234567".
pub fn canonicalize_cedula(value: &str) -> Result<String> {
    let stripped: String = value
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '.' | '-'))
        .collect();
    if stripped.is_empty() {
        return Err(anyhow!("Cedula cannot be empty"));
    }
    if stripped.len() > MAX_CEDULA_LEN {
        return Err(anyhow!("Cedula exceeds {MAX_CEDULA_LEN} character limit"));
    }
    if !stripped.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(anyhow!("Cedula must contain only digits"));
    }
    Ok(stripped)
}

/// Trims and collapses internal whitespace runs to single spaces.
pub fn canonicalize_person_name(value: &str) -> Result<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(anyhow!("Name cannot be empty"));
    }
    if collapsed.chars().count() > MAX_PERSON_NAME_LEN {
        return Err(anyhow!("Name exceeds {MAX_PERSON_NAME_LEN} character limit"));
    }
    Ok(collapsed)
}

/// Phones are optional; a blank submission clears the field.
pub fn canonicalize_phone(value: &str) -> Result<Option<String>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_PHONE_LEN {
        return Err(anyhow!("Phone exceeds {MAX_PHONE_LEN} character limit"));
    }
    let valid = trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | '(' | ')' | ' ' | '.'));
    if !valid {
        return Err(anyhow!("Phone contains unsupported characters"));
    }
    Ok(Some(trimmed.to_string()))
}

pub fn canonicalize_unit_name(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Unit name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_UNIT_NAME_LEN {
        return Err(anyhow!(
            "Unit name exceeds {MAX_UNIT_NAME_LEN} character limit"
        ));
    }
    Ok(trimmed.to_string())
}

/// Aliquot scales vary by building (totals of 1, 100, and 1000 all occur),
/// so the only bounds are the sign and the DECIMAL(12,6) column.
pub fn validate_coefficient(value: Decimal) -> Result<Decimal> {
    if value < Decimal::ZERO {
        return Err(anyhow!("Coefficient cannot be negative"));
    }
    let cap = Decimal::new(999_999_999_999, 6);
    if value > cap {
        return Err(anyhow!("Coefficient exceeds the {cap} storage limit"));
    }
    Ok(value)
}

pub fn canonicalize_description(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Description cannot be empty"));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(anyhow!(
            "Description exceeds {MAX_DESCRIPTION_LEN} character limit"
        ));
    }
    Ok(trimmed.to_string())
}

pub fn canonicalize_question_text(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Question text cannot be empty"));
    }
    if trimmed.chars().count() > MAX_QUESTION_TEXT_LEN {
        return Err(anyhow!(
            "Question text exceeds {MAX_QUESTION_TEXT_LEN} character limit"
        ));
    }
    Ok(trimmed.to_string())
}

/// Case-insensitive key for label comparison. Unicode-aware so "Sí" and
/// "SÍ" collide.
pub fn label_key(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Validates a submitted option list and returns the canonical (trimmed)
/// labels in presentation order. Labels must be pairwise distinct under
/// [`label_key`] and must not claim the reserved abstention label.
pub fn validate_option_labels(labels: &[String]) -> Result<Vec<String>> {
    if labels.is_empty() {
        return Err(anyhow!("A question needs at least one option"));
    }
    if labels.len() > MAX_QUESTION_OPTIONS {
        return Err(anyhow!(
            "Too many options; limit is {MAX_QUESTION_OPTIONS}"
        ));
    }

    let reserved = label_key(NO_VOTE_LABEL);
    let mut canonical = Vec::with_capacity(labels.len());
    let mut seen = Vec::with_capacity(labels.len());
    for label in labels {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Option labels cannot be empty"));
        }
        if trimmed.chars().count() > MAX_OPTION_LABEL_LEN {
            return Err(anyhow!(
                "Option label exceeds {MAX_OPTION_LABEL_LEN} character limit"
            ));
        }
        let key = label_key(trimmed);
        if key == reserved {
            return Err(anyhow!("\"{NO_VOTE_LABEL}\" is reserved and cannot be configured"));
        }
        if seen.contains(&key) {
            return Err(anyhow!("Duplicate option label: {trimmed}"));
        }
        seen.push(key);
        canonical.push(trimmed.to_string());
    }
    Ok(canonical)
}

/// Matches a submitted answer against the configured labels, case
/// insensitively. A match returns the configured spelling, never the
/// submitted one. `None` means the answer is not valid for this question.
pub fn canonicalize_choice(raw: &str, configured: &[String]) -> Option<BallotChoice> {
    let key = label_key(raw);
    if key.is_empty() {
        return None;
    }
    if key == label_key(NO_VOTE_LABEL) {
        return Some(BallotChoice::NoVote);
    }
    configured
        .iter()
        .find(|label| label_key(label) == key)
        .map(|label| BallotChoice::Configured(label.clone()))
}

pub fn is_affirmative(label: &str, affirmative_labels: &[String]) -> bool {
    let key = label_key(label);
    affirmative_labels
        .iter()
        .any(|affirmative| label_key(affirmative) == key)
}

/// Ledger rows store abstention as a null option; views render the label.
pub fn option_display(label: Option<&str>) -> &str {
    label.unwrap_or(NO_VOTE_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn cedula_strips_separators() {
        assert_eq!(
            canonicalize_cedula(" 1.234.567 ").expect("valid cedula"),
            "1234567"
        );
        assert_eq!(
            canonicalize_cedula("12-345-678").expect("valid cedula"),
            "12345678"
        );
        assert!(canonicalize_cedula("").is_err());
        assert!(canonicalize_cedula("12a45").is_err());
    }

    #[test]
    fn person_name_collapses_whitespace() {
        assert_eq!(
            canonicalize_person_name("  Ana   María  ").expect("valid name"),
            "Ana María"
        );
        assert!(canonicalize_person_name("   ").is_err());
        let long_name = "a".repeat(MAX_PERSON_NAME_LEN + 1);
        assert!(canonicalize_person_name(&long_name).is_err());
    }

    #[test]
    fn phone_is_optional() {
        assert_eq!(canonicalize_phone("  ").expect("blank clears"), None);
        assert_eq!(
            canonicalize_phone("+57 300 123-4567").expect("valid phone"),
            Some("+57 300 123-4567".to_string())
        );
        assert!(canonicalize_phone("call me").is_err());
    }

    #[test]
    fn coefficient_accepts_per_mil_scales() {
        assert_eq!(
            validate_coefficient(Decimal::new(150, 0)).expect("per-mil unit"),
            Decimal::new(150, 0)
        );
        assert_eq!(
            validate_coefficient(Decimal::ZERO).expect("zero-weight unit"),
            Decimal::ZERO
        );
        assert!(validate_coefficient(Decimal::new(-25, 3)).is_err());
    }

    #[test]
    fn coefficient_stops_at_the_storage_limit() {
        let cap = Decimal::new(999_999_999_999, 6);
        assert_eq!(validate_coefficient(cap).expect("cap fits"), cap);
        assert!(validate_coefficient(Decimal::from(1_000_000)).is_err());
    }

    #[test]
    fn option_labels_must_be_distinct() {
        assert!(validate_option_labels(&labels(&["Acepta", "acepta"])).is_err());
        assert!(validate_option_labels(&labels(&["SÍ", "sí"])).is_err());
        let valid = validate_option_labels(&labels(&[" Acepta ", "Rechaza"])).expect("valid list");
        assert_eq!(valid, vec!["Acepta", "Rechaza"]);
    }

    #[test]
    fn option_labels_reject_reserved() {
        assert!(validate_option_labels(&labels(&["Sí", "no vote"])).is_err());
        assert!(validate_option_labels(&labels(&["NO VOTE"])).is_err());
        assert!(validate_option_labels(&[]).is_err());
    }

    #[test]
    fn choice_returns_configured_spelling() {
        let configured = labels(&["Sí", "No"]);
        assert_eq!(
            canonicalize_choice("sí", &configured),
            Some(BallotChoice::Configured("Sí".to_string()))
        );
        assert_eq!(
            canonicalize_choice(" NO ", &configured),
            Some(BallotChoice::Configured("No".to_string()))
        );
        assert_eq!(
            canonicalize_choice("no vote", &configured),
            Some(BallotChoice::NoVote)
        );
        assert_eq!(canonicalize_choice("Tal vez", &configured), None);
        assert_eq!(canonicalize_choice("", &configured), None);
    }

    #[test]
    fn affirmative_match_is_case_insensitive() {
        let affirmative = labels(&["Acepta", "Sí", "Aprueba"]);
        assert!(is_affirmative("ACEPTA", &affirmative));
        assert!(is_affirmative("sí", &affirmative));
        assert!(!is_affirmative("Rechaza", &affirmative));
    }

    #[test]
    fn option_display_names_the_null_bucket() {
        assert_eq!(option_display(Some("Acepta")), "Acepta");
        assert_eq!(option_display(None), NO_VOTE_LABEL);
    }
}

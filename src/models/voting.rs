use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReportView {
    pub question_id: i64,
    pub already_active: bool,
    pub closed_question_id: Option<i64>,
    pub eligible_entities: u64,
    pub eligible_units: u64,
    pub newly_seeded_units: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyBucketView {
    pub option: String,
    pub coefficient: Decimal,
    pub unit_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyView {
    pub question_id: i64,
    pub question_text: String,
    pub state: String,
    pub buckets: Vec<TallyBucketView>,
    pub total_condominium_coefficient: Decimal,
    pub total_participating_coefficient: Decimal,
    pub affirmative_coefficient: Decimal,
    pub participation_percent: Decimal,
    pub decision: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallotReceiptView {
    pub question_id: i64,
    pub cedula: String,
    pub display_name: String,
    pub option: String,
    pub units_recorded: u64,
    pub units_skipped: u64,
    pub recorded_coefficient: Decimal,
}

/// One row of the per-unit audit trail behind a question's tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRowView {
    pub unit_id: i64,
    pub unit_name: String,
    pub coefficient: Decimal,
    pub owner_name: Option<String>,
    pub executor_cedula: Option<String>,
    pub option: String,
    pub recorded_at: Option<DateTime<FixedOffset>>,
}

// Request types for the voting HTTP API

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterVoteRequest {
    pub cedula: String,
    pub option: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    // Coefficients must reach the client as exact decimal strings, never as
    // binary floats the chart layer would re-round.
    #[test]
    fn tally_bucket_serializes_coefficients_as_strings() {
        let bucket = TallyBucketView {
            option: "Acepta".to_string(),
            coefficient: Decimal::new(305, 3),
            unit_count: 2,
        };

        let value = serde_json::to_value(&bucket).expect("serializable");
        assert_eq!(value["option"], "Acepta");
        assert_eq!(value["coefficient"], "0.305");
        assert_eq!(value["unit_count"], 2);
    }

    #[test]
    fn ledger_row_serializes_untouched_seed_with_nulls() {
        let row = LedgerRowView {
            unit_id: 4,
            unit_name: "Apto 102".to_string(),
            coefficient: Decimal::new(25, 2),
            owner_name: Some("Rosa Pineda".to_string()),
            executor_cedula: None,
            option: "No Vote".to_string(),
            recorded_at: None,
        };

        let value = serde_json::to_value(&row).expect("serializable");
        assert!(value["executor_cedula"].is_null());
        assert!(value["recorded_at"].is_null());
        assert_eq!(value["option"], "No Vote");
        assert_eq!(value["coefficient"], "0.25");
    }
}

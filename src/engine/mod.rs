//! Transactional core of the assembly voting flow.
//!
//! Writers (`activate_question`, `register_vote`, `close_question`) each run
//! inside one transaction; readers (`resolve_eligible_voters`,
//! `tally_question`) are pure over the committed state and can run on any
//! connection. All coefficient arithmetic stays in [`Decimal`].

pub mod eligibility;
pub mod ledger;
pub mod lifecycle;
pub mod tally;

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, QuerySelect};

use crate::entities::question::{self, QuestionState};

pub use eligibility::{UnitShare, VotingEntity, resolve_eligible_voters};
pub use ledger::{BallotReceipt, register_vote};
pub use lifecycle::{ActivationReport, CloseOutcome, activate_question, close_question};
pub use tally::{Decision, TallyBucket, TallyOutcome, tally_question};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("assembly {assembly_id} not found")]
    AssemblyNotFound { assembly_id: i64 },
    #[error("question {question_id} not found")]
    QuestionNotFound { question_id: i64 },
    #[error("question {question_id} is closed")]
    QuestionClosed { question_id: i64 },
    #[error("question {question_id} is not open for voting; its state is {}", .state.as_str())]
    QuestionNotActive {
        question_id: i64,
        state: QuestionState,
    },
    #[error("\"{label}\" is not an option of question {question_id}")]
    UnknownOption { question_id: i64, label: String },
    #[error("{cedula} holds no voting rights on question {question_id}")]
    NotEligible { question_id: i64, cedula: String },
}

/// How a tally turns into a decision. Comes from configuration; the engine
/// never hardcodes the affirmative labels or the threshold.
#[derive(Clone, Debug)]
pub struct DecisionPolicy {
    /// Labels counted as a yes, matched case-insensitively.
    pub affirmative_labels: Vec<String>,
    /// Affirmative share of the participating coefficient must strictly
    /// exceed this percentage.
    pub approval_threshold_percent: Decimal,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            affirmative_labels: vec![
                "Acepta".to_string(),
                "Sí".to_string(),
                "Aprueba".to_string(),
            ],
            approval_threshold_percent: Decimal::from(50),
        }
    }
}

pub(crate) async fn find_question<C: ConnectionTrait>(
    conn: &C,
    question_id: i64,
) -> Result<question::Model, EngineError> {
    question::Entity::find_by_id(question_id)
        .one(conn)
        .await?
        .ok_or(EngineError::QuestionNotFound { question_id })
}

/// Row-locks the question so lifecycle transitions and ballot writes cannot
/// interleave with a concurrent double-invocation.
pub(crate) async fn find_question_for_update(
    txn: &DatabaseTransaction,
    question_id: i64,
) -> Result<question::Model, EngineError> {
    use sea_orm::sea_query::LockType;
    question::Entity::find_by_id(question_id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(EngineError::QuestionNotFound { question_id })
}

pub(crate) fn to_fixed_offset(time: DateTime<Utc>) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(0).unwrap();
    let converted = time.with_timezone(&offset);
    assert_eq!(
        converted.offset().local_minus_utc(),
        0,
        "Stored timestamps must stay on UTC"
    );
    assert!(converted.year() >= 1970, "Timestamp predates the epoch");
    converted
}

pub(crate) fn fixed_now() -> DateTime<FixedOffset> {
    to_fixed_offset(Utc::now())
}

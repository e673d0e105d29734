use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, TransactionTrait,
};
use tracing::{info, warn};

use crate::entities::prelude::Question;
use crate::entities::question::{self, QuestionState};
use crate::entities::vote;

use super::eligibility::resolve_eligible_voters;
use super::tally::{TallyOutcome, tally_question};
use super::{DecisionPolicy, EngineError, find_question_for_update, fixed_now};

#[derive(Clone, Debug)]
pub struct ActivationReport {
    pub question_id: i64,
    pub already_active: bool,
    /// The question this activation had to close to keep a single active
    /// question per assembly.
    pub closed_question_id: Option<i64>,
    pub eligible_entities: usize,
    pub eligible_units: usize,
    pub newly_seeded_units: usize,
}

#[derive(Clone, Debug)]
pub struct CloseOutcome {
    pub already_closed: bool,
    pub tally: TallyOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ActivationPlan {
    Seed,
    AlreadyActive,
}

fn plan_activation(question_id: i64, state: QuestionState) -> Result<ActivationPlan, EngineError> {
    match state {
        QuestionState::Inactive => Ok(ActivationPlan::Seed),
        QuestionState::Active => Ok(ActivationPlan::AlreadyActive),
        QuestionState::Closed => Err(EngineError::QuestionClosed { question_id }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClosePlan {
    Close,
    AlreadyClosed,
}

fn plan_close(question_id: i64, state: QuestionState) -> Result<ClosePlan, EngineError> {
    match state {
        QuestionState::Active => Ok(ClosePlan::Close),
        QuestionState::Closed => Ok(ClosePlan::AlreadyClosed),
        QuestionState::Inactive => Err(EngineError::QuestionNotActive { question_id, state }),
    }
}

/// Opens a question for voting in one transaction: closes any other active
/// question of the assembly, snapshots eligibility, and seeds one abstention
/// ledger row per reachable unit. Seeding is insert-if-absent, so a repeated
/// call never duplicates rows nor touches votes already cast.
pub async fn activate_question(
    db: &DatabaseConnection,
    question_id: i64,
) -> Result<ActivationReport, EngineError> {
    let txn = db.begin().await?;
    let question = find_question_for_update(&txn, question_id).await?;

    if plan_activation(question_id, question.state)? == ActivationPlan::AlreadyActive {
        info!(question_id, "Question is already active; nothing to do");
        txn.commit().await?;
        return Ok(ActivationReport {
            question_id,
            already_active: true,
            closed_question_id: None,
            eligible_entities: 0,
            eligible_units: 0,
            newly_seeded_units: 0,
        });
    }

    let now = fixed_now();

    let previously_active = Question::find()
        .filter(question::Column::AssemblyId.eq(question.assembly_id))
        .filter(question::Column::State.eq(QuestionState::Active))
        .filter(question::Column::QuestionId.ne(question_id))
        .all(&txn)
        .await?;
    let mut closed_question_id = None;
    for open in previously_active {
        info!(
            question_id = open.question_id,
            "Closing the previously active question first"
        );
        let open_id = open.question_id;
        let mut model = open.into_active_model();
        model.state = Set(QuestionState::Closed);
        model.closed_at = Set(Some(now));
        model.update(&txn).await?;
        closed_question_id = Some(open_id);
    }

    let entities = resolve_eligible_voters(&txn, question.assembly_id).await?;
    let eligible_entities = entities.len();
    let eligible_units: usize = entities.iter().map(|entity| entity.units.len()).sum();
    if eligible_units == 0 {
        warn!(
            question_id,
            "Activating with zero eligible units; the ledger starts empty"
        );
    }

    let mut newly_seeded_units = 0usize;
    for entity in &entities {
        for unit in &entity.units {
            let seed = vote::ActiveModel {
                question_id: Set(question_id),
                unit_id: Set(unit.unit_id),
                executor_cedula: Set(None),
                option_label: Set(None),
                recorded_at: Set(None),
                ..Default::default()
            };
            let inserted = vote::Entity::insert(seed)
                .on_conflict(
                    OnConflict::columns([vote::Column::QuestionId, vote::Column::UnitId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await;
            match inserted {
                Ok(rows) => newly_seeded_units += rows as usize,
                Err(DbErr::RecordNotInserted) => {}
                Err(other) => return Err(other.into()),
            }
        }
    }

    let mut model = question.into_active_model();
    model.state = Set(QuestionState::Active);
    model.activated_at = Set(Some(now));
    model.update(&txn).await?;
    txn.commit().await?;

    info!(
        question_id,
        eligible_entities, eligible_units, newly_seeded_units, "Question activated"
    );

    Ok(ActivationReport {
        question_id,
        already_active: false,
        closed_question_id,
        eligible_entities,
        eligible_units,
        newly_seeded_units,
    })
}

/// Closes voting and computes the final tally in the same transaction.
/// Closing an already closed question just reports its tally again.
pub async fn close_question(
    db: &DatabaseConnection,
    question_id: i64,
    policy: &DecisionPolicy,
) -> Result<CloseOutcome, EngineError> {
    let txn = db.begin().await?;
    let question = find_question_for_update(&txn, question_id).await?;

    if plan_close(question_id, question.state)? == ClosePlan::AlreadyClosed {
        info!(question_id, "Question is already closed; reporting its tally");
        let tally = tally_question(&txn, question_id, policy).await?;
        txn.commit().await?;
        return Ok(CloseOutcome {
            already_closed: true,
            tally,
        });
    }

    let now = fixed_now();
    let mut model = question.into_active_model();
    model.state = Set(QuestionState::Closed);
    model.closed_at = Set(Some(now));
    model.update(&txn).await?;

    let tally = tally_question(&txn, question_id, policy).await?;
    txn.commit().await?;

    info!(
        question_id,
        decision = tally.decision.as_str(),
        "Question closed"
    );
    Ok(CloseOutcome {
        already_closed: false,
        tally,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_depends_only_on_current_state() {
        assert_eq!(
            plan_activation(1, QuestionState::Inactive).expect("inactive activates"),
            ActivationPlan::Seed
        );
        assert_eq!(
            plan_activation(1, QuestionState::Active).expect("active is a no-op"),
            ActivationPlan::AlreadyActive
        );
        assert!(matches!(
            plan_activation(1, QuestionState::Closed),
            Err(EngineError::QuestionClosed { question_id: 1 })
        ));
    }

    #[test]
    fn closing_requires_an_open_question() {
        assert_eq!(
            plan_close(1, QuestionState::Active).expect("active closes"),
            ClosePlan::Close
        );
        assert_eq!(
            plan_close(1, QuestionState::Closed).expect("closed reports"),
            ClosePlan::AlreadyClosed
        );
        assert!(matches!(
            plan_close(1, QuestionState::Inactive),
            Err(EngineError::QuestionNotActive {
                question_id: 1,
                state: QuestionState::Inactive,
            })
        ));
    }
}

use std::collections::HashSet;

use rust_decimal::Decimal;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, TransactionTrait,
};
use tracing::{info, warn};

use crate::ballot::{self, BallotChoice};
use crate::entities::prelude::{QuestionOption, Vote};
use crate::entities::question::QuestionState;
use crate::entities::{question_option, vote};

use super::eligibility::{UnitShare, VotingEntity, resolve_eligible_voters};
use super::{EngineError, find_question_for_update, fixed_now};

#[derive(Clone, Debug)]
pub struct BallotReceipt {
    pub question_id: i64,
    pub executor_cedula: String,
    pub display_name: String,
    /// Canonical stored option; `None` is the reserved abstention.
    pub option_label: Option<String>,
    pub units_recorded: Vec<UnitShare>,
    /// Units the person represents now that were not seeded at activation.
    /// The activation snapshot wins; these stay out of this question.
    pub units_skipped: Vec<UnitShare>,
    pub recorded_coefficient: Decimal,
}

/// Records one person's answer on every unit they represent, atomically.
/// Re-registration overwrites the prior answer on the same rows.
pub async fn register_vote(
    db: &DatabaseConnection,
    question_id: i64,
    cedula: &str,
    option: &str,
) -> Result<BallotReceipt, EngineError> {
    assert!(!cedula.trim().is_empty(), "Executor cedula cannot be empty");

    let txn = db.begin().await?;
    let question = find_question_for_update(&txn, question_id).await?;
    match question.state {
        QuestionState::Active => {}
        QuestionState::Closed => return Err(EngineError::QuestionClosed { question_id }),
        QuestionState::Inactive => {
            return Err(EngineError::QuestionNotActive {
                question_id,
                state: question.state,
            });
        }
    }

    let configured: Vec<String> = QuestionOption::find()
        .filter(question_option::Column::QuestionId.eq(question_id))
        .order_by_asc(question_option::Column::Position)
        .all(&txn)
        .await?
        .into_iter()
        .map(|row| row.label)
        .collect();
    let stored_label = match ballot::canonicalize_choice(option, &configured) {
        Some(BallotChoice::Configured(label)) => Some(label),
        Some(BallotChoice::NoVote) => None,
        None => {
            return Err(EngineError::UnknownOption {
                question_id,
                label: option.trim().to_string(),
            });
        }
    };

    let entities = resolve_eligible_voters(&txn, question.assembly_id).await?;
    let entity = entities
        .into_iter()
        .find(|entity| entity.cedula == cedula)
        .ok_or_else(|| EngineError::NotEligible {
            question_id,
            cedula: cedula.to_string(),
        })?;

    let represented_ids: Vec<i64> = entity.units.iter().map(|unit| unit.unit_id).collect();
    let seeded_rows = Vote::find()
        .filter(vote::Column::QuestionId.eq(question_id))
        .filter(vote::Column::UnitId.is_in(represented_ids))
        .all(&txn)
        .await?;
    let seeded_ids: HashSet<i64> = seeded_rows.iter().map(|row| row.unit_id).collect();
    let (units_recorded, units_skipped) = partition_seeded(&entity, &seeded_ids);

    if units_recorded.is_empty() {
        // Eligibility acquired after activation never enters the ledger.
        return Err(EngineError::NotEligible {
            question_id,
            cedula: cedula.to_string(),
        });
    }
    if !units_skipped.is_empty() {
        warn!(
            question_id,
            executor = %entity.cedula,
            skipped = units_skipped.len(),
            "Represented units missing from the activation snapshot were skipped"
        );
    }

    let now = fixed_now();
    for row in seeded_rows {
        let mut model = row.into_active_model();
        model.executor_cedula = Set(Some(entity.cedula.clone()));
        model.option_label = Set(stored_label.clone());
        model.recorded_at = Set(Some(now));
        model.update(&txn).await?;
    }
    txn.commit().await?;

    let recorded_coefficient: Decimal = units_recorded.iter().map(|unit| unit.coefficient).sum();
    info!(
        question_id,
        executor = %entity.cedula,
        units = units_recorded.len(),
        option = ballot::option_display(stored_label.as_deref()),
        "Ballot recorded"
    );

    Ok(BallotReceipt {
        question_id,
        executor_cedula: entity.cedula,
        display_name: entity.display_name,
        option_label: stored_label,
        units_recorded,
        units_skipped,
        recorded_coefficient,
    })
}

fn partition_seeded(
    entity: &VotingEntity,
    seeded_ids: &HashSet<i64>,
) -> (Vec<UnitShare>, Vec<UnitShare>) {
    let mut recorded = Vec::with_capacity(entity.units.len());
    let mut skipped = Vec::new();
    for unit in &entity.units {
        if seeded_ids.contains(&unit.unit_id) {
            recorded.push(unit.clone());
        } else {
            skipped.push(unit.clone());
        }
    }
    (recorded, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(unit_id: i64, coefficient: Decimal) -> UnitShare {
        UnitShare {
            unit_id,
            name: format!("U{unit_id}"),
            coefficient,
        }
    }

    fn entity(units: Vec<UnitShare>) -> VotingEntity {
        let total = units.iter().map(|unit| unit.coefficient).sum();
        VotingEntity {
            cedula: "100".to_string(),
            display_name: "Olga".to_string(),
            units,
            total_coefficient: total,
        }
    }

    #[test]
    fn partition_respects_the_activation_snapshot() {
        let entity = entity(vec![
            share(1, Decimal::new(30, 2)),
            share(2, Decimal::new(20, 2)),
            share(3, Decimal::new(50, 2)),
        ]);
        let seeded: HashSet<i64> = [1, 3].into_iter().collect();

        let (recorded, skipped) = partition_seeded(&entity, &seeded);
        let recorded_ids: Vec<i64> = recorded.iter().map(|unit| unit.unit_id).collect();
        let skipped_ids: Vec<i64> = skipped.iter().map(|unit| unit.unit_id).collect();
        assert_eq!(recorded_ids, vec![1, 3]);
        assert_eq!(skipped_ids, vec![2]);
    }

    #[test]
    fn full_snapshot_records_every_unit() {
        let entity = entity(vec![
            share(1, Decimal::new(30, 2)),
            share(2, Decimal::new(70, 2)),
        ]);
        let seeded: HashSet<i64> = [1, 2].into_iter().collect();

        let (recorded, skipped) = partition_seeded(&entity, &seeded);
        assert_eq!(recorded.len(), 2);
        assert!(skipped.is_empty());

        let recorded_total: Decimal = recorded.iter().map(|unit| unit.coefficient).sum();
        assert_eq!(recorded_total, Decimal::ONE);
    }
}

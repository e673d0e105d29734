use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::warn;

use crate::ballot::{is_affirmative, label_key};
use crate::entities::prelude::{QuestionOption, Unit, Vote};
use crate::entities::question::{self, QuestionState};
use crate::entities::{question_option, unit, vote};

use super::eligibility::UnitShare;
use super::{DecisionPolicy, EngineError, find_question};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approved,
    NotApproved,
    Undetermined,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::NotApproved => "NOT_APPROVED",
            Decision::Undetermined => "UNDETERMINED",
        }
    }
}

/// One option's aggregate. A `None` label is the abstention bucket, always
/// ordered last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TallyBucket {
    pub label: Option<String>,
    pub coefficient: Decimal,
    pub unit_count: usize,
}

#[derive(Clone, Debug)]
pub struct TallyOutcome {
    pub question_id: i64,
    pub question_text: String,
    pub state: QuestionState,
    pub buckets: Vec<TallyBucket>,
    pub total_condominium_coefficient: Decimal,
    pub total_participating_coefficient: Decimal,
    pub affirmative_coefficient: Decimal,
    pub participation_percent: Decimal,
    pub decision: Decision,
}

/// Repeatable read over the ledger. Callable at any point of the question
/// lifecycle; the same ledger contents always produce the same outcome.
pub async fn tally_question<C: ConnectionTrait>(
    conn: &C,
    question_id: i64,
    policy: &DecisionPolicy,
) -> Result<TallyOutcome, EngineError> {
    let question = find_question(conn, question_id).await?;

    let configured: Vec<String> = QuestionOption::find()
        .filter(question_option::Column::QuestionId.eq(question_id))
        .order_by_asc(question_option::Column::Position)
        .all(conn)
        .await?
        .into_iter()
        .map(|option| option.label)
        .collect();

    // Only owned units count toward the denominator.
    let owned_units: Vec<UnitShare> = Unit::find()
        .filter(unit::Column::OwnerCedula.is_not_null())
        .order_by_asc(unit::Column::UnitId)
        .all(conn)
        .await?
        .into_iter()
        .map(|unit| UnitShare {
            unit_id: unit.unit_id,
            name: unit.name,
            coefficient: unit.coefficient,
        })
        .collect();

    let ledger: HashMap<i64, Option<String>> = Vote::find()
        .filter(vote::Column::QuestionId.eq(question_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|row| (row.unit_id, row.option_label))
        .collect();

    Ok(compute_tally(
        &question,
        &configured,
        &owned_units,
        &ledger,
        policy,
    ))
}

/// Pure aggregation. Every owned unit lands in exactly one bucket: its
/// ledger option when present, the abstention bucket otherwise. The decision
/// needs the affirmative share to strictly exceed the threshold among
/// participating units.
pub fn compute_tally(
    question: &question::Model,
    configured_labels: &[String],
    owned_units: &[UnitShare],
    ledger: &HashMap<i64, Option<String>>,
    policy: &DecisionPolicy,
) -> TallyOutcome {
    assert!(
        policy.approval_threshold_percent > Decimal::ZERO,
        "Approval threshold must be positive"
    );
    assert!(
        policy.approval_threshold_percent <= Decimal::ONE_HUNDRED,
        "Approval threshold cannot exceed 100"
    );

    let mut buckets: Vec<TallyBucket> = configured_labels
        .iter()
        .map(|label| TallyBucket {
            label: Some(label.clone()),
            coefficient: Decimal::ZERO,
            unit_count: 0,
        })
        .collect();
    let mut no_vote = TallyBucket {
        label: None,
        coefficient: Decimal::ZERO,
        unit_count: 0,
    };

    for unit in owned_units {
        let stored = ledger.get(&unit.unit_id).cloned().flatten();
        match stored {
            Some(label) => {
                let key = label_key(&label);
                let position = buckets.iter().position(|bucket| {
                    bucket
                        .label
                        .as_deref()
                        .is_some_and(|existing| label_key(existing) == key)
                });
                match position {
                    Some(index) => {
                        buckets[index].coefficient += unit.coefficient;
                        buckets[index].unit_count += 1;
                    }
                    None => {
                        // Ledger drift: a stored label no option claims.
                        // Counted in its own bucket rather than folded into
                        // abstentions.
                        warn!(
                            unit = %unit.name,
                            label = %label,
                            "Ledger option is not configured for this question"
                        );
                        buckets.push(TallyBucket {
                            label: Some(label),
                            coefficient: unit.coefficient,
                            unit_count: 1,
                        });
                    }
                }
            }
            None => {
                no_vote.coefficient += unit.coefficient;
                no_vote.unit_count += 1;
            }
        }
    }
    buckets.push(no_vote);

    let total: Decimal = owned_units.iter().map(|unit| unit.coefficient).sum();
    let bucket_sum: Decimal = buckets.iter().map(|bucket| bucket.coefficient).sum();
    assert_eq!(bucket_sum, total, "Each owned unit lands in exactly one bucket");

    let participating: Decimal = buckets
        .iter()
        .filter(|bucket| bucket.label.is_some())
        .map(|bucket| bucket.coefficient)
        .sum();
    let affirmative: Decimal = buckets
        .iter()
        .filter_map(|bucket| {
            bucket
                .label
                .as_deref()
                .map(|label| (label, bucket.coefficient))
        })
        .filter(|(label, _)| is_affirmative(label, &policy.affirmative_labels))
        .map(|(_, coefficient)| coefficient)
        .sum();

    let participation_percent = (participating * Decimal::ONE_HUNDRED)
        .checked_div(total)
        .unwrap_or(Decimal::ZERO);

    let decision = if participating.is_zero() {
        Decision::Undetermined
    } else if affirmative * Decimal::ONE_HUNDRED
        > policy.approval_threshold_percent * participating
    {
        Decision::Approved
    } else {
        Decision::NotApproved
    };

    TallyOutcome {
        question_id: question.question_id,
        question_text: question.text.clone(),
        state: question.state,
        buckets,
        total_condominium_coefficient: total,
        total_participating_coefficient: participating,
        affirmative_coefficient: affirmative,
        participation_percent,
        decision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};

    fn ts() -> DateTime<FixedOffset> {
        DateTime::from_timestamp(0, 0).expect("epoch").fixed_offset()
    }

    fn question() -> question::Model {
        question::Model {
            question_id: 7,
            assembly_id: 1,
            text: "Aprobar presupuesto 2026".to_string(),
            state: QuestionState::Active,
            created_at: ts(),
            activated_at: Some(ts()),
            closed_at: None,
        }
    }

    fn share(unit_id: i64, name: &str, coefficient: Decimal) -> UnitShare {
        UnitShare {
            unit_id,
            name: name.to_string(),
            coefficient,
        }
    }

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn ledger(entries: &[(i64, Option<&str>)]) -> HashMap<i64, Option<String>> {
        entries
            .iter()
            .map(|(unit_id, label)| (*unit_id, label.map(|value| value.to_string())))
            .collect()
    }

    fn bucket_for<'a>(outcome: &'a TallyOutcome, label: Option<&str>) -> &'a TallyBucket {
        outcome
            .buckets
            .iter()
            .find(|bucket| bucket.label.as_deref() == label)
            .expect("bucket exists")
    }

    #[test]
    fn three_unit_scenario_splits_fifty_fifty() {
        let owned = vec![
            share(1, "U1", Decimal::new(30, 2)),
            share(2, "U2", Decimal::new(20, 2)),
            share(3, "U3", Decimal::new(50, 2)),
        ];
        let ledger = ledger(&[
            (1, Some("Acepta")),
            (2, Some("Acepta")),
            (3, Some("No Acepta")),
        ]);

        let outcome = compute_tally(
            &question(),
            &labels(&["Acepta", "No Acepta"]),
            &owned,
            &ledger,
            &DecisionPolicy::default(),
        );

        assert_eq!(bucket_for(&outcome, Some("Acepta")).coefficient, Decimal::new(50, 2));
        assert_eq!(bucket_for(&outcome, Some("Acepta")).unit_count, 2);
        assert_eq!(
            bucket_for(&outcome, Some("No Acepta")).coefficient,
            Decimal::new(50, 2)
        );
        assert_eq!(bucket_for(&outcome, None).unit_count, 0);
        assert_eq!(outcome.total_condominium_coefficient, Decimal::ONE);
        assert_eq!(outcome.total_participating_coefficient, Decimal::ONE);
        assert_eq!(outcome.participation_percent, Decimal::ONE_HUNDRED);
        // Exactly half affirmative is not a strict majority.
        assert_eq!(outcome.decision, Decision::NotApproved);
    }

    #[test]
    fn units_without_ledger_rows_count_as_abstention() {
        let owned = vec![
            share(1, "U1", Decimal::new(40, 2)),
            share(2, "U2", Decimal::new(60, 2)),
        ];
        let ledger = ledger(&[(1, Some("Acepta"))]);

        let outcome = compute_tally(
            &question(),
            &labels(&["Acepta", "No Acepta"]),
            &owned,
            &ledger,
            &DecisionPolicy::default(),
        );

        let abstention = bucket_for(&outcome, None);
        assert_eq!(abstention.coefficient, Decimal::new(60, 2));
        assert_eq!(abstention.unit_count, 1);
        assert_eq!(outcome.total_participating_coefficient, Decimal::new(40, 2));
        assert_eq!(outcome.participation_percent, Decimal::new(40, 0));
        assert_eq!(outcome.decision, Decision::Approved);
    }

    #[test]
    fn all_abstentions_yield_undetermined() {
        let owned = vec![share(1, "U1", Decimal::new(100, 2))];
        let outcome = compute_tally(
            &question(),
            &labels(&["Acepta"]),
            &owned,
            &ledger(&[(1, None)]),
            &DecisionPolicy::default(),
        );

        assert_eq!(outcome.decision, Decision::Undetermined);
        assert!(outcome.total_participating_coefficient.is_zero());
        assert!(outcome.participation_percent.is_zero());
    }

    #[test]
    fn empty_building_yields_undetermined() {
        let outcome = compute_tally(
            &question(),
            &labels(&["Acepta"]),
            &[],
            &HashMap::new(),
            &DecisionPolicy::default(),
        );

        assert_eq!(outcome.decision, Decision::Undetermined);
        assert!(outcome.total_condominium_coefficient.is_zero());
        assert!(outcome.participation_percent.is_zero());
    }

    #[test]
    fn strict_majority_is_required() {
        let owned = vec![
            share(1, "U1", Decimal::new(51, 2)),
            share(2, "U2", Decimal::new(49, 2)),
        ];
        let winning = compute_tally(
            &question(),
            &labels(&["Acepta", "No Acepta"]),
            &owned,
            &ledger(&[(1, Some("Acepta")), (2, Some("No Acepta"))]),
            &DecisionPolicy::default(),
        );
        assert_eq!(winning.decision, Decision::Approved);

        let losing = compute_tally(
            &question(),
            &labels(&["Acepta", "No Acepta"]),
            &owned,
            &ledger(&[(1, Some("No Acepta")), (2, Some("Acepta"))]),
            &DecisionPolicy::default(),
        );
        assert_eq!(losing.decision, Decision::NotApproved);
    }

    #[test]
    fn affirmative_labels_match_case_insensitively() {
        let owned = vec![
            share(1, "U1", Decimal::new(60, 2)),
            share(2, "U2", Decimal::new(40, 2)),
        ];
        // Configured spelling differs from the policy's spelling.
        let outcome = compute_tally(
            &question(),
            &labels(&["SÍ", "No"]),
            &owned,
            &ledger(&[(1, Some("SÍ")), (2, Some("No"))]),
            &DecisionPolicy::default(),
        );

        assert_eq!(outcome.affirmative_coefficient, Decimal::new(60, 2));
        assert_eq!(outcome.decision, Decision::Approved);
    }

    #[test]
    fn growing_affirmative_share_never_revokes_approval() {
        let policy = DecisionPolicy::default();
        let configured = labels(&["Acepta", "No Acepta"]);
        let mut approved_seen = false;

        for affirmative_mantissa in [10i64, 30, 50, 51, 70, 90] {
            let owned = vec![
                share(1, "U1", Decimal::new(affirmative_mantissa, 2)),
                share(2, "U2", Decimal::new(100 - affirmative_mantissa, 2)),
            ];
            let outcome = compute_tally(
                &question(),
                &configured,
                &owned,
                &ledger(&[(1, Some("Acepta")), (2, Some("No Acepta"))]),
                &policy,
            );
            if approved_seen {
                assert_eq!(outcome.decision, Decision::Approved);
            }
            if outcome.decision == Decision::Approved {
                approved_seen = true;
            }
        }
        assert!(approved_seen, "the sweep must cross the threshold");
    }

    #[test]
    fn unconfigured_ledger_labels_keep_conservation() {
        let owned = vec![
            share(1, "U1", Decimal::new(25, 2)),
            share(2, "U2", Decimal::new(35, 2)),
            share(3, "U3", Decimal::new(40, 2)),
        ];
        // Unit 2 carries a label that no longer matches any option.
        let outcome = compute_tally(
            &question(),
            &labels(&["Acepta"]),
            &owned,
            &ledger(&[(1, Some("Acepta")), (2, Some("Obsoleta"))]),
            &DecisionPolicy::default(),
        );

        let bucket_sum: Decimal = outcome.buckets.iter().map(|bucket| bucket.coefficient).sum();
        assert_eq!(bucket_sum, outcome.total_condominium_coefficient);
        assert_eq!(
            bucket_for(&outcome, Some("Obsoleta")).coefficient,
            Decimal::new(35, 2)
        );
        // Abstention stays last even with a drifted bucket in between.
        assert!(outcome.buckets.last().expect("buckets").label.is_none());
    }
}

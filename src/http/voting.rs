use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::info;

use crate::ballot;
use crate::engine;
use crate::engine::{BallotReceipt, TallyBucket, TallyOutcome};
use crate::entities::{owner, question, question_option, unit, vote};
use crate::models::assembly::QuestionView;
use crate::models::voting::{
    ActivationReportView, BallotReceiptView, LedgerRowView, RegisterVoteRequest, TallyBucketView,
    TallyView,
};
use crate::state::AppState;

use super::{HttpError, map_engine_error};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions/{question_id}", get(get_question))
        .route("/questions/{question_id}/activate", post(activate_question))
        .route("/questions/{question_id}/close", post(close_question))
        .route("/questions/{question_id}/votes", post(register_vote))
        .route("/questions/{question_id}/tally", get(get_tally))
        .route("/questions/{question_id}/ledger", get(get_ledger))
}

async fn get_question(
    Path(question_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<QuestionView>, HttpError> {
    let record = find_question(&state.database, question_id).await?;

    let options = question_option::Entity::find()
        .filter(question_option::Column::QuestionId.eq(question_id))
        .order_by_asc(question_option::Column::Position)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let view = QuestionView {
        question_id: record.question_id,
        assembly_id: record.assembly_id,
        text: record.text,
        state: record.state.as_str().to_string(),
        options: options.into_iter().map(|option| option.label).collect(),
        created_at: record.created_at,
        activated_at: record.activated_at,
        closed_at: record.closed_at,
    };
    Ok(Json(view))
}

async fn activate_question(
    Path(question_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ActivationReportView>, HttpError> {
    let report = engine::activate_question(&state.database, question_id)
        .await
        .map_err(map_engine_error)?;

    state.cache.tallies.invalidate(&question_id).await;
    if let Some(closed_id) = report.closed_question_id {
        state.cache.tallies.invalidate(&closed_id).await;
    }

    let view = ActivationReportView {
        question_id: report.question_id,
        already_active: report.already_active,
        closed_question_id: report.closed_question_id,
        eligible_entities: report.eligible_entities as u64,
        eligible_units: report.eligible_units as u64,
        newly_seeded_units: report.newly_seeded_units as u64,
    };
    Ok(Json(view))
}

async fn close_question(
    Path(question_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<TallyView>, HttpError> {
    let outcome = engine::close_question(&state.database, question_id, &state.policy)
        .await
        .map_err(map_engine_error)?;

    state.cache.tallies.invalidate(&question_id).await;

    info!(
        "Question {} closed with decision {}",
        question_id,
        outcome.tally.decision.as_str()
    );
    Ok(Json(tally_view(outcome.tally)))
}

async fn register_vote(
    Path(question_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<RegisterVoteRequest>,
) -> Result<Json<BallotReceiptView>, HttpError> {
    let cedula = ballot::canonicalize_cedula(&request.cedula)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    if request.option.trim().is_empty() {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "option must not be empty".to_string(),
        ));
    }

    let receipt = engine::register_vote(&state.database, question_id, &cedula, &request.option)
        .await
        .map_err(map_engine_error)?;

    state.cache.tallies.invalidate(&question_id).await;

    Ok(Json(receipt_view(receipt)))
}

async fn get_tally(
    Path(question_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<TallyView>, HttpError> {
    if let Some(cached) = state.cache.tallies.get(&question_id).await {
        return Ok(Json((*cached).clone()));
    }

    let outcome = engine::tally_question(&state.database, question_id, &state.policy)
        .await
        .map_err(map_engine_error)?;
    let view = tally_view(outcome);

    state
        .cache
        .tallies
        .insert(question_id, Arc::new(view.clone()))
        .await;

    Ok(Json(view))
}

/// Per-unit audit trail. Empty until the question has been activated, since
/// activation is what seeds the ledger.
async fn get_ledger(
    Path(question_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LedgerRowView>>, HttpError> {
    find_question(&state.database, question_id).await?;

    let votes = vote::Entity::find()
        .filter(vote::Column::QuestionId.eq(question_id))
        .order_by_asc(vote::Column::UnitId)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let unit_ids: Vec<i64> = votes.iter().map(|record| record.unit_id).collect();
    let units = unit::Entity::find()
        .filter(unit::Column::UnitId.is_in(unit_ids))
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let units_by_id: HashMap<i64, unit::Model> = units
        .into_iter()
        .map(|record| (record.unit_id, record))
        .collect();

    let owners = owner::Entity::find()
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let owner_names: HashMap<String, String> = owners
        .into_iter()
        .map(|record| (record.cedula, record.name))
        .collect();

    let rows = votes
        .into_iter()
        .map(|record| {
            let (unit_name, coefficient, owner_name) = match units_by_id.get(&record.unit_id) {
                Some(unit_record) => (
                    unit_record.name.clone(),
                    unit_record.coefficient,
                    unit_record
                        .owner_cedula
                        .as_ref()
                        .and_then(|cedula| owner_names.get(cedula).cloned()),
                ),
                None => (String::new(), Decimal::ZERO, None),
            };
            LedgerRowView {
                unit_id: record.unit_id,
                unit_name,
                coefficient,
                owner_name,
                executor_cedula: record.executor_cedula,
                option: ballot::option_display(record.option_label.as_deref()).to_string(),
                recorded_at: record.recorded_at,
            }
        })
        .collect::<Vec<_>>();

    Ok(Json(rows))
}

fn tally_view(outcome: TallyOutcome) -> TallyView {
    TallyView {
        question_id: outcome.question_id,
        question_text: outcome.question_text,
        state: outcome.state.as_str().to_string(),
        buckets: outcome.buckets.into_iter().map(bucket_view).collect(),
        total_condominium_coefficient: outcome.total_condominium_coefficient,
        total_participating_coefficient: outcome.total_participating_coefficient,
        affirmative_coefficient: outcome.affirmative_coefficient,
        participation_percent: outcome.participation_percent,
        decision: outcome.decision.as_str().to_string(),
    }
}

fn bucket_view(bucket: TallyBucket) -> TallyBucketView {
    TallyBucketView {
        option: ballot::option_display(bucket.label.as_deref()).to_string(),
        coefficient: bucket.coefficient,
        unit_count: bucket.unit_count as u64,
    }
}

fn receipt_view(receipt: BallotReceipt) -> BallotReceiptView {
    BallotReceiptView {
        question_id: receipt.question_id,
        cedula: receipt.executor_cedula,
        display_name: receipt.display_name,
        option: ballot::option_display(receipt.option_label.as_deref()).to_string(),
        units_recorded: receipt.units_recorded.len() as u64,
        units_skipped: receipt.units_skipped.len() as u64,
        recorded_coefficient: receipt.recorded_coefficient,
    }
}

async fn find_question(
    database: &DatabaseConnection,
    question_id: i64,
) -> Result<question::Model, HttpError> {
    question::Entity::find_by_id(question_id)
        .one(database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::NOT_FOUND,
                format!("Question {question_id} not found"),
            )
        })
}

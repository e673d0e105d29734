use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::info;

use crate::ballot;
use crate::engine::{UnitShare, VotingEntity, resolve_eligible_voters};
use crate::entities::{assembly, attendance, owner, proxy, question, question_option, unit};
use crate::models::assembly::{
    AssemblyView, AttendanceView, CreateAssemblyRequest, CreateProxyRequest, CreateQuestionRequest,
    ProxyView, QuestionView, UnitShareView, UpsertAttendanceRequest, VotingEntityView,
};
use crate::state::AppState;

use super::{HttpError, map_engine_error};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assemblies", get(list_assemblies).post(create_assembly))
        .route(
            "/assemblies/{assembly_id}",
            get(get_assembly).delete(delete_assembly),
        )
        .route(
            "/assemblies/{assembly_id}/proxies",
            get(list_proxies).post(create_proxy),
        )
        .route(
            "/assemblies/{assembly_id}/proxies/{unit_id}",
            delete(revoke_proxy),
        )
        .route(
            "/assemblies/{assembly_id}/attendance",
            get(list_attendance).put(upsert_attendance),
        )
        .route(
            "/assemblies/{assembly_id}/questions",
            get(list_questions).post(create_question),
        )
        .route("/assemblies/{assembly_id}/voters", get(get_voters))
}

async fn list_assemblies(
    State(state): State<AppState>,
) -> Result<Json<Vec<AssemblyView>>, HttpError> {
    let assemblies = assembly::Entity::find()
        .order_by_desc(assembly::Column::HeldOn)
        .order_by_desc(assembly::Column::AssemblyId)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let views = assemblies.into_iter().map(assembly_view).collect::<Vec<_>>();
    Ok(Json(views))
}

async fn create_assembly(
    State(state): State<AppState>,
    Json(request): Json<CreateAssemblyRequest>,
) -> Result<Json<AssemblyView>, HttpError> {
    let description = ballot::canonicalize_description(&request.description)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let record = assembly::ActiveModel {
        held_on: Set(request.held_on),
        description: Set(description),
        created_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    };

    let inserted = record
        .insert(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    info!("Assembly {} created for {}", inserted.assembly_id, inserted.held_on);
    Ok(Json(assembly_view(inserted)))
}

async fn get_assembly(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<AssemblyView>, HttpError> {
    let record = find_assembly(&state.database, assembly_id).await?;
    Ok(Json(assembly_view(record)))
}

/// Hard delete; the store cascades proxies, attendance, questions, options
/// and ledger rows.
async fn delete_assembly(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    let record = find_assembly(&state.database, assembly_id).await?;
    let result = assembly::Entity::delete_by_id(record.assembly_id)
        .exec(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    assert!(result.rows_affected <= 1, "Assembly delete touched extra rows");

    state.cache.voters.invalidate(&assembly_id).await;
    state.cache.tallies.invalidate_all();

    info!("Assembly {} deleted", assembly_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_proxies(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProxyView>>, HttpError> {
    find_assembly(&state.database, assembly_id).await?;

    let proxies = proxy::Entity::find()
        .filter(proxy::Column::AssemblyId.eq(assembly_id))
        .order_by_asc(proxy::Column::ProxyId)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let unit_ids: Vec<i64> = proxies.iter().map(|record| record.unit_id).collect();
    let units = unit::Entity::find()
        .filter(unit::Column::UnitId.is_in(unit_ids))
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let unit_names: HashMap<i64, String> = units
        .into_iter()
        .map(|record| (record.unit_id, record.name))
        .collect();

    let views = proxies
        .into_iter()
        .map(|record| {
            let unit_name = unit_names.get(&record.unit_id).cloned().unwrap_or_default();
            proxy_view(record, unit_name)
        })
        .collect::<Vec<_>>();

    Ok(Json(views))
}

async fn create_proxy(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<CreateProxyRequest>,
) -> Result<Json<ProxyView>, HttpError> {
    find_assembly(&state.database, assembly_id).await?;

    let unit_record = unit::Entity::find_by_id(request.unit_id)
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::BAD_REQUEST,
                format!("Unit {} is not registered", request.unit_id),
            )
        })?;

    let proxy_cedula = ballot::canonicalize_cedula(&request.proxy_cedula)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let proxy_name = ballot::canonicalize_person_name(&request.proxy_name)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    if unit_record.owner_cedula.as_deref() == Some(proxy_cedula.as_str()) {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "An owner cannot hold a delegation for their own unit".to_string(),
        ));
    }

    let record = proxy::ActiveModel {
        assembly_id: Set(assembly_id),
        unit_id: Set(request.unit_id),
        proxy_cedula: Set(proxy_cedula),
        proxy_name: Set(proxy_name),
        granted_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    };

    let inserted = record
        .insert(&state.database)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => HttpError::new(
                StatusCode::CONFLICT,
                "This unit already has a delegation for this assembly".to_string(),
            ),
            _ => HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        })?;

    state.cache.voters.invalidate(&assembly_id).await;

    info!(
        "Unit {} delegated to {} for assembly {}",
        inserted.unit_id, inserted.proxy_cedula, assembly_id
    );
    Ok(Json(proxy_view(inserted, unit_record.name)))
}

async fn revoke_proxy(
    Path((assembly_id, unit_id)): Path<(i64, i64)>,
    State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    find_assembly(&state.database, assembly_id).await?;

    let result = proxy::Entity::delete_many()
        .filter(proxy::Column::AssemblyId.eq(assembly_id))
        .filter(proxy::Column::UnitId.eq(unit_id))
        .exec(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    assert!(result.rows_affected <= 1, "Proxy delete touched extra rows");

    if result.rows_affected == 0 {
        return Err(HttpError::new(
            StatusCode::NOT_FOUND,
            format!("Unit {unit_id} has no delegation in assembly {assembly_id}"),
        ));
    }

    state.cache.voters.invalidate(&assembly_id).await;

    info!("Delegation for unit {} revoked in assembly {}", unit_id, assembly_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_attendance(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttendanceView>>, HttpError> {
    find_assembly(&state.database, assembly_id).await?;

    let roster = attendance::Entity::find()
        .filter(attendance::Column::AssemblyId.eq(assembly_id))
        .order_by_asc(attendance::Column::Name)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let views = roster.into_iter().map(attendance_view).collect::<Vec<_>>();
    Ok(Json(views))
}

/// Check-in desk upsert. Re-marking the same cedula refreshes the row, so a
/// person can be flipped present/absent as they come and go.
async fn upsert_attendance(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<UpsertAttendanceRequest>,
) -> Result<Json<AttendanceView>, HttpError> {
    find_assembly(&state.database, assembly_id).await?;

    let cedula = ballot::canonicalize_cedula(&request.cedula)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let registered = owner::Entity::find_by_id(cedula.clone())
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let attendee_kind = match &registered {
        Some(_) => attendance::AttendeeKind::Owner,
        None => attendance::AttendeeKind::Proxy,
    };
    let name = match request.name.as_deref() {
        Some(raw) => ballot::canonicalize_person_name(raw)
            .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?,
        None => match registered {
            Some(record) => record.name,
            None => {
                return Err(HttpError::new(
                    StatusCode::BAD_REQUEST,
                    "name is required for attendees outside the registry".to_string(),
                ));
            }
        },
    };
    let present = request.present.unwrap_or(true);
    let now = Utc::now().fixed_offset();

    let existing = attendance::Entity::find_by_id((assembly_id, cedula.clone()))
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let saved = match existing {
        Some(record) => {
            let mut active_model = record.into_active_model();
            active_model.name = Set(name);
            active_model.attendee_kind = Set(attendee_kind);
            active_model.present = Set(present);
            active_model.marked_at = Set(now);
            active_model
                .update(&state.database)
                .await
                .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        }
        None => {
            let record = attendance::ActiveModel {
                assembly_id: Set(assembly_id),
                cedula: Set(cedula.clone()),
                name: Set(name),
                attendee_kind: Set(attendee_kind),
                present: Set(present),
                marked_at: Set(now),
            };
            record
                .insert(&state.database)
                .await
                .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        }
    };

    state.cache.voters.invalidate(&assembly_id).await;

    info!(
        "Attendance for {} in assembly {} marked {}",
        saved.cedula,
        assembly_id,
        if saved.present { "present" } else { "absent" }
    );
    Ok(Json(attendance_view(saved)))
}

async fn list_questions(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuestionView>>, HttpError> {
    find_assembly(&state.database, assembly_id).await?;

    let questions = question::Entity::find()
        .filter(question::Column::AssemblyId.eq(assembly_id))
        .order_by_asc(question::Column::QuestionId)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let question_ids: Vec<i64> = questions.iter().map(|record| record.question_id).collect();
    let options = question_option::Entity::find()
        .filter(question_option::Column::QuestionId.is_in(question_ids))
        .order_by_asc(question_option::Column::QuestionId)
        .order_by_asc(question_option::Column::Position)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let mut options_by_question: HashMap<i64, Vec<String>> = HashMap::new();
    for option in options {
        options_by_question
            .entry(option.question_id)
            .or_default()
            .push(option.label);
    }

    let views = questions
        .into_iter()
        .map(|record| {
            let labels = options_by_question
                .remove(&record.question_id)
                .unwrap_or_default();
            question_view(record, labels)
        })
        .collect::<Vec<_>>();

    Ok(Json(views))
}

async fn create_question(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<CreateQuestionRequest>,
) -> Result<Json<QuestionView>, HttpError> {
    find_assembly(&state.database, assembly_id).await?;

    let text = ballot::canonicalize_question_text(&request.text)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let labels = ballot::validate_option_labels(&request.options)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let txn = state
        .database
        .begin()
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let record = question::ActiveModel {
        assembly_id: Set(assembly_id),
        text: Set(text),
        state: Set(question::QuestionState::Inactive),
        created_at: Set(Utc::now().fixed_offset()),
        activated_at: Set(None),
        closed_at: Set(None),
        ..Default::default()
    };
    let inserted = record
        .insert(&txn)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    for (position, label) in labels.iter().enumerate() {
        let option = question_option::ActiveModel {
            question_id: Set(inserted.question_id),
            position: Set(position as i32),
            label: Set(label.clone()),
            ..Default::default()
        };
        option
            .insert(&txn)
            .await
            .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    }

    txn.commit()
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    info!(
        "Question {} created in assembly {} with {} options",
        inserted.question_id,
        assembly_id,
        labels.len()
    );
    Ok(Json(question_view(inserted, labels)))
}

async fn get_voters(
    Path(assembly_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<VotingEntityView>>, HttpError> {
    if let Some(cached) = state.cache.voters.get(&assembly_id).await {
        return Ok(Json((*cached).clone()));
    }

    let entities = resolve_eligible_voters(&state.database, assembly_id)
        .await
        .map_err(map_engine_error)?;
    let views = voting_entity_views(entities);

    state
        .cache
        .voters
        .insert(assembly_id, Arc::new(views.clone()))
        .await;

    Ok(Json(views))
}

fn assembly_view(record: assembly::Model) -> AssemblyView {
    AssemblyView {
        assembly_id: record.assembly_id,
        held_on: record.held_on,
        description: record.description,
        created_at: record.created_at,
    }
}

fn proxy_view(record: proxy::Model, unit_name: String) -> ProxyView {
    ProxyView {
        proxy_id: record.proxy_id,
        unit_id: record.unit_id,
        unit_name,
        proxy_cedula: record.proxy_cedula,
        proxy_name: record.proxy_name,
        granted_at: record.granted_at,
    }
}

fn attendance_view(record: attendance::Model) -> AttendanceView {
    AttendanceView {
        cedula: record.cedula,
        name: record.name,
        attendee_kind: record.attendee_kind.as_str().to_string(),
        present: record.present,
        marked_at: record.marked_at,
    }
}

fn question_view(record: question::Model, options: Vec<String>) -> QuestionView {
    QuestionView {
        question_id: record.question_id,
        assembly_id: record.assembly_id,
        text: record.text,
        state: record.state.as_str().to_string(),
        options,
        created_at: record.created_at,
        activated_at: record.activated_at,
        closed_at: record.closed_at,
    }
}

fn voting_entity_views(entities: Vec<VotingEntity>) -> Vec<VotingEntityView> {
    entities
        .into_iter()
        .map(|entity| VotingEntityView {
            cedula: entity.cedula,
            display_name: entity.display_name,
            units: entity.units.into_iter().map(unit_share_view).collect(),
            total_coefficient: entity.total_coefficient,
        })
        .collect()
}

fn unit_share_view(share: UnitShare) -> UnitShareView {
    UnitShareView {
        unit_id: share.unit_id,
        name: share.name,
        coefficient: share.coefficient,
    }
}

async fn find_assembly(
    database: &DatabaseConnection,
    assembly_id: i64,
) -> Result<assembly::Model, HttpError> {
    assembly::Entity::find_by_id(assembly_id)
        .one(database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::NOT_FOUND,
                format!("Assembly {assembly_id} not found"),
            )
        })
}

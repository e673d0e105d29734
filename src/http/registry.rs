use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::Deserialize;
use tracing::info;

use crate::ballot;
use crate::entities::{owner, unit};
use crate::models::registry::{
    CreateOwnerRequest, CreateUnitRequest, OwnerView, UnitListResponse, UnitView,
    UpdateOwnerRequest, UpdateUnitRequest,
};
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/owners", get(list_owners).post(create_owner))
        .route(
            "/owners/{cedula}",
            get(get_owner).put(update_owner).delete(deactivate_owner),
        )
        .route("/units", get(list_units).post(create_unit))
        .route(
            "/units/{unit_id}",
            get(get_unit).put(update_unit).delete(delete_unit),
        )
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ListOwnersQuery {
    include_inactive: bool,
}

async fn list_owners(
    Query(query): Query<ListOwnersQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<OwnerView>>, HttpError> {
    let mut select = owner::Entity::find();
    if !query.include_inactive {
        select = select.filter(owner::Column::Active.eq(true));
    }

    let owners = select
        .order_by_asc(owner::Column::Name)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let units = unit::Entity::find()
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let mut counts: HashMap<String, u32> = HashMap::new();
    for record in &units {
        if let Some(cedula) = &record.owner_cedula {
            *counts.entry(cedula.clone()).or_insert(0) += 1;
        }
    }

    let views = owners
        .into_iter()
        .map(|record| {
            let unit_count = counts.get(&record.cedula).copied().unwrap_or(0);
            owner_view(record, unit_count)
        })
        .collect::<Vec<_>>();

    Ok(Json(views))
}

async fn create_owner(
    State(state): State<AppState>,
    Json(request): Json<CreateOwnerRequest>,
) -> Result<Json<OwnerView>, HttpError> {
    let cedula = ballot::canonicalize_cedula(&request.cedula)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let name = ballot::canonicalize_person_name(&request.name)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let phone = match request.phone.as_deref() {
        Some(raw) => ballot::canonicalize_phone(raw)
            .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?,
        None => None,
    };

    let now = Utc::now().fixed_offset();
    let record = owner::ActiveModel {
        cedula: Set(cedula.clone()),
        name: Set(name),
        phone: Set(phone),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserted = record
        .insert(&state.database)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => HttpError::new(
                StatusCode::CONFLICT,
                "An owner with this cedula or phone already exists".to_string(),
            ),
            _ => HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        })?;

    info!("Owner {} registered", inserted.cedula);
    Ok(Json(owner_view(inserted, 0)))
}

async fn get_owner(
    Path(cedula): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<OwnerView>, HttpError> {
    let cedula = ballot::canonicalize_cedula(&cedula)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let record = find_owner(&state.database, &cedula).await?;
    let unit_count = count_owner_units(&state.database, &cedula).await?;
    Ok(Json(owner_view(record, unit_count)))
}

async fn update_owner(
    Path(cedula): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<UpdateOwnerRequest>,
) -> Result<Json<OwnerView>, HttpError> {
    let cedula = ballot::canonicalize_cedula(&cedula)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let record = find_owner(&state.database, &cedula).await?;
    let mut active_model = record.into_active_model();

    if let Some(name) = request.name.as_deref() {
        let name = ballot::canonicalize_person_name(name)
            .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
        active_model.name = Set(name);
    }
    if let Some(phone) = request.phone.as_deref() {
        let phone = ballot::canonicalize_phone(phone)
            .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
        active_model.phone = Set(phone);
    }
    if let Some(active) = request.active {
        active_model.active = Set(active);
    }
    active_model.updated_at = Set(Utc::now().fixed_offset());

    let updated = active_model
        .update(&state.database)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => HttpError::new(
                StatusCode::CONFLICT,
                "Another owner already uses this phone".to_string(),
            ),
            _ => HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        })?;

    // Name and active flag feed the eligibility roster
    state.cache.voters.invalidate_all();
    state.cache.tallies.invalidate_all();

    let unit_count = count_owner_units(&state.database, &cedula).await?;
    info!("Owner {} updated", updated.cedula);
    Ok(Json(owner_view(updated, unit_count)))
}

/// Soft deactivation. The row stays so historical votes keep their executor
/// and units keep their assignment.
async fn deactivate_owner(
    Path(cedula): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<OwnerView>, HttpError> {
    let cedula = ballot::canonicalize_cedula(&cedula)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let record = find_owner(&state.database, &cedula).await?;
    let updated = if record.active {
        let mut active_model = record.into_active_model();
        active_model.active = Set(false);
        active_model.updated_at = Set(Utc::now().fixed_offset());
        let updated = active_model
            .update(&state.database)
            .await
            .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

        state.cache.voters.invalidate_all();
        state.cache.tallies.invalidate_all();
        info!("Owner {} deactivated", updated.cedula);
        updated
    } else {
        record
    };

    let unit_count = count_owner_units(&state.database, &cedula).await?;
    Ok(Json(owner_view(updated, unit_count)))
}

async fn list_units(State(state): State<AppState>) -> Result<Json<UnitListResponse>, HttpError> {
    let units = unit::Entity::find()
        .order_by_asc(unit::Column::UnitId)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let owners = owner::Entity::find()
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let names: HashMap<String, String> = owners
        .into_iter()
        .map(|record| (record.cedula, record.name))
        .collect();

    let total_coefficient = units.iter().map(|record| record.coefficient).sum::<Decimal>();
    let views = units
        .into_iter()
        .map(|record| {
            let owner_name = record
                .owner_cedula
                .as_ref()
                .and_then(|cedula| names.get(cedula).cloned());
            unit_view(record, owner_name)
        })
        .collect::<Vec<_>>();

    Ok(Json(UnitListResponse {
        units: views,
        total_coefficient,
    }))
}

async fn create_unit(
    State(state): State<AppState>,
    Json(request): Json<CreateUnitRequest>,
) -> Result<Json<UnitView>, HttpError> {
    let name = ballot::canonicalize_unit_name(&request.name)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let coefficient = ballot::validate_coefficient(request.coefficient)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let owner_cedula = match request.owner_cedula.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            let cedula = ballot::canonicalize_cedula(raw)
                .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
            require_owner_registered(&state.database, &cedula).await?;
            Some(cedula)
        }
        _ => None,
    };

    let record = unit::ActiveModel {
        name: Set(name),
        coefficient: Set(coefficient),
        owner_cedula: Set(owner_cedula),
        ..Default::default()
    };

    let inserted = record
        .insert(&state.database)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => HttpError::new(
                StatusCode::CONFLICT,
                "A unit with this name already exists".to_string(),
            ),
            _ => HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        })?;

    state.cache.voters.invalidate_all();
    state.cache.tallies.invalidate_all();

    let owner_name = lookup_owner_name(&state.database, inserted.owner_cedula.as_deref()).await?;
    info!("Unit {} created", inserted.name);
    Ok(Json(unit_view(inserted, owner_name)))
}

async fn get_unit(
    Path(unit_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<UnitView>, HttpError> {
    let record = find_unit(&state.database, unit_id).await?;
    let owner_name = lookup_owner_name(&state.database, record.owner_cedula.as_deref()).await?;
    Ok(Json(unit_view(record, owner_name)))
}

async fn update_unit(
    Path(unit_id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<UpdateUnitRequest>,
) -> Result<Json<UnitView>, HttpError> {
    let record = find_unit(&state.database, unit_id).await?;
    let mut active_model = record.into_active_model();

    if let Some(name) = request.name.as_deref() {
        let name = ballot::canonicalize_unit_name(name)
            .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
        active_model.name = Set(name);
    }
    if let Some(coefficient) = request.coefficient {
        let coefficient = ballot::validate_coefficient(coefficient)
            .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
        active_model.coefficient = Set(coefficient);
    }
    if let Some(raw) = request.owner_cedula.as_deref() {
        if raw.trim().is_empty() {
            active_model.owner_cedula = Set(None);
        } else {
            let cedula = ballot::canonicalize_cedula(raw)
                .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
            require_owner_registered(&state.database, &cedula).await?;
            active_model.owner_cedula = Set(Some(cedula));
        }
    }

    let updated = active_model
        .update(&state.database)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => HttpError::new(
                StatusCode::CONFLICT,
                "A unit with this name already exists".to_string(),
            ),
            _ => HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        })?;

    state.cache.voters.invalidate_all();
    state.cache.tallies.invalidate_all();

    let owner_name = lookup_owner_name(&state.database, updated.owner_cedula.as_deref()).await?;
    info!("Unit {} updated", updated.name);
    Ok(Json(unit_view(updated, owner_name)))
}

/// Hard delete; the store cascades this unit's proxies and ledger rows.
async fn delete_unit(
    Path(unit_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    let record = find_unit(&state.database, unit_id).await?;
    let result = unit::Entity::delete_by_id(record.unit_id)
        .exec(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    assert!(result.rows_affected <= 1, "Unit delete touched extra rows");

    state.cache.voters.invalidate_all();
    state.cache.tallies.invalidate_all();

    info!("Unit {} deleted", unit_id);
    Ok(StatusCode::NO_CONTENT)
}

fn owner_view(record: owner::Model, unit_count: u32) -> OwnerView {
    OwnerView {
        cedula: record.cedula,
        name: record.name,
        phone: record.phone,
        active: record.active,
        unit_count,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

fn unit_view(record: unit::Model, owner_name: Option<String>) -> UnitView {
    UnitView {
        unit_id: record.unit_id,
        name: record.name,
        coefficient: record.coefficient,
        owner_cedula: record.owner_cedula,
        owner_name,
    }
}

async fn find_owner(database: &DatabaseConnection, cedula: &str) -> Result<owner::Model, HttpError> {
    owner::Entity::find_by_id(cedula.to_string())
        .one(database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(StatusCode::NOT_FOUND, format!("Owner {cedula} not found"))
        })
}

async fn find_unit(database: &DatabaseConnection, unit_id: i64) -> Result<unit::Model, HttpError> {
    unit::Entity::find_by_id(unit_id)
        .one(database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(StatusCode::NOT_FOUND, format!("Unit {unit_id} not found"))
        })
}

async fn lookup_owner_name(
    database: &DatabaseConnection,
    cedula: Option<&str>,
) -> Result<Option<String>, HttpError> {
    let cedula = match cedula {
        Some(value) => value,
        None => return Ok(None),
    };
    let record = owner::Entity::find_by_id(cedula.to_string())
        .one(database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok(record.map(|record| record.name))
}

async fn require_owner_registered(
    database: &DatabaseConnection,
    cedula: &str,
) -> Result<(), HttpError> {
    let exists = owner::Entity::find_by_id(cedula.to_string())
        .one(database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .is_some();
    if !exists {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("Owner {cedula} is not registered"),
        ));
    }
    Ok(())
}

async fn count_owner_units(
    database: &DatabaseConnection,
    cedula: &str,
) -> Result<u32, HttpError> {
    let count = unit::Entity::find()
        .filter(unit::Column::OwnerCedula.eq(cedula))
        .count(database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    assert!(count <= u32::MAX as u64, "Unit count exceeds u32 bounds");
    Ok(count as u32)
}

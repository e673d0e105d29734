use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerView {
    pub cedula: String,
    pub name: String,
    pub phone: Option<String>,
    pub active: bool,
    pub unit_count: u32,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitView {
    pub unit_id: i64,
    pub name: String,
    pub coefficient: Decimal,
    pub owner_cedula: Option<String>,
    pub owner_name: Option<String>,
}

/// Unit listing plus the running coefficient total. The registry never
/// enforces that the total reaches 100, it only surfaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitListResponse {
    pub units: Vec<UnitView>,
    pub total_coefficient: Decimal,
}

// Request types for the registry HTTP API

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateOwnerRequest {
    pub cedula: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateOwnerRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateUnitRequest {
    pub name: String,
    pub coefficient: Decimal,
    pub owner_cedula: Option<String>,
}

/// Partial unit update. `owner_cedula` absent leaves the assignment alone;
/// an empty string clears it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateUnitRequest {
    pub name: Option<String>,
    pub coefficient: Option<Decimal>,
    pub owner_cedula: Option<String>,
}

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyView {
    pub assembly_id: i64,
    pub held_on: NaiveDate,
    pub description: String,
    pub created_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyView {
    pub proxy_id: i64,
    pub unit_id: i64,
    pub unit_name: String,
    pub proxy_cedula: String,
    pub proxy_name: String,
    pub granted_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceView {
    pub cedula: String,
    pub name: String,
    pub attendee_kind: String,
    pub present: bool,
    pub marked_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub question_id: i64,
    pub assembly_id: i64,
    pub text: String,
    pub state: String,
    pub options: Vec<String>,
    pub created_at: DateTime<FixedOffset>,
    pub activated_at: Option<DateTime<FixedOffset>>,
    pub closed_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitShareView {
    pub unit_id: i64,
    pub name: String,
    pub coefficient: Decimal,
}

/// One person as they will vote: every unit they carry (owned or via proxy)
/// and the combined coefficient behind their single ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VotingEntityView {
    pub cedula: String,
    pub display_name: String,
    pub units: Vec<UnitShareView>,
    pub total_coefficient: Decimal,
}

// Request types for the assembly HTTP API

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateAssemblyRequest {
    pub held_on: NaiveDate,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateProxyRequest {
    pub unit_id: i64,
    pub proxy_cedula: String,
    pub proxy_name: String,
}

/// Attendance upsert. `name` may be omitted for registered owners; it is
/// required for proxy holders the registry has never seen.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpsertAttendanceRequest {
    pub cedula: String,
    pub name: Option<String>,
    pub present: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateQuestionRequest {
    pub text: String,
    pub options: Vec<String>,
}

// libs/consultation-cell/src/models.rs
use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use shared_api::ApiError;

/// Wire format of `scheduled_at`, expressed in the server timezone.
pub const SERVER_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DEFAULT_DURATION_MIN: i64 = 15;

// ==============================================================================
// CORE APPOINTMENT MODEL
// ==============================================================================

/// One appointment row as decoded from any collaborator endpoint.
///
/// This is the single typed decoding step: field aliases, number-or-string
/// ids and unknown enum text are all normalized here, and nothing downstream
/// ever re-reads raw JSON.
#[derive(Debug, Clone, PartialEq, Hash, Deserialize)]
pub struct Appointment {
    #[serde(
        default,
        alias = "appointment_id",
        alias = "appointmentId",
        deserialize_with = "de_lenient_i64"
    )]
    pub id: i64,

    #[serde(default)]
    pub public_code: String,

    #[serde(
        default,
        alias = "patientId",
        alias = "pid",
        alias = "patient_user_id",
        alias = "user_id",
        deserialize_with = "de_lenient_i64"
    )]
    pub patient_id: i64,

    #[serde(default)]
    pub patient_name: String,

    #[serde(default)]
    pub patient_phone: String,

    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub patient_age: i64,

    #[serde(default)]
    pub patient_gender: String,

    #[serde(default)]
    pub symptoms: String,

    #[serde(default)]
    pub consult_type: ConsultType,

    #[serde(default)]
    pub status: AppointmentStatus,

    /// `None` means the server value was absent or unparseable; the
    /// appointment is still displayed but never startable.
    #[serde(default, deserialize_with = "de_schedule")]
    pub scheduled_at: Option<NaiveDateTime>,

    #[serde(
        default,
        alias = "duration_minutes",
        deserialize_with = "de_lenient_i64"
    )]
    pub duration_min: i64,

    #[serde(default)]
    pub room: String,

    /// Backend admission override. Narrows the computed window, never widens it.
    #[serde(default)]
    pub can_start: Option<bool>,
}

impl Appointment {
    /// Slot length in minutes; absent or non-positive values fall back to
    /// the standard slot length.
    pub fn duration_min(&self) -> i64 {
        if self.duration_min >= 1 {
            self.duration_min
        } else {
            DEFAULT_DURATION_MIN
        }
    }

    /// Scheduled start as epoch millis, interpreting the naive wire value in
    /// the server timezone.
    pub fn scheduled_at_ms(&self, tz: FixedOffset) -> Option<i64> {
        self.scheduled_at
            .and_then(|ndt| tz.from_local_datetime(&ndt).single())
            .map(|dt| dt.timestamp_millis())
    }

    /// Scheduled end as epoch millis.
    pub fn end_ms(&self, tz: FixedOffset) -> Option<i64> {
        self.scheduled_at_ms(tz)
            .map(|start| start + self.duration_min() * 60_000)
    }

    /// The stable external key used for completion and patient resolution.
    pub fn appointment_key(&self) -> Option<String> {
        let code = self.public_code.trim();
        if !code.is_empty() {
            return Some(code.to_string());
        }
        if self.id > 0 {
            return Some(self.id.to_string());
        }
        None
    }

    /// Deduplication key for reconciliation.
    pub fn merge_key(&self) -> MergeKey {
        let code = self.public_code.trim();
        if !code.is_empty() {
            return MergeKey::Code(code.to_string());
        }
        if self.id > 0 {
            return MergeKey::Id(self.id);
        }
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        MergeKey::Structural(hasher.finish())
    }

    /// Call room: server-supplied when present, else derived from the public
    /// code. Stable for a given code.
    pub fn room_or_derived(&self) -> String {
        let room = self.room.trim();
        if !room.is_empty() {
            return room.to_string();
        }
        room_from_public_code(&self.public_code)
    }

    /// Human patient summary line, e.g. "34 • Female".
    pub fn patient_meta(&self) -> String {
        let gender = {
            let g = self.patient_gender.trim();
            if g.is_empty() {
                "Unknown"
            } else {
                g
            }
        };
        if self.patient_age > 0 {
            format!("{} • {}", self.patient_age, gender)
        } else {
            gender.to_string()
        }
    }
}

/// Derive a hash-safe call room from an appointment public code.
pub fn room_from_public_code(code: &str) -> String {
    let clean: String = code
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if clean.is_empty() {
        String::new()
    } else {
        format!("ss_appt_{}", clean)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MergeKey {
    Code(String),
    Id(i64),
    Structural(u64),
}

// ==============================================================================
// ENUMS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ConsultType {
    Video,
    Audio,
    Physical,
}

impl Default for ConsultType {
    fn default() -> Self {
        ConsultType::Video
    }
}

impl From<String> for ConsultType {
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "AUDIO" | "PHONE" | "CALL" => ConsultType::Audio,
            "PHYSICAL" | "IN_PERSON" | "INPERSON" | "CLINIC" | "VISIT" => ConsultType::Physical,
            // Unknown modality defaults to video, matching existing rows.
            _ => ConsultType::Video,
        }
    }
}

impl fmt::Display for ConsultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultType::Video => write!(f, "VIDEO"),
            ConsultType::Audio => write!(f, "AUDIO"),
            ConsultType::Physical => write!(f, "PHYSICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Scheduled
    }
}

impl From<String> for AppointmentStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "IN_PROGRESS" => AppointmentStatus::InProgress,
            "COMPLETED" | "DONE" => AppointmentStatus::Completed,
            "CANCELLED" => AppointmentStatus::Cancelled,
            "NO_SHOW" => AppointmentStatus::NoShow,
            _ => AppointmentStatus::Scheduled,
        }
    }
}

impl AppointmentStatus {
    /// Terminal statuses never admit a session and are filtered from the
    /// today fallback view.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::InProgress => write!(f, "IN_PROGRESS"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::NoShow => write!(f, "NO_SHOW"),
        }
    }
}

/// Server-side list views of the consultations screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListView {
    All,
    Upcoming,
    Completed,
}

impl ListView {
    pub fn as_param(&self) -> &'static str {
        match self {
            ListView::All => "ALL",
            ListView::Upcoming => "UPCOMING",
            ListView::Completed => "COMPLETED",
        }
    }
}

// ==============================================================================
// WIRE PAYLOADS
// ==============================================================================

/// Payload of `GET /doctor/home_dashboard`.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardData {
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub server_now_ms: i64,

    #[serde(default)]
    pub today_in_progress: Option<Vec<Appointment>>,
    #[serde(default)]
    pub today_upcoming: Option<Vec<Appointment>>,
    #[serde(default)]
    pub today_appointments: Option<Vec<Appointment>>,

    #[serde(default)]
    pub doctor_name: String,
    #[serde(default)]
    pub doctor_specialization: String,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub notifications_count: i64,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub today_patients: i64,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub today_completed: i64,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub today_amount: i64,
    #[serde(default)]
    pub rating: f64,
}

impl DashboardData {
    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary {
            doctor_name: self.doctor_name.clone(),
            doctor_specialization: self.doctor_specialization.clone(),
            notifications_count: self.notifications_count.max(0),
            today_patients: self.today_patients.max(0),
            today_completed: self.today_completed.max(0),
            today_amount: self.today_amount.max(0),
            rating: if self.rating.is_finite() && self.rating >= 0.0 {
                self.rating
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardSummary {
    pub doctor_name: String,
    pub doctor_specialization: String,
    pub notifications_count: i64,
    pub today_patients: i64,
    pub today_completed: i64,
    pub today_amount: i64,
    pub rating: f64,
}

/// Payload of `GET /doctor/appointments`.
#[derive(Debug, Default, Deserialize)]
pub struct AppointmentsPage {
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub server_now_ms: i64,
    #[serde(default, deserialize_with = "de_lenient_i64")]
    pub total: i64,
    #[serde(default)]
    pub items: Vec<Appointment>,
}

/// Payload of `POST /doctor/resolve_patient`.
#[derive(Debug, Default, Deserialize)]
pub struct ResolvePatientData {
    #[serde(
        default,
        alias = "patientId",
        alias = "pid",
        deserialize_with = "de_lenient_i64"
    )]
    pub patient_id: i64,
    #[serde(default, alias = "appointmentId", deserialize_with = "de_lenient_i64")]
    pub appointment_id: i64,
}

/// Patient identity adopted after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPatient {
    pub patient_id: i64,
    pub appointment_id: i64,
}

// ==============================================================================
// ADMISSION / SESSION MODELS
// ==============================================================================

/// Human countdown shown next to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownLabel {
    StartingNow,
    StartsInMinutes(i64),
    Unknown,
}

impl fmt::Display for CountdownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownLabel::StartingNow => write!(f, "Starting now"),
            CountdownLabel::StartsInMinutes(mins) => write!(f, "Starts in {} min", mins),
            CountdownLabel::Unknown => write!(f, "Start time unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub can_start: bool,
    pub countdown: CountdownLabel,
}

/// One reconciled appointment annotated with its admission decision.
#[derive(Debug, Clone)]
pub struct ConsultationEntry {
    pub appointment: Appointment,
    pub admission: AdmissionDecision,
}

/// External call to place for an admitted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallInvocation {
    Video { url: String },
    Audio { dial: String },
}

/// Context handed to the downstream prescription-authoring workflow.
#[derive(Debug, Clone)]
pub struct PrescriptionHandoff {
    pub patient_id: i64,
    pub appointment_id: i64,
    pub appointment_key: String,
    pub patient_name: String,
    pub patient_meta: String,
    pub consult_type: ConsultType,
}

/// Post-admission plan: an optional external call plus the prescription
/// workflow handoff. Physical consults carry no call step.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub call: Option<CallInvocation>,
    pub prescription: PrescriptionHandoff,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsultationError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("patient identity could not be resolved")]
    MissingPatient,

    #[error("unable to build call invocation: {0}")]
    LaunchFailed(String),
}

impl From<ApiError> for ConsultationError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => ConsultationError::Network(msg),
            ApiError::Server(msg) => ConsultationError::Server(msg),
            // A body the server claims is fine but we cannot read is surfaced
            // like any other server-side failure.
            ApiError::Decode(msg) => ConsultationError::Server(msg),
        }
    }
}

// ==============================================================================
// LENIENT WIRE DECODING
// ==============================================================================

/// Accepts numbers or numeric strings; anything else decodes as zero, the
/// "unknown" sentinel used throughout the wire contracts.
fn de_lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(v)) => v,
        Some(Raw::Float(v)) => v as i64,
        Some(Raw::Text(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Parses the server datetime format; absent or malformed values become
/// `None` so the row stays visible but never startable.
fn de_schedule<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| NaiveDateTime::parse_from_str(s.trim(), SERVER_DATETIME_FORMAT).ok()))
}

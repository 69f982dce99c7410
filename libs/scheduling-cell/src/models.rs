// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_DURATION_MINUTES: i32 = 60;

fn default_duration() -> i32 {
    DEFAULT_DURATION_MINUTES
}

/// Wire format for appointment times: 24-hour `HH:mm`, minute granularity.
/// Accepts `HH:mm:ss` on input for rows written by other tools.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// CORE APPOINTMENT MODEL
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub patient_name: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    pub therapist_id: Uuid,
    pub room_id: Option<Uuid>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub is_first_session: bool,
    #[serde(default)]
    pub repeat_weekly: bool,
    pub repeat_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Minutes from midnight where the time window opens.
    pub fn start_minute(&self) -> i32 {
        (self.time.hour() * 60 + self.time.minute()) as i32
    }

    /// Minutes from midnight where the half-open window closes,
    /// clamped to end of day for bookings running past midnight.
    pub fn end_minute(&self) -> i32 {
        (self.start_minute() + self.duration_minutes.max(0)).min(24 * 60)
    }

    /// `HH:mm` label of the computed end time, used in dual-session warnings.
    pub fn end_label(&self) -> String {
        let end = self.end_minute();
        format!("{:02}:{:02}", end / 60, end % 60)
    }

    /// Cancelled appointments never participate in capacity accounting.
    pub fn counts_for_capacity(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Pending,
    Confirmed,
    Blocked,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Blocked => write!(f, "blocked"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    /// Status machine: `scheduled|pending -> confirmed -> completed`;
    /// any non-terminal state may move to `cancelled`. `blocked` is only
    /// entered at creation.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;

        if *self == next {
            return true;
        }
        match next {
            Cancelled => !self.is_terminal(),
            Confirmed => matches!(self, Scheduled | Pending),
            Completed => matches!(self, Confirmed),
            Scheduled | Pending | Blocked => false,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub patient_name: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub duration_minutes: Option<i32>,
    pub therapist_id: Uuid,
    pub room_id: Option<Uuid>,
    /// Defaults to `scheduled`; `blocked` entries are created directly
    /// in this status to mark therapist unavailability.
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub is_first_session: bool,
    #[serde(default)]
    pub repeat_weekly: bool,
    pub repeat_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl CreateAppointmentRequest {
    pub fn effective_duration(&self) -> i32 {
        self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.patient_name.trim().is_empty() {
            return Err(SchedulingError::Validation(
                "patient_name is required".to_string(),
            ));
        }
        if self.effective_duration() <= 0 {
            return Err(SchedulingError::Validation(
                "duration_minutes must be greater than zero".to_string(),
            ));
        }
        if self.repeat_weekly {
            match self.repeat_until {
                None => {
                    return Err(SchedulingError::Validation(
                        "repeat_until is required for weekly repeats".to_string(),
                    ));
                }
                Some(until) if until < self.date => {
                    return Err(SchedulingError::Validation(
                        "repeat_until cannot precede the first occurrence".to_string(),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub status: Option<AppointmentStatus>,
    pub patient_name: Option<String>,
    pub room_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub new_time: NaiveTime,
    pub new_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekCopyRequest {
    pub source_week_start: NaiveDate,
    pub target_week_start: NaiveDate,
    pub therapist_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentSearchQuery {
    pub therapist_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    #[serde(default)]
    pub include_cancelled: bool,
}

// ==============================================================================
// OUTCOME MODELS
// ==============================================================================

/// Result of the single-booking path. The dual-session rule surfaces as a
/// non-blocking warning rather than a rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub warning: Option<String>,
}

/// Partial-success report for a weekly-repeating request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringBookingOutcome {
    pub created: Vec<Appointment>,
    pub skipped: Vec<NaiveDate>,
}

/// Read-only classification of a weekly-repeating request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPreview {
    pub conflicts: Vec<NaiveDate>,
    pub total_weeks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekCopyOutcome {
    pub copied_count: usize,
    pub skipped: Vec<NaiveDate>,
}

// ==============================================================================
// STORE-FACING MODELS
// ==============================================================================

/// An appointment row about to be inserted; the store assigns id and
/// timestamps on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Option<Uuid>,
    pub patient_name: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub therapist_id: Uuid,
    pub room_id: Option<Uuid>,
    pub status: AppointmentStatus,
    pub is_first_session: bool,
    pub repeat_weekly: bool,
    pub repeat_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Partial update pushed to the store; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(
        with = "optional_hhmm",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

mod optional_hhmm {
    use chrono::NaiveTime;
    use serde::Serializer;

    pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => super::hhmm::serialize(t, serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// Range query understood by every store implementation.
#[derive(Debug, Clone)]
pub struct AppointmentFilter {
    pub therapist_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub include_cancelled: bool,
}

impl AppointmentFilter {
    pub fn range(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            therapist_id: None,
            room_id: None,
            date_from,
            date_to,
            include_cancelled: false,
        }
    }

    pub fn for_therapist(therapist_id: Uuid, date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            therapist_id: Some(therapist_id),
            ..Self::range(date_from, date_to)
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Therapist slot is full on {date} at {time}")]
    SlotFull {
        therapist_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    },

    #[error("Room is already booked on {date} at {time}")]
    RoomConflict {
        room_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    },

    #[error("Every requested occurrence conflicted with an existing booking")]
    NoOccurrencesScheduled,

    #[error("No appointments found in the source week")]
    NothingToCopy,

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Database error: {0}")]
    Database(String),
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::epoch;

/// Kind of maintenance work performed on an extinguisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Recharge,
    Inspection,
    MonthlyCheck,
    Repair,
}

/// One completed maintenance entry.
///
/// When a log carries new due dates, recording it moves the extinguisher's
/// schedule forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtinguisherLog {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub extinguisher_id: String,
    /// Person who performed the work.
    #[serde(default)]
    pub person_id: String,
    #[serde(default = "epoch")]
    pub completed_at: DateTime<Utc>,
    pub work_type: WorkType,
    /// Short outcome ("no remarks", "recharged", "replaced").
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub new_next_recharge_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub new_next_inspection_at: Option<DateTime<Utc>>,
}

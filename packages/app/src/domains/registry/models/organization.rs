use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{default_true, epoch};

/// A legal entity whose buildings are under fire-safety supervision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Tax identification number.
    #[serde(default)]
    pub inn: String,
    #[serde(default)]
    pub address: String,
    /// Actor id of the account that manages this organization.
    #[serde(default)]
    pub owner_id: String,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub active: bool,
}

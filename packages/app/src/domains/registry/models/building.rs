use serde::{Deserialize, Serialize};

/// A building attached to an organization.
///
/// Coordinates are data for the map feature; this crate only stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub floors: u32,
    #[serde(default)]
    pub area_sq_m: f64,
    /// Free-form building category ("warehouse", "office", ...).
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub responsible_person_id: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

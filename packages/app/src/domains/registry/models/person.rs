use serde::{Deserialize, Serialize};

/// A person in an organization's responsibility registry. Optionally linked
/// to an application account via `user_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub responsibility_type: String,
}

/// Assigns a person responsibility for a building.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonBuildingLink {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub person_id: String,
    #[serde(default)]
    pub building_id: String,
    #[serde(default)]
    pub responsibility_detail: String,
}

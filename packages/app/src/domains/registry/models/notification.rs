use serde::{Deserialize, Serialize};

use super::default_true;

fn default_days_before() -> Vec<u32> {
    vec![30, 14, 7, 1]
}

fn default_preferred_time() -> String {
    "09:00".to_string()
}

/// Per-user due-date notification preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSetting {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    /// Days before a due date at which a reminder goes out.
    #[serde(default = "default_days_before")]
    pub notify_days_before: Vec<u32>,
    /// Local time of day reminders are delivered, "HH:MM".
    #[serde(default = "default_preferred_time")]
    pub preferred_time: String,
    #[serde(default = "default_true")]
    pub notify_recharge: bool,
    #[serde(default = "default_true")]
    pub notify_inspection: bool,
}

impl NotificationSetting {
    /// Defaults for a user with no stored preferences.
    pub fn for_user(user_id: &str) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.to_string(),
            notify_days_before: default_days_before(),
            preferred_time: default_preferred_time(),
            notify_recharge: true,
            notify_inspection: true,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding one account document per actor.
pub const USERS_COLLECTION: &str = "users";

/// Role assigned at registration.
pub const DEFAULT_ROLE: &str = "user";

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// Persisted user profile record, keyed by the auth-provider actor id.
///
/// This is the single versioned schema for the `users` collection. Fields
/// missing from older documents deserialize to their documented defaults;
/// a field of the wrong type makes the whole record malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub responsibility_type: String,
    #[serde(default = "default_role")]
    pub role: String,
    /// True only after an SMS challenge for this account's phone number
    /// reached its Verified terminal state.
    #[serde(default)]
    pub phone_verified: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

/// Optional profile fields collected at registration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationProfile {
    pub full_name: String,
    pub position: String,
    pub organization_id: String,
    pub responsibility_type: String,
}

impl Account {
    /// A fresh, unverified account as written at registration.
    pub fn new(id: String, email: &str, phone: &str, profile: RegistrationProfile) -> Self {
        Self {
            id,
            email: email.to_string(),
            phone: phone.to_string(),
            full_name: profile.full_name,
            position: profile.position,
            organization_id: profile.organization_id,
            responsibility_type: profile.responsibility_type,
            role: DEFAULT_ROLE.to_string(),
            phone_verified: false,
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn needs_phone_verification(&self) -> bool {
        !self.phone_verified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let account: Account =
            serde_json::from_value(json!({"id": "actor-1", "email": "a@x.com"})).unwrap();

        assert_eq!(account.role, "user");
        assert!(!account.phone_verified);
        assert_eq!(account.avatar_url, None);
        assert_eq!(account.created_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        let result =
            serde_json::from_value::<Account>(json!({"id": "actor-1", "phone": 79991234567u64}));
        assert!(result.is_err());
    }

    #[test]
    fn new_accounts_are_unverified_users() {
        let account = Account::new(
            "actor-1".into(),
            "a@x.com",
            "+71234567890",
            RegistrationProfile::default(),
        );

        assert_eq!(account.role, DEFAULT_ROLE);
        assert!(account.needs_phone_verification());
    }
}

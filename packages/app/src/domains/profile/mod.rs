//! Profile summary assembly.
//!
//! Joins the account record with its organization and derives registry
//! counters (attached buildings, completed checks, overdue extinguishers)
//! for the profile screen.

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tracing::error;

use crate::common::AuthError;
use crate::domains::auth::models::{Account, USERS_COLLECTION};
use crate::domains::registry::models::{
    Building, ExtinguisherStatus, FireExtinguisher, Organization, Person, DEFAULT_WARN_DAYS,
};
use crate::kernel::AppDeps;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileData {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    /// Resolved organization name; `None` when the account has no
    /// organization or its record cannot be read.
    pub organization: Option<String>,
    pub responsibility_type: String,
    pub avatar_url: Option<String>,
    /// Buildings of the account's organization.
    pub attached_objects: usize,
    /// Work log entries recorded by persons linked to this account.
    pub completed_checks: usize,
    /// Extinguishers past due across the organization's buildings.
    pub overdue_units: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileState {
    Loading,
    Ready(ProfileData),
    Error { message: String },
}

pub struct ProfileManager {
    deps: AppDeps,
    state: watch::Sender<ProfileState>,
}

impl ProfileManager {
    pub fn new(deps: AppDeps) -> Self {
        let (state, _) = watch::channel(ProfileState::Loading);
        Self { deps, state }
    }

    /// Read-only snapshot stream of the profile state.
    pub fn state(&self) -> watch::Receiver<ProfileState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> ProfileState {
        self.state.borrow().clone()
    }

    /// Assemble the profile for the current actor.
    pub async fn load(&self) -> Result<(), AuthError> {
        self.state.send_replace(ProfileState::Loading);

        let Some(actor_id) = self.deps.auth.current_actor().await else {
            let err = AuthError::NotAuthenticated;
            self.state.send_replace(ProfileState::Error {
                message: err.to_string(),
            });
            return Err(err);
        };

        match self.assemble(&actor_id).await {
            Ok(data) => {
                self.state.send_replace(ProfileState::Ready(data));
                Ok(())
            }
            Err(err) => {
                error!("failed to load profile data: {err}");
                self.state.send_replace(ProfileState::Error {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Merge a new avatar URL into the account record and reload. No-op
    /// when nobody is signed in.
    pub async fn update_avatar(&self, avatar_url: &str) -> Result<(), AuthError> {
        let Some(actor_id) = self.deps.auth.current_actor().await else {
            return Ok(());
        };
        self.deps
            .store
            .merge(USERS_COLLECTION, &actor_id, json!({ "avatar_url": avatar_url }))
            .await
            .map_err(AuthError::provider)?;
        self.load().await
    }

    async fn assemble(&self, actor_id: &str) -> Result<ProfileData, AuthError> {
        let document = self
            .deps
            .store
            .get(USERS_COLLECTION, actor_id)
            .await
            .map_err(AuthError::provider)?
            .ok_or(AuthError::ProfileNotFound)?;
        let account: Account = serde_json::from_value(document)
            .map_err(|err| AuthError::ProfileIncomplete(err.to_string()))?;

        let organization = self.organization_name(&account.organization_id).await;

        let buildings = if account.organization_id.is_empty() {
            Vec::new()
        } else {
            self.decode_query::<Building>(
                "buildings",
                "organization_id",
                json!(account.organization_id),
            )
            .await?
        };

        let persons = self
            .decode_query::<Person>("persons", "user_id", json!(actor_id))
            .await?;
        let mut completed_checks = 0;
        for person in &persons {
            completed_checks += self
                .deps
                .store
                .query_eq("extinguisher_logs", "person_id", json!(person.id))
                .await
                .map_err(AuthError::provider)?
                .len();
        }

        let now = Utc::now();
        let mut overdue_units = 0;
        for building in &buildings {
            let units = self
                .decode_query::<FireExtinguisher>("extinguishers", "building_id", json!(building.id))
                .await?;
            overdue_units += units
                .iter()
                .filter(|unit| unit.status_at(now, DEFAULT_WARN_DAYS) == ExtinguisherStatus::Expired)
                .count();
        }

        Ok(ProfileData {
            full_name: account.full_name,
            email: account.email,
            phone: account.phone,
            position: account.position,
            organization,
            responsibility_type: account.responsibility_type,
            avatar_url: account.avatar_url,
            attached_objects: buildings.len(),
            completed_checks,
            overdue_units,
        })
    }

    /// Best effort: an unreadable organization record degrades to `None`.
    async fn organization_name(&self, organization_id: &str) -> Option<String> {
        if organization_id.is_empty() {
            return None;
        }
        let document = self
            .deps
            .store
            .get("organizations", organization_id)
            .await
            .ok()??;
        let organization: Organization = serde_json::from_value(document).ok()?;
        Some(organization.name)
    }

    async fn decode_query<T: serde::de::DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<Vec<T>, AuthError> {
        let documents = self
            .deps
            .store
            .query_eq(collection, field, value)
            .await
            .map_err(AuthError::provider)?;
        Ok(documents
            .into_iter()
            .filter_map(|document| serde_json::from_value(document).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::registry::models::{ExtinguisherLog, WorkType};
    use crate::kernel::{BaseDocumentStore, MockAuthService, TestDependencies};
    use chrono::Duration;

    async fn seed_account(ds: &TestDependencies, organization_id: &str) {
        let account = json!({
            "id": "actor-1",
            "email": "a@x.com",
            "phone": "+71234567890",
            "full_name": "A. Petrov",
            "position": "engineer",
            "organization_id": organization_id,
            "responsibility_type": "general",
        });
        ds.store.set("users", "actor-1", account).await.unwrap();
    }

    #[tokio::test]
    async fn load_requires_a_session() {
        let ds = TestDependencies::new();
        let manager = ProfileManager::new(ds.deps());

        let err = manager.load().await.unwrap_err();

        assert!(matches!(err, AuthError::NotAuthenticated));
        assert!(matches!(manager.current(), ProfileState::Error { .. }));
    }

    #[tokio::test]
    async fn load_assembles_account_organization_and_counters() {
        let ds = TestDependencies::with_auth(MockAuthService::new().with_session("actor-1"));
        seed_account(&ds, "org-1").await;
        ds.store
            .set("organizations", "org-1", json!({"name": "Vector LLC", "owner_id": "actor-1"}))
            .await
            .unwrap();
        ds.store
            .set("buildings", "b1", json!({"organization_id": "org-1", "name": "Warehouse"}))
            .await
            .unwrap();
        ds.store
            .set("persons", "p1", json!({"organization_id": "org-1", "user_id": "actor-1"}))
            .await
            .unwrap();
        let log = ExtinguisherLog {
            id: "l1".into(),
            extinguisher_id: "e1".into(),
            person_id: "p1".into(),
            completed_at: Utc::now(),
            work_type: WorkType::MonthlyCheck,
            result: "no remarks".into(),
            comments: String::new(),
            new_next_recharge_at: None,
            new_next_inspection_at: None,
        };
        ds.store
            .set("extinguisher_logs", "l1", serde_json::to_value(&log).unwrap())
            .await
            .unwrap();
        let expired = json!({
            "building_id": "b1",
            "next_recharge_at": Utc::now() - Duration::days(1),
            "next_inspection_at": Utc::now() + Duration::days(90),
        });
        ds.store.set("extinguishers", "e1", expired).await.unwrap();
        let healthy = json!({
            "building_id": "b1",
            "next_recharge_at": Utc::now() + Duration::days(90),
            "next_inspection_at": Utc::now() + Duration::days(90),
        });
        ds.store.set("extinguishers", "e2", healthy).await.unwrap();

        let manager = ProfileManager::new(ds.deps());
        manager.load().await.unwrap();

        let ProfileState::Ready(data) = manager.current() else {
            panic!("profile should be ready");
        };
        assert_eq!(data.full_name, "A. Petrov");
        assert_eq!(data.organization.as_deref(), Some("Vector LLC"));
        assert_eq!(data.attached_objects, 1);
        assert_eq!(data.completed_checks, 1);
        assert_eq!(data.overdue_units, 1);
    }

    #[tokio::test]
    async fn a_missing_organization_degrades_to_none() {
        let ds = TestDependencies::with_auth(MockAuthService::new().with_session("actor-1"));
        seed_account(&ds, "org-ghost").await;

        let manager = ProfileManager::new(ds.deps());
        manager.load().await.unwrap();

        let ProfileState::Ready(data) = manager.current() else {
            panic!("profile should be ready");
        };
        assert_eq!(data.organization, None);
        assert_eq!(data.attached_objects, 0);
    }

    #[tokio::test]
    async fn a_missing_account_record_is_an_error() {
        let ds = TestDependencies::with_auth(MockAuthService::new().with_session("actor-1"));
        let manager = ProfileManager::new(ds.deps());

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, AuthError::ProfileNotFound));
    }

    #[tokio::test]
    async fn update_avatar_merges_and_reloads() {
        let ds = TestDependencies::with_auth(MockAuthService::new().with_session("actor-1"));
        seed_account(&ds, "").await;

        let manager = ProfileManager::new(ds.deps());
        manager.update_avatar("https://cdn.example/a.png").await.unwrap();

        let ProfileState::Ready(data) = manager.current() else {
            panic!("profile should be ready");
        };
        assert_eq!(data.avatar_url.as_deref(), Some("https://cdn.example/a.png"));
    }

    #[tokio::test]
    async fn update_avatar_is_a_noop_when_signed_out() {
        let ds = TestDependencies::new();
        let manager = ProfileManager::new(ds.deps());

        manager.update_avatar("https://cdn.example/a.png").await.unwrap();
        assert_eq!(manager.current(), ProfileState::Loading);
    }
}

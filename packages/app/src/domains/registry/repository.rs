//! Registry operations over the document store.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;

use super::models::{
    Building, ExtinguisherLog, FireExtinguisher, NotificationSetting, Organization, Person,
    PersonBuildingLink,
};
use crate::kernel::{BaseAuthService, BaseDocumentStore};

const ORGANIZATIONS_COLLECTION: &str = "organizations";
const BUILDINGS_COLLECTION: &str = "buildings";
const EXTINGUISHERS_COLLECTION: &str = "extinguishers";
const EXTINGUISHER_LOGS_COLLECTION: &str = "extinguisher_logs";
const PERSONS_COLLECTION: &str = "persons";
const PERSON_BUILDING_LINKS_COLLECTION: &str = "person_building_links";
const NOTIFICATION_SETTINGS_COLLECTION: &str = "notification_settings";

/// Live, whole-result snapshots of a registry query.
pub type Snapshots<T> = BoxStream<'static, Vec<T>>;

#[async_trait]
pub trait Registry: Send + Sync {
    // --- Organizations ---

    async fn organizations_for_owner(&self, owner_id: &str) -> Result<Snapshots<Organization>>;

    /// Create (empty id) or update an organization. The current actor is
    /// stamped as owner.
    async fn save_organization(&self, organization: Organization) -> Result<String>;

    /// Removes the organization together with its buildings and persons.
    async fn delete_organization(&self, organization_id: &str) -> Result<()>;

    // --- Buildings ---

    async fn buildings_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Snapshots<Building>>;

    /// Every building in the store, live.
    async fn all_buildings(&self) -> Result<Snapshots<Building>>;

    async fn save_building(&self, building: Building) -> Result<String>;

    /// Removes the building together with its extinguishers and person links.
    async fn delete_building(&self, building_id: &str) -> Result<()>;

    // --- Extinguishers ---

    async fn extinguishers_for_building(
        &self,
        building_id: &str,
    ) -> Result<Snapshots<FireExtinguisher>>;

    async fn save_extinguisher(&self, extinguisher: FireExtinguisher) -> Result<String>;

    /// Removes the extinguisher together with its work log.
    async fn delete_extinguisher(&self, extinguisher_id: &str) -> Result<()>;

    /// Append a work log entry and apply any new due dates it carries to the
    /// extinguisher's schedule.
    async fn record_work(&self, log: ExtinguisherLog) -> Result<String>;

    /// Log entries for one extinguisher, oldest first.
    async fn logs_for_extinguisher(&self, extinguisher_id: &str) -> Result<Vec<ExtinguisherLog>>;

    // --- Persons ---

    async fn save_person(&self, person: Person) -> Result<String>;

    async fn persons_for_organization(&self, organization_id: &str) -> Result<Vec<Person>>;

    async fn link_person_to_building(&self, link: PersonBuildingLink) -> Result<String>;

    async fn links_for_building(&self, building_id: &str) -> Result<Vec<PersonBuildingLink>>;

    // --- Notification settings ---

    /// Stored preferences, or the documented defaults when none exist.
    async fn notification_settings_for_user(&self, user_id: &str) -> Result<NotificationSetting>;

    async fn save_notification_settings(&self, settings: NotificationSetting) -> Result<String>;
}

/// [`Registry`] over a [`BaseDocumentStore`].
pub struct DocumentRegistry {
    store: Arc<dyn BaseDocumentStore>,
    auth: Arc<dyn BaseAuthService>,
}

impl DocumentRegistry {
    pub fn new(store: Arc<dyn BaseDocumentStore>, auth: Arc<dyn BaseAuthService>) -> Self {
        Self { store, auth }
    }

    /// Insert under a store-generated id when the record has none, replace
    /// otherwise. Returns the record's id.
    async fn save_document<T: Serialize + Sync>(
        &self,
        collection: &str,
        id: &str,
        record: &T,
    ) -> Result<String> {
        let document = serde_json::to_value(record)?;
        if id.is_empty() {
            self.store.insert(collection, document).await
        } else {
            self.store.set(collection, id, document).await?;
            Ok(id.to_string())
        }
    }

    /// Malformed documents are skipped rather than failing the whole list.
    fn decode_all<T: DeserializeOwned>(documents: Vec<JsonValue>) -> Vec<T> {
        documents
            .into_iter()
            .filter_map(|document| serde_json::from_value(document).ok())
            .collect()
    }

    async fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>> {
        let documents = self.store.query_eq(collection, field, value.into()).await?;
        Ok(Self::decode_all(documents))
    }

    async fn watch<T: DeserializeOwned + Send + 'static>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Snapshots<T>> {
        let stream = self
            .store
            .subscribe_eq(collection, field, value.into())
            .await?;
        Ok(stream.map(Self::decode_all::<T>).boxed())
    }
}

#[async_trait]
impl Registry for DocumentRegistry {
    async fn organizations_for_owner(&self, owner_id: &str) -> Result<Snapshots<Organization>> {
        self.watch(ORGANIZATIONS_COLLECTION, "owner_id", owner_id)
            .await
    }

    async fn save_organization(&self, organization: Organization) -> Result<String> {
        let owner_id = self
            .auth
            .current_actor()
            .await
            .context("not signed in")?;
        let organization = Organization {
            owner_id,
            ..organization
        };
        let id = organization.id.clone();
        self.save_document(ORGANIZATIONS_COLLECTION, &id, &organization)
            .await
    }

    async fn delete_organization(&self, organization_id: &str) -> Result<()> {
        let buildings: Vec<Building> = self
            .list(BUILDINGS_COLLECTION, "organization_id", organization_id)
            .await?;
        for building in buildings {
            self.delete_building(&building.id).await?;
        }
        let persons: Vec<Person> = self
            .list(PERSONS_COLLECTION, "organization_id", organization_id)
            .await?;
        for person in persons {
            self.store.delete(PERSONS_COLLECTION, &person.id).await?;
        }
        self.store
            .delete(ORGANIZATIONS_COLLECTION, organization_id)
            .await?;
        info!("organization {organization_id} deleted with its dependents");
        Ok(())
    }

    async fn buildings_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Snapshots<Building>> {
        self.watch(BUILDINGS_COLLECTION, "organization_id", organization_id)
            .await
    }

    async fn all_buildings(&self) -> Result<Snapshots<Building>> {
        let stream = self.store.subscribe_all(BUILDINGS_COLLECTION).await?;
        Ok(stream.map(Self::decode_all::<Building>).boxed())
    }

    async fn save_building(&self, building: Building) -> Result<String> {
        if building.organization_id.is_empty() {
            bail!("a building must be attached to an organization");
        }
        let id = building.id.clone();
        self.save_document(BUILDINGS_COLLECTION, &id, &building).await
    }

    async fn delete_building(&self, building_id: &str) -> Result<()> {
        let extinguishers: Vec<FireExtinguisher> = self
            .list(EXTINGUISHERS_COLLECTION, "building_id", building_id)
            .await?;
        for extinguisher in extinguishers {
            self.delete_extinguisher(&extinguisher.id).await?;
        }
        let links: Vec<PersonBuildingLink> = self
            .list(PERSON_BUILDING_LINKS_COLLECTION, "building_id", building_id)
            .await?;
        for link in links {
            self.store
                .delete(PERSON_BUILDING_LINKS_COLLECTION, &link.id)
                .await?;
        }
        self.store.delete(BUILDINGS_COLLECTION, building_id).await
    }

    async fn extinguishers_for_building(
        &self,
        building_id: &str,
    ) -> Result<Snapshots<FireExtinguisher>> {
        self.watch(EXTINGUISHERS_COLLECTION, "building_id", building_id)
            .await
    }

    async fn save_extinguisher(&self, extinguisher: FireExtinguisher) -> Result<String> {
        if extinguisher.building_id.is_empty() {
            bail!("an extinguisher must be attached to a building");
        }
        let id = extinguisher.id.clone();
        self.save_document(EXTINGUISHERS_COLLECTION, &id, &extinguisher)
            .await
    }

    async fn delete_extinguisher(&self, extinguisher_id: &str) -> Result<()> {
        let logs: Vec<ExtinguisherLog> = self
            .list(
                EXTINGUISHER_LOGS_COLLECTION,
                "extinguisher_id",
                extinguisher_id,
            )
            .await?;
        for log in logs {
            self.store
                .delete(EXTINGUISHER_LOGS_COLLECTION, &log.id)
                .await?;
        }
        self.store
            .delete(EXTINGUISHERS_COLLECTION, extinguisher_id)
            .await
    }

    async fn record_work(&self, log: ExtinguisherLog) -> Result<String> {
        let document = self
            .store
            .get(EXTINGUISHERS_COLLECTION, &log.extinguisher_id)
            .await?
            .with_context(|| format!("extinguisher {} does not exist", log.extinguisher_id))?;
        let mut extinguisher: FireExtinguisher = serde_json::from_value(document)?;

        let log_id = log.id.clone();
        let log_id = self
            .save_document(EXTINGUISHER_LOGS_COLLECTION, &log_id, &log)
            .await?;

        // A recharge or inspection moves the schedule forward.
        if log.new_next_recharge_at.is_some() || log.new_next_inspection_at.is_some() {
            if let Some(next) = log.new_next_recharge_at {
                extinguisher.next_recharge_at = next;
            }
            if let Some(next) = log.new_next_inspection_at {
                extinguisher.next_inspection_at = next;
            }
            let unit_id = extinguisher.id.clone();
            self.save_document(EXTINGUISHERS_COLLECTION, &unit_id, &extinguisher)
                .await?;
        }

        info!(
            "work recorded for extinguisher {}: {:?}",
            log.extinguisher_id, log.work_type
        );
        Ok(log_id)
    }

    async fn logs_for_extinguisher(&self, extinguisher_id: &str) -> Result<Vec<ExtinguisherLog>> {
        let mut logs: Vec<ExtinguisherLog> = self
            .list(
                EXTINGUISHER_LOGS_COLLECTION,
                "extinguisher_id",
                extinguisher_id,
            )
            .await?;
        logs.sort_by_key(|log| log.completed_at);
        Ok(logs)
    }

    async fn save_person(&self, person: Person) -> Result<String> {
        if person.organization_id.is_empty() {
            bail!("a person must belong to an organization");
        }
        let id = person.id.clone();
        self.save_document(PERSONS_COLLECTION, &id, &person).await
    }

    async fn persons_for_organization(&self, organization_id: &str) -> Result<Vec<Person>> {
        self.list(PERSONS_COLLECTION, "organization_id", organization_id)
            .await
    }

    async fn link_person_to_building(&self, link: PersonBuildingLink) -> Result<String> {
        if link.person_id.is_empty() || link.building_id.is_empty() {
            bail!("a responsibility link needs both a person and a building");
        }
        let id = link.id.clone();
        self.save_document(PERSON_BUILDING_LINKS_COLLECTION, &id, &link)
            .await
    }

    async fn links_for_building(&self, building_id: &str) -> Result<Vec<PersonBuildingLink>> {
        self.list(PERSON_BUILDING_LINKS_COLLECTION, "building_id", building_id)
            .await
    }

    async fn notification_settings_for_user(&self, user_id: &str) -> Result<NotificationSetting> {
        let stored: Vec<NotificationSetting> = self
            .list(NOTIFICATION_SETTINGS_COLLECTION, "user_id", user_id)
            .await?;
        Ok(stored
            .into_iter()
            .next()
            .unwrap_or_else(|| NotificationSetting::for_user(user_id)))
    }

    async fn save_notification_settings(&self, settings: NotificationSetting) -> Result<String> {
        if settings.user_id.is_empty() {
            bail!("notification settings need a user");
        }
        let id = settings.id.clone();
        self.save_document(NOTIFICATION_SETTINGS_COLLECTION, &id, &settings)
            .await
    }
}

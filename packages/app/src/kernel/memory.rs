//! In-memory document store backend.
//!
//! Used by tests and local development. Collections are maps of document id
//! to JSON document; live subscriptions are driven by a per-collection
//! change signal and re-run their query after every change, so subscribers
//! always receive whole snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value as JsonValue;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::traits::{BaseDocumentStore, SnapshotStream};

type Collections = HashMap<String, BTreeMap<String, JsonValue>>;

#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
    changes: Arc<RwLock<HashMap<String, broadcast::Sender<()>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the store-owned `id` field onto a document.
    fn stamped(id: &str, document: JsonValue) -> Result<JsonValue> {
        match document {
            JsonValue::Object(mut map) => {
                map.insert("id".to_string(), JsonValue::String(id.to_string()));
                Ok(JsonValue::Object(map))
            }
            other => bail!("document must be a JSON object, got: {other}"),
        }
    }

    async fn notify(&self, collection: &str) {
        let changes = self.changes.read().await;
        if let Some(tx) = changes.get(collection) {
            // Ignore send errors (no active subscribers)
            let _ = tx.send(());
        }
    }

    async fn snapshot(
        &self,
        collection: &str,
        filter: Option<&(String, JsonValue)>,
    ) -> Vec<JsonValue> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|doc| match filter {
                        Some((field, value)) => doc.get(field) == Some(value),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn subscribe(
        &self,
        collection: &str,
        filter: Option<(String, JsonValue)>,
    ) -> SnapshotStream {
        let mut change_rx = {
            let mut changes = self.changes.write().await;
            changes
                .entry(collection.to_string())
                .or_insert_with(|| broadcast::channel(64).0)
                .subscribe()
        };

        let (snapshot_tx, snapshot_rx) = mpsc::channel(16);
        let store = self.clone();
        let collection = collection.to_string();

        tokio::spawn(async move {
            loop {
                let snapshot = store.snapshot(&collection, filter.as_ref()).await;
                if snapshot_tx.send(snapshot).await.is_err() {
                    break;
                }
                tokio::select! {
                    changed = change_rx.recv() => match changed {
                        // A lagged receiver just recomputes; snapshots absorb
                        // any number of missed signals.
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = snapshot_tx.closed() => break,
                }
            }
        });

        ReceiverStream::new(snapshot_rx).boxed()
    }
}

#[async_trait]
impl BaseDocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, document: JsonValue) -> Result<()> {
        let document = Self::stamped(id, document)?;
        {
            let mut collections = self.collections.write().await;
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), document);
        }
        self.notify(collection).await;
        Ok(())
    }

    async fn insert(&self, collection: &str, document: JsonValue) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.set(collection, &id, document).await?;
        Ok(id)
    }

    async fn merge(&self, collection: &str, id: &str, fields: JsonValue) -> Result<()> {
        let JsonValue::Object(fields) = fields else {
            bail!("merge fields must be a JSON object");
        };
        {
            let mut collections = self.collections.write().await;
            let existing = collections
                .get_mut(collection)
                .and_then(|documents| documents.get_mut(id));
            let Some(JsonValue::Object(document)) = existing else {
                bail!("document {collection}/{id} does not exist");
            };
            for (key, value) in fields {
                document.insert(key, value);
            }
            document.insert("id".to_string(), JsonValue::String(id.to_string()));
        }
        self.notify(collection).await;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        {
            let mut collections = self.collections.write().await;
            if let Some(documents) = collections.get_mut(collection) {
                documents.remove(id);
            }
        }
        self.notify(collection).await;
        Ok(())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: JsonValue,
    ) -> Result<Vec<JsonValue>> {
        Ok(self
            .snapshot(collection, Some(&(field.to_string(), value)))
            .await)
    }

    async fn subscribe_eq(
        &self,
        collection: &str,
        field: &str,
        value: JsonValue,
    ) -> Result<SnapshotStream> {
        Ok(self
            .subscribe(collection, Some((field.to_string(), value)))
            .await)
    }

    async fn subscribe_all(&self, collection: &str) -> Result<SnapshotStream> {
        Ok(self.subscribe(collection, None).await)
    }
}

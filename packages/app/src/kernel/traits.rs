// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic. The auth
// provider, document store and chat completions service are external
// collaborators; holders depend on these seams and never on a concrete
// client.
//
// Naming convention: Base* for trait names (e.g., BaseAuthService)

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value as JsonValue;

// =============================================================================
// Auth Provider Trait (Infrastructure - credentials, sessions, SMS challenges)
// =============================================================================

/// Opaque phone-ownership credential issued by the auth provider after a
/// challenge is approved. Only ever handed back to the provider for linking.
#[derive(Debug, Clone)]
pub struct PhoneCredential {
    pub token: String,
}

/// Outcome of issuing a phone challenge.
///
/// Providers normally acknowledge with a challenge id and deliver the code
/// over SMS. Some can approve the number silently (instant verification on a
/// device that owns it); that path skips code entry entirely.
#[derive(Debug, Clone)]
pub enum ChallengeOutcome {
    CodeSent { challenge_id: String },
    AutoVerified { credential: PhoneCredential },
}

#[async_trait]
pub trait BaseAuthService: Send + Sync {
    /// Create an email/password credential. Returns the new actor id and
    /// leaves the session signed in as that actor.
    async fn create_credential(&self, email: &str, password: &str) -> Result<String>;

    /// Verify an email/password credential. Returns the actor id and leaves
    /// the session signed in.
    async fn sign_in(&self, email: &str, password: &str) -> Result<String>;

    /// Actor id of the current session, if any.
    async fn current_actor(&self) -> Option<String>;

    /// Delete the credential behind the current session. Used to roll back a
    /// registration whose account record could not be written.
    async fn delete_current_credential(&self) -> Result<()>;

    /// Drop the current session. Never fails.
    async fn sign_out(&self);

    /// Issue an SMS challenge for an E.164 phone number.
    async fn send_phone_challenge(&self, phone_number: &str) -> Result<ChallengeOutcome>;

    /// Exchange a challenge id and user-entered code for a phone credential.
    async fn verify_phone_challenge(
        &self,
        challenge_id: &str,
        code: &str,
    ) -> Result<PhoneCredential>;

    /// Link a phone credential to the current session's actor.
    async fn link_phone_credential(&self, credential: PhoneCredential) -> Result<()>;
}

// =============================================================================
// Document Store Trait (Infrastructure - keyed JSON documents)
// =============================================================================

/// Live query results: each item is the full, ordered result set of the
/// subscribed query at some point in time. Observers never see a partial
/// update.
pub type SnapshotStream = BoxStream<'static, Vec<JsonValue>>;

/// Keyed document collections with equality queries and live snapshots.
///
/// Documents are JSON objects. The store owns the `id` field: every write
/// stamps it with the document key, so documents read back always carry the
/// key they are stored under.
#[async_trait]
pub trait BaseDocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>>;

    /// Create or replace a document under a caller-chosen id.
    async fn set(&self, collection: &str, id: &str, document: JsonValue) -> Result<()>;

    /// Insert a document under a store-generated id. Returns the id.
    async fn insert(&self, collection: &str, document: JsonValue) -> Result<String>;

    /// Shallow-merge fields into an existing document. Fails if the document
    /// does not exist.
    async fn merge(&self, collection: &str, id: &str, fields: JsonValue) -> Result<()>;

    /// Deleting a missing document is a no-op.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// All documents where `field` equals `value`, ordered by document id.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: JsonValue,
    ) -> Result<Vec<JsonValue>>;

    /// Live version of [`query_eq`](Self::query_eq): emits the current
    /// snapshot immediately, then a fresh snapshot after every change to the
    /// collection.
    async fn subscribe_eq(
        &self,
        collection: &str,
        field: &str,
        value: JsonValue,
    ) -> Result<SnapshotStream>;

    /// Live snapshots of a whole collection.
    async fn subscribe_all(&self, collection: &str) -> Result<SnapshotStream>;
}

// =============================================================================
// Chat Service Trait (Infrastructure - assistant completions)
// =============================================================================

#[async_trait]
pub trait BaseChatService: Send + Sync {
    /// Send a single user prompt and return the assistant's reply text.
    async fn send(&self, prompt: &str) -> Result<String>;
}

// TestDependencies - mock implementations for testing
//
// Provides scripted auth/chat services with call capture, a failure-injecting
// document store wrapper, and a bundle that wires them into an AppDeps.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{
    AppDeps, BaseAuthService, BaseChatService, BaseDocumentStore, ChallengeOutcome,
    MemoryDocumentStore, PhoneCredential, SnapshotStream,
};

// =============================================================================
// Mock Auth Service
// =============================================================================

#[derive(Default)]
pub struct MockAuthService {
    credentials: Mutex<HashMap<String, (String, String)>>, // email -> (password, actor id)
    current: Mutex<Option<String>>,
    issued_challenges: Mutex<HashMap<String, String>>, // challenge id -> phone
    next_actor: Mutex<u32>,
    next_challenge: Mutex<u32>,
    valid_code: Mutex<String>,
    auto_verify: Mutex<bool>,
    create_error: Mutex<Option<String>>,
    challenge_error: Mutex<Option<String>>,
    link_error: Mutex<Option<String>>,
    fail_delete: Mutex<bool>,
    challenge_calls: Mutex<Vec<String>>,
    verify_calls: Mutex<Vec<(String, String)>>,
    deleted_credentials: Mutex<Vec<String>>,
    linked_credentials: Mutex<Vec<String>>,
}

impl MockAuthService {
    pub fn new() -> Self {
        Self {
            valid_code: Mutex::new("123456".to_string()),
            ..Self::default()
        }
    }

    /// Only this code passes `verify_phone_challenge` (default: "123456").
    pub fn with_valid_code(self, code: &str) -> Self {
        *self.valid_code.lock().unwrap() = code.to_string();
        self
    }

    /// Challenges are approved silently, without code entry.
    pub fn with_auto_verification(self) -> Self {
        *self.auto_verify.lock().unwrap() = true;
        self
    }

    pub fn with_create_error(self, message: &str) -> Self {
        *self.create_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn with_challenge_error(self, message: &str) -> Self {
        *self.challenge_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn with_link_error(self, message: &str) -> Self {
        *self.link_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn with_failing_delete(self) -> Self {
        *self.fail_delete.lock().unwrap() = true;
        self
    }

    /// Pretend the provider kept a session alive across restarts.
    pub fn with_session(self, actor_id: &str) -> Self {
        *self.current.lock().unwrap() = Some(actor_id.to_string());
        self
    }

    /// Phone numbers a challenge was requested for.
    pub fn challenge_calls(&self) -> Vec<String> {
        self.challenge_calls.lock().unwrap().clone()
    }

    /// (challenge id, code) pairs passed to verification.
    pub fn verify_calls(&self) -> Vec<(String, String)> {
        self.verify_calls.lock().unwrap().clone()
    }

    /// Actor ids whose credential was deleted.
    pub fn deleted_credentials(&self) -> Vec<String> {
        self.deleted_credentials.lock().unwrap().clone()
    }

    /// Credential tokens linked to the session.
    pub fn linked_credentials(&self) -> Vec<String> {
        self.linked_credentials.lock().unwrap().clone()
    }

    /// Current session actor, if any.
    pub fn session(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseAuthService for MockAuthService {
    async fn create_credential(&self, email: &str, password: &str) -> Result<String> {
        if let Some(message) = self.create_error.lock().unwrap().clone() {
            bail!(message);
        }
        let mut credentials = self.credentials.lock().unwrap();
        if credentials.contains_key(email) {
            bail!("email address is already in use");
        }
        let mut next = self.next_actor.lock().unwrap();
        *next += 1;
        let actor_id = format!("actor-{}", *next);
        credentials.insert(email.to_string(), (password.to_string(), actor_id.clone()));
        *self.current.lock().unwrap() = Some(actor_id.clone());
        Ok(actor_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<String> {
        let credentials = self.credentials.lock().unwrap();
        match credentials.get(email) {
            Some((stored, actor_id)) if stored == password => {
                *self.current.lock().unwrap() = Some(actor_id.clone());
                Ok(actor_id.clone())
            }
            _ => bail!("invalid email or password"),
        }
    }

    async fn current_actor(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    async fn delete_current_credential(&self) -> Result<()> {
        if *self.fail_delete.lock().unwrap() {
            bail!("credential delete refused");
        }
        let Some(actor_id) = self.current.lock().unwrap().take() else {
            return Ok(());
        };
        self.credentials
            .lock()
            .unwrap()
            .retain(|_, (_, id)| *id != actor_id);
        self.deleted_credentials.lock().unwrap().push(actor_id);
        Ok(())
    }

    async fn sign_out(&self) {
        *self.current.lock().unwrap() = None;
    }

    async fn send_phone_challenge(&self, phone_number: &str) -> Result<ChallengeOutcome> {
        self.challenge_calls
            .lock()
            .unwrap()
            .push(phone_number.to_string());
        if let Some(message) = self.challenge_error.lock().unwrap().clone() {
            bail!(message);
        }
        if *self.auto_verify.lock().unwrap() {
            return Ok(ChallengeOutcome::AutoVerified {
                credential: PhoneCredential {
                    token: format!("auto:{phone_number}"),
                },
            });
        }
        let mut next = self.next_challenge.lock().unwrap();
        *next += 1;
        let challenge_id = format!("challenge-{}", *next);
        self.issued_challenges
            .lock()
            .unwrap()
            .insert(challenge_id.clone(), phone_number.to_string());
        Ok(ChallengeOutcome::CodeSent { challenge_id })
    }

    async fn verify_phone_challenge(
        &self,
        challenge_id: &str,
        code: &str,
    ) -> Result<PhoneCredential> {
        self.verify_calls
            .lock()
            .unwrap()
            .push((challenge_id.to_string(), code.to_string()));
        if !self
            .issued_challenges
            .lock()
            .unwrap()
            .contains_key(challenge_id)
        {
            bail!("unknown challenge id");
        }
        if code != self.valid_code.lock().unwrap().as_str() {
            bail!("the sms code is incorrect");
        }
        Ok(PhoneCredential {
            token: format!("{challenge_id}:{code}"),
        })
    }

    async fn link_phone_credential(&self, credential: PhoneCredential) -> Result<()> {
        if let Some(message) = self.link_error.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }
        self.linked_credentials.lock().unwrap().push(credential.token);
        Ok(())
    }
}

// =============================================================================
// Mock Chat Service
// =============================================================================

#[derive(Default)]
pub struct MockChatService {
    replies: Mutex<VecDeque<String>>,
    error: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockChatService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply; replies are consumed in order, then "ok" is returned.
    pub fn with_reply(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(reply.to_string());
        self
    }

    pub fn with_error(self, message: &str) -> Self {
        *self.error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseChatService for MockChatService {
    async fn send(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(message) = self.error.lock().unwrap().clone() {
            bail!(message);
        }
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "ok".to_string()))
    }
}

// =============================================================================
// Failure-injecting Document Store
// =============================================================================

/// Wraps a MemoryDocumentStore and refuses selected write operations, for
/// exercising rollback and failure-ordering paths.
pub struct FailingDocumentStore {
    inner: MemoryDocumentStore,
    fail_set: Mutex<bool>,
    fail_merge: Mutex<bool>,
}

impl FailingDocumentStore {
    pub fn new(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            fail_set: Mutex::new(false),
            fail_merge: Mutex::new(false),
        }
    }

    pub fn with_failing_set(self) -> Self {
        *self.fail_set.lock().unwrap() = true;
        self
    }

    pub fn with_failing_merge(self) -> Self {
        *self.fail_merge.lock().unwrap() = true;
        self
    }
}

#[async_trait]
impl BaseDocumentStore for FailingDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, document: JsonValue) -> Result<()> {
        if *self.fail_set.lock().unwrap() {
            bail!("store write refused");
        }
        self.inner.set(collection, id, document).await
    }

    async fn insert(&self, collection: &str, document: JsonValue) -> Result<String> {
        if *self.fail_set.lock().unwrap() {
            bail!("store write refused");
        }
        self.inner.insert(collection, document).await
    }

    async fn merge(&self, collection: &str, id: &str, fields: JsonValue) -> Result<()> {
        if *self.fail_merge.lock().unwrap() {
            bail!("store write refused");
        }
        self.inner.merge(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.inner.delete(collection, id).await
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: JsonValue,
    ) -> Result<Vec<JsonValue>> {
        self.inner.query_eq(collection, field, value).await
    }

    async fn subscribe_eq(
        &self,
        collection: &str,
        field: &str,
        value: JsonValue,
    ) -> Result<SnapshotStream> {
        self.inner.subscribe_eq(collection, field, value).await
    }

    async fn subscribe_all(&self, collection: &str) -> Result<SnapshotStream> {
        self.inner.subscribe_all(collection).await
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Mock services wired into an AppDeps, for tests.
pub struct TestDependencies {
    pub auth: Arc<MockAuthService>,
    pub store: Arc<MemoryDocumentStore>,
    pub chat: Arc<MockChatService>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            auth: Arc::new(MockAuthService::new()),
            store: Arc::new(MemoryDocumentStore::new()),
            chat: Arc::new(MockChatService::new()),
        }
    }

    pub fn with_auth(auth: MockAuthService) -> Self {
        Self {
            auth: Arc::new(auth),
            ..Self::new()
        }
    }

    pub fn deps(&self) -> AppDeps {
        AppDeps::new(
            self.auth.clone(),
            self.store.clone(),
            self.chat.clone(),
            "+7".to_string(),
        )
    }

    /// Same mocks, but a caller-supplied store (e.g. a FailingDocumentStore).
    pub fn deps_with_store(&self, store: Arc<dyn BaseDocumentStore>) -> AppDeps {
        AppDeps::new(self.auth.clone(), store, self.chat.clone(), "+7".to_string())
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

//! Account session state.
//!
//! `SessionManager` tracks the authentication lifecycle and the current
//! actor's account record. State is published as a whole-snapshot watch
//! channel: observers always see a fully formed `AuthState`, never a partial
//! update. Mutating operations serialize on an internal lock, so two
//! concurrent calls cannot interleave their check-then-write sequences.

use serde_json::json;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::common::AuthError;
use crate::domains::auth::models::{Account, RegistrationProfile, USERS_COLLECTION};
use crate::kernel::AppDeps;

/// Authentication lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    /// Resolving an existing session or processing a credential operation.
    Authenticating,
    /// Signed in with a loaded account record.
    Authenticated(Account),
    /// The last credential operation failed.
    Failed { message: String },
}

impl AuthState {
    pub fn account(&self) -> Option<&Account> {
        match self {
            AuthState::Authenticated(account) => Some(account),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.account().is_some()
    }

    /// True when signed in with an unverified phone number.
    pub fn needs_phone_verification(&self) -> bool {
        self.account().map(Account::needs_phone_verification).unwrap_or(false)
    }
}

pub struct SessionManager {
    deps: AppDeps,
    state: watch::Sender<AuthState>,
    /// Serializes mutating operations (register pre-check and the
    /// verified-flag persist are check-then-write sequences).
    op_lock: Mutex<()>,
}

impl SessionManager {
    /// Starts in `Authenticating`; call [`resolve_session`](Self::resolve_session)
    /// to settle the initial state from any session the provider kept alive.
    pub fn new(deps: AppDeps) -> Self {
        let (state, _) = watch::channel(AuthState::Authenticating);
        Self {
            deps,
            state,
            op_lock: Mutex::new(()),
        }
    }

    /// Read-only snapshot stream of the session state.
    pub fn state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_account(&self) -> Option<Account> {
        self.state.borrow().account().cloned()
    }

    /// Settle the initial state from the provider's current session.
    pub async fn resolve_session(&self) {
        let _guard = self.op_lock.lock().await;
        match self.deps.auth.current_actor().await {
            Some(actor_id) => match self.load_account(&actor_id).await {
                Ok(account) => {
                    self.state.send_replace(AuthState::Authenticated(account));
                }
                Err(err) => {
                    warn!("existing session could not be resolved: {err}");
                    self.state.send_replace(AuthState::Failed {
                        message: err.to_string(),
                    });
                }
            },
            None => {
                self.state.send_replace(AuthState::Unauthenticated);
            }
        }
    }

    /// Register a new account with an unverified phone number.
    ///
    /// The phone number must not already belong to another account.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        phone: &str,
        profile: RegistrationProfile,
    ) -> Result<(), AuthError> {
        let _guard = self.op_lock.lock().await;
        self.state.send_replace(AuthState::Authenticating);

        match self.try_register(email, password, phone, profile).await {
            Ok(account) => {
                info!("account {} registered", account.id);
                self.state.send_replace(AuthState::Authenticated(account));
                Ok(())
            }
            Err(err) => {
                error!("registration failed: {err}");
                self.state.send_replace(AuthState::Failed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn try_register(
        &self,
        email: &str,
        password: &str,
        phone: &str,
        profile: RegistrationProfile,
    ) -> Result<Account, AuthError> {
        // 1. The phone number must be free.
        let existing = self
            .deps
            .store
            .query_eq(USERS_COLLECTION, "phone", phone.into())
            .await
            .map_err(AuthError::provider)?;
        if !existing.is_empty() {
            return Err(AuthError::PhoneAlreadyRegistered);
        }

        // 2. Create the credential; the session is now signed in as the new actor.
        let actor_id = self
            .deps
            .auth
            .create_credential(email, password)
            .await
            .map_err(AuthError::provider)?;

        // 3. Write the account record.
        let account = Account::new(actor_id.clone(), email, phone, profile);
        let document = serde_json::to_value(&account).map_err(AuthError::provider)?;
        if let Err(err) = self.deps.store.set(USERS_COLLECTION, &actor_id, document).await {
            // Roll the credential back so the email is not left occupied by
            // a half-registered account. The write error dominates; a failed
            // rollback is only logged.
            if let Err(delete_err) = self.deps.auth.delete_current_credential().await {
                error!("failed to delete credential after aborted registration: {delete_err}");
            }
            return Err(AuthError::provider(err));
        }

        // 4. Load the record back.
        self.load_account(&actor_id).await
    }

    /// Authenticate an existing credential and load its account record.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let _guard = self.op_lock.lock().await;
        self.state.send_replace(AuthState::Authenticating);

        let result = match self.deps.auth.sign_in(email, password).await {
            Ok(actor_id) => self.load_account(&actor_id).await,
            Err(err) => Err(AuthError::provider(err)),
        };

        match result {
            Ok(account) => {
                self.state.send_replace(AuthState::Authenticated(account));
                Ok(())
            }
            Err(err) => {
                error!("sign in failed: {err}");
                self.state.send_replace(AuthState::Failed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Load the account record for an actor. A session without a readable
    /// record is unusable, so the provider session is signed back out on
    /// failure.
    async fn load_account(&self, actor_id: &str) -> Result<Account, AuthError> {
        match self.fetch_account(actor_id).await {
            Ok(account) => Ok(account),
            Err(err) => {
                self.deps.auth.sign_out().await;
                Err(err)
            }
        }
    }

    async fn fetch_account(&self, actor_id: &str) -> Result<Account, AuthError> {
        let document = self
            .deps
            .store
            .get(USERS_COLLECTION, actor_id)
            .await
            .map_err(AuthError::provider)?
            .ok_or(AuthError::ProfileNotFound)?;
        serde_json::from_value(document).map_err(|err| AuthError::ProfileIncomplete(err.to_string()))
    }

    /// Persist the verified flag for the current account.
    ///
    /// No-op when nobody is signed in. The in-memory copy is updated only
    /// after the write succeeds, so a failed write never presents a verified
    /// account that the store does not have.
    pub async fn mark_phone_verified(&self) -> Result<(), AuthError> {
        let _guard = self.op_lock.lock().await;
        let Some(account) = self.state.borrow().account().cloned() else {
            return Ok(());
        };

        if let Err(err) = self
            .deps
            .store
            .merge(USERS_COLLECTION, &account.id, json!({ "phone_verified": true }))
            .await
        {
            error!("failed to persist the verified flag: {err}");
            return Err(AuthError::provider(err));
        }

        self.state.send_replace(AuthState::Authenticated(Account {
            phone_verified: true,
            ..account
        }));
        Ok(())
    }

    /// Drop the provider session and reset to `Unauthenticated`. Never fails.
    pub async fn sign_out(&self) {
        let _guard = self.op_lock.lock().await;
        self.deps.auth.sign_out().await;
        self.state.send_replace(AuthState::Unauthenticated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::FailingDocumentStore;
    use crate::kernel::{BaseAuthService, BaseDocumentStore, MockAuthService, TestDependencies};
    use std::sync::Arc;

    const PHONE: &str = "+71234567890";

    async fn registered_manager(ds: &TestDependencies) -> SessionManager {
        let manager = SessionManager::new(ds.deps());
        manager
            .register("a@x.com", "p1", PHONE, RegistrationProfile::default())
            .await
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn register_creates_an_unverified_user_account() {
        let ds = TestDependencies::new();
        let manager = registered_manager(&ds).await;

        let account = manager.current_account().unwrap();
        assert_eq!(account.email, "a@x.com");
        assert_eq!(account.role, "user");
        assert!(!account.phone_verified);
        assert!(manager.current().needs_phone_verification());

        let document = ds.store.get("users", &account.id).await.unwrap().unwrap();
        assert_eq!(document["phone"], PHONE);
        assert_eq!(document["phone_verified"], false);
    }

    #[tokio::test]
    async fn register_rejects_a_taken_phone_number() {
        let ds = TestDependencies::new();
        let _first = registered_manager(&ds).await;

        let second = SessionManager::new(ds.deps());
        let err = second
            .register("b@x.com", "p2", PHONE, RegistrationProfile::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::PhoneAlreadyRegistered));
        assert!(matches!(second.current(), AuthState::Failed { .. }));
    }

    #[tokio::test]
    async fn concurrent_registers_with_the_same_phone_cannot_both_succeed() {
        let ds = TestDependencies::new();
        let manager = SessionManager::new(ds.deps());

        let (first, second) = tokio::join!(
            manager.register("a@x.com", "p1", PHONE, RegistrationProfile::default()),
            manager.register("b@x.com", "p2", PHONE, RegistrationProfile::default()),
        );

        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
        let taken = ds
            .store
            .query_eq("users", "phone", PHONE.into())
            .await
            .unwrap();
        assert_eq!(taken.len(), 1);
    }

    #[tokio::test]
    async fn register_rolls_back_the_credential_when_the_record_write_fails() {
        let ds = TestDependencies::new();
        let store = Arc::new(FailingDocumentStore::new((*ds.store).clone()).with_failing_set());
        let manager = SessionManager::new(ds.deps_with_store(store));

        let err = manager
            .register("a@x.com", "p1", PHONE, RegistrationProfile::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Provider(_)));
        assert!(matches!(manager.current(), AuthState::Failed { .. }));
        assert_eq!(ds.auth.deleted_credentials(), vec!["actor-1".to_string()]);
    }

    #[tokio::test]
    async fn failed_rollback_is_logged_not_surfaced() {
        let ds = TestDependencies::with_auth(MockAuthService::new().with_failing_delete());
        let store = Arc::new(FailingDocumentStore::new((*ds.store).clone()).with_failing_set());
        let manager = SessionManager::new(ds.deps_with_store(store));

        let err = manager
            .register("a@x.com", "p1", PHONE, RegistrationProfile::default())
            .await
            .unwrap_err();

        // The record-write error dominates; the rollback failure stays in the log.
        assert_eq!(err.to_string(), "store write refused");
    }

    #[tokio::test]
    async fn sign_in_loads_the_registered_account() {
        let ds = TestDependencies::new();
        let manager = registered_manager(&ds).await;
        let registered = manager.current_account().unwrap();
        manager.sign_out().await;

        manager.sign_in("a@x.com", "p1").await.unwrap();
        assert_eq!(manager.current_account().unwrap(), registered);
    }

    #[tokio::test]
    async fn sign_in_with_wrong_password_fails() {
        let ds = TestDependencies::new();
        let manager = registered_manager(&ds).await;
        manager.sign_out().await;

        let err = manager.sign_in("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
        assert!(matches!(manager.current(), AuthState::Failed { .. }));
    }

    #[tokio::test]
    async fn sign_in_without_a_record_signs_the_session_back_out() {
        let ds = TestDependencies::new();
        // Credential exists but no account record was ever written.
        ds.auth.create_credential("a@x.com", "p1").await.unwrap();
        ds.auth.sign_out().await;

        let manager = SessionManager::new(ds.deps());
        let err = manager.sign_in("a@x.com", "p1").await.unwrap_err();

        assert!(matches!(err, AuthError::ProfileNotFound));
        assert_eq!(ds.auth.session(), None);
    }

    #[tokio::test]
    async fn sign_in_with_a_malformed_record_signs_the_session_back_out() {
        let ds = TestDependencies::new();
        let actor_id = ds.auth.create_credential("a@x.com", "p1").await.unwrap();
        ds.store
            .set("users", &actor_id, serde_json::json!({"phone": 42}))
            .await
            .unwrap();
        ds.auth.sign_out().await;

        let manager = SessionManager::new(ds.deps());
        let err = manager.sign_in("a@x.com", "p1").await.unwrap_err();

        assert!(matches!(err, AuthError::ProfileIncomplete(_)));
        assert_eq!(ds.auth.session(), None);
    }

    #[tokio::test]
    async fn mark_phone_verified_persists_before_updating_memory() {
        let ds = TestDependencies::new();
        let manager = registered_manager(&ds).await;
        let account_id = manager.current_account().unwrap().id;

        manager.mark_phone_verified().await.unwrap();

        let document = ds.store.get("users", &account_id).await.unwrap().unwrap();
        assert_eq!(document["phone_verified"], true);
        assert!(manager.current_account().unwrap().phone_verified);
        assert!(!manager.current().needs_phone_verification());
    }

    #[tokio::test]
    async fn mark_phone_verified_is_idempotent() {
        let ds = TestDependencies::new();
        let manager = registered_manager(&ds).await;

        manager.mark_phone_verified().await.unwrap();
        manager.mark_phone_verified().await.unwrap();

        assert!(manager.current_account().unwrap().phone_verified);
    }

    #[tokio::test]
    async fn mark_phone_verified_is_a_noop_when_signed_out() {
        let ds = TestDependencies::new();
        let manager = SessionManager::new(ds.deps());
        manager.resolve_session().await;

        manager.mark_phone_verified().await.unwrap();
        assert_eq!(manager.current(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn a_failed_flag_write_leaves_memory_unverified() {
        let ds = TestDependencies::new();
        let store = Arc::new(FailingDocumentStore::new((*ds.store).clone()).with_failing_merge());
        let manager = SessionManager::new(ds.deps_with_store(store));
        manager
            .register("a@x.com", "p1", PHONE, RegistrationProfile::default())
            .await
            .unwrap();

        let err = manager.mark_phone_verified().await.unwrap_err();

        assert!(matches!(err, AuthError::Provider(_)));
        assert!(!manager.current_account().unwrap().phone_verified);
    }

    #[tokio::test]
    async fn sign_out_resets_to_unauthenticated() {
        let ds = TestDependencies::new();
        let manager = registered_manager(&ds).await;

        manager.sign_out().await;

        assert_eq!(manager.current(), AuthState::Unauthenticated);
        assert_eq!(ds.auth.session(), None);
    }

    #[tokio::test]
    async fn resolve_session_restores_a_live_provider_session() {
        let ds = TestDependencies::new();
        let manager = registered_manager(&ds).await;
        let account = manager.current_account().unwrap();

        // A fresh manager over the same providers starts Authenticating.
        let restarted = SessionManager::new(ds.deps());
        assert_eq!(restarted.current(), AuthState::Authenticating);

        restarted.resolve_session().await;
        assert_eq!(restarted.current_account().unwrap(), account);
    }

    #[tokio::test]
    async fn resolve_session_without_a_session_goes_unauthenticated() {
        let ds = TestDependencies::new();
        let manager = SessionManager::new(ds.deps());

        manager.resolve_session().await;
        assert_eq!(manager.current(), AuthState::Unauthenticated);
    }
}

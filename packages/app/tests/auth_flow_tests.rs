//! End-to-end two-factor registration flow
//!
//! Drives SessionManager and PhoneVerifier together the way the client does:
//! register with email/password, verify the phone over an SMS challenge,
//! persist the verified flag, then sign back in.

use app_core::domains::auth::{
    AuthState, PhoneVerifier, PhoneVerifyState, RegistrationProfile, SessionManager,
};
use app_core::kernel::{MockAuthService, TestDependencies};

fn profile() -> RegistrationProfile {
    RegistrationProfile {
        full_name: "A. Petrov".to_string(),
        position: "fire safety engineer".to_string(),
        organization_id: String::new(),
        responsibility_type: "general".to_string(),
    }
}

#[tokio::test]
async fn register_verify_and_sign_back_in() {
    let ds = TestDependencies::new();
    let deps = ds.deps();
    let session = SessionManager::new(deps.clone());
    let verifier = PhoneVerifier::new(deps);

    session
        .register("inspector@kontrog.ru", "secret", "+79991234567", profile())
        .await
        .unwrap();
    assert!(session.current().needs_phone_verification());

    verifier.send_code("+7 (999) 123-45-67").await.unwrap();
    assert_eq!(verifier.current(), PhoneVerifyState::CodeSent);

    verifier.verify_code("123456").await.unwrap();
    assert_eq!(verifier.current(), PhoneVerifyState::Verified);

    session.mark_phone_verified().await.unwrap();
    assert!(!session.current().needs_phone_verification());

    session.sign_out().await;
    session
        .sign_in("inspector@kontrog.ru", "secret")
        .await
        .unwrap();

    let account = session.current_account().unwrap();
    assert!(account.phone_verified);
    assert_eq!(account.full_name, "A. Petrov");
}

#[tokio::test]
async fn auto_verification_completes_the_flow_without_a_code() {
    let ds = TestDependencies::with_auth(MockAuthService::new().with_auto_verification());
    let deps = ds.deps();
    let session = SessionManager::new(deps.clone());
    let verifier = PhoneVerifier::new(deps);

    session
        .register("inspector@kontrog.ru", "secret", "+79991234567", profile())
        .await
        .unwrap();

    verifier.send_code("+79991234567").await.unwrap();
    assert_eq!(verifier.current(), PhoneVerifyState::Verified);

    session.mark_phone_verified().await.unwrap();
    assert!(session.current_account().unwrap().phone_verified);
}

#[tokio::test]
async fn a_rejected_code_can_be_retried_with_the_last_sent_number() {
    let ds = TestDependencies::new();
    let verifier = PhoneVerifier::new(ds.deps());

    verifier.send_code("999 123-45-67").await.unwrap();
    assert!(verifier.verify_code("000000").await.is_err());
    assert!(matches!(verifier.current(), PhoneVerifyState::Error { .. }));

    // Resend to the remembered number, then enter the right code.
    let number = verifier.last_sent_phone_number().unwrap();
    assert_eq!(number, "+79991234567");
    verifier.send_code(&number).await.unwrap();
    verifier.verify_code("123456").await.unwrap();

    assert_eq!(verifier.current(), PhoneVerifyState::Verified);
}

#[tokio::test]
async fn observers_always_see_whole_state_snapshots() {
    let ds = TestDependencies::new();
    let session = SessionManager::new(ds.deps());
    let mut states = session.state();

    assert_eq!(*states.borrow_and_update(), AuthState::Authenticating);

    session.resolve_session().await;
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), AuthState::Unauthenticated);

    session
        .register("inspector@kontrog.ru", "secret", "+79991234567", profile())
        .await
        .unwrap();
    states.changed().await.unwrap();
    assert!(states.borrow_and_update().is_authenticated());
}

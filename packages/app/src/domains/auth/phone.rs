//! Phone-number verification over an SMS challenge.
//!
//! `PhoneVerifier` owns the lifecycle of a single challenge: normalize and
//! validate the number, request a code, exchange the entered code for a
//! phone credential and link it to the current session. It never creates a
//! new actor. One challenge at a time; a new send discards the previous one.

use std::sync::Mutex;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info};

use crate::common::AuthError;
use crate::kernel::{AppDeps, ChallengeOutcome, PhoneCredential};

lazy_static! {
    // E.164: "+", then 2-15 digits, no leading zero in the country code
    static ref E164_REGEX: Regex = Regex::new(r"^\+[1-9]\d{1,14}$").unwrap();
}

/// Fallback when the provider rejects a code without saying why.
const INVALID_CODE_MESSAGE: &str = "invalid code";

/// Normalize a raw phone number towards E.164.
///
/// Strips whitespace and common punctuation, maps a leading `00` prefix to
/// `+`, and prepends `default_country_code` when no `+` prefix is present.
/// Inputs that already carry `+` are returned unchanged beyond stripping.
pub fn normalize_to_e164(raw: &str, default_country_code: &str) -> String {
    let stripped: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();

    let stripped = match stripped.strip_prefix("00") {
        Some(rest) => format!("+{rest}"),
        None => stripped,
    };

    if stripped.starts_with('+') {
        stripped
    } else {
        format!("{default_country_code}{stripped}")
    }
}

pub fn is_valid_e164(phone_number: &str) -> bool {
    E164_REGEX.is_match(phone_number)
}

/// Lifecycle of one SMS challenge.
#[derive(Debug, Clone, PartialEq)]
pub enum PhoneVerifyState {
    Initial,
    Loading,
    CodeSent,
    /// Terminal for this challenge; a new send starts a fresh one.
    Verified,
    Error { message: String },
}

pub struct PhoneVerifier {
    deps: AppDeps,
    state: watch::Sender<PhoneVerifyState>,
    challenge_id: Mutex<Option<String>>,
    last_sent: Mutex<Option<String>>,
    op_lock: AsyncMutex<()>,
}

impl PhoneVerifier {
    pub fn new(deps: AppDeps) -> Self {
        let (state, _) = watch::channel(PhoneVerifyState::Initial);
        Self {
            deps,
            state,
            challenge_id: Mutex::new(None),
            last_sent: Mutex::new(None),
            op_lock: AsyncMutex::new(()),
        }
    }

    /// Read-only snapshot stream of the challenge state.
    pub fn state(&self) -> watch::Receiver<PhoneVerifyState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> PhoneVerifyState {
        self.state.borrow().clone()
    }

    /// Number the last code was sent to, normalized. Survives [`reset`](Self::reset)
    /// so a resend does not need the number re-entered.
    pub fn last_sent_phone_number(&self) -> Option<String> {
        self.last_sent.lock().unwrap().clone()
    }

    /// Send a verification code using the configured default country code.
    pub async fn send_code(&self, raw_phone_number: &str) -> Result<(), AuthError> {
        let default_country_code = self.deps.default_country_code.clone();
        self.send_code_with_country(raw_phone_number, &default_country_code)
            .await
    }

    /// Send a verification code, prefixing numbers entered without `+` with
    /// `default_country_code`. Invalid numbers never reach the provider.
    pub async fn send_code_with_country(
        &self,
        raw_phone_number: &str,
        default_country_code: &str,
    ) -> Result<(), AuthError> {
        let _guard = self.op_lock.lock().await;
        self.state.send_replace(PhoneVerifyState::Loading);

        let phone_number = normalize_to_e164(raw_phone_number, default_country_code);
        if !is_valid_e164(&phone_number) {
            error!("not an E.164 number after normalization: {phone_number}");
            return self.fail(AuthError::InvalidPhoneFormat);
        }

        *self.last_sent.lock().unwrap() = Some(phone_number.clone());

        match self.deps.auth.send_phone_challenge(&phone_number).await {
            Ok(ChallengeOutcome::CodeSent { challenge_id }) => {
                debug!("code sent to {phone_number}, challenge {challenge_id}");
                *self.challenge_id.lock().unwrap() = Some(challenge_id);
                self.state.send_replace(PhoneVerifyState::CodeSent);
                Ok(())
            }
            Ok(ChallengeOutcome::AutoVerified { credential }) => {
                // Silent provider approval takes the same path as an
                // explicitly entered code.
                debug!("challenge for {phone_number} auto-verified by provider");
                self.link(credential).await
            }
            Err(err) => {
                error!("failed to send verification code: {err}");
                self.fail(AuthError::provider(err))
            }
        }
    }

    /// Exchange the entered code for a phone credential and link it to the
    /// current session.
    pub async fn verify_code(&self, code: &str) -> Result<(), AuthError> {
        let _guard = self.op_lock.lock().await;
        let Some(challenge_id) = self.challenge_id.lock().unwrap().clone() else {
            return self.fail(AuthError::NoActiveChallenge);
        };

        self.state.send_replace(PhoneVerifyState::Loading);
        match self
            .deps
            .auth
            .verify_phone_challenge(&challenge_id, code)
            .await
        {
            Ok(credential) => self.link(credential).await,
            Err(err) => {
                error!("code verification failed: {err}");
                self.fail(Self::code_rejection(err))
            }
        }
    }

    /// Back to `Initial`. Discards the active challenge but keeps the
    /// last-sent number.
    pub fn reset(&self) {
        *self.challenge_id.lock().unwrap() = None;
        self.state.send_replace(PhoneVerifyState::Initial);
    }

    async fn link(&self, credential: PhoneCredential) -> Result<(), AuthError> {
        match self.deps.auth.link_phone_credential(credential).await {
            Ok(()) => {
                info!("phone number linked to the current session");
                self.state.send_replace(PhoneVerifyState::Verified);
                Ok(())
            }
            Err(err) => {
                error!("phone link failed: {err}");
                self.fail(Self::code_rejection(err))
            }
        }
    }

    fn fail(&self, err: AuthError) -> Result<(), AuthError> {
        self.state.send_replace(PhoneVerifyState::Error {
            message: err.to_string(),
        });
        Err(err)
    }

    fn code_rejection(err: anyhow::Error) -> AuthError {
        let message = err.to_string();
        if message.trim().is_empty() {
            AuthError::Provider(INVALID_CODE_MESSAGE.to_string())
        } else {
            AuthError::Provider(message)
        }
    }
}

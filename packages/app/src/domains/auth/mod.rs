//! Auth domain - account session and phone verification.
//!
//! Two cooperating state holders:
//! - [`SessionManager`] owns the authenticated/unauthenticated status of the
//!   current actor and the actor's account record.
//! - [`PhoneVerifier`] drives one SMS challenge to completion.
//!
//! Typical flow: `register` leaves the session authenticated with an
//! unverified phone; the caller runs `PhoneVerifier::send_code` /
//! `verify_code`, and on `Verified` calls
//! `SessionManager::mark_phone_verified` to persist the flag.

pub mod models;
pub mod phone;
pub mod session;

pub use models::{Account, RegistrationProfile};
pub use phone::{is_valid_e164, normalize_to_e164, PhoneVerifier, PhoneVerifyState};
pub use session::{AuthState, SessionManager};

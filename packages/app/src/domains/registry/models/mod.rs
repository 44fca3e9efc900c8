pub mod building;
pub mod extinguisher;
pub mod log;
pub mod notification;
pub mod organization;
pub mod person;

pub use building::*;
pub use extinguisher::*;
pub use log::*;
pub use notification::*;
pub use organization::*;
pub use person::*;

use chrono::{DateTime, Utc};

pub(crate) fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

pub(crate) fn default_true() -> bool {
    true
}

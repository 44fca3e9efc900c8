use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::epoch;

/// Days before a due date at which an extinguisher counts as soon-expired.
pub const DEFAULT_WARN_DAYS: i64 = 30;

/// Service state of an extinguisher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtinguisherStatus {
    #[default]
    InService,
    SoonExpired,
    Expired,
    /// Set manually; never derived away by due-date checks.
    OutOfService,
}

impl std::fmt::Display for ExtinguisherStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtinguisherStatus::InService => write!(f, "in_service"),
            ExtinguisherStatus::SoonExpired => write!(f, "soon_expired"),
            ExtinguisherStatus::Expired => write!(f, "expired"),
            ExtinguisherStatus::OutOfService => write!(f, "out_of_service"),
        }
    }
}

/// A fire extinguisher installed in a building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireExtinguisher {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub building_id: String,
    #[serde(default)]
    pub inventory_number: String,
    /// Room it is installed in.
    #[serde(default)]
    pub location_room: String,
    /// Model designation ("OP-4", "OU-5", ...).
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default = "epoch")]
    pub commissioned_at: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub next_recharge_at: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub next_inspection_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ExtinguisherStatus,
}

impl FireExtinguisher {
    /// Earliest upcoming due date (recharge or inspection).
    pub fn next_due_at(&self) -> DateTime<Utc> {
        self.next_recharge_at.min(self.next_inspection_at)
    }

    /// Derive the due-date status at `now`. `OutOfService` is sticky.
    pub fn status_at(&self, now: DateTime<Utc>, warn_days: i64) -> ExtinguisherStatus {
        if self.status == ExtinguisherStatus::OutOfService {
            return ExtinguisherStatus::OutOfService;
        }
        let due = self.next_due_at();
        if due <= now {
            ExtinguisherStatus::Expired
        } else if due <= now + Duration::days(warn_days) {
            ExtinguisherStatus::SoonExpired
        } else {
            ExtinguisherStatus::InService
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extinguisher(recharge_days: i64, inspection_days: i64) -> FireExtinguisher {
        let now = Utc::now();
        FireExtinguisher {
            id: "e1".into(),
            building_id: "b1".into(),
            inventory_number: "001".into(),
            location_room: String::new(),
            kind: "OP-4".into(),
            manufacturer: String::new(),
            commissioned_at: now - Duration::days(365),
            next_recharge_at: now + Duration::days(recharge_days),
            next_inspection_at: now + Duration::days(inspection_days),
            status: ExtinguisherStatus::InService,
        }
    }

    #[test]
    fn a_passed_due_date_is_expired() {
        let unit = extinguisher(-1, 90);
        assert_eq!(unit.status_at(Utc::now(), DEFAULT_WARN_DAYS), ExtinguisherStatus::Expired);
    }

    #[test]
    fn a_due_date_inside_the_window_is_soon_expired() {
        let unit = extinguisher(10, 90);
        assert_eq!(
            unit.status_at(Utc::now(), DEFAULT_WARN_DAYS),
            ExtinguisherStatus::SoonExpired
        );
    }

    #[test]
    fn a_distant_due_date_is_in_service() {
        let unit = extinguisher(90, 120);
        assert_eq!(
            unit.status_at(Utc::now(), DEFAULT_WARN_DAYS),
            ExtinguisherStatus::InService
        );
    }

    #[test]
    fn the_earliest_due_date_drives_the_status() {
        let unit = extinguisher(90, 10);
        assert_eq!(
            unit.status_at(Utc::now(), DEFAULT_WARN_DAYS),
            ExtinguisherStatus::SoonExpired
        );
    }

    #[test]
    fn out_of_service_is_sticky() {
        let mut unit = extinguisher(90, 120);
        unit.status = ExtinguisherStatus::OutOfService;
        assert_eq!(
            unit.status_at(Utc::now(), DEFAULT_WARN_DAYS),
            ExtinguisherStatus::OutOfService
        );
    }
}

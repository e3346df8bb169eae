//! Read-only collaborators the engine consumes
//!
//! The host application supplies observations and activity stats. `Database`
//! implements both so a standalone deployment works out of the box.

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::error::Result;
use crate::models::{Observation, StatsSnapshot};

/// Time-ranged access to the observation log
pub trait ObservationSource: Send + Sync {
    /// Observations for `subject_id` at or after `since`, oldest first
    fn fetch(&self, subject_id: &str, since: DateTime<Utc>) -> Result<Vec<Observation>>;
}

/// Current activity stats for a subject
pub trait StatsProvider: Send + Sync {
    fn snapshot(&self, subject_id: &str) -> Result<StatsSnapshot>;
}

impl ObservationSource for Database {
    fn fetch(&self, subject_id: &str, since: DateTime<Utc>) -> Result<Vec<Observation>> {
        self.fetch_observations(subject_id, since)
    }
}

impl StatsProvider for Database {
    fn snapshot(&self, subject_id: &str) -> Result<StatsSnapshot> {
        self.stats_snapshot(subject_id)
    }
}

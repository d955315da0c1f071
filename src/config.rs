//! Settings for opening the ledger database.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// How the dates of a new trip are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateRangePolicy {
    /// Dates are stored as given.
    #[default]
    Advisory,
    /// Trips that end before they start are rejected.
    Enforced,
}

/// Where the ledger lives and how connections to it behave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// File path to the SQLite database.
    pub db_path: PathBuf,
    /// How long a connection waits for another writer before giving up.
    pub busy_timeout: Duration,
    /// Whether trips must end on or after the day they start.
    pub date_range_policy: DateRangePolicy,
}

impl LedgerConfig {
    /// The busy timeout used when none is given.
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a config for the database at `db_path` with default settings.
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
            date_range_policy: DateRangePolicy::default(),
        }
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Set the date range policy.
    pub fn date_range_policy(mut self, policy: DateRangePolicy) -> Self {
        self.date_range_policy = policy;
        self
    }
}

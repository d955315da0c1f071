//! Trip Ledger keeps track of business trips, who is invited to them, and the expense receipts
//! employees submit for them.
//!
//! The library exposes plain data operations over a single SQLite database:
//! - [trip] owns trip records,
//! - [roster] owns the links between trips and users,
//! - [expense] owns expense receipts and their approval status.
//!
//! [TripLedger] wraps these operations so that each call opens its own connection, does its work
//! and commits. Rendering and session handling belong to the caller.

#![warn(missing_docs)]

use time::Date;

pub mod config;
pub mod db;
pub mod expense;
pub mod ledger;
pub mod logging;
pub mod roster;
pub mod trip;
pub mod user;

pub use config::{DateRangePolicy, LedgerConfig};
pub use db::{initialize as initialize_db, open as open_db};
pub use expense::{Expense, ExpenseId, ExpenseStatus, NewExpense};
pub use ledger::TripLedger;
pub use trip::{Destination, NewTrip, Trip, TripId};
pub use user::{DirectoryUser, SqliteUserDirectory, UserDirectory, UserId};

/// The broad class of an [Error].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied bad input. Nothing was written.
    Validation,
    /// The trip, expense or user the caller referred to does not exist.
    NotFound,
    /// The database failed. Any partial writes were rolled back.
    Storage,
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used as a trip destination.
    #[error("the destination cannot be empty")]
    EmptyDestination,

    /// An expense was submitted without a receipt.
    #[error("an expense must reference a receipt file")]
    EmptyFilePath,

    /// The string does not name one of the expense statuses.
    #[error("\"{0}\" is not a valid expense status, expected pending, approved or rejected")]
    InvalidStatus(String),

    /// The trip ends before it starts.
    ///
    /// Only returned when [DateRangePolicy::Enforced] is in effect.
    #[error("the end date {end} is before the start date {start}")]
    InvalidDateRange {
        /// The first day of the trip.
        start: Date,
        /// The last day of the trip.
        end: Date,
    },

    /// A manager tried to assign a user outside of their reporting line.
    #[error("user {user_id} does not report to manager {manager_id}")]
    UnmanagedUser {
        /// The manager making the assignment.
        manager_id: UserId,
        /// The user that cannot be assigned.
        user_id: UserId,
    },

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a trip that does not exist.
    #[error("tried to update a trip that is not in the database")]
    UpdateMissingTrip,

    /// Tried to update an expense that does not exist.
    #[error("tried to update an expense that is not in the database")]
    UpdateMissingExpense,

    /// The trip ID used to create a row does not refer to a trip.
    #[error("the trip ID {0} does not refer to a valid trip")]
    InvalidTrip(TripId),

    /// The user ID used to create a row does not refer to a user.
    #[error("the user ID {0} does not refer to a valid user")]
    InvalidUser(UserId),

    /// The database is locked by another writer.
    ///
    /// The operation had no effect and can be retried.
    #[error("the database is busy, try again later")]
    DatabaseBusy,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// A file could not be opened or written, e.g. the log file.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyDestination
            | Error::EmptyFilePath
            | Error::InvalidStatus(_)
            | Error::InvalidDateRange { .. }
            | Error::UnmanagedUser { .. } => ErrorKind::Validation,
            Error::NotFound
            | Error::UpdateMissingTrip
            | Error::UpdateMissingExpense
            | Error::InvalidTrip(_)
            | Error::InvalidUser(_) => ErrorKind::NotFound,
            Error::DatabaseBusy | Error::SqlError(_) | Error::Io(_) => ErrorKind::Storage,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::DatabaseBusy)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked,
                    ..
                },
                _,
            ) => {
                tracing::warn!("the database is locked by another connection");
                Error::DatabaseBusy
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

/// `None` for missing or whitespace-only text, otherwise the trimmed text.
pub(crate) fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}

//! The user directory that trips and expenses refer to.
//!
//! Users and roles are owned by the wider application. This module only reads them, and creates
//! the tables when they are missing so that foreign keys from the trip tables have a target.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, trip::TripId};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from trip and expense IDs, leading to better compile time
/// errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct UserId(i64);

impl UserId {
    /// Create a new user ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user as seen by the roster: enough to pick and display them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// The user's ID.
    pub id: UserId,
    /// The user's login name.
    pub username: String,
    /// The user's email address, if known.
    pub email: Option<String>,
}

/// Answers questions about users for the roster.
pub trait UserDirectory {
    /// Whether a user with `user_id` exists.
    fn user_exists(&self, user_id: UserId) -> Result<bool, Error>;

    /// The users in the reporting line of `manager_id` that the manager may assign to new trips,
    /// ordered by username. Users holding a manager rank themselves are left out.
    fn users_under_manager(&self, manager_id: UserId) -> Result<Vec<DirectoryUser>, Error>;

    /// Everyone who reports to `manager_id` directly, whatever their role, ordered by username.
    fn direct_reports(&self, manager_id: UserId) -> Result<Vec<DirectoryUser>, Error>;
}

/// Roles with a sort key below this value are employees rather than managers or admins.
pub const ASSIGNABLE_ROLE_SORTKEY: i64 = 3;

/// A [UserDirectory] backed by the `users` and `roles` tables.
#[derive(Debug, Clone, Copy)]
pub struct SqliteUserDirectory<'a> {
    connection: &'a Connection,
}

impl<'a> SqliteUserDirectory<'a> {
    /// Create a directory that reads through `connection`.
    pub fn new(connection: &'a Connection) -> Self {
        Self { connection }
    }
}

impl UserDirectory for SqliteUserDirectory<'_> {
    fn user_exists(&self, user_id: UserId) -> Result<bool, Error> {
        self.connection
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE user_ID = ?1)",
                [user_id.as_i64()],
                |row| row.get(0),
            )
            .map_err(|error| error.into())
    }

    fn users_under_manager(&self, manager_id: UserId) -> Result<Vec<DirectoryUser>, Error> {
        self.connection
            .prepare(
                "SELECT u.user_ID, u.username, u.email
                 FROM users u
                 JOIN roles r ON u.role = r.role
                 WHERE r.sortkey < ?1 AND u.manager_ID = ?2
                 ORDER BY u.username ASC, u.user_ID ASC",
            )?
            .query_map(
                (ASSIGNABLE_ROLE_SORTKEY, manager_id.as_i64()),
                map_directory_user_row,
            )?
            .map(|maybe_user| maybe_user.map_err(|error| error.into()))
            .collect()
    }

    fn direct_reports(&self, manager_id: UserId) -> Result<Vec<DirectoryUser>, Error> {
        self.connection
            .prepare(
                "SELECT user_ID, username, email
                 FROM users
                 WHERE manager_ID = ?1
                 ORDER BY username ASC, user_ID ASC",
            )?
            .query_map([manager_id.as_i64()], map_directory_user_row)?
            .map(|maybe_user| maybe_user.map_err(|error| error.into()))
            .collect()
    }
}

/// The participants of a trip with their names, ordered by username.
///
/// # Errors
/// Returns [Error::SqlError] if there is an SQL error.
pub fn participant_users(
    trip_id: TripId,
    connection: &Connection,
) -> Result<Vec<DirectoryUser>, Error> {
    connection
        .prepare(
            "SELECT u.user_ID, u.username, u.email
             FROM users u
             JOIN user_trips ut ON ut.user_ID = u.user_ID
             WHERE ut.trip_ID = ?1
             ORDER BY u.username ASC, u.user_ID ASC",
        )?
        .query_map([trip_id.as_i64()], map_directory_user_row)?
        .map(|maybe_user| maybe_user.map_err(|error| error.into()))
        .collect()
}

/// Create the `roles` and `users` tables if the directory has not already done so.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_user_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS roles (
            role TEXT PRIMARY KEY,
            sortkey INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            user_ID INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            role TEXT REFERENCES roles(role),
            manager_ID INTEGER REFERENCES users(user_ID) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS ix_users_manager ON users(manager_ID);",
    )?;

    Ok(())
}

fn map_directory_user_row(row: &Row) -> Result<DirectoryUser, rusqlite::Error> {
    let id = UserId::new(row.get(0)?);
    let username = row.get(1)?;
    let email = row.get(2)?;

    Ok(DirectoryUser {
        id,
        username,
        email,
    })
}

//! Database operations for trip participants.

use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::{
    Error, UserId,
    trip::{Trip, TripId, map_trip_row, trip_exists},
};

/// Invite users to a trip.
///
/// Users that are already invited are skipped, so calling this twice with the same users has no
/// further effect. Either every user is linked or none is.
///
/// Returns the number of users that were newly invited.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidTrip] if `trip_id` does not refer to a trip,
/// - [Error::InvalidUser] if one of `user_ids` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn add_participants(
    trip_id: TripId,
    user_ids: &[UserId],
    connection: &Connection,
) -> Result<usize, Error> {
    let transaction = connection.unchecked_transaction()?;
    let inserted = link_participants(trip_id, user_ids, &transaction)?;
    transaction.commit()?;

    Ok(inserted)
}

/// Replace everyone invited to a trip with `user_ids`.
///
/// The old roster is only removed if the new one can be written in full.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidTrip] if `trip_id` does not refer to a trip,
/// - [Error::InvalidUser] if one of `user_ids` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn replace_participants(
    trip_id: TripId,
    user_ids: &[UserId],
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;
    relink_participants(trip_id, user_ids, &transaction)?;
    transaction.commit()?;

    Ok(())
}

/// [add_participants] on a connection that is already inside a transaction.
pub(crate) fn link_participants(
    trip_id: TripId,
    user_ids: &[UserId],
    connection: &Connection,
) -> Result<usize, Error> {
    if !trip_exists(trip_id, connection)? {
        return Err(Error::InvalidTrip(trip_id));
    }

    let inserted = insert_participants(trip_id, user_ids, connection)?;

    tracing::info!("invited {inserted} new participant(s) to trip {trip_id}");

    Ok(inserted)
}

/// [replace_participants] on a connection that is already inside a transaction.
pub(crate) fn relink_participants(
    trip_id: TripId,
    user_ids: &[UserId],
    connection: &Connection,
) -> Result<(), Error> {
    if !trip_exists(trip_id, connection)? {
        return Err(Error::InvalidTrip(trip_id));
    }

    let removed = connection.execute(
        "DELETE FROM user_trips WHERE trip_ID = ?1",
        [trip_id.as_i64()],
    )?;
    let inserted = insert_participants(trip_id, user_ids, connection)?;

    tracing::info!(
        "replaced roster of trip {trip_id}: removed {removed}, now {inserted} participant(s)"
    );

    Ok(())
}

/// Insert participant links, skipping existing ones. Does not open a transaction.
///
/// Returns the number of links created.
pub(crate) fn insert_participants(
    trip_id: TripId,
    user_ids: &[UserId],
    connection: &Connection,
) -> Result<usize, Error> {
    let mut statement =
        connection.prepare("INSERT OR IGNORE INTO user_trips (trip_ID, user_ID) VALUES (?1, ?2)")?;

    let mut inserted = 0;
    for &user_id in user_ids {
        inserted += statement
            .execute((trip_id.as_i64(), user_id.as_i64()))
            .map_err(|error| match error {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error {
                        code: _,
                        extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                    },
                    _,
                ) => Error::InvalidUser(user_id),
                error => error.into(),
            })?;
    }

    Ok(inserted)
}

/// The IDs of the users invited to a trip.
///
/// A trip that does not exist has no participants.
pub fn list_participants(
    trip_id: TripId,
    connection: &Connection,
) -> Result<BTreeSet<UserId>, Error> {
    connection
        .prepare("SELECT user_ID FROM user_trips WHERE trip_ID = ?1")?
        .query_map([trip_id.as_i64()], |row| row.get(0).map(UserId::new))?
        .map(|maybe_id| maybe_id.map_err(|error| error.into()))
        .collect()
}

/// The trips a user is invited to, earliest departure first. Trips without a start date come
/// last.
pub fn list_trips_for_user(user_id: UserId, connection: &Connection) -> Result<Vec<Trip>, Error> {
    connection
        .prepare(
            "SELECT t.trip_ID, t.destination, t.start_date, t.end_date, t.occasion,
                    t.sbb_booking_token, t.sbb_api_token
             FROM trips t
             JOIN user_trips ut ON t.trip_ID = ut.trip_ID
             WHERE ut.user_ID = ?1
             ORDER BY t.start_date IS NULL, t.start_date ASC, t.trip_ID ASC",
        )?
        .query_map([user_id.as_i64()], map_trip_row)?
        .map(|maybe_trip| maybe_trip.map_err(|error| error.into()))
        .collect()
}

/// Initialize the participant link table and its indexes.
pub fn create_participant_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_trips (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_ID INTEGER NOT NULL,
            user_ID INTEGER NOT NULL,
            UNIQUE (user_ID, trip_ID),
            FOREIGN KEY(trip_ID) REFERENCES trips(trip_ID) ON DELETE CASCADE,
            FOREIGN KEY(user_ID) REFERENCES users(user_ID) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS ix_user_trips_trip ON user_trips(trip_ID);
        CREATE INDEX IF NOT EXISTS ix_user_trips_user ON user_trips(user_ID);",
    )?;

    Ok(())
}

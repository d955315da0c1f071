//! Database operations for trips.

use rusqlite::{Connection, Row};

use crate::{
    Error,
    roster::insert_participants,
    trip::{Destination, NewTrip, Trip, TripId},
};

/// Create a trip and invite its initial participants.
///
/// The trip and its participant links are written in one transaction: if any participant cannot
/// be linked, the trip is not created either. Duplicate participants are ignored. The destination
/// is stored exactly as given.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyDestination] if the destination is empty,
/// - [Error::InvalidUser] if a participant does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn add_trip(new_trip: NewTrip, connection: &Connection) -> Result<Trip, Error> {
    let transaction = connection.unchecked_transaction()?;
    let trip = insert_trip(new_trip, &transaction)?;
    transaction.commit()?;

    Ok(trip)
}

/// Insert a trip and link its initial participants on a connection that is already inside a
/// transaction.
pub(crate) fn insert_trip(new_trip: NewTrip, connection: &Connection) -> Result<Trip, Error> {
    let destination = Destination::new(&new_trip.destination)?;

    let trip = connection
        .prepare(
            "INSERT INTO trips (
                destination, start_date, end_date, occasion, sbb_booking_token, sbb_api_token
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING trip_ID, destination, start_date, end_date, occasion,
                      sbb_booking_token, sbb_api_token",
        )?
        .query_row(
            (
                destination.as_ref(),
                new_trip.start_date,
                new_trip.end_date,
                &new_trip.occasion,
                &new_trip.sbb_booking_token,
                &new_trip.sbb_api_token,
            ),
            map_trip_row,
        )?;

    insert_participants(trip.id, &new_trip.participants, connection)?;

    tracing::info!(
        "created trip {} to {} with {} participant(s)",
        trip.id,
        trip.destination,
        new_trip.participants.len()
    );

    Ok(trip)
}

/// Retrieve a single trip by ID.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `trip_id` does not refer to a trip,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_trip(trip_id: TripId, connection: &Connection) -> Result<Trip, Error> {
    connection
        .prepare(
            "SELECT trip_ID, destination, start_date, end_date, occasion,
                    sbb_booking_token, sbb_api_token
             FROM trips WHERE trip_ID = :id",
        )?
        .query_row(&[(":id", &trip_id.as_i64())], map_trip_row)
        .map_err(|error| error.into())
}

/// Whether a trip with `trip_id` exists.
pub fn trip_exists(trip_id: TripId, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM trips WHERE trip_ID = ?1)",
            [trip_id.as_i64()],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Retrieve all trips, earliest departure first. Trips without a start date come last.
pub fn list_trips(connection: &Connection) -> Result<Vec<Trip>, Error> {
    connection
        .prepare(
            "SELECT trip_ID, destination, start_date, end_date, occasion,
                    sbb_booking_token, sbb_api_token
             FROM trips
             ORDER BY start_date IS NULL, start_date ASC, trip_ID ASC",
        )?
        .query_map([], map_trip_row)?
        .map(|maybe_trip| maybe_trip.map_err(|error| error.into()))
        .collect()
}

/// Update a trip's occasion. Returns an error if the trip doesn't exist.
pub fn update_occasion(
    trip_id: TripId,
    new_occasion: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE trips SET occasion = ?1 WHERE trip_ID = ?2",
        (new_occasion, trip_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTrip);
    }

    tracing::info!("updated occasion of trip {trip_id}");

    Ok(())
}

/// Delete a trip along with its participant links and expenses.
///
/// Returns `false` if there was no trip with `trip_id`; deleting a missing trip is not an error.
pub fn delete_trip(trip_id: TripId, connection: &Connection) -> Result<bool, Error> {
    let transaction = connection.unchecked_transaction()?;

    // The foreign keys cascade, but only on connections that enabled them.
    transaction.execute("DELETE FROM user_trips WHERE trip_ID = ?1", [trip_id.as_i64()])?;
    transaction.execute("DELETE FROM expenses WHERE trip_ID = ?1", [trip_id.as_i64()])?;
    let rows_affected =
        transaction.execute("DELETE FROM trips WHERE trip_ID = ?1", [trip_id.as_i64()])?;

    transaction.commit()?;

    if rows_affected == 0 {
        tracing::warn!("tried to delete trip {trip_id}, which does not exist");
        return Ok(false);
    }

    tracing::info!("deleted trip {trip_id}");

    Ok(true)
}

/// Initialize the trip table.
pub fn create_trip_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS trips (
            trip_ID INTEGER NOT NULL UNIQUE PRIMARY KEY AUTOINCREMENT,
            destination TEXT NOT NULL,
            start_date TEXT,
            end_date TEXT,
            occasion TEXT,
            sbb_booking_token TEXT,
            sbb_api_token TEXT
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS ix_trips_start_date ON trips(start_date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a [Trip].
///
/// Expects the columns in the order trip_ID, destination, start_date, end_date, occasion,
/// sbb_booking_token, sbb_api_token.
pub(crate) fn map_trip_row(row: &Row) -> Result<Trip, rusqlite::Error> {
    let id = TripId::new(row.get(0)?);
    let raw_destination: String = row.get(1)?;
    let destination = Destination::new_unchecked(&raw_destination);
    let start_date = row.get(2)?;
    let end_date = row.get(3)?;
    let occasion: Option<String> = row.get(4)?;
    let sbb_booking_token = row.get(5)?;
    let sbb_api_token = row.get(6)?;

    Ok(Trip {
        id,
        destination,
        start_date,
        end_date,
        occasion: occasion.unwrap_or_default(),
        sbb_booking_token,
        sbb_api_token,
    })
}

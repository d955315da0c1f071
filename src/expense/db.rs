//! Database operations for expenses.

use rusqlite::{Connection, Row, types::Type};
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::{
    Error, TripId, UserId,
    expense::{Expense, ExpenseId, ExpenseStatus, NewExpense},
    trip::trip_exists,
};

/// How `created_at` is stored: UTC, to the second.
const CREATED_AT_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Submit an expense.
///
/// The expense starts as [ExpenseStatus::Pending] and is stamped with the current time.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyFilePath] if the receipt path is empty,
/// - [Error::InvalidTrip] if the trip does not exist,
/// - [Error::InvalidUser] if the user does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn add_expense(new_expense: NewExpense, connection: &Connection) -> Result<Expense, Error> {
    let file_path = new_expense.file_path.trim();
    if file_path.is_empty() {
        return Err(Error::EmptyFilePath);
    }

    let created_at = OffsetDateTime::now_utc()
        .format(CREATED_AT_FORMAT)
        .map_err(|error| {
            Error::SqlError(rusqlite::Error::ToSqlConversionFailure(Box::new(error)))
        })?;

    let transaction = connection.unchecked_transaction()?;

    if !trip_exists(new_expense.trip_id, &transaction)? {
        return Err(Error::InvalidTrip(new_expense.trip_id));
    }

    let expense = transaction
        .prepare(
            "INSERT INTO expenses (
                trip_ID, user_ID, file_path, amount, currency, category, note, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING id, trip_ID, user_ID, file_path, amount, currency, category, note,
                      status, created_at",
        )?
        .query_row(
            (
                new_expense.trip_id.as_i64(),
                new_expense.user_id.as_i64(),
                file_path,
                new_expense.amount,
                &new_expense.currency,
                &new_expense.category,
                &new_expense.note,
                ExpenseStatus::Pending,
                created_at,
            ),
            map_expense_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidUser(new_expense.user_id),
            error => error.into(),
        })?;

    transaction.commit()?;

    tracing::info!(
        "user {} submitted expense {} for trip {}",
        expense.user_id,
        expense.id,
        expense.trip_id
    );

    Ok(expense)
}

/// Retrieve a single expense by ID.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `expense_id` does not refer to an expense,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_expense(expense_id: ExpenseId, connection: &Connection) -> Result<Expense, Error> {
    let expense = connection
        .prepare(
            "SELECT id, trip_ID, user_ID, file_path, amount, currency, category, note,
                    status, created_at
             FROM expenses WHERE id = :id",
        )?
        .query_one(&[(":id", &expense_id)], map_expense_row)?;

    Ok(expense)
}

/// Retrieve the expenses of a trip, most recent first.
///
/// If `user_id` is given, only that user's expenses are returned.
pub fn list_expenses(
    trip_id: TripId,
    user_id: Option<UserId>,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    tracing::debug!("listing expenses for trip {trip_id} (user filter: {user_id:?})");

    connection
        .prepare(
            "SELECT id, trip_ID, user_ID, file_path, amount, currency, category, note,
                    status, created_at
             FROM expenses
             WHERE trip_ID = ?1 AND (?2 IS NULL OR user_ID = ?2)
             ORDER BY created_at DESC, id DESC",
        )?
        .query_map(
            (trip_id.as_i64(), user_id.map(|id| id.as_i64())),
            map_expense_row,
        )?
        .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
        .collect()
}

/// Change the approval status of an expense.
///
/// Any status may follow any other.
///
/// # Errors
/// Returns [Error::UpdateMissingExpense] if the expense doesn't exist.
pub fn set_status(
    expense_id: ExpenseId,
    new_status: ExpenseStatus,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE expenses SET status = ?1 WHERE id = ?2",
        (new_status, expense_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingExpense);
    }

    tracing::info!("expense {expense_id} is now {new_status}");

    Ok(())
}

/// The sum of all amounts submitted for a trip, whatever their status.
///
/// Expenses without an amount count as zero, and a trip without expenses totals zero.
pub fn total_for_trip(trip_id: TripId, connection: &Connection) -> Result<f64, Error> {
    let mut statement =
        connection.prepare("SELECT COALESCE(SUM(amount), 0.0) FROM expenses WHERE trip_ID = ?1")?;

    let total: f64 = statement.query_row([trip_id.as_i64()], |row| row.get(0))?;

    Ok(total)
}

/// Initialize the expense table and its indexes.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_ID INTEGER NOT NULL,
            user_ID INTEGER NOT NULL,
            file_path TEXT NOT NULL,
            amount REAL,
            currency TEXT,
            category TEXT,
            note TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected')),
            created_at TEXT NOT NULL,
            FOREIGN KEY(trip_ID) REFERENCES trips(trip_ID) ON DELETE CASCADE,
            FOREIGN KEY(user_ID) REFERENCES users(user_ID) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS ix_expenses_trip ON expenses(trip_ID);
        CREATE INDEX IF NOT EXISTS ix_expenses_user ON expenses(user_ID);",
    )?;

    Ok(())
}

fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let id = row.get(0)?;
    let trip_id = TripId::new(row.get(1)?);
    let user_id = UserId::new(row.get(2)?);
    let file_path = row.get(3)?;
    let amount = row.get(4)?;
    let currency = row.get(5)?;
    let category = row.get(6)?;
    let note = row.get(7)?;
    let status = row.get(8)?;
    let raw_created_at: String = row.get(9)?;
    let created_at = PrimitiveDateTime::parse(&raw_created_at, CREATED_AT_FORMAT)
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(error))
        })?
        .assume_utc();

    Ok(Expense {
        id,
        trip_id,
        user_id,
        file_path,
        amount,
        currency,
        category,
        note,
        status,
        created_at,
    })
}

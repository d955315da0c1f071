//! Opening connections and creating the schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, LedgerConfig, expense::create_expense_table, roster::create_participant_table,
    trip::create_trip_table, user::create_user_tables,
};

/// Open a connection to the database described by `config`.
///
/// Foreign key enforcement is switched on for the connection, since SQLite leaves it off by
/// default.
///
/// # Errors
/// Returns [Error::SqlError] if the file cannot be opened.
pub fn open(config: &LedgerConfig) -> Result<Connection, Error> {
    let connection = Connection::open(&config.db_path)?;
    connection.busy_timeout(config.busy_timeout)?;
    enable_foreign_keys(&connection)?;

    tracing::debug!("opened database at {}", config.db_path.display());

    Ok(connection)
}

/// Turn on foreign key enforcement for `connection`.
///
/// Has no effect inside an open transaction, so this must run before the first write.
pub fn enable_foreign_keys(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "foreign_keys", true)
}

/// Create the tables for the domain models if they do not exist.
///
/// Safe to call on every start up.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    enable_foreign_keys(connection)?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_tables(&transaction)?;
    create_trip_table(&transaction)?;
    create_participant_table(&transaction)?;
    create_expense_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::initialize;

    fn table_names(connection: &Connection) -> Vec<String> {
        connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|name| name.unwrap())
            .collect()
    }

    #[test]
    fn initialize_creates_all_tables() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).expect("Could not initialize database");

        let names = table_names(&connection);
        for table in ["expenses", "roles", "trips", "user_trips", "users"] {
            assert!(names.contains(&table.to_owned()), "missing table {table}");
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).expect("Could not initialize database");
        let result = initialize(&connection);

        assert_eq!(result, Ok(()));
    }

    #[test]
    fn initialize_enables_foreign_keys() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        let enabled: bool = connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }

    #[test]
    fn indexes_exist() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let indexes: Vec<String> = connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'ix_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|name| name.unwrap())
            .collect();

        for index in [
            "ix_user_trips_trip",
            "ix_user_trips_user",
            "ix_expenses_trip",
            "ix_expenses_user",
        ] {
            assert!(indexes.contains(&index.to_owned()), "missing index {index}");
        }
    }
}

//! The entry point for callers: every method is one short unit of work on its own connection.

use std::collections::BTreeSet;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    DirectoryUser, Error, Expense, ExpenseId, ExpenseStatus, LedgerConfig, NewExpense, NewTrip,
    SqliteUserDirectory, Trip, TripId, UserDirectory, UserId, db, expense, roster, trip,
    user::participant_users,
};

/// Trips, rosters and expenses stored in one SQLite database.
///
/// No connection is held between calls, so a `TripLedger` can be cloned and shared freely.
/// SQLite serialises writers; a call that waits longer than the configured busy timeout fails
/// with [Error::DatabaseBusy] and has no effect.
#[derive(Debug, Clone)]
pub struct TripLedger {
    config: LedgerConfig,
}

impl TripLedger {
    /// Create a ledger for the database described by `config`.
    ///
    /// Does not touch the database. Call [TripLedger::create_schema] before first use.
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    /// The settings this ledger was created with.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn connect(&self) -> Result<Connection, Error> {
        db::open(&self.config)
    }

    /// Begin a transaction that takes the write lock before its first read.
    fn begin_write(connection: &Connection) -> Result<Transaction<'_>, Error> {
        Ok(Transaction::new_unchecked(
            connection,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Create any missing tables and indexes.
    pub fn create_schema(&self) -> Result<(), Error> {
        db::initialize(&self.connect()?)
    }

    /// Create a trip on behalf of `manager_id`.
    ///
    /// The initial participants must all be assignable by the manager, see
    /// [roster::ensure_assignable]. The check and the insert run in one transaction. The dates
    /// are checked against the configured [crate::DateRangePolicy].
    pub fn create_trip(&self, manager_id: UserId, new_trip: NewTrip) -> Result<Trip, Error> {
        new_trip.check_date_range(self.config.date_range_policy)?;

        let connection = self.connect()?;
        let transaction = Self::begin_write(&connection)?;
        roster::ensure_assignable(
            manager_id,
            &new_trip.participants,
            &SqliteUserDirectory::new(&transaction),
        )?;
        let trip = trip::insert_trip(new_trip, &transaction)?;
        transaction.commit()?;

        Ok(trip)
    }

    /// See [trip::get_trip].
    pub fn get_trip(&self, trip_id: TripId) -> Result<Trip, Error> {
        trip::get_trip(trip_id, &self.connect()?)
    }

    /// See [trip::list_trips].
    pub fn list_trips(&self) -> Result<Vec<Trip>, Error> {
        trip::list_trips(&self.connect()?)
    }

    /// See [trip::update_occasion].
    pub fn update_occasion(&self, trip_id: TripId, new_occasion: &str) -> Result<(), Error> {
        trip::update_occasion(trip_id, new_occasion, &self.connect()?)
    }

    /// See [trip::delete_trip].
    pub fn delete_trip(&self, trip_id: TripId) -> Result<bool, Error> {
        trip::delete_trip(trip_id, &self.connect()?)
    }

    /// Invite users to a trip on behalf of `manager_id`. See [roster::add_participants].
    ///
    /// Every user must report to the manager, see [roster::ensure_reports].
    pub fn add_participants(
        &self,
        manager_id: UserId,
        trip_id: TripId,
        user_ids: &[UserId],
    ) -> Result<usize, Error> {
        let connection = self.connect()?;
        let transaction = Self::begin_write(&connection)?;
        roster::ensure_reports(manager_id, user_ids, &SqliteUserDirectory::new(&transaction))?;
        let inserted = roster::link_participants(trip_id, user_ids, &transaction)?;
        transaction.commit()?;

        Ok(inserted)
    }

    /// Replace a trip's roster on behalf of `manager_id`. See [roster::replace_participants].
    ///
    /// Every user must report to the manager, see [roster::ensure_reports].
    pub fn replace_participants(
        &self,
        manager_id: UserId,
        trip_id: TripId,
        user_ids: &[UserId],
    ) -> Result<(), Error> {
        let connection = self.connect()?;
        let transaction = Self::begin_write(&connection)?;
        roster::ensure_reports(manager_id, user_ids, &SqliteUserDirectory::new(&transaction))?;
        roster::relink_participants(trip_id, user_ids, &transaction)?;
        transaction.commit()?;

        Ok(())
    }

    /// See [roster::list_participants].
    pub fn list_participants(&self, trip_id: TripId) -> Result<BTreeSet<UserId>, Error> {
        roster::list_participants(trip_id, &self.connect()?)
    }

    /// The participants of a trip with their names, for display.
    pub fn participant_users(&self, trip_id: TripId) -> Result<Vec<DirectoryUser>, Error> {
        participant_users(trip_id, &self.connect()?)
    }

    /// See [roster::list_trips_for_user].
    pub fn list_trips_for_user(&self, user_id: UserId) -> Result<Vec<Trip>, Error> {
        roster::list_trips_for_user(user_id, &self.connect()?)
    }

    /// The users `manager_id` may invite to new trips.
    pub fn assignable_users(&self, manager_id: UserId) -> Result<Vec<DirectoryUser>, Error> {
        SqliteUserDirectory::new(&self.connect()?).users_under_manager(manager_id)
    }

    /// See [expense::add_expense].
    pub fn add_expense(&self, new_expense: NewExpense) -> Result<Expense, Error> {
        expense::add_expense(new_expense, &self.connect()?)
    }

    /// See [expense::get_expense].
    pub fn get_expense(&self, expense_id: ExpenseId) -> Result<Expense, Error> {
        expense::get_expense(expense_id, &self.connect()?)
    }

    /// See [expense::list_expenses].
    pub fn list_expenses(
        &self,
        trip_id: TripId,
        user_id: Option<UserId>,
    ) -> Result<Vec<Expense>, Error> {
        expense::list_expenses(trip_id, user_id, &self.connect()?)
    }

    /// See [expense::set_status].
    pub fn set_status(&self, expense_id: ExpenseId, new_status: ExpenseStatus) -> Result<(), Error> {
        expense::set_status(expense_id, new_status, &self.connect()?)
    }

    /// See [expense::total_for_trip].
    pub fn total_for_trip(&self, trip_id: TripId) -> Result<f64, Error> {
        expense::total_for_trip(trip_id, &self.connect()?)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, time::Duration};

    use rusqlite::Connection;
    use tempfile::TempDir;
    use time::macros::date;

    use crate::{
        DateRangePolicy, Error, ExpenseStatus, LedgerConfig, NewExpense, NewTrip, TripId,
        TripLedger, UserId,
        user::test_utils::{insert_roles, insert_user},
    };

    const MANAGER: UserId = UserId::new(1);

    /// Create a ledger in a temporary directory with a manager (1) who manages users 7 and 9,
    /// and manager 4 who reports to them. User 8 belongs to another team.
    fn get_test_ledger(config: impl FnOnce(LedgerConfig) -> LedgerConfig) -> (TempDir, TripLedger) {
        let dir = TempDir::new().expect("Could not create temporary directory");
        let ledger = TripLedger::new(config(LedgerConfig::new(dir.path().join("ledger.db"))));
        ledger.create_schema().expect("Could not create schema");

        let connection = Connection::open(&ledger.config().db_path).unwrap();
        insert_roles(&connection);
        insert_user(&connection, 1, "mira", "manager", None);
        insert_user(&connection, 2, "other", "manager", None);
        insert_user(&connection, 4, "bo", "manager", Some(1));
        insert_user(&connection, 7, "gus", "employee", Some(1));
        insert_user(&connection, 8, "hal", "employee", Some(2));
        insert_user(&connection, 9, "ida", "employee", Some(1));

        (dir, ledger)
    }

    fn user_set(raw: &[i64]) -> BTreeSet<UserId> {
        raw.iter().copied().map(UserId::new).collect()
    }

    #[test]
    fn zurich_offsite_end_to_end() {
        let (_dir, ledger) = get_test_ledger(|config| config);

        let trip = ledger
            .create_trip(
                MANAGER,
                NewTrip::build("Zurich Offsite", date!(2025 - 09 - 15), date!(2025 - 09 - 17))
                    .occasion("Team offsite")
                    .participants([UserId::new(7), UserId::new(9)]),
            )
            .expect("Could not create trip");
        assert_eq!(ledger.list_participants(trip.id), Ok(user_set(&[7, 9])));

        let expense = ledger
            .add_expense(
                NewExpense::build(trip.id, UserId::new(7), "receipts/hotel.pdf")
                    .amount(Some(42.00))
                    .currency(Some("CHF")),
            )
            .expect("Could not add expense");

        let expenses = ledger.list_expenses(trip.id, None).unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].status, ExpenseStatus::Pending);
        assert_eq!(expenses[0].amount, Some(42.00));
        assert_eq!(expenses[0].currency.as_deref(), Some("CHF"));
        assert_eq!(ledger.total_for_trip(trip.id), Ok(42.00));

        ledger
            .set_status(expense.id, ExpenseStatus::Approved)
            .expect("Could not approve expense");

        let expenses = ledger.list_expenses(trip.id, None).unwrap();
        assert_eq!(expenses[0].status, ExpenseStatus::Approved);
        assert_eq!(ledger.total_for_trip(trip.id), Ok(42.00));
    }

    #[test]
    fn invalid_status_is_rejected_before_any_write() {
        let (_dir, ledger) = get_test_ledger(|config| config);
        let trip = ledger
            .create_trip(
                MANAGER,
                NewTrip::build("Bern", date!(2025 - 09 - 15), date!(2025 - 09 - 15)),
            )
            .unwrap();
        let expense = ledger
            .add_expense(NewExpense::build(trip.id, UserId::new(9), "r.pdf"))
            .unwrap();

        let result = "archived"
            .parse::<ExpenseStatus>()
            .and_then(|status| ledger.set_status(expense.id, status));

        assert_eq!(result, Err(Error::InvalidStatus("archived".to_owned())));
        assert_eq!(
            ledger.get_expense(expense.id).unwrap().status,
            ExpenseStatus::Pending
        );
    }

    #[test]
    fn manager_cannot_invite_other_teams() {
        let (_dir, ledger) = get_test_ledger(|config| config);

        let result = ledger.create_trip(
            MANAGER,
            NewTrip::build("Basel", date!(2025 - 10 - 01), date!(2025 - 10 - 02))
                .participants([UserId::new(7), UserId::new(8)]),
        );

        assert_eq!(
            result,
            Err(Error::UnmanagedUser {
                manager_id: MANAGER,
                user_id: UserId::new(8),
            })
        );
        assert_eq!(ledger.list_trips(), Ok(vec![]));
    }

    #[test]
    fn replace_participants_is_scoped_to_manager() {
        let (_dir, ledger) = get_test_ledger(|config| config);
        let trip = ledger
            .create_trip(
                MANAGER,
                NewTrip::build("Basel", date!(2025 - 10 - 01), date!(2025 - 10 - 02))
                    .participants([UserId::new(7)]),
            )
            .unwrap();

        let rejected = ledger.replace_participants(MANAGER, trip.id, &[UserId::new(8)]);
        ledger
            .replace_participants(MANAGER, trip.id, &[UserId::new(9)])
            .expect("Could not replace participants");

        assert!(matches!(rejected, Err(Error::UnmanagedUser { .. })));
        assert_eq!(ledger.list_participants(trip.id), Ok(user_set(&[9])));
        let names: Vec<String> = ledger
            .participant_users(trip.id)
            .unwrap()
            .into_iter()
            .map(|user| user.username)
            .collect();
        assert_eq!(names, ["ida"]);
    }

    #[test]
    fn add_participants_twice_keeps_two_links() {
        let (_dir, ledger) = get_test_ledger(|config| config);
        let trip = ledger
            .create_trip(
                MANAGER,
                NewTrip::build("Lausanne", date!(2025 - 10 - 01), date!(2025 - 10 - 02)),
            )
            .unwrap();
        let user_ids = [UserId::new(7), UserId::new(9)];

        ledger.add_participants(MANAGER, trip.id, &user_ids).unwrap();
        ledger.add_participants(MANAGER, trip.id, &user_ids).unwrap();

        assert_eq!(ledger.list_participants(trip.id), Ok(user_set(&[7, 9])));
        assert_eq!(ledger.list_trips_for_user(UserId::new(9)), Ok(vec![trip]));
    }

    #[test]
    fn reporting_manager_can_be_added_to_existing_trip_only() {
        let (_dir, ledger) = get_test_ledger(|config| config);

        let rejected = ledger.create_trip(
            MANAGER,
            NewTrip::build("Zug", date!(2025 - 10 - 01), date!(2025 - 10 - 02))
                .participants([UserId::new(4)]),
        );
        let trip = ledger
            .create_trip(
                MANAGER,
                NewTrip::build("Zug", date!(2025 - 10 - 01), date!(2025 - 10 - 02)),
            )
            .unwrap();
        ledger
            .replace_participants(MANAGER, trip.id, &[UserId::new(7), UserId::new(4)])
            .expect("Could not replace participants");

        assert_eq!(
            rejected,
            Err(Error::UnmanagedUser {
                manager_id: MANAGER,
                user_id: UserId::new(4),
            })
        );
        assert_eq!(ledger.list_participants(trip.id), Ok(user_set(&[4, 7])));
    }

    #[test]
    fn team_check_waits_for_the_write_lock() {
        let (_dir, ledger) =
            get_test_ledger(|config| config.busy_timeout(Duration::from_millis(10)));
        let trip = ledger
            .create_trip(
                MANAGER,
                NewTrip::build("Bern", date!(2025 - 10 - 01), date!(2025 - 10 - 02)),
            )
            .unwrap();

        let blocker = Connection::open(&ledger.config().db_path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

        // User 8 is not on the team; the write lock is taken before the team is read.
        let result = ledger.add_participants(MANAGER, trip.id, &[UserId::new(8)]);

        blocker.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(result, Err(Error::DatabaseBusy));
        assert_eq!(ledger.list_participants(trip.id), Ok(BTreeSet::new()));
    }

    #[test]
    fn assignable_users_lists_only_the_managers_team() {
        let (_dir, ledger) = get_test_ledger(|config| config);

        let users = ledger.assignable_users(MANAGER).unwrap();

        let ids: Vec<UserId> = users.into_iter().map(|user| user.id).collect();
        assert_eq!(ids, [UserId::new(7), UserId::new(9)]);
    }

    #[test]
    fn delete_trip_clears_roster_and_tolerates_missing_trip() {
        let (_dir, ledger) = get_test_ledger(|config| config);
        let trip = ledger
            .create_trip(
                MANAGER,
                NewTrip::build("Geneva", date!(2025 - 10 - 01), date!(2025 - 10 - 02))
                    .participants([UserId::new(7), UserId::new(9)]),
            )
            .unwrap();

        assert_eq!(ledger.delete_trip(trip.id), Ok(true));
        assert_eq!(ledger.list_participants(trip.id), Ok(BTreeSet::new()));
        assert_eq!(ledger.delete_trip(trip.id), Ok(false));
        assert_eq!(ledger.get_trip(trip.id), Err(Error::NotFound));
    }

    #[test]
    fn update_occasion_on_missing_trip_is_reported() {
        let (_dir, ledger) = get_test_ledger(|config| config);

        assert_eq!(
            ledger.update_occasion(TripId::new(3), "Kick-off"),
            Err(Error::UpdateMissingTrip)
        );
    }

    #[test]
    fn enforced_date_range_rejects_reversed_trip() {
        let (_dir, ledger) =
            get_test_ledger(|config| config.date_range_policy(DateRangePolicy::Enforced));

        let result = ledger.create_trip(
            MANAGER,
            NewTrip::build("Lucerne", date!(2025 - 10 - 05), date!(2025 - 10 - 01)),
        );

        assert_eq!(
            result,
            Err(Error::InvalidDateRange {
                start: date!(2025 - 10 - 05),
                end: date!(2025 - 10 - 01),
            })
        );
        assert_eq!(ledger.list_trips(), Ok(vec![]));
    }

    #[test]
    fn advisory_date_range_accepts_reversed_trip() {
        let (_dir, ledger) = get_test_ledger(|config| config);

        let result = ledger.create_trip(
            MANAGER,
            NewTrip::build("Lucerne", date!(2025 - 10 - 05), date!(2025 - 10 - 01)),
        );

        assert!(result.is_ok());
    }

    #[test]
    fn locked_database_reports_retryable_error() {
        let (_dir, ledger) =
            get_test_ledger(|config| config.busy_timeout(Duration::from_millis(10)));
        let trip = ledger
            .create_trip(
                MANAGER,
                NewTrip::build("Bern", date!(2025 - 10 - 01), date!(2025 - 10 - 02)),
            )
            .unwrap();

        let blocker = Connection::open(&ledger.config().db_path).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let result = ledger.update_occasion(trip.id, "Postponed");

        assert_eq!(result, Err(Error::DatabaseBusy));
        assert!(result.unwrap_err().is_retryable());

        blocker.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(ledger.get_trip(trip.id).unwrap().occasion, "");
    }
}

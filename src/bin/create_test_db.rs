use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::macros::date;

use trip_ledger::{
    NewExpense, NewTrip, UserId, expense::add_expense, initialize_db, trip::add_trip,
};

/// Creates a trip_ledger database seeded with a manager, two employees and one trip with an
/// expense.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    if output_path
        .extension()
        .is_none_or(|extension| extension.is_empty())
    {
        eprintln!("Output path must include a file extension (e.g., 'seeded.db').");
        exit(1);
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating roles and users...");

    conn.execute_batch(
        "INSERT INTO roles (role, sortkey) VALUES ('employee', 0), ('manager', 3), ('admin', 4);

        INSERT INTO users (user_ID, username, email, role, manager_ID) VALUES
            (1, 'mira', 'mira@example.com', 'manager', NULL),
            (7, 'gus', 'gus@example.com', 'employee', 1),
            (9, 'ida', 'ida@example.com', 'employee', 1);",
    )?;

    println!("Creating sample trip...");

    let trip = add_trip(
        NewTrip::build("Zurich Offsite", date!(2025 - 09 - 15), date!(2025 - 09 - 17))
            .occasion("Team offsite")
            .participants([UserId::new(7), UserId::new(9)]),
        &conn,
    )?;

    add_expense(
        NewExpense::build(trip.id, UserId::new(7), "receipts/zurich-hotel.pdf")
            .amount(Some(42.0))
            .currency(Some("CHF"))
            .category(Some("Hotel")),
        &conn,
    )?;

    println!("Success! Manage trip {} as manager 1 (mira).", trip.id);

    Ok(())
}

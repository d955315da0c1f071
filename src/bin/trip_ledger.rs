use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
    process::exit,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use trip_ledger::{
    DateRangePolicy, DirectoryUser, Expense, ExpenseStatus, LedgerConfig, NewExpense, NewTrip,
    Trip, TripId, TripLedger, UserId,
    logging::{init_tracing, level_for_verbosity},
};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Manage business trips, their participants and expense receipts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// File path to the application SQLite database.
    #[arg(long, global = true, default_value = "trip_ledger.db")]
    db_path: PathBuf,

    /// How long to wait for another writer, in milliseconds.
    #[arg(long, global = true, default_value_t = 5000)]
    busy_timeout_ms: u64,

    /// Reject trips that end before they start.
    #[arg(long, global = true)]
    enforce_date_order: bool,

    /// Log more. May be repeated.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Also append debug logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database tables if they do not exist.
    Init,
    /// Create, inspect and remove trips.
    #[command(subcommand)]
    Trip(TripCommand),
    /// Manage who takes part in a trip.
    #[command(subcommand)]
    Roster(RosterCommand),
    /// Submit and review expense receipts.
    #[command(subcommand)]
    Expense(ExpenseCommand),
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum TripCommand {
    /// Create a trip.
    Add {
        /// The manager creating the trip.
        #[arg(long)]
        manager_id: i64,
        /// Where the trip goes.
        #[arg(long)]
        destination: String,
        /// The day of departure, e.g. 2025-09-15.
        #[arg(long, value_parser = parse_date)]
        start: Date,
        /// The day of return.
        #[arg(long, value_parser = parse_date)]
        end: Date,
        /// Why the trip is happening.
        #[arg(long, default_value = "")]
        occasion: String,
        /// Users to invite. May be repeated or comma separated.
        #[arg(long = "participant", value_delimiter = ',')]
        participants: Vec<i64>,
        /// A rail booking reference.
        #[arg(long)]
        sbb_booking_token: Option<String>,
        /// A rail API token.
        #[arg(long)]
        sbb_api_token: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Show one trip.
    Show {
        trip_id: i64,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List all trips by start date.
    List {
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Delete a trip with its roster and expenses.
    Delete { trip_id: i64 },
    /// Change why a trip is happening.
    SetOccasion { trip_id: i64, occasion: String },
}

#[derive(Subcommand, Debug)]
enum RosterCommand {
    /// Invite users to a trip, keeping existing participants.
    Add {
        #[arg(long)]
        manager_id: i64,
        trip_id: i64,
        #[arg(required = true, value_delimiter = ',')]
        user_ids: Vec<i64>,
    },
    /// Set the participants of a trip to exactly the given users.
    Replace {
        #[arg(long)]
        manager_id: i64,
        trip_id: i64,
        #[arg(value_delimiter = ',')]
        user_ids: Vec<i64>,
    },
    /// List the participants of a trip.
    List {
        trip_id: i64,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the trips a user takes part in.
    TripsForUser {
        user_id: i64,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the users a manager may invite.
    Assignable {
        manager_id: i64,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    /// Submit a receipt for a trip.
    Add {
        #[arg(long)]
        trip_id: i64,
        #[arg(long)]
        user_id: i64,
        /// Where the receipt file is stored.
        #[arg(long)]
        file_path: String,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the expenses of a trip, newest first.
    List {
        trip_id: i64,
        /// Only show expenses submitted by this user.
        #[arg(long)]
        user_id: Option<i64>,
        /// Print JSON instead of a table.
        #[arg(long, conflicts_with = "csv")]
        json: bool,
        /// Print CSV instead of a table.
        #[arg(long)]
        csv: bool,
    },
    /// Approve, reject or reopen an expense.
    SetStatus {
        expense_id: i64,
        /// One of pending, approved or rejected.
        status: String,
    },
    /// Sum the amounts of a trip's expenses.
    Total {
        trip_id: i64,
        #[command(flatten)]
        output: OutputArgs,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(error) = init_tracing(level_for_verbosity(cli.verbose), cli.log_file.as_deref()) {
        print_error(format!("could not set up logging: {error}"));
        exit(1);
    }

    let policy = if cli.enforce_date_order {
        DateRangePolicy::Enforced
    } else {
        DateRangePolicy::Advisory
    };
    let ledger = TripLedger::new(
        LedgerConfig::new(&cli.db_path)
            .busy_timeout(Duration::from_millis(cli.busy_timeout_ms))
            .date_range_policy(policy),
    );

    if let Err(error) = run(cli.command, &ledger) {
        print_error(error);
        exit(1);
    }
}

fn run(command: Command, ledger: &TripLedger) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Init => {
            ledger.create_schema()?;
            println!("Initialised database at {:#?}", ledger.config().db_path);
        }
        Command::Trip(command) => run_trip(command, ledger)?,
        Command::Roster(command) => run_roster(command, ledger)?,
        Command::Expense(command) => run_expense(command, ledger)?,
    }

    Ok(())
}

fn run_trip(command: TripCommand, ledger: &TripLedger) -> Result<(), Box<dyn Error>> {
    match command {
        TripCommand::Add {
            manager_id,
            destination,
            start,
            end,
            occasion,
            participants,
            sbb_booking_token,
            sbb_api_token,
            output,
        } => {
            let new_trip = NewTrip::build(&destination, start, end)
                .occasion(&occasion)
                .participants(participants.into_iter().map(UserId::new))
                .sbb_booking_token(sbb_booking_token.as_deref())
                .sbb_api_token(sbb_api_token.as_deref());
            let trip = ledger.create_trip(UserId::new(manager_id), new_trip)?;
            print_trips(&[trip], output.json)?;
        }
        TripCommand::Show { trip_id, output } => {
            let trip = ledger.get_trip(TripId::new(trip_id))?;
            print_trips(&[trip], output.json)?;
        }
        TripCommand::List { output } => print_trips(&ledger.list_trips()?, output.json)?,
        TripCommand::Delete { trip_id } => {
            if ledger.delete_trip(TripId::new(trip_id))? {
                println!("Deleted trip {trip_id}");
            } else {
                println!("No trip with ID {trip_id}, nothing to delete");
            }
        }
        TripCommand::SetOccasion { trip_id, occasion } => {
            ledger.update_occasion(TripId::new(trip_id), &occasion)?;
            println!("Updated trip {trip_id}");
        }
    }

    Ok(())
}

fn run_roster(command: RosterCommand, ledger: &TripLedger) -> Result<(), Box<dyn Error>> {
    match command {
        RosterCommand::Add {
            manager_id,
            trip_id,
            user_ids,
        } => {
            let user_ids = to_user_ids(&user_ids);
            let added =
                ledger.add_participants(UserId::new(manager_id), TripId::new(trip_id), &user_ids)?;
            println!("Added {added} participant(s) to trip {trip_id}");
        }
        RosterCommand::Replace {
            manager_id,
            trip_id,
            user_ids,
        } => {
            let user_ids = to_user_ids(&user_ids);
            ledger.replace_participants(
                UserId::new(manager_id),
                TripId::new(trip_id),
                &user_ids,
            )?;
            println!("Trip {trip_id} now has {} participant(s)", user_ids.len());
        }
        RosterCommand::List { trip_id, output } => {
            print_users(&ledger.participant_users(TripId::new(trip_id))?, output.json)?;
        }
        RosterCommand::TripsForUser { user_id, output } => {
            print_trips(&ledger.list_trips_for_user(UserId::new(user_id))?, output.json)?;
        }
        RosterCommand::Assignable { manager_id, output } => {
            print_users(&ledger.assignable_users(UserId::new(manager_id))?, output.json)?;
        }
    }

    Ok(())
}

fn run_expense(command: ExpenseCommand, ledger: &TripLedger) -> Result<(), Box<dyn Error>> {
    match command {
        ExpenseCommand::Add {
            trip_id,
            user_id,
            file_path,
            amount,
            currency,
            category,
            note,
            output,
        } => {
            let new_expense =
                NewExpense::build(TripId::new(trip_id), UserId::new(user_id), &file_path)
                    .amount(amount)
                    .currency(currency.as_deref())
                    .category(category.as_deref())
                    .note(note.as_deref());
            let expense = ledger.add_expense(new_expense)?;
            print_expenses(&[expense], output.json)?;
        }
        ExpenseCommand::List {
            trip_id,
            user_id,
            json,
            csv,
        } => {
            let expenses = ledger.list_expenses(TripId::new(trip_id), user_id.map(UserId::new))?;

            if csv {
                write_expenses_csv(&expenses, io::stdout())?;
            } else {
                print_expenses(&expenses, json)?;
            }
        }
        ExpenseCommand::SetStatus { expense_id, status } => {
            let status: ExpenseStatus = status.parse()?;
            ledger.set_status(expense_id, status)?;
            println!("Expense {expense_id} is now {status}");
        }
        ExpenseCommand::Total { trip_id, output } => {
            let total = ledger.total_for_trip(TripId::new(trip_id))?;

            if output.json {
                print_json(&serde_json::json!({ "trip_id": trip_id, "total": total }))?;
            } else {
                println!("{total:.2}");
            }
        }
    }

    Ok(())
}

fn parse_date(text: &str) -> Result<Date, String> {
    Date::parse(text, DATE_FORMAT).map_err(|error| format!("expected YYYY-MM-DD: {error}"))
}

fn format_optional_date(date: Option<Date>) -> Result<String, time::error::Format> {
    match date {
        Some(date) => date.format(DATE_FORMAT),
        None => Ok("-".to_owned()),
    }
}

fn to_user_ids(raw: &[i64]) -> Vec<UserId> {
    raw.iter().copied().map(UserId::new).collect()
}

fn print_json(value: &impl Serialize) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_trips(trips: &[Trip], json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        return print_json(&trips);
    }

    println!(
        "{:>5}  {:<20}  {:<10}  {:<10}  {}",
        "ID", "Destination", "Start", "End", "Occasion"
    );
    for trip in trips {
        println!(
            "{:>5}  {:<20}  {:<10}  {:<10}  {}",
            trip.id,
            trip.destination.to_string(),
            format_optional_date(trip.start_date)?,
            format_optional_date(trip.end_date)?,
            trip.occasion
        );
    }

    Ok(())
}

fn print_users(users: &[DirectoryUser], json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        return print_json(&users);
    }

    println!("{:>5}  {:<20}  {}", "ID", "Username", "Email");
    for user in users {
        println!(
            "{:>5}  {:<20}  {}",
            user.id,
            user.username,
            user.email.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

fn print_expenses(expenses: &[Expense], json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        return print_json(&expenses);
    }

    println!(
        "{:>5}  {:>5}  {:>10}  {:<4}  {:<9}  {:<20}  {}",
        "ID", "User", "Amount", "Cur", "Status", "Submitted", "Receipt"
    );
    for expense in expenses {
        let amount = expense
            .amount
            .map(|amount| format!("{amount:.2}"))
            .unwrap_or_default();
        println!(
            "{:>5}  {:>5}  {:>10}  {:<4}  {:<9}  {:<20}  {}",
            expense.id,
            expense.user_id,
            amount,
            expense.currency.as_deref().unwrap_or(""),
            expense.status.as_str(),
            expense.created_at.date().to_string(),
            expense.file_path
        );
    }

    Ok(())
}

/// One CSV row per expense, with the header taken from the field names.
#[derive(Serialize)]
struct ExpenseRecord<'a> {
    id: i64,
    trip_id: i64,
    user_id: i64,
    file_path: &'a str,
    amount: Option<f64>,
    currency: Option<&'a str>,
    category: Option<&'a str>,
    note: Option<&'a str>,
    status: ExpenseStatus,
    created_at: String,
}

fn write_expenses_csv(expenses: &[Expense], writer: impl Write) -> Result<(), Box<dyn Error>> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for expense in expenses {
        csv_writer.serialize(ExpenseRecord {
            id: expense.id,
            trip_id: expense.trip_id.as_i64(),
            user_id: expense.user_id.as_i64(),
            file_path: &expense.file_path,
            amount: expense.amount,
            currency: expense.currency.as_deref(),
            category: expense.category.as_deref(),
            note: expense.note.as_deref(),
            status: expense.status,
            created_at: expense
                .created_at
                .format(&time::format_description::well_known::Rfc3339)?,
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

fn capitalise_first_char(text: &str) -> String {
    let mut chars = text.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

//! Expense receipts submitted against trips.

mod db;
mod domain;

pub use db::{
    add_expense, create_expense_table, get_expense, list_expenses, set_status, total_for_trip,
};
pub use domain::{Expense, ExpenseId, ExpenseStatus, NewExpense};

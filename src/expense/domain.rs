//! Core expense domain types.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, TripId, UserId, non_blank};

/// Database identifier for an expense.
pub type ExpenseId = i64;

/// Where an expense is in the approval process.
///
/// Every expense starts as [ExpenseStatus::Pending]. An approver may move it to any other status
/// at any time, including back to pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    /// Submitted and waiting for a decision.
    #[default]
    Pending,
    /// Accepted for reimbursement.
    Approved,
    /// Refused.
    Rejected,
}

impl ExpenseStatus {
    /// All statuses in display order.
    pub const ALL: [ExpenseStatus; 3] = [Self::Pending, Self::Approved, Self::Rejected];

    /// The value stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl Display for ExpenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidStatus(s.to_owned()))
    }
}

impl ToSql for ExpenseStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ExpenseStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

/// A receipt submitted by a user for a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// The ID of the expense.
    pub id: ExpenseId,
    /// The trip the money was spent on.
    pub trip_id: TripId,
    /// The user who submitted the receipt.
    pub user_id: UserId,
    /// Where the receipt file is stored. Only the reference is kept here.
    pub file_path: String,
    /// How much was spent, if known.
    pub amount: Option<f64>,
    /// The currency of `amount`, e.g. "CHF".
    pub currency: Option<String>,
    /// What the money was spent on, e.g. "Train".
    pub category: Option<String>,
    /// A free text remark from the submitter.
    pub note: Option<String>,
    /// The approval status.
    pub status: ExpenseStatus,
    /// When the expense was submitted, in UTC to the second. Never changes.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The details needed to submit an [Expense].
///
/// The status is not part of a new expense: every expense starts out pending.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    /// The trip the money was spent on.
    pub trip_id: TripId,
    /// The user submitting the receipt.
    pub user_id: UserId,
    /// Where the receipt file is stored. Must not be empty.
    pub file_path: String,
    /// How much was spent.
    pub amount: Option<f64>,
    /// The currency of `amount`. Blank strings are stored as `None`.
    pub currency: Option<String>,
    /// The expense category. Blank strings are stored as `None`.
    pub category: Option<String>,
    /// A free text remark. Blank strings are stored as `None`.
    pub note: Option<String>,
}

impl NewExpense {
    /// Start building an expense for `trip_id` submitted by `user_id` with the receipt at
    /// `file_path`.
    pub fn build(trip_id: TripId, user_id: UserId, file_path: &str) -> Self {
        Self {
            trip_id,
            user_id,
            file_path: file_path.to_owned(),
            amount: None,
            currency: None,
            category: None,
            note: None,
        }
    }

    /// Set the amount.
    pub fn amount(mut self, amount: Option<f64>) -> Self {
        self.amount = amount;
        self
    }

    /// Set the currency.
    pub fn currency(mut self, currency: Option<&str>) -> Self {
        self.currency = non_blank(currency);
        self
    }

    /// Set the category.
    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = non_blank(category);
        self
    }

    /// Set the note.
    pub fn note(mut self, note: Option<&str>) -> Self {
        self.note = non_blank(note);
        self
    }
}

#[cfg(test)]
mod expense_status_tests {
    use crate::{Error, ExpenseStatus};

    #[test]
    fn parses_known_statuses() {
        assert_eq!("pending".parse::<ExpenseStatus>(), Ok(ExpenseStatus::Pending));
        assert_eq!("approved".parse::<ExpenseStatus>(), Ok(ExpenseStatus::Approved));
        assert_eq!("Rejected".parse::<ExpenseStatus>(), Ok(ExpenseStatus::Rejected));
    }

    #[test]
    fn rejects_unknown_status() {
        let result = "archived".parse::<ExpenseStatus>();

        assert_eq!(result, Err(Error::InvalidStatus("archived".to_owned())));
    }

    #[test]
    fn display_matches_stored_value() {
        for status in ExpenseStatus::ALL {
            assert_eq!(status.to_string(), status.as_str());
        }
    }

    #[test]
    fn default_is_pending() {
        assert_eq!(ExpenseStatus::default(), ExpenseStatus::Pending);
    }
}

//! Core trip domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{DateRangePolicy, Error, UserId, non_blank};

/// A newtype wrapper for integer trip IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct TripId(i64);

impl TripId {
    /// Create a new trip ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the trip ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated, non-empty trip destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Destination(String);

impl Destination {
    /// Create a destination. The text is kept exactly as given.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyDestination] if `name` is empty or only
    /// whitespace.
    pub fn new(name: &str) -> Result<Self, Error> {
        if name.trim().is_empty() {
            Err(Error::EmptyDestination)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a destination without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for Destination {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Destination::new(s)
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A planned journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    /// The ID of the trip.
    pub id: TripId,
    /// Where the trip goes.
    pub destination: Destination,
    /// The day of departure. Older rows may have none.
    pub start_date: Option<Date>,
    /// The day of return. Older rows may have none.
    pub end_date: Option<Date>,
    /// Why the trip is happening, e.g. "Customer workshop".
    pub occasion: String,
    /// A booking reference with the rail operator, if one was made.
    pub sbb_booking_token: Option<String>,
    /// A token for the rail operator's API, if one was issued.
    pub sbb_api_token: Option<String>,
}

/// The details needed to create a [Trip].
///
/// Start with [NewTrip::build] and set the optional fields with the builder methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrip {
    /// The unvalidated destination. Checked when the trip is created.
    pub destination: String,
    /// The day of departure.
    pub start_date: Date,
    /// The day of return.
    pub end_date: Date,
    /// Why the trip is happening. Defaults to an empty string.
    pub occasion: String,
    /// The users invited to the trip when it is created.
    pub participants: Vec<UserId>,
    /// See [Trip::sbb_booking_token]. Blank strings are stored as `None`.
    pub sbb_booking_token: Option<String>,
    /// See [Trip::sbb_api_token]. Blank strings are stored as `None`.
    pub sbb_api_token: Option<String>,
}

impl NewTrip {
    /// Start building a trip to `destination` between `start_date` and `end_date`.
    pub fn build(destination: &str, start_date: Date, end_date: Date) -> Self {
        Self {
            destination: destination.to_owned(),
            start_date,
            end_date,
            occasion: String::new(),
            participants: Vec::new(),
            sbb_booking_token: None,
            sbb_api_token: None,
        }
    }

    /// Set the occasion.
    pub fn occasion(mut self, occasion: &str) -> Self {
        self.occasion = occasion.to_owned();
        self
    }

    /// Set the initial participants.
    pub fn participants(mut self, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        self.participants = user_ids.into_iter().collect();
        self
    }

    /// Set the rail booking token.
    pub fn sbb_booking_token(mut self, token: Option<&str>) -> Self {
        self.sbb_booking_token = non_blank(token);
        self
    }

    /// Set the rail API token.
    pub fn sbb_api_token(mut self, token: Option<&str>) -> Self {
        self.sbb_api_token = non_blank(token);
        self
    }

    /// Check the trip dates against `policy`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidDateRange] if `policy` is [DateRangePolicy::Enforced] and the trip
    /// ends before it starts.
    pub fn check_date_range(&self, policy: DateRangePolicy) -> Result<(), Error> {
        match policy {
            DateRangePolicy::Enforced if self.end_date < self.start_date => {
                Err(Error::InvalidDateRange {
                    start: self.start_date,
                    end: self.end_date,
                })
            }
            _ => Ok(()),
        }
    }
}

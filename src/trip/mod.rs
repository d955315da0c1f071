//! Trips: where people are going, when, and why.

mod db;
mod domain;

pub use db::{
    add_trip, create_trip_table, delete_trip, get_trip, list_trips, trip_exists, update_occasion,
};
pub(crate) use db::{insert_trip, map_trip_row};
pub use domain::{Destination, NewTrip, Trip, TripId};

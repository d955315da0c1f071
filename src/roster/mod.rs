//! The roster: which users are invited to which trips.

mod db;
mod scope;

pub(crate) use db::{insert_participants, link_participants, relink_participants};
pub use db::{
    add_participants, create_participant_table, list_participants, list_trips_for_user,
    replace_participants,
};
pub use scope::{ensure_assignable, ensure_reports};

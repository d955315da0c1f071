//! Restricts which users a manager may put on a roster.

use std::collections::HashSet;

use crate::{DirectoryUser, Error, UserDirectory, UserId};

/// Check that every user in `user_ids` may be invited to a new trip by `manager_id`.
///
/// Only the manager's team below manager rank qualifies, see
/// [UserDirectory::users_under_manager].
///
/// # Errors
/// Returns [Error::UnmanagedUser] for the first user outside that group, or any error from
/// `directory`.
pub fn ensure_assignable(
    manager_id: UserId,
    user_ids: &[UserId],
    directory: &impl UserDirectory,
) -> Result<(), Error> {
    if user_ids.is_empty() {
        return Ok(());
    }

    ensure_within(manager_id, user_ids, directory.users_under_manager(manager_id)?)
}

/// Check that every user in `user_ids` reports to `manager_id`, whatever their role.
///
/// Used when editing the roster of an existing trip.
///
/// # Errors
/// Returns [Error::UnmanagedUser] for the first user who does not report to the manager, or any
/// error from `directory`.
pub fn ensure_reports(
    manager_id: UserId,
    user_ids: &[UserId],
    directory: &impl UserDirectory,
) -> Result<(), Error> {
    if user_ids.is_empty() {
        return Ok(());
    }

    ensure_within(manager_id, user_ids, directory.direct_reports(manager_id)?)
}

fn ensure_within(
    manager_id: UserId,
    user_ids: &[UserId],
    team: Vec<DirectoryUser>,
) -> Result<(), Error> {
    let team: HashSet<UserId> = team.into_iter().map(|user| user.id).collect();

    match user_ids.iter().find(|user_id| !team.contains(*user_id)) {
        Some(&user_id) => {
            tracing::warn!("manager {manager_id} tried to assign user {user_id}");
            Err(Error::UnmanagedUser {
                manager_id,
                user_id,
            })
        }
        None => Ok(()),
    }
}

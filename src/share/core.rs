//! Shares let one user read another user's transactions.
//!
//! The owner of a share invites another user. Once the invitee accepts, reports and the
//! dashboard of the invitee include the owner's data.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    database_id::ShareId,
    user::{get_user_by_email, get_user_by_id},
};

/// Where a share is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    /// Waiting for the invitee to accept or decline.
    Pending,
    /// Accepted by the invitee.
    Active,
    /// Declined by the invitee.
    Inactive,
}

impl ShareStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ShareStatus::Pending => "pending",
            ShareStatus::Active => "active",
            ShareStatus::Inactive => "inactive",
        }
    }
}

impl ToSql for ShareStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ShareStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pending" => Ok(ShareStatus::Pending),
            "active" => Ok(ShareStatus::Active),
            "inactive" => Ok(ShareStatus::Inactive),
            other => Err(FromSqlError::Other(
                format!("invalid share status {other}").into(),
            )),
        }
    }
}

/// What the invitee of a share may do with the owner's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePermissions {
    /// The invitee sees the owner's transactions in reports and the dashboard.
    pub view_expenses: bool,
    /// Recorded for clients, not enforced by the server.
    pub add_expenses: bool,
}

impl Default for SharePermissions {
    fn default() -> Self {
        Self {
            view_expenses: true,
            add_expenses: false,
        }
    }
}

/// A grant from `owner_id` to `shared_user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// The ID of the share.
    pub id: ShareId,
    /// The user whose data is shared.
    pub owner_id: UserID,
    /// The user the data is shared with.
    pub shared_user_id: UserID,
    /// Where the share is in its lifecycle.
    pub status: ShareStatus,
    /// What the invitee may do.
    pub permissions: SharePermissions,
    /// When the invitation was made.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The user to share with, given by ID or by email.
#[derive(Debug, Clone, PartialEq)]
pub enum ShareTarget {
    /// A user ID.
    Id(UserID),
    /// An email address.
    Email(String),
}

/// Create the share table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_share_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS share (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            shared_user_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            view_expenses INTEGER NOT NULL DEFAULT 1,
            add_expenses INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE(owner_id, shared_user_id),
            FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(shared_user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

const SHARE_COLUMNS: &str =
    "id, owner_id, shared_user_id, status, view_expenses, add_expenses, created_at";

fn map_share_row(row: &Row) -> Result<Share, rusqlite::Error> {
    Ok(Share {
        id: row.get(0)?,
        owner_id: UserID::new(row.get(1)?),
        shared_user_id: UserID::new(row.get(2)?),
        status: row.get(3)?,
        permissions: SharePermissions {
            view_expenses: row.get(4)?,
            add_expenses: row.get(5)?,
        },
        created_at: row.get(6)?,
    })
}

fn resolve_target(target: ShareTarget, connection: &Connection) -> Result<UserID, Error> {
    let user = match target {
        ShareTarget::Id(user_id) => get_user_by_id(user_id, connection),
        ShareTarget::Email(email) => get_user_by_email(&email, connection),
    };

    match user {
        Ok(user) if user.is_active => Ok(user.id),
        Ok(_) | Err(Error::NotFound) => Err(Error::InvalidShare(
            "the user to share with does not exist".to_owned(),
        )),
        Err(error) => Err(error),
    }
}

/// Invite `target` to see the data of `owner_id`. The new share is pending.
///
/// # Errors
///
/// Returns:
/// - [Error::InvalidShare] if the target does not exist, is inactive or is the owner,
/// - [Error::DuplicateShare] if the owner already shared with the target.
pub fn create_share(
    owner_id: UserID,
    target: ShareTarget,
    permissions: SharePermissions,
    connection: &Connection,
) -> Result<Share, Error> {
    let shared_user_id = resolve_target(target, connection)?;

    if shared_user_id == owner_id {
        return Err(Error::InvalidShare(
            "you cannot share with yourself".to_owned(),
        ));
    }

    connection
        .prepare(&format!(
            "INSERT INTO share (owner_id, shared_user_id, status, view_expenses, add_expenses, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {SHARE_COLUMNS}"
        ))?
        .query_row(
            (
                owner_id.as_i64(),
                shared_user_id.as_i64(),
                ShareStatus::Pending,
                permissions.view_expenses,
                permissions.add_expenses,
                OffsetDateTime::now_utc(),
            ),
            map_share_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateShare,
            error => error.into(),
        })
}

/// Get the shares `user_id` owns or was invited to, oldest first.
pub fn get_shares(user_id: UserID, connection: &Connection) -> Result<Vec<Share>, Error> {
    connection
        .prepare(&format!(
            "SELECT {SHARE_COLUMNS} FROM share WHERE owner_id = ?1 OR shared_user_id = ?1
             ORDER BY id"
        ))?
        .query_map((user_id.as_i64(),), map_share_row)?
        .map(|share_result| share_result.map_err(Error::SqlError))
        .collect()
}

/// Accept or decline the pending share `id` that `user_id` was invited to.
///
/// # Errors
///
/// Returns:
/// - [Error::NotFound] if `user_id` is not the invitee of the share,
/// - [Error::InvalidShare] if the share was already answered.
pub fn respond_to_share(
    id: ShareId,
    user_id: UserID,
    accept: bool,
    connection: &Connection,
) -> Result<Share, Error> {
    let share = connection
        .prepare(&format!(
            "SELECT {SHARE_COLUMNS} FROM share WHERE id = ?1 AND shared_user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_share_row)?;

    if share.status != ShareStatus::Pending {
        return Err(Error::InvalidShare("the share is not pending".to_owned()));
    }

    let status = if accept {
        ShareStatus::Active
    } else {
        ShareStatus::Inactive
    };

    connection
        .prepare(&format!(
            "UPDATE share SET status = ?1 WHERE id = ?2 RETURNING {SHARE_COLUMNS}"
        ))?
        .query_row((status, id), map_share_row)
        .map_err(|error| error.into())
}

/// Delete the share `id` owned by `owner_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the share does not exist or `owner_id` is not its owner.
pub fn delete_share(id: ShareId, owner_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM share WHERE id = ?1 AND owner_id = ?2",
        (id, owner_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the users whose data `user_id` may read: the user themselves followed by every owner
/// of an active share with `view_expenses` granted to `user_id`.
pub fn get_visible_user_ids(user_id: UserID, connection: &Connection) -> Result<Vec<UserID>, Error> {
    let mut user_ids = vec![user_id];

    let owners = connection
        .prepare(
            "SELECT owner_id FROM share
             WHERE shared_user_id = ?1 AND status = 'active' AND view_expenses = 1
             ORDER BY owner_id",
        )?
        .query_map((user_id.as_i64(),), |row| row.get(0).map(UserID::new))?
        .collect::<Result<Vec<_>, _>>()?;
    user_ids.extend(owners);

    Ok(user_ids)
}

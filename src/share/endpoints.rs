//! Route handlers for inviting users to see your data and answering invitations.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, UserID,
    database_id::ShareId,
    share::core::{
        Share, SharePermissions, ShareTarget, create_share, delete_share, get_shares,
        respond_to_share,
    },
};

/// The state needed to manage shares.
#[derive(Debug, Clone)]
pub struct ShareState {
    /// The database connection for managing shares.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ShareState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a share. Exactly one of `shared_user_id` and `email` must be
/// given.
#[derive(Debug, Deserialize)]
pub struct ShareForm {
    shared_user_id: Option<i64>,
    email: Option<String>,
    #[serde(default)]
    permissions: SharePermissions,
}

impl ShareForm {
    fn target(self) -> Result<(ShareTarget, SharePermissions), Error> {
        let target = match (self.shared_user_id, self.email) {
            (Some(user_id), None) => ShareTarget::Id(UserID::new(user_id)),
            (None, Some(email)) => ShareTarget::Email(email),
            _ => {
                return Err(Error::Validation(
                    "give exactly one of shared_user_id and email".to_owned(),
                ));
            }
        };

        Ok((target, self.permissions))
    }
}

/// A route handler for sharing the current user's data with another user.
pub async fn create_share_endpoint(
    State(state): State<ShareState>,
    Extension(user_id): Extension<UserID>,
    Json(form): Json<ShareForm>,
) -> Result<(StatusCode, Json<Share>), Error> {
    let (target, permissions) = form.target()?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let share = create_share(user_id, target, permissions, &connection)?;

    Ok((StatusCode::CREATED, Json(share)))
}

/// A route handler for listing the shares the current user owns or was invited to.
pub async fn get_shares_endpoint(
    State(state): State<ShareState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Share>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_shares(user_id, &connection).map(Json)
}

/// A route handler for accepting an invitation.
pub async fn accept_share_endpoint(
    State(state): State<ShareState>,
    Extension(user_id): Extension<UserID>,
    Path(share_id): Path<ShareId>,
) -> Result<Json<Share>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    respond_to_share(share_id, user_id, true, &connection).map(Json)
}

/// A route handler for declining an invitation.
pub async fn decline_share_endpoint(
    State(state): State<ShareState>,
    Extension(user_id): Extension<UserID>,
    Path(share_id): Path<ShareId>,
) -> Result<Json<Share>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    respond_to_share(share_id, user_id, false, &connection).map(Json)
}

/// A route handler for revoking a share the current user owns.
pub async fn delete_share_endpoint(
    State(state): State<ShareState>,
    Extension(user_id): Extension<UserID>,
    Path(share_id): Path<ShareId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_share(share_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

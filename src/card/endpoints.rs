//! Route handlers for managing credit cards.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, UserID,
    card::core::{
        Card, CardUpdate, NewCard, create_card, delete_card, get_card, get_cards, update_card,
    },
    database_id::CardId,
};

/// The state needed to manage cards.
#[derive(Debug, Clone)]
pub struct CardState {
    /// The database connection for managing cards.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for creating a new card.
pub async fn create_card_endpoint(
    State(state): State<CardState>,
    Extension(user_id): Extension<UserID>,
    Json(new_card): Json<NewCard>,
) -> Result<(StatusCode, Json<Card>), Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let card = create_card(new_card, user_id, &connection)?;

    Ok((StatusCode::CREATED, Json(card)))
}

/// A route handler for listing the current user's cards.
pub async fn get_cards_endpoint(
    State(state): State<CardState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<Card>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_cards(user_id, &connection).map(Json)
}

/// A route handler for getting a single card.
pub async fn get_card_endpoint(
    State(state): State<CardState>,
    Extension(user_id): Extension<UserID>,
    Path(card_id): Path<CardId>,
) -> Result<Json<Card>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_card(card_id, user_id, &connection).map(Json)
}

/// A route handler for changing some fields of a card.
pub async fn update_card_endpoint(
    State(state): State<CardState>,
    Extension(user_id): Extension<UserID>,
    Path(card_id): Path<CardId>,
    Json(update): Json<CardUpdate>,
) -> Result<Json<Card>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_card(card_id, user_id, update, &connection).map(Json)
}

/// A route handler for deleting a card.
pub async fn delete_card_endpoint(
    State(state): State<CardState>,
    Extension(user_id): Extension<UserID>,
    Path(card_id): Path<CardId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_card(card_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

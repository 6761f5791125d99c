//! Route handlers for recording, listing and deleting transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use axum_extra::extract::Query;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error, UserID,
    database_id::{AccountId, CardId, CategoryId, TransactionId},
    transaction::{
        core::{
            Transaction, TransactionBuilder, TransactionKind, create_transaction,
            delete_transaction, get_transaction,
        },
        query::{
            OrderBy, OrderDir, Pagination, SortOrder, TransactionFilter,
            count_matching_transactions, query_transactions,
        },
    },
};

/// The state needed to manage transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query string accepted by the transaction list.
///
/// ID lists may be given as repeated keys, with or without the `[]` suffix, e.g.
/// `?category_ids[]=1&category_ids[]=2`.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    kind: Option<TransactionKind>,
    #[serde(default, alias = "category_ids[]")]
    category_ids: Vec<CategoryId>,
    #[serde(default, alias = "account_ids[]")]
    account_ids: Vec<AccountId>,
    #[serde(default, alias = "card_ids[]")]
    card_ids: Vec<CardId>,
    start_date: Option<Date>,
    end_date: Option<Date>,
    order_by: Option<OrderBy>,
    order_dir: Option<OrderDir>,
    page: Option<u64>,
    page_size: Option<u64>,
}

/// A page of transactions and the total number of matches.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionPage {
    /// The transactions on this page.
    pub items: Vec<Transaction>,
    /// The 1-based page number.
    pub page: u64,
    /// The requested page size.
    pub page_size: u64,
    /// The number of transactions matching the filter across all pages.
    pub total: u64,
}

/// A route handler for recording a new transaction.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Json(builder): Json<TransactionBuilder>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let transaction = create_transaction(builder, user_id, &mut connection)?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// A route handler for listing the current user's transactions.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<TransactionPage>, Error> {
    let pagination = Pagination::new(query.page, query.page_size)?;
    let order = SortOrder {
        order_by: query.order_by.unwrap_or_default(),
        order_dir: query.order_dir.unwrap_or_default(),
    };
    let filter = TransactionFilter {
        kind: query.kind,
        category_ids: query.category_ids,
        account_ids: query.account_ids,
        card_ids: query.card_ids,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let items = query_transactions(&[user_id], &filter, order, pagination, &connection)?;
    let total = count_matching_transactions(&[user_id], &filter, &connection)?;

    Ok(Json(TransactionPage {
        items,
        page: pagination.page(),
        page_size: pagination.page_size(),
        total,
    }))
}

/// A route handler for getting one of the current user's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<Transaction>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_transaction(transaction_id, user_id, &connection).map(Json)
}

/// A route handler for deleting a transaction, which also reverses its effect on the account
/// balance.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserID>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_transaction(transaction_id, user_id, &mut connection)?;

    Ok(StatusCode::NO_CONTENT)
}

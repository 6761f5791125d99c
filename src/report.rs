//! Exports transactions as a CSV file.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error, UserID,
    share::get_visible_user_ids,
    transaction::{Transaction, TransactionFilter, query_all_transactions},
};

/// The header row of the transactions CSV.
pub const CSV_HEADER: [&str; 8] = [
    "id",
    "type",
    "amount",
    "date",
    "description",
    "category_id",
    "account_id",
    "card_id",
];

/// The state needed to build reports.
#[derive(Debug, Clone)]
pub struct ReportState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The date range of a report. Both ends are inclusive and optional.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    start_date: Option<Date>,
    end_date: Option<Date>,
}

fn optional_id(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

/// Write `transactions` as CSV, one row per transaction after [CSV_HEADER].
///
/// Line breaks in descriptions are replaced with spaces so that every transaction takes
/// exactly one line.
///
/// # Errors
///
/// Returns [Error::CsvError] if the CSV could not be written.
pub fn write_transactions_csv(transactions: &[Transaction]) -> Result<Vec<u8>, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(CSV_HEADER)
        .map_err(|error| Error::CsvError(error.to_string()))?;

    for transaction in transactions {
        let description = transaction
            .description
            .as_deref()
            .unwrap_or_default()
            .replace(['\r', '\n'], " ");

        writer
            .write_record([
                transaction.id.to_string(),
                transaction.kind.as_str().to_owned(),
                format!("{:.2}", transaction.amount),
                transaction.date.to_string(),
                description,
                optional_id(transaction.category_id),
                optional_id(transaction.account_id),
                optional_id(transaction.card_id),
            ])
            .map_err(|error| Error::CsvError(error.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|error| Error::CsvError(error.to_string()))
}

/// A route handler that downloads the transactions visible to the current user as CSV.
pub async fn get_transactions_csv(
    State(state): State<ReportState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, Error> {
    let transactions = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;
        let user_ids = get_visible_user_ids(user_id, &connection)?;
        let filter = TransactionFilter {
            start_date: query.start_date,
            end_date: query.end_date,
            ..Default::default()
        };

        query_all_transactions(&user_ids, &filter, &connection)?
    };

    let csv = write_transactions_csv(&transactions)?;

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"transactions.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

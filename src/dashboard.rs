//! Month-to-date summaries for the dashboard.
//!
//! Every figure covers the transactions of the user and of the owners who shared their data
//! with the user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::{Connection, params_from_iter, types::Value};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error, UserID,
    account::get_accounts,
    database_id::AccountId,
    money::from_cents,
    share::get_visible_user_ids,
    timezone::get_local_date,
};

/// The name used for expenses without a category.
pub const UNCATEGORISED: &str = "Uncategorised";

/// The state needed for the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading transactions and accounts.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone that decides the current month.
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Income and expenses over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The total income.
    pub income: Decimal,
    /// The total expenses.
    pub expenses: Decimal,
    /// Income minus expenses.
    pub balance: Decimal,
}

/// The current balance of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// The ID of the account.
    pub id: AccountId,
    /// The name of the bank.
    pub bank_name: String,
    /// The current balance.
    pub current_balance: Decimal,
}

/// The total spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryExpenses {
    /// The category name, or [UNCATEGORISED].
    pub category: String,
    /// The total spent.
    pub total: Decimal,
}

/// Income and expenses on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFlow {
    /// The day.
    pub date: Date,
    /// The income on the day.
    pub income: Decimal,
    /// The expenses on the day.
    pub expenses: Decimal,
}

/// The first day of the month of `today` and `today`.
fn month_to_date(today: Date) -> (Date, Date) {
    (today.replace_day(1).unwrap_or(today), today)
}

/// Build the shared WHERE clause over transactions aliased as `t`.
fn range_clause(user_ids: &[UserID], start: Date, end: Date) -> (String, Vec<Value>) {
    let placeholders = vec!["?"; user_ids.len()].join(", ");
    let mut parameters: Vec<Value> = user_ids
        .iter()
        .map(|user_id| Value::Integer(user_id.as_i64()))
        .collect();
    parameters.push(Value::Text(start.to_string()));
    parameters.push(Value::Text(end.to_string()));

    (
        format!("t.user_id IN ({placeholders}) AND t.date >= ? AND t.date <= ?"),
        parameters,
    )
}

/// Sum the income and expenses of `user_ids` between `start` and `end` inclusive.
pub fn get_summary(
    user_ids: &[UserID],
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Summary, Error> {
    let (where_clause, parameters) = range_clause(user_ids, start, end);

    let (income, expenses): (i64, i64) = connection.query_row(
        &format!(
            "SELECT
                COALESCE(SUM(CASE WHEN t.kind = 'income' THEN t.amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN t.kind = 'expense' THEN t.amount ELSE 0 END), 0)
             FROM \"transaction\" t WHERE {where_clause}"
        ),
        params_from_iter(parameters.iter()),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(Summary {
        income: from_cents(income),
        expenses: from_cents(expenses),
        balance: from_cents(income - expenses),
    })
}

/// Get the expenses of `user_ids` between `start` and `end` inclusive, totalled per category
/// name, largest first.
pub fn get_expenses_by_category(
    user_ids: &[UserID],
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<CategoryExpenses>, Error> {
    let (where_clause, parameters) = range_clause(user_ids, start, end);

    connection
        .prepare(&format!(
            "SELECT COALESCE(c.name, '{UNCATEGORISED}') AS category_name, SUM(t.amount) AS total
             FROM \"transaction\" t
             LEFT JOIN category c ON c.id = t.category_id
             WHERE t.kind = 'expense' AND {where_clause}
             GROUP BY category_name
             ORDER BY total DESC, category_name"
        ))?
        .query_map(params_from_iter(parameters.iter()), |row| {
            Ok(CategoryExpenses {
                category: row.get(0)?,
                total: row.get(1).map(from_cents)?,
            })
        })?
        .map(|row_result| row_result.map_err(Error::SqlError))
        .collect()
}

/// Get the income and expenses of `user_ids` for each day with transactions between `start`
/// and `end` inclusive, oldest first.
pub fn get_daily_flow(
    user_ids: &[UserID],
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<DailyFlow>, Error> {
    let (where_clause, parameters) = range_clause(user_ids, start, end);

    connection
        .prepare(&format!(
            "SELECT t.date,
                SUM(CASE WHEN t.kind = 'income' THEN t.amount ELSE 0 END),
                SUM(CASE WHEN t.kind = 'expense' THEN t.amount ELSE 0 END)
             FROM \"transaction\" t
             WHERE {where_clause}
             GROUP BY t.date
             ORDER BY t.date"
        ))?
        .query_map(params_from_iter(parameters.iter()), |row| {
            Ok(DailyFlow {
                date: row.get(0)?,
                income: row.get(1).map(from_cents)?,
                expenses: row.get(2).map(from_cents)?,
            })
        })?
        .map(|row_result| row_result.map_err(Error::SqlError))
        .collect()
}

/// The visible users of `user_id` and the current month so far.
fn dashboard_scope(
    state: &DashboardState,
    user_id: UserID,
    connection: &Connection,
) -> Result<(Vec<UserID>, Date, Date), Error> {
    let (start, end) = month_to_date(get_local_date(&state.local_timezone)?);
    let user_ids = get_visible_user_ids(user_id, connection)?;

    Ok((user_ids, start, end))
}

/// A route handler for this month's income, expenses and their difference.
pub async fn get_summary_endpoint(
    State(state): State<DashboardState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Summary>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let (user_ids, start, end) = dashboard_scope(&state, user_id, &connection)?;

    get_summary(&user_ids, start, end, &connection).map(Json)
}

/// A route handler for the current balance of every visible account.
pub async fn get_balances_by_account_endpoint(
    State(state): State<DashboardState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<AccountBalance>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let user_ids = get_visible_user_ids(user_id, &connection)?;

    let balances = get_accounts(&user_ids, &connection)?
        .into_iter()
        .map(|account| AccountBalance {
            id: account.id,
            bank_name: account.bank_name,
            current_balance: account.current_balance,
        })
        .collect();

    Ok(Json(balances))
}

/// A route handler for this month's expenses per category.
pub async fn get_expenses_by_category_endpoint(
    State(state): State<DashboardState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<CategoryExpenses>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let (user_ids, start, end) = dashboard_scope(&state, user_id, &connection)?;

    get_expenses_by_category(&user_ids, start, end, &connection).map(Json)
}

/// A route handler for this month's income and expenses per day.
pub async fn get_daily_flow_endpoint(
    State(state): State<DashboardState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<DailyFlow>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let (user_ids, start, end) = dashboard_scope(&state, user_id, &connection)?;

    get_daily_flow(&user_ids, start, end, &connection).map(Json)
}

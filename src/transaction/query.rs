//! Filtering, ordering and paging of transactions.

use rusqlite::{Connection, params_from_iter, types::Value};
use serde::Deserialize;
use time::Date;

use crate::{
    Error, UserID,
    database_id::{AccountId, CardId, CategoryId},
    transaction::core::{TRANSACTION_COLUMNS, Transaction, TransactionKind, map_transaction_row},
};

/// The largest page a client may ask for.
pub const MAX_PAGE_SIZE: u64 = 200;
/// The page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Restricts which transactions a query returns. Empty fields do not filter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionFilter {
    /// Only income or only expenses.
    pub kind: Option<TransactionKind>,
    /// Any of these categories.
    pub category_ids: Vec<CategoryId>,
    /// Any of these accounts.
    pub account_ids: Vec<AccountId>,
    /// Any of these cards.
    pub card_ids: Vec<CardId>,
    /// On or after this date.
    pub start_date: Option<Date>,
    /// On or before this date.
    pub end_date: Option<Date>,
}

/// The column to sort transactions by.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    /// The amount of the transaction.
    Amount,
    /// The order the transactions were recorded in.
    Id,
    /// The date of the transaction. Unknown columns fall back to this.
    #[default]
    #[serde(other)]
    Date,
}

/// The direction to sort transactions in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDir {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    #[serde(other)]
    Desc,
}

impl OrderDir {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDir::Asc => "ASC",
            OrderDir::Desc => "DESC",
        }
    }
}

/// How to sort a page of transactions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    /// The column to sort by.
    pub order_by: OrderBy,
    /// The direction to sort in. Ties are broken by ID in the same direction.
    pub order_dir: OrderDir,
}

impl SortOrder {
    fn as_sql(&self) -> String {
        let dir = self.order_dir.as_sql();

        match self.order_by {
            OrderBy::Date => format!("date {dir}, id {dir}"),
            OrderBy::Amount => format!("amount {dir}, id {dir}"),
            OrderBy::Id => format!("id {dir}"),
        }
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    page_size: u64,
}

impl Pagination {
    /// Create a page request, using page 1 and [DEFAULT_PAGE_SIZE] for missing values.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] if `page` is zero, `page_size` is not in
    /// 1..=[MAX_PAGE_SIZE] or the page starts beyond the largest row offset SQLite accepts.
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Result<Self, Error> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page == 0 {
            return Err(Error::Validation("page must be at least 1".to_owned()));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(Error::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let offset = (page - 1).checked_mul(page_size);
        if offset.is_none_or(|offset| offset > i64::MAX as u64) {
            return Err(Error::Validation(format!("page {page} is out of range")));
        }

        Ok(Self { page, page_size })
    }

    /// The 1-based page number.
    pub fn page(&self) -> u64 {
        self.page
    }

    /// The number of items per page.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

fn push_in_clause<T: Copy + Into<i64>>(
    column: &str,
    ids: &[T],
    where_clause_parts: &mut Vec<String>,
    query_parameters: &mut Vec<Value>,
) {
    if ids.is_empty() {
        return;
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    where_clause_parts.push(format!("{column} IN ({placeholders})"));
    query_parameters.extend(ids.iter().map(|&id| Value::Integer(id.into())));
}

/// Build the WHERE clause and its parameters for transactions of `user_ids` matching `filter`.
fn build_where_clause(user_ids: &[UserID], filter: &TransactionFilter) -> (String, Vec<Value>) {
    let mut where_clause_parts = Vec::new();
    let mut query_parameters = Vec::new();

    let user_ids: Vec<i64> = user_ids.iter().map(UserID::as_i64).collect();
    // An empty user list must match nothing rather than everything.
    if user_ids.is_empty() {
        where_clause_parts.push("0".to_owned());
    }
    push_in_clause(
        "user_id",
        &user_ids,
        &mut where_clause_parts,
        &mut query_parameters,
    );

    if let Some(kind) = filter.kind {
        where_clause_parts.push("kind = ?".to_owned());
        query_parameters.push(Value::Text(kind.as_str().to_owned()));
    }

    push_in_clause(
        "category_id",
        &filter.category_ids,
        &mut where_clause_parts,
        &mut query_parameters,
    );
    push_in_clause(
        "account_id",
        &filter.account_ids,
        &mut where_clause_parts,
        &mut query_parameters,
    );
    push_in_clause(
        "card_id",
        &filter.card_ids,
        &mut where_clause_parts,
        &mut query_parameters,
    );

    if let Some(start_date) = filter.start_date {
        where_clause_parts.push("date >= ?".to_owned());
        query_parameters.push(Value::Text(start_date.to_string()));
    }

    if let Some(end_date) = filter.end_date {
        where_clause_parts.push("date <= ?".to_owned());
        query_parameters.push(Value::Text(end_date.to_string()));
    }

    (
        format!("WHERE {}", where_clause_parts.join(" AND ")),
        query_parameters,
    )
}

/// Get one page of the transactions of `user_ids` that match `filter`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn query_transactions(
    user_ids: &[UserID],
    filter: &TransactionFilter,
    order: SortOrder,
    page: Pagination,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let (where_clause, query_parameters) = build_where_clause(user_ids, filter);
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" {where_clause} ORDER BY {} LIMIT {} OFFSET {}",
        order.as_sql(),
        page.page_size(),
        page.offset()
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(query_parameters.iter()), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Get every transaction of `user_ids` that matches `filter`, oldest first.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn query_all_transactions(
    user_ids: &[UserID],
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let (where_clause, query_parameters) = build_where_clause(user_ids, filter);
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" {where_clause} ORDER BY date ASC, id ASC"
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(query_parameters.iter()), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

/// Count the transactions of `user_ids` that match `filter`.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn count_matching_transactions(
    user_ids: &[UserID],
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<u64, Error> {
    let (where_clause, query_parameters) = build_where_clause(user_ids, filter);

    connection
        .query_row(
            &format!("SELECT COUNT(id) FROM \"transaction\" {where_clause}"),
            params_from_iter(query_parameters.iter()),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

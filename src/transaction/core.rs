//! Defines the core data models and database queries for transactions.
//!
//! Transactions are the ledger: creating or deleting one that is linked to an account moves
//! that account's balance in the same SQL transaction.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error, UserID,
    account::{apply_balance_delta, check_account_owner},
    card::check_card_owner,
    category::check_category_visible,
    database_id::{AccountId, CardId, CategoryId, FixedExpenseId, TransactionId},
    money::{get_amount, require_positive, to_cents},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money earned. Increases the balance of the linked account.
    Income,
    /// Money spent. Decreases the balance of the linked account.
    Expense,
}

impl TransactionKind {
    /// The name of the kind as stored in the database and shown in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }

    /// The change in account balance, in cents, caused by a transaction of this kind.
    pub fn balance_delta(&self, amount_cents: i64) -> i64 {
        match self {
            TransactionKind::Income => amount_cents,
            TransactionKind::Expense => -amount_cents,
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(FromSqlError::Other(
                format!("invalid transaction kind {other}").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// Transactions cannot be changed once created, only deleted.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that recorded the transaction.
    pub user_id: UserID,
    /// Whether money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The amount of money, always positive.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// The category of the transaction.
    pub category_id: Option<CategoryId>,
    /// The bank account the money moved in or out of.
    pub account_id: Option<AccountId>,
    /// The credit card that paid.
    pub card_id: Option<CardId>,
    /// The fixed expense that generated this transaction.
    pub fixed_expense_id: Option<FixedExpenseId>,
    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(kind: TransactionKind, amount: Decimal, date: Date) -> TransactionBuilder {
        TransactionBuilder {
            kind,
            amount,
            date,
            description: None,
            category_id: None,
            account_id: None,
            card_id: None,
            fixed_expense_id: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// Doubles as the request body for creating a transaction. The fixed expense link can only be
/// set by the fixed expense runner.
///
/// # Examples
///
/// ```ignore
/// use rust_decimal::Decimal;
/// use time::macros::date;
///
/// let builder = Transaction::build(TransactionKind::Expense, Decimal::new(2000, 2), date!(2025-01-15))
///     .description(Some("Groceries".to_owned()))
///     .account_id(Some(1));
/// let transaction = create_transaction(builder, user_id, &mut connection)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionBuilder {
    /// Whether money was earned or spent.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// The amount of money, which must be positive with at most two decimal places.
    pub amount: Decimal,
    /// When the transaction happened.
    pub date: Date,
    /// What the transaction was for, at most 255 characters.
    #[serde(default)]
    pub description: Option<String>,
    /// A category that is global or owned by the user.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// An account owned by the user.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// A card owned by the user.
    #[serde(default)]
    pub card_id: Option<CardId>,
    /// The fixed expense that generated the transaction.
    #[serde(skip)]
    pub fixed_expense_id: Option<FixedExpenseId>,
}

impl TransactionBuilder {
    /// Set the description for the transaction.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the category for the transaction.
    pub fn category_id(mut self, category_id: Option<CategoryId>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the account for the transaction.
    pub fn account_id(mut self, account_id: Option<AccountId>) -> Self {
        self.account_id = account_id;
        self
    }

    /// Set the card for the transaction.
    pub fn card_id(mut self, card_id: Option<CardId>) -> Self {
        self.card_id = card_id;
        self
    }

    /// Set the fixed expense that generated the transaction.
    pub fn fixed_expense_id(mut self, fixed_expense_id: Option<FixedExpenseId>) -> Self {
        self.fixed_expense_id = fixed_expense_id;
        self
    }
}

/// The longest description a transaction may have, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 255;

/// Trim `description` and drop it if it is empty.
///
/// # Errors
///
/// Returns [Error::Validation] if the description is longer than [MAX_DESCRIPTION_LENGTH].
pub fn normalize_description(description: Option<String>) -> Result<Option<String>, Error> {
    let Some(description) = description else {
        return Ok(None);
    };
    let description = description.trim();

    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(Error::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }

    if description.is_empty() {
        Ok(None)
    } else {
        Ok(Some(description.to_owned()))
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                amount INTEGER NOT NULL CHECK (amount > 0),
                date TEXT NOT NULL,
                description TEXT,
                category_id INTEGER,
                account_id INTEGER,
                card_id INTEGER,
                fixed_expense_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE,
                FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(card_id) REFERENCES card(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(fixed_expense_id) REFERENCES fixed_expense(id)
                    ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // Used by the transaction list, reports and the dashboard.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, kind, amount, date, description, \
    category_id, account_id, card_id, fixed_expense_id, created_at";

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        kind: row.get(2)?,
        amount: get_amount(row, 3)?,
        date: row.get(4)?,
        description: row.get(5)?,
        category_id: row.get(6)?,
        account_id: row.get(7)?,
        card_id: row.get(8)?,
        fixed_expense_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Check that the category, account and card of a transaction may be used by `user_id`.
///
/// # Errors
///
/// Returns [Error::InvalidReference] naming the first field that refers to a record the user
/// cannot use.
pub fn check_references(
    category_id: Option<CategoryId>,
    account_id: Option<AccountId>,
    card_id: Option<CardId>,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    if let Some(category_id) = category_id {
        check_category_visible(category_id, user_id, connection)?;
    }

    if let Some(account_id) = account_id {
        check_account_owner(account_id, user_id, connection)?;
    }

    if let Some(card_id) = card_id {
        check_card_owner(card_id, user_id, connection)?;
    }

    Ok(())
}

/// Insert a transaction and move the balance of its account.
///
/// This does not open an SQL transaction of its own. Callers must run it inside one so that
/// the insert and the balance change are applied together.
///
/// # Errors
///
/// Returns:
/// - [Error::Validation] if the amount is not positive or the description is too long,
/// - [Error::InvalidReference] if the category, account or card cannot be used by `user_id`,
/// - [Error::SqlError] if there is some other SQL error.
pub fn insert_transaction(
    builder: TransactionBuilder,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    require_positive(builder.amount, "amount")?;
    let amount = to_cents(builder.amount)?;
    let description = normalize_description(builder.description)?;
    check_references(
        builder.category_id,
        builder.account_id,
        builder.card_id,
        user_id,
        connection,
    )?;

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\"
                (user_id, kind, amount, date, description, category_id, account_id, card_id,
                 fixed_expense_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                builder.kind,
                amount,
                builder.date,
                description,
                builder.category_id,
                builder.account_id,
                builder.card_id,
                builder.fixed_expense_id,
                OffsetDateTime::now_utc(),
            ),
            map_transaction_row,
        )?;

    if let Some(account_id) = transaction.account_id {
        apply_balance_delta(account_id, transaction.kind.balance_delta(amount), connection)?;
    }

    Ok(transaction)
}

/// Create a new transaction for `user_id` from a builder.
///
/// If the transaction is linked to an account, the account balance moves by the signed amount
/// in the same SQL transaction.
///
/// # Errors
///
/// See [insert_transaction].
pub fn create_transaction(
    builder: TransactionBuilder,
    user_id: UserID,
    connection: &mut Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.transaction()?;
    let transaction = insert_transaction(builder, user_id, &sql_transaction)?;
    sql_transaction.commit()?;

    Ok(transaction)
}

/// Retrieve the transaction `id` recorded by `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_transaction_row)?;

    Ok(transaction)
}

/// Delete the transaction `id` recorded by `user_id` and undo its effect on the account
/// balance.
///
/// # Errors
///
/// Returns [Error::NotFound] if `id` does not refer to a transaction of `user_id`.
pub fn delete_transaction(
    id: TransactionId,
    user_id: UserID,
    connection: &mut Connection,
) -> Result<(), Error> {
    let sql_transaction = connection.transaction()?;
    let transaction = get_transaction(id, user_id, &sql_transaction)?;

    sql_transaction.execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))?;

    if let Some(account_id) = transaction.account_id {
        let amount = to_cents(transaction.amount)?;
        apply_balance_delta(
            account_id,
            -transaction.kind.balance_delta(amount),
            &sql_transaction,
        )?;
    }

    sql_transaction.commit()?;

    Ok(())
}

/// Get the number of transactions recorded by `user_id`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1",
            (user_id.as_i64(),),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

// ============================================================================
// TESTS
// ============================================================================

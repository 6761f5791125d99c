//! Defines the bank account model and the database queries that keep account balances in step
//! with the transactions posted against them.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    database_id::AccountId,
    money::{from_cents, get_amount, require_non_negative, to_cents},
};

// ============================================================================
// MODELS
// ============================================================================

/// The kind of bank account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// An everyday transaction account.
    Checking,
    /// A savings account.
    Savings,
    /// An investment account.
    Investment,
}

impl AccountType {
    fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Investment => "investment",
        }
    }
}

impl Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for AccountType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AccountType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            "investment" => Ok(AccountType::Investment),
            other => Err(FromSqlError::Other(
                format!("invalid account type {other}").into(),
            )),
        }
    }
}

/// A bank account owned by a user.
///
/// `current_balance` always equals `initial_balance` plus the signed amounts of the
/// transactions that reference the account.
///
/// To create a new `Account`, use [Account::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The ID of the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub user_id: UserID,
    /// The name of the bank, e.g. "Nubank".
    pub bank_name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// The balance when the account was added.
    pub initial_balance: Decimal,
    /// The balance after the transactions recorded so far.
    pub current_balance: Decimal,
}

impl Account {
    /// Create a new account.
    ///
    /// Shortcut for [AccountBuilder] for discoverability.
    pub fn build(
        bank_name: &str,
        account_type: AccountType,
        initial_balance: Decimal,
    ) -> AccountBuilder {
        AccountBuilder {
            bank_name: bank_name.to_owned(),
            account_type,
            initial_balance,
        }
    }
}

/// A builder for creating [Account] instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBuilder {
    /// The name of the bank.
    pub bank_name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// The opening balance, which must not be negative.
    pub initial_balance: Decimal,
}

/// Changes to an account. Fields set to `None` are left unchanged.
///
/// The balances can only change through transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// The new name of the bank.
    pub bank_name: Option<String>,
    /// The new kind of account.
    pub account_type: Option<AccountType>,
}

fn validate_bank_name(bank_name: &str) -> Result<String, Error> {
    let bank_name = bank_name.trim();

    if bank_name.is_empty() || bank_name.chars().count() > 120 {
        return Err(Error::Validation(
            "bank_name must be between 1 and 120 characters".to_owned(),
        ));
    }

    Ok(bank_name.to_owned())
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the account table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            bank_name TEXT NOT NULL,
            account_type TEXT NOT NULL,
            initial_balance INTEGER NOT NULL,
            current_balance INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_user ON account(user_id);",
        (),
    )?;

    Ok(())
}

const ACCOUNT_COLUMNS: &str =
    "id, user_id, bank_name, account_type, initial_balance, current_balance";

/// Map a database row to an [Account].
pub fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        bank_name: row.get(2)?,
        account_type: row.get(3)?,
        initial_balance: get_amount(row, 4)?,
        current_balance: get_amount(row, 5)?,
    })
}

/// Create a new account for `user_id`. The current balance starts at the initial balance.
///
/// # Errors
///
/// Returns [Error::Validation] if the bank name is empty or too long or the initial balance
/// is negative or has more than two decimal places.
pub fn create_account(
    builder: AccountBuilder,
    user_id: UserID,
    connection: &Connection,
) -> Result<Account, Error> {
    let bank_name = validate_bank_name(&builder.bank_name)?;
    require_non_negative(builder.initial_balance, "initial_balance")?;
    let initial_balance = to_cents(builder.initial_balance)?;

    connection
        .prepare(&format!(
            "INSERT INTO account (user_id, bank_name, account_type, initial_balance, current_balance)
             VALUES (?1, ?2, ?3, ?4, ?4)
             RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                bank_name,
                builder.account_type,
                initial_balance,
            ),
            map_account_row,
        )
        .map_err(|error| error.into())
}

/// Get the account `id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account does not exist or belongs to another user.
pub fn get_account(
    id: AccountId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_account_row)
        .map_err(|error| error.into())
}

/// Get the accounts owned by any of `user_ids`, ordered by ID.
pub fn get_accounts(user_ids: &[UserID], connection: &Connection) -> Result<Vec<Account>, Error> {
    let placeholders = vec!["?"; user_ids.len()].join(", ");
    let params = user_ids.iter().map(UserID::as_i64);

    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE user_id IN ({placeholders}) ORDER BY id"
        ))?
        .query_map(rusqlite::params_from_iter(params), map_account_row)?
        .map(|account_result| account_result.map_err(Error::SqlError))
        .collect()
}

/// Change the bank name or account type of the account `id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account does not exist or belongs to another user.
pub fn update_account(
    id: AccountId,
    user_id: UserID,
    update: AccountUpdate,
    connection: &Connection,
) -> Result<Account, Error> {
    let bank_name = update
        .bank_name
        .map(|bank_name| validate_bank_name(&bank_name))
        .transpose()?;

    connection
        .prepare(&format!(
            "UPDATE account SET
                bank_name = COALESCE(?1, bank_name),
                account_type = COALESCE(?2, account_type)
             WHERE id = ?3 AND user_id = ?4
             RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            (bank_name, update.account_type, id, user_id.as_i64()),
            map_account_row,
        )
        .map_err(|error| error.into())
}

/// Delete the account `id` owned by `user_id`.
///
/// Transactions and fixed expenses that reference the account keep existing without an
/// account.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account does not exist or belongs to another user.
pub fn delete_account(
    id: AccountId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM account WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Check that the account `id` exists and belongs to `user_id`.
///
/// # Errors
///
/// Returns [Error::InvalidReference] naming `account_id` otherwise.
pub fn check_account_owner(
    id: AccountId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let is_owner: bool = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM account WHERE id = ?1 AND user_id = ?2)",
        (id, user_id.as_i64()),
        |row| row.get(0),
    )?;

    if !is_owner {
        return Err(Error::InvalidReference("account_id".to_owned()));
    }

    Ok(())
}

/// Add `delta_cents` to the current balance of account `id` and return the new balance.
///
/// This is the only way an account balance changes. Callers run it in the same SQL
/// transaction as the insert or delete of the transaction that causes the change.
///
/// # Errors
///
/// Returns [Error::NotFound] if the account does not exist.
pub fn apply_balance_delta(
    id: AccountId,
    delta_cents: i64,
    connection: &Connection,
) -> Result<Decimal, Error> {
    connection
        .query_row(
            "UPDATE account SET current_balance = current_balance + ?1
             WHERE id = ?2
             RETURNING current_balance",
            (delta_cents, id),
            |row| row.get(0).map(from_cents),
        )
        .map_err(|error| error.into())
}

/// Get the sum of the current balances of the accounts owned by `user_id`.
pub fn get_total_balance(user_id: UserID, connection: &Connection) -> Result<Decimal, Error> {
    connection
        .query_row(
            "SELECT COALESCE(SUM(current_balance), 0) FROM account WHERE user_id = ?1",
            (user_id.as_i64(),),
            |row| row.get(0).map(from_cents),
        )
        .map_err(|error| error.into())
}

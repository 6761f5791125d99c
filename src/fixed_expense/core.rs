//! Recurring expenses and the database queries that manage them.

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, UserID,
    database_id::{AccountId, CardId, CategoryId, FixedExpenseId},
    money::{get_amount, require_positive, to_cents},
    transaction::check_references,
};

/// Whether a fixed expense is still posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedExpenseStatus {
    /// Posted on its due day and shown in the upcoming preview.
    Active,
    /// Kept for reference, never posted.
    Inactive,
}

impl ToSql for FixedExpenseStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let status = match self {
            FixedExpenseStatus::Active => "active",
            FixedExpenseStatus::Inactive => "inactive",
        };

        Ok(ToSqlOutput::from(status))
    }
}

impl FromSql for FixedExpenseStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "active" => Ok(FixedExpenseStatus::Active),
            "inactive" => Ok(FixedExpenseStatus::Inactive),
            other => Err(FromSqlError::Other(
                format!("invalid fixed expense status {other}").into(),
            )),
        }
    }
}

/// An expense that repeats every month on the same day, e.g. rent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedExpense {
    /// The ID of the fixed expense.
    pub id: FixedExpenseId,
    /// The user that owns the fixed expense.
    pub user_id: UserID,
    /// What the expense is for. Copied to the generated transactions.
    pub description: String,
    /// The amount posted each month.
    pub amount: Decimal,
    /// The category of the generated transactions.
    pub category_id: CategoryId,
    /// The account the generated transactions are paid from.
    pub account_id: Option<AccountId>,
    /// The card the generated transactions are paid with.
    pub card_id: Option<CardId>,
    /// The day of the month the expense is due, from 1 to 31.
    pub due_day: u8,
    /// The first day the expense may be posted.
    pub start_date: Date,
    /// The last day the expense may be posted.
    pub end_date: Option<Date>,
    /// Inactive expenses are never posted.
    pub status: FixedExpenseStatus,
    /// Whether the expense shows up in the upcoming preview.
    pub reminder_enabled: bool,
    /// The date of the last generated transaction.
    pub last_posted_date: Option<Date>,
}

/// The data for creating a fixed expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedExpenseBuilder {
    /// What the expense is for.
    pub description: String,
    /// The amount posted each month.
    pub amount: Decimal,
    /// The day of the month the expense is due.
    pub due_day: u8,
    /// The category of the generated transactions.
    pub category_id: CategoryId,
    /// The account the generated transactions are paid from.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// The card the generated transactions are paid with.
    #[serde(default)]
    pub card_id: Option<CardId>,
    /// Defaults to the day the expense is created.
    #[serde(default)]
    pub start_date: Option<Date>,
    /// The last day the expense may be posted.
    #[serde(default)]
    pub end_date: Option<Date>,
    /// Defaults to `true`.
    #[serde(default)]
    pub reminder_enabled: Option<bool>,
}

/// A partial update of a fixed expense. Missing fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedExpenseUpdate {
    /// The new description.
    pub description: Option<String>,
    /// The new monthly amount.
    pub amount: Option<Decimal>,
    /// The new due day.
    pub due_day: Option<u8>,
    /// The new category.
    pub category_id: Option<CategoryId>,
    /// The new account.
    pub account_id: Option<AccountId>,
    /// The new card.
    pub card_id: Option<CardId>,
    /// The new start date.
    pub start_date: Option<Date>,
    /// The new end date.
    pub end_date: Option<Date>,
    /// Pause or resume the expense.
    pub status: Option<FixedExpenseStatus>,
    /// Show or hide the expense in the upcoming preview.
    pub reminder_enabled: Option<bool>,
}

const MAX_DESCRIPTION_LENGTH: usize = 255;

fn validate_description(description: &str) -> Result<String, Error> {
    let description = description.trim();

    if description.is_empty() {
        return Err(Error::Validation("description cannot be empty".to_owned()));
    }

    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(Error::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }

    Ok(description.to_owned())
}

/// Check the fields of `expense` that do not depend on other records.
fn validate(expense: &FixedExpense) -> Result<(), Error> {
    require_positive(expense.amount, "amount")?;
    to_cents(expense.amount)?;

    if !(1..=31).contains(&expense.due_day) {
        return Err(Error::Validation(
            "due_day must be between 1 and 31".to_owned(),
        ));
    }

    if expense
        .end_date
        .is_some_and(|end_date| end_date < expense.start_date)
    {
        return Err(Error::Validation(
            "end_date cannot be before start_date".to_owned(),
        ));
    }

    Ok(())
}

/// Create the fixed expense table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_fixed_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS fixed_expense (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            description TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            category_id INTEGER NOT NULL,
            account_id INTEGER,
            card_id INTEGER,
            due_day INTEGER NOT NULL CHECK (due_day BETWEEN 1 AND 31),
            start_date TEXT NOT NULL,
            end_date TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            reminder_enabled INTEGER NOT NULL DEFAULT 1,
            last_posted_date TEXT,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE SET NULL,
            FOREIGN KEY(card_id) REFERENCES card(id) ON UPDATE CASCADE ON DELETE SET NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_fixed_expense_user_due ON fixed_expense(user_id, due_day)",
        (),
    )?;

    Ok(())
}

pub(crate) const FIXED_EXPENSE_COLUMNS: &str = "id, user_id, description, amount, category_id, \
    account_id, card_id, due_day, start_date, end_date, status, reminder_enabled, last_posted_date";

pub(crate) fn map_fixed_expense_row(row: &Row) -> Result<FixedExpense, rusqlite::Error> {
    Ok(FixedExpense {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        description: row.get(2)?,
        amount: get_amount(row, 3)?,
        category_id: row.get(4)?,
        account_id: row.get(5)?,
        card_id: row.get(6)?,
        due_day: row.get(7)?,
        start_date: row.get(8)?,
        end_date: row.get(9)?,
        status: row.get(10)?,
        reminder_enabled: row.get(11)?,
        last_posted_date: row.get(12)?,
    })
}

/// Create a fixed expense for `user_id`.
///
/// `today` is used as the start date when the builder does not set one.
///
/// # Errors
///
/// Returns:
/// - [Error::Validation] if a field is out of range,
/// - [Error::InvalidReference] if the category, account or card cannot be used by `user_id`.
pub fn create_fixed_expense(
    builder: FixedExpenseBuilder,
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<FixedExpense, Error> {
    let expense = FixedExpense {
        id: 0,
        user_id,
        description: validate_description(&builder.description)?,
        amount: builder.amount,
        category_id: builder.category_id,
        account_id: builder.account_id,
        card_id: builder.card_id,
        due_day: builder.due_day,
        start_date: builder.start_date.unwrap_or(today),
        end_date: builder.end_date,
        status: FixedExpenseStatus::Active,
        reminder_enabled: builder.reminder_enabled.unwrap_or(true),
        last_posted_date: None,
    };
    validate(&expense)?;
    check_references(
        Some(expense.category_id),
        expense.account_id,
        expense.card_id,
        user_id,
        connection,
    )?;

    connection
        .prepare(&format!(
            "INSERT INTO fixed_expense
                (user_id, description, amount, category_id, account_id, card_id, due_day,
                 start_date, end_date, status, reminder_enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             RETURNING {FIXED_EXPENSE_COLUMNS}"
        ))?
        .query_row(
            rusqlite::params![
                user_id.as_i64(),
                expense.description,
                to_cents(expense.amount)?,
                expense.category_id,
                expense.account_id,
                expense.card_id,
                expense.due_day,
                expense.start_date,
                expense.end_date,
                expense.status,
                expense.reminder_enabled,
            ],
            map_fixed_expense_row,
        )
        .map_err(|error| error.into())
}

/// Get the fixed expense `id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the fixed expense does not exist or belongs to another user.
pub fn get_fixed_expense(
    id: FixedExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<FixedExpense, Error> {
    connection
        .prepare(&format!(
            "SELECT {FIXED_EXPENSE_COLUMNS} FROM fixed_expense WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_fixed_expense_row)
        .map_err(|error| error.into())
}

/// Get the fixed expenses owned by `user_id`, ordered by due day.
pub fn get_fixed_expenses(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<FixedExpense>, Error> {
    connection
        .prepare(&format!(
            "SELECT {FIXED_EXPENSE_COLUMNS} FROM fixed_expense WHERE user_id = ?1
             ORDER BY due_day, id"
        ))?
        .query_map((user_id.as_i64(),), map_fixed_expense_row)?
        .map(|expense_result| expense_result.map_err(Error::SqlError))
        .collect()
}

/// Apply `update` to the fixed expense `id` owned by `user_id`.
///
/// # Errors
///
/// Returns:
/// - [Error::NotFound] if the fixed expense does not exist or belongs to another user,
/// - [Error::Validation] if the updated expense is invalid, e.g. ends before it starts,
/// - [Error::InvalidReference] if a new category, account or card cannot be used.
pub fn update_fixed_expense(
    id: FixedExpenseId,
    user_id: UserID,
    update: FixedExpenseUpdate,
    connection: &Connection,
) -> Result<FixedExpense, Error> {
    let mut expense = get_fixed_expense(id, user_id, connection)?;

    if let Some(description) = update.description {
        expense.description = validate_description(&description)?;
    }
    expense.amount = update.amount.unwrap_or(expense.amount);
    expense.due_day = update.due_day.unwrap_or(expense.due_day);
    expense.category_id = update.category_id.unwrap_or(expense.category_id);
    expense.account_id = update.account_id.or(expense.account_id);
    expense.card_id = update.card_id.or(expense.card_id);
    expense.start_date = update.start_date.unwrap_or(expense.start_date);
    expense.end_date = update.end_date.or(expense.end_date);
    expense.status = update.status.unwrap_or(expense.status);
    expense.reminder_enabled = update.reminder_enabled.unwrap_or(expense.reminder_enabled);

    validate(&expense)?;
    check_references(
        update.category_id,
        update.account_id,
        update.card_id,
        user_id,
        connection,
    )?;

    connection
        .prepare(&format!(
            "UPDATE fixed_expense SET
                description = ?1, amount = ?2, category_id = ?3, account_id = ?4, card_id = ?5,
                due_day = ?6, start_date = ?7, end_date = ?8, status = ?9, reminder_enabled = ?10
             WHERE id = ?11 AND user_id = ?12
             RETURNING {FIXED_EXPENSE_COLUMNS}"
        ))?
        .query_row(
            rusqlite::params![
                expense.description,
                to_cents(expense.amount)?,
                expense.category_id,
                expense.account_id,
                expense.card_id,
                expense.due_day,
                expense.start_date,
                expense.end_date,
                expense.status,
                expense.reminder_enabled,
                id,
                user_id.as_i64(),
            ],
            map_fixed_expense_row,
        )
        .map_err(|error| error.into())
}

/// Delete the fixed expense `id` owned by `user_id`.
///
/// Transactions it generated keep existing without the link.
///
/// # Errors
///
/// Returns [Error::NotFound] if the fixed expense does not exist or belongs to another user.
pub fn delete_fixed_expense(
    id: FixedExpenseId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM fixed_expense WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

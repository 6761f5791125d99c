//! Defines the credit card model and its database queries.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    database_id::CardId,
    money::{get_amount, require_non_negative, to_cents},
};

/// A credit card owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// The ID of the card.
    pub id: CardId,
    /// The user that owns the card.
    pub user_id: UserID,
    /// A name for the card, e.g. "Travel card".
    pub name: String,
    /// The card network, e.g. "Visa".
    pub brand: String,
    /// The credit limit.
    pub limit: Decimal,
    /// The day of the month the statement closes, 1 to 28.
    pub closing_day: u8,
    /// The day of the month the bill is due, 1 to 31.
    pub due_day: u8,
}

/// The data needed to create a [Card].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCard {
    /// A name for the card.
    pub name: String,
    /// The card network.
    pub brand: String,
    /// The credit limit, which must not be negative.
    pub limit: Decimal,
    /// The day of the month the statement closes.
    pub closing_day: u8,
    /// The day of the month the bill is due.
    pub due_day: u8,
}

/// Changes to a card. Fields set to `None` are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardUpdate {
    /// The new name.
    pub name: Option<String>,
    /// The new card network.
    pub brand: Option<String>,
    /// The new credit limit.
    pub limit: Option<Decimal>,
    /// The new closing day.
    pub closing_day: Option<u8>,
    /// The new due day.
    pub due_day: Option<u8>,
}

fn validate_text(value: &str, field: &str) -> Result<String, Error> {
    let value = value.trim();

    if value.is_empty() || value.chars().count() > 120 {
        return Err(Error::Validation(format!(
            "{field} must be between 1 and 120 characters"
        )));
    }

    Ok(value.to_owned())
}

fn validate_closing_day(day: u8) -> Result<u8, Error> {
    if !(1..=28).contains(&day) {
        return Err(Error::Validation(
            "closing_day must be between 1 and 28".to_owned(),
        ));
    }

    Ok(day)
}

fn validate_due_day(day: u8) -> Result<u8, Error> {
    if !(1..=31).contains(&day) {
        return Err(Error::Validation("due_day must be between 1 and 31".to_owned()));
    }

    Ok(day)
}

fn validate_limit(limit: Decimal) -> Result<i64, Error> {
    require_non_negative(limit, "limit")?;
    to_cents(limit)
}

/// Create the card table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_card_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS card (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            brand TEXT NOT NULL,
            credit_limit INTEGER NOT NULL,
            closing_day INTEGER NOT NULL CHECK (closing_day BETWEEN 1 AND 28),
            due_day INTEGER NOT NULL CHECK (due_day BETWEEN 1 AND 31),
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

const CARD_COLUMNS: &str = "id, user_id, name, brand, credit_limit, closing_day, due_day";

fn map_card_row(row: &Row) -> Result<Card, rusqlite::Error> {
    Ok(Card {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        brand: row.get(3)?,
        limit: get_amount(row, 4)?,
        closing_day: row.get(5)?,
        due_day: row.get(6)?,
    })
}

/// Create a new card for `user_id`.
///
/// # Errors
///
/// Returns [Error::Validation] if a field is out of range.
pub fn create_card(
    new_card: NewCard,
    user_id: UserID,
    connection: &Connection,
) -> Result<Card, Error> {
    let name = validate_text(&new_card.name, "name")?;
    let brand = validate_text(&new_card.brand, "brand")?;
    let limit = validate_limit(new_card.limit)?;
    let closing_day = validate_closing_day(new_card.closing_day)?;
    let due_day = validate_due_day(new_card.due_day)?;

    connection
        .prepare(&format!(
            "INSERT INTO card (user_id, name, brand, credit_limit, closing_day, due_day)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {CARD_COLUMNS}"
        ))?
        .query_row(
            (user_id.as_i64(), name, brand, limit, closing_day, due_day),
            map_card_row,
        )
        .map_err(|error| error.into())
}

/// Get the card `id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the card does not exist or belongs to another user.
pub fn get_card(id: CardId, user_id: UserID, connection: &Connection) -> Result<Card, Error> {
    connection
        .prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM card WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((id, user_id.as_i64()), map_card_row)
        .map_err(|error| error.into())
}

/// Get the cards owned by `user_id`, ordered by ID.
pub fn get_cards(user_id: UserID, connection: &Connection) -> Result<Vec<Card>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM card WHERE user_id = ?1 ORDER BY id"
        ))?
        .query_map((user_id.as_i64(),), map_card_row)?
        .map(|card_result| card_result.map_err(Error::SqlError))
        .collect()
}

/// Apply `update` to the card `id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the card does not exist or belongs to another user, or
/// [Error::Validation] if a new value is out of range.
pub fn update_card(
    id: CardId,
    user_id: UserID,
    update: CardUpdate,
    connection: &Connection,
) -> Result<Card, Error> {
    let name = update
        .name
        .map(|name| validate_text(&name, "name"))
        .transpose()?;
    let brand = update
        .brand
        .map(|brand| validate_text(&brand, "brand"))
        .transpose()?;
    let limit = update.limit.map(validate_limit).transpose()?;
    let closing_day = update.closing_day.map(validate_closing_day).transpose()?;
    let due_day = update.due_day.map(validate_due_day).transpose()?;

    connection
        .prepare(&format!(
            "UPDATE card SET
                name = COALESCE(?1, name),
                brand = COALESCE(?2, brand),
                credit_limit = COALESCE(?3, credit_limit),
                closing_day = COALESCE(?4, closing_day),
                due_day = COALESCE(?5, due_day)
             WHERE id = ?6 AND user_id = ?7
             RETURNING {CARD_COLUMNS}"
        ))?
        .query_row(
            (
                name,
                brand,
                limit,
                closing_day,
                due_day,
                id,
                user_id.as_i64(),
            ),
            map_card_row,
        )
        .map_err(|error| error.into())
}

/// Delete the card `id` owned by `user_id`.
///
/// Transactions and fixed expenses that reference the card keep existing without a card.
///
/// # Errors
///
/// Returns [Error::NotFound] if the card does not exist or belongs to another user.
pub fn delete_card(id: CardId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM card WHERE id = ?1 AND user_id = ?2",
        (id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Check that the card `id` exists and belongs to `user_id`.
///
/// # Errors
///
/// Returns [Error::InvalidReference] naming `card_id` otherwise.
pub fn check_card_owner(id: CardId, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let is_owner: bool = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM card WHERE id = ?1 AND user_id = ?2)",
        (id, user_id.as_i64()),
        |row| row.get(0),
    )?;

    if !is_owner {
        return Err(Error::InvalidReference("card_id".to_owned()));
    }

    Ok(())
}

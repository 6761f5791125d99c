//! Defines the `Category` type and the database queries for categories.
//!
//! A category is either owned by a user or global. Global categories are visible to every
//! user and cannot be changed through the API.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, UserID, database_id::CategoryId};

/// Whether a category is for money coming in or going out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Money earned, e.g. "Salary".
    Income,
    /// Money spent, e.g. "Groceries".
    Expense,
}

impl CategoryKind {
    fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }
}

impl ToSql for CategoryKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CategoryKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(FromSqlError::Other(
                format!("invalid category kind {other}").into(),
            )),
        }
    }
}

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// This function will return an error if `name` is empty or longer than 120 characters.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() || name.chars().count() > 120 {
            Err(Error::Validation(
                "name must be between 1 and 120 characters".to_owned(),
            ))
        } else {
            Ok(Self(name.to_owned()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category for expenses and income, e.g., 'Groceries', 'Eating Out', 'Wages'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// The id of the category.
    pub id: CategoryId,
    /// The owner of the category, `None` for global categories.
    pub user_id: Option<UserID>,
    /// The name of the category.
    pub name: CategoryName,
    /// Whether the category is for income or expenses.
    pub kind: CategoryKind,
}

/// The data needed to create a [Category].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    /// The name of the category.
    pub name: String,
    /// Whether the category is for income or expenses.
    pub kind: CategoryKind,
}

/// Changes to a category. Fields set to `None` are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    /// The new name.
    pub name: Option<String>,
    /// The new kind.
    pub kind: Option<CategoryKind>,
}

/// Create the category table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            user_id INTEGER,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

const CATEGORY_COLUMNS: &str = "id, user_id, name, kind";

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let user_id: Option<i64> = row.get(1)?;
    let name: String = row.get(2)?;

    Ok(Category {
        id: row.get(0)?,
        user_id: user_id.map(UserID::new),
        name: CategoryName::new_unchecked(&name),
        kind: row.get(3)?,
    })
}

/// Create a category owned by `owner`, or a global category when `owner` is `None`.
///
/// # Errors
///
/// Returns [Error::Validation] if the name is empty or too long.
pub fn create_category(
    new_category: NewCategory,
    owner: Option<UserID>,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = CategoryName::new(&new_category.name)?;

    connection
        .prepare(&format!(
            "INSERT INTO category (user_id, name, kind) VALUES (?1, ?2, ?3)
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row(
            (
                owner.map(|user_id| user_id.as_i64()),
                name.as_ref(),
                new_category.kind,
            ),
            map_category_row,
        )
        .map_err(|error| error.into())
}

/// Get the category `id` if it is global or owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the category does not exist or belongs to another user.
pub fn get_category(
    id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category
             WHERE id = ?1 AND (user_id IS NULL OR user_id = ?2)"
        ))?
        .query_row((id, user_id.as_i64()), map_category_row)
        .map_err(|error| error.into())
}

/// Get the global categories and the categories owned by `user_id`, ordered by name.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category
             WHERE user_id IS NULL OR user_id = ?1
             ORDER BY name COLLATE NOCASE, id"
        ))?
        .query_map((user_id.as_i64(),), map_category_row)?
        .map(|category_result| category_result.map_err(Error::SqlError))
        .collect()
}

/// Apply `update` to the category `id` owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the category does not exist, is global or belongs to another
/// user.
pub fn update_category(
    id: CategoryId,
    user_id: UserID,
    update: CategoryUpdate,
    connection: &Connection,
) -> Result<Category, Error> {
    let name = update
        .name
        .map(|name| CategoryName::new(&name))
        .transpose()?;

    connection
        .prepare(&format!(
            "UPDATE category SET
                name = COALESCE(?1, name),
                kind = COALESCE(?2, kind)
             WHERE id = ?3 AND user_id = ?4
             RETURNING {CATEGORY_COLUMNS}"
        ))?
        .query_row(
            (
                name.as_ref().map(|name| name.as_ref()),
                update.kind,
                id,
                user_id.as_i64(),
            ),
            map_category_row,
        )
        .map_err(|error| error.into())
}

/// Delete the category `id` owned by `user_id`.
///
/// # Errors
///
/// Returns:
/// - [Error::NotFound] if the category does not exist, is global or belongs to another user,
/// - [Error::CategoryInUse] if a transaction or fixed expense still uses the category.
pub fn delete_category(
    id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let is_owner: bool = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM category WHERE id = ?1 AND user_id = ?2)",
        (id, user_id.as_i64()),
        |row| row.get(0),
    )?;
    if !is_owner {
        return Err(Error::NotFound);
    }

    let is_in_use: bool = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM \"transaction\" WHERE category_id = ?1)
             OR EXISTS(SELECT 1 FROM fixed_expense WHERE category_id = ?1)",
        (id,),
        |row| row.get(0),
    )?;
    if is_in_use {
        return Err(Error::CategoryInUse);
    }

    connection
        .execute("DELETE FROM category WHERE id = ?1", (id,))
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::CategoryInUse,
            error => error.into(),
        })?;

    Ok(())
}

/// Check that the category `id` exists and is global or owned by `user_id`.
///
/// # Errors
///
/// Returns [Error::InvalidReference] naming `category_id` otherwise.
pub fn check_category_visible(
    id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let is_visible: bool = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM category WHERE id = ?1 AND (user_id IS NULL OR user_id = ?2))",
        (id, user_id.as_i64()),
        |row| row.get(0),
    )?;

    if !is_visible {
        return Err(Error::InvalidReference("category_id".to_owned()));
    }

    Ok(())
}

#[cfg(test)]
mod category_tests {
    use rusqlite::Connection;

    use crate::{
        Error, NewUser, UserID,
        category::core::{
            CategoryKind, CategoryName, CategoryUpdate, NewCategory, check_category_visible,
            create_category, delete_category, get_categories, get_category, update_category,
        },
        db::initialize,
        user::create_user,
    };

    fn get_test_connection() -> (Connection, UserID, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let mut user_ids = Vec::new();

        for email in ["alice@example.com", "bob@example.com"] {
            let user = create_user(
                NewUser {
                    first_name: "Test".to_owned(),
                    last_name: "User".to_owned(),
                    email: email.to_owned(),
                    password_hash: None,
                },
                &connection,
            )
            .unwrap();
            user_ids.push(user.id);
        }

        (connection, user_ids[0], user_ids[1])
    }

    fn new_category(name: &str, kind: CategoryKind) -> NewCategory {
        NewCategory {
            name: name.to_owned(),
            kind,
        }
    }

    #[test]
    fn category_name_rejects_empty_string() {
        assert!(matches!(CategoryName::new("  "), Err(Error::Validation(_))));
    }

    #[test]
    fn category_name_rejects_long_string() {
        let name = "a".repeat(121);

        assert!(matches!(CategoryName::new(&name), Err(Error::Validation(_))));
    }

    #[test]
    fn list_includes_global_and_own_categories() {
        let (connection, alice, bob) = get_test_connection();
        create_category(
            new_category("Salary", CategoryKind::Income),
            None,
            &connection,
        )
        .unwrap();
        create_category(
            new_category("Groceries", CategoryKind::Expense),
            Some(alice),
            &connection,
        )
        .unwrap();
        create_category(
            new_category("Hobbies", CategoryKind::Expense),
            Some(bob),
            &connection,
        )
        .unwrap();

        let names: Vec<String> = get_categories(alice, &connection)
            .unwrap()
            .into_iter()
            .map(|category| category.name.to_string())
            .collect();

        assert_eq!(names, vec!["Groceries", "Salary"]);
    }

    #[test]
    fn global_category_is_read_only() {
        let (connection, alice, _) = get_test_connection();
        let global = create_category(
            new_category("Salary", CategoryKind::Income),
            None,
            &connection,
        )
        .unwrap();

        assert_eq!(get_category(global.id, alice, &connection), Ok(global.clone()));
        assert_eq!(
            update_category(
                global.id,
                alice,
                CategoryUpdate {
                    name: Some("Mine".to_owned()),
                    kind: None,
                },
                &connection,
            ),
            Err(Error::NotFound)
        );
        assert_eq!(
            delete_category(global.id, alice, &connection),
            Err(Error::NotFound)
        );
        assert_eq!(check_category_visible(global.id, alice, &connection), Ok(()));
    }

    #[test]
    fn other_users_category_is_not_visible() {
        let (connection, alice, bob) = get_test_connection();
        let category = create_category(
            new_category("Groceries", CategoryKind::Expense),
            Some(alice),
            &connection,
        )
        .unwrap();

        assert_eq!(
            get_category(category.id, bob, &connection),
            Err(Error::NotFound)
        );
        assert_eq!(
            check_category_visible(category.id, bob, &connection),
            Err(Error::InvalidReference("category_id".to_owned()))
        );
    }

    #[test]
    fn update_changes_name() {
        let (connection, alice, _) = get_test_connection();
        let category = create_category(
            new_category("Groceries", CategoryKind::Expense),
            Some(alice),
            &connection,
        )
        .unwrap();

        let updated = update_category(
            category.id,
            alice,
            CategoryUpdate {
                name: Some("Food".to_owned()),
                kind: None,
            },
            &connection,
        )
        .unwrap();

        assert_eq!(updated.name, CategoryName::new_unchecked("Food"));
        assert_eq!(updated.kind, CategoryKind::Expense);
    }

    #[test]
    fn delete_unused_category_succeeds() {
        let (connection, alice, _) = get_test_connection();
        let category = create_category(
            new_category("Groceries", CategoryKind::Expense),
            Some(alice),
            &connection,
        )
        .unwrap();

        assert_eq!(delete_category(category.id, alice, &connection), Ok(()));
        assert_eq!(
            get_category(category.id, alice, &connection),
            Err(Error::NotFound)
        );
    }
}

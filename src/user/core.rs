//! Code for creating the user table and fetching and updating users in the database.

use std::fmt::Display;

use email_address::EmailAddress;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash, PartialOrd, Ord)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// The user's email address, trimmed and lowercased.
    pub email: String,
    /// The user's password hash, `None` for users that never set a password.
    #[serde(skip)]
    pub password_hash: Option<PasswordHash>,
    /// How the user signs in, e.g. "email".
    pub provider: String,
    /// Inactive users cannot log in.
    pub is_active: bool,
    /// Whether the user confirmed their email address with a verification code.
    pub email_verified: bool,
    /// When the user registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the user last logged in.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    /// When the user's profile was last changed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// The data needed to register a new user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// The user's email address. It is normalised before it is stored.
    pub email: String,
    /// The user's password hash.
    pub password_hash: Option<PasswordHash>,
}

/// Changes to a user's profile. Fields set to `None` are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserUpdate {
    /// The new given name.
    pub first_name: Option<String>,
    /// The new family name.
    pub last_name: Option<String>,
    /// The new email address.
    pub email: Option<String>,
}

/// Trim and lowercase `email` so that lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalise `email` and check that it is a valid email address.
///
/// # Errors
///
/// Returns [Error::Validation] if the address is not valid.
pub fn validate_email(email: &str) -> Result<String, Error> {
    let email = normalize_email(email);

    if EmailAddress::is_valid(&email) {
        Ok(email)
    } else {
        Err(Error::Validation(format!("{email} is not a valid email address")))
    }
}

fn validate_name(name: &str, field: &str) -> Result<String, Error> {
    let name = name.trim();

    if name.is_empty() || name.chars().count() > 120 {
        return Err(Error::Validation(format!(
            "{field} must be between 1 and 120 characters"
        )));
    }

    Ok(name.to_owned())
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password TEXT,
                provider TEXT NOT NULL DEFAULT 'email',
                is_active INTEGER NOT NULL DEFAULT 1,
                email_verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_login TEXT,
                updated_at TEXT
                )",
        (),
    )?;

    Ok(())
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, password, provider, is_active, \
    email_verified, created_at, last_login, updated_at";

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: Option<String> = row.get(4)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        password_hash: raw_password_hash.map(|hash| PasswordHash::new_unchecked(&hash)),
        provider: row.get(5)?,
        is_active: row.get(6)?,
        email_verified: row.get(7)?,
        created_at: row.get(8)?,
        last_login: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns:
/// - [Error::Validation] if the names or email are invalid,
/// - [Error::DuplicateEmail] if the email is already registered,
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let first_name = validate_name(&new_user.first_name, "first_name")?;
    let last_name = validate_name(&new_user.last_name, "last_name")?;
    let email = validate_email(&new_user.email)?;

    connection
        .prepare(&format!(
            "INSERT INTO user (first_name, last_name, email, password, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING {USER_COLUMNS}"
        ))?
        .query_row(
            (
                first_name,
                last_name,
                email,
                new_user.password_hash.as_ref().map(|hash| hash.as_ref()),
                OffsetDateTime::now_utc(),
            ),
            map_user_row,
        )
        .map_err(|error| error.into())
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user registered with `email`. The email is normalised before the lookup.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the email.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("SELECT {USER_COLUMNS} FROM user WHERE email = :email"))?
        .query_row(&[(":email", &normalize_email(email))], map_user_row)
        .map_err(|error| error.into())
}

/// Apply `update` to the profile of `user_id` and return the updated user.
///
/// # Errors
///
/// Returns:
/// - [Error::Validation] if a new name or email is invalid,
/// - [Error::DuplicateEmail] if the new email belongs to another user,
/// - [Error::NotFound] if the user does not exist.
pub fn update_user_profile(
    user_id: UserID,
    update: UserUpdate,
    connection: &Connection,
) -> Result<User, Error> {
    let first_name = update
        .first_name
        .map(|name| validate_name(&name, "first_name"))
        .transpose()?;
    let last_name = update
        .last_name
        .map(|name| validate_name(&name, "last_name"))
        .transpose()?;
    let email = update
        .email
        .map(|email| validate_email(&email))
        .transpose()?;

    connection
        .prepare(&format!(
            "UPDATE user SET
                first_name = COALESCE(?1, first_name),
                last_name = COALESCE(?2, last_name),
                email = COALESCE(?3, email),
                updated_at = ?4
             WHERE id = ?5
             RETURNING {USER_COLUMNS}"
        ))?
        .query_row(
            (
                first_name,
                last_name,
                email,
                OffsetDateTime::now_utc(),
                user_id.as_i64(),
            ),
            map_user_row,
        )
        .map_err(|error| error.into())
}

/// Replace the password hash of `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn set_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1, updated_at = ?2 WHERE id = ?3",
        (
            password_hash.as_ref(),
            OffsetDateTime::now_utc(),
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Record that `user_id` logged in at `logged_in_at`.
pub fn record_login(
    user_id: UserID,
    logged_in_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE user SET last_login = ?1 WHERE id = ?2",
        (logged_in_at, user_id.as_i64()),
    )?;

    Ok(())
}

/// Mark the email address of `user_id` as verified.
pub fn set_email_verified(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE user SET email_verified = 1, updated_at = ?1 WHERE id = ?2",
        (OffsetDateTime::now_utc(), user_id.as_i64()),
    )?;

    Ok(())
}

/// Deactivate `user_id`. Inactive users cannot log in and their tokens are rejected.
///
/// # Errors
///
/// Returns [Error::NotFound] if the user does not exist.
pub fn deactivate_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        (OffsetDateTime::now_utc(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Get the IDs of every active user, in ascending order.
pub fn get_active_user_ids(connection: &Connection) -> Result<Vec<UserID>, Error> {
    connection
        .prepare("SELECT id FROM user WHERE is_active = 1 ORDER BY id")?
        .query_map([], |row| row.get(0).map(UserID::new))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| error.into())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;
    use time::OffsetDateTime;

    use crate::{
        Error, PasswordHash,
        user::core::{
            NewUser, UserID, UserUpdate, count_users, create_user, create_user_table,
            deactivate_user, get_active_user_ids, get_user_by_email, get_user_by_id,
            record_login, set_password, update_user_profile,
        },
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: email.to_owned(),
            password_hash: Some(PasswordHash::new_unchecked("hunter2")),
        }
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();

        let inserted_user = create_user(new_user("ada@example.com"), &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(
            inserted_user.password_hash,
            Some(PasswordHash::new_unchecked("hunter2"))
        );
        assert!(inserted_user.is_active);
        assert!(!inserted_user.email_verified);
        assert_eq!(inserted_user.provider, "email");
    }

    #[test]
    fn insert_user_normalizes_email() {
        let db_connection = get_db_connection();

        let inserted_user =
            create_user(new_user("  Ada@Example.COM "), &db_connection).unwrap();

        assert_eq!(inserted_user.email, "ada@example.com");
    }

    #[test]
    fn insert_user_fails_with_duplicate_email() {
        let db_connection = get_db_connection();
        create_user(new_user("ada@example.com"), &db_connection).unwrap();

        let result = create_user(new_user("ADA@example.com"), &db_connection);

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn insert_user_fails_with_invalid_email() {
        let db_connection = get_db_connection();

        let result = create_user(new_user("not an email"), &db_connection);

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        assert_eq!(
            get_user_by_id(UserID::new(42), &db_connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn get_user_by_email_ignores_case() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("ada@example.com"), &db_connection).unwrap();

        let retrieved_user = get_user_by_email("ADA@EXAMPLE.COM", &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn update_profile_changes_only_given_fields() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("ada@example.com"), &db_connection).unwrap();

        let updated_user = update_user_profile(
            test_user.id,
            UserUpdate {
                first_name: Some("Augusta".to_owned()),
                ..Default::default()
            },
            &db_connection,
        )
        .unwrap();

        assert_eq!(updated_user.first_name, "Augusta");
        assert_eq!(updated_user.last_name, test_user.last_name);
        assert_eq!(updated_user.email, test_user.email);
        assert!(updated_user.updated_at.is_some());
    }

    #[test]
    fn update_profile_rejects_email_of_other_user() {
        let db_connection = get_db_connection();
        create_user(new_user("ada@example.com"), &db_connection).unwrap();
        let other_user = create_user(new_user("charles@example.com"), &db_connection).unwrap();

        let result = update_user_profile(
            other_user.id,
            UserUpdate {
                email: Some("ada@example.com".to_owned()),
                ..Default::default()
            },
            &db_connection,
        );

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn set_password_replaces_hash() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("ada@example.com"), &db_connection).unwrap();
        let new_hash = PasswordHash::new_unchecked("newhash");

        set_password(test_user.id, &new_hash, &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();
        assert_eq!(retrieved_user.password_hash, Some(new_hash));
    }

    #[test]
    fn record_login_sets_last_login() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("ada@example.com"), &db_connection).unwrap();
        let logged_in_at = OffsetDateTime::now_utc();

        record_login(test_user.id, logged_in_at, &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();
        assert_eq!(
            retrieved_user.last_login.map(|at| at.unix_timestamp()),
            Some(logged_in_at.unix_timestamp())
        );
    }

    #[test]
    fn deactivated_users_are_not_active() {
        let db_connection = get_db_connection();
        let active_user = create_user(new_user("ada@example.com"), &db_connection).unwrap();
        let inactive_user = create_user(new_user("charles@example.com"), &db_connection).unwrap();

        deactivate_user(inactive_user.id, &db_connection).unwrap();

        assert_eq!(
            get_active_user_ids(&db_connection).unwrap(),
            vec![active_user.id]
        );
        assert!(!get_user_by_id(inactive_user.id, &db_connection).unwrap().is_active);
    }

    #[test]
    fn returns_correct_count() {
        let db_connection = get_db_connection();

        let count = count_users(&db_connection).expect("Could not get user count");
        assert_eq!(0, count, "Want zero users before insertion, got {count}");

        create_user(new_user("ada@example.com"), &db_connection).unwrap();

        let count = count_users(&db_connection).expect("Could not get user count");
        assert_eq!(1, count, "Want one user after insertion, got {count}");
    }
}

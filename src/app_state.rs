//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, config::AuthConfig, db::initialize, mail::Mailer};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection.
    ///
    /// All writers go through this single connection, which serialises updates to account
    /// balances.
    pub db_connection: Arc<Mutex<Connection>>,

    /// Keys, lifetimes and cookie settings for authentication.
    pub auth_config: AuthConfig,

    /// The local timezone as a canonical timezone name, e.g. "America/Sao_Paulo".
    ///
    /// Decides which calendar day "today" is for fixed expenses and the dashboard.
    pub local_timezone: String,

    /// Delivers password reset tokens and email verification codes.
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "America/Sao_Paulo".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        auth_config: AuthConfig,
        local_timezone: &str,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            auth_config,
            local_timezone: local_timezone.to_owned(),
            mailer,
        })
    }
}

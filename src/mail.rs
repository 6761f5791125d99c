//! Outgoing email for password resets and email verification.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{AppState, Error, config::AuthConfig};

/// An email addressed to a single recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    /// The recipient's address.
    pub to: String,
    /// The subject line.
    pub subject: String,
    /// The plain text body.
    pub body: String,
}

/// Something that can deliver an [Email].
pub trait Mailer: Debug + Send + Sync {
    /// Deliver `email`.
    ///
    /// # Errors
    ///
    /// Returns [Error::MailError] if the email could not be handed over for delivery.
    fn send(&self, email: &Email) -> Result<(), Error>;
}

/// A mailer that writes each email to the log instead of delivering it.
///
/// Operators read reset tokens and verification codes from the server log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMailer;

impl Mailer for TracingMailer {
    fn send(&self, email: &Email) -> Result<(), Error> {
        tracing::info!(to = %email.to, subject = %email.subject, "{}", email.body);

        Ok(())
    }
}

/// The state needed by handlers that email one-time tokens.
#[derive(Debug, Clone)]
pub struct MailState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Decides how long one-time tokens stay valid.
    pub auth_config: AuthConfig,
    /// Delivers the tokens.
    pub mailer: Arc<dyn Mailer>,
}

impl FromRef<AppState> for MailState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            auth_config: state.auth_config.clone(),
            mailer: state.mailer.clone(),
        }
    }
}

/// A mailer that keeps sent emails in memory so tests can read them.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

#[cfg(test)]
impl RecordingMailer {
    /// The emails sent so far, oldest first.
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Mailer for RecordingMailer {
    fn send(&self, email: &Email) -> Result<(), Error> {
        self.sent.lock().unwrap().push(email.clone());

        Ok(())
    }
}

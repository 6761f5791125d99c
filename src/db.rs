//! Creates the application's database schema.

use rusqlite::{Connection, TransactionBehavior};

use crate::{
    Error,
    account::create_account_table,
    auth::{create_password_reset_token_table, create_verification_code_table},
    card::create_card_table,
    category::create_category_table,
    fixed_expense::create_fixed_expense_table,
    share::create_share_table,
    transaction::create_transaction_table,
    user::create_user_table,
};

/// Create all the tables for the domain models if they do not exist yet.
///
/// Foreign key enforcement is switched on for `connection`, which the deletion rules of the
/// schema depend on.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        rusqlite::Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_card_table(&transaction)?;
    create_category_table(&transaction)?;
    create_fixed_expense_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_share_table(&transaction)?;
    create_password_reset_token_table(&transaction)?;
    create_verification_code_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod db_tests {
    use rusqlite::Connection;

    use crate::db::initialize;

    #[test]
    fn initialize_succeeds_twice() {
        let connection = Connection::open_in_memory().unwrap();

        assert_eq!(initialize(&connection), Ok(()));
        assert_eq!(initialize(&connection), Ok(()));
    }

    #[test]
    fn initialize_enables_foreign_keys() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let foreign_keys: i64 = connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert_eq!(foreign_keys, 1);
    }
}

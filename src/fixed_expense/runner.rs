//! Posts the fixed expenses that are due on a given day as transactions.

use rusqlite::Connection;
use time::Date;

use crate::{
    Error, UserID,
    fixed_expense::core::{FIXED_EXPENSE_COLUMNS, FixedExpense, map_fixed_expense_row},
    transaction::{Transaction, TransactionKind, insert_transaction},
};

/// Get the active fixed expenses of `user_id` whose due day is the day of `date` and whose
/// start and end dates include `date`.
///
/// Due days that do not exist in the month of `date` (e.g. the 31st in April) never match.
fn get_due_fixed_expenses(
    user_id: UserID,
    date: Date,
    connection: &Connection,
) -> Result<Vec<FixedExpense>, Error> {
    connection
        .prepare(&format!(
            "SELECT {FIXED_EXPENSE_COLUMNS} FROM fixed_expense
             WHERE user_id = ?1
                AND status = 'active'
                AND due_day = ?2
                AND start_date <= ?3
                AND (end_date IS NULL OR end_date >= ?3)
             ORDER BY id"
        ))?
        .query_map((user_id.as_i64(), date.day(), date), map_fixed_expense_row)?
        .map(|expense_result| expense_result.map_err(Error::SqlError))
        .collect()
}

/// Post every fixed expense of `user_id` that is due on `date` and return how many were posted.
///
/// Each posting creates an expense transaction dated `date` with the amount, description,
/// category, account and card of the fixed expense, moves the account balance and records
/// `date` as the last posted date, all in one SQL transaction. Expenses already posted on
/// `date` are skipped, so running this twice for the same day posts each expense once.
///
/// # Errors
///
/// Returns an error if a posting fails. Postings made before the failure are kept.
pub fn run_fixed_expenses_for_date(
    user_id: UserID,
    date: Date,
    connection: &mut Connection,
) -> Result<usize, Error> {
    let due_expenses = get_due_fixed_expenses(user_id, date, connection)?;
    let mut posted = 0;

    for expense in due_expenses {
        if expense.last_posted_date == Some(date) {
            continue;
        }

        let sql_transaction = connection.transaction()?;

        let builder = Transaction::build(TransactionKind::Expense, expense.amount, date)
            .description(Some(expense.description.clone()))
            .category_id(Some(expense.category_id))
            .account_id(expense.account_id)
            .card_id(expense.card_id)
            .fixed_expense_id(Some(expense.id));
        insert_transaction(builder, user_id, &sql_transaction)?;

        sql_transaction.execute(
            "UPDATE fixed_expense SET last_posted_date = ?1 WHERE id = ?2",
            (date, expense.id),
        )?;
        sql_transaction.commit()?;

        tracing::debug!(
            "Posted fixed expense {} for user {} on {}",
            expense.id,
            user_id,
            date
        );
        posted += 1;
    }

    Ok(posted)
}

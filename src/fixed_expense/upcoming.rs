//! A preview of the fixed expenses that fall due in the next few days.

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::{
    Error, UserID,
    database_id::FixedExpenseId,
    fixed_expense::core::{FixedExpenseStatus, get_fixed_expenses},
};

/// The number of days the preview looks ahead when the client does not say.
pub const DEFAULT_UPCOMING_DAYS: i64 = 7;
/// The furthest the preview may look ahead.
pub const MAX_UPCOMING_DAYS: i64 = 60;

/// A fixed expense that is due soon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingFixedExpense {
    /// The ID of the fixed expense.
    pub id: FixedExpenseId,
    /// What the expense is for.
    pub description: String,
    /// The amount that will be posted.
    pub amount: Decimal,
    /// The next day the expense is due.
    pub due_date: Date,
}

/// Get the next date on or after `today` that falls on `due_day`.
///
/// When `due_day` does not exist in that month, the last day of the month is used instead.
pub fn next_due_date(today: Date, due_day: u8) -> Date {
    let (mut year, mut month) = (today.year(), today.month());

    if today.day() > due_day {
        if month == time::Month::December {
            year += 1;
        }
        month = month.next();
    }

    let mut day = due_day;
    loop {
        match Date::from_calendar_date(year, month, day) {
            Ok(date) => return date,
            // Every month has at least 28 days, so this ends.
            Err(_) => day -= 1,
        }
    }
}

/// Get the active fixed expenses of `user_id` with reminders enabled that are due between
/// `today` and `today + days` inclusive, ordered by due date.
///
/// # Errors
///
/// Returns [Error::Validation] if `days` is not in 1..=[MAX_UPCOMING_DAYS].
pub fn get_upcoming_fixed_expenses(
    user_id: UserID,
    today: Date,
    days: i64,
    connection: &Connection,
) -> Result<Vec<UpcomingFixedExpense>, Error> {
    if !(1..=MAX_UPCOMING_DAYS).contains(&days) {
        return Err(Error::Validation(format!(
            "days must be between 1 and {MAX_UPCOMING_DAYS}"
        )));
    }

    let end = today + Duration::days(days);

    let mut upcoming: Vec<UpcomingFixedExpense> = get_fixed_expenses(user_id, connection)?
        .into_iter()
        .filter(|expense| expense.status == FixedExpenseStatus::Active && expense.reminder_enabled)
        .filter_map(|expense| {
            let due_date = next_due_date(today, expense.due_day);

            (today <= due_date && due_date <= end).then_some(UpcomingFixedExpense {
                id: expense.id,
                description: expense.description,
                amount: expense.amount,
                due_date,
            })
        })
        .collect();

    upcoming.sort_by_key(|expense| (expense.due_date, expense.id));

    Ok(upcoming)
}

#[cfg(test)]
mod upcoming_tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        Error, NewUser, UserID,
        category::{CategoryKind, NewCategory, create_category},
        database_id::CategoryId,
        db::initialize,
        fixed_expense::{
            core::{FixedExpenseBuilder, create_fixed_expense},
            upcoming::{get_upcoming_fixed_expenses, next_due_date},
        },
        user::create_user,
    };

    #[test]
    fn due_later_this_month() {
        assert_eq!(next_due_date(date!(2025 - 04 - 10), 15), date!(2025 - 04 - 15));
        assert_eq!(next_due_date(date!(2025 - 04 - 15), 15), date!(2025 - 04 - 15));
    }

    #[test]
    fn due_day_passed_moves_to_next_month() {
        assert_eq!(next_due_date(date!(2025 - 04 - 16), 15), date!(2025 - 05 - 15));
        assert_eq!(next_due_date(date!(2025 - 12 - 20), 5), date!(2026 - 01 - 05));
    }

    #[test]
    fn clamps_to_end_of_short_month() {
        assert_eq!(next_due_date(date!(2025 - 04 - 20), 31), date!(2025 - 04 - 30));
        assert_eq!(next_due_date(date!(2025 - 02 - 01), 30), date!(2025 - 02 - 28));
        assert_eq!(next_due_date(date!(2024 - 02 - 01), 31), date!(2024 - 02 - 29));
    }

    fn get_test_connection() -> (Connection, UserID, CategoryId) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user(
            NewUser {
                first_name: "Test".to_owned(),
                last_name: "User".to_owned(),
                email: "test@example.com".to_owned(),
                password_hash: None,
            },
            &connection,
        )
        .unwrap();
        let category = create_category(
            NewCategory {
                name: "Bills".to_owned(),
                kind: CategoryKind::Expense,
            },
            Some(user.id),
            &connection,
        )
        .unwrap();

        (connection, user.id, category.id)
    }

    fn expense(description: &str, due_day: u8, category_id: CategoryId) -> FixedExpenseBuilder {
        FixedExpenseBuilder {
            description: description.to_owned(),
            amount: Decimal::new(1000, 2),
            due_day,
            category_id,
            account_id: None,
            card_id: None,
            start_date: None,
            end_date: None,
            reminder_enabled: None,
        }
    }

    #[test]
    fn lists_expenses_in_window_by_due_date() {
        let (conn, user_id, category_id) = get_test_connection();
        let today = date!(2025 - 04 - 25);
        for (description, due_day) in [("Water", 30), ("Rent", 26), ("Gym", 10), ("Phone", 31)] {
            create_fixed_expense(expense(description, due_day, category_id), user_id, today, &conn)
                .unwrap();
        }
        create_fixed_expense(
            FixedExpenseBuilder {
                reminder_enabled: Some(false),
                ..expense("Hidden", 27, category_id)
            },
            user_id,
            today,
            &conn,
        )
        .unwrap();

        let upcoming = get_upcoming_fixed_expenses(user_id, today, 7, &conn).unwrap();

        let got: Vec<(&str, String)> = upcoming
            .iter()
            .map(|item| (item.description.as_str(), item.due_date.to_string()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Rent", "2025-04-26".to_owned()),
                ("Water", "2025-04-30".to_owned()),
                ("Phone", "2025-04-30".to_owned()),
            ]
        );
    }

    #[test]
    fn rejects_days_out_of_range() {
        let (conn, user_id, _) = get_test_connection();

        for days in [0, 61] {
            assert!(matches!(
                get_upcoming_fixed_expenses(user_id, date!(2025 - 04 - 25), days, &conn),
                Err(Error::Validation(_))
            ));
        }
    }
}

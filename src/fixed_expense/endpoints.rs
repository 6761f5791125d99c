//! Route handlers for fixed expenses, posting today's expenses and the upcoming preview.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, UserID,
    database_id::FixedExpenseId,
    fixed_expense::{
        core::{
            FixedExpense, FixedExpenseBuilder, FixedExpenseUpdate, create_fixed_expense,
            delete_fixed_expense, get_fixed_expense, get_fixed_expenses, update_fixed_expense,
        },
        runner::run_fixed_expenses_for_date,
        upcoming::{DEFAULT_UPCOMING_DAYS, UpcomingFixedExpense, get_upcoming_fixed_expenses},
    },
    timezone::get_local_date,
};

/// The state needed to manage fixed expenses.
#[derive(Debug, Clone)]
pub struct FixedExpenseState {
    /// The database connection for managing fixed expenses.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The timezone that decides which day "today" is.
    pub local_timezone: String,
}

impl FromRef<AppState> for FixedExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The number of transactions posted by a manual run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunResult {
    /// How many fixed expenses were posted.
    pub posted: usize,
}

/// The query string of the upcoming preview.
#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    days: Option<i64>,
}

/// The fixed expenses due soon.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpcomingFixedExpenses {
    /// The expenses ordered by due date.
    pub items: Vec<UpcomingFixedExpense>,
}

/// A route handler for creating a fixed expense.
pub async fn create_fixed_expense_endpoint(
    State(state): State<FixedExpenseState>,
    Extension(user_id): Extension<UserID>,
    Json(builder): Json<FixedExpenseBuilder>,
) -> Result<(StatusCode, Json<FixedExpense>), Error> {
    let today = get_local_date(&state.local_timezone)?;
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let expense = create_fixed_expense(builder, user_id, today, &connection)?;

    Ok((StatusCode::CREATED, Json(expense)))
}

/// A route handler for listing the current user's fixed expenses.
pub async fn get_fixed_expenses_endpoint(
    State(state): State<FixedExpenseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<FixedExpense>>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_fixed_expenses(user_id, &connection).map(Json)
}

/// A route handler for getting one fixed expense.
pub async fn get_fixed_expense_endpoint(
    State(state): State<FixedExpenseState>,
    Extension(user_id): Extension<UserID>,
    Path(fixed_expense_id): Path<FixedExpenseId>,
) -> Result<Json<FixedExpense>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    get_fixed_expense(fixed_expense_id, user_id, &connection).map(Json)
}

/// A route handler for changing a fixed expense, including pausing it or muting its reminder.
pub async fn update_fixed_expense_endpoint(
    State(state): State<FixedExpenseState>,
    Extension(user_id): Extension<UserID>,
    Path(fixed_expense_id): Path<FixedExpenseId>,
    Json(update): Json<FixedExpenseUpdate>,
) -> Result<Json<FixedExpense>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    update_fixed_expense(fixed_expense_id, user_id, update, &connection).map(Json)
}

/// A route handler for deleting a fixed expense.
pub async fn delete_fixed_expense_endpoint(
    State(state): State<FixedExpenseState>,
    Extension(user_id): Extension<UserID>,
    Path(fixed_expense_id): Path<FixedExpenseId>,
) -> Result<StatusCode, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    delete_fixed_expense(fixed_expense_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler that posts the current user's fixed expenses due today.
pub async fn run_fixed_expenses_endpoint(
    State(state): State<FixedExpenseState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<RunResult>, Error> {
    let today = get_local_date(&state.local_timezone)?;
    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let posted = run_fixed_expenses_for_date(user_id, today, &mut connection)?;

    Ok(Json(RunResult { posted }))
}

/// A route handler for the fixed expenses due in the next `days` days.
pub async fn get_upcoming_fixed_expenses_endpoint(
    State(state): State<FixedExpenseState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<UpcomingFixedExpenses>, Error> {
    let today = get_local_date(&state.local_timezone)?;
    let days = query.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let items = get_upcoming_fixed_expenses(user_id, today, days, &connection)?;

    Ok(Json(UpcomingFixedExpenses { items }))
}

#[cfg(test)]
mod fixed_expense_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use time::Duration;

    use crate::{
        Category,
        endpoints::{self, format_endpoint},
        fixed_expense::{
            core::{FixedExpense, FixedExpenseStatus},
            endpoints::{RunResult, UpcomingFixedExpenses},
        },
        test_utils::{get_test_app, register_test_user},
        timezone::get_local_date,
    };

    async fn create_category(
        server: &axum_test::TestServer,
        cookie: &axum_extra::extract::cookie::Cookie<'static>,
    ) -> Category {
        server
            .post(endpoints::CATEGORIES)
            .add_cookie(cookie.clone())
            .json(&json!({ "name": "Bills", "kind": "expense" }))
            .await
            .json::<Category>()
    }

    #[tokio::test]
    async fn create_update_and_delete() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;
        let category = create_category(&app.server, &cookie).await;

        let response = app
            .server
            .post(endpoints::FIXED_EXPENSES)
            .add_cookie(cookie.clone())
            .json(&json!({
                "description": "Rent",
                "amount": "1500.00",
                "due_day": 5,
                "category_id": category.id,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let expense = response.json::<FixedExpense>();
        assert_eq!(expense.status, FixedExpenseStatus::Active);
        let uri = format_endpoint(endpoints::FIXED_EXPENSE, expense.id);

        let updated = app
            .server
            .put(&uri)
            .add_cookie(cookie.clone())
            .json(&json!({ "status": "inactive" }))
            .await
            .json::<FixedExpense>();
        assert_eq!(updated.status, FixedExpenseStatus::Inactive);

        app.server
            .delete(&uri)
            .add_cookie(cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.server
            .get(&uri)
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_posts_todays_expense_once() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;
        let category = create_category(&app.server, &cookie).await;
        let today = get_local_date(&app.state.local_timezone).unwrap();
        app.server
            .post(endpoints::FIXED_EXPENSES)
            .add_cookie(cookie.clone())
            .json(&json!({
                "description": "Streaming",
                "amount": "39.90",
                "due_day": today.day(),
                "category_id": category.id,
                "start_date": today.to_string(),
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let first = app
            .server
            .post(endpoints::RUN_FIXED_EXPENSES)
            .add_cookie(cookie.clone())
            .await
            .json::<RunResult>();
        let second = app
            .server
            .post(endpoints::RUN_FIXED_EXPENSES)
            .add_cookie(cookie)
            .await
            .json::<RunResult>();

        assert_eq!(first.posted, 1);
        assert_eq!(second.posted, 0);
    }

    #[tokio::test]
    async fn upcoming_includes_expense_due_tomorrow() {
        let app = get_test_app();
        let cookie = register_test_user(&app.server, "alice@example.com").await;
        let category = create_category(&app.server, &cookie).await;
        let tomorrow = get_local_date(&app.state.local_timezone).unwrap() + Duration::days(1);
        app.server
            .post(endpoints::FIXED_EXPENSES)
            .add_cookie(cookie.clone())
            .json(&json!({
                "description": "Gym",
                "amount": "99.00",
                "due_day": tomorrow.day(),
                "category_id": category.id,
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let upcoming = app
            .server
            .get(endpoints::UPCOMING_FIXED_EXPENSES)
            .add_cookie(cookie.clone())
            .add_query_param("days", 2)
            .await
            .json::<UpcomingFixedExpenses>();

        assert_eq!(upcoming.items.len(), 1);
        assert_eq!(upcoming.items[0].due_date, tomorrow);

        app.server
            .get(endpoints::UPCOMING_FIXED_EXPENSES)
            .add_cookie(cookie)
            .add_query_param("days", 61)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

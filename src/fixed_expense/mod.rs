//! Fixed (recurring) expenses, the runner that posts them and the upcoming preview.

mod core;
mod endpoints;
mod runner;
mod upcoming;

pub use core::{
    FixedExpense, FixedExpenseBuilder, FixedExpenseStatus, FixedExpenseUpdate,
    create_fixed_expense, create_fixed_expense_table,
};
pub use endpoints::{
    create_fixed_expense_endpoint, delete_fixed_expense_endpoint, get_fixed_expense_endpoint,
    get_fixed_expenses_endpoint, get_upcoming_fixed_expenses_endpoint,
    run_fixed_expenses_endpoint, update_fixed_expense_endpoint,
};
pub use runner::run_fixed_expenses_for_date;

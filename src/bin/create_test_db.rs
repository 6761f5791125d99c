use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};

use moneyhub::{
    Account, AccountType, CategoryKind, FixedExpenseBuilder, NewCategory, NewUser, PasswordHash,
    Transaction, TransactionKind, ValidatedPassword, count_users, create_account, create_category,
    create_fixed_expense, create_transaction, create_user, initialize_db,
};

/// A utility for creating a demo database for the MoneyHub server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let mut conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user demo@example.com with the password 'test'...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;

    let user = create_user(
        NewUser {
            first_name: "Demo".to_owned(),
            last_name: "User".to_owned(),
            email: "demo@example.com".to_owned(),
            password_hash: Some(password_hash),
        },
        &conn,
    )?;

    println!("Creating accounts and categories...");

    let checking = create_account(
        Account::build("Demo Bank", AccountType::Checking, Decimal::new(250_000, 2)),
        user.id,
        &conn,
    )?;
    create_account(
        Account::build("Demo Savings", AccountType::Savings, Decimal::new(1_000_000, 2)),
        user.id,
        &conn,
    )?;

    let salary = create_category(
        NewCategory {
            name: "Salary".to_owned(),
            kind: CategoryKind::Income,
        },
        Some(user.id),
        &conn,
    )?;
    let groceries = create_category(
        NewCategory {
            name: "Groceries".to_owned(),
            kind: CategoryKind::Expense,
        },
        Some(user.id),
        &conn,
    )?;
    let housing = create_category(
        NewCategory {
            name: "Housing".to_owned(),
            kind: CategoryKind::Expense,
        },
        Some(user.id),
        &conn,
    )?;

    println!("Creating transactions for the last 30 days...");

    let today = OffsetDateTime::now_utc().date();

    create_transaction(
        Transaction::build(
            TransactionKind::Income,
            Decimal::new(500_000, 2),
            today - Duration::days(30),
        )
        .description(Some("Monthly salary".to_owned()))
        .category_id(Some(salary.id))
        .account_id(Some(checking.id)),
        user.id,
        &mut conn,
    )?;

    for days_ago in (0..30).step_by(3) {
        create_transaction(
            Transaction::build(
                TransactionKind::Expense,
                Decimal::new(4_250 + days_ago * 100, 2),
                today - Duration::days(days_ago),
            )
            .description(Some("Supermarket".to_owned()))
            .category_id(Some(groceries.id))
            .account_id(Some(checking.id)),
            user.id,
            &mut conn,
        )?;
    }

    println!("Creating fixed expenses...");

    create_fixed_expense(
        FixedExpenseBuilder {
            description: "Rent".to_owned(),
            amount: Decimal::new(120_000, 2),
            due_day: 5,
            category_id: housing.id,
            account_id: Some(checking.id),
            card_id: None,
            start_date: None,
            end_date: None,
            reminder_enabled: Some(true),
        },
        user.id,
        today,
        &conn,
    )?;

    println!("Success! The database has {} user(s).", count_users(&conn)?);

    Ok(())
}

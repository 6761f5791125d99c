//! Bank accounts and their balances.

mod core;
mod endpoints;

pub use core::{
    Account, AccountBuilder, AccountType, AccountUpdate, apply_balance_delta, check_account_owner,
    create_account, create_account_table, get_accounts, get_total_balance,
};
pub use endpoints::{
    create_account_endpoint, delete_account_endpoint, get_account_endpoint, get_accounts_endpoint,
    update_account_endpoint,
};

#[cfg(test)]
pub use core::{delete_account, get_account};

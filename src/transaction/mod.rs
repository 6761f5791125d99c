//! Transactions: the ledger of income and expenses that drives account balances.

mod core;
mod endpoints;
mod query;

pub use core::{
    Transaction, TransactionBuilder, TransactionKind, check_references, count_transactions,
    create_transaction, create_transaction_table, insert_transaction,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    get_transactions_endpoint,
};
pub use query::{TransactionFilter, query_all_transactions};

#[cfg(test)]
pub use core::{delete_transaction, get_transaction};

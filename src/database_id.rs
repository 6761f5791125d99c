//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// The ID of a bank account.
pub type AccountId = DatabaseId;
/// The ID of a credit card.
pub type CardId = DatabaseId;
/// The ID of a transaction category.
pub type CategoryId = DatabaseId;
/// The ID of a transaction.
pub type TransactionId = DatabaseId;
/// The ID of a fixed (recurring) expense.
pub type FixedExpenseId = DatabaseId;
/// The ID of a share between two users.
pub type ShareId = DatabaseId;

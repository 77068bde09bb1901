//! crates/book_trading_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database and password hashing implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AuthSession, Book, BookDraft, BookId, NewUser, ProfileUpdate, Trade, TradeAcceptance, TradeView,
    UserCredentials, UserId, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., the database driver).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("Unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },
    #[error("Value too long: {0}")]
    ValueTooLong(String),
    /// A conditional write found the row in a different state than expected.
    #[error("Conflicting update: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    async fn find_user_id(&self, username: &str) -> PortResult<Option<UserId>>;

    async fn find_user_profile(&self, username: &str) -> PortResult<Option<UserProfile>>;

    async fn find_user_credentials(&self, username: &str) -> PortResult<Option<UserCredentials>>;

    async fn insert_user(&self, user: &NewUser) -> PortResult<UserProfile>;

    /// Returns the number of rows updated.
    async fn update_user_profile(&self, update: &ProfileUpdate) -> PortResult<u64>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live (unexpired) session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthSession>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Books ---
    async fn list_available_books(&self) -> PortResult<Vec<Book>>;

    async fn insert_book(&self, owner: UserId, draft: &BookDraft) -> PortResult<Book>;

    async fn list_books_by_owner(&self, owner: UserId) -> PortResult<Vec<Book>>;

    async fn list_book_ids_by_owner(&self, owner: UserId) -> PortResult<Vec<BookId>>;

    async fn find_book(&self, book_id: BookId) -> PortResult<Option<Book>>;

    async fn find_books(&self, book_ids: &[BookId]) -> PortResult<Vec<Book>>;

    async fn sample_available_books(&self, limit: i64) -> PortResult<Vec<Book>>;

    // --- Trades ---
    /// True when a pending or accepted trade exists for this requester and book.
    async fn has_active_trade(&self, requester: UserId, book_id: BookId) -> PortResult<bool>;

    async fn insert_trade(
        &self,
        requester: UserId,
        owner: UserId,
        book_id: BookId,
    ) -> PortResult<Trade>;

    /// The oldest pending trade addressed to `owner` for `book_id`.
    async fn find_pending_trade(&self, owner: UserId, book_id: BookId) -> PortResult<Option<Trade>>;

    /// Atomically marks the trade accepted and lends the book to the requester.
    /// Competing pending requests for the same book are declined in the same transaction.
    /// Fails with `PortError::Conflict` when the trade is no longer pending or the book
    /// has been lent out meanwhile. Returns the book's name.
    async fn accept_trade(&self, acceptance: &TradeAcceptance) -> PortResult<String>;

    /// Returns the number of trades declined.
    async fn decline_pending_trades(&self, owner: UserId, book_id: BookId) -> PortResult<u64>;

    async fn list_trades_for_user(&self, user_id: UserId) -> PortResult<Vec<TradeView>>;

    /// Returns the number of trades deleted.
    async fn delete_declined_trades(&self, requester: UserId) -> PortResult<u64>;
}

/// One-way salted password hashing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait PasswordService: Send + Sync {
    fn hash_password(&self, password: &str) -> PortResult<String>;

    /// Never errors: an unparsable hash simply does not verify.
    fn verify_password(&self, password: &str, hash: &str) -> bool;
}

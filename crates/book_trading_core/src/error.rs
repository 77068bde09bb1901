//! crates/book_trading_core/src/error.rs
//!
//! The error type returned by every core operation. Messages are written to be
//! shown to the user as-is; store details stay in the logs.

use std::fmt;

use tracing::error;

use crate::domain::BookId;
use crate::ports::PortError;

pub const GENERIC_AUTH_MESSAGE: &str = "Wrong username or password.";
pub const GENERIC_INTERNAL_MESSAGE: &str = "An error occurred. Please try again later.";

/// Which uniqueness or state rule a `CoreError::Conflict` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSubject {
    Username,
    Email,
    Trade,
}

impl fmt::Display for ConflictSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictSubject::Username => "username",
            ConflictSubject::Email => "email",
            ConflictSubject::Trade => "trade",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// User input failed a shape or size rule.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{0}")]
    NotFound(String),

    /// A uniqueness rule or a concurrent state change got in the way.
    #[error("{message}")]
    Conflict {
        subject: ConflictSubject,
        message: String,
    },

    #[error("You can't trade books with yourself.")]
    SelfTrade,

    #[error("You have already requested to trade this book.")]
    DuplicateRequest { book_id: BookId },

    #[error("This book is already borrowed.")]
    AlreadyBorrowed { book_id: BookId },

    /// Deliberately the same for unknown users and wrong passwords.
    #[error("{}", GENERIC_AUTH_MESSAGE)]
    Auth,

    #[error("{}", GENERIC_INTERNAL_MESSAGE)]
    Internal { detail: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn user_not_found(username: &str) -> Self {
        CoreError::NotFound(format!("Username {} not found.", username))
    }

    pub fn book_not_found(book_id: BookId) -> Self {
        CoreError::NotFound(format!("Book {} not found.", book_id))
    }

    pub fn pending_trade_not_found(book_id: BookId) -> Self {
        CoreError::NotFound(format!("No pending trade request for book {}.", book_id))
    }

    pub fn username_taken(username: &str) -> Self {
        CoreError::Conflict {
            subject: ConflictSubject::Username,
            message: format!("Username {} already exists.", username),
        }
    }

    pub fn email_taken(email: &str) -> Self {
        CoreError::Conflict {
            subject: ConflictSubject::Email,
            message: format!("Email {} already in use.", email),
        }
    }

    pub fn trade_conflict(book_id: BookId) -> Self {
        CoreError::Conflict {
            subject: ConflictSubject::Trade,
            message: format!("The trade for book {} was changed by someone else.", book_id),
        }
    }
}

/// Fallback translation for store failures no caller handled specifically.
impl From<PortError> for CoreError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound(what) => CoreError::NotFound(what),
            other => {
                error!("Internal database error: {}", other);
                CoreError::Internal {
                    detail: other.to_string(),
                }
            }
        }
    }
}

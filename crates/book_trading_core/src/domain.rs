//! crates/book_trading_core/src/domain.rs
//!
//! Defines the core data structures for the application: users, books and
//! the trades negotiated over them. None of these types know about the
//! database; the `Serialize` derives only exist so the web layer can hand
//! them straight to the client.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//=========================================================================================
// Identifiers
//=========================================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Primary key of a row in `users`.
    UserId
);
id_type!(
    /// Primary key of a row in `books`.
    BookId
);
id_type!(
    /// Primary key of a row in `trades`.
    TradeId
);

//=========================================================================================
// Users
//=========================================================================================

/// The public face of a user, safe to show to anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub city: Option<String>,
    pub country: Option<String>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
}

/// A validated registration, ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// The outcome of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub username: String,
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl ProfileUpdate {
    /// Blank city or country means "clear it".
    pub fn normalized(self) -> Self {
        Self {
            city: non_blank(self.city),
            country: non_blank(self.country),
            ..self
        }
    }
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Books
//=========================================================================================

/// A physical book owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: BookId,
    pub name: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub cover_url: Option<String>,
    pub owner_id: UserId,
    /// The user currently holding the book, if it has been traded away.
    pub borrowed_to: Option<UserId>,
}

impl Book {
    pub fn is_borrowed(&self) -> bool {
        self.borrowed_to.is_some()
    }
}

/// Book details as submitted by a user, before the book has an id or owner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookDraft {
    pub name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

impl BookDraft {
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            author: non_blank(self.author),
            isbn: non_blank(self.isbn),
            cover_url: non_blank(self.cover_url),
        }
    }
}

//=========================================================================================
// Trades
//=========================================================================================

/// Where a trade stands. Stored as a nullable boolean: `NULL` is pending,
/// `true` accepted, `false` declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeState {
    Pending,
    Accepted,
    Declined,
}

impl TradeState {
    pub fn from_flag(trade_accepted: Option<bool>) -> Self {
        match trade_accepted {
            None => TradeState::Pending,
            Some(true) => TradeState::Accepted,
            Some(false) => TradeState::Declined,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TradeState::Pending)
    }

    /// Pending and accepted trades both block a new request for the same book.
    pub fn is_active(self) -> bool {
        !matches!(self, TradeState::Declined)
    }
}

/// A request by `request_by` to borrow `requested_book` from its owner `request_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub id: TradeId,
    pub request_by: UserId,
    pub request_to: UserId,
    pub requested_book: BookId,
    /// The requester's book the owner takes in return, if any.
    pub accepted_book: Option<BookId>,
    pub state: TradeState,
    pub trade_start: Option<DateTime<Utc>>,
    pub trade_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Everything the store needs to commit an acceptance in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeAcceptance {
    pub trade_id: TradeId,
    pub requested_book: BookId,
    pub requester: UserId,
    pub owner: UserId,
    pub accepted_book: Option<BookId>,
    pub trade_start: DateTime<Utc>,
    pub trade_end: NaiveDate,
}

/// A trade joined with the display fields of the requested book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeView {
    pub trade_id: TradeId,
    pub state: TradeState,
    pub request_by: UserId,
    pub request_by_username: String,
    pub request_to: UserId,
    pub request_to_username: String,
    pub book_id: BookId,
    pub book_name: String,
    pub book_author: Option<String>,
    pub book_cover_url: Option<String>,
    pub accepted_book: Option<BookId>,
    pub trade_end: Option<NaiveDate>,
}

/// A user's trades split the way the trade page shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TradeOverview {
    /// Pending requests other users have made for my books.
    pub incoming: Vec<TradeView>,
    /// Requests I have made, in any state.
    pub outgoing: Vec<TradeView>,
}

impl TradeOverview {
    pub fn partition(user_id: UserId, trades: Vec<TradeView>) -> Self {
        let mut overview = TradeOverview::default();
        for trade in trades {
            if trade.request_by == user_id {
                overview.outgoing.push(trade);
            } else if trade.request_to == user_id && !trade.state.is_terminal() {
                overview.incoming.push(trade);
            }
        }
        overview
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(id: i64, by: i64, to: i64, state: TradeState) -> TradeView {
        TradeView {
            trade_id: TradeId(id),
            state,
            request_by: UserId(by),
            request_by_username: format!("user{by}"),
            request_to: UserId(to),
            request_to_username: format!("user{to}"),
            book_id: BookId(id),
            book_name: "Dune".to_string(),
            book_author: None,
            book_cover_url: None,
            accepted_book: None,
            trade_end: None,
        }
    }

    #[test]
    fn trade_state_reads_the_nullable_flag() {
        assert_eq!(TradeState::from_flag(None), TradeState::Pending);
        assert_eq!(TradeState::from_flag(Some(true)), TradeState::Accepted);
        assert_eq!(TradeState::from_flag(Some(false)), TradeState::Declined);
        assert!(TradeState::Declined.is_terminal());
        assert!(!TradeState::Pending.is_terminal());
        assert!(TradeState::Accepted.is_active());
        assert!(!TradeState::Declined.is_active());
    }

    #[test]
    fn partition_keeps_only_pending_incoming() {
        let me = UserId(1);
        let overview = TradeOverview::partition(
            me,
            vec![
                view(1, 2, 1, TradeState::Pending),
                view(2, 2, 1, TradeState::Accepted),
                view(3, 1, 3, TradeState::Declined),
                view(4, 1, 2, TradeState::Pending),
            ],
        );
        let incoming: Vec<_> = overview.incoming.iter().map(|t| t.trade_id).collect();
        let outgoing: Vec<_> = overview.outgoing.iter().map(|t| t.trade_id).collect();
        assert_eq!(incoming, vec![TradeId(1)]);
        assert_eq!(outgoing, vec![TradeId(3), TradeId(4)]);
    }

    #[test]
    fn profile_update_clears_blank_fields() {
        let update = ProfileUpdate {
            username: "alice1".to_string(),
            email: "alice@example.com".to_string(),
            city: Some("   ".to_string()),
            country: Some(" Finland ".to_string()),
        }
        .normalized();
        assert_eq!(update.city, None);
        assert_eq!(update.country.as_deref(), Some("Finland"));
    }
}

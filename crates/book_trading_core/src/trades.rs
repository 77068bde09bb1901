//! crates/book_trading_core/src/trades.rs
//!
//! The trade negotiation engine.
//!
//! A trade starts `Pending` when a user asks for someone else's book and ends
//! either `Accepted` (the book is lent to the requester) or `Declined`. Neither
//! terminal state is ever left again; asking a second time creates a new trade.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::catalog::BookCatalog;
use crate::domain::{BookId, Trade, TradeAcceptance, TradeOverview, TradeView};
use crate::error::{CoreError, CoreResult};
use crate::ports::{DatabaseService, PortError};
use crate::users::UserDirectory;

#[derive(Clone)]
pub struct TradeEngine {
    db: Arc<dyn DatabaseService>,
    users: UserDirectory,
    books: BookCatalog,
}

impl TradeEngine {
    pub fn new(db: Arc<dyn DatabaseService>, users: UserDirectory, books: BookCatalog) -> Self {
        Self { db, users, books }
    }

    /// Opens a pending trade asking the owner of `book_id` to lend it out.
    pub async fn request_trade(&self, requester_username: &str, book_id: BookId) -> CoreResult<Trade> {
        let requester = self.users.resolve_id(requester_username).await?;
        let book = self.books.get_by_id(book_id).await?;

        if book.owner_id == requester {
            return Err(CoreError::SelfTrade);
        }
        if book.is_borrowed() {
            return Err(CoreError::AlreadyBorrowed { book_id });
        }
        if self.db.has_active_trade(requester, book_id).await? {
            return Err(CoreError::DuplicateRequest { book_id });
        }

        // The partial unique index catches a request racing past the check above.
        let trade = self
            .db
            .insert_trade(requester, book.owner_id, book_id)
            .await
            .map_err(|e| match e {
                PortError::UniqueViolation { .. } => CoreError::DuplicateRequest { book_id },
                other => other.into(),
            })?;

        info!(
            "Trade {} opened: {} asks for book {}",
            trade.id, requester_username, book_id
        );
        Ok(trade)
    }

    /// Accepts the oldest pending request for `requested_book` and lends the
    /// book to the requester. Returns the book's name for the confirmation message.
    pub async fn accept_trade(
        &self,
        owner_username: &str,
        requested_book: BookId,
        accepted_book: Option<BookId>,
        trade_end: NaiveDate,
    ) -> CoreResult<String> {
        let owner = self.users.resolve_id(owner_username).await?;
        let book = self.books.get_by_id(requested_book).await?;
        if book.is_borrowed() {
            return Err(CoreError::AlreadyBorrowed {
                book_id: requested_book,
            });
        }

        let trade = self
            .db
            .find_pending_trade(owner, requested_book)
            .await?
            .ok_or_else(|| CoreError::pending_trade_not_found(requested_book))?;

        if let Some(offered) = accepted_book {
            let offered_book = self.books.get_by_ids(&[offered]).await?;
            match offered_book.first() {
                Some(b) if b.owner_id == trade.request_by && !b.is_borrowed() => {}
                _ => {
                    return Err(CoreError::validation(
                        "accepted_book",
                        "The book taken in return must be an available book of the requester.",
                    ))
                }
            }
        }

        let acceptance = TradeAcceptance {
            trade_id: trade.id,
            requested_book,
            requester: trade.request_by,
            owner,
            accepted_book,
            trade_start: Utc::now(),
            trade_end,
        };

        let book_name = self.db.accept_trade(&acceptance).await.map_err(|e| match e {
            PortError::Conflict(reason) => {
                warn!("Acceptance of trade {} lost a race: {}", trade.id, reason);
                CoreError::trade_conflict(requested_book)
            }
            other => other.into(),
        })?;

        info!(
            "Trade {} accepted: book {} lent until {}",
            trade.id, requested_book, trade_end
        );
        Ok(book_name)
    }

    /// Declines every pending request addressed to the owner for this book.
    pub async fn decline_trade(&self, owner_username: &str, requested_book: BookId) -> CoreResult<()> {
        let owner = self.users.resolve_id(owner_username).await?;
        let declined = self.db.decline_pending_trades(owner, requested_book).await?;
        if declined == 0 {
            return Err(CoreError::pending_trade_not_found(requested_book));
        }
        info!("{} declined {} request(s) for book {}", owner_username, declined, requested_book);
        Ok(())
    }

    /// Every trade the user takes part in, on either side.
    pub async fn list_trades_for_user(&self, username: &str) -> CoreResult<Vec<TradeView>> {
        let user = self.users.resolve_id(username).await?;
        Ok(self.db.list_trades_for_user(user).await?)
    }

    /// Deletes the user's own declined requests. Returns how many were removed.
    pub async fn purge_declined_outgoing(&self, username: &str) -> CoreResult<u64> {
        let user = self.users.resolve_id(username).await?;
        Ok(self.db.delete_declined_trades(user).await?)
    }

    /// The trade page: clear out declined requests, then split the rest into
    /// incoming and outgoing.
    pub async fn trade_overview(&self, username: &str) -> CoreResult<TradeOverview> {
        let user = self.users.resolve_id(username).await?;
        self.db.delete_declined_trades(user).await?;
        let trades = self.db.list_trades_for_user(user).await?;
        Ok(TradeOverview::partition(user, trades))
    }
}

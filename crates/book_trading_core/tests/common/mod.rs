//! An in-memory `DatabaseService` that mirrors the Postgres adapter's rules:
//! the two unique columns on users, the pending-trade unique index and the
//! conditional acceptance.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use book_trading_core::users::{EMAIL_CONSTRAINT, USERNAME_CONSTRAINT};
use book_trading_core::{
    AuthSession, Book, BookCatalog, BookDraft, BookId, DatabaseService, NewUser, PasswordService,
    PortError, PortResult, ProfileUpdate, Trade, TradeAcceptance, TradeEngine, TradeId, TradeState,
    TradeView, UserCredentials, UserDirectory, UserId, UserProfile,
};
use chrono::{DateTime, Utc};

pub const PENDING_TRADE_INDEX: &str = "trades_one_pending_per_requester";

struct UserRow {
    id: UserId,
    username: String,
    email: String,
    password_hash: String,
    city: Option<String>,
    country: Option<String>,
}

impl UserRow {
    fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            email: self.email.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
        }
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<UserRow>,
    books: Vec<Book>,
    trades: Vec<Trade>,
    sessions: HashMap<String, (UserId, DateTime<Utc>)>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn username_of(&self, id: UserId) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

impl InMemoryDb {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("in-memory db poisoned")
    }

    pub fn book(&self, id: BookId) -> Option<Book> {
        self.lock().books.iter().find(|b| b.id == id).cloned()
    }

    pub fn trade_count(&self) -> usize {
        self.lock().trades.len()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn find_user_id(&self, username: &str) -> PortResult<Option<UserId>> {
        Ok(self.lock().users.iter().find(|u| u.username == username).map(|u| u.id))
    }

    async fn find_user_profile(&self, username: &str) -> PortResult<Option<UserProfile>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .map(UserRow::profile))
    }

    async fn find_user_credentials(&self, username: &str) -> PortResult<Option<UserCredentials>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| UserCredentials {
                user_id: u.id,
                username: u.username.clone(),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn insert_user(&self, user: &NewUser) -> PortResult<UserProfile> {
        let mut tables = self.lock();
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(PortError::UniqueViolation {
                constraint: USERNAME_CONSTRAINT.to_string(),
            });
        }
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(PortError::UniqueViolation {
                constraint: EMAIL_CONSTRAINT.to_string(),
            });
        }
        let id = UserId(tables.next_id());
        let row = UserRow {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            city: None,
            country: None,
        };
        let profile = row.profile();
        tables.users.push(row);
        Ok(profile)
    }

    async fn update_user_profile(&self, update: &ProfileUpdate) -> PortResult<u64> {
        let mut tables = self.lock();
        if !tables.users.iter().any(|u| u.username == update.username) {
            return Ok(0);
        }
        if tables
            .users
            .iter()
            .any(|u| u.email == update.email && u.username != update.username)
        {
            return Err(PortError::UniqueViolation {
                constraint: EMAIL_CONSTRAINT.to_string(),
            });
        }
        match tables.users.iter_mut().find(|u| u.username == update.username) {
            Some(row) => {
                row.email = update.email.clone();
                row.city = update.city.clone();
                row.country = update.country.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.lock()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
        let tables = self.lock();
        match tables.sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(AuthSession {
                id: session_id.to_string(),
                username: tables.username_of(*user_id),
                expires_at: *expires_at,
            }),
            _ => Err(PortError::NotFound(format!("Session {}", session_id))),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.lock().sessions.remove(session_id);
        Ok(())
    }

    async fn list_available_books(&self) -> PortResult<Vec<Book>> {
        Ok(self
            .lock()
            .books
            .iter()
            .filter(|b| !b.is_borrowed())
            .cloned()
            .collect())
    }

    async fn insert_book(&self, owner: UserId, draft: &BookDraft) -> PortResult<Book> {
        let mut tables = self.lock();
        let book = Book {
            id: BookId(tables.next_id()),
            name: draft.name.clone(),
            author: draft.author.clone(),
            isbn: draft.isbn.clone(),
            cover_url: draft.cover_url.clone(),
            owner_id: owner,
            borrowed_to: None,
        };
        tables.books.push(book.clone());
        Ok(book)
    }

    async fn list_books_by_owner(&self, owner: UserId) -> PortResult<Vec<Book>> {
        Ok(self
            .lock()
            .books
            .iter()
            .filter(|b| b.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn list_book_ids_by_owner(&self, owner: UserId) -> PortResult<Vec<BookId>> {
        Ok(self
            .lock()
            .books
            .iter()
            .filter(|b| b.owner_id == owner)
            .map(|b| b.id)
            .collect())
    }

    async fn find_book(&self, book_id: BookId) -> PortResult<Option<Book>> {
        Ok(self.book(book_id))
    }

    async fn find_books(&self, book_ids: &[BookId]) -> PortResult<Vec<Book>> {
        Ok(self
            .lock()
            .books
            .iter()
            .filter(|b| book_ids.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn sample_available_books(&self, limit: i64) -> PortResult<Vec<Book>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .lock()
            .books
            .iter()
            .filter(|b| !b.is_borrowed())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn has_active_trade(&self, requester: UserId, book_id: BookId) -> PortResult<bool> {
        Ok(self.lock().trades.iter().any(|t| {
            t.request_by == requester && t.requested_book == book_id && t.state.is_active()
        }))
    }

    async fn insert_trade(
        &self,
        requester: UserId,
        owner: UserId,
        book_id: BookId,
    ) -> PortResult<Trade> {
        let mut tables = self.lock();
        if tables.trades.iter().any(|t| {
            t.request_by == requester
                && t.requested_book == book_id
                && t.state == TradeState::Pending
        }) {
            return Err(PortError::UniqueViolation {
                constraint: PENDING_TRADE_INDEX.to_string(),
            });
        }
        let trade = Trade {
            id: TradeId(tables.next_id()),
            request_by: requester,
            request_to: owner,
            requested_book: book_id,
            accepted_book: None,
            state: TradeState::Pending,
            trade_start: None,
            trade_end: None,
            created_at: Utc::now(),
        };
        tables.trades.push(trade.clone());
        Ok(trade)
    }

    async fn find_pending_trade(&self, owner: UserId, book_id: BookId) -> PortResult<Option<Trade>> {
        Ok(self
            .lock()
            .trades
            .iter()
            .filter(|t| {
                t.request_to == owner
                    && t.requested_book == book_id
                    && t.state == TradeState::Pending
            })
            .min_by_key(|t| t.id)
            .cloned())
    }

    async fn accept_trade(&self, acceptance: &TradeAcceptance) -> PortResult<String> {
        let mut tables = self.lock();
        let book_free = tables
            .books
            .iter()
            .any(|b| b.id == acceptance.requested_book && !b.is_borrowed());
        let swap_free = match acceptance.accepted_book {
            Some(swap) => tables.books.iter().any(|b| {
                b.id == swap && b.owner_id == acceptance.requester && !b.is_borrowed()
            }),
            None => true,
        };
        let trade = tables
            .trades
            .iter_mut()
            .find(|t| t.id == acceptance.trade_id && !t.state.is_terminal());
        let trade = match trade {
            Some(t) if book_free && swap_free => t,
            _ => return Err(PortError::Conflict("0 rows updated".to_string())),
        };
        trade.state = TradeState::Accepted;
        trade.accepted_book = acceptance.accepted_book;
        trade.trade_start = Some(acceptance.trade_start);
        trade.trade_end = Some(acceptance.trade_end);

        for other in tables.trades.iter_mut().filter(|t| {
            t.requested_book == acceptance.requested_book && t.state == TradeState::Pending
        }) {
            other.state = TradeState::Declined;
        }

        if let Some(swap) = acceptance.accepted_book {
            if let Some(taken) = tables.books.iter_mut().find(|b| b.id == swap) {
                taken.borrowed_to = Some(acceptance.owner);
            }
        }

        let book = tables
            .books
            .iter_mut()
            .find(|b| b.id == acceptance.requested_book)
            .ok_or_else(|| PortError::NotFound(format!("Book {}", acceptance.requested_book)))?;
        book.borrowed_to = Some(acceptance.requester);
        Ok(book.name.clone())
    }

    async fn decline_pending_trades(&self, owner: UserId, book_id: BookId) -> PortResult<u64> {
        let mut declined = 0;
        for trade in self.lock().trades.iter_mut().filter(|t| {
            t.request_to == owner && t.requested_book == book_id && t.state == TradeState::Pending
        }) {
            trade.state = TradeState::Declined;
            declined += 1;
        }
        Ok(declined)
    }

    async fn list_trades_for_user(&self, user_id: UserId) -> PortResult<Vec<TradeView>> {
        let tables = self.lock();
        Ok(tables
            .trades
            .iter()
            .filter(|t| t.request_by == user_id || t.request_to == user_id)
            .filter_map(|t| {
                let book = tables.books.iter().find(|b| b.id == t.requested_book)?;
                Some(TradeView {
                    trade_id: t.id,
                    state: t.state,
                    request_by: t.request_by,
                    request_by_username: tables.username_of(t.request_by),
                    request_to: t.request_to,
                    request_to_username: tables.username_of(t.request_to),
                    book_id: book.id,
                    book_name: book.name.clone(),
                    book_author: book.author.clone(),
                    book_cover_url: book.cover_url.clone(),
                    accepted_book: t.accepted_book,
                    trade_end: t.trade_end,
                })
            })
            .collect())
    }

    async fn delete_declined_trades(&self, requester: UserId) -> PortResult<u64> {
        let mut tables = self.lock();
        let before = tables.trades.len();
        tables
            .trades
            .retain(|t| !(t.request_by == requester && t.state == TradeState::Declined));
        Ok((before - tables.trades.len()) as u64)
    }
}

/// Stands in for argon2; the tests only care that hash and verify agree.
pub struct PlainPasswords;

impl PasswordService for PlainPasswords {
    fn hash_password(&self, password: &str) -> PortResult<String> {
        Ok(format!("plain${}", password))
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("plain$") == Some(password)
    }
}

pub struct Services {
    pub db: Arc<InMemoryDb>,
    pub users: UserDirectory,
    pub books: BookCatalog,
    pub trades: TradeEngine,
}

pub fn services() -> Services {
    let db = Arc::new(InMemoryDb::default());
    let store: Arc<dyn DatabaseService> = db.clone();
    let users = UserDirectory::new(store.clone(), Arc::new(PlainPasswords));
    let books = BookCatalog::new(store.clone(), users.clone());
    let trades = TradeEngine::new(store, users.clone(), books.clone());
    Services {
        db,
        users,
        books,
        trades,
    }
}

pub fn draft(name: &str) -> BookDraft {
    BookDraft {
        name: name.to_string(),
        author: Some("Frank Herbert".to_string()),
        isbn: Some("9780441013593".to_string()),
        cover_url: None,
    }
}

//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use book_trading_core::domain::{
    AuthSession, Book, BookDraft, BookId, NewUser, ProfileUpdate, Trade, TradeAcceptance, TradeId,
    TradeState, TradeView, UserCredentials, UserId, UserProfile,
};
use book_trading_core::ports::{DatabaseService, PortError, PortResult};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Translates driver errors into port errors, keeping the two cases the core
/// reacts to: unique violations (23505) and over-long strings (22001).
fn map_db_error(e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.code().as_deref() {
            Some("23505") => {
                return PortError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                }
            }
            Some("22001") => return PortError::ValueTooLong(db_err.message().to_string()),
            _ => {}
        }
    }
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserProfileRecord {
    username: String,
    email: String,
    city: Option<String>,
    country: Option<String>,
}
impl UserProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            username: self.username,
            email: self.email,
            city: self.city,
            country: self.country,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: i64,
    username: String,
    hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: UserId(self.id),
            username: self.username,
            password_hash: self.hash,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    username: String,
    expires_at: DateTime<Utc>,
}
impl AuthSessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            username: self.username,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: i64,
    name: String,
    author: Option<String>,
    isbn: Option<String>,
    book_cover_url: Option<String>,
    owner_id: i64,
    borrowed_to: Option<i64>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: BookId(self.id),
            name: self.name,
            author: self.author,
            isbn: self.isbn,
            cover_url: self.book_cover_url,
            owner_id: UserId(self.owner_id),
            borrowed_to: self.borrowed_to.map(UserId),
        }
    }
}

#[derive(FromRow)]
struct TradeRecord {
    id: i64,
    request_by: i64,
    request_to: i64,
    requested_book: i64,
    accepted_book: Option<i64>,
    trade_accepted: Option<bool>,
    trade_start: Option<DateTime<Utc>>,
    trade_end: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}
impl TradeRecord {
    fn to_domain(self) -> Trade {
        Trade {
            id: TradeId(self.id),
            request_by: UserId(self.request_by),
            request_to: UserId(self.request_to),
            requested_book: BookId(self.requested_book),
            accepted_book: self.accepted_book.map(BookId),
            state: TradeState::from_flag(self.trade_accepted),
            trade_start: self.trade_start,
            trade_end: self.trade_end,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TradeViewRecord {
    trade_id: i64,
    trade_accepted: Option<bool>,
    request_by: i64,
    request_by_username: String,
    request_to: i64,
    request_to_username: String,
    book_id: i64,
    book_name: String,
    book_author: Option<String>,
    book_cover_url: Option<String>,
    accepted_book: Option<i64>,
    trade_end: Option<NaiveDate>,
}
impl TradeViewRecord {
    fn to_domain(self) -> TradeView {
        TradeView {
            trade_id: TradeId(self.trade_id),
            state: TradeState::from_flag(self.trade_accepted),
            request_by: UserId(self.request_by),
            request_by_username: self.request_by_username,
            request_to: UserId(self.request_to),
            request_to_username: self.request_to_username,
            book_id: BookId(self.book_id),
            book_name: self.book_name,
            book_author: self.book_author,
            book_cover_url: self.book_cover_url,
            accepted_book: self.accepted_book.map(BookId),
            trade_end: self.trade_end,
        }
    }
}

const BOOK_COLUMNS: &str = "id, name, author, isbn, book_cover_url, owner_id, borrowed_to";
const TRADE_COLUMNS: &str = "id, request_by, request_to, requested_book, accepted_book, \
     trade_accepted, trade_start, trade_end, created_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_user_id(&self, username: &str) -> PortResult<Option<UserId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(id.map(UserId))
    }

    async fn find_user_profile(&self, username: &str) -> PortResult<Option<UserProfile>> {
        let record = sqlx::query_as::<_, UserProfileRecord>(
            "SELECT username, email, city, country FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.map(UserProfileRecord::to_domain))
    }

    async fn find_user_credentials(&self, username: &str) -> PortResult<Option<UserCredentials>> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, username, hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.map(CredentialsRecord::to_domain))
    }

    async fn insert_user(&self, user: &NewUser) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, UserProfileRecord>(
            "INSERT INTO users (username, hash, email) VALUES ($1, $2, $3) \
             RETURNING username, email, city, country",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.to_domain())
    }

    async fn update_user_profile(&self, update: &ProfileUpdate) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE users SET email = $2, city = $3, country = $4 WHERE username = $1",
        )
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.city)
        .bind(&update.country)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id.0)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthSession> {
        sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT s.id, u.username, s.expires_at FROM auth_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .map(AuthSessionRecord::to_domain)
        .ok_or_else(|| PortError::NotFound("Auth session not found or expired".to_string()))
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn list_available_books(&self) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE borrowed_to IS NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn insert_book(&self, owner: UserId, draft: &BookDraft) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "INSERT INTO books (name, author, isbn, book_cover_url, borrowed_to, owner_id) \
             VALUES ($1, $2, $3, $4, NULL, $5) RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&draft.name)
        .bind(&draft.author)
        .bind(&draft.isbn)
        .bind(&draft.cover_url)
        .bind(owner.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.to_domain())
    }

    async fn list_books_by_owner(&self, owner: UserId) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE owner_id = $1 ORDER BY id"
        ))
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn list_book_ids_by_owner(&self, owner: UserId) -> PortResult<Vec<BookId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM books WHERE owner_id = $1 ORDER BY id")
                .bind(owner.0)
                .fetch_all(&self.pool)
                .await
                .map_err(map_db_error)?;
        Ok(ids.into_iter().map(BookId).collect())
    }

    async fn find_book(&self, book_id: BookId) -> PortResult<Option<Book>> {
        let record = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"
        ))
        .bind(book_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.map(BookRecord::to_domain))
    }

    async fn find_books(&self, book_ids: &[BookId]) -> PortResult<Vec<Book>> {
        let ids: Vec<i64> = book_ids.iter().map(|id| id.0).collect();
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn sample_available_books(&self, limit: i64) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books \
             WHERE random() < 0.5 AND borrowed_to IS NULL LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn has_active_trade(&self, requester: UserId, book_id: BookId) -> PortResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM trades WHERE request_by = $1 AND requested_book = $2 \
             AND trade_accepted IS DISTINCT FROM FALSE)",
        )
        .bind(requester.0)
        .bind(book_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    async fn insert_trade(
        &self,
        requester: UserId,
        owner: UserId,
        book_id: BookId,
    ) -> PortResult<Trade> {
        let record = sqlx::query_as::<_, TradeRecord>(&format!(
            "INSERT INTO trades (request_by, request_to, requested_book, accepted_book, \
             trade_accepted, trade_start, trade_end) \
             VALUES ($1, $2, $3, NULL, NULL, NULL, NULL) RETURNING {TRADE_COLUMNS}"
        ))
        .bind(requester.0)
        .bind(owner.0)
        .bind(book_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.to_domain())
    }

    async fn find_pending_trade(&self, owner: UserId, book_id: BookId) -> PortResult<Option<Trade>> {
        let record = sqlx::query_as::<_, TradeRecord>(&format!(
            "SELECT {TRADE_COLUMNS} FROM trades \
             WHERE request_to = $1 AND requested_book = $2 AND trade_accepted IS NULL \
             ORDER BY created_at, id LIMIT 1"
        ))
        .bind(owner.0)
        .bind(book_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.map(TradeRecord::to_domain))
    }

    /// Runs in one transaction. The lent book and the swap book are locked
    /// together in id order, so competing acceptances always queue on the same
    /// rows in the same order.
    async fn accept_trade(&self, acceptance: &TradeAcceptance) -> PortResult<String> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // 1. Lock the book (and the swap book) and make sure both are still free.
        let mut ids = vec![acceptance.requested_book.0];
        ids.extend(acceptance.accepted_book.map(|b| b.0));
        let locked = sqlx::query_as::<_, BookRecord>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let book = locked
            .iter()
            .find(|b| b.id == acceptance.requested_book.0)
            .ok_or_else(|| {
                PortError::NotFound(format!("Book {} not found", acceptance.requested_book))
            })?;
        if let Some(holder) = book.borrowed_to {
            return Err(PortError::Conflict(format!(
                "book {} is already lent to user {}",
                acceptance.requested_book, holder
            )));
        }
        let book_name = book.name.clone();

        if let Some(swap) = acceptance.accepted_book {
            let free = locked.iter().any(|b| {
                b.id == swap.0 && b.owner_id == acceptance.requester.0 && b.borrowed_to.is_none()
            });
            if !free {
                return Err(PortError::Conflict(format!(
                    "swap book {} is no longer available from user {}",
                    swap, acceptance.requester
                )));
            }
        }

        // 2. Accept the trade only if it is still pending.
        let accepted = sqlx::query(
            "UPDATE trades SET trade_accepted = TRUE, trade_start = $2, trade_end = $3, \
             accepted_book = $4 \
             WHERE id = $1 AND request_to = $5 AND requested_book = $6 AND trade_accepted IS NULL",
        )
        .bind(acceptance.trade_id.0)
        .bind(acceptance.trade_start)
        .bind(acceptance.trade_end)
        .bind(acceptance.accepted_book.map(|b| b.0))
        .bind(acceptance.owner.0)
        .bind(acceptance.requested_book.0)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?
        .rows_affected();
        if accepted == 0 {
            return Err(PortError::Conflict(format!(
                "trade {} is no longer pending",
                acceptance.trade_id
            )));
        }

        // 3. Lend the book.
        sqlx::query("UPDATE books SET borrowed_to = $1 WHERE id = $2")
            .bind(acceptance.requester.0)
            .bind(acceptance.requested_book.0)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;

        // 4. The swap book goes the other way.
        if let Some(swap) = acceptance.accepted_book {
            sqlx::query("UPDATE books SET borrowed_to = $1 WHERE id = $2")
                .bind(acceptance.owner.0)
                .bind(swap.0)
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
        }

        // 5. Everyone else waiting for this book is turned down.
        sqlx::query(
            "UPDATE trades SET trade_accepted = FALSE \
             WHERE requested_book = $1 AND trade_accepted IS NULL",
        )
        .bind(acceptance.requested_book.0)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(book_name)
    }

    async fn decline_pending_trades(&self, owner: UserId, book_id: BookId) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE trades SET trade_accepted = FALSE \
             WHERE request_to = $1 AND requested_book = $2 AND trade_accepted IS NULL",
        )
        .bind(owner.0)
        .bind(book_id.0)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }

    async fn list_trades_for_user(&self, user_id: UserId) -> PortResult<Vec<TradeView>> {
        let records = sqlx::query_as::<_, TradeViewRecord>(
            "SELECT t.id AS trade_id, t.trade_accepted, \
                    t.request_by, rb.username AS request_by_username, \
                    t.request_to, rt.username AS request_to_username, \
                    b.id AS book_id, b.name AS book_name, b.author AS book_author, \
                    b.book_cover_url, t.accepted_book, t.trade_end \
             FROM trades AS t \
             JOIN books AS b ON t.requested_book = b.id \
             JOIN users AS rb ON rb.id = t.request_by \
             JOIN users AS rt ON rt.id = t.request_to \
             WHERE t.request_to = $1 OR t.request_by = $1 \
             ORDER BY t.created_at DESC, t.id DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(records.into_iter().map(TradeViewRecord::to_domain).collect())
    }

    async fn delete_declined_trades(&self, requester: UserId) -> PortResult<u64> {
        let result =
            sqlx::query("DELETE FROM trades WHERE request_by = $1 AND trade_accepted = FALSE")
                .bind(requester.0)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;
        Ok(result.rows_affected())
    }
}

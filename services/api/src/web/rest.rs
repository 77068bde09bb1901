//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{auth, middleware::CurrentUser, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use book_trading_core::{
    Book, BookDraft, BookId, CoreError, ProfileUpdate, TradeState, TradeView, UserProfile,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        list_available_books_handler,
        sample_books_handler,
        get_profile_handler,
        update_profile_handler,
        list_my_books_handler,
        add_book_handler,
        list_my_book_ids_handler,
        trade_overview_handler,
        request_trade_handler,
        accept_trade_handler,
        decline_trade_handler,
        purge_declined_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            BookResponse,
            AddBookRequest,
            ProfileResponse,
            UpdateProfileRequest,
            TradeStatus,
            TradeResponse,
            TradeOverviewResponse,
            TradeRequest,
            AcceptTradeRequest,
            AcceptTradeResponse,
            PurgeResponse,
        )
    ),
    tags(
        (name = "Book Trading API", description = "Lend books to other readers and borrow theirs.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Turns a core failure into the status and user-facing message a handler returns.
pub fn core_failure(err: CoreError) -> (StatusCode, String) {
    let status = match &err {
        CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
        CoreError::Auth => StatusCode::UNAUTHORIZED,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict { .. }
        | CoreError::DuplicateRequest { .. }
        | CoreError::AlreadyBorrowed { .. } => StatusCode::CONFLICT,
        CoreError::SelfTrade => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::Internal { detail } => {
            error!("Request failed: {}", detail);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    id: i64,
    name: String,
    author: Option<String>,
    isbn: Option<String>,
    cover_url: Option<String>,
    owner_id: i64,
    /// The user currently holding the book, if it is lent out.
    borrowed_to: Option<i64>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id.0,
            name: book.name,
            author: book.author,
            isbn: book.isbn,
            cover_url: book.cover_url,
            owner_id: book.owner_id.0,
            borrowed_to: book.borrowed_to.map(|u| u.0),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AddBookRequest {
    name: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    isbn: Option<String>,
    #[serde(default)]
    cover_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    username: String,
    email: String,
    city: Option<String>,
    country: Option<String>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            username: profile.username,
            email: profile.email,
            city: profile.city,
            country: profile.country,
        }
    }
}

/// Blank `city` or `country` clears the field.
#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    email: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Serialize, ToSchema, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Accepted,
    Declined,
}

impl From<TradeState> for TradeStatus {
    fn from(state: TradeState) -> Self {
        match state {
            TradeState::Pending => TradeStatus::Pending,
            TradeState::Accepted => TradeStatus::Accepted,
            TradeState::Declined => TradeStatus::Declined,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TradeResponse {
    trade_id: i64,
    status: TradeStatus,
    request_by: i64,
    request_by_username: String,
    request_to: i64,
    request_to_username: String,
    book_id: i64,
    book_name: String,
    book_author: Option<String>,
    book_cover_url: Option<String>,
    /// The requester's book taken in return, for swaps.
    accepted_book: Option<i64>,
    trade_end: Option<NaiveDate>,
}

impl From<TradeView> for TradeResponse {
    fn from(view: TradeView) -> Self {
        Self {
            trade_id: view.trade_id.0,
            status: view.state.into(),
            request_by: view.request_by.0,
            request_by_username: view.request_by_username,
            request_to: view.request_to.0,
            request_to_username: view.request_to_username,
            book_id: view.book_id.0,
            book_name: view.book_name,
            book_author: view.book_author,
            book_cover_url: view.book_cover_url,
            accepted_book: view.accepted_book.map(|b| b.0),
            trade_end: view.trade_end,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TradeOverviewResponse {
    /// Pending requests other users have made for my books.
    incoming: Vec<TradeResponse>,
    /// Every request I have made that is still on record.
    outgoing: Vec<TradeResponse>,
}

#[derive(Deserialize, ToSchema)]
pub struct TradeRequest {
    book_id: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct AcceptTradeRequest {
    /// Date the book is due back.
    trade_end: NaiveDate,
    #[serde(default)]
    accepted_book: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct AcceptTradeResponse {
    book_id: i64,
    book_name: String,
}

#[derive(Serialize, ToSchema)]
pub struct PurgeResponse {
    removed: u64,
}

//=========================================================================================
// Book Handlers
//=========================================================================================

/// List every book that is not currently lent out.
#[utoipa::path(
    get,
    path = "/books",
    responses(
        (status = 200, description = "Available books", body = [BookResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_available_books_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let books = state.books.list_available().await.map_err(core_failure)?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect::<Vec<_>>()))
}

/// A random handful of available books for the homepage.
#[utoipa::path(
    get,
    path = "/books/sample",
    responses(
        (status = 200, description = "Random available books", body = [BookResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn sample_books_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let books = state
        .books
        .sample_available(state.config.sample_size)
        .await
        .map_err(core_failure)?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    get,
    path = "/users/me/books",
    responses(
        (status = 200, description = "All of my books, lent out or not", body = [BookResponse]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_my_books_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let books = state
        .books
        .list_for_owner(&username)
        .await
        .map_err(core_failure)?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    post,
    path = "/users/me/books",
    request_body = AddBookRequest,
    responses(
        (status = 201, description = "Book added", body = BookResponse),
        (status = 400, description = "Title missing or a field too long"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn add_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(req): Json<AddBookRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let draft = BookDraft {
        name: req.name,
        author: req.author,
        isbn: req.isbn,
        cover_url: req.cover_url,
    };
    let book = state
        .books
        .add_book(&username, draft)
        .await
        .map_err(core_failure)?;
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

#[utoipa::path(
    get,
    path = "/users/me/book-ids",
    responses(
        (status = 200, description = "Ids of my books", body = [i64]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_my_book_ids_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ids = state
        .books
        .list_ids_for_owner(&username)
        .await
        .map_err(core_failure)?;
    Ok(Json(ids.into_iter().map(|id| id.0).collect::<Vec<_>>()))
}

//=========================================================================================
// Profile Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "My profile", body = ProfileResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = state.users.get_profile(&username).await.map_err(core_failure)?;
    Ok(Json(ProfileResponse::from(profile)))
}

#[utoipa::path(
    post,
    path = "/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid email"),
        (status = 401, description = "Not logged in"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let update = ProfileUpdate {
        username: username.clone(),
        email: req.email,
        city: req.city,
        country: req.country,
    };
    state.users.update_profile(update).await.map_err(core_failure)?;

    let profile = state.users.get_profile(&username).await.map_err(core_failure)?;
    Ok(Json(ProfileResponse::from(profile)))
}

//=========================================================================================
// Trade Handlers
//=========================================================================================

/// The trade page: my declined requests are cleared first, then the rest is split
/// into incoming and outgoing.
#[utoipa::path(
    get,
    path = "/trades",
    responses(
        (status = 200, description = "Incoming and outgoing trades", body = TradeOverviewResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn trade_overview_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let overview = state
        .trades
        .trade_overview(&username)
        .await
        .map_err(core_failure)?;
    Ok(Json(TradeOverviewResponse {
        incoming: overview.incoming.into_iter().map(TradeResponse::from).collect(),
        outgoing: overview.outgoing.into_iter().map(TradeResponse::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/trades",
    request_body = TradeRequest,
    responses(
        (status = 201, description = "Trade requested"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No such book"),
        (status = 409, description = "Already requested or already borrowed"),
        (status = 422, description = "The book is mine")
    )
)]
pub async fn request_trade_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(req): Json<TradeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let trade = state
        .trades
        .request_trade(&username, BookId(req.book_id))
        .await
        .map_err(core_failure)?;
    info!("Trade {} requested by {}", trade.id, username);
    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    post,
    path = "/trades/{book_id}/accept",
    request_body = AcceptTradeRequest,
    params(("book_id" = i64, Path, description = "The requested book, owned by me.")),
    responses(
        (status = 200, description = "Book lent out", body = AcceptTradeResponse),
        (status = 400, description = "The swap book cannot be taken"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No pending request for this book"),
        (status = 409, description = "The book is already borrowed")
    )
)]
pub async fn accept_trade_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
    Json(req): Json<AcceptTradeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let book_name = state
        .trades
        .accept_trade(
            &username,
            BookId(book_id),
            req.accepted_book.map(BookId),
            req.trade_end,
        )
        .await
        .map_err(core_failure)?;
    Ok(Json(AcceptTradeResponse { book_id, book_name }))
}

#[utoipa::path(
    post,
    path = "/trades/{book_id}/decline",
    params(("book_id" = i64, Path, description = "The requested book, owned by me.")),
    responses(
        (status = 204, description = "Pending requests declined"),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "No pending request for this book")
    )
)]
pub async fn decline_trade_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(book_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .trades
        .decline_trade(&username, BookId(book_id))
        .await
        .map_err(core_failure)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/trades/declined",
    responses(
        (status = 200, description = "My declined requests removed", body = PurgeResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn purge_declined_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let removed = state
        .trades
        .purge_declined_outgoing(&username)
        .await
        .map_err(core_failure)?;
    Ok(Json(PurgeResponse { removed }))
}

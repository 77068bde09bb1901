pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use auth::{login_handler, logout_handler, signup_handler};
use rest::{
    accept_trade_handler, add_book_handler, decline_trade_handler, get_profile_handler,
    list_available_books_handler, list_my_book_ids_handler, list_my_books_handler,
    purge_declined_handler, request_trade_handler, sample_books_handler, trade_overview_handler,
    update_profile_handler,
};
use state::AppState;

/// Builds the API router: public auth and browsing routes, plus the routes that
/// need a logged-in user behind `require_auth`.
pub fn router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(app_state.config.cors_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/books", get(list_available_books_handler))
        .route("/books/sample", get(sample_books_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/users/me", get(get_profile_handler).post(update_profile_handler))
        .route("/users/me/books", get(list_my_books_handler).post(add_book_handler))
        .route("/users/me/book-ids", get(list_my_book_ids_handler))
        .route("/trades", get(trade_overview_handler).post(request_trade_handler))
        .route("/trades/declined", delete(purge_declined_handler))
        .route("/trades/{book_id}/accept", post(accept_trade_handler))
        .route("/trades/{book_id}/decline", post(decline_trade_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

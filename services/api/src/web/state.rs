//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use book_trading_core::{
    ports::{DatabaseService, PasswordService},
    BookCatalog, TradeEngine, UserDirectory,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Used directly only for login sessions; everything else goes through the components.
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub users: UserDirectory,
    pub books: BookCatalog,
    pub trades: TradeEngine,
}

impl AppState {
    /// Wires the three core components over one store.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        passwords: Arc<dyn PasswordService>,
        config: Arc<Config>,
    ) -> Self {
        let users = UserDirectory::new(db.clone(), passwords);
        let books = BookCatalog::new(db.clone(), users.clone());
        let trades = TradeEngine::new(db.clone(), users.clone(), books.clone());
        Self {
            db,
            config,
            users,
            books,
            trades,
        }
    }
}

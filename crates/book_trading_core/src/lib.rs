pub mod catalog;
pub mod domain;
pub mod error;
pub mod ports;
pub mod trades;
pub mod users;
pub mod validation;

pub use catalog::BookCatalog;
pub use domain::{
    AuthSession, AuthenticatedUser, Book, BookDraft, BookId, NewUser, ProfileUpdate, Trade,
    TradeAcceptance, TradeId, TradeOverview, TradeState, TradeView, UserCredentials, UserId,
    UserProfile,
};
pub use error::{ConflictSubject, CoreError, CoreResult};
pub use ports::{DatabaseService, PasswordService, PortError, PortResult};
pub use trades::TradeEngine;
pub use users::UserDirectory;

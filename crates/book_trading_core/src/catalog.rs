//! crates/book_trading_core/src/catalog.rs
//!
//! The book catalog. Owns book rows; the only field it never writes is
//! `borrowed_to`, which belongs to the trade engine.

use std::sync::Arc;

use tracing::info;

use crate::domain::{Book, BookDraft, BookId, UserId};
use crate::error::{CoreError, CoreResult};
use crate::ports::{DatabaseService, PortError};
use crate::users::UserDirectory;
use crate::validation;

#[derive(Clone)]
pub struct BookCatalog {
    db: Arc<dyn DatabaseService>,
    users: UserDirectory,
}

impl BookCatalog {
    pub fn new(db: Arc<dyn DatabaseService>, users: UserDirectory) -> Self {
        Self { db, users }
    }

    /// Every book nobody is currently borrowing.
    pub async fn list_available(&self) -> CoreResult<Vec<Book>> {
        Ok(self.db.list_available_books().await?)
    }

    pub async fn add_book(&self, owner_username: &str, draft: BookDraft) -> CoreResult<Book> {
        let owner = self.users.resolve_id(owner_username).await?;
        let draft = draft.normalized();
        validation::validate_book_draft(&draft)?;

        let book = self
            .db
            .insert_book(owner, &draft)
            .await
            .map_err(|e| match e {
                PortError::ValueTooLong(_) => CoreError::validation(
                    "book",
                    "One of the book details is too long.",
                ),
                other => other.into(),
            })?;

        info!("User {} added book {} ({})", owner_username, book.id, book.name);
        Ok(book)
    }

    pub async fn list_for_owner(&self, owner_username: &str) -> CoreResult<Vec<Book>> {
        let owner = self.users.resolve_id(owner_username).await?;
        Ok(self.db.list_books_by_owner(owner).await?)
    }

    pub async fn list_ids_for_owner(&self, owner_username: &str) -> CoreResult<Vec<BookId>> {
        let owner = self.users.resolve_id(owner_username).await?;
        Ok(self.db.list_book_ids_by_owner(owner).await?)
    }

    pub async fn get_owner(&self, book_id: BookId) -> CoreResult<UserId> {
        Ok(self.get_by_id(book_id).await?.owner_id)
    }

    pub async fn get_by_id(&self, book_id: BookId) -> CoreResult<Book> {
        self.db
            .find_book(book_id)
            .await?
            .ok_or_else(|| CoreError::book_not_found(book_id))
    }

    /// Unknown ids are skipped, and the order of the result is unspecified.
    pub async fn get_by_ids(&self, book_ids: &[BookId]) -> CoreResult<Vec<Book>> {
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.db.find_books(book_ids).await?)
    }

    /// A loose random pick of at most `n` available books for the front page.
    pub async fn sample_available(&self, n: i64) -> CoreResult<Vec<Book>> {
        Ok(self.db.sample_available_books(n.max(0)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockDatabaseService, MockPasswordService};
    use mockall::predicate::eq;

    fn catalog(db: MockDatabaseService) -> BookCatalog {
        let db: Arc<dyn DatabaseService> = Arc::new(db);
        let users = UserDirectory::new(db.clone(), Arc::new(MockPasswordService::new()));
        BookCatalog::new(db, users)
    }

    #[tokio::test]
    async fn get_by_ids_with_no_ids_skips_the_store() {
        let books = catalog(MockDatabaseService::new()).get_by_ids(&[]).await.unwrap();
        assert!(books.is_empty());
    }

    #[tokio::test]
    async fn get_owner_of_missing_book_is_not_found() {
        let mut db = MockDatabaseService::new();
        db.expect_find_book().with(eq(BookId(42))).returning(|_| Ok(None));

        let err = catalog(db).get_owner(BookId(42)).await.unwrap_err();
        assert_eq!(err, CoreError::book_not_found(BookId(42)));
    }

    #[tokio::test]
    async fn add_book_for_unknown_owner_is_not_found() {
        let mut db = MockDatabaseService::new();
        db.expect_find_user_id().returning(|_| Ok(None));

        let draft = BookDraft {
            name: "Dune".to_string(),
            author: Some("Frank Herbert".to_string()),
            isbn: None,
            cover_url: None,
        };
        let err = catalog(db).add_book("nobody1", draft).await.unwrap_err();
        assert_eq!(err, CoreError::user_not_found("nobody1"));
    }

    #[tokio::test]
    async fn store_length_errors_surface_as_validation() {
        let mut db = MockDatabaseService::new();
        db.expect_find_user_id().returning(|_| Ok(Some(UserId(1))));
        db.expect_insert_book()
            .returning(|_, _| Err(PortError::ValueTooLong("value too long for type".into())));

        let draft = BookDraft {
            name: "Dune".to_string(),
            author: None,
            isbn: None,
            cover_url: None,
        };
        let err = catalog(db).add_book("alice", draft).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "book", .. }));
    }

    #[tokio::test]
    async fn negative_sample_size_is_clamped() {
        let mut db = MockDatabaseService::new();
        db.expect_sample_available_books()
            .with(eq(0_i64))
            .returning(|_| Ok(Vec::new()));

        assert!(catalog(db).sample_available(-3).await.unwrap().is_empty());
    }
}

//! crates/book_trading_core/src/validation.rs
//!
//! Input rules for registration and book submission. Each check returns the
//! first problem it finds as a `CoreError::Validation`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::BookDraft;
use crate::error::{CoreError, CoreResult};

pub const USERNAME_MIN: usize = 5;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 50;

// Column sizes of the `books` table.
pub const BOOK_NAME_MAX: usize = 200;
pub const BOOK_AUTHOR_MAX: usize = 100;
pub const BOOK_ISBN_MAX: usize = 20;
pub const BOOK_COVER_URL_MAX: usize = 500;

static EMAIL_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .expect("email pattern is valid")
});

pub fn validate_username(username: &str) -> CoreResult<()> {
    check_credential("username", "Username", username, USERNAME_MIN, USERNAME_MAX)
}

pub fn validate_password(password: &str) -> CoreResult<()> {
    check_credential("password", "Password", password, PASSWORD_MIN, PASSWORD_MAX)
}

pub fn validate_email(email: &str) -> CoreResult<()> {
    if email.is_empty() {
        return Err(CoreError::validation("email", "Email missing."));
    }
    if !EMAIL_FORMAT.is_match(email) {
        return Err(CoreError::validation(
            "email",
            "Please enter a valid email address.",
        ));
    }
    Ok(())
}

/// Registration checks, in the order the user sees them.
pub fn validate_registration(username: &str, password: &str, email: &str) -> CoreResult<()> {
    validate_username(username)?;
    validate_password(password)?;
    validate_email(email)
}

/// Expects a draft that has already been through `BookDraft::normalized`.
pub fn validate_book_draft(draft: &BookDraft) -> CoreResult<()> {
    if draft.name.is_empty() {
        return Err(CoreError::validation("name", "Book title missing."));
    }
    check_max_len("name", "Book title", Some(&draft.name), BOOK_NAME_MAX)?;
    check_max_len("author", "Author name", draft.author.as_deref(), BOOK_AUTHOR_MAX)?;
    check_max_len("isbn", "ISBN", draft.isbn.as_deref(), BOOK_ISBN_MAX)?;
    check_max_len("cover_url", "Cover URL", draft.cover_url.as_deref(), BOOK_COVER_URL_MAX)
}

fn check_credential(
    field: &'static str,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::validation(field, format!("{} missing.", label)));
    }
    // A bad character outranks a bad length.
    if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::validation(
            field,
            format!("{} must only contain letters and numbers.", label),
        ));
    }
    let len = value.chars().count();
    if len < min {
        return Err(CoreError::validation(
            field,
            format!("{} must be at least {} characters long.", label, min),
        ));
    }
    if len > max {
        return Err(CoreError::validation(
            field,
            format!("{} must be less than {} characters long.", label, max),
        ));
    }
    Ok(())
}

fn check_max_len(field: &'static str, label: &str, value: Option<&str>, max: usize) -> CoreResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(CoreError::validation(
            field,
            format!("{} must be at most {} characters long.", label, max),
        )),
        _ => Ok(()),
    }
}

//! crates/book_trading_core/src/users.rs
//!
//! The user directory: registration, login and profile maintenance.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{AuthenticatedUser, NewUser, ProfileUpdate, UserId, UserProfile};
use crate::error::{CoreError, CoreResult};
use crate::ports::{DatabaseService, PasswordService, PortError};
use crate::validation;

/// Constraint names the store reports for the two unique columns of `users`.
pub const USERNAME_CONSTRAINT: &str = "users_username_key";
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Clone)]
pub struct UserDirectory {
    db: Arc<dyn DatabaseService>,
    passwords: Arc<dyn PasswordService>,
}

impl UserDirectory {
    pub fn new(db: Arc<dyn DatabaseService>, passwords: Arc<dyn PasswordService>) -> Self {
        Self { db, passwords }
    }

    pub async fn resolve_id(&self, username: &str) -> CoreResult<UserId> {
        self.db
            .find_user_id(username)
            .await?
            .ok_or_else(|| CoreError::user_not_found(username))
    }

    pub async fn get_profile(&self, username: &str) -> CoreResult<UserProfile> {
        self.db
            .find_user_profile(username)
            .await?
            .ok_or_else(|| CoreError::user_not_found(username))
    }

    /// Validates, hashes the password and stores the new user.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> CoreResult<UserProfile> {
        validation::validate_registration(username, password, email)?;

        let password_hash = self.passwords.hash_password(password)?;
        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        };

        let profile = self
            .db
            .insert_user(&new_user)
            .await
            .map_err(|e| match e {
                PortError::UniqueViolation { constraint } if constraint == USERNAME_CONSTRAINT => {
                    CoreError::username_taken(username)
                }
                PortError::UniqueViolation { constraint } if constraint == EMAIL_CONSTRAINT => {
                    CoreError::email_taken(email)
                }
                other => other.into(),
            })?;

        info!("Registered user {}", profile.username);
        Ok(profile)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> CoreResult<AuthenticatedUser> {
        let Some(credentials) = self.db.find_user_credentials(username).await? else {
            return Err(CoreError::Auth);
        };

        if !self
            .passwords
            .verify_password(password, &credentials.password_hash)
        {
            warn!("Failed login attempt for {}", username);
            return Err(CoreError::Auth);
        }

        Ok(AuthenticatedUser {
            user_id: credentials.user_id,
            username: credentials.username,
        })
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> CoreResult<()> {
        let update = update.normalized();
        validation::validate_email(&update.email)?;

        let updated = self
            .db
            .update_user_profile(&update)
            .await
            .map_err(|e| match e {
                PortError::UniqueViolation { constraint } if constraint == EMAIL_CONSTRAINT => {
                    CoreError::email_taken(&update.email)
                }
                other => other.into(),
            })?;

        if updated == 0 {
            return Err(CoreError::user_not_found(&update.username));
        }
        Ok(())
    }
}

//! User service
//!
//! Registration, login and session lookup. This is the identity provider the
//! resource services rely on: it turns an opaque session token into a
//! [`User`], and nothing else in the crate inspects credentials.

use crate::db::repositories::{is_unique_violation, SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::services::password::{self, hash_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::services::FieldError;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(FieldError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Login request body. `username` may also be an email address.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// A freshly opened session and the user it belongs to
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    pub user: User,
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    /// - `ValidationError` for a blank username, a malformed email, a short
    ///   password, or a username/email that is already taken
    pub async fn register(&self, input: &CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim();
        let email = input.email.trim();
        validate_registration(username, email, &input.password)?;

        if self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::ValidationError(FieldError::new(
                "username",
                "A user with that username already exists.",
            )));
        }
        if self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::ValidationError(FieldError::new(
                "email",
                "A user with that email already exists.",
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(username.to_string(), email.to_string(), password_hash);

        let created = self.user_repo.create(&user).await.map_err(|e| {
            if is_unique_violation(&e) {
                UserServiceError::ValidationError(FieldError::new(
                    "username",
                    "A user with that username or email already exists.",
                ))
            } else {
                UserServiceError::InternalError(e.context("Failed to create user"))
            }
        })?;

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Check credentials and open a new session
    pub async fn login(&self, input: &LoginInput) -> Result<LoginOutcome, UserServiceError> {
        let user = match self.find_by_username_or_email(input.username.trim()).await? {
            Some(user) => user,
            None => {
                tracing::warn!(username = %input.username, "Login failed: unknown user");
                return Err(UserServiceError::AuthenticationError(
                    INVALID_CREDENTIALS.to_string(),
                ));
            }
        };

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::warn!(user_id = user.id, "Login failed: wrong password");
            return Err(UserServiceError::AuthenticationError(
                INVALID_CREDENTIALS.to_string(),
            ));
        }

        let now = Utc::now();
        let session = self
            .session_repo
            .create(&Session {
                id: Uuid::new_v4().to_string(),
                user_id: user.id,
                expires_at: now + Duration::days(self.session_days),
                created_at: now,
            })
            .await
            .context("Failed to create session")?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome { session, user })
    }

    /// Invalidate a session token
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens resolve to `None`; an expired session is
    /// deleted on the way.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            tracing::debug!(user_id = session.user_id, "Expired session removed");
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get session user")?;
        Ok(user)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(login)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        let user = self
            .user_repo
            .get_by_email(login)
            .await
            .context("Failed to get user by email")?;
        Ok(user)
    }
}

fn validate_registration(username: &str, email: &str, password: &str) -> Result<(), UserServiceError> {
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(FieldError::blank("username")));
    }
    if email.is_empty() {
        return Err(UserServiceError::ValidationError(FieldError::blank("email")));
    }
    if !email.contains('@') {
        return Err(UserServiceError::ValidationError(FieldError::new(
            "email",
            "Enter a valid email address.",
        )));
    }
    if !password::is_acceptable(password) {
        return Err(UserServiceError::ValidationError(FieldError::new(
            "password",
            format!("Ensure this field has at least {} characters.", MIN_PASSWORD_LENGTH),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup(session_days: i64) -> (UserService, Arc<dyn SessionRepository>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(SqlxUserRepository::boxed(pool), sessions.clone(), session_days);
        (service, sessions)
    }

    fn alice() -> CreateUserInput {
        CreateUserInput {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "password123".to_string(),
        }
    }

    fn login(username: &str, password: &str) -> LoginInput {
        LoginInput {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login_by_username_or_email() {
        let (service, _) = setup(7).await;
        let user = service.register(&alice()).await.unwrap();
        assert_ne!(user.password_hash, "password123");

        let by_name = service.login(&login("alice", "password123")).await.unwrap();
        assert_eq!(by_name.user.id, user.id);
        let by_email = service.login(&login("alice@example.com", "password123")).await.unwrap();
        assert_ne!(by_name.session.id, by_email.session.id);

        let resolved = service.validate_session(&by_name.session.id).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (service, _) = setup(7).await;

        let short = CreateUserInput {
            password: "short".to_string(),
            ..alice()
        };
        match service.register(&short).await {
            Err(UserServiceError::ValidationError(err)) => assert_eq!(err.field, "password"),
            other => panic!("expected validation error, got {:?}", other),
        }

        service.register(&alice()).await.unwrap();
        let dup_email = CreateUserInput {
            username: "alice2".to_string(),
            ..alice()
        };
        match service.register(&dup_email).await {
            Err(UserServiceError::ValidationError(err)) => assert_eq!(err.field, "email"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (service, _) = setup(7).await;
        service.register(&alice()).await.unwrap();

        assert!(matches!(
            service.login(&login("alice", "wrong-password")).await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        assert!(matches!(
            service.login(&login("nobody", "password123")).await,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let (service, _) = setup(7).await;
        service.register(&alice()).await.unwrap();
        let outcome = service.login(&login("alice", "password123")).await.unwrap();

        service.logout(&outcome.session.id).await.unwrap();
        assert!(service.validate_session(&outcome.session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_deleted() {
        let (service, sessions) = setup(-1).await;
        service.register(&alice()).await.unwrap();
        let outcome = service.login(&login("alice", "password123")).await.unwrap();

        assert!(service.validate_session(&outcome.session.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&outcome.session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_none() {
        let (service, _) = setup(7).await;
        assert!(service.validate_session("no-such-token").await.unwrap().is_none());
    }
}

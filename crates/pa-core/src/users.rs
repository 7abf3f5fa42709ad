use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::User;
use crate::traits::{AuthProvider, UserRepo};
use crate::validation::{validate_password, validate_username};

/// An authenticated user together with a fresh bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

pub struct UserService {
    repo: Arc<dyn UserRepo>,
    auth: Arc<dyn AuthProvider>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepo>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { repo, auth }
    }

    pub async fn signup(&self, username: &str, password: &str) -> Result<Session> {
        validate_username(username)?;
        validate_password(password)?;

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: self.auth.hash_password(password)?,
            locality_id: None,
            created_at: Utc::now(),
        };
        self.repo.create_user(&user).await?;
        log::info!("user {} signed up as {}", user.id, user.username);

        let token = self.auth.issue_token(user.id);
        Ok(Session { user, token })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user = match self.repo.get_user_by_username(username).await {
            Ok(user) => user,
            Err(err) if err.is_not_found() => return Err(wrong_credentials()),
            Err(err) => return Err(err),
        };
        if !self.auth.verify_password(password, &user.password_hash) {
            log::debug!("failed login attempt for {username}");
            return Err(wrong_credentials());
        }

        let token = self.auth.issue_token(user.id);
        Ok(Session { user, token })
    }

    pub async fn current(&self, user_id: Uuid) -> Result<User> {
        self.repo.get_user_by_id(user_id).await
    }

    pub async fn set_locality(&self, user_id: Uuid, locality_id: Uuid) -> Result<User> {
        self.repo.set_locality(user_id, locality_id).await?;
        self.repo.get_user_by_id(user_id).await
    }
}

fn wrong_credentials() -> AppError {
    AppError::Unauthorized("wrong username or password".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockAuthProvider, MockUserRepo};

    fn auth() -> MockAuthProvider {
        let mut auth = MockAuthProvider::new();
        auth.expect_hash_password().returning(|p| Ok(format!("hashed:{p}")));
        auth.expect_verify_password().returning(|p, h| h == format!("hashed:{p}"));
        auth.expect_issue_token().returning(|id| format!("token-{id}"));
        auth
    }

    fn stored(username: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.into(),
            password_hash: "hashed:password1".into(),
            locality_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_signup_hashes_and_issues_token() {
        let mut repo = MockUserRepo::new();
        repo.expect_create_user()
            .withf(|u| u.username == "barsik_fan" && u.password_hash == "hashed:password1")
            .times(1)
            .returning(|_| Ok(()));

        let users = UserService::new(Arc::new(repo), Arc::new(auth()));
        let session = users.signup("barsik_fan", "password1").await.unwrap();
        assert_eq!(session.token, format!("token-{}", session.user.id));
    }

    #[tokio::test]
    async fn test_signup_rejects_bad_username() {
        let mut repo = MockUserRepo::new();
        repo.expect_create_user().never();

        let users = UserService::new(Arc::new(repo), Arc::new(auth()));
        let err = users.signup("a b", "password1").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_signup_duplicate_is_conflict() {
        let mut repo = MockUserRepo::new();
        repo.expect_create_user()
            .returning(|_| Err(AppError::Conflict("username taken".into())));

        let users = UserService::new(Arc::new(repo), Arc::new(auth()));
        let err = users.signup("barsik_fan", "password1").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user_by_username().returning(|name| Ok(stored(name)));

        let users = UserService::new(Arc::new(repo), Arc::new(auth()));
        assert!(users.login("barsik_fan", "password1").await.is_ok());
        let err = users.login("barsik_fan", "password2").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_login_unknown_user_is_unauthorized() {
        let mut repo = MockUserRepo::new();
        repo.expect_get_user_by_username()
            .returning(|name| Err(AppError::not_found("User", name)));

        let users = UserService::new(Arc::new(repo), Arc::new(auth()));
        let err = users.login("ghost", "password1").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}

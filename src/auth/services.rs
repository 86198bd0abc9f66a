use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};

use super::{
    password::{check_policy, hash_password, password_matches},
    repo_types::User,
};
use crate::{
    config::PasswordPolicy,
    error::{AppError, AuthError},
    state::AppState,
    store::{Store, StoreError},
};

/// Credential Store: user creation and password verification.
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn Store>,
    policy: PasswordPolicy,
}

impl FromRef<AppState> for Credentials {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.config.password.clone())
    }
}

impl Credentials {
    pub fn new(store: Arc<dyn Store>, policy: PasswordPolicy) -> Self {
        Self { store, policy }
    }

    /// Validation runs before any store mutation. A taken username is a
    /// conflict, including when a concurrent sign-up wins the insert.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User, AppError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::validation("Username and password are required"));
        }
        check_policy(password, &self.policy)?;

        if self.store.find_user_by_username(username).await?.is_some() {
            warn!(%username, "username already registered");
            return Err(AppError::Conflict("Username already exists".into()));
        }

        let digest = hash_password(password).map_err(|e| AppError::internal("hash password", e))?;
        let user = match self.store.insert_user(username, &digest).await {
            Ok(u) => u,
            Err(StoreError::UniqueViolation) => {
                return Err(AppError::Conflict("Username already exists".into()))
            }
            Err(e) => return Err(e.into()),
        };
        info!(user_id = %user.id, %username, "user registered");
        Ok(user)
    }

    pub async fn verify(&self, username: &str, password: &str) -> Result<User, AppError> {
        let Some(user) = self.store.find_user_by_username(username.trim()).await? else {
            warn!(%username, "login for unknown user");
            return Err(AuthError::UnknownUser.into());
        };
        let ok = password_matches(password, &user.password_hash)
            .map_err(|e| AppError::internal("verify password", e))?;
        if !ok {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::BadPassword.into());
        }
        Ok(user)
    }

    /// Creates `username` unless it already exists.
    pub async fn ensure_user(&self, username: &str, password: &str) -> Result<(), AppError> {
        match self.create_user(username, password).await {
            Ok(_) | Err(AppError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn credentials() -> Credentials {
        Credentials::new(Arc::new(MemoryStore::new()), PasswordPolicy { min_len: 6 })
    }

    #[tokio::test]
    async fn new_user_can_log_in_immediately() {
        let creds = credentials();
        for (name, pw) in [("alice", "secret1"), ("bob", "hunter22"), ("carol", "six666")] {
            let created = creds.create_user(name, pw).await.unwrap();
            let verified = creds.verify(name, pw).await.unwrap();
            assert_eq!(created.id, verified.id);
        }
    }

    #[tokio::test]
    async fn short_password_rejected_before_insert() {
        let creds = credentials();
        let err = creds.create_user("alice", "12345").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(creds.store.find_user_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_fields_rejected() {
        let creds = credentials();
        assert!(matches!(
            creds.create_user("  ", "secret1").await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            creds.create_user("alice", "").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let creds = credentials();
        creds.create_user("alice", "secret1").await.unwrap();
        let err = creds.create_user("alice", "other-pass").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn verify_distinguishes_unknown_and_bad_password() {
        let creds = credentials();
        creds.create_user("alice", "secret1").await.unwrap();
        assert!(matches!(
            creds.verify("nobody", "secret1").await.unwrap_err(),
            AppError::Auth(AuthError::UnknownUser)
        ));
        assert!(matches!(
            creds.verify("alice", "secret2").await.unwrap_err(),
            AppError::Auth(AuthError::BadPassword)
        ));
    }

    #[tokio::test]
    async fn ensure_user_is_idempotent() {
        let creds = credentials();
        creds.ensure_user("testuser", "password123").await.unwrap();
        creds.ensure_user("testuser", "password123").await.unwrap();
        assert!(creds.verify("testuser", "password123").await.is_ok());
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::format::{AuthToken, UserProfile};
use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::config;
use crate::database::models::{NewUser, User};
use crate::database::Store;
use crate::error::ApiError;

static USERNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("valid regex"));

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const MIN_PASSWORD_LEN: usize = 8;

/// Registration, login and onboarding
pub struct AccountService {
    store: Arc<dyn Store>,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let email = normalize_email(email);
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(ApiError::field_error("email", "A valid email address is required"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::field_error(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ApiError::conflict("Email is already registered"));
        }

        let password = password.to_string();
        let cost = config::config().security.password_hash_cost;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;

        let user = self.store.insert_user(NewUser { email, password_hash }).await?;
        info!("Registered user {}", user.id);
        Ok(user.into())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken, ApiError> {
        let email = normalize_email(email);
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

        let stored = user.password_hash.clone();
        let password = password.to_string();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await??;
        if !valid {
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }

        let claims = Claims::new(user.id, user.email.clone());
        let token = generate_jwt(&claims)?;
        Ok(AuthToken {
            token,
            expires_in: claims.expires_in(),
            user: user.into(),
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, ApiError> {
        self.store
            .find_user(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Pick a username (and optionally an avatar). Calling it again edits
    /// the profile.
    pub async fn onboard(
        &self,
        user_id: Uuid,
        name: &str,
        avatar_url: Option<&str>,
    ) -> Result<UserProfile, ApiError> {
        let name = name.trim();
        validate_username(name)?;

        let taken = self
            .store
            .find_users_by_names(&[name.to_string()])
            .await?
            .iter()
            .any(|other: &User| other.id != user_id);
        if taken {
            return Err(ApiError::conflict("Username is already taken"));
        }

        let avatar_url = avatar_url.map(str::trim).filter(|url| !url.is_empty());
        let user = self.store.update_profile(user_id, name, avatar_url).await?;
        info!("User {} onboarded as {}", user.id, name);
        Ok(user.into())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_username(name: &str) -> Result<(), ApiError> {
    let len = name.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::field_error("name", "Username must be 3-32 characters"));
    }
    if !USERNAME.is_match(name) {
        return Err(ApiError::field_error(
            "name",
            "Username can only contain letters, numbers, underscores, periods, and hyphens",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use axum::http::StatusCode;

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("ada.l-ove_1").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("émile").is_err());
    }

    #[tokio::test]
    async fn register_validates_input() {
        let svc = service();
        let err = svc.register("not-an-email", "longenough").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = svc.register("a@b.io", "short").await.unwrap_err();
        assert_eq!(err.to_json()["field_errors"]["password"], "Password must be at least 8 characters");
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_case_insensitively() {
        let svc = service();
        svc.register("Ada@Example.com", "password1").await.unwrap();
        let err = svc.register("ada@example.com ", "password2").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let svc = service();
        let user = svc.register("ada@example.com", "password1").await.unwrap();
        assert!(!user.onboarded);

        let token = svc.login("ADA@example.com", "password1").await.unwrap();
        assert_eq!(token.user.id, user.id);
        assert!(token.expires_in > 0);

        let wrong = svc.login("ada@example.com", "password2").await.unwrap_err();
        let unknown = svc.login("bob@example.com", "password1").await.unwrap_err();
        assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.message(), unknown.message());
    }

    #[tokio::test]
    async fn passwords_are_stored_as_bcrypt_hashes() {
        let store = Arc::new(MemoryStore::default());
        let svc = AccountService::new(store.clone());
        svc.register("ada@example.com", "password1").await.unwrap();

        let user = store.find_user_by_email("ada@example.com").await.unwrap().unwrap();
        assert!(user.password_hash.starts_with("$2"));
        assert!(crate::auth::verify_password("password1", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn corrupt_stored_hash_is_a_server_error() {
        let store = Arc::new(MemoryStore::default());
        store
            .insert_user(NewUser {
                email: "eve@example.com".to_string(),
                password_hash: "not-a-hash".to_string(),
            })
            .await
            .unwrap();
        let err = AccountService::new(store).login("eve@example.com", "password1").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn onboarding_claims_unique_names() {
        let svc = service();
        let ada = svc.register("ada@example.com", "password1").await.unwrap();
        let bob = svc.register("bob@example.com", "password1").await.unwrap();

        let profile = svc.onboard(ada.id, " ada ", Some("  ")).await.unwrap();
        assert!(profile.onboarded);
        assert_eq!(profile.name.as_deref(), Some("ada"));
        assert!(profile.avatar_url.is_none());

        // re-onboarding with the same name is an edit
        svc.onboard(ada.id, "ada", Some("https://img.example/ada.png")).await.unwrap();

        let err = svc.onboard(bob.id, "ada", None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}

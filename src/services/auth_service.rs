use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{generate_jwt, hash_password, verify_password};
use crate::config::SecurityConfig;
use crate::database::models::{NewUser, ProfileUpdate, User};
use crate::database::repository::UserRepository;
use crate::database::Store;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "normalized_email")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(deserialize_with = "normalized_email")]
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 2048))]
    pub profile_photo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub expires_in: u64,
    pub user: User,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Emails are compared trimmed and lowercased, so they are validated that way too.
fn normalized_email<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|email| normalize_email(&email))
}

pub struct AuthService {
    store: Arc<dyn Store>,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            security: state.config.security.clone(),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, ApiError> {
        let email = request.email;
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ApiError::conflict("Email is already registered"));
        }

        let cost = self.security.bcrypt_cost;
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| ApiError::internal_server_error(format!("hashing task failed: {e}")))?
            .map_err(|e| ApiError::internal_server_error(format!("bcrypt: {e}")))?;

        let user = self
            .store
            .insert_user(
                NewUser {
                    email,
                    password_hash,
                    name: request.name,
                    phone: request.phone,
                }
                .into_user(),
            )
            .await?;

        info!(user_id = %user.id, "Registered user");
        self.session_for(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, ApiError> {
        const INVALID: &str = "Invalid email or password";

        let email = request.email;
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| ApiError::unauthorized(INVALID))?;

        let hash = user.password_hash.clone();
        let password = request.password;
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ApiError::internal_server_error(format!("verification task failed: {e}")))?;
        if !valid {
            return Err(ApiError::unauthorized(INVALID));
        }

        info!(user_id = %user.id, "User logged in");
        self.session_for(user)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, ApiError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: ProfileUpdateRequest,
    ) -> Result<User, ApiError> {
        let mut user = self.profile(user_id).await?;
        ProfileUpdate {
            name: request.name,
            phone: request.phone,
            profile_photo: request.profile_photo,
        }
        .apply(&mut user);
        Ok(self.store.update_user(user).await?)
    }

    fn session_for(&self, user: User) -> Result<AuthSession, ApiError> {
        let token = generate_jwt(user.id, &self.security)
            .map_err(|e| ApiError::internal_server_error(e.to_string()))?;
        Ok(AuthSession {
            token,
            expires_in: self.security.jwt_expiry_hours * 3600,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Asha@Example.COM "), "asha@example.com");
    }

    #[test]
    fn padded_emails_are_normalized_before_validation() {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "email": "  Asha@Example.COM ",
            "password": "whatever"
        }))
        .unwrap();
        assert_eq!(request.email, "asha@example.com");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn short_passwords_fail_validation() {
        let request = RegisterRequest {
            email: "asha@example.com".to_string(),
            password: "short".to_string(),
            name: None,
            phone: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }
}

//! Account sign-up and login against the marketplace auth service.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::parse_api_error;
use crate::models::UserId;
use crate::util::{is_plausible_email, is_ten_digit_phone, normalize_base_url};

const MIN_PASSWORD_CHARS: usize = 8;

/// Tokens issued by the auth service. Every backend call carries all three.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub logic_token: String,
    pub db_token: String,
    pub user_id: UserId,
    #[serde(default)]
    pub photo: Option<String>,
}

impl Credentials {
    #[must_use]
    pub const fn identity(&self) -> &UserId {
        &self.user_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("logic_token", &"[REDACTED]")
            .field("db_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("photo", &self.photo)
            .finish()
    }
}

/// Account details submitted on sign-up.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl fmt::Debug for SignUpRequest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SignUpRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("bio", &self.bio)
            .field("phone", &self.phone)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Auth service is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where signed-in credentials live between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_credentials(&self) -> AuthResult<Option<Credentials>>;
    fn save_credentials(&self, credentials: &Credentials) -> AuthResult<()>;
    fn clear_credentials(&self) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct AuthClient<S: SessionPersistence> {
    auth_url: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> AuthClient<S> {
    pub fn new(url: impl AsRef<str>, timeout: Duration, store: S) -> AuthResult<Self> {
        let auth_url = normalize_base_url(url.as_ref()).ok_or(
            AuthError::InvalidConfiguration("Auth URL must include http:// or https://"),
        )?;

        Ok(Self {
            auth_url,
            client: Client::builder().timeout(timeout).build()?,
            store,
        })
    }

    /// Credentials saved by a previous sign-up or login, if any.
    pub fn restore_credentials(&self) -> AuthResult<Option<Credentials>> {
        self.store.load_credentials()
    }

    pub async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<Credentials> {
        validate_sign_up(request)?;

        let http = self
            .client
            .post(format!("{}/CreateUser", self.auth_url))
            .json(request);
        let credentials = self.send_auth_request(http).await?;
        self.store.save_credentials(&credentials)?;
        tracing::info!("Created account {}", credentials.user_id);
        Ok(credentials)
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Credentials> {
        validate_login(email, password)?;

        let payload = serde_json::json!({
            "email": email.trim(),
            "password": password,
        });
        let http = self
            .client
            .post(format!("{}/VerifyLoginCredentials", self.auth_url))
            .json(&payload);
        let credentials = self.send_auth_request(http).await?;
        self.store.save_credentials(&credentials)?;
        tracing::info!("Signed in as {}", credentials.user_id);
        Ok(credentials)
    }

    /// Forget the stored credentials. Purging cached conversations is the caller's job.
    pub fn logout(&self) -> AuthResult<()> {
        self.store.clear_credentials()
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<Credentials> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        let payload = serde_json::from_str::<AuthResponse>(&body)?;
        payload.into_credentials()
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    logic_token: Option<String>,
    db_token: Option<String>,
    user_id: Option<String>,
    photo: Option<String>,
    error: Option<String>,
}

impl AuthResponse {
    fn into_credentials(self) -> AuthResult<Credentials> {
        if let Some(error) = self.error {
            return Err(AuthError::Api(error));
        }

        match (self.logic_token, self.db_token, self.user_id) {
            (Some(logic_token), Some(db_token), Some(user_id))
                if !logic_token.trim().is_empty() && !user_id.trim().is_empty() =>
            {
                Ok(Credentials {
                    logic_token,
                    db_token,
                    user_id: UserId::new(user_id.trim()),
                    photo: self.photo,
                })
            }
            _ => Err(AuthError::Api(
                "Auth response did not include the session tokens".to_string(),
            )),
        }
    }
}

fn validate_login(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::InvalidInput("Email is required"));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("Password is required"));
    }
    Ok(())
}

fn validate_sign_up(request: &SignUpRequest) -> AuthResult<()> {
    if request.name.trim().is_empty() {
        return Err(AuthError::InvalidInput("Name is required"));
    }
    if !is_plausible_email(&request.email) {
        return Err(AuthError::InvalidInput("Invalid email format."));
    }
    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AuthError::InvalidInput(
            "Password must be at least 8 characters.",
        ));
    }
    if let Some(phone) = request.phone.as_deref() {
        if !is_ten_digit_phone(phone) {
            return Err(AuthError::InvalidInput("Phone number must be 10 digits."));
        }
    }
    Ok(())
}

use async_trait::async_trait;

use super::types::{Credentials, LoginResponse, SignupResponse, User};
use super::{bearer, check_response, HttpApi};
use crate::error::ApiError;

const LOGIN_FALLBACK: &str = "Login failed";
const SIGNUP_FALLBACK: &str = "Signup failed";
const ME_FALLBACK: &str = "Failed to get user info";

/// The backend calls a session needs.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    async fn signup(&self, email: &str, password: &str) -> Result<SignupResponse, ApiError>;

    /// Resolve a token to its user. Fails if the token is no longer live.
    async fn current_user(&self, token: &str) -> Result<User, ApiError>;
}

/// Client for `/auth/*`. Every failure comes back as [`ApiError::Auth`]
/// (or `Network` when the request never completed).
#[derive(Clone)]
pub struct AuthClient {
    http: HttpApi,
}

impl AuthClient {
    pub fn new(http: HttpApi) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AuthBackend for AuthClient {
    #[tracing::instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .http
            .client()
            .post(self.http.url("/auth/login"))
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(ApiError::network("Login request failed"))?;

        check_response(response, LOGIN_FALLBACK)
            .await
            .map_err(ApiError::into_auth)?
            .json()
            .await
            .map_err(ApiError::network("Failed to parse login response"))
    }

    #[tracing::instrument(skip(self, password))]
    async fn signup(&self, email: &str, password: &str) -> Result<SignupResponse, ApiError> {
        let response = self
            .http
            .client()
            .post(self.http.url("/auth/signup"))
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(ApiError::network("Signup request failed"))?;

        check_response(response, SIGNUP_FALLBACK)
            .await
            .map_err(ApiError::into_auth)?
            .json()
            .await
            .map_err(ApiError::network("Failed to parse signup response"))
    }

    #[tracing::instrument(skip_all)]
    async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        let response = self
            .http
            .client()
            .get(self.http.url("/auth/me"))
            .header("Authorization", bearer(token))
            .send()
            .await
            .map_err(ApiError::network("User info request failed"))?;

        check_response(response, ME_FALLBACK)
            .await
            .map_err(ApiError::into_auth)?
            .json()
            .await
            .map_err(ApiError::network("Failed to parse user info"))
    }
}

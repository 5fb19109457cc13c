pub mod registry;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::types::User;
use crate::api::AuthBackend;
use crate::error::{ApiError, SessionError};
use crate::storage::TokenStore;

pub use registry::{SessionRegistry, UserSession};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    /// A token exists but has not been resolved to a user yet.
    Verifying,
    Authenticated { token: String, user: User },
}

/// Read-only view of a session.
///
/// `is_authenticated` is true exactly when `token` and `user` are both set,
/// which only happens after the token was verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    pub is_authenticated: bool,
}

/// Owns one user's token and current-user record.
///
/// The token reaches durable storage only after `current_user` confirmed it,
/// and any failed verification drops the session back to `Unauthenticated`.
pub struct SessionStore<A, S> {
    auth: Arc<A>,
    storage: Arc<S>,
    key: String,
    state: RwLock<SessionState>,
}

impl<A: AuthBackend, S: TokenStore> SessionStore<A, S> {
    pub fn new(auth: Arc<A>, storage: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            auth,
            storage,
            key: key.into(),
            state: RwLock::new(SessionState::Unauthenticated),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    #[cfg(test)]
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn snapshot(&self) -> Session {
        match &*self.state.read().await {
            SessionState::Authenticated { token, user } => Session {
                token: Some(token.clone()),
                user: Some(user.clone()),
                is_authenticated: true,
            },
            SessionState::Unauthenticated | SessionState::Verifying => Session::default(),
        }
    }

    /// The verified token, if any.
    pub async fn token(&self) -> Option<String> {
        match &*self.state.read().await {
            SessionState::Authenticated { token, .. } => Some(token.clone()),
            _ => None,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(*self.state.read().await, SessionState::Authenticated { .. })
    }

    /// Restore a stored token, if there is one.
    ///
    /// A token the backend no longer accepts is cleared from storage and the
    /// session stays unauthenticated; that is not an error. Only storage
    /// failures are returned.
    pub async fn hydrate(&self) -> Result<Option<User>, SessionError> {
        let Some(token) = self.storage.load(&self.key).await? else {
            debug!(key = %self.key, "no stored token");
            return Ok(None);
        };

        *self.state.write().await = SessionState::Verifying;

        match self.auth.current_user(&token).await {
            Ok(user) => {
                info!(key = %self.key, user_id = %user.id, "session restored");
                *self.state.write().await = SessionState::Authenticated {
                    token,
                    user: user.clone(),
                };
                Ok(Some(user))
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "stored token rejected, clearing");
                *self.state.write().await = SessionState::Unauthenticated;
                self.storage.clear(&self.key).await?;
                Ok(None)
            }
        }
    }

    /// Log in and verify the new token before committing it.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        match self.try_login(email, password).await {
            Ok(user) => Ok(user),
            Err(e) => {
                self.force_logout().await;
                Err(e)
            }
        }
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let login = self.auth.login(email, password).await?;

        // An authenticated session keeps serving its old token until the new one commits.
        {
            let mut state = self.state.write().await;
            if !matches!(*state, SessionState::Authenticated { .. }) {
                *state = SessionState::Verifying;
            }
        }
        let user = self.auth.current_user(&login.access_token).await?;

        self.storage.save(&self.key, &login.access_token).await?;
        *self.state.write().await = SessionState::Authenticated {
            token: login.access_token,
            user: user.clone(),
        };

        info!(key = %self.key, user_id = %user.id, "logged in");
        Ok(user)
    }

    /// Create the account, then run the full login sequence.
    pub async fn signup(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let created = self.auth.signup(email, password).await?;
        debug!(key = %self.key, message = %created.message, "account created");
        self.login(email, password).await
    }

    /// Clear token, user and the stored entry. Safe from any state.
    pub async fn logout(&self) -> Result<(), SessionError> {
        *self.state.write().await = SessionState::Unauthenticated;
        self.storage.clear(&self.key).await?;
        info!(key = %self.key, "logged out");
        Ok(())
    }

    /// Log out if `err` says the backend no longer accepts our token.
    /// Returns whether the session was dropped.
    pub async fn invalidate_on_auth_failure(&self, err: &ApiError) -> bool {
        if !err.is_auth() {
            return false;
        }
        warn!(key = %self.key, error = %err, "token rejected by backend");
        self.force_logout().await;
        true
    }

    async fn force_logout(&self) {
        if let Err(e) = self.logout().await {
            warn!(key = %self.key, error = %e, "failed to clear stored token");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::types::{LoginResponse, SignupResponse};
    use crate::storage::MemoryTokenStore;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-process auth backend: fixed accounts, tokens issued on login.
    #[derive(Default)]
    pub struct FakeAuth {
        pub accounts: std::sync::Mutex<HashMap<String, (String, User)>>,
        pub live_tokens: std::sync::Mutex<HashMap<String, User>>,
        pub me_calls: AtomicUsize,
    }

    impl FakeAuth {
        pub fn with_account(email: &str, password: &str, user_id: &str) -> Self {
            let fake = Self::default();
            fake.accounts.lock().unwrap().insert(
                email.to_string(),
                (
                    password.to_string(),
                    User {
                        id: user_id.to_string(),
                        email: email.to_string(),
                    },
                ),
            );
            fake
        }

        pub fn token_for(user_id: &str) -> String {
            format!("tok-{}", user_id)
        }

        pub fn accept_token(&self, token: &str, user: User) {
            self.live_tokens
                .lock()
                .unwrap()
                .insert(token.to_string(), user);
        }
    }

    fn unauthorized(detail: &str) -> ApiError {
        ApiError::Auth {
            status: StatusCode::UNAUTHORIZED,
            detail: detail.to_string(),
        }
    }

    #[async_trait]
    impl AuthBackend for FakeAuth {
        async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(email) {
                Some((pw, user)) if pw == password => {
                    let token = Self::token_for(&user.id);
                    self.live_tokens
                        .lock()
                        .unwrap()
                        .insert(token.clone(), user.clone());
                    Ok(LoginResponse {
                        user_id: user.id.clone(),
                        access_token: token,
                    })
                }
                _ => Err(unauthorized("Invalid credentials")),
            }
        }

        async fn signup(&self, email: &str, password: &str) -> Result<SignupResponse, ApiError> {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(ApiError::Auth {
                    status: StatusCode::BAD_REQUEST,
                    detail: "User already registered".to_string(),
                });
            }
            let id = format!("u-{}", accounts.len() + 1);
            accounts.insert(
                email.to_string(),
                (
                    password.to_string(),
                    User {
                        id,
                        email: email.to_string(),
                    },
                ),
            );
            Ok(SignupResponse {
                message: "Account created successfully".to_string(),
            })
        }

        async fn current_user(&self, token: &str) -> Result<User, ApiError> {
            self.me_calls.fetch_add(1, Ordering::SeqCst);
            self.live_tokens
                .lock()
                .unwrap()
                .get(token)
                .cloned()
                .ok_or_else(|| unauthorized("Failed to get user info"))
        }
    }

    /// Issues tokens on login but never verifies them.
    pub struct NoVerifyAuth(pub FakeAuth);

    #[async_trait]
    impl AuthBackend for NoVerifyAuth {
        async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
            self.0.login(email, password).await
        }

        async fn signup(&self, email: &str, password: &str) -> Result<SignupResponse, ApiError> {
            self.0.signup(email, password).await
        }

        async fn current_user(&self, _token: &str) -> Result<User, ApiError> {
            Err(unauthorized("Failed to get user info"))
        }
    }

    /// Accepts tokens issued by the wrapped fake, but parks every
    /// `current_user` call until `release` is notified.
    pub struct GatedAuth {
        pub inner: FakeAuth,
        pub entered: tokio::sync::Notify,
        pub release: tokio::sync::Notify,
    }

    #[async_trait]
    impl AuthBackend for GatedAuth {
        async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
            self.inner.login(email, password).await
        }

        async fn signup(&self, email: &str, password: &str) -> Result<SignupResponse, ApiError> {
            self.inner.signup(email, password).await
        }

        async fn current_user(&self, token: &str) -> Result<User, ApiError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.current_user(token).await
        }
    }

    /// Reads work, writes always fail.
    #[derive(Default)]
    pub struct ReadOnlyTokenStore(MemoryTokenStore);

    #[async_trait]
    impl TokenStore for ReadOnlyTokenStore {
        async fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.0.load(key).await
        }

        async fn save(&self, _key: &str, _token: &str) -> anyhow::Result<()> {
            anyhow::bail!("token store is read-only")
        }

        async fn clear(&self, key: &str) -> anyhow::Result<()> {
            self.0.clear(key).await
        }

        async fn keys(&self) -> anyhow::Result<Vec<String>> {
            self.0.keys().await
        }
    }

    fn jane() -> User {
        User {
            id: "u-jane".to_string(),
            email: "jane@example.com".to_string(),
        }
    }

    fn session_with(auth: FakeAuth) -> (SessionStore<FakeAuth, MemoryTokenStore>, Arc<MemoryTokenStore>) {
        let storage = Arc::new(MemoryTokenStore::new());
        (SessionStore::new(Arc::new(auth), storage.clone(), "42"), storage)
    }

    #[tokio::test]
    async fn test_starts_unauthenticated() {
        let (session, _) = session_with(FakeAuth::default());
        assert_eq!(session.state().await, SessionState::Unauthenticated);
        assert_eq!(session.snapshot().await, Session::default());
        assert_eq!(session.token().await, None);
    }

    #[tokio::test]
    async fn test_login_commits_verified_user() {
        let (session, storage) =
            session_with(FakeAuth::with_account("jane@example.com", "hunter2", "u-jane"));

        let user = session.login("jane@example.com", "hunter2").await.unwrap();
        assert_eq!(user, jane());

        let snap = session.snapshot().await;
        assert!(snap.is_authenticated);
        assert_eq!(snap.user, Some(jane()));
        assert_eq!(snap.token.as_deref(), Some("tok-u-jane"));
        assert_eq!(
            storage.load("42").await.unwrap().as_deref(),
            Some("tok-u-jane")
        );
    }

    #[tokio::test]
    async fn test_login_bad_credentials() {
        let (session, storage) =
            session_with(FakeAuth::with_account("jane@example.com", "hunter2", "u-jane"));

        let err = session.login("jane@example.com", "nope").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid credentials");
        assert_eq!(session.snapshot().await, Session::default());
        assert_eq!(storage.load("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_fails_when_token_does_not_verify() {
        let auth = NoVerifyAuth(FakeAuth::with_account("jane@example.com", "hunter2", "u-jane"));
        let storage = Arc::new(MemoryTokenStore::new());
        storage.save("42", "old-token").await.unwrap();
        let session = SessionStore::new(Arc::new(auth), storage.clone(), "42");

        let err = session.login("jane@example.com", "hunter2").await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to get user info");
        assert_eq!(session.state().await, SessionState::Unauthenticated);
        assert_eq!(session.snapshot().await, Session::default());
        assert_eq!(storage.load("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_relogin_drops_existing_session() {
        let (session, storage) =
            session_with(FakeAuth::with_account("jane@example.com", "hunter2", "u-jane"));
        session.login("jane@example.com", "hunter2").await.unwrap();

        assert!(session.login("jane@example.com", "wrong").await.is_err());
        assert!(!session.is_authenticated().await);
        assert_eq!(storage.load("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_fails_when_token_cannot_be_stored() {
        let auth = FakeAuth::with_account("jane@example.com", "hunter2", "u-jane");
        let storage = Arc::new(ReadOnlyTokenStore::default());
        let session = SessionStore::new(Arc::new(auth), storage.clone(), "42");

        let err = session.login("jane@example.com", "hunter2").await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert_eq!(err.user_message(), "Session storage is unavailable");
        assert_eq!(session.state().await, SessionState::Unauthenticated);
        assert_eq!(session.snapshot().await, Session::default());
        assert_eq!(storage.load("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_relogin_keeps_old_token_while_verifying() {
        let auth = GatedAuth {
            inner: FakeAuth::with_account("jane@example.com", "hunter2", "u-jane"),
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        };
        auth.inner.accept_token("tok-old", jane());
        let storage = Arc::new(MemoryTokenStore::new());
        storage.save("42", "tok-old").await.unwrap();
        let session = SessionStore::new(Arc::new(auth), storage.clone(), "42");

        let restore = async {
            session.hydrate().await.unwrap();
        };
        let open_gate = async {
            session.auth.entered.notified().await;
            session.auth.release.notify_one();
        };
        tokio::join!(restore, open_gate);
        assert_eq!(session.token().await.as_deref(), Some("tok-old"));

        let relogin = session.login("jane@example.com", "hunter2");
        let observe = async {
            session.auth.entered.notified().await;
            let during = session.token().await;
            session.auth.release.notify_one();
            during
        };
        let (user, during) = tokio::join!(relogin, observe);

        assert_eq!(user.unwrap(), jane());
        assert_eq!(during.as_deref(), Some("tok-old"));
        assert_eq!(session.token().await.as_deref(), Some("tok-u-jane"));
        assert_eq!(
            storage.load("42").await.unwrap().as_deref(),
            Some("tok-u-jane")
        );
    }

    #[tokio::test]
    async fn test_signup_chains_into_login() {
        let (session, storage) = session_with(FakeAuth::default());

        let user = session.signup("new@example.com", "pw").await.unwrap();
        assert_eq!(user.email, "new@example.com");
        assert!(session.is_authenticated().await);
        assert!(storage.load("42").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_signup_failure_commits_nothing() {
        let (session, storage) =
            session_with(FakeAuth::with_account("jane@example.com", "hunter2", "u-jane"));

        let err = session.signup("jane@example.com", "other").await.unwrap_err();
        assert_eq!(err.user_message(), "User already registered");
        assert_eq!(session.snapshot().await, Session::default());
        assert_eq!(storage.load("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (session, storage) =
            session_with(FakeAuth::with_account("jane@example.com", "hunter2", "u-jane"));

        session.logout().await.unwrap();
        assert_eq!(session.snapshot().await, Session::default());

        session.login("jane@example.com", "hunter2").await.unwrap();
        session.logout().await.unwrap();
        session.logout().await.unwrap();
        assert_eq!(session.snapshot().await, Session::default());
        assert_eq!(storage.load("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hydrate_with_live_token() {
        let auth = FakeAuth::default();
        auth.accept_token("tok-stored", jane());
        let (session, storage) = session_with(auth);
        storage.save("42", "tok-stored").await.unwrap();

        let user = session.hydrate().await.unwrap();
        assert_eq!(user, Some(jane()));
        let snap = session.snapshot().await;
        assert!(snap.is_authenticated);
        assert_eq!(snap.token.as_deref(), Some("tok-stored"));
    }

    #[tokio::test]
    async fn test_hydrate_with_rejected_token_clears_storage() {
        let (session, storage) = session_with(FakeAuth::default());
        storage.save("42", "tok-expired").await.unwrap();

        assert_eq!(session.hydrate().await.unwrap(), None);
        assert_eq!(session.state().await, SessionState::Unauthenticated);
        assert_eq!(storage.load("42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hydrate_without_token_skips_backend() {
        let auth = Arc::new(FakeAuth::default());
        let storage = Arc::new(MemoryTokenStore::new());
        let session = SessionStore::new(auth.clone(), storage, "42");

        assert_eq!(session.hydrate().await.unwrap(), None);
        assert_eq!(auth.me_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_invalidates_session() {
        let (session, storage) =
            session_with(FakeAuth::with_account("jane@example.com", "hunter2", "u-jane"));
        session.login("jane@example.com", "hunter2").await.unwrap();

        let not_auth = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert!(!session.invalidate_on_auth_failure(&not_auth).await);
        assert!(session.is_authenticated().await);

        let expired = unauthorized("Invalid authentication credentials");
        assert!(session.invalidate_on_auth_failure(&expired).await);
        assert!(!session.is_authenticated().await);
        assert_eq!(storage.load("42").await.unwrap(), None);
    }
}

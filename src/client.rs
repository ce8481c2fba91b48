//! API client with silent token refresh.
//!
//! The counterpart of the server's double-token contract: the access
//! token lives in an in-memory slot and is attached as a bearer header;
//! the refresh token lives in the reqwest cookie jar and never leaves
//! it. On a 401 the pipeline refreshes once and replays the request
//! once. Concurrent 401s share a single refresh call through
//! `RefreshCoordinator`.

use std::future::Future;
use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, oneshot};

#[derive(Debug, Clone)]
pub enum RefreshError {
    /// The refresh endpoint rejected us: credentials are gone for good.
    Unauthorized(String),
    /// The refresh call never completed.
    Transport(String),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::Unauthorized(message) => write!(f, "refresh rejected: {}", message),
            RefreshError::Transport(message) => write!(f, "refresh failed: {}", message),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Two-state machine coordinating concurrent refresh attempts.
///
/// The first caller to observe a 401 becomes the leader and performs the
/// one network call; everyone arriving while it is in flight parks a
/// continuation and is resolved with the leader's outcome. At most one
/// refresh call is ever in flight.
enum RefreshState {
    Idle,
    Refreshing(Vec<oneshot::Sender<Result<String, RefreshError>>>),
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
        }
    }

    /// Obtain a fresh access token. `do_refresh` is invoked only by the
    /// leader; followers suspend until the in-flight call resolves.
    ///
    /// Queued callers observe the new token strictly after issuance: the
    /// oneshot completes only once the leader's call has returned.
    pub async fn refresh<F, Fut>(&self, do_refresh: F) -> Result<String, RefreshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, RefreshError>>,
    {
        let waiter = {
            let mut state = self.state.lock().await;
            match &mut *state {
                RefreshState::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.map_err(|_| {
                RefreshError::Transport("refresh coordinator dropped".to_string())
            })?;
        }

        // Leader path. No timeout is enforced here: a hung refresh call
        // holds the coordinator in Refreshing until it resolves.
        let result = do_refresh().await;

        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing(waiters) => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };
        for tx in waiters {
            let _ = tx.send(result.clone());
        }

        result
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// Transport-level failure (connection, serialization).
    Transport(String),
    /// The server answered with a non-success status.
    Api { status: StatusCode, message: String },
    /// The silent refresh failed; the client is effectively logged out.
    Refresh(RefreshError),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Transport(message) => write!(f, "request failed: {}", message),
            ApiError::Api { status, message } => write!(f, "{}: {}", status, message),
            ApiError::Refresh(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Arc<RwLock<Option<String>>>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            access_token: Arc::new(RwLock::new(None)),
            coordinator: Arc::new(RefreshCoordinator::new()),
        })
    }

    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        let body = self
            .request(
                Method::POST,
                "/api/auth/register",
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await?;
        self.store_token_from(&body).await;
        Ok(body)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        let body = self
            .request(
                Method::POST,
                "/api/auth/login",
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await?;
        self.store_token_from(&body).await;
        Ok(body)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    async fn store_token_from(&self, body: &Value) {
        if let Some(token) = body.get("accessToken").and_then(|t| t.as_str()) {
            self.set_access_token(Some(token.to_string())).await;
        }
    }

    /// The request pipeline: attach bearer, send, and on a 401 refresh
    /// once and replay once. A request is never retried twice; non-401
    /// failures pass through unmodified.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let token = self.access_token().await;
        let response = self.send_once(&method, path, &body, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::into_body(response).await;
        }

        // Auth endpoints answer 401 for their own reasons; refreshing
        // there would loop.
        if path.starts_with("/api/auth/login")
            || path.starts_with("/api/auth/register")
            || path.starts_with("/api/auth/refresh")
        {
            return Self::into_body(response).await;
        }

        let new_token = self.refresh_access_token().await?;
        let retried = self
            .send_once(&method, path, &body, Some(&new_token))
            .await?;
        Self::into_body(retried).await
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: &Option<Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    async fn into_body(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        if status.is_success() {
            let text = response.text().await?;
            if text.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|err| ApiError::Transport(err.to_string()))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ApiError::Api { status, message })
        }
    }

    /// Single-flight refresh. On success the new token is stored before
    /// any caller retries; on failure the stored token is cleared so the
    /// UI treats the user as logged out.
    async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let http = self.http.clone();
        let url = format!("{}/api/auth/refresh", self.base_url);

        let result = self
            .coordinator
            .refresh(|| async move {
                let response = http
                    .post(&url)
                    .send()
                    .await
                    .map_err(|err| RefreshError::Transport(err.to_string()))?;

                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|err| RefreshError::Transport(err.to_string()))?;

                if !status.is_success() {
                    return Err(RefreshError::Unauthorized(text));
                }

                let body: Value = serde_json::from_str(&text)
                    .map_err(|err| RefreshError::Transport(err.to_string()))?;
                body.get("accessToken")
                    .and_then(|t| t.as_str())
                    .map(|t| t.to_string())
                    .ok_or_else(|| {
                        RefreshError::Transport("no access token in refresh reply".to_string())
                    })
            })
            .await;

        match result {
            Ok(token) => {
                self.set_access_token(Some(token.clone())).await;
                Ok(token)
            }
            Err(err) => {
                self.set_access_token(None).await;
                Err(ApiError::Refresh(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Hold the Refreshing state long enough for every
                        // other task to queue behind it.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("fresh-token".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token, "fresh-token");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_broadcast_to_all_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(RefreshError::Unauthorized("expired".to_string()))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(matches!(result, Err(RefreshError::Unauthorized(_))));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn coordinator_returns_to_idle_after_completion() {
        let coordinator = RefreshCoordinator::new();

        let first = coordinator
            .refresh(|| async { Ok("one".to_string()) })
            .await
            .unwrap();
        // A second refresh after the first resolved issues its own call.
        let second = coordinator
            .refresh(|| async { Ok("two".to_string()) })
            .await
            .unwrap();

        assert_eq!(first, "one");
        assert_eq!(second, "two");
    }
}

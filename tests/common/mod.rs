use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use fintrack_server::{AppState, CategoryCache, SummaryCache, TokenKeys, app, database};
use serde_json::Value;
use tower::util::ServiceExt;

#[allow(dead_code)]
pub const TEST_ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789-0123456789";
#[allow(dead_code)]
pub const TEST_REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789-012345678";

pub struct TestApp {
    pub router: Router,
    #[allow(dead_code)]
    pub state: AppState,
}

pub async fn setup_test_app() -> anyhow::Result<TestApp> {
    setup_test_app_with_access_ttl(15 * 60).await
}

/// Build an app against a throwaway database. A short access TTL lets
/// tests exercise the expiry/refresh path.
pub async fn setup_test_app_with_access_ttl(access_ttl_secs: u64) -> anyhow::Result<TestApp> {
    let temp_dir = tempfile::tempdir()?;
    let data_path = temp_dir.path().to_string_lossy().to_string();
    std::mem::forget(temp_dir);

    let main_db = database::init_main_db(&data_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize main database: {}", e))?;

    let tokens = Arc::new(TokenKeys::new(
        TEST_ACCESS_SECRET,
        TEST_REFRESH_SECRET,
        access_ttl_secs,
        7 * 24 * 60 * 60,
    ));

    let state = AppState {
        main_db,
        tokens,
        category_cache: CategoryCache::new(),
        summary_cache: SummaryCache::new(),
        llm: None,
        secure_cookies: false,
    };

    Ok(TestApp {
        router: app(state.clone()),
        state,
    })
}

pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookie: Option<String>,
}

#[allow(dead_code)]
pub async fn run_request(app: &TestApp, request: Request<Body>) -> anyhow::Result<ApiResponse> {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to execute request: {}", e))?;

    let status = response.status();
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read response body: {}", e))?;
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));

    Ok(ApiResponse {
        status,
        body,
        set_cookie,
    })
}

pub async fn json_post(
    app: &TestApp,
    uri: &str,
    bearer: Option<&str>,
    cookie: Option<&str>,
    payload: Value,
) -> anyhow::Result<ApiResponse> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let request = builder.body(Body::from(payload.to_string()))?;
    run_request(app, request).await
}

#[allow(dead_code)]
pub async fn json_get(
    app: &TestApp,
    uri: &str,
    bearer: Option<&str>,
) -> anyhow::Result<ApiResponse> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = builder.body(Body::empty())?;
    run_request(app, request).await
}

#[allow(dead_code)]
pub async fn json_delete(
    app: &TestApp,
    uri: &str,
    bearer: Option<&str>,
) -> anyhow::Result<ApiResponse> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = builder.body(Body::empty())?;
    run_request(app, request).await
}

/// Register a user and return (access_token, refresh_cookie).
#[allow(dead_code)]
pub async fn register_user(
    app: &TestApp,
    email: &str,
    password: &str,
) -> anyhow::Result<(String, String)> {
    let response = json_post(
        app,
        "/api/auth/register",
        None,
        None,
        serde_json::json!({ "email": email, "password": password }),
    )
    .await?;

    anyhow::ensure!(
        response.status == StatusCode::CREATED,
        "registration failed: {} {}",
        response.status,
        response.body
    );

    let token = response.body["accessToken"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("no access token in register response"))?
        .to_string();
    let cookie = response
        .set_cookie
        .ok_or_else(|| anyhow::anyhow!("no refresh cookie in register response"))?;

    Ok((token, cookie_pair(&cookie)))
}

/// Reduce a Set-Cookie header to the name=value pair a client would send back.
#[allow(dead_code)]
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

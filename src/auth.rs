//! Registration, login, token refresh, logout, and the access-token
//! guard used by every protected handler.
//!
//! The refresh token only ever travels inside an httpOnly cookie; the
//! access token only ever travels in the response body and the
//! `Authorization` header. Neither token is persisted server-side.

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use password_hash::rand_core::OsRng;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::constants::*;
use crate::models::{AuthResponse, LoginPayload, PublicUser, RefreshResponse, RegisterPayload, User};
use crate::tokens::AccessClaims;
use crate::utils::{db_error, db_error_with_context, validate_string_length};
use crate::{AppState, Db};

// ---------------------------------------------------------------------------
// Refresh cookie helpers
// ---------------------------------------------------------------------------

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

fn build_refresh_cookie(state: &AppState, refresh_token: &str) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        REFRESH_COOKIE_NAME,
        refresh_token,
        state.tokens.refresh_ttl_secs()
    );
    if state.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_refresh_cookie(state: &AppState) -> String {
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        REFRESH_COOKIE_NAME
    );
    if state.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

// ---------------------------------------------------------------------------
// Access-token guard
// ---------------------------------------------------------------------------

/// Validate the `Authorization: Bearer <token>` header and return the
/// decoded claims. Trusts the signed claims without re-checking that the
/// user row still exists; only `/api/auth/me` does that.
pub fn get_current_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AccessClaims, (StatusCode, String)> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, ERR_NO_TOKEN.to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, ERR_NO_TOKEN.to_string()))?;

    // Expired and invalid are indistinguishable to the caller.
    state
        .tokens
        .verify_access(token)
        .map_err(|_| (StatusCode::UNAUTHORIZED, ERR_INVALID_TOKEN.to_string()))
}

// ---------------------------------------------------------------------------
// User lookups
// ---------------------------------------------------------------------------

fn extract_user_from_row(row: libsql::Row) -> Result<User, (StatusCode, String)> {
    let id: String = row
        .get(0)
        .map_err(|_| db_error_with_context("invalid user data"))?;
    let email: String = row
        .get(1)
        .map_err(|_| db_error_with_context("invalid user data"))?;
    let password_hash: String = row
        .get(2)
        .map_err(|_| db_error_with_context("invalid user data"))?;
    let created_at: String = row
        .get(3)
        .map_err(|_| db_error_with_context("invalid user data"))?;

    Ok(User {
        id,
        email,
        password_hash,
        created_at,
    })
}

pub async fn find_user_by_email(
    db: &Db,
    email: &str,
) -> Result<Option<User>, (StatusCode, String)> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
            [email],
        )
        .await
        .map_err(|_| db_error_with_context("failed to query user"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => Ok(Some(extract_user_from_row(row)?)),
        None => Ok(None),
    }
}

pub async fn find_user_by_id(db: &Db, id: &str) -> Result<Option<User>, (StatusCode, String)> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
            [id],
        )
        .await
        .map_err(|_| db_error_with_context("failed to query user"))?;

    match rows.next().await.map_err(|_| db_error())? {
        Some(row) => Ok(Some(extract_user_from_row(row)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// POST /api/auth/register
// ---------------------------------------------------------------------------

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<
    (StatusCode, [(header::HeaderName, String); 1], Json<AuthResponse>),
    (StatusCode, String),
> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Email and password are required.".to_string(),
        ));
    }
    validate_string_length(&payload.email, "Email", MAX_EMAIL_LENGTH)?;
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters.", MIN_PASSWORD_LENGTH),
        ));
    }

    let email = payload.email.trim().to_string();

    if find_user_by_email(&state.main_db, &email).await?.is_some() {
        return Err((
            StatusCode::CONFLICT,
            "An account with this email already exists.".to_string(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process password".to_string(),
            )
        })?
        .to_string();

    let user_id = Uuid::new_v4().to_string();
    let created_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|_| db_error())?;

    {
        let conn = state.main_db.write().await;
        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            (
                user_id.as_str(),
                email.as_str(),
                password_hash.as_str(),
                created_at.as_str(),
            ),
        )
        .await
        .map_err(|_| db_error_with_context("user creation failed"))?;
    }

    let pair = state
        .tokens
        .issue_pair(&user_id, &email)
        .map_err(|_| db_error_with_context("failed to issue tokens"))?;

    tracing::info!("registered user {}", user_id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, build_refresh_cookie(&state, &pair.refresh_token))],
        Json(AuthResponse {
            success: true,
            access_token: pair.access_token,
            user: PublicUser {
                id: user_id,
                email,
                created_at,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/auth/login
// ---------------------------------------------------------------------------

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<
    (StatusCode, [(header::HeaderName, String); 1], Json<AuthResponse>),
    (StatusCode, String),
> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Email and password are required.".to_string(),
        ));
    }

    // Unknown email and wrong password answer identically.
    let user = find_user_by_email(&state.main_db, payload.email.trim())
        .await?
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, ERR_INVALID_CREDENTIALS.to_string()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| (StatusCode::UNAUTHORIZED, ERR_INVALID_CREDENTIALS.to_string()))?;

    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| (StatusCode::UNAUTHORIZED, ERR_INVALID_CREDENTIALS.to_string()))?;

    let pair = state
        .tokens
        .issue_pair(&user.id, &user.email)
        .map_err(|_| db_error_with_context("failed to issue tokens"))?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, build_refresh_cookie(&state, &pair.refresh_token))],
        Json(AuthResponse {
            success: true,
            access_token: pair.access_token,
            user: user.into(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/auth/refresh
// ---------------------------------------------------------------------------

/// Rotation: every successful refresh mints a brand-new pair and
/// overwrites the cookie. The superseded refresh token is not denylisted.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<
    (StatusCode, [(header::HeaderName, String); 1], Json<RefreshResponse>),
    (StatusCode, String),
> {
    let token = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, ERR_NO_REFRESH_TOKEN.to_string()))?;

    let claims = state.tokens.verify_refresh(token).map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            ERR_INVALID_REFRESH_TOKEN.to_string(),
        )
    })?;

    // The user must still exist to get a new pair.
    let user = find_user_by_id(&state.main_db, &claims.sub)
        .await?
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                "User no longer exists.".to_string(),
            )
        })?;

    let pair = state
        .tokens
        .issue_pair(&user.id, &user.email)
        .map_err(|_| db_error_with_context("failed to issue tokens"))?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, build_refresh_cookie(&state, &pair.refresh_token))],
        Json(RefreshResponse {
            success: true,
            access_token: pair.access_token,
        }),
    ))
}

// ---------------------------------------------------------------------------
// POST /api/auth/logout
// ---------------------------------------------------------------------------

pub async fn logout(
    State(state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, String); 1], Json<serde_json::Value>) {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_refresh_cookie(&state))],
        Json(serde_json::json!({
            "success": true,
            "message": "Logged out successfully."
        })),
    )
}

// ---------------------------------------------------------------------------
// GET /api/auth/me
// ---------------------------------------------------------------------------

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, String)> {
    let claims = get_current_user(&state, &headers)?;

    let user = find_user_by_id(&state.main_db, &claims.sub)
        .await?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "User not found.".to_string()))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "user": PublicUser::from(user),
        })),
    ))
}

// ---------------------------------------------------------------------------
// DELETE /api/auth/account
// ---------------------------------------------------------------------------

/// Explicit cascade: transactions first, then the user row.
pub async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<
    (StatusCode, [(header::HeaderName, String); 1], Json<serde_json::Value>),
    (StatusCode, String),
> {
    let claims = get_current_user(&state, &headers)?;

    {
        let conn = state.main_db.write().await;
        conn.execute(
            "DELETE FROM transactions WHERE user_id = ?",
            [claims.sub.as_str()],
        )
        .await
        .map_err(|_| db_error_with_context("failed to delete transactions"))?;

        conn.execute("DELETE FROM users WHERE id = ?", [claims.sub.as_str()])
            .await
            .map_err(|_| db_error_with_context("failed to delete user"))?;
    }

    state.summary_cache.invalidate(&claims.sub).await;

    tracing::info!("deleted account {}", claims.sub);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_refresh_cookie(&state))],
        Json(serde_json::json!({
            "success": true,
            "message": "Account deleted successfully."
        })),
    ))
}

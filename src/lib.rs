pub mod auth;
pub mod cache;
pub mod categories;
pub mod chat;
pub mod classify;
pub mod client;
pub mod config;
pub mod constants;
pub mod database;
pub mod llm;
pub mod models;
pub mod receipts;
pub mod tokens;
pub mod transactions;
pub mod utils;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

// Re-export types at crate root for convenient importing
pub use crate::cache::{CategoryCache, SummaryCache};
pub use crate::database::Db;
pub use crate::tokens::TokenKeys;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Main database (users, categories, transactions)
    pub main_db: Db,
    /// Access/refresh signing keys and lifetimes
    pub tokens: Arc<TokenKeys>,
    /// Category-name snapshot used by the classifier
    pub category_cache: CategoryCache,
    /// Per-user spending summaries used by the coach chat
    pub summary_cache: SummaryCache,
    /// Hosted LLM API; None degrades to keyword-only classification
    pub llm: Option<llm::LlmClient>,
    /// Mark the refresh cookie Secure (production behind HTTPS)
    pub secure_cookies: bool,
}

/// Build the application router. Shared between the binary and tests.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/account", delete(auth::delete_account))
        .route(
            "/api/transactions",
            post(transactions::create_transaction).get(transactions::get_transactions),
        )
        .route(
            "/api/transactions/all",
            delete(transactions::clear_all_transactions),
        )
        .route(
            "/api/transactions/{id}",
            delete(transactions::delete_transaction),
        )
        .route("/api/categories", get(categories::get_categories))
        .route("/api/receipts/scan", post(receipts::scan_receipt))
        .route("/api/receipts/save", post(receipts::save_scanned))
        .route("/api/chat", post(chat::send_message))
        .with_state(state)
}

async fn root() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "message": "FinTrack API is running" }))
}

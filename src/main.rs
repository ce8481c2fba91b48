use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use fintrack_server::{
    AppState, CategoryCache, SummaryCache, TokenKeys, app, config::Config, database, llm::LlmClient,
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load and validate configuration
    let config = Config::from_env().map_err(|e| format!("Configuration error: {}", e))?;

    // Initialize main database (creates schema + seeds categories)
    let main_db = database::init_main_db(&config.data_path)
        .await
        .map_err(|e| format!("Failed to initialize main database: {}", e))?;

    let tokens = Arc::new(TokenKeys::new(
        config.jwt_secret.as_bytes(),
        config.jwt_refresh_secret.as_bytes(),
        config.access_token_secs,
        config.refresh_token_secs,
    ));

    let llm = match &config.llm_api_key {
        Some(key) => Some(LlmClient::new(key.clone(), config.llm_api_url.clone())),
        None => {
            tracing::warn!(
                "LLM_API_KEY not set; classification falls back to keywords, chat and scanning are degraded"
            );
            None
        }
    };

    let app_state = AppState {
        main_db,
        tokens,
        category_cache: CategoryCache::new(),
        summary_cache: SummaryCache::new(),
        llm,
        secure_cookies: config.secure_cookies,
    };

    // Configure CORS to allow frontend requests (cookies require credentials)
    let frontend_origin_header = config
        .frontend_origin
        .parse::<axum::http::HeaderValue>()
        .map_err(|e| format!("Invalid FRONTEND_ORIGIN '{}': {}", config.frontend_origin, e))?;

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin_header)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::AUTHORIZATION,
            axum::http::header::COOKIE,
        ])
        .allow_credentials(true);

    let router = app(app_state).layer(cors);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", bind_address, e))?;

    tracing::info!("Server running on http://{}", bind_address);

    axum::serve(listener, router)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}

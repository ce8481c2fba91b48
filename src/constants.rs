// Server configuration
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: &str = "5000";
pub const DEFAULT_DATA_PATH: &str = "data";

// Token lifetimes
pub const DEFAULT_ACCESS_TOKEN_MINUTES: u64 = 15;
pub const DEFAULT_REFRESH_TOKEN_DAYS: u64 = 7;
pub const MIN_TOKEN_SECRET_LENGTH: usize = 32;

// Refresh token transport
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

// Cache TTLs
pub const CATEGORY_CACHE_TTL_SECS: u64 = 10 * 60;
pub const SUMMARY_CACHE_TTL_SECS: u64 = 2 * 60;

// Validation limits
pub const MAX_DESCRIPTION_LENGTH: usize = 255;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 6;

// Receipt upload limits
pub const MAX_RECEIPT_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_RECEIPT_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "image/gif"];

// Chat coach limits
pub const SUMMARY_TRANSACTION_LIMIT: u32 = 30;
pub const MAX_CHAT_HISTORY: usize = 6;
pub const CHAT_MAX_TOKENS: u32 = 256;
pub const CLASSIFY_MAX_TOKENS: u32 = 10;

// Hosted LLM API (OpenAI-compatible chat completions)
pub const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const CHAT_MODEL: &str = "llama-3.3-70b-versatile";
pub const VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

// Category every unclassifiable transaction falls back to
pub const FALLBACK_CATEGORY: &str = "Other";

// Error messages
pub const ERR_DATABASE_OPERATION: &str = "Database operation failed";
pub const ERR_NO_TOKEN: &str = "Access denied. No token provided.";
pub const ERR_INVALID_TOKEN: &str = "Invalid or expired token.";
pub const ERR_NO_REFRESH_TOKEN: &str = "No refresh token. Please log in again.";
pub const ERR_INVALID_REFRESH_TOKEN: &str = "Invalid refresh token. Please log in again.";
pub const ERR_INVALID_CREDENTIALS: &str = "Invalid email or password.";

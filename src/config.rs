use crate::constants::*;

/// Runtime configuration loaded from the environment.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: String,
    pub data_path: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_token_secs: u64,
    pub refresh_token_secs: u64,
    pub llm_api_key: Option<String>,
    pub llm_api_url: String,
    /// Mark the refresh cookie `Secure` (set PRODUCTION=true behind HTTPS).
    pub secure_cookies: bool,
    pub frontend_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;
        let jwt_refresh_secret = std::env::var("JWT_REFRESH_SECRET")
            .map_err(|_| "JWT_REFRESH_SECRET must be set".to_string())?;

        if jwt_secret.len() < MIN_TOKEN_SECRET_LENGTH {
            return Err(format!(
                "JWT_SECRET must be at least {} characters",
                MIN_TOKEN_SECRET_LENGTH
            ));
        }
        if jwt_refresh_secret.len() < MIN_TOKEN_SECRET_LENGTH {
            return Err(format!(
                "JWT_REFRESH_SECRET must be at least {} characters",
                MIN_TOKEN_SECRET_LENGTH
            ));
        }
        if jwt_secret == jwt_refresh_secret {
            return Err("JWT_SECRET and JWT_REFRESH_SECRET must differ".to_string());
        }

        let access_minutes = parse_env_u64("ACCESS_TOKEN_MINUTES", DEFAULT_ACCESS_TOKEN_MINUTES)?;
        let refresh_days = parse_env_u64("REFRESH_TOKEN_DAYS", DEFAULT_REFRESH_TOKEN_DAYS)?;

        let secure_cookies = std::env::var("PRODUCTION")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string()),
            data_path: std::env::var("DATA_PATH").unwrap_or_else(|_| DEFAULT_DATA_PATH.to_string()),
            jwt_secret,
            jwt_refresh_secret,
            access_token_secs: access_minutes * 60,
            refresh_token_secs: refresh_days * 24 * 60 * 60,
            llm_api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_api_url: std::env::var("LLM_API_URL")
                .unwrap_or_else(|_| DEFAULT_LLM_API_URL.to_string()),
            secure_cookies,
            frontend_origin: std::env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| format!("{} must be a positive integer", name)),
        Err(_) => Ok(default),
    }
}

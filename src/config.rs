use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// Base URL the invite/reset links point at, e.g. https://app.tenantx.com
    pub frontend_origin: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Key for password-set tokens; falls back to JWT_SECRET when unset.
    pub reset_token_secret: Vec<u8>,
    pub reset_token_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");

        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "tenantx".to_string());
        let jwt_audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "tenantx-api".to_string());

        let reset_token_secret = env::var("RESET_TOKEN_SECRET")
            .or_else(|_| env::var("JWT_SECRET"))
            .expect("RESET_TOKEN_SECRET or JWT_SECRET must be set")
            .into_bytes();

        let reset_token_ttl_hours = env::var("RESET_TOKEN_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(72);

        Config {
            database_url,
            frontend_origin,
            jwt_issuer,
            jwt_audience,
            reset_token_secret,
            reset_token_ttl_hours,
        }
    }

    pub fn reset_link(&self, uid: &str, token: &str) -> String {
        format!("{}/reset-password/{}/{}", self.frontend_origin, uid, token)
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Config {
            database_url: String::new(),
            frontend_origin: "http://localhost:5173".into(),
            jwt_issuer: "test-issuer".into(),
            jwt_audience: "test-audience".into(),
            reset_token_secret: b"0123456789abcdef0123456789abcdef".to_vec(),
            reset_token_ttl_hours: 72,
        }
    }
}

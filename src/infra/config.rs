use std::fmt::Debug;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;

/// All environment-derived settings, read once at startup and passed to
/// constructors. Nothing else in the crate touches the environment.
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    pub cors_origin: HeaderValue,
    pub jwt_access_secret: SecretString,
    pub jwt_refresh_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub otp_ttl_minutes: i64,
    pub otp_max_attempts: i32,
    pub otp_resend_cooldown_secs: i64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    pub resend_api_key: SecretString,
    pub email_from: String,
    /// Only enable behind a reverse proxy; otherwise clients can spoof
    /// X-Forwarded-For and dodge the rate limiter.
    pub trust_proxy: bool,
}

fn required(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Debug,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} is not valid: {e:?}")),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_access_secret = SecretString::new(required("JWT_ACCESS_SECRET").into());
        let jwt_refresh_secret = SecretString::new(required("JWT_REFRESH_SECRET").into());

        let access_token_ttl_mins: i64 = parsed_or("ACCESS_TOKEN_TTL_MINUTES", 15);
        let refresh_token_ttl_days: i64 = parsed_or("REFRESH_TOKEN_TTL_DAYS", 7);

        let cors_origin: HeaderValue = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .parse()
            .expect("CORS_ORIGIN must be a valid header value");

        Self {
            bind_addr: parsed_or("BIND_ADDR", "127.0.0.1:5000".parse().unwrap()),
            database_url: required("DATABASE_URL"),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            cors_origin,
            jwt_access_secret,
            jwt_refresh_secret,
            access_token_ttl: Duration::minutes(access_token_ttl_mins),
            refresh_token_ttl: Duration::days(refresh_token_ttl_days),
            otp_ttl_minutes: parsed_or("OTP_EXPIRES_IN_MINUTES", 10),
            otp_max_attempts: parsed_or("OTP_MAX_ATTEMPTS", 5),
            otp_resend_cooldown_secs: parsed_or("OTP_RESEND_COOLDOWN_SECS", 60),
            rate_limit_window_secs: parsed_or("RATE_LIMIT_WINDOW_SECS", 900),
            rate_limit_per_ip: parsed_or("RATE_LIMIT_PER_IP", 100),
            resend_api_key: SecretString::new(required("RESEND_API_KEY").into()),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Prejamb <noreply@prejamb.com>".to_string()),
            trust_proxy: parsed_or("TRUST_PROXY", false),
        }
    }
}

use sqlx::PgPool;

use crate::app_error::AppError;

pub mod deleted_email;
pub mod exam_result;
pub mod otp;
pub mod payment;
pub mod preferences;
pub mod refresh_token;
pub mod subscription;
pub mod support_ticket;
pub mod user;

/// Postgres-backed implementation of every repository trait. One pool,
/// shared across all of them.
#[derive(Clone)]
pub struct PostgresPersistence {
    pub pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Decode an enum column stored as text. An unknown value means the row
/// was written by newer code or corrupted, either way a database-level
/// problem.
pub(crate) fn parse_enum<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::Database(format!("invalid {what}: {raw}")))
}

use chrono::NaiveDateTime;
use uuid::Uuid;

/// Server-side session record. Holds the SHA-256 digest of the token
/// string, never the raw token. One row per active session; rotation
/// deletes the consumed row and inserts a fresh one.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an OTP proves. At most one unused code per (user, purpose) is
/// authoritative at any time; issuing a new one retires the previous.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
    AccountDisable,
    AccountDelete,
}

/// One issued code. Never updated after `used` flips to true.
#[derive(Debug, Clone)]
pub struct Otp {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub purpose: OtpPurpose,
    pub expires_at: NaiveDateTime,
    pub used: bool,
    pub attempts: i32,
    pub created_at: NaiveDateTime,
}

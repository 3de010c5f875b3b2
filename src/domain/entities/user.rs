use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized subscription state cached on the user record. The
/// authoritative answer always comes from resolving the subscription rows;
/// this flag exists so login/profile reads avoid the extra lookup.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
}

/// Number of previous password hashes retained for reuse checks.
pub const PASSWORD_HISTORY_LEN: usize = 3;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub phone_number: Option<String>,
    pub is_verified: bool,
    pub is_profile_complete: bool,
    pub is_disabled: bool,
    pub disabled_at: Option<NaiveDateTime>,
    pub disable_reason: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub subscription_end_date: Option<NaiveDateTime>,
    /// Sticky: survives account deletion via the DeletedEmail tombstone.
    pub has_used_free_trial: bool,
    /// Hashes of the last passwords, most recent first.
    pub password_history: Vec<String>,
    pub created_at: NaiveDateTime,
}

/// Fields required to create a user at registration time.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub subscription_status: SubscriptionStatus,
    pub has_used_free_trial: bool,
}

/// Profile fields supplied when completing registration.
#[derive(Debug, Clone)]
pub struct ProfileFields {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub phone_number: String,
}

/// Public projection of a user, safe to return from the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub phone_number: Option<String>,
    pub is_verified: bool,
    pub is_profile_complete: bool,
    pub created_at: NaiveDateTime,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            middle_name: user.middle_name.clone(),
            phone_number: user.phone_number.clone(),
            is_verified: user.is_verified,
            is_profile_complete: user.is_profile_complete,
            created_at: user.created_at,
        }
    }
}

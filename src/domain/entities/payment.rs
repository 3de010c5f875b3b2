use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription::PlanType;

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
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// A payment transitions PENDING -> SUCCESS at most once; a settled
    /// payment must never be re-verified.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Success)
    }
}

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
pub enum PaymentMethod {
    Card,
    Transfer,
    Ussd,
}

#[derive(Debug, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount: i64,
    pub plan_type: PlanType,
    pub payment_method: PaymentMethod,
    pub payment_reference: String,
    pub gateway_reference: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub amount: i64,
    pub plan_type: PlanType,
    pub payment_method: PaymentMethod,
    pub payment_reference: String,
}

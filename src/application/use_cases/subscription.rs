use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::auth::UserRepo,
    domain::entities::{
        payment::{NewPayment, Payment, PaymentMethod, PaymentStatus},
        subscription::{ExamMode, NewSubscription, PlanType, Subscription},
        user::SubscriptionStatus,
    },
};

/// Static plan catalog. The FREE plan never really expires; its duration
/// just has to clear any end-date comparison.
#[derive(Debug, Clone)]
pub struct PlanSpec {
    pub plan_type: PlanType,
    pub name: &'static str,
    pub amount: i64,
    pub duration_days: i64,
    pub exam_modes: &'static [ExamMode],
    /// One trial per mode; only the FREE plan has a cap.
    pub max_trials: Option<usize>,
}

const FREE_PLAN: PlanSpec = PlanSpec {
    plan_type: PlanType::Free,
    name: "Free Plan",
    amount: 0,
    duration_days: 999_999,
    exam_modes: &[ExamMode::PureJamb, ExamMode::JambAi],
    max_trials: Some(2),
};

const STARTER_PLAN: PlanSpec = PlanSpec {
    plan_type: PlanType::Starter,
    name: "Starter Plan",
    amount: 500,
    duration_days: 30,
    exam_modes: &[ExamMode::PureJamb, ExamMode::JambAi],
    max_trials: None,
};

const STANDARD_PLAN: PlanSpec = PlanSpec {
    plan_type: PlanType::Standard,
    name: "Standard Plan",
    amount: 1000,
    duration_days: 30,
    exam_modes: &[ExamMode::PureJamb, ExamMode::JambAi, ExamMode::SingleSubject],
    max_trials: None,
};

const ANNUAL_PLAN: PlanSpec = PlanSpec {
    plan_type: PlanType::Annual,
    name: "Annual Plan",
    amount: 10_000,
    duration_days: 365,
    exam_modes: &[ExamMode::PureJamb, ExamMode::JambAi, ExamMode::SingleSubject],
    max_trials: None,
};

pub const PLAN_CATALOG: [&PlanSpec; 4] = [&FREE_PLAN, &STARTER_PLAN, &STANDARD_PLAN, &ANNUAL_PLAN];

impl PlanType {
    pub fn spec(self) -> &'static PlanSpec {
        match self {
            PlanType::Free => &FREE_PLAN,
            PlanType::Starter => &STARTER_PLAN,
            PlanType::Standard => &STANDARD_PLAN,
            PlanType::Annual => &ANNUAL_PLAN,
        }
    }
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// The current subscription: latest created row that is active and not
    /// yet past its end date.
    async fn active_for_user(
        &self,
        user_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Option<Subscription>>;
    async fn insert(&self, subscription: NewSubscription) -> AppResult<Subscription>;
    /// Flip `is_active` off on every active row. Returns rows touched.
    async fn deactivate_all(&self, user_id: Uuid) -> AppResult<u64>;
    /// Like `deactivate_all` but also switches auto-renew off.
    async fn cancel_active(&self, user_id: Uuid) -> AppResult<u64>;
    /// Set-insert a consumed trial mode.
    async fn add_free_trial_mode(&self, subscription_id: Uuid, mode: ExamMode) -> AppResult<()>;
}

#[async_trait]
pub trait PaymentRepo: Send + Sync {
    async fn insert(&self, payment: NewPayment) -> AppResult<Payment>;
    async fn find_by_reference(&self, reference: &str) -> AppResult<Option<Payment>>;
    async fn mark_success(
        &self,
        payment_id: Uuid,
        paid_at: NaiveDateTime,
        gateway_reference: Option<&str>,
    ) -> AppResult<()>;
    async fn link_subscription(&self, payment_id: Uuid, subscription_id: Uuid) -> AppResult<()>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetails {
    pub plan_type: PlanType,
    pub name: &'static str,
    pub amount: i64,
    pub validity: String,
    pub duration_days: Option<i64>,
    pub exam_modes: Vec<ExamMode>,
}

impl From<&'static PlanSpec> for PlanDetails {
    fn from(spec: &'static PlanSpec) -> Self {
        let unlimited = spec.plan_type == PlanType::Free;
        Self {
            plan_type: spec.plan_type,
            name: spec.name,
            amount: spec.amount,
            validity: if unlimited {
                "Lifetime".to_string()
            } else {
                format!("{} days", spec.duration_days)
            },
            duration_days: (!unlimited).then_some(spec.duration_days),
            exam_modes: spec.exam_modes.to_vec(),
        }
    }
}

/// Entitlement check result; a denial always carries the reason shown to
/// the student.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeAccess {
    pub can_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ModeAccess {
    fn allowed() -> Self {
        Self {
            can_access: true,
            reason: None,
        }
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self {
            can_access: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInit {
    pub payment_reference: String,
    pub amount: i64,
    pub plan: PlanDetails,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPlan {
    pub plan_type: PlanType,
    pub name: &'static str,
    pub amount: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub days_remaining: Option<i64>,
    pub free_trials_used: Vec<ExamMode>,
    pub free_trials_remaining: Option<i64>,
    pub exam_modes: Vec<ExamMode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusSummary {
    pub status: SubscriptionStatus,
    pub current_plan: Option<CurrentPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    payments: Arc<dyn PaymentRepo>,
    users: Arc<dyn UserRepo>,
}

impl SubscriptionUseCases {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        payments: Arc<dyn PaymentRepo>,
        users: Arc<dyn UserRepo>,
    ) -> Self {
        Self {
            subscriptions,
            payments,
            users,
        }
    }

    pub fn available_plans(&self) -> Vec<PlanDetails> {
        PLAN_CATALOG.iter().map(|spec| PlanDetails::from(*spec)).collect()
    }

    pub fn plan_details(&self, plan_type: PlanType) -> PlanDetails {
        PlanDetails::from(plan_type.spec())
    }

    pub async fn active_subscription(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        self.subscriptions
            .active_for_user(user_id, Utc::now().naive_utc())
            .await
    }

    /// Start the FREE plan for a trial-eligible user. Idempotent: an
    /// existing current subscription is returned as-is, and ineligible
    /// users (trial already spent elsewhere) get nothing.
    #[instrument(skip(self))]
    pub async fn create_free_subscription(
        &self,
        user_id: Uuid,
    ) -> AppResult<Option<Subscription>> {
        if let Some(existing) = self.active_subscription(user_id).await? {
            return Ok(Some(existing));
        }

        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(None);
        };
        if user.subscription_status != SubscriptionStatus::Active {
            return Ok(None);
        }

        let spec = PlanType::Free.spec();
        let start = Utc::now().naive_utc();
        let end = start + Duration::days(spec.duration_days);

        let subscription = self
            .subscriptions
            .insert(NewSubscription {
                user_id,
                plan_type: PlanType::Free,
                amount: 0,
                start_date: start,
                end_date: end,
                payment_reference: None,
            })
            .await?;

        self.users
            .set_subscription(user_id, SubscriptionStatus::Active, Some(end))
            .await?;

        Ok(Some(subscription))
    }

    /// Gate an exam mode behind the caller's current plan and, on FREE,
    /// behind the per-mode trial.
    #[instrument(skip(self))]
    pub async fn can_access_exam_mode(
        &self,
        user_id: Uuid,
        mode: ExamMode,
    ) -> AppResult<ModeAccess> {
        let Some(subscription) = self.active_subscription(user_id).await? else {
            return Ok(ModeAccess::denied("No active subscription"));
        };

        let spec = subscription.plan_type.spec();
        if !spec.exam_modes.contains(&mode) {
            return Ok(ModeAccess::denied(format!(
                "{mode} mode is not available in {}. Please upgrade your plan.",
                spec.name
            )));
        }

        if subscription.plan_type == PlanType::Free
            && subscription.free_trials_used.contains(&mode)
        {
            return Ok(ModeAccess::denied(
                "Free trial for this mode has been used. Please upgrade to continue practicing.",
            ));
        }

        Ok(ModeAccess::allowed())
    }

    /// Consume the free trial for a mode. No-op on paid plans and when the
    /// mode was already consumed.
    #[instrument(skip(self))]
    pub async fn mark_free_trial_used(&self, user_id: Uuid, mode: ExamMode) -> AppResult<()> {
        let Some(subscription) = self.active_subscription(user_id).await? else {
            return Ok(());
        };
        if subscription.plan_type != PlanType::Free {
            return Ok(());
        }
        if subscription.free_trials_used.contains(&mode) {
            return Ok(());
        }
        self.subscriptions
            .add_free_trial_mode(subscription.id, mode)
            .await
    }

    /// Open a PENDING payment for a paid plan and hand back the reference
    /// the gateway callback will quote.
    #[instrument(skip(self))]
    pub async fn initialize_payment(
        &self,
        user_id: Uuid,
        plan_type: PlanType,
        payment_method: PaymentMethod,
    ) -> AppResult<PaymentInit> {
        if plan_type == PlanType::Free {
            return Err(AppError::BusinessRule(
                "Cannot make payment for free plan".to_string(),
            ));
        }

        let spec = plan_type.spec();
        let payment_reference = generate_payment_reference();

        self.payments
            .insert(NewPayment {
                user_id,
                amount: spec.amount,
                plan_type,
                payment_method,
                payment_reference: payment_reference.clone(),
            })
            .await?;

        Ok(PaymentInit {
            payment_reference,
            amount: spec.amount,
            plan: self.plan_details(plan_type),
        })
    }

    /// Settle a payment and swap the user onto the paid plan. Re-verifying
    /// an already-settled payment is refused so a gateway retry can never
    /// mint a second subscription. Activation deactivates every prior
    /// active row first; single-current is enforced here, not by the
    /// schema.
    #[instrument(skip(self))]
    pub async fn verify_and_activate(
        &self,
        payment_reference: &str,
        gateway_reference: Option<&str>,
    ) -> AppResult<(Subscription, Payment)> {
        let mut payment = self
            .payments
            .find_by_reference(payment_reference)
            .await?
            .ok_or(AppError::NotFound("Payment"))?;

        if payment.status.is_settled() {
            return Err(AppError::BusinessRule("Payment already processed".to_string()));
        }

        let now = Utc::now().naive_utc();
        self.payments
            .mark_success(payment.id, now, gateway_reference)
            .await?;
        payment.status = PaymentStatus::Success;
        payment.paid_at = Some(now);
        payment.gateway_reference = gateway_reference.map(|s| s.to_string());

        self.subscriptions.deactivate_all(payment.user_id).await?;

        let spec = payment.plan_type.spec();
        let end = now + Duration::days(spec.duration_days);
        let subscription = self
            .subscriptions
            .insert(NewSubscription {
                user_id: payment.user_id,
                plan_type: payment.plan_type,
                amount: payment.amount,
                start_date: now,
                end_date: end,
                payment_reference: Some(payment.payment_reference.clone()),
            })
            .await?;

        self.payments
            .link_subscription(payment.id, subscription.id)
            .await?;
        payment.subscription_id = Some(subscription.id);

        self.users
            .set_subscription(payment.user_id, SubscriptionStatus::Active, Some(end))
            .await?;

        Ok((subscription, payment))
    }

    /// Deactivate everything and turn auto-renew off. History stays; no
    /// refunds here.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: Uuid) -> AppResult<()> {
        self.subscriptions.cancel_active(user_id).await?;
        self.users
            .set_subscription(user_id, SubscriptionStatus::Inactive, None)
            .await
    }

    pub async fn subscription_status(
        &self,
        user_id: Uuid,
    ) -> AppResult<SubscriptionStatusSummary> {
        let Some(subscription) = self.active_subscription(user_id).await? else {
            return Ok(SubscriptionStatusSummary {
                status: SubscriptionStatus::Inactive,
                current_plan: None,
                message: Some("No active subscription".to_string()),
            });
        };

        let spec = subscription.plan_type.spec();
        let free = subscription.plan_type == PlanType::Free;
        let days_remaining =
            (subscription.end_date - Utc::now().naive_utc()).num_days().max(0);

        Ok(SubscriptionStatusSummary {
            status: SubscriptionStatus::Active,
            current_plan: Some(CurrentPlan {
                plan_type: subscription.plan_type,
                name: spec.name,
                amount: subscription.amount,
                start_date: subscription.start_date,
                end_date: subscription.end_date,
                days_remaining: (!free).then_some(days_remaining),
                free_trials_remaining: spec
                    .max_trials
                    .map(|cap| cap as i64 - subscription.free_trials_used.len() as i64),
                free_trials_used: subscription.free_trials_used,
                exam_modes: spec.exam_modes.to_vec(),
            }),
            message: None,
        })
    }
}

fn generate_payment_reference() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "PAY-{}-{}",
        Utc::now().timestamp_millis(),
        hex::encode(bytes).to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::factories::SubscriptionHarness;

    #[tokio::test]
    async fn free_plan_gates_modes_by_trial_consumption() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Active).await;
        h.subs.create_free_subscription(user_id).await.unwrap().unwrap();

        let access = h
            .subs
            .can_access_exam_mode(user_id, ExamMode::PureJamb)
            .await
            .unwrap();
        assert!(access.can_access);

        h.subs
            .mark_free_trial_used(user_id, ExamMode::PureJamb)
            .await
            .unwrap();
        let access = h
            .subs
            .can_access_exam_mode(user_id, ExamMode::PureJamb)
            .await
            .unwrap();
        assert!(!access.can_access);

        // SINGLE_SUBJECT is outside the FREE mode set regardless of trials.
        let access = h
            .subs
            .can_access_exam_mode(user_id, ExamMode::SingleSubject)
            .await
            .unwrap();
        assert!(!access.can_access);
        assert!(access.reason.unwrap().contains("upgrade"));
    }

    #[tokio::test]
    async fn marking_a_trial_twice_keeps_set_semantics() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Active).await;
        h.subs.create_free_subscription(user_id).await.unwrap().unwrap();

        h.subs.mark_free_trial_used(user_id, ExamMode::JambAi).await.unwrap();
        h.subs.mark_free_trial_used(user_id, ExamMode::JambAi).await.unwrap();

        let current = h.subs.active_subscription(user_id).await.unwrap().unwrap();
        assert_eq!(current.free_trials_used, vec![ExamMode::JambAi]);
    }

    #[tokio::test]
    async fn no_subscription_means_no_access() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Inactive).await;

        let access = h
            .subs
            .can_access_exam_mode(user_id, ExamMode::PureJamb)
            .await
            .unwrap();
        assert!(!access.can_access);
        assert_eq!(access.reason.as_deref(), Some("No active subscription"));
    }

    #[tokio::test]
    async fn ineligible_user_gets_no_free_subscription() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Inactive).await;

        let created = h.subs.create_free_subscription(user_id).await.unwrap();
        assert!(created.is_none());
    }

    #[tokio::test]
    async fn free_plan_cannot_be_paid_for() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Active).await;

        let err = h
            .subs
            .initialize_payment(user_id, PlanType::Free, PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn payment_verification_activates_exactly_once() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Active).await;

        let init = h
            .subs
            .initialize_payment(user_id, PlanType::Standard, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(init.amount, 1000);
        assert!(init.payment_reference.starts_with("PAY-"));

        let (subscription, payment) = h
            .subs
            .verify_and_activate(&init.payment_reference, Some("gw-001"))
            .await
            .unwrap();
        assert_eq!(subscription.plan_type, PlanType::Standard);
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.subscription_id, Some(subscription.id));

        // Gateway retry: refused, and no second subscription appears.
        let err = h
            .subs
            .verify_and_activate(&init.payment_reference, Some("gw-001"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
        assert_eq!(h.sub_repo.count_for_user(user_id), 1);
    }

    #[tokio::test]
    async fn activation_replaces_the_previous_subscription() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Active).await;
        h.subs.create_free_subscription(user_id).await.unwrap().unwrap();

        let init = h
            .subs
            .initialize_payment(user_id, PlanType::Starter, PaymentMethod::Transfer)
            .await
            .unwrap();
        h.subs
            .verify_and_activate(&init.payment_reference, None)
            .await
            .unwrap();

        let current = h.subs.active_subscription(user_id).await.unwrap().unwrap();
        assert_eq!(current.plan_type, PlanType::Starter);

        let user = h.users.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
        assert_eq!(user.subscription_end_date, Some(current.end_date));
    }

    #[tokio::test]
    async fn cancel_clears_the_denormalized_status() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Active).await;
        h.subs.create_free_subscription(user_id).await.unwrap().unwrap();

        h.subs.cancel(user_id).await.unwrap();

        assert!(h.subs.active_subscription(user_id).await.unwrap().is_none());
        let user = h.users.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.subscription_status, SubscriptionStatus::Inactive);

        let summary = h.subs.subscription_status(user_id).await.unwrap();
        assert_eq!(summary.status, SubscriptionStatus::Inactive);
        assert!(summary.current_plan.is_none());
    }

    #[tokio::test]
    async fn status_summary_reports_trials_remaining_on_free() {
        let h = SubscriptionHarness::new();
        let user_id = h.seed_user(SubscriptionStatus::Active).await;
        h.subs.create_free_subscription(user_id).await.unwrap().unwrap();
        h.subs.mark_free_trial_used(user_id, ExamMode::PureJamb).await.unwrap();

        let summary = h.subs.subscription_status(user_id).await.unwrap();
        let plan = summary.current_plan.unwrap();
        assert_eq!(plan.plan_type, PlanType::Free);
        assert_eq!(plan.days_remaining, None);
        assert_eq!(plan.free_trials_remaining, Some(1));
    }

    #[test]
    fn catalog_exposes_all_four_plans() {
        assert_eq!(PLAN_CATALOG.len(), 4);
        assert_eq!(PlanType::Annual.spec().duration_days, 365);
        assert!(PlanType::Free.spec().exam_modes.len() < PlanType::Standard.spec().exam_modes.len());
    }
}

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_enum},
    app_error::{AppError, AppResult},
    domain::entities::subscription::{ExamMode, NewSubscription, Subscription},
    use_cases::subscription::SubscriptionRepo,
};

#[derive(sqlx::FromRow, Debug)]
struct SubscriptionDb {
    id: Uuid,
    user_id: Uuid,
    plan_type: String,
    amount: i64,
    start_date: NaiveDateTime,
    end_date: NaiveDateTime,
    is_active: bool,
    auto_renew: bool,
    free_trials_used: Vec<String>,
    payment_reference: Option<String>,
    created_at: NaiveDateTime,
}

impl SubscriptionDb {
    fn into_subscription(self) -> AppResult<Subscription> {
        let free_trials_used = self
            .free_trials_used
            .iter()
            .map(|m| parse_enum::<ExamMode>(m, "exam mode"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Subscription {
            id: self.id,
            user_id: self.user_id,
            plan_type: parse_enum(&self.plan_type, "plan_type")?,
            amount: self.amount,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
            auto_renew: self.auto_renew,
            free_trials_used,
            payment_reference: self.payment_reference,
            created_at: self.created_at,
        })
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_type, amount, start_date, end_date, \
     is_active, auto_renew, free_trials_used, payment_reference, created_at";

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn active_for_user(
        &self,
        user_id: Uuid,
        now: NaiveDateTime,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionDb>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE user_id = $1 AND is_active = TRUE AND end_date > $2
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(SubscriptionDb::into_subscription).transpose()
    }

    async fn insert(&self, subscription: NewSubscription) -> AppResult<Subscription> {
        let row = sqlx::query_as::<_, SubscriptionDb>(&format!(
            "INSERT INTO subscriptions
                 (id, user_id, plan_type, amount, start_date, end_date, payment_reference)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(subscription.user_id)
        .bind(subscription.plan_type.as_ref())
        .bind(subscription.amount)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(&subscription.payment_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.into_subscription()
    }

    async fn deactivate_all(&self, user_id: Uuid) -> AppResult<u64> {
        let result =
            sqlx::query("UPDATE subscriptions SET is_active = FALSE WHERE user_id = $1 AND is_active = TRUE")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }

    async fn cancel_active(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE subscriptions SET is_active = FALSE, auto_renew = FALSE
             WHERE user_id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }

    async fn add_free_trial_mode(&self, subscription_id: Uuid, mode: ExamMode) -> AppResult<()> {
        // Guarded append keeps set semantics without read-modify-write.
        sqlx::query(
            "UPDATE subscriptions
             SET free_trials_used = array_append(free_trials_used, $2)
             WHERE id = $1 AND NOT ($2 = ANY(free_trials_used))",
        )
        .bind(subscription_id)
        .bind(mode.as_ref())
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}

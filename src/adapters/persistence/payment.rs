use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_enum},
    app_error::{AppError, AppResult},
    domain::entities::payment::{NewPayment, Payment},
    use_cases::subscription::PaymentRepo,
};

#[derive(sqlx::FromRow, Debug)]
struct PaymentDb {
    id: Uuid,
    user_id: Uuid,
    subscription_id: Option<Uuid>,
    amount: i64,
    plan_type: String,
    payment_method: String,
    payment_reference: String,
    gateway_reference: Option<String>,
    status: String,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

impl PaymentDb {
    fn into_payment(self) -> AppResult<Payment> {
        Ok(Payment {
            id: self.id,
            user_id: self.user_id,
            subscription_id: self.subscription_id,
            amount: self.amount,
            plan_type: parse_enum(&self.plan_type, "plan_type")?,
            payment_method: parse_enum(&self.payment_method, "payment_method")?,
            payment_reference: self.payment_reference,
            gateway_reference: self.gateway_reference,
            status: parse_enum(&self.status, "payment status")?,
            paid_at: self.paid_at,
            created_at: self.created_at,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, user_id, subscription_id, amount, plan_type, payment_method, \
     payment_reference, gateway_reference, status, paid_at, created_at";

#[async_trait]
impl PaymentRepo for PostgresPersistence {
    async fn insert(&self, payment: NewPayment) -> AppResult<Payment> {
        let row = sqlx::query_as::<_, PaymentDb>(&format!(
            "INSERT INTO payments (id, user_id, amount, plan_type, payment_method, payment_reference)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(payment.plan_type.as_ref())
        .bind(payment.payment_method.as_ref())
        .bind(&payment.payment_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.into_payment()
    }

    async fn find_by_reference(&self, reference: &str) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentDb>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(PaymentDb::into_payment).transpose()
    }

    async fn mark_success(
        &self,
        payment_id: Uuid,
        paid_at: NaiveDateTime,
        gateway_reference: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE payments
             SET status = 'SUCCESS', paid_at = $2,
                 gateway_reference = COALESCE($3, gateway_reference)
             WHERE id = $1",
        )
        .bind(payment_id)
        .bind(paid_at)
        .bind(gateway_reference)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn link_subscription(&self, payment_id: Uuid, subscription_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE payments SET subscription_id = $2 WHERE id = $1")
            .bind(payment_id)
            .bind(subscription_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}

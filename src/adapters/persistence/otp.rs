use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_enum},
    app_error::{AppError, AppResult},
    domain::entities::otp::{Otp, OtpPurpose},
    use_cases::otp::OtpRepo,
};

#[derive(sqlx::FromRow, Debug)]
struct OtpDb {
    id: Uuid,
    user_id: Uuid,
    code: String,
    purpose: String,
    expires_at: NaiveDateTime,
    used: bool,
    attempts: i32,
    created_at: NaiveDateTime,
}

impl OtpDb {
    fn into_otp(self) -> AppResult<Otp> {
        Ok(Otp {
            id: self.id,
            user_id: self.user_id,
            code: self.code,
            purpose: parse_enum(&self.purpose, "otp purpose")?,
            expires_at: self.expires_at,
            used: self.used,
            attempts: self.attempts,
            created_at: self.created_at,
        })
    }
}

const OTP_COLUMNS: &str = "id, user_id, code, purpose, expires_at, used, attempts, created_at";

#[async_trait]
impl OtpRepo for PostgresPersistence {
    async fn retire_unused(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<u64> {
        let result =
            sqlx::query("UPDATE otps SET used = TRUE WHERE user_id = $1 AND purpose = $2 AND used = FALSE")
                .bind(user_id)
                .bind(purpose.as_ref())
                .execute(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }

    async fn insert(
        &self,
        user_id: Uuid,
        code: &str,
        purpose: OtpPurpose,
        expires_at: NaiveDateTime,
    ) -> AppResult<Otp> {
        let row = sqlx::query_as::<_, OtpDb>(&format!(
            "INSERT INTO otps (id, user_id, code, purpose, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {OTP_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(code)
        .bind(purpose.as_ref())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.into_otp()
    }

    async fn latest_unused(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<Otp>> {
        let row = sqlx::query_as::<_, OtpDb>(&format!(
            "SELECT {OTP_COLUMNS} FROM otps
             WHERE user_id = $1 AND purpose = $2 AND used = FALSE
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(purpose.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(OtpDb::into_otp).transpose()
    }

    async fn latest_any(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<Otp>> {
        let row = sqlx::query_as::<_, OtpDb>(&format!(
            "SELECT {OTP_COLUMNS} FROM otps
             WHERE user_id = $1 AND purpose = $2
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(purpose.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(OtpDb::into_otp).transpose()
    }

    async fn mark_used(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE otps SET used = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn increment_attempts(&self, id: Uuid) -> AppResult<i32> {
        let attempts: i32 =
            sqlx::query_scalar("UPDATE otps SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(attempts)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM otps WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}

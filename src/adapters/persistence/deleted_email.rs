use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::deleted_email::DeletedEmail,
    use_cases::auth::DeletedEmailRepo,
};

#[derive(sqlx::FromRow, Debug)]
struct DeletedEmailDb {
    email: String,
    has_used_free_trial: bool,
    delete_reason: Option<String>,
    created_at: NaiveDateTime,
}

#[async_trait]
impl DeletedEmailRepo for PostgresPersistence {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<DeletedEmail>> {
        let row = sqlx::query_as::<_, DeletedEmailDb>(
            "SELECT email, has_used_free_trial, delete_reason, created_at
             FROM deleted_emails WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(|r| DeletedEmail {
            email: r.email,
            has_used_free_trial: r.has_used_free_trial,
            delete_reason: r.delete_reason,
            created_at: r.created_at,
        }))
    }

    async fn insert(
        &self,
        email: &str,
        has_used_free_trial: bool,
        delete_reason: &str,
    ) -> AppResult<()> {
        // The same address can be deleted more than once across its
        // lifetime; the trial flag only ever ratchets towards "used".
        sqlx::query(
            "INSERT INTO deleted_emails (email, has_used_free_trial, delete_reason)
             VALUES ($1, $2, $3)
             ON CONFLICT (email) DO UPDATE
             SET has_used_free_trial = deleted_emails.has_used_free_trial OR EXCLUDED.has_used_free_trial,
                 delete_reason = EXCLUDED.delete_reason",
        )
        .bind(email)
        .bind(has_used_free_trial)
        .bind(delete_reason)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}

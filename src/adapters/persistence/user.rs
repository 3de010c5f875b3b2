use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_enum},
    app_error::{AppError, AppResult},
    domain::entities::user::{NewUser, ProfileFields, SubscriptionStatus, User},
    use_cases::auth::UserRepo,
};

// User row as stored in the db.
#[derive(sqlx::FromRow, Debug)]
struct UserDb {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    middle_name: Option<String>,
    phone_number: Option<String>,
    is_verified: bool,
    is_profile_complete: bool,
    is_disabled: bool,
    disabled_at: Option<NaiveDateTime>,
    disable_reason: Option<String>,
    subscription_status: String,
    subscription_end_date: Option<NaiveDateTime>,
    has_used_free_trial: bool,
    password_history: Vec<String>,
    created_at: NaiveDateTime,
}

impl UserDb {
    fn into_user(self) -> AppResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            middle_name: self.middle_name,
            phone_number: self.phone_number,
            is_verified: self.is_verified,
            is_profile_complete: self.is_profile_complete,
            is_disabled: self.is_disabled,
            disabled_at: self.disabled_at,
            disable_reason: self.disable_reason,
            subscription_status: parse_enum(&self.subscription_status, "subscription_status")?,
            subscription_end_date: self.subscription_end_date,
            has_used_free_trial: self.has_used_free_trial,
            password_history: self.password_history,
            created_at: self.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, middle_name, \
     phone_number, is_verified, is_profile_complete, is_disabled, disabled_at, disable_reason, \
     subscription_status, subscription_end_date, has_used_free_trial, password_history, created_at";

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserDb>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(UserDb::into_user).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserDb>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(UserDb::into_user).transpose()
    }

    async fn insert(&self, user: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserDb>(&format!(
            "INSERT INTO users (id, email, password_hash, subscription_status, has_used_free_trial)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.subscription_status.as_ref())
        .bind(user.has_used_free_trial)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.into_user()
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn mark_verified(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET is_verified = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn set_profile(&self, user_id: Uuid, profile: ProfileFields) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserDb>(&format!(
            "UPDATE users
             SET first_name = $2, last_name = $3, middle_name = $4, phone_number = $5,
                 is_profile_complete = TRUE
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.middle_name)
        .bind(&profile.phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::NotFound("User"))?;
        row.into_user()
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn update_password_with_history(
        &self,
        user_id: Uuid,
        password_hash: &str,
        history: Vec<String>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, password_history = $3 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .bind(&history)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn disable(
        &self,
        user_id: Uuid,
        reason: &str,
        disabled_at: NaiveDateTime,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE users
             SET is_disabled = TRUE, disabled_at = $3, disable_reason = $2,
                 subscription_status = 'INACTIVE'
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(reason)
        .bind(disabled_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn set_subscription(
        &self,
        user_id: Uuid,
        status: SubscriptionStatus,
        end_date: Option<NaiveDateTime>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE users
             SET subscription_status = $2,
                 subscription_end_date = COALESCE($3, subscription_end_date)
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(status.as_ref())
        .bind(end_date)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}

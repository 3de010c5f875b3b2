use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_enum},
    app_error::{AppError, AppResult},
    domain::entities::preferences::{Theme, UserPreferences},
    use_cases::settings::PreferencesRepo,
};

#[derive(sqlx::FromRow, Debug)]
struct PreferencesDb {
    user_id: Uuid,
    font_size: i16,
    theme: String,
}

impl PreferencesDb {
    fn into_preferences(self) -> AppResult<UserPreferences> {
        Ok(UserPreferences {
            user_id: self.user_id,
            font_size: self.font_size,
            theme: parse_enum(&self.theme, "theme")?,
        })
    }
}

#[async_trait]
impl PreferencesRepo for PostgresPersistence {
    async fn find(&self, user_id: Uuid) -> AppResult<Option<UserPreferences>> {
        let row = sqlx::query_as::<_, PreferencesDb>(
            "SELECT user_id, font_size, theme FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(PreferencesDb::into_preferences).transpose()
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        font_size: i16,
        theme: Theme,
    ) -> AppResult<UserPreferences> {
        let row = sqlx::query_as::<_, PreferencesDb>(
            "INSERT INTO user_preferences (user_id, font_size, theme)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id) DO UPDATE SET font_size = $2, theme = $3
             RETURNING user_id, font_size, theme",
        )
        .bind(user_id)
        .bind(font_size)
        .bind(theme.as_ref())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.into_preferences()
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM user_preferences WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}

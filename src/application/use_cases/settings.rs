use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        email_templates, password,
        use_cases::{
            auth::{EmailSender, RefreshTokenRepo, UserRepo},
            subscription::SubscriptionRepo,
        },
    },
    domain::entities::{
        preferences::{Theme, UserPreferences},
        subscription::PlanType,
        support_ticket::{
            IssueType, NewSupportTicket, SupportTicket, generate_ticket_number,
        },
        user::{PASSWORD_HISTORY_LEN, SubscriptionStatus},
    },
};

#[async_trait]
pub trait PreferencesRepo: Send + Sync {
    async fn find(&self, user_id: Uuid) -> AppResult<Option<UserPreferences>>;
    async fn upsert(&self, user_id: Uuid, font_size: i16, theme: Theme)
        -> AppResult<UserPreferences>;
    async fn delete(&self, user_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait SupportTicketRepo: Send + Sync {
    async fn insert(&self, ticket_number: &str, ticket: NewSupportTicket)
        -> AppResult<SupportTicket>;
    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<SupportTicket>>;
}

/// Account-page view of a user, with the subscription resolved live from
/// the subscription rows rather than the denormalized flag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub subscription: SubscriptionStatus,
    pub subscription_plan: Option<PlanType>,
    pub subscription_end_date: Option<NaiveDateTime>,
    pub account_creation: NaiveDateTime,
    pub is_verified: bool,
    pub is_profile_complete: bool,
}

#[derive(Clone)]
pub struct SettingsUseCases {
    users: Arc<dyn UserRepo>,
    sessions: Arc<dyn RefreshTokenRepo>,
    subscriptions: Arc<dyn SubscriptionRepo>,
    preferences: Arc<dyn PreferencesRepo>,
    tickets: Arc<dyn SupportTicketRepo>,
    email: Arc<dyn EmailSender>,
}

impl SettingsUseCases {
    pub fn new(
        users: Arc<dyn UserRepo>,
        sessions: Arc<dyn RefreshTokenRepo>,
        subscriptions: Arc<dyn SubscriptionRepo>,
        preferences: Arc<dyn PreferencesRepo>,
        tickets: Arc<dyn SupportTicketRepo>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            users,
            sessions,
            subscriptions,
            preferences,
            tickets,
            email,
        }
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> AppResult<ProfileSummary> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let active = self
            .subscriptions
            .active_for_user(user_id, chrono::Utc::now().naive_utc())
            .await?;

        Ok(ProfileSummary {
            first_name: user.first_name,
            last_name: user.last_name,
            middle_name: user.middle_name,
            email: user.email,
            phone_number: user.phone_number,
            subscription: if active.is_some() {
                SubscriptionStatus::Active
            } else {
                SubscriptionStatus::Inactive
            },
            subscription_plan: active.as_ref().map(|s| s.plan_type),
            subscription_end_date: active.as_ref().map(|s| s.end_date),
            account_creation: user.created_at,
            is_verified: user.is_verified,
            is_profile_complete: user.is_profile_complete,
        })
    }

    /// Read preferences, materializing the defaults on first access.
    #[instrument(skip(self))]
    pub async fn preferences(&self, user_id: Uuid) -> AppResult<UserPreferences> {
        if let Some(prefs) = self.preferences.find(user_id).await? {
            return Ok(prefs);
        }
        let defaults = UserPreferences::defaults(user_id);
        self.preferences
            .upsert(user_id, defaults.font_size, defaults.theme)
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_preferences(
        &self,
        user_id: Uuid,
        font_size: Option<i16>,
        theme: Option<Theme>,
    ) -> AppResult<UserPreferences> {
        let current = self.preferences(user_id).await?;
        self.preferences
            .upsert(
                user_id,
                font_size.unwrap_or(current.font_size),
                theme.unwrap_or(current.theme),
            )
            .await
    }

    /// Rotate the password. Any of the last retained hashes is refused;
    /// on success the outgoing hash joins the history and every session
    /// is revoked so other devices must sign in again.
    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        if !password::verify_password(old_password, &user.password_hash).await? {
            return Err(AppError::Unauthorized(
                "Incorrect current password".to_string(),
            ));
        }

        for past_hash in &user.password_history {
            if password::verify_password(new_password, past_hash).await? {
                return Err(AppError::BusinessRule(format!(
                    "New password cannot be one of your last {PASSWORD_HISTORY_LEN} passwords"
                )));
            }
        }

        let new_hash = password::hash_password(new_password).await?;

        let mut history = Vec::with_capacity(PASSWORD_HISTORY_LEN);
        history.push(user.password_hash.clone());
        history.extend(user.password_history.iter().cloned());
        history.truncate(PASSWORD_HISTORY_LEN);

        self.users
            .update_password_with_history(user_id, &new_hash, history)
            .await?;

        self.sessions.delete_for_user(user_id).await?;
        Ok(())
    }

    /// Open a support ticket and acknowledge by email. The acknowledgement
    /// is a nice-to-have; the ticket stands even if the send fails.
    #[instrument(skip(self, ticket))]
    pub async fn create_support_ticket(
        &self,
        ticket: NewSupportTicket,
    ) -> AppResult<SupportTicket> {
        let user = self
            .users
            .find_by_id(ticket.user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let issue_type = ticket.issue_type;
        let ticket_number = generate_ticket_number(chrono::Utc::now().timestamp_millis());
        let created = self.tickets.insert(&ticket_number, ticket).await?;

        let (subject, html) =
            email_templates::ticket_confirmation_email(&ticket_number, issue_type.as_ref());
        if let Err(err) = self.email.send(&user.email, &subject, &html).await {
            tracing::warn!(error = %err, ticket = %ticket_number, "ticket confirmation email failed");
        }

        Ok(created)
    }

    pub async fn list_support_tickets(&self, user_id: Uuid) -> AppResult<Vec<SupportTicket>> {
        self.tickets.list_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::support_ticket::TicketStatus;
    use crate::test_utils::factories::SettingsHarness;

    #[tokio::test]
    async fn preferences_materialize_defaults_on_first_read() {
        let h = SettingsHarness::new();
        let user_id = h.seed_user().await;

        let prefs = h.settings.preferences(user_id).await.unwrap();
        assert_eq!(prefs.font_size, 2);
        assert_eq!(prefs.theme, Theme::Auto);

        let updated = h
            .settings
            .update_preferences(user_id, Some(4), None)
            .await
            .unwrap();
        assert_eq!(updated.font_size, 4);
        assert_eq!(updated.theme, Theme::Auto);

        let updated = h
            .settings
            .update_preferences(user_id, None, Some(Theme::Dark))
            .await
            .unwrap();
        assert_eq!(updated.font_size, 4);
        assert_eq!(updated.theme, Theme::Dark);
    }

    #[tokio::test]
    async fn change_password_requires_the_current_password() {
        let h = SettingsHarness::new();
        let user_id = h.seed_user_with_password("Or1ginal!").await;

        let err = h
            .settings
            .change_password(user_id, "WrongOld1", "Fresh9Pass")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn password_history_rejects_recent_and_allows_ancient() {
        let h = SettingsHarness::new();
        let user_id = h.seed_user_with_password("Passw0rd1").await;

        h.settings
            .change_password(user_id, "Passw0rd1", "Passw0rd2")
            .await
            .unwrap();
        h.settings
            .change_password(user_id, "Passw0rd2", "Passw0rd3")
            .await
            .unwrap();
        h.settings
            .change_password(user_id, "Passw0rd3", "Passw0rd4")
            .await
            .unwrap();

        // History now holds 1..=3; each of them is refused.
        let err = h
            .settings
            .change_password(user_id, "Passw0rd4", "Passw0rd2")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));

        // One more rotation pushes Passw0rd1 out of the window.
        h.settings
            .change_password(user_id, "Passw0rd4", "Passw0rd5")
            .await
            .unwrap();
        h.settings
            .change_password(user_id, "Passw0rd5", "Passw0rd1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn change_password_revokes_sessions() {
        let h = SettingsHarness::new();
        let user_id = h.seed_user_with_password("Passw0rd1").await;
        h.open_fake_session(user_id).await;
        assert_eq!(h.sessions.count_for_user(user_id), 1);

        h.settings
            .change_password(user_id, "Passw0rd1", "Fresh9Pass")
            .await
            .unwrap();
        assert_eq!(h.sessions.count_for_user(user_id), 0);
    }

    #[tokio::test]
    async fn support_ticket_gets_number_and_confirmation_email() {
        let h = SettingsHarness::new();
        let user_id = h.seed_user().await;

        let ticket = h
            .settings
            .create_support_ticket(NewSupportTicket {
                user_id,
                issue_type: IssueType::Billing,
                description: "I was charged twice for the Standard plan.".to_string(),
                attachment_url: None,
            })
            .await
            .unwrap();

        assert!(ticket.ticket_number.starts_with("PRJ-"));
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(h.email.sent_count(), 1);

        let listed = h.settings.list_support_tickets(user_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].ticket_number, ticket.ticket_number);
    }

    #[tokio::test]
    async fn profile_reflects_live_subscription_state() {
        let h = SettingsHarness::new();
        let user_id = h.seed_user().await;

        let profile = h.settings.profile(user_id).await.unwrap();
        assert_eq!(profile.subscription, SubscriptionStatus::Inactive);
        assert!(profile.subscription_plan.is_none());
    }
}

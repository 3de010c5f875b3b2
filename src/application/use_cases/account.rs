use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        email_templates,
        use_cases::{
            auth::{DeletedEmailRepo, EmailSender, RefreshTokenRepo, UserRepo},
            otp::{OtpEngine, OtpRepo},
            settings::PreferencesRepo,
        },
    },
    domain::entities::otp::OtpPurpose,
};

/// OTP-gated disable/delete flows. Both are two-phase: `initiate` emails a
/// code, `complete` verifies it and applies the side effects.
#[derive(Clone)]
pub struct AccountUseCases {
    users: Arc<dyn UserRepo>,
    sessions: Arc<dyn RefreshTokenRepo>,
    preferences: Arc<dyn PreferencesRepo>,
    tombstones: Arc<dyn DeletedEmailRepo>,
    otp: OtpEngine,
    otp_repo: Arc<dyn OtpRepo>,
    email: Arc<dyn EmailSender>,
}

impl AccountUseCases {
    pub fn new(
        users: Arc<dyn UserRepo>,
        sessions: Arc<dyn RefreshTokenRepo>,
        preferences: Arc<dyn PreferencesRepo>,
        tombstones: Arc<dyn DeletedEmailRepo>,
        otp: OtpEngine,
        otp_repo: Arc<dyn OtpRepo>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            users,
            sessions,
            preferences,
            tombstones,
            otp,
            otp_repo,
            email,
        }
    }

    /// Email a confirmation code for disabling the account. The reason is
    /// not persisted at this phase; the client re-supplies it on complete.
    #[instrument(skip(self))]
    pub async fn initiate_disable(&self, user_id: Uuid) -> AppResult<()> {
        self.send_action_code(user_id, OtpPurpose::AccountDisable).await
    }

    /// Verify the code, then disable: flag + timestamp + reason, subscription
    /// status forced inactive, every session revoked. No data is deleted.
    #[instrument(skip(self, code))]
    pub async fn complete_disable(&self, user_id: Uuid, code: &str, reason: &str) -> AppResult<()> {
        self.otp
            .verify(user_id, code, OtpPurpose::AccountDisable)
            .await?;

        self.users
            .disable(user_id, reason, chrono::Utc::now().naive_utc())
            .await?;
        self.sessions.delete_for_user(user_id).await?;
        Ok(())
    }

    /// Email a confirmation code for deleting the account.
    #[instrument(skip(self))]
    pub async fn initiate_delete(&self, user_id: Uuid) -> AppResult<()> {
        self.send_action_code(user_id, OtpPurpose::AccountDelete).await
    }

    /// Verify the code, then destroy the account. The tombstone carrying
    /// the trial flag MUST land before anything is deleted: losing it would
    /// let the same email re-claim a free trial.
    #[instrument(skip(self, code))]
    pub async fn complete_delete(&self, user_id: Uuid, code: &str, reason: &str) -> AppResult<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        self.otp
            .verify(user_id, code, OtpPurpose::AccountDelete)
            .await?;

        self.tombstones
            .insert(&user.email, user.has_used_free_trial, reason)
            .await?;

        self.preferences.delete(user_id).await?;
        self.sessions.delete_for_user(user_id).await?;
        self.otp_repo.delete_for_user(user_id).await?;
        self.users.delete(user_id).await?;
        Ok(())
    }

    async fn send_action_code(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let code = self.otp.issue(user_id, purpose).await?;
        let (subject, html) = email_templates::account_action_email(&code, purpose);
        self.email.send(&user.email, &subject, &html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_error::OtpFailure;
    use crate::domain::entities::user::SubscriptionStatus;
    use crate::test_utils::factories::AuthHarness;

    const PASSWORD: &str = "Secur3Pass";

    #[tokio::test]
    async fn disable_flow_revokes_sessions_and_voids_entitlement() {
        let h = AuthHarness::new();
        let tokens = h.register_active_user("quit@example.com", PASSWORD).await;
        let user_id = h.user_id("quit@example.com");
        let account = h.account_use_cases();

        account.initiate_disable(user_id).await.unwrap();
        let code = h.last_code("quit@example.com", OtpPurpose::AccountDisable);
        account
            .complete_disable(user_id, &code, "taking a break")
            .await
            .unwrap();

        let user = h.user("quit@example.com");
        assert!(user.is_disabled);
        assert!(user.disabled_at.is_some());
        assert_eq!(user.disable_reason.as_deref(), Some("taking a break"));
        assert_eq!(user.subscription_status, SubscriptionStatus::Inactive);
        assert_eq!(h.sessions.count_for_user(user_id), 0);

        // The revoked session is dead.
        let err = h
            .auth
            .refresh_access_token(&tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn disable_with_wrong_code_changes_nothing() {
        let h = AuthHarness::new();
        h.register_active_user("stay@example.com", PASSWORD).await;
        let user_id = h.user_id("stay@example.com");
        let account = h.account_use_cases();

        account.initiate_disable(user_id).await.unwrap();
        let code = h.last_code("stay@example.com", OtpPurpose::AccountDisable);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = account
            .complete_disable(user_id, wrong, "oops")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Otp(OtpFailure::Mismatch { .. })));
        assert!(!h.user("stay@example.com").is_disabled);
    }

    #[tokio::test]
    async fn delete_writes_tombstone_and_destroys_account() {
        let h = AuthHarness::new();
        h.register_active_user("leave@example.com", PASSWORD).await;
        let user_id = h.user_id("leave@example.com");
        let account = h.account_use_cases();

        account.initiate_delete(user_id).await.unwrap();
        let code = h.last_code("leave@example.com", OtpPurpose::AccountDelete);
        account
            .complete_delete(user_id, &code, "moving on")
            .await
            .unwrap();

        let tombstone = h
            .tombstones
            .find_by_email("leave@example.com")
            .await
            .unwrap()
            .expect("tombstone written");
        assert!(tombstone.has_used_free_trial);
        assert_eq!(tombstone.delete_reason.as_deref(), Some("moving on"));

        assert!(h.users.find_by_id(user_id).await.unwrap().is_none());
        assert_eq!(h.sessions.count_for_user(user_id), 0);
    }

    #[tokio::test]
    async fn deleted_email_cannot_reclaim_trial_on_reregistration() {
        let h = AuthHarness::new();
        h.register_active_user("again@example.com", PASSWORD).await;
        let user_id = h.user_id("again@example.com");
        let account = h.account_use_cases();

        account.initiate_delete(user_id).await.unwrap();
        let code = h.last_code("again@example.com", OtpPurpose::AccountDelete);
        account.complete_delete(user_id, &code, "bye").await.unwrap();

        h.auth.register("again@example.com", PASSWORD).await.unwrap();
        let reborn = h.user("again@example.com");
        assert_eq!(reborn.subscription_status, SubscriptionStatus::Inactive);
    }

    #[tokio::test]
    async fn delete_requires_a_live_code() {
        let h = AuthHarness::new();
        h.register_active_user("rash@example.com", PASSWORD).await;
        let user_id = h.user_id("rash@example.com");
        let account = h.account_use_cases();

        let err = account
            .complete_delete(user_id, "123456", "no otp requested")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Otp(OtpFailure::NotFound)));
        assert!(h.users.find_by_id(user_id).await.unwrap().is_some());
    }
}

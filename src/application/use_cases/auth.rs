use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        email_templates, jwt,
        jwt::{TempPurpose, TokenKind},
        password,
        use_cases::otp::OtpEngine,
    },
    domain::entities::{
        deleted_email::DeletedEmail,
        otp::OtpPurpose,
        refresh_token::RefreshTokenRecord,
        user::{NewUser, ProfileFields, SubscriptionStatus, User, UserProfile},
    },
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<User>>;
    async fn insert(&self, user: NewUser) -> AppResult<User>;
    async fn delete(&self, user_id: Uuid) -> AppResult<()>;
    async fn mark_verified(&self, user_id: Uuid) -> AppResult<()>;
    /// Set the profile fields and flip `is_profile_complete`.
    async fn set_profile(&self, user_id: Uuid, profile: ProfileFields) -> AppResult<User>;
    /// Replace the password hash, leaving the history untouched.
    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> AppResult<()>;
    /// Replace the password hash together with the rotated history.
    async fn update_password_with_history(
        &self,
        user_id: Uuid,
        password_hash: &str,
        history: Vec<String>,
    ) -> AppResult<()>;
    /// Flip the disabled flag and force the denormalized status inactive.
    async fn disable(
        &self,
        user_id: Uuid,
        reason: &str,
        disabled_at: NaiveDateTime,
    ) -> AppResult<()>;
    async fn set_subscription(
        &self,
        user_id: Uuid,
        status: SubscriptionStatus,
        end_date: Option<NaiveDateTime>,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: NaiveDateTime,
    ) -> AppResult<()>;
    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<RefreshTokenRecord>>;
    /// Returns the number of rows removed, so rotation can detect a
    /// concurrent consumer (0 means someone else already spent the token).
    async fn delete_by_hash(&self, token_hash: &str) -> AppResult<u64>;
    async fn delete_for_user(&self, user_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait DeletedEmailRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<DeletedEmail>>;
    async fn insert(
        &self,
        email: &str,
        has_used_free_trial: bool,
        delete_reason: &str,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}

/// Signing material and lifetimes for the three token kinds.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Outcome of a credential check. An incomplete profile is not a failure:
/// the caller gets a purpose-scoped token to finish onboarding instead of
/// a session pair.
#[derive(Debug)]
pub enum LoginOutcome {
    LoggedIn {
        tokens: AuthTokens,
        user: UserProfile,
    },
    ProfileIncomplete {
        temp_token: String,
    },
}

#[derive(Clone)]
pub struct AuthUseCases {
    users: Arc<dyn UserRepo>,
    sessions: Arc<dyn RefreshTokenRepo>,
    tombstones: Arc<dyn DeletedEmailRepo>,
    otp: OtpEngine,
    email: Arc<dyn EmailSender>,
    tokens: TokenConfig,
}

impl AuthUseCases {
    pub fn new(
        users: Arc<dyn UserRepo>,
        sessions: Arc<dyn RefreshTokenRepo>,
        tombstones: Arc<dyn DeletedEmailRepo>,
        otp: OtpEngine,
        email: Arc<dyn EmailSender>,
        tokens: TokenConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            tombstones,
            otp,
            email,
            tokens,
        }
    }

    /// Register a new account and dispatch the verification code.
    ///
    /// A verified account with the same email is a conflict; an unverified
    /// one is replaced so a typo'd password or lost inbox cannot lock the
    /// address out. Trial eligibility consults the tombstone left by any
    /// previous deletion of this address.
    #[instrument(skip(self, password_plain))]
    pub async fn register(&self, email: &str, password_plain: &str) -> AppResult<String> {
        let email = email.to_lowercase();

        if let Some(existing) = self.users.find_by_email(&email).await? {
            if existing.is_verified {
                return Err(AppError::Conflict(
                    "An account with this email already exists".to_string(),
                ));
            }
            self.users.delete(existing.id).await?;
        }

        let password_hash = password::hash_password(password_plain).await?;

        let previously_used_trial = self
            .tombstones
            .find_by_email(&email)
            .await?
            .map(|t| t.has_used_free_trial)
            .unwrap_or(false);
        let subscription_status = if previously_used_trial {
            SubscriptionStatus::Inactive
        } else {
            SubscriptionStatus::Active
        };

        let user = self
            .users
            .insert(NewUser {
                email: email.clone(),
                password_hash,
                subscription_status,
                // The trial slot is claimed at registration, not first use.
                has_used_free_trial: true,
            })
            .await?;

        let code = self.otp.issue(user.id, OtpPurpose::EmailVerification).await?;
        let (subject, html) = email_templates::otp_email(&code, OtpPurpose::EmailVerification);
        self.email.send(&email, &subject, &html).await?;

        Ok(user.email)
    }

    /// Confirm the emailed code and hand back a profile-completion token.
    #[instrument(skip(self, code))]
    pub async fn verify_otp(&self, email: &str, code: &str) -> AppResult<String> {
        let user = self
            .users
            .find_by_email(&email.to_lowercase())
            .await?
            .ok_or(AppError::NotFound("User"))?;

        if user.is_verified {
            return Err(AppError::Conflict("Email already verified".to_string()));
        }

        self.otp
            .verify(user.id, code, OtpPurpose::EmailVerification)
            .await?;
        self.users.mark_verified(user.id).await?;

        jwt::issue_temp(
            user.id,
            &user.email,
            TempPurpose::ProfileCompletion,
            &self.tokens.access_secret,
        )
    }

    /// Issue a fresh code, subject to the per-purpose cooldown. Only the
    /// self-service purposes can be requested here; account-action codes
    /// go through their own initiate endpoints.
    #[instrument(skip(self))]
    pub async fn resend_otp(&self, email: &str, purpose: OtpPurpose) -> AppResult<()> {
        if !matches!(
            purpose,
            OtpPurpose::EmailVerification | OtpPurpose::PasswordReset
        ) {
            return Err(AppError::Validation(
                "OTP type cannot be requested here".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_email(&email.to_lowercase())
            .await?
            .ok_or(AppError::NotFound("User"))?;

        self.otp.can_issue_again(user.id, purpose).await?;

        let code = self.otp.issue(user.id, purpose).await?;
        let (subject, html) = email_templates::otp_email(&code, purpose);
        self.email.send(&user.email, &subject, &html).await
    }

    /// Finish onboarding: store the profile fields, open a session and
    /// send the welcome email. The welcome email is best-effort; a
    /// delivery failure never rolls back the completed profile.
    #[instrument(skip(self, profile))]
    pub async fn complete_profile(
        &self,
        user_id: Uuid,
        profile: ProfileFields,
    ) -> AppResult<(AuthTokens, UserProfile)> {
        let first_name = profile.first_name.clone();
        let user = self.users.set_profile(user_id, profile).await?;

        let tokens = self.open_session(&user).await?;

        let (subject, html) = email_templates::welcome_email(&first_name);
        if let Err(err) = self.email.send(&user.email, &subject, &html).await {
            tracing::warn!(error = %err, "welcome email failed");
        }

        Ok((tokens, UserProfile::from(&user)))
    }

    /// Check credentials and open a session. The same generic error covers
    /// an unknown address and a wrong password.
    #[instrument(skip(self, password_plain))]
    pub async fn login(&self, email: &str, password_plain: &str) -> AppResult<LoginOutcome> {
        let user = self
            .users
            .find_by_email(&email.to_lowercase())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !password::verify_password(password_plain, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        if user.is_disabled {
            return Err(AppError::Forbidden(
                "Account is disabled. Please reach out to customer service for reactivation."
                    .to_string(),
            ));
        }

        if !user.is_verified {
            return Err(AppError::Forbidden(
                "Please verify your email first".to_string(),
            ));
        }

        if !user.is_profile_complete {
            let temp_token = jwt::issue_temp(
                user.id,
                &user.email,
                TempPurpose::ProfileCompletion,
                &self.tokens.access_secret,
            )?;
            return Ok(LoginOutcome::ProfileIncomplete { temp_token });
        }

        let tokens = self.open_session(&user).await?;
        Ok(LoginOutcome::LoggedIn {
            tokens,
            user: UserProfile::from(&user),
        })
    }

    /// Rotate a refresh token: strict one-time use. The delete is what
    /// makes a replayed token fail, so a zero-row delete aborts rotation.
    #[instrument(skip(self, raw_token))]
    pub async fn refresh_access_token(&self, raw_token: &str) -> AppResult<AuthTokens> {
        jwt::verify(raw_token, TokenKind::Refresh, &self.tokens.refresh_secret)?;

        let token_hash = hash_token(raw_token);
        let record = self
            .sessions
            .find_by_hash(&token_hash)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Refresh token not found".to_string()))?;

        if chrono::Utc::now().naive_utc() > record.expires_at {
            self.sessions.delete_by_hash(&token_hash).await?;
            return Err(AppError::Unauthorized("Refresh token expired".to_string()));
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        if self.sessions.delete_by_hash(&token_hash).await? == 0 {
            return Err(AppError::Unauthorized("Refresh token not found".to_string()));
        }

        self.open_session(&user).await
    }

    /// Drop the session matching this token. Deleting zero rows is fine;
    /// logout is idempotent.
    #[instrument(skip(self, raw_token))]
    pub async fn logout(&self, raw_token: &str) -> AppResult<()> {
        self.sessions.delete_by_hash(&hash_token(raw_token)).await?;
        Ok(())
    }

    /// Start a password reset. The caller learns nothing about whether the
    /// address exists; only the OTP cooldown is allowed to surface.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        let Some(user) = self.users.find_by_email(&email.to_lowercase()).await? else {
            return Ok(());
        };

        self.otp
            .can_issue_again(user.id, OtpPurpose::PasswordReset)
            .await?;

        let code = self.otp.issue(user.id, OtpPurpose::PasswordReset).await?;
        let (subject, html) = email_templates::otp_email(&code, OtpPurpose::PasswordReset);
        self.email.send(&user.email, &subject, &html).await
    }

    /// Set a new password after a reset code checks out, revoking every
    /// open session for the account.
    #[instrument(skip(self, code, new_password))]
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self
            .users
            .find_by_email(&email.to_lowercase())
            .await?
            .ok_or(AppError::NotFound("User"))?;

        self.otp
            .verify(user.id, code, OtpPurpose::PasswordReset)
            .await?;

        let password_hash = password::hash_password(new_password).await?;
        self.users
            .update_password_hash(user.id, &password_hash)
            .await?;

        self.sessions.delete_for_user(user.id).await?;
        Ok(())
    }

    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;
        Ok(UserProfile::from(&user))
    }

    /// Issue an access/refresh pair and persist the refresh digest.
    async fn open_session(&self, user: &User) -> AppResult<AuthTokens> {
        let access_token = jwt::issue(
            user.id,
            &user.email,
            TokenKind::Access,
            &self.tokens.access_secret,
            self.tokens.access_ttl,
        )?;
        let refresh_token = jwt::issue(
            user.id,
            &user.email,
            TokenKind::Refresh,
            &self.tokens.refresh_secret,
            self.tokens.refresh_ttl,
        )?;

        let expires_at = (chrono::Utc::now()
            + chrono::Duration::seconds(self.tokens.refresh_ttl.whole_seconds()))
        .naive_utc();
        self.sessions
            .insert(user.id, &hash_token(&refresh_token), expires_at)
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
        })
    }
}

/// Digest used to key refresh-token rows; the raw token never touches
/// storage.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_error::OtpFailure;
    use crate::test_utils::factories::AuthHarness;

    const PASSWORD: &str = "Secur3Pass";

    #[tokio::test]
    async fn register_then_verify_then_complete_profile() {
        let h = AuthHarness::new();

        let email = h.auth.register("Student@Example.com", PASSWORD).await.unwrap();
        assert_eq!(email, "student@example.com");
        assert_eq!(h.email.sent_count(), 1);

        let code = h.last_code("student@example.com", OtpPurpose::EmailVerification);
        let temp_token = h.auth.verify_otp("student@example.com", &code).await.unwrap();

        let claims = jwt::verify_temp(
            &temp_token,
            TempPurpose::ProfileCompletion,
            &h.tokens.access_secret,
        )
        .unwrap();

        let (tokens, profile) = h
            .auth
            .complete_profile(
                claims.sub,
                ProfileFields {
                    first_name: "Ada".to_string(),
                    last_name: "Obi".to_string(),
                    middle_name: None,
                    phone_number: "+2348000000000".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(!tokens.access_token.is_empty());
        assert!(profile.is_profile_complete);
        assert_eq!(h.sessions.count_for_user(claims.sub), 1);
        // Verification code + welcome email.
        assert_eq!(h.email.sent_count(), 2);
    }

    #[tokio::test]
    async fn register_conflicts_on_verified_email() {
        let h = AuthHarness::new();
        h.register_active_user("taken@example.com", PASSWORD).await;

        let err = h.auth.register("taken@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_replaces_unverified_account() {
        let h = AuthHarness::new();

        h.auth.register("retry@example.com", PASSWORD).await.unwrap();
        let first_id = h.user_id("retry@example.com");
        let first_code = h.last_code("retry@example.com", OtpPurpose::EmailVerification);

        h.auth.register("retry@example.com", "0therPass9").await.unwrap();
        let second_id = h.user_id("retry@example.com");
        assert_ne!(first_id, second_id);

        // The old code belongs to a deleted user and cannot verify anyone.
        let err = h
            .auth
            .verify_otp("retry@example.com", &first_code)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Otp(OtpFailure::NotFound) | AppError::Otp(OtpFailure::Mismatch { .. })
        ));

        let fresh_code = h.last_code("retry@example.com", OtpPurpose::EmailVerification);
        h.auth.verify_otp("retry@example.com", &fresh_code).await.unwrap();
    }

    #[tokio::test]
    async fn tombstone_blocks_trial_regrant() {
        let h = AuthHarness::new();
        h.tombstones
            .insert("back@example.com", true, "left")
            .await
            .unwrap();

        h.auth.register("back@example.com", PASSWORD).await.unwrap();
        let user = h.user("back@example.com");
        assert_eq!(user.subscription_status, SubscriptionStatus::Inactive);
        assert!(user.has_used_free_trial);
    }

    #[tokio::test]
    async fn fresh_email_gets_trial_eligibility() {
        let h = AuthHarness::new();
        h.auth.register("new@example.com", PASSWORD).await.unwrap();
        let user = h.user("new@example.com");
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn login_rejects_unknown_and_wrong_password_identically() {
        let h = AuthHarness::new();
        h.register_active_user("known@example.com", PASSWORD).await;

        let unknown = h.auth.login("ghost@example.com", PASSWORD).await.unwrap_err();
        let wrong = h.auth.login("known@example.com", "WrongPass1").await.unwrap_err();

        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn login_blocks_disabled_and_unverified_accounts() {
        let h = AuthHarness::new();

        h.auth.register("pending@example.com", PASSWORD).await.unwrap();
        let err = h.auth.login("pending@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        h.register_active_user("gone@example.com", PASSWORD).await;
        h.users
            .disable(
                h.user_id("gone@example.com"),
                "abuse",
                chrono::Utc::now().naive_utc(),
            )
            .await
            .unwrap();
        let err = h.auth.login("gone@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn login_with_incomplete_profile_yields_temp_token_only() {
        let h = AuthHarness::new();

        h.auth.register("half@example.com", PASSWORD).await.unwrap();
        let code = h.last_code("half@example.com", OtpPurpose::EmailVerification);
        h.auth.verify_otp("half@example.com", &code).await.unwrap();

        match h.auth.login("half@example.com", PASSWORD).await.unwrap() {
            LoginOutcome::ProfileIncomplete { temp_token } => {
                jwt::verify_temp(
                    &temp_token,
                    TempPurpose::ProfileCompletion,
                    &h.tokens.access_secret,
                )
                .unwrap();
            }
            LoginOutcome::LoggedIn { .. } => panic!("expected profile-completion outcome"),
        }
        // No session was opened.
        assert_eq!(h.sessions.count_for_user(h.user_id("half@example.com")), 0);
    }

    #[tokio::test]
    async fn refresh_rotation_is_single_use() {
        let h = AuthHarness::new();
        let tokens = h.register_active_user("rotate@example.com", PASSWORD).await;

        let rotated = h
            .auth
            .refresh_access_token(&tokens.refresh_token)
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, tokens.refresh_token);

        // The consumed token's record is gone: replay fails.
        let err = h
            .auth
            .refresh_access_token(&tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        // The rotated token still works.
        h.auth.refresh_access_token(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let h = AuthHarness::new();
        let tokens = h.register_active_user("bye@example.com", PASSWORD).await;

        h.auth.logout(&tokens.refresh_token).await.unwrap();
        h.auth.logout(&tokens.refresh_token).await.unwrap();

        let err = h
            .auth
            .refresh_access_token(&tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn forgot_password_is_silent_for_unknown_emails() {
        let h = AuthHarness::new();
        h.auth.forgot_password("nobody@example.com").await.unwrap();
        assert_eq!(h.email.sent_count(), 0);
    }

    #[tokio::test]
    async fn forgot_password_cooldown_surfaces_as_explicit_error() {
        let h = AuthHarness::new();
        h.register_active_user("busy@example.com", PASSWORD).await;

        h.auth.forgot_password("busy@example.com").await.unwrap();
        let err = h.auth.forgot_password("busy@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::OtpCooldown { .. }));
    }

    #[tokio::test]
    async fn reset_password_revokes_every_session() {
        let h = AuthHarness::new();
        let tokens = h.register_active_user("reset@example.com", PASSWORD).await;

        h.auth.forgot_password("reset@example.com").await.unwrap();
        let code = h.last_code("reset@example.com", OtpPurpose::PasswordReset);
        h.auth
            .reset_password("reset@example.com", &code, "N3wPassword")
            .await
            .unwrap();

        let err = h
            .auth
            .refresh_access_token(&tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        match h.auth.login("reset@example.com", "N3wPassword").await.unwrap() {
            LoginOutcome::LoggedIn { .. } => {}
            other => panic!("expected login to succeed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resend_otp_refuses_account_action_purposes() {
        let h = AuthHarness::new();
        h.register_active_user("safe@example.com", PASSWORD).await;

        let err = h
            .auth
            .resend_otp("safe@example.com", OtpPurpose::AccountDelete)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult, OtpFailure},
    domain::entities::otp::{Otp, OtpPurpose},
};

#[async_trait]
pub trait OtpRepo: Send + Sync {
    /// Mark every unused code for (user, purpose) as used. Returns the
    /// number of rows retired.
    async fn retire_unused(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<u64>;
    async fn insert(
        &self,
        user_id: Uuid,
        code: &str,
        purpose: OtpPurpose,
        expires_at: NaiveDateTime,
    ) -> AppResult<Otp>;
    /// Most-recently-created unused code for (user, purpose).
    async fn latest_unused(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<Otp>>;
    /// Most recent code for (user, purpose) regardless of used/expired state.
    async fn latest_any(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<Option<Otp>>;
    async fn mark_used(&self, id: Uuid) -> AppResult<()>;
    /// Bump the attempt counter, returning the new value.
    async fn increment_attempts(&self, id: Uuid) -> AppResult<i32>;
    async fn delete_for_user(&self, user_id: Uuid) -> AppResult<()>;
}

/// Issues, verifies and throttles one-time codes scoped to (user, purpose).
#[derive(Clone)]
pub struct OtpEngine {
    repo: Arc<dyn OtpRepo>,
    ttl_minutes: i64,
    max_attempts: i32,
    resend_cooldown_secs: i64,
}

impl OtpEngine {
    pub fn new(
        repo: Arc<dyn OtpRepo>,
        ttl_minutes: i64,
        max_attempts: i32,
        resend_cooldown_secs: i64,
    ) -> Self {
        Self {
            repo,
            ttl_minutes,
            max_attempts,
            resend_cooldown_secs,
        }
    }

    /// Retire any previous code for this purpose, then mint a fresh one.
    /// Returns the plaintext code for delivery.
    #[instrument(skip(self))]
    pub async fn issue(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<String> {
        self.repo.retire_unused(user_id, purpose).await?;

        let code = generate_code();
        let expires_at = (Utc::now() + Duration::minutes(self.ttl_minutes)).naive_utc();
        self.repo.insert(user_id, &code, purpose, expires_at).await?;

        Ok(code)
    }

    /// Check a submitted code against the single authoritative unused row.
    /// Every terminal failure except a mismatch retires the row.
    #[instrument(skip(self, code))]
    pub async fn verify(&self, user_id: Uuid, code: &str, purpose: OtpPurpose) -> AppResult<()> {
        let Some(otp) = self.repo.latest_unused(user_id, purpose).await? else {
            return Err(OtpFailure::NotFound.into());
        };

        if Utc::now().naive_utc() > otp.expires_at {
            self.repo.mark_used(otp.id).await?;
            return Err(OtpFailure::Expired.into());
        }

        if otp.attempts >= self.max_attempts {
            self.repo.mark_used(otp.id).await?;
            return Err(OtpFailure::AttemptsExceeded.into());
        }

        if otp.code != code {
            let attempts = self.repo.increment_attempts(otp.id).await?;
            return Err(OtpFailure::Mismatch {
                attempts_remaining: self.max_attempts - attempts,
            }
            .into());
        }

        self.repo.mark_used(otp.id).await?;
        Ok(())
    }

    /// Enforce the minimum spacing between issuances of the same purpose,
    /// measured from the most recent code's creation regardless of its
    /// used/expired state. Independent of the boundary rate limiter.
    pub async fn can_issue_again(&self, user_id: Uuid, purpose: OtpPurpose) -> AppResult<()> {
        let Some(last) = self.repo.latest_any(user_id, purpose).await? else {
            return Ok(());
        };

        let elapsed = Utc::now().naive_utc() - last.created_at;
        let remaining = self.resend_cooldown_secs - elapsed.num_seconds();
        if remaining > 0 {
            return Err(AppError::OtpCooldown {
                wait_seconds: remaining,
            });
        }
        Ok(())
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mocks::InMemoryOtpRepo;

    fn engine(repo: Arc<InMemoryOtpRepo>) -> OtpEngine {
        OtpEngine::new(repo, 10, 5, 60)
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn issue_retires_previous_codes_of_same_purpose() {
        let repo = Arc::new(InMemoryOtpRepo::new());
        let engine = engine(repo.clone());
        let user = Uuid::new_v4();

        engine.issue(user, OtpPurpose::EmailVerification).await.unwrap();
        engine.issue(user, OtpPurpose::EmailVerification).await.unwrap();
        engine.issue(user, OtpPurpose::PasswordReset).await.unwrap();

        assert_eq!(repo.unused_count(user, OtpPurpose::EmailVerification), 1);
        assert_eq!(repo.unused_count(user, OtpPurpose::PasswordReset), 1);
    }

    #[tokio::test]
    async fn verify_succeeds_exactly_once() {
        let repo = Arc::new(InMemoryOtpRepo::new());
        let engine = engine(repo);
        let user = Uuid::new_v4();

        let code = engine.issue(user, OtpPurpose::EmailVerification).await.unwrap();
        engine
            .verify(user, &code, OtpPurpose::EmailVerification)
            .await
            .unwrap();

        // Consumed: a second check with the same code finds nothing.
        let err = engine
            .verify(user, &code, OtpPurpose::EmailVerification)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Otp(OtpFailure::NotFound)));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_purpose() {
        let repo = Arc::new(InMemoryOtpRepo::new());
        let engine = engine(repo);
        let user = Uuid::new_v4();

        let code = engine.issue(user, OtpPurpose::EmailVerification).await.unwrap();
        let err = engine
            .verify(user, &code, OtpPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Otp(OtpFailure::NotFound)));
    }

    #[tokio::test]
    async fn expired_code_is_retired_on_check() {
        let repo = Arc::new(InMemoryOtpRepo::new());
        let engine = engine(repo.clone());
        let user = Uuid::new_v4();

        let code = engine.issue(user, OtpPurpose::PasswordReset).await.unwrap();
        repo.expire_all(user);

        let err = engine
            .verify(user, &code, OtpPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Otp(OtpFailure::Expired)));
        assert_eq!(repo.unused_count(user, OtpPurpose::PasswordReset), 0);
    }

    #[tokio::test]
    async fn mismatches_count_down_then_lock_out() {
        let repo = Arc::new(InMemoryOtpRepo::new());
        let engine = engine(repo);
        let user = Uuid::new_v4();

        let code = engine.issue(user, OtpPurpose::EmailVerification).await.unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for expected_remaining in (0..5).rev() {
            let err = engine
                .verify(user, wrong, OtpPurpose::EmailVerification)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                AppError::Otp(OtpFailure::Mismatch { attempts_remaining })
                    if attempts_remaining == expected_remaining
            ));
        }

        // Cap reached: even the correct code is refused and the row retired.
        let err = engine
            .verify(user, &code, OtpPurpose::EmailVerification)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Otp(OtpFailure::AttemptsExceeded)));

        let err = engine
            .verify(user, &code, OtpPurpose::EmailVerification)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Otp(OtpFailure::NotFound)));
    }

    #[tokio::test]
    async fn cooldown_applies_even_after_code_was_used() {
        let repo = Arc::new(InMemoryOtpRepo::new());
        let engine = engine(repo);
        let user = Uuid::new_v4();

        let code = engine.issue(user, OtpPurpose::EmailVerification).await.unwrap();
        engine
            .verify(user, &code, OtpPurpose::EmailVerification)
            .await
            .unwrap();

        let err = engine
            .can_issue_again(user, OtpPurpose::EmailVerification)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::OtpCooldown { wait_seconds } if wait_seconds > 0));
    }

    #[tokio::test]
    async fn cooldown_clears_after_the_window() {
        let repo = Arc::new(InMemoryOtpRepo::new());
        let engine = engine(repo.clone());
        let user = Uuid::new_v4();

        engine.issue(user, OtpPurpose::PasswordReset).await.unwrap();
        repo.backdate_created(user, 61);

        engine
            .can_issue_again(user, OtpPurpose::PasswordReset)
            .await
            .unwrap();
    }
}

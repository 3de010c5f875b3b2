use std::sync::Arc;

use chrono::{Duration, Utc};
use secrecy::SecretString;
use uuid::Uuid;

use crate::{
    application::{
        jwt::{self, TempPurpose},
        password,
        use_cases::{
            account::AccountUseCases,
            auth::{AuthTokens, AuthUseCases, RefreshTokenRepo, TokenConfig},
            otp::OtpEngine,
            settings::SettingsUseCases,
            subscription::SubscriptionUseCases,
        },
    },
    domain::entities::{
        otp::OtpPurpose,
        subscription::ExamMode,
        exam_result::ExamResult,
        user::{ProfileFields, SubscriptionStatus, User},
    },
    test_utils::mocks::{
        InMemoryDeletedEmailRepo, InMemoryExamResultRepo, InMemoryOtpRepo, InMemoryPaymentRepo,
        InMemoryPreferencesRepo, InMemoryRefreshTokenRepo, InMemorySubscriptionRepo,
        InMemorySupportTicketRepo, InMemoryUserRepo, RecordingEmailSender,
    },
};

pub fn token_config() -> TokenConfig {
    TokenConfig {
        access_secret: SecretString::new("test-access-secret".into()),
        refresh_secret: SecretString::new("test-refresh-secret".into()),
        access_ttl: time::Duration::minutes(15),
        refresh_ttl: time::Duration::days(7),
    }
}

/// Full auth stack over in-memory repos.
pub struct AuthHarness {
    pub auth: AuthUseCases,
    pub users: Arc<InMemoryUserRepo>,
    pub sessions: Arc<InMemoryRefreshTokenRepo>,
    pub otps: Arc<InMemoryOtpRepo>,
    pub tombstones: Arc<InMemoryDeletedEmailRepo>,
    pub preferences: Arc<InMemoryPreferencesRepo>,
    pub email: Arc<RecordingEmailSender>,
    pub tokens: TokenConfig,
}

impl AuthHarness {
    pub fn new() -> Self {
        let users = Arc::new(InMemoryUserRepo::new());
        let sessions = Arc::new(InMemoryRefreshTokenRepo::new());
        let otps = Arc::new(InMemoryOtpRepo::new());
        let tombstones = Arc::new(InMemoryDeletedEmailRepo::new());
        let preferences = Arc::new(InMemoryPreferencesRepo::new());
        let email = Arc::new(RecordingEmailSender::new());
        let tokens = token_config();

        let engine = OtpEngine::new(otps.clone(), 10, 5, 60);
        let auth = AuthUseCases::new(
            users.clone(),
            sessions.clone(),
            tombstones.clone(),
            engine,
            email.clone(),
            tokens.clone(),
        );

        Self {
            auth,
            users,
            sessions,
            otps,
            tombstones,
            preferences,
            email,
            tokens,
        }
    }

    pub fn account_use_cases(&self) -> AccountUseCases {
        AccountUseCases::new(
            self.users.clone(),
            self.sessions.clone(),
            self.preferences.clone(),
            self.tombstones.clone(),
            OtpEngine::new(self.otps.clone(), 10, 5, 60),
            self.otps.clone(),
            self.email.clone(),
        )
    }

    /// Walk a fresh email through register -> verify -> complete-profile,
    /// returning the opened session pair.
    pub async fn register_active_user(&self, email: &str, password: &str) -> AuthTokens {
        self.auth.register(email, password).await.unwrap();
        let normalized = email.to_lowercase();
        let code = self.last_code(&normalized, OtpPurpose::EmailVerification);
        let temp_token = self.auth.verify_otp(&normalized, &code).await.unwrap();
        let claims = jwt::verify_temp(
            &temp_token,
            TempPurpose::ProfileCompletion,
            &self.tokens.access_secret,
        )
        .unwrap();
        let (tokens, _) = self
            .auth
            .complete_profile(
                claims.sub,
                ProfileFields {
                    first_name: "Test".to_string(),
                    last_name: "Student".to_string(),
                    middle_name: None,
                    phone_number: "+2348012345678".to_string(),
                },
            )
            .await
            .unwrap();
        tokens
    }

    pub fn user(&self, email: &str) -> User {
        self.users
            .get_by_email_sync(email)
            .expect("user should exist")
    }

    pub fn user_id(&self, email: &str) -> Uuid {
        self.user(email).id
    }

    pub fn last_code(&self, email: &str, purpose: OtpPurpose) -> String {
        self.otps
            .last_code_sync(self.user_id(email), purpose)
            .expect("a code should have been issued")
    }
}

/// Subscription engine over in-memory repos, with users seeded directly.
pub struct SubscriptionHarness {
    pub subs: SubscriptionUseCases,
    pub users: Arc<InMemoryUserRepo>,
    pub sub_repo: Arc<InMemorySubscriptionRepo>,
    pub pay_repo: Arc<InMemoryPaymentRepo>,
}

impl SubscriptionHarness {
    pub fn new() -> Self {
        let users = Arc::new(InMemoryUserRepo::new());
        let sub_repo = Arc::new(InMemorySubscriptionRepo::new());
        let pay_repo = Arc::new(InMemoryPaymentRepo::new());
        let subs =
            SubscriptionUseCases::new(sub_repo.clone(), pay_repo.clone(), users.clone());
        Self {
            subs,
            users,
            sub_repo,
            pay_repo,
        }
    }

    pub async fn seed_user(&self, status: SubscriptionStatus) -> Uuid {
        let user = seeded_user(status);
        let id = user.id;
        self.users.insert_raw(user);
        id
    }
}

/// Settings use cases over in-memory repos.
pub struct SettingsHarness {
    pub settings: SettingsUseCases,
    pub users: Arc<InMemoryUserRepo>,
    pub sessions: Arc<InMemoryRefreshTokenRepo>,
    pub email: Arc<RecordingEmailSender>,
}

impl SettingsHarness {
    pub fn new() -> Self {
        let users = Arc::new(InMemoryUserRepo::new());
        let sessions = Arc::new(InMemoryRefreshTokenRepo::new());
        let email = Arc::new(RecordingEmailSender::new());
        let settings = SettingsUseCases::new(
            users.clone(),
            sessions.clone(),
            Arc::new(InMemorySubscriptionRepo::new()),
            Arc::new(InMemoryPreferencesRepo::new()),
            Arc::new(InMemorySupportTicketRepo::new()),
            email.clone(),
        );
        Self {
            settings,
            users,
            sessions,
            email,
        }
    }

    pub async fn seed_user(&self) -> Uuid {
        let user = seeded_user(SubscriptionStatus::Inactive);
        let id = user.id;
        self.users.insert_raw(user);
        id
    }

    pub async fn seed_user_with_password(&self, password_plain: &str) -> Uuid {
        let mut user = seeded_user(SubscriptionStatus::Inactive);
        user.password_hash = password::hash_password(password_plain).await.unwrap();
        let id = user.id;
        self.users.insert_raw(user);
        id
    }

    pub async fn open_fake_session(&self, user_id: Uuid) {
        let expires = (Utc::now() + Duration::days(7)).naive_utc();
        self.sessions
            .insert(user_id, "fake-hash", expires)
            .await
            .unwrap();
    }
}

fn seeded_user(status: SubscriptionStatus) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        email: format!("{id}@example.com"),
        password_hash: "unset".to_string(),
        first_name: Some("Test".to_string()),
        last_name: Some("Student".to_string()),
        middle_name: None,
        phone_number: Some("+2348012345678".to_string()),
        is_verified: true,
        is_profile_complete: true,
        is_disabled: false,
        disabled_at: None,
        disable_reason: None,
        subscription_status: status,
        subscription_end_date: None,
        has_used_free_trial: true,
        password_history: Vec::new(),
        created_at: Utc::now().naive_utc(),
    }
}

/// A fully wired [`AppState`] over in-memory repos, for HTTP-level tests.
pub struct TestApp {
    pub state: crate::adapters::http::app_state::AppState,
    pub users: Arc<InMemoryUserRepo>,
    pub otps: Arc<InMemoryOtpRepo>,
    pub sessions: Arc<InMemoryRefreshTokenRepo>,
    pub email: Arc<RecordingEmailSender>,
}

impl TestApp {
    pub fn new() -> Self {
        use crate::{
            application::use_cases::exam::ExamUseCases, infra::config::AppConfig,
            test_utils::mocks::PermissiveRateLimiter,
        };

        let users = Arc::new(InMemoryUserRepo::new());
        let sessions = Arc::new(InMemoryRefreshTokenRepo::new());
        let otps = Arc::new(InMemoryOtpRepo::new());
        let tombstones = Arc::new(InMemoryDeletedEmailRepo::new());
        let preferences = Arc::new(InMemoryPreferencesRepo::new());
        let tickets = Arc::new(InMemorySupportTicketRepo::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepo::new());
        let payments = Arc::new(InMemoryPaymentRepo::new());
        let exam_results = Arc::new(InMemoryExamResultRepo::new());
        let email = Arc::new(RecordingEmailSender::new());
        let tokens = token_config();

        let engine = OtpEngine::new(otps.clone(), 10, 5, 60);

        let auth = AuthUseCases::new(
            users.clone(),
            sessions.clone(),
            tombstones.clone(),
            engine.clone(),
            email.clone(),
            tokens.clone(),
        );
        let account = AccountUseCases::new(
            users.clone(),
            sessions.clone(),
            preferences.clone(),
            tombstones,
            engine,
            otps.clone(),
            email.clone(),
        );
        let subs = SubscriptionUseCases::new(
            subscriptions.clone(),
            payments,
            users.clone(),
        );
        let settings = SettingsUseCases::new(
            users.clone(),
            sessions.clone(),
            subscriptions,
            preferences,
            tickets,
            email.clone(),
        );
        let exams = ExamUseCases::new(exam_results);

        let config = AppConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            redis_url: String::new(),
            cors_origin: axum::http::HeaderValue::from_static("http://localhost:3000"),
            jwt_access_secret: tokens.access_secret.clone(),
            jwt_refresh_secret: tokens.refresh_secret.clone(),
            access_token_ttl: tokens.access_ttl,
            refresh_token_ttl: tokens.refresh_ttl,
            otp_ttl_minutes: 10,
            otp_max_attempts: 5,
            otp_resend_cooldown_secs: 60,
            rate_limit_window_secs: 60,
            rate_limit_per_ip: u64::MAX,
            resend_api_key: SecretString::new("test".into()),
            email_from: "Prejamb <noreply@prejamb.test>".to_string(),
            trust_proxy: false,
        };

        let state = crate::adapters::http::app_state::AppState {
            config: Arc::new(config),
            auth: Arc::new(auth),
            account: Arc::new(account),
            subscriptions: Arc::new(subs),
            settings: Arc::new(settings),
            exams: Arc::new(exams),
            rate_limiter: Arc::new(PermissiveRateLimiter),
        };

        Self {
            state,
            users,
            otps,
            sessions,
            email,
        }
    }

    pub fn last_code(&self, email: &str, purpose: OtpPurpose) -> String {
        let user = self
            .users
            .get_by_email_sync(email)
            .expect("user should exist");
        self.otps
            .last_code_sync(user.id, purpose)
            .expect("a code should have been issued")
    }
}

/// Exam result with a created_at offset so ordering is deterministic.
pub fn exam_result(
    user_id: Uuid,
    mode: ExamMode,
    score: i32,
    total_obtainable: i32,
    is_passed: bool,
    offset_secs: i64,
) -> ExamResult {
    let base = Utc::now().naive_utc();
    ExamResult {
        id: Uuid::new_v4(),
        user_id,
        mode,
        score,
        total_obtainable,
        is_passed,
        subjects: Vec::new(),
        answers: Vec::new(),
        start_time: base,
        end_time: base + Duration::seconds(3600),
        duration_seconds: 3600,
        feedback: None,
        created_at: base + Duration::seconds(offset_secs),
    }
}

use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{email::resend::ResendEmailSender, http::app_state::AppState},
    infra::{
        config::AppConfig,
        db::init_db,
        rate_limit::{RateLimiterTrait, RedisRateLimiter},
    },
    use_cases::{
        account::AccountUseCases,
        auth::{AuthUseCases, DeletedEmailRepo, EmailSender, RefreshTokenRepo, TokenConfig, UserRepo},
        exam::{ExamResultRepo, ExamUseCases},
        otp::{OtpEngine, OtpRepo},
        settings::{PreferencesRepo, SettingsUseCases, SupportTicketRepo},
        subscription::{PaymentRepo, SubscriptionRepo, SubscriptionUseCases},
    },
};
use crate::adapters::persistence::PostgresPersistence;

pub async fn init_app_state() -> anyhow::Result<AppState> {
    init_tracing();

    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let postgres = Arc::new(PostgresPersistence::new(pool));

    let rate_limiter = Arc::new(
        RedisRateLimiter::new(
            &config.redis_url,
            config.rate_limit_window_secs,
            config.rate_limit_per_ip,
        )
        .await?,
    ) as Arc<dyn RateLimiterTrait>;

    let email = Arc::new(ResendEmailSender::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
    )) as Arc<dyn EmailSender>;

    let users = postgres.clone() as Arc<dyn UserRepo>;
    let sessions = postgres.clone() as Arc<dyn RefreshTokenRepo>;
    let tombstones = postgres.clone() as Arc<dyn DeletedEmailRepo>;
    let otp_repo = postgres.clone() as Arc<dyn OtpRepo>;
    let preferences = postgres.clone() as Arc<dyn PreferencesRepo>;
    let tickets = postgres.clone() as Arc<dyn SupportTicketRepo>;
    let subscriptions = postgres.clone() as Arc<dyn SubscriptionRepo>;
    let payments = postgres.clone() as Arc<dyn PaymentRepo>;
    let exam_results = postgres.clone() as Arc<dyn ExamResultRepo>;

    let otp_engine = OtpEngine::new(
        otp_repo.clone(),
        config.otp_ttl_minutes,
        config.otp_max_attempts,
        config.otp_resend_cooldown_secs,
    );

    let token_config = TokenConfig {
        access_secret: config.jwt_access_secret.clone(),
        refresh_secret: config.jwt_refresh_secret.clone(),
        access_ttl: config.access_token_ttl,
        refresh_ttl: config.refresh_token_ttl,
    };

    let auth = AuthUseCases::new(
        users.clone(),
        sessions.clone(),
        tombstones.clone(),
        otp_engine.clone(),
        email.clone(),
        token_config,
    );

    let account = AccountUseCases::new(
        users.clone(),
        sessions.clone(),
        preferences.clone(),
        tombstones,
        otp_engine,
        otp_repo,
        email.clone(),
    );

    let subscription_use_cases =
        SubscriptionUseCases::new(subscriptions.clone(), payments, users.clone());

    let settings = SettingsUseCases::new(
        users,
        sessions,
        subscriptions,
        preferences,
        tickets,
        email,
    );

    let exams = ExamUseCases::new(exam_results);

    Ok(AppState {
        config: Arc::new(config),
        auth: Arc::new(auth),
        account: Arc::new(account),
        subscriptions: Arc::new(subscription_use_cases),
        settings: Arc::new(settings),
        exams: Arc::new(exams),
        rate_limiter,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "prejamb_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}

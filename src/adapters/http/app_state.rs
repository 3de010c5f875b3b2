use std::sync::Arc;

use crate::{
    application::use_cases::{
        account::AccountUseCases, auth::AuthUseCases, exam::ExamUseCases,
        settings::SettingsUseCases, subscription::SubscriptionUseCases,
    },
    infra::{config::AppConfig, rate_limit::RateLimiterTrait},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthUseCases>,
    pub account: Arc<AccountUseCases>,
    pub subscriptions: Arc<SubscriptionUseCases>,
    pub settings: Arc<SettingsUseCases>,
    pub exams: Arc<ExamUseCases>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}

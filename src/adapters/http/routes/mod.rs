use axum::Router;

use crate::adapters::http::app_state::AppState;

pub mod auth;
pub mod exam;
pub mod settings;
pub mod subscription;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/settings", settings::router())
        .nest("/subscriptions", subscription::router())
        .nest("/exams", exam::router())
}

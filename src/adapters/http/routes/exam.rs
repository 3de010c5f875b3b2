use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::AuthUser},
    app_error::AppResult,
    application::use_cases::exam::score_feedback,
    domain::entities::subscription::ExamMode,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/history", get(history))
        .route("/analytics/summary", get(analytics))
        .route("/{id}", get(detail))
}

#[derive(Deserialize)]
struct HistoryQuery {
    mode: Option<ExamMode>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn history(
    State(app_state): State<AppState>,
    user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<impl IntoResponse> {
    let page = app_state
        .exams
        .history(
            user.user_id,
            query.mode,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(10),
        )
        .await?;
    Ok(Json(page))
}

async fn analytics(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let summary = app_state.exams.analytics(user.user_id).await?;
    Ok(Json(summary))
}

async fn detail(
    State(app_state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let result = app_state.exams.detail(id, user.user_id).await?;

    let feedback = result
        .feedback
        .clone()
        .unwrap_or_else(|| score_feedback(result.score, result.total_obtainable).to_string());

    Ok(Json(json!({
        "exam": {
            "id": result.id,
            "mode": result.mode,
            "score": result.score,
            "totalObtainable": result.total_obtainable,
            "isPassed": result.is_passed,
            "subjects": result.subjects,
            "answers": result.answers,
            "startTime": result.start_time,
            "endTime": result.end_time,
            "durationSeconds": result.duration_seconds,
            "createdAt": result.created_at,
        },
        "feedback": feedback,
    })))
}

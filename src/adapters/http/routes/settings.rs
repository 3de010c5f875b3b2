use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    adapters::http::{app_state::AppState, middleware::AuthUser},
    app_error::{AppError, AppResult},
    application::validators,
    domain::entities::{
        preferences::Theme,
        support_ticket::{IssueType, NewSupportTicket},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile))
        .route("/preferences", get(preferences).patch(update_preferences))
        .route("/change-password", post(change_password))
        .route("/account/disable/initiate", post(initiate_disable))
        .route("/account/disable/complete", post(complete_disable))
        .route("/account/delete/initiate", post(initiate_delete))
        .route("/account/delete/complete", post(complete_delete))
        .route("/support-tickets", post(create_ticket).get(list_tickets))
}

async fn profile(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let summary = app_state.settings.profile(user.user_id).await?;
    Ok(Json(json!({ "profile": summary })))
}

async fn preferences(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let prefs = app_state.settings.preferences(user.user_id).await?;
    Ok(Json(json!({ "preferences": prefs })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePreferencesPayload {
    font_size: Option<i16>,
    theme: Option<Theme>,
}

async fn update_preferences(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdatePreferencesPayload>,
) -> AppResult<impl IntoResponse> {
    if let Some(size) = payload.font_size
        && !(1..=5).contains(&size)
    {
        return Err(AppError::Validation(
            "fontSize must be between 1 and 5".to_string(),
        ));
    }

    let prefs = app_state
        .settings
        .update_preferences(user.user_id, payload.font_size, payload.theme)
        .await?;
    Ok(Json(json!({ "preferences": prefs })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordPayload {
    old_password: String,
    new_password: String,
}

async fn change_password(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordPayload>,
) -> AppResult<impl IntoResponse> {
    let errors = validators::password_strength_errors(&payload.new_password);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors.join(". ")));
    }

    app_state
        .settings
        .change_password(user.user_id, &payload.old_password, &payload.new_password)
        .await?;
    Ok(Json(json!({
        "message": "Password changed successfully. Please log in again on your other devices.",
    })))
}

#[derive(Deserialize)]
struct InitiateActionPayload {
    /// Collected up-front for the client flow; persisted at completion.
    #[allow(dead_code)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct CompleteActionPayload {
    otp: String,
    reason: String,
}

fn check_action_payload(payload: &CompleteActionPayload) -> AppResult<()> {
    if !validators::is_valid_otp_code(&payload.otp) {
        return Err(AppError::Validation("OTP must be a 6-digit code".to_string()));
    }
    if payload.reason.trim().is_empty() {
        return Err(AppError::Validation("A reason is required".to_string()));
    }
    Ok(())
}

async fn initiate_disable(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(_payload): Json<InitiateActionPayload>,
) -> AppResult<impl IntoResponse> {
    app_state.account.initiate_disable(user.user_id).await?;
    Ok(Json(json!({
        "message": "A confirmation code has been sent to your email.",
    })))
}

async fn complete_disable(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CompleteActionPayload>,
) -> AppResult<impl IntoResponse> {
    check_action_payload(&payload)?;
    app_state
        .account
        .complete_disable(user.user_id, &payload.otp, payload.reason.trim())
        .await?;
    Ok(Json(json!({
        "message": "Your account has been disabled. Contact customer service to reactivate.",
    })))
}

async fn initiate_delete(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(_payload): Json<InitiateActionPayload>,
) -> AppResult<impl IntoResponse> {
    app_state.account.initiate_delete(user.user_id).await?;
    Ok(Json(json!({
        "message": "A confirmation code has been sent to your email.",
    })))
}

async fn complete_delete(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CompleteActionPayload>,
) -> AppResult<impl IntoResponse> {
    check_action_payload(&payload)?;
    app_state
        .account
        .complete_delete(user.user_id, &payload.otp, payload.reason.trim())
        .await?;
    Ok(Json(json!({
        "message": "Your account and data have been deleted.",
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTicketPayload {
    issue_type: IssueType,
    description: String,
    attachment_url: Option<String>,
}

async fn create_ticket(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateTicketPayload>,
) -> AppResult<impl IntoResponse> {
    if !validators::is_valid_ticket_description(&payload.description) {
        return Err(AppError::Validation(
            "Description must be between 10 and 2000 characters".to_string(),
        ));
    }

    let ticket = app_state
        .settings
        .create_support_ticket(NewSupportTicket {
            user_id: user.user_id,
            issue_type: payload.issue_type,
            description: payload.description,
            attachment_url: payload.attachment_url,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Support ticket created",
            "ticketNumber": ticket.ticket_number,
            "status": ticket.status,
        })),
    ))
}

async fn list_tickets(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let tickets = app_state.settings.list_support_tickets(user.user_id).await?;
    let tickets: Vec<_> = tickets
        .into_iter()
        .map(|t| {
            json!({
                "ticketNumber": t.ticket_number,
                "issueType": t.issue_type,
                "description": t.description,
                "attachmentUrl": t.attachment_url,
                "status": t.status,
                "createdAt": t.created_at,
            })
        })
        .collect();
    Ok(Json(json!({ "tickets": tickets })))
}

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    adapters::http::{app_state::AppState, middleware::AuthUser},
    app_error::{AppError, AppResult},
    domain::entities::{
        payment::PaymentMethod,
        subscription::{ExamMode, PlanType},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(plans))
        .route("/status", get(status))
        .route("/free", post(start_free))
        .route("/payments/initialize", post(initialize_payment))
        .route("/payments/verify", post(verify_payment))
        .route("/cancel", post(cancel))
        .route("/access/{mode}", get(check_access))
        .route("/trials/use", post(use_trial))
}

async fn plans(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "plans": app_state.subscriptions.available_plans() }))
}

async fn status(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let summary = app_state.subscriptions.subscription_status(user.user_id).await?;
    Ok(Json(summary))
}

async fn start_free(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    match app_state
        .subscriptions
        .create_free_subscription(user.user_id)
        .await?
    {
        Some(subscription) => Ok(Json(json!({
            "message": "Free plan active",
            "planType": subscription.plan_type,
            "endDate": subscription.end_date,
        }))),
        None => Err(AppError::BusinessRule(
            "You are not eligible for the free plan. Please choose a paid plan.".to_string(),
        )),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializePaymentPayload {
    plan_type: PlanType,
    payment_method: PaymentMethod,
}

async fn initialize_payment(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitializePaymentPayload>,
) -> AppResult<impl IntoResponse> {
    let init = app_state
        .subscriptions
        .initialize_payment(user.user_id, payload.plan_type, payload.payment_method)
        .await?;
    Ok(Json(json!({
        "message": "Payment initialized",
        "payment": init,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPaymentPayload {
    payment_reference: String,
    gateway_reference: Option<String>,
}

async fn verify_payment(
    State(app_state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<VerifyPaymentPayload>,
) -> AppResult<impl IntoResponse> {
    let (subscription, payment) = app_state
        .subscriptions
        .verify_and_activate(
            &payload.payment_reference,
            payload.gateway_reference.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "message": "Payment verified and subscription activated",
        "subscription": {
            "planType": subscription.plan_type,
            "startDate": subscription.start_date,
            "endDate": subscription.end_date,
        },
        "payment": {
            "paymentReference": payment.payment_reference,
            "status": payment.status,
            "amount": payment.amount,
        },
    })))
}

async fn cancel(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    app_state.subscriptions.cancel(user.user_id).await?;
    Ok(Json(json!({ "message": "Subscription cancelled" })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UseTrialPayload {
    exam_mode: ExamMode,
}

/// Called when an exam starts on the free plan; no-op on paid plans.
async fn use_trial(
    State(app_state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UseTrialPayload>,
) -> AppResult<impl IntoResponse> {
    app_state
        .subscriptions
        .mark_free_trial_used(user.user_id, payload.exam_mode)
        .await?;
    Ok(Json(json!({ "message": "Trial usage recorded" })))
}

async fn check_access(
    State(app_state): State<AppState>,
    user: AuthUser,
    Path(mode): Path<String>,
) -> AppResult<impl IntoResponse> {
    let mode: ExamMode = mode
        .parse()
        .map_err(|_| AppError::Validation(format!("Unknown exam mode: {mode}")))?;

    let access = app_state
        .subscriptions
        .can_access_exam_mode(user.user_id, mode)
        .await?;
    Ok(Json(access))
}

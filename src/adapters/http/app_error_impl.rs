use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app_error::{AppError, ErrorCode, OtpFailure};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::Database(_) => {
                // Internal detail stays in the log; the caller gets the code.
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::Conflict(msg) => {
                error_resp(StatusCode::CONFLICT, ErrorCode::Conflict, Some(msg))
            }
            AppError::InvalidCredentials => error_resp(
                StatusCode::UNAUTHORIZED,
                ErrorCode::InvalidCredentials,
                Some("Invalid email or password".to_string()),
            ),
            AppError::Unauthorized(msg) => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, Some(msg))
            }
            AppError::Forbidden(msg) => {
                error_resp(StatusCode::FORBIDDEN, ErrorCode::Forbidden, Some(msg))
            }
            AppError::NotFound(what) => error_resp(
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                Some(format!("{what} not found")),
            ),
            AppError::RateLimited => {
                error_resp(StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited, None)
            }
            AppError::OtpCooldown { wait_seconds } => {
                let body = serde_json::json!({
                    "code": ErrorCode::OtpCooldown.as_str(),
                    "message": format!(
                        "Please wait {wait_seconds} seconds before requesting a new OTP"
                    ),
                    "waitSeconds": wait_seconds,
                });
                (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
            }
            AppError::Otp(failure) => otp_resp(failure),
            AppError::BusinessRule(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::BusinessRule, Some(msg))
            }
            AppError::Validation(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn otp_resp(failure: OtpFailure) -> Response {
    let code = match failure {
        OtpFailure::NotFound => ErrorCode::OtpNotFound,
        OtpFailure::Expired => ErrorCode::OtpExpired,
        OtpFailure::AttemptsExceeded => ErrorCode::OtpAttemptsExceeded,
        OtpFailure::Mismatch { .. } => ErrorCode::OtpMismatch,
    };

    // Only a mismatch carries the remaining-attempts count.
    let body = match failure {
        OtpFailure::Mismatch { attempts_remaining } => serde_json::json!({
            "code": code.as_str(),
            "message": failure.to_string(),
            "attemptsRemaining": attempts_remaining,
        }),
        _ => serde_json::json!({
            "code": code.as_str(),
            "message": failure.to_string(),
        }),
    };

    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}

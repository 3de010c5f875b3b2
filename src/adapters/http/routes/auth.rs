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
    adapters::http::{
        app_state::AppState,
        middleware::{AuthUser, ProfileCompletionUser},
    },
    app_error::{AppError, AppResult},
    application::validators,
    domain::entities::{otp::OtpPurpose, user::ProfileFields},
    use_cases::auth::LoginOutcome,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
        .route("/complete-profile", post(complete_profile))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/me", get(me))
}

fn check_email(email: &str) -> AppResult<()> {
    if !validators::is_valid_email(email) {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    Ok(())
}

fn check_password(password: &str) -> AppResult<()> {
    let errors = validators::password_strength_errors(password);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors.join(". ")));
    }
    Ok(())
}

fn check_otp(code: &str) -> AppResult<()> {
    if !validators::is_valid_otp_code(code) {
        return Err(AppError::Validation("OTP must be a 6-digit code".to_string()));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RegisterPayload {
    email: String,
    password: String,
}

async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<impl IntoResponse> {
    check_email(&payload.email)?;
    check_password(&payload.password)?;

    let email = app_state.auth.register(&payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Please check your email for the verification code.",
            "email": email,
        })),
    ))
}

#[derive(Deserialize)]
struct VerifyOtpPayload {
    email: String,
    otp: String,
}

async fn verify_otp(
    State(app_state): State<AppState>,
    Json(payload): Json<VerifyOtpPayload>,
) -> AppResult<impl IntoResponse> {
    check_email(&payload.email)?;
    check_otp(&payload.otp)?;

    let temp_token = app_state.auth.verify_otp(&payload.email, &payload.otp).await?;
    Ok(Json(json!({
        "message": "Email verified successfully. Please complete your profile.",
        "tempToken": temp_token,
    })))
}

#[derive(Deserialize)]
struct ResendOtpPayload {
    email: String,
    /// Defaults to email verification when the client does not say.
    #[serde(rename = "type", default)]
    purpose: Option<OtpPurpose>,
}

async fn resend_otp(
    State(app_state): State<AppState>,
    Json(payload): Json<ResendOtpPayload>,
) -> AppResult<impl IntoResponse> {
    check_email(&payload.email)?;

    let purpose = payload.purpose.unwrap_or(OtpPurpose::EmailVerification);
    app_state.auth.resend_otp(&payload.email, purpose).await?;
    Ok(Json(json!({ "message": "A new OTP has been sent to your email." })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteProfilePayload {
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
    phone_number: String,
}

async fn complete_profile(
    State(app_state): State<AppState>,
    user: ProfileCompletionUser,
    Json(payload): Json<CompleteProfilePayload>,
) -> AppResult<impl IntoResponse> {
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(AppError::Validation(
            "First and last name are required".to_string(),
        ));
    }

    let (tokens, profile) = app_state
        .auth
        .complete_profile(
            user.user_id,
            ProfileFields {
                first_name: payload.first_name.trim().to_string(),
                last_name: payload.last_name.trim().to_string(),
                middle_name: payload
                    .middle_name
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty()),
                phone_number: payload.phone_number.trim().to_string(),
            },
        )
        .await?;

    Ok(Json(json!({
        "message": "Profile completed successfully. Welcome to Prejamb!",
        "tokens": tokens,
        "user": profile,
    })))
}

#[derive(Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> AppResult<impl IntoResponse> {
    check_email(&payload.email)?;

    match app_state.auth.login(&payload.email, &payload.password).await? {
        LoginOutcome::LoggedIn { tokens, user } => Ok(Json(json!({
            "message": "Login successful",
            "tokens": tokens,
            "user": user,
        }))),
        // Not an error: the client redirects to onboarding with this token.
        LoginOutcome::ProfileIncomplete { temp_token } => Ok(Json(json!({
            "message": "Please complete your profile",
            "requiresProfileCompletion": true,
            "tempToken": temp_token,
        }))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    refresh_token: String,
}

async fn refresh(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> AppResult<impl IntoResponse> {
    let tokens = app_state
        .auth
        .refresh_access_token(&payload.refresh_token)
        .await?;
    Ok(Json(json!({ "tokens": tokens })))
}

async fn logout(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> AppResult<impl IntoResponse> {
    app_state.auth.logout(&payload.refresh_token).await?;
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

#[derive(Deserialize)]
struct ForgotPasswordPayload {
    email: String,
}

async fn forgot_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> AppResult<impl IntoResponse> {
    check_email(&payload.email)?;

    app_state.auth.forgot_password(&payload.email).await?;
    // Same response whether or not the account exists.
    Ok(Json(json!({
        "message": "If an account exists for that email, a reset code has been sent.",
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordPayload {
    email: String,
    otp: String,
    new_password: String,
}

async fn reset_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> AppResult<impl IntoResponse> {
    check_email(&payload.email)?;
    check_otp(&payload.otp)?;
    check_password(&payload.new_password)?;

    app_state
        .auth
        .reset_password(&payload.email, &payload.otp, &payload.new_password)
        .await?;
    Ok(Json(json!({
        "message": "Password reset successfully. Please log in with your new password.",
    })))
}

async fn me(
    State(app_state): State<AppState>,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let profile = app_state.auth.get_profile(user.user_id).await?;
    Ok(Json(json!({ "user": profile })))
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum_test::TestServer;
    use serde_json::Value;

    use crate::{
        adapters::http::routes, domain::entities::otp::OtpPurpose,
        test_utils::factories::TestApp,
    };

    fn server(app: &TestApp) -> TestServer {
        let router: Router = routes::router().with_state(app.state.clone());
        TestServer::new(router).expect("test server should start")
    }

    #[tokio::test]
    async fn register_verify_complete_login_over_http() {
        let app = TestApp::new();
        let server = server(&app);

        let res = server
            .post("/auth/register")
            .json(&serde_json::json!({
                "email": "student@example.com",
                "password": "Secur3Pass",
            }))
            .await;
        res.assert_status(axum::http::StatusCode::CREATED);

        let code = app.last_code("student@example.com", OtpPurpose::EmailVerification);
        let res = server
            .post("/auth/verify-otp")
            .json(&serde_json::json!({
                "email": "student@example.com",
                "otp": code,
            }))
            .await;
        res.assert_status_ok();
        let temp_token = res.json::<Value>()["tempToken"]
            .as_str()
            .expect("temp token present")
            .to_string();

        let res = server
            .post("/auth/complete-profile")
            .authorization_bearer(&temp_token)
            .json(&serde_json::json!({
                "firstName": "Ada",
                "lastName": "Obi",
                "phoneNumber": "+2348012345678",
            }))
            .await;
        res.assert_status_ok();
        let body = res.json::<Value>();
        assert!(body["tokens"]["accessToken"].as_str().is_some());

        let res = server
            .post("/auth/login")
            .json(&serde_json::json!({
                "email": "student@example.com",
                "password": "Secur3Pass",
            }))
            .await;
        res.assert_status_ok();
        let body = res.json::<Value>();
        let access = body["tokens"]["accessToken"].as_str().unwrap().to_string();

        let res = server.get("/auth/me").authorization_bearer(&access).await;
        res.assert_status_ok();
        assert_eq!(
            res.json::<Value>()["user"]["email"].as_str(),
            Some("student@example.com")
        );
    }

    #[tokio::test]
    async fn weak_password_is_rejected_at_the_boundary() {
        let app = TestApp::new();
        let server = server(&app);

        let res = server
            .post("/auth/register")
            .json(&serde_json::json!({
                "email": "weak@example.com",
                "password": "short",
            }))
            .await;
        res.assert_status(axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(
            res.json::<Value>()["code"].as_str(),
            Some("INVALID_INPUT")
        );
    }

    #[tokio::test]
    async fn otp_mismatch_reports_remaining_attempts() {
        let app = TestApp::new();
        let server = server(&app);

        server
            .post("/auth/register")
            .json(&serde_json::json!({
                "email": "count@example.com",
                "password": "Secur3Pass",
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let code = app.last_code("count@example.com", OtpPurpose::EmailVerification);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let res = server
            .post("/auth/verify-otp")
            .json(&serde_json::json!({
                "email": "count@example.com",
                "otp": wrong,
            }))
            .await;
        res.assert_status(axum::http::StatusCode::BAD_REQUEST);
        let body = res.json::<Value>();
        assert_eq!(body["code"].as_str(), Some("OTP_MISMATCH"));
        assert_eq!(body["attemptsRemaining"].as_i64(), Some(4));
    }

    #[tokio::test]
    async fn me_requires_an_access_token() {
        let app = TestApp::new();
        let server = server(&app);

        let res = server.get("/auth/me").await;
        res.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }
}

use crate::domain::entities::otp::OtpPurpose;

const BRAND_NAME: &str = "Prejamb";
const TAGLINE: &str = "Your success, our mission.";

fn wrap_email(headline: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family:'Segoe UI',Tahoma,sans-serif;background-color:#f4f4f4;margin:0;padding:0;">
  <div style="max-width:600px;margin:40px auto;">
    <div style="background:#2563eb;color:#ffffff;padding:30px;text-align:center;border-radius:12px 12px 0 0;">
      <h1 style="margin:0;font-size:24px;">{headline}</h1>
    </div>
    <div style="background:#ffffff;padding:40px 30px;border-radius:0 0 12px 12px;">
      {body}
      <div style="text-align:center;margin-top:30px;padding-top:20px;border-top:1px solid #e5e7eb;color:#6b7280;font-size:14px;">
        <p>{BRAND_NAME}. {TAGLINE}</p>
        <p>This is an automated message, please do not reply.</p>
      </div>
    </div>
  </div>
</body>
</html>"#
    )
}

fn otp_block(code: &str) -> String {
    format!(
        r#"<div style="background:#f0f9ff;border:2px dashed #2563eb;border-radius:12px;padding:25px;text-align:center;margin:25px 0;">
      <span style="font-size:36px;font-weight:700;letter-spacing:8px;color:#1e40af;font-family:'Courier New',monospace;">{code}</span>
    </div>"#
    )
}

pub fn otp_email(code: &str, purpose: OtpPurpose) -> (String, String) {
    let (subject, intent) = match purpose {
        OtpPurpose::EmailVerification => (
            format!("Verify your {BRAND_NAME} account"),
            "verify your email address",
        ),
        OtpPurpose::PasswordReset => (
            format!("Reset your {BRAND_NAME} password"),
            "reset your password",
        ),
        // Disable/delete use account_action_email; this arm keeps the
        // mapping total for callers that route every purpose through here.
        OtpPurpose::AccountDisable => (
            format!("Disable {BRAND_NAME} Account Verification"),
            "disable your account",
        ),
        OtpPurpose::AccountDelete => (
            format!("Delete {BRAND_NAME} Account Verification"),
            "delete your account",
        ),
    };

    let body = format!(
        r#"<p>Hello,</p>
      <p>You requested to {intent}. Please use the following OTP code:</p>
      {otp}
      <p><strong>This code expires in 10 minutes.</strong> Do not share it with anyone.
      If you didn't request this, please ignore this email.</p>"#,
        otp = otp_block(code),
    );

    (subject, wrap_email(&format!("{BRAND_NAME}"), &body))
}

pub fn welcome_email(first_name: &str) -> (String, String) {
    let subject = format!("Welcome to {BRAND_NAME}!");
    let body = format!(
        r#"<p>Hi {first_name},</p>
      <p>Congratulations! Your account has been successfully created. You're now part of
      thousands of students preparing for JAMB success.</p>
      <p>Practice with past JAMB questions, track your performance and focus on your weak
      areas. We're here to support you every step of the way.</p>"#
    );
    (subject, wrap_email(&format!("Welcome to {BRAND_NAME}!"), &body))
}

/// OTP email confirming a destructive account action.
pub fn account_action_email(code: &str, purpose: OtpPurpose) -> (String, String) {
    let (action_text, warning) = match purpose {
        OtpPurpose::AccountDelete => (
            "delete your account",
            "This action cannot be undone. All your data will be permanently removed.",
        ),
        _ => (
            "disable your account",
            "You will be logged out immediately upon confirmation.",
        ),
    };
    let subject = match purpose {
        OtpPurpose::AccountDelete => format!("Delete {BRAND_NAME} Account Verification"),
        _ => format!("Disable {BRAND_NAME} Account Verification"),
    };

    let body = format!(
        r#"<p>Hello,</p>
      <p>We received a request to <strong>{action_text}</strong>.</p>
      <p>Please use the following OTP code to confirm this action:</p>
      {otp}
      <p><strong>Warning:</strong> {warning}</p>
      <p>If you did not initiate this request, please secure your account immediately by
      changing your password.</p>"#,
        otp = otp_block(code),
    );

    (subject, wrap_email("Account Action Verification", &body))
}

pub fn ticket_confirmation_email(ticket_number: &str, issue_type: &str) -> (String, String) {
    let subject = format!("[{ticket_number}] Support Request Received");
    let body = format!(
        r#"<p>Hello,</p>
      <p>We have received your support request. Our team will review it and get back to you shortly.</p>
      <div style="background:#f0f9ff;border-radius:8px;padding:15px;margin:20px 0;border-left:4px solid #0284c7;">
        <p style="margin:0;"><strong>Ticket Number:</strong> {ticket_number}</p>
        <p style="margin:5px 0 0 0;"><strong>Issue Type:</strong> {issue_type}</p>
      </div>
      <p>You can track the status of this ticket in your Settings.</p>"#
    );
    (subject, wrap_email("Support Ticket Received", &body))
}

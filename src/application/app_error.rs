use thiserror::Error;

/// Why an OTP check failed. Every variant except `Mismatch` retires the
/// code; a mismatch keeps it alive for further attempts up to the cap.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpFailure {
    #[error("No active OTP found. Please request a new one.")]
    NotFound,

    #[error("OTP has expired. Please request a new one.")]
    Expired,

    #[error("Maximum OTP attempts exceeded. Please request a new one.")]
    AttemptsExceeded,

    #[error("Invalid OTP code. {attempts_remaining} attempts remaining.")]
    Mismatch { attempts_remaining: i32 },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Too many requests. Please slow down.")]
    RateLimited,

    #[error("Please wait {wait_seconds} seconds before requesting a new OTP")]
    OtpCooldown { wait_seconds: i64 },

    #[error(transparent)]
    Otp(#[from] OtpFailure),

    #[error("{0}")]
    BusinessRule(String),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    Conflict,
    InvalidCredentials,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    OtpCooldown,
    OtpNotFound,
    OtpExpired,
    OtpAttemptsExceeded,
    OtpMismatch,
    BusinessRule,
    InvalidInput,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::OtpCooldown => "OTP_COOLDOWN",
            ErrorCode::OtpNotFound => "OTP_NOT_FOUND",
            ErrorCode::OtpExpired => "OTP_EXPIRED",
            ErrorCode::OtpAttemptsExceeded => "OTP_ATTEMPTS_EXCEEDED",
            ErrorCode::OtpMismatch => "OTP_MISMATCH",
            ErrorCode::BusinessRule => "BUSINESS_RULE",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

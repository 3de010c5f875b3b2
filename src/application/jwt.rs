use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

/// TTL for purpose-scoped temporary tokens.
const TEMP_TOKEN_TTL: Duration = Duration::minutes(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The single follow-up action a temporary token is good for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempPurpose {
    EmailVerification,
    ProfileCompletion,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub kind: TokenKind,
    /// Unique per issuance. Without it, two tokens minted for the same user
    /// within one second would be byte-identical, and their server-side
    /// digests would collide.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TempClaims {
    pub sub: Uuid,
    pub email: String,
    pub purpose: TempPurpose,
    pub iat: i64,
    pub exp: i64,
}

fn sign<T: Serialize>(claims: &T, secret: &secrecy::SecretString) -> AppResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn issue(
    user_id: Uuid,
    email: &str,
    kind: TokenKind,
    secret: &secrecy::SecretString,
    ttl: Duration,
) -> AppResult<String> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        kind,
        jti: Uuid::new_v4(),
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    sign(&claims, secret)
}

pub fn issue_temp(
    user_id: Uuid,
    email: &str,
    purpose: TempPurpose,
    secret: &secrecy::SecretString,
) -> AppResult<String> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = TempClaims {
        sub: user_id,
        email: email.to_string(),
        purpose,
        iat: now,
        exp: now + TEMP_TOKEN_TTL.whole_seconds(),
    };
    sign(&claims, secret)
}

/// Stateless verification: signature + expiry + kind. Refresh tokens
/// additionally require a live database record, which is the caller's job.
pub fn verify(token: &str, kind: TokenKind, secret: &secrecy::SecretString) -> AppResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    if claims.kind != kind {
        return Err(AppError::Unauthorized("Invalid or expired token".to_string()));
    }
    Ok(claims)
}

pub fn verify_temp(
    token: &str,
    expected: TempPurpose,
    secret: &secrecy::SecretString,
) -> AppResult<TempClaims> {
    let validation = Validation::new(Algorithm::HS256);
    let claims = decode::<TempClaims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    if claims.purpose != expected {
        return Err(AppError::Forbidden("Token not valid for this action".to_string()));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn secret() -> SecretString {
        SecretString::new("test-secret".into())
    }

    #[test]
    fn issue_and_verify_access_token() {
        let user_id = Uuid::new_v4();
        let token = issue(
            user_id,
            "a@b.com",
            TokenKind::Access,
            &secret(),
            Duration::minutes(15),
        )
        .unwrap();
        let claims = verify(&token, TokenKind::Access, &secret()).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn refresh_token_is_rejected_where_access_is_expected() {
        let token = issue(
            Uuid::new_v4(),
            "a@b.com",
            TokenKind::Refresh,
            &secret(),
            Duration::days(7),
        )
        .unwrap();
        assert!(verify(&token, TokenKind::Access, &secret()).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(
            Uuid::new_v4(),
            "a@b.com",
            TokenKind::Access,
            &secret(),
            Duration::minutes(15),
        )
        .unwrap();
        let other = SecretString::new("other-secret".into());
        assert!(verify(&token, TokenKind::Access, &other).is_err());
    }

    #[test]
    fn temp_token_purpose_mismatch_is_forbidden() {
        let token = issue_temp(
            Uuid::new_v4(),
            "a@b.com",
            TempPurpose::EmailVerification,
            &secret(),
        )
        .unwrap();
        let err = verify_temp(&token, TempPurpose::ProfileCompletion, &secret()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let ok = verify_temp(&token, TempPurpose::EmailVerification, &secret());
        assert!(ok.is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue(
            Uuid::new_v4(),
            "a@b.com",
            TokenKind::Access,
            &secret(),
            Duration::seconds(-120),
        )
        .unwrap();
        assert!(verify(&token, TokenKind::Access, &secret()).is_err());
    }
}

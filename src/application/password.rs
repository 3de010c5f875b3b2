use crate::app_error::{AppError, AppResult};

/// bcrypt cost factor. Hashing at this cost takes long enough that it must
/// never run on the async executor threads.
const BCRYPT_COST: u32 = 12;

pub async fn hash_password(plain: &str) -> AppResult<String> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, BCRYPT_COST))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn verify_password(plain: &str, hash: &str) -> AppResult<bool> {
    let plain = plain.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify_roundtrip() {
        let hash = hash_password("Secur3Pass").await.expect("hashing succeeds");
        assert!(verify_password("Secur3Pass", &hash).await.unwrap());
        assert!(!verify_password("WrongPass1", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently() {
        let a = hash_password("Secur3Pass").await.unwrap();
        let b = hash_password("Secur3Pass").await.unwrap();
        assert_ne!(a, b);
    }
}

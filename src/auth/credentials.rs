use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::store::SqliteStore;

/// Hash a password for storage.
pub async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(format!("hashing password: {e}")))
}

/// Check an email/password pair against the stored salted hash.
pub async fn authenticate(store: &SqliteStore, email: &str, password: &str) -> AppResult<User> {
    let (user, passhash) = store
        .credentials_by_email(email)
        .await?
        .ok_or(AppError::AuthenticationFailed)?;

    let password = password.to_string();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &passhash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        // An unparseable stored hash can never match
        .unwrap_or(false);

    if !verified {
        tracing::info!("Failed login for {}", email);
        return Err(AppError::AuthenticationFailed);
    }
    Ok(user)
}

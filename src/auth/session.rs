use rand::Rng;

use crate::store::{SqliteStore, StoreError};

pub const SESSION_COOKIE: &str = "ashiato_session";

/// Create a new session for a user. Returns the session token.
pub async fn create_session(
    store: &SqliteStore,
    user_id: i64,
    hours: u64,
) -> Result<String, StoreError> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    store.insert_session(&id, user_id, &token, hours).await?;
    Ok(token)
}

/// Delete a session by token.
pub async fn delete_session(store: &SqliteStore, token: &str) -> Result<(), StoreError> {
    store.delete_session(token).await
}

pub fn session_cookie(token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}

use std::path::PathBuf;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use rifa_db::Database;
use rifa_types::api::{Claims, LoginRequest, LoginResponse};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub http: reqwest::Client,
    pub image_cache_dir: PathBuf,
}

/// Guarantee the admin account exists. Called once at startup; the username
/// UNIQUE constraint makes it safe to race. There is no self-registration —
/// this is the only code path that creates a user.
pub fn bootstrap_admin(
    db: &Database,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    if db.get_user_by_username(username)?.is_some() {
        return Ok(());
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash admin password: {e}"))?
        .to_string();

    let created =
        db.ensure_admin_user(&Uuid::new_v4().to_string(), username, email, &password_hash)?;
    if created {
        info!("Created default admin account '{}'", username);
    }
    Ok(())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let username = req.username.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_username(&username))
        .await??
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("corrupt password hash for '{}': {e}", user.username))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {e}", user.id))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username, user.is_admin)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    admin: bool,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        admin,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

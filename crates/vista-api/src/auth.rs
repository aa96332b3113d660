use axum::{Json, extract::State};
use tracing::info;

use vista_types::api::{LoginForm, RegisterRequest, TokenResponse, UserResponse};

use crate::error::ApiError;
use crate::extract::{ApiForm, ApiJson};
use crate::state::{AppState, blocking};

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    // Validate input
    let email = req.email.trim().to_string();
    if !looks_like_email(&email) {
        return Err(ApiError::validation("Invalid email address"));
    }
    if req.password.is_empty() {
        return Err(ApiError::validation("Password must not be empty"));
    }

    let db = state.clone();
    let user = blocking(move || {
        // Check if email is taken before paying for a hash
        if db.db.get_user_by_email(&email)?.is_some() {
            return Ok(None);
        }
        let password_hash = db.credentials.hash_password(&req.password)?;
        // The unique constraint still catches a concurrent registration
        db.db.create_user(&email, &password_hash)
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("Email already registered".into()))?;

    info!("Registered user {} ({})", user.id, user.email);

    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let db = state.clone();
    let user = blocking(move || {
        let Some(user) = db.db.get_user_by_email(form.username.trim())? else {
            return Ok(None);
        };
        Ok(db
            .credentials
            .verify_password(&form.password, &user.password_hash)
            .then_some(user))
    })
    .await?
    .ok_or(ApiError::BadCredentials)?;

    let token = state.credentials.issue_token(&user.email)?;

    Ok(Json(TokenResponse::bearer(token)))
}

/// Minimal shape check: one `@` with a non-empty local part and a dotted domain.
fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(looks_like_email("ada@example.com"));
        assert!(looks_like_email("a.b+c@mail.example.org"));
        assert!(!looks_like_email("ada"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada@localhost"));
        assert!(!looks_like_email("ada@@example.com"));
        assert!(!looks_like_email("ada lovelace@example.com"));
    }
}

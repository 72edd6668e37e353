use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use rand_core::OsRng;
use tracing::{error, info};

use agora_db::users::ProfileUpdate;
use agora_types::api::{
    AuthResponse, Claims, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest,
    TokenType, UpdateProfileRequest, UserResponse,
};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_USERNAME_LEN: usize = 150;

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password: Ensure this field has at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    if req.password != req.password2 {
        return Err(ApiError::Validation("Passwords don't match".into()));
    }

    // Username defaults to the email's local part
    let username = match req.username.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => email.split('@').next().unwrap_or_default().to_string(),
    };
    validate_username(&username)?;

    let password_hash = hash_password(&req.password)?;

    let user = run_db(&state, move |db| db.create_user(&username, &email, &password_hash)).await?;

    let tokens = state.tokens.issue_pair(user.id, &user.username).map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })?;

    info!("Registered user {} ({})", user.id, user.username);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access: tokens.access,
            refresh: tokens.refresh,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let user = run_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        error!("Stored hash for user {} is unreadable: {}", user.id, e);
        ApiError::Internal
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let tokens = state.tokens.issue_pair(user.id, &user.username).map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })?;

    Ok(Json(AuthResponse {
        access: tokens.access,
        refresh: tokens.refresh,
        user: user.into(),
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RefreshRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .tokens
        .verify(&req.refresh, TokenType::Refresh)
        .ok_or(ApiError::Unauthenticated)?;

    let access = state
        .tokens
        .issue(claims.sub, &claims.username, TokenType::Access)
        .map_err(|e| {
            error!("Token encoding failed: {}", e);
            ApiError::Internal
        })?;

    Ok(Json(RefreshResponse { access }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = run_db(&state, move |db| db.get_user_by_id(claims.sub))
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    Ok(Json(user.into()))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<Json<UserResponse>, ApiError> {
    let username = match req.username {
        Some(name) => {
            let name = name.trim().to_string();
            validate_username(&name)?;
            Some(name)
        }
        None => None,
    };
    let email = req.email.as_deref().map(normalize_email).transpose()?;
    let photo_url = req
        .photo_url
        .map(|url| Some(url.trim().to_string()).filter(|u| !u.is_empty()));

    let update = ProfileUpdate {
        username,
        email,
        photo_url,
    };
    let user = run_db(&state, move |db| db.update_profile(claims.sub, &update)).await?;
    Ok(Json(user.into()))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(ApiError::Validation("email: Enter a valid email address.".into()));
    }
    Ok(email)
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::Validation("username: This field may not be blank.".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::Validation(format!(
            "username: Ensure this field has no more than {MAX_USERNAME_LEN} characters."
        )));
    }
    Ok(())
}

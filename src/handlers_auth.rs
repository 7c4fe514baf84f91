use crate::app_state::AppState;
use crate::auth::{hash_password, issue_session, verify_password, AuthUser};
use crate::db::is_unique_violation;
use crate::error::{AppError, JsonBody};
use crate::models::*;
use crate::schema::*;
use crate::validation::{is_blank, is_valid_email};
use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let full_name = payload.full_name.trim().to_string();
    let email = payload.email.trim().to_string();

    if is_blank(&full_name) || is_blank(&payload.password) {
        return Err(AppError::BadRequest(
            "fullName, email and password are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    {
        let mut conn = state.db_pool.get()?;
        let existing: Option<User> = users::table
            .filter(users::email.eq(&email))
            .first(&mut conn)
            .optional()?;
        if existing.is_some() {
            tracing::warn!("Registration refused, {} already registered", email);
            return Err(AppError::BadRequest("User already exists".to_string()));
        }
    }

    let password_hash = hash_password(payload.password).await?;

    let (oid, id) = state.id_gen.next_pair("user")?;
    let new_user = NewUser {
        oid,
        id,
        full_name,
        email,
        password_hash,
    };

    let mut conn = state.db_pool.get()?;
    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::BadRequest("User already exists".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    let token = issue_session(&mut conn, &state, &user)?;
    tracing::info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let unable = || AppError::BadRequest("Unable to login".to_string());

    let user: User = users::table
        .filter(users::email.eq(payload.email.trim()))
        .first(&mut state.db_pool.get()?)
        .optional()?
        .ok_or_else(unable)?;

    if !verify_password(payload.password, user.password_hash.clone()).await {
        tracing::warn!("Failed login for {}", user.id);
        return Err(unable());
    }

    let mut conn = state.db_pool.get()?;
    let token = issue_session(&mut conn, &state, &user)?;
    tracing::info!("User {} logged in", user.id);

    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        token,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    let mut conn = state.db_pool.get()?;

    diesel::delete(
        user_tokens::table
            .filter(user_tokens::user_oid.eq(auth.user.oid))
            .filter(user_tokens::token.eq(&auth.token)),
    )
    .execute(&mut conn)?;

    tracing::info!("User {} logged out", auth.user.id);
    Ok(Json(MessageResponse::new("Logged out")))
}

pub async fn logout_all(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    let mut conn = state.db_pool.get()?;

    let removed = diesel::delete(user_tokens::table.filter(user_tokens::user_oid.eq(auth.user.oid)))
        .execute(&mut conn)?;

    tracing::info!("User {} logged out of {} sessions", auth.user.id, removed);
    Ok(Json(MessageResponse::new("All sessions logged out")))
}

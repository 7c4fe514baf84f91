//! Session tokens, password hashing and the bearer-token extractor.
//!
//! A token is valid only while its signature and expiry verify *and* it is
//! still stored against the user it names; logout removes the stored row.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::db::DbConnection;
use crate::error::AppError;
use crate::models::{NewUserToken, User};
use crate::schema::{user_tokens, users};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Public user id.
    pub sub: String,
    pub email: String,
    /// Public id of the stored token row; keeps tokens issued in the same
    /// second distinct.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    pub fn issue(
        &self,
        user: &User,
        jti: &str,
    ) -> Result<(String, NaiveDateTime), jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.ttl_secs);
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            jti: jti.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)?;
        Ok((token, expires_at.naive_utc()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

pub(crate) fn hash_password_blocking(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            AppError::InternalError
        })
}

pub(crate) fn verify_password_blocking(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Argon2 on the blocking pool; it takes long enough to stall an executor thread.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|e| {
            tracing::error!("Password hashing task failed: {}", e);
            AppError::InternalError
        })?
}

pub async fn verify_password(password: String, password_hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &password_hash))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Password check task failed: {}", e);
            false
        })
}

/// Signs a new token for `user` and stores it, dropping the user's expired
/// tokens on the way.
pub fn issue_session(
    conn: &mut DbConnection,
    state: &AppState,
    user: &User,
) -> Result<String, AppError> {
    let (token_oid, token_id) = state.id_gen.next_pair("token")?;
    let (token, expires_at) = state.tokens.issue(user, &token_id).map_err(|e| {
        tracing::error!("Token signing failed: {}", e);
        AppError::InternalError
    })?;

    let pruned = diesel::delete(
        user_tokens::table
            .filter(user_tokens::user_oid.eq(user.oid))
            .filter(user_tokens::expires_at.lt(Utc::now().naive_utc())),
    )
    .execute(conn)?;
    if pruned > 0 {
        tracing::debug!("Pruned {} expired tokens for {}", pruned, user.id);
    }

    diesel::insert_into(user_tokens::table)
        .values(NewUserToken {
            oid: token_oid,
            id: token_id,
            user_oid: user.oid,
            token: token.clone(),
            expires_at,
        })
        .execute(conn)?;

    Ok(token)
}

/// The authenticated caller and the bearer token it presented.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;

        let claims = state.tokens.verify(token).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized
        })?;

        let mut conn = state.db_pool.get()?;

        let user: Option<User> = users::table
            .inner_join(user_tokens::table)
            .filter(users::id.eq(&claims.sub))
            .filter(users::email.eq(&claims.email))
            .filter(user_tokens::token.eq(token))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        let user = user.ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            user,
            token: token.to_string(),
        })
    }
}

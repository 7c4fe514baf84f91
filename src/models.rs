use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(primary_key(oid))]
pub struct User {
    pub oid: i64,
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub oid: i64,
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::user_tokens)]
pub struct NewUserToken {
    pub oid: i64,
    pub id: String,
    pub user_oid: i64,
    pub token: String,
    pub expires_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = crate::schema::buckets)]
#[diesel(belongs_to(User, foreign_key = owner_oid))]
#[diesel(primary_key(oid))]
pub struct Bucket {
    pub oid: i64,
    pub id: String,
    pub owner_oid: i64,
    pub bucket_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::buckets)]
pub struct NewBucket {
    pub oid: i64,
    pub id: String,
    pub owner_oid: i64,
    pub bucket_name: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone)]
#[diesel(table_name = crate::schema::files)]
#[diesel(belongs_to(Bucket, foreign_key = bucket_oid))]
#[diesel(primary_key(oid))]
pub struct File {
    pub oid: i64,
    pub id: String,
    pub bucket_oid: i64,
    pub owner_oid: i64,
    pub filename: String,
    pub storage_key: String,
    pub mimetype: String,
    pub bytes: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::files)]
pub struct NewFile {
    pub oid: i64,
    pub id: String,
    pub bucket_oid: i64,
    pub owner_oid: i64,
    pub filename: String,
    pub storage_key: String,
    pub mimetype: String,
    pub bytes: i64,
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::files)]
pub struct UpdateFile {
    pub filename: String,
    pub storage_key: String,
    pub mimetype: String,
    pub bytes: i64,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub object: String,
    pub full_name: String,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            object: "user".to_string(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BucketResponse {
    pub id: String,
    pub object: String,
    pub bucket_name: String,
    pub owner: String,
    pub files: Vec<String>,
    pub created_at: i64,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    pub id: String,
    pub bucket_name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BucketFileEntry {
    pub id: String,
    pub filename: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BucketDetailResponse {
    pub id: String,
    pub bucket_name: String,
    pub files: Vec<BucketFileEntry>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: String,
    pub object: String,
    pub filename: String,
    pub path: String,
    pub mimetype: String,
    pub size: i64,
    pub bucket: String,
    pub owner: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileListItem {
    pub id: String,
    pub filename: String,
    pub bucket_id: String,
    pub bucket_name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketNameRequest {
    pub bucket_name: String,
}

/// Page/page-size pair taken from `/list/:page/:pageSize`.
///
/// Both segments are kept as raw strings so that garbage falls back to the
/// defaults instead of rejecting the request.
#[derive(Deserialize)]
pub struct PageParams {
    pub page: String,
    pub page_size: String,
}

impl PageParams {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    pub const MAX_PAGE_SIZE: i64 = 100;

    /// Returns `(offset, limit)`.
    pub fn offset_limit(&self) -> (i64, i64) {
        let page = self.page.trim().parse::<i64>().unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .trim()
            .parse::<i64>()
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE);
        ((page - 1).saturating_mul(page_size), page_size)
    }
}

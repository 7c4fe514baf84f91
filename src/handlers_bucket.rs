use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::db::is_unique_violation;
use crate::error::{AppError, JsonBody};
use crate::models::*;
use crate::schema::*;
use crate::storage::LocalStorage;
use crate::validation::{is_safe_bucket_name, BUCKET_NAME_RULES};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;

fn name_taken() -> AppError {
    AppError::Conflict("Bucket with the name already exists".to_string())
}

pub async fn add_bucket(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<BucketNameRequest>,
) -> Result<(StatusCode, Json<BucketResponse>), AppError> {
    let bucket_name = payload.bucket_name;
    if !is_safe_bucket_name(&bucket_name) {
        return Err(AppError::BadRequest(BUCKET_NAME_RULES.to_string()));
    }

    let mut conn = state.db_pool.get()?;

    let existing: Option<Bucket> = buckets::table
        .filter(buckets::bucket_name.eq(&bucket_name))
        .first(&mut conn)
        .optional()?;
    if existing.is_some() {
        tracing::warn!("Bucket name {} already in use", bucket_name);
        return Err(name_taken());
    }

    let (oid, id) = state.id_gen.next_pair("bucket")?;
    let bucket: Bucket = diesel::insert_into(buckets::table)
        .values(NewBucket {
            oid,
            id,
            owner_oid: auth.user.oid,
            bucket_name,
        })
        .get_result(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                name_taken()
            } else {
                AppError::from(e)
            }
        })?;

    if let Err(e) = state.storage.create_bucket(&bucket.bucket_name).await {
        tracing::error!(
            "Creating directory for bucket {} failed, removing row: {}",
            bucket.id,
            e
        );
        diesel::delete(buckets::table.find(bucket.oid)).execute(&mut conn)?;
        return Err(e.into());
    }

    tracing::info!("Created bucket {} ({})", bucket.bucket_name, bucket.id);

    Ok((
        StatusCode::CREATED,
        Json(BucketResponse {
            id: bucket.id,
            object: "bucket".to_string(),
            bucket_name: bucket.bucket_name,
            owner: auth.user.id,
            files: Vec::new(),
            created_at: bucket.created_at.and_utc().timestamp(),
        }),
    ))
}

pub async fn list_buckets(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(params): Path<PageParams>,
) -> Result<Json<Vec<BucketSummary>>, AppError> {
    let (offset, limit) = params.offset_limit();
    let mut conn = state.db_pool.get()?;

    let rows: Vec<(String, String)> = buckets::table
        .filter(buckets::owner_oid.eq(auth.user.oid))
        .order(buckets::oid.asc())
        .offset(offset)
        .limit(limit)
        .select((buckets::id, buckets::bucket_name))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(id, bucket_name)| BucketSummary { id, bucket_name })
            .collect(),
    ))
}

pub async fn get_bucket(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bucket_id): Path<String>,
) -> Result<Json<BucketDetailResponse>, AppError> {
    let mut conn = state.db_pool.get()?;

    let bucket: Bucket = buckets::table
        .filter(buckets::id.eq(&bucket_id))
        .filter(buckets::owner_oid.eq(auth.user.oid))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Bucket not found".to_string()))?;

    let files: Vec<(String, String)> = files::table
        .filter(files::bucket_oid.eq(bucket.oid))
        .order(files::oid.asc())
        .select((files::id, files::filename))
        .load(&mut conn)?;

    Ok(Json(BucketDetailResponse {
        id: bucket.id,
        bucket_name: bucket.bucket_name,
        files: files
            .into_iter()
            .map(|(id, filename)| BucketFileEntry { id, filename })
            .collect(),
    }))
}

pub async fn update_bucket_name(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bucket_id): Path<String>,
    JsonBody(payload): JsonBody<BucketNameRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let new_name = payload.bucket_name;
    if !is_safe_bucket_name(&new_name) {
        return Err(AppError::BadRequest(BUCKET_NAME_RULES.to_string()));
    }

    let mut conn = state.db_pool.get()?;

    let bucket: Bucket = buckets::table
        .filter(buckets::id.eq(&bucket_id))
        .filter(buckets::owner_oid.eq(auth.user.oid))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| {
            AppError::NotAcceptable(
                "Bucket not found or you do not have permission to update it".to_string(),
            )
        })?;

    let taken: Option<Bucket> = buckets::table
        .filter(buckets::bucket_name.eq(&new_name))
        .first(&mut conn)
        .optional()?;
    if taken.is_some() {
        return Err(name_taken());
    }

    state
        .storage
        .rename_bucket(&bucket.bucket_name, &new_name)
        .await?;

    let renamed = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::update(buckets::table.find(bucket.oid))
            .set((
                buckets::bucket_name.eq(&new_name),
                buckets::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        let bucket_files: Vec<(i64, String)> = files::table
            .filter(files::bucket_oid.eq(bucket.oid))
            .select((files::oid, files::filename))
            .load(conn)?;

        for (file_oid, filename) in bucket_files {
            diesel::update(files::table.find(file_oid))
                .set(files::storage_key.eq(LocalStorage::storage_key(&new_name, &filename)))
                .execute(conn)?;
        }
        Ok(())
    });

    if let Err(e) = renamed {
        tracing::error!(
            "Renaming bucket {} in the database failed, restoring directory: {}",
            bucket.id,
            e
        );
        if let Err(restore) = state
            .storage
            .rename_bucket(&new_name, &bucket.bucket_name)
            .await
        {
            tracing::error!(
                "Restoring directory {} -> {} failed: {}",
                new_name,
                bucket.bucket_name,
                restore
            );
        }
        return Err(if is_unique_violation(&e) {
            name_taken()
        } else {
            AppError::from(e)
        });
    }

    tracing::info!(
        "Renamed bucket {} from {} to {}",
        bucket.id,
        bucket.bucket_name,
        new_name
    );
    Ok(Json(MessageResponse::new("Bucket name updated successfully")))
}

pub async fn delete_bucket(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bucket_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut conn = state.db_pool.get()?;

    let bucket: Bucket = buckets::table
        .filter(buckets::id.eq(&bucket_id))
        .filter(buckets::owner_oid.eq(auth.user.oid))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| {
            AppError::Conflict(
                "Bucket does not exist or you do not have permission to delete it".to_string(),
            )
        })?;

    let removed_files = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let removed =
            diesel::delete(files::table.filter(files::bucket_oid.eq(bucket.oid))).execute(conn)?;
        diesel::delete(buckets::table.find(bucket.oid)).execute(conn)?;
        Ok(removed)
    })?;

    state.storage.remove_bucket(&bucket.bucket_name).await?;

    tracing::info!(
        "Deleted bucket {} ({}) with {} files",
        bucket.bucket_name,
        bucket.id,
        removed_files
    );
    Ok(Json(MessageResponse::new("Bucket deleted successfully")))
}

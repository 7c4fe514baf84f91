use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::is_unique_violation;
use crate::error::AppError;
use crate::models::*;
use crate::schema::*;
use crate::storage::StorageError;
use crate::validation::{is_safe_file_name, FILE_NAME_RULES};
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use diesel::prelude::*;
use tokio_util::io::ReaderStream;

/// A validated `file` part from a multipart body.
struct Upload {
    filename: String,
    mimetype: String,
    data: Bytes,
}

async fn read_upload(mut multipart: Multipart, config: &Config) -> Result<Upload, AppError> {
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::BadRequest("Missing filename".to_string()))?;

        if !is_safe_file_name(&filename) {
            return Err(AppError::BadRequest(FILE_NAME_RULES.to_string()));
        }

        let mimetype = match field.content_type() {
            Some(ct) if !ct.trim().is_empty() => ct
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase(),
            _ => mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        let data = field.bytes().await?;

        if data.len() > config.max_file_size_bytes {
            return Err(AppError::BadRequest(format!(
                "File size exceeds the limit of {} bytes",
                config.max_file_size_bytes
            )));
        }

        if !config.is_allowed_mime_type(&mimetype) {
            return Err(AppError::BadRequest(format!(
                "File type {} is not allowed, expected one of: {}",
                mimetype,
                config.allowed_mime_types.join(", ")
            )));
        }

        upload = Some(Upload {
            filename,
            mimetype,
            data,
        });
    }

    upload.ok_or_else(|| AppError::BadRequest("Missing file".to_string()))
}

/// Looks up a file the caller owns inside the bucket with public id `bucket_id`.
fn find_owned_file(
    conn: &mut SqliteConnection,
    owner_oid: i64,
    bucket_id: &str,
    file_id: &str,
) -> Result<(File, Bucket), AppError> {
    files::table
        .inner_join(buckets::table)
        .filter(files::id.eq(file_id))
        .filter(files::owner_oid.eq(owner_oid))
        .filter(buckets::id.eq(bucket_id))
        .select((File::as_select(), Bucket::as_select()))
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))
}

fn file_response(file: File, bucket_id: String, owner_id: String) -> FileResponse {
    FileResponse {
        id: file.id,
        object: "file".to_string(),
        filename: file.filename,
        path: file.storage_key,
        mimetype: file.mimetype,
        size: file.bytes,
        bucket: bucket_id,
        owner: owner_id,
        created_at: file.created_at.and_utc().timestamp(),
        updated_at: file.updated_at.and_utc().timestamp(),
    }
}

fn already_in_bucket() -> AppError {
    AppError::Conflict("File already exists in the bucket".to_string())
}

fn find_owned_bucket(
    conn: &mut SqliteConnection,
    owner_oid: i64,
    bucket_id: &str,
) -> Result<Bucket, AppError> {
    buckets::table
        .filter(buckets::id.eq(bucket_id))
        .filter(buckets::owner_oid.eq(owner_oid))
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Bucket not found or unauthorized".to_string()))
}

pub async fn upload_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(bucket_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    // no pooled connection may be held while the body streams in
    find_owned_bucket(&mut *state.db_pool.get()?, auth.user.oid, &bucket_id)?;

    let upload = read_upload(multipart, &state.config).await?;

    let mut conn = state.db_pool.get()?;
    let bucket = find_owned_bucket(&mut conn, auth.user.oid, &bucket_id)?;

    let duplicate: Option<File> = files::table
        .filter(files::bucket_oid.eq(bucket.oid))
        .filter(files::filename.eq(&upload.filename))
        .first(&mut conn)
        .optional()?;
    if duplicate.is_some() {
        tracing::warn!(
            "Upload refused, {} already exists in bucket {}",
            upload.filename,
            bucket.id
        );
        return Err(already_in_bucket());
    }

    let size = upload.data.len() as i64;
    let storage_key = match state
        .storage
        .create(&bucket.bucket_name, &upload.filename, upload.data)
        .await
    {
        Ok(key) => key,
        Err(StorageError::AlreadyExists(key)) => {
            tracing::warn!("Upload refused, {} is already on disk", key);
            return Err(already_in_bucket());
        }
        Err(e) => return Err(e.into()),
    };

    let (oid, id) = state.id_gen.next_pair("file")?;
    let inserted = diesel::insert_into(files::table)
        .values(NewFile {
            oid,
            id,
            bucket_oid: bucket.oid,
            owner_oid: auth.user.oid,
            filename: upload.filename,
            storage_key: storage_key.clone(),
            mimetype: upload.mimetype,
            bytes: size,
        })
        .get_result::<File>(&mut conn);

    let file = match inserted {
        Ok(file) => file,
        Err(e) => {
            // the bytes were created exclusively above, so they are ours to drop
            if let Err(cleanup) = state.storage.remove(&storage_key).await {
                tracing::error!("Removing orphaned {} failed: {}", storage_key, cleanup);
            }
            return Err(if is_unique_violation(&e) {
                already_in_bucket()
            } else {
                e.into()
            });
        }
    };

    tracing::info!(
        "Uploaded {} ({} bytes) to bucket {}",
        file.id,
        file.bytes,
        bucket.id
    );

    Ok((
        StatusCode::CREATED,
        Json(file_response(file, bucket.id, auth.user.id)),
    ))
}

pub async fn list_files(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(params): Path<PageParams>,
) -> Result<Json<Vec<FileListItem>>, AppError> {
    let (offset, limit) = params.offset_limit();
    let mut conn = state.db_pool.get()?;

    let rows: Vec<(String, String, String, String)> = files::table
        .inner_join(buckets::table)
        .filter(files::owner_oid.eq(auth.user.oid))
        .order(files::oid.asc())
        .offset(offset)
        .limit(limit)
        .select((files::id, files::filename, buckets::id, buckets::bucket_name))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(id, filename, bucket_id, bucket_name)| FileListItem {
                id,
                filename,
                bucket_id,
                bucket_name,
            })
            .collect(),
    ))
}

pub async fn get_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let mut conn = state.db_pool.get()?;

    let file: File = files::table
        .filter(files::id.eq(&file_id))
        .filter(files::owner_oid.eq(auth.user.oid))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let handle = state.storage.open(&file.storage_key).await.map_err(|e| {
        tracing::warn!("File {} has no bytes at {}: {}", file.id, file.storage_key, e);
        AppError::from(e)
    })?;

    let body = Body::from_stream(ReaderStream::new(handle));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.mimetype),
            (header::CONTENT_LENGTH, file.bytes.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file.filename),
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn update_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((bucket_id, file_id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    find_owned_file(&mut *state.db_pool.get()?, auth.user.oid, &bucket_id, &file_id)?;

    let upload = read_upload(multipart, &state.config).await?;

    // reloaded: the file or its bucket may have changed while the body streamed in
    let mut conn = state.db_pool.get()?;
    let (file, bucket) = find_owned_file(&mut conn, auth.user.oid, &bucket_id, &file_id)?;

    let clash: Option<File> = files::table
        .filter(files::bucket_oid.eq(bucket.oid))
        .filter(files::filename.eq(&upload.filename))
        .filter(files::oid.ne(file.oid))
        .first(&mut conn)
        .optional()?;
    if clash.is_some() {
        return Err(AppError::Conflict(
            "Same file already exists under different id".to_string(),
        ));
    }

    if file.filename != upload.filename {
        state.storage.remove(&file.storage_key).await?;
    }

    let size = upload.data.len() as i64;
    let storage_key = state
        .storage
        .write(&bucket.bucket_name, &upload.filename, upload.data)
        .await?;

    let update = UpdateFile {
        filename: upload.filename,
        storage_key,
        mimetype: upload.mimetype,
        bytes: size,
        updated_at: Utc::now().naive_utc(),
    };

    diesel::update(files::table.find(file.oid))
        .set(&update)
        .execute(&mut conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Same file already exists under different id".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    tracing::info!("Updated file {} in bucket {}", file.id, bucket.id);
    Ok(Json(MessageResponse::new("File updated successfully")))
}

pub async fn delete_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((bucket_id, file_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut conn = state.db_pool.get()?;

    let (file, bucket) = find_owned_file(&mut conn, auth.user.oid, &bucket_id, &file_id)?;

    diesel::delete(files::table.find(file.oid)).execute(&mut conn)?;
    state.storage.remove(&file.storage_key).await?;

    tracing::info!("Deleted file {} from bucket {}", file.id, bucket.id);
    Ok(Json(MessageResponse::new("File deleted successfully")))
}

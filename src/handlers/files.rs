// src/handlers/files.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        Visibility,
        document::Document,
        file::{File, FilePayload, UpdateFileRequest},
    },
    utils::{jwt::Claims, ownership},
};

use super::{
    cards::{ImageUpload, insert_document, read_image_field},
    directories::fetch_directory,
    modules::{delete_documents, refresh_module_counts},
};

/// Lists all files visible to the requester.
pub async fn list_files(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let files = sqlx::query_as::<_, File>(
        r#"
        SELECT * FROM files
        WHERE visibility = 'PUBLIC' OR EXISTS (
            SELECT 1 FROM module_owners mo
            WHERE mo.module_id = files.module_id AND mo.user_id = ?
        )
        ORDER BY id
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(files))
}

/// Serves a stored document under its stored content type.
pub async fn get_document(
    State(pool): State<SqlitePool>,
    Path(document_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let document = sqlx::query_as::<_, Document>(
        "SELECT id, data, file_type FROM documents WHERE id = ?",
    )
    .bind(document_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound(format!(
        "Document with ID {} does not exist.",
        document_id
    )))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, document.file_type.content_type())],
        document.data,
    ))
}

/// Uploads a file into a directory: a `file` JSON part with the metadata and
/// a `content` part with the payload. The payload is stored as a document
/// and the module's file count recomputed.
pub async fn create_file(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (payload, upload, upload_name) = parse_file_multipart(multipart).await?;

    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid file fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let upload = upload.ok_or(AppError::BadRequest(
        "Multipart request is missing the 'content' part.".to_string(),
    ))?;

    let directory = fetch_directory(&pool, payload.directory_id.unwrap_or_default()).await?;

    let requesting_user_id = claims.user_id();
    let is_owner =
        ownership::is_module_owner(&pool, directory.module_id, requesting_user_id).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to create the file.".to_string(),
        ));
    }

    // An empty name falls back to the uploaded part's file name.
    let name = match payload.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => upload_name.unwrap_or_else(|| "untitled".to_string()),
    };

    let mut tx = pool.begin().await?;

    let document_id = insert_document(&mut tx, &upload).await?;

    let file = sqlx::query_as::<_, File>(
        r#"
        INSERT INTO files
            (name, visibility, file_type, creator_id, module_id, directory_id, document_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(payload.visibility.unwrap_or(Visibility::Private))
    .bind(upload.file_type)
    .bind(requesting_user_id)
    .bind(directory.module_id)
    .bind(directory.id)
    .bind(document_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    refresh_module_counts(&mut tx, directory.module_id).await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(file)))
}

/// Updates a file's name and visibility. Owner only.
pub async fn update_file(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<i64>,
    Json(payload): Json<UpdateFileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let body_id = payload.id.ok_or(AppError::BadRequest(
        "No 'id' is present in the File object.".to_string(),
    ))?;

    if body_id != file_id {
        return Err(AppError::BadRequest(
            "The fileId in the path variable does not match the id in the request body."
                .to_string(),
        ));
    }

    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid file fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let existing = fetch_file(&pool, file_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, existing.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to update this file.".to_string(),
        ));
    }

    let file = sqlx::query_as::<_, File>(
        r#"
        UPDATE files SET name = ?, visibility = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.visibility.unwrap_or(Visibility::Private))
    .bind(file_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(file))
}

/// Deletes a file and its stored document, recomputing the module's file
/// count.
pub async fn delete_file(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(file_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let file = fetch_file(&pool, file_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, file.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this file.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM files WHERE id = ?")
        .bind(file_id)
        .execute(&mut *tx)
        .await?;

    let mut document_ids = Vec::new();
    document_ids.extend(file.document_id);
    delete_documents(&mut tx, &document_ids).await?;

    refresh_module_counts(&mut tx, file.module_id).await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_file(pool: &SqlitePool, file_id: i64) -> Result<File, AppError> {
    sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = ?")
        .bind(file_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(format!(
            "File with ID {} does not exist.",
            file_id
        )))
}

/// Splits the upload into the metadata JSON, the payload and the payload's
/// original file name.
async fn parse_file_multipart(
    mut multipart: Multipart,
) -> Result<(FilePayload, Option<ImageUpload>, Option<String>), AppError> {
    let mut payload: Option<FilePayload> = None;
    let mut upload = None;
    let mut upload_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                payload = Some(serde_json::from_str(&text)?);
            }
            Some("content") => {
                upload_name = field.file_name().map(str::to_string);
                upload = Some(read_image_field(field).await?);
            }
            _ => {}
        }
    }

    let payload = payload.ok_or(AppError::BadRequest(
        "Multipart request is missing the 'file' part.".to_string(),
    ))?;

    Ok((payload, upload, upload_name))
}

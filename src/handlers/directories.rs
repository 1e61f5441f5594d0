// src/handlers/directories.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        Visibility,
        directory::{
            CreateDirectoryRequest, Directory, DirectoryContent, UpdateDirectoryRequest,
        },
        file::File,
    },
    utils::{jwt::Claims, ownership, policy},
};

use super::modules::{delete_documents, refresh_module_counts};

/// Lists all directories visible to the requester.
pub async fn list_directories(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let directories = sqlx::query_as::<_, Directory>(
        r#"
        SELECT * FROM directories
        WHERE visibility = 'PUBLIC' OR EXISTS (
            SELECT 1 FROM module_owners mo
            WHERE mo.module_id = directories.module_id AND mo.user_id = ?
        )
        ORDER BY id
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(directories))
}

/// Fetches a single directory. Public directories are readable by anyone,
/// private ones only by the owners of the enclosing module.
pub async fn get_directory(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(directory_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let directory = fetch_directory(&pool, directory_id).await?;

    let owner_ids = ownership::module_owner_ids(&pool, directory.module_id).await?;
    if !policy::can_read(claims.user_id(), directory.visibility, &owner_ids) {
        return Err(AppError::Forbidden(
            "You do not have permission to access this directory.".to_string(),
        ));
    }

    Ok(Json(directory))
}

/// Lists a directory's content.
///
/// Owners get the immediate subdirectories and files unfiltered. For anyone
/// else a public directory exposes its public immediate subdirectories plus
/// the public files of those subdirectories; the filter is deliberately one
/// level deep and does not descend further.
pub async fn directory_content(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(directory_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let directory = fetch_directory(&pool, directory_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, directory.module_id, claims.user_id()).await?;

    if is_owner {
        let sub_directories = sqlx::query_as::<_, Directory>(
            "SELECT * FROM directories WHERE parent_id = ? ORDER BY id",
        )
        .bind(directory_id)
        .fetch_all(&pool)
        .await?;

        let files = sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE directory_id = ? ORDER BY id",
        )
        .bind(directory_id)
        .fetch_all(&pool)
        .await?;

        return Ok(Json(DirectoryContent {
            sub_directories,
            files,
        }));
    }

    if directory.visibility == Visibility::Public {
        let sub_directories = sqlx::query_as::<_, Directory>(
            "SELECT * FROM directories WHERE parent_id = ? AND visibility = 'PUBLIC' ORDER BY id",
        )
        .bind(directory_id)
        .fetch_all(&pool)
        .await?;

        // Public files of the immediate subdirectories, including the
        // private ones. The directory's own files are not listed here.
        let files = sqlx::query_as::<_, File>(
            r#"
            SELECT f.* FROM files f
            JOIN directories d ON d.id = f.directory_id
            WHERE d.parent_id = ? AND f.visibility = 'PUBLIC'
            ORDER BY f.id
            "#,
        )
        .bind(directory_id)
        .fetch_all(&pool)
        .await?;

        return Ok(Json(DirectoryContent {
            sub_directories,
            files,
        }));
    }

    Err(AppError::Forbidden(
        "You do not have permission to access this directory.".to_string(),
    ))
}

/// Creates a directory beneath an existing parent. The owning module is the
/// parent's module; the requester must own it.
pub async fn create_directory(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateDirectoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid directory fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let parent = fetch_directory(&pool, payload.parent_id.unwrap_or_default()).await?;

    let is_owner =
        ownership::is_module_owner(&pool, parent.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to create this directory.".to_string(),
        ));
    }

    let directory = sqlx::query_as::<_, Directory>(
        r#"
        INSERT INTO directories (name, visibility, creator_id, parent_id, module_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.visibility.unwrap_or(Visibility::Private))
    .bind(claims.user_id())
    .bind(parent.id)
    .bind(parent.module_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(directory)))
}

/// Updates a directory's name and visibility. Owner only.
pub async fn update_directory(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(directory_id): Path<i64>,
    Json(payload): Json<UpdateDirectoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let body_id = payload.id.ok_or(AppError::BadRequest(
        "No 'id' is present in the Directory object.".to_string(),
    ))?;

    if body_id != directory_id {
        return Err(AppError::BadRequest(
            "The directoryId in the path variable does not match the id in the request body."
                .to_string(),
        ));
    }

    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid directory fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let existing = fetch_directory(&pool, directory_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, existing.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to update this directory.".to_string(),
        ));
    }

    let directory = sqlx::query_as::<_, Directory>(
        r#"
        UPDATE directories SET name = ?, visibility = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.visibility.unwrap_or(Visibility::Private))
    .bind(directory_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(directory))
}

/// Deletes a directory subtree. Every document referenced by a file anywhere
/// under the directory is deleted, the rows cascade, and the module's file
/// count is recomputed. Root directories only go together with their module.
pub async fn delete_directory(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(directory_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let directory = fetch_directory(&pool, directory_id).await?;

    if directory.parent_id.is_none() {
        return Err(AppError::BadRequest(
            "The root directory of a module cannot be deleted on its own.".to_string(),
        ));
    }

    let is_owner =
        ownership::is_module_owner(&pool, directory.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this directory.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    // Documents referenced anywhere in the subtree, root included.
    let document_ids: Vec<(i64,)> = sqlx::query_as(
        r#"
        WITH RECURSIVE subtree (id) AS (
            SELECT id FROM directories WHERE id = ?
            UNION ALL
            SELECT d.id FROM directories d JOIN subtree s ON d.parent_id = s.id
        )
        SELECT f.document_id FROM files f
        JOIN subtree s ON s.id = f.directory_id
        WHERE f.document_id IS NOT NULL
        "#,
    )
    .bind(directory_id)
    .fetch_all(&mut *tx)
    .await?;

    let document_ids: Vec<i64> = document_ids.into_iter().map(|(id,)| id).collect();
    delete_documents(&mut tx, &document_ids).await?;

    // Children and files cascade with the row.
    sqlx::query("DELETE FROM directories WHERE id = ?")
        .bind(directory_id)
        .execute(&mut *tx)
        .await?;

    refresh_module_counts(&mut tx, directory.module_id).await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_directory(
    pool: &SqlitePool,
    directory_id: i64,
) -> Result<Directory, AppError> {
    sqlx::query_as::<_, Directory>("SELECT * FROM directories WHERE id = ?")
        .bind(directory_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(format!(
            "Directory with ID {} does not exist.",
            directory_id
        )))
}

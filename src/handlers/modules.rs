// src/handlers/modules.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        Visibility,
        card_set::CardSet,
        module::{CreateModuleRequest, Module, UpdateModuleRequest, score_of_module},
    },
    utils::{html::clean_html, jwt::Claims, ownership, policy},
};

/// Lists all modules visible to the requester.
pub async fn list_modules(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let modules = sqlx::query_as::<_, Module>(
        r#"
        SELECT * FROM modules
        WHERE visibility = 'PUBLIC' OR EXISTS (
            SELECT 1 FROM module_owners mo
            WHERE mo.module_id = modules.id AND mo.user_id = ?
        )
        ORDER BY id
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(modules))
}

/// Fetches a single module under the public-or-owner rule.
pub async fn get_module(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let module = fetch_module(&pool, module_id).await?;

    let owner_ids = ownership::module_owner_ids(&pool, module_id).await?;
    if !policy::can_read(claims.user_id(), module.visibility, &owner_ids) {
        return Err(AppError::Forbidden(
            "You do not have permission to access this module.".to_string(),
        ));
    }

    Ok(Json(module))
}

/// Lists a module's card sets. Owners see all of them; a public module
/// exposes only its public sets to other users; a private module denies
/// non-owners.
pub async fn card_sets_of_module(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let module = fetch_module(&pool, module_id).await?;
    let requesting_user_id = claims.user_id();

    let is_owner = ownership::is_module_owner(&pool, module_id, requesting_user_id).await?;

    let card_sets = if is_owner {
        sqlx::query_as::<_, CardSet>(
            "SELECT * FROM card_sets WHERE module_id = ? ORDER BY id",
        )
        .bind(module_id)
        .fetch_all(&pool)
        .await?
    } else if module.visibility == Visibility::Public {
        sqlx::query_as::<_, CardSet>(
            "SELECT * FROM card_sets WHERE module_id = ? AND visibility = 'PUBLIC' ORDER BY id",
        )
        .bind(module_id)
        .fetch_all(&pool)
        .await?
    } else {
        return Err(AppError::Forbidden(
            "You do not have permission to access cardsets for this module.".to_string(),
        ));
    };

    Ok(Json(card_sets))
}

/// Creates a module together with its root directory. The requester must be
/// among the listed owners; every owner is registered on the module.
pub async fn create_module(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid module fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let requesting_user_id = claims.user_id();
    let owner_ids = payload.owner_ids.clone().unwrap_or_default();

    if !policy::is_owner(requesting_user_id, &owner_ids) {
        return Err(AppError::Forbidden(
            "You do not have permission to create this module.".to_string(),
        ));
    }

    let known_owners: Vec<(i64,)> = {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id FROM users WHERE id IN (");
        let mut separated = builder.separated(",");
        for id in &owner_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        builder.build_query_as().fetch_all(&pool).await?
    };
    if known_owners.len() != owner_ids.len() {
        return Err(AppError::BadRequest(
            "One or more owner ids do not exist.".to_string(),
        ));
    }

    let name = payload.name.clone().unwrap_or_default();
    let visibility = payload.visibility.unwrap_or(Visibility::Private);
    let description = clean_html(payload.description.as_deref().unwrap_or_default());
    let score = payload.score.unwrap_or(0).clamp(0, 100);
    let root = payload.root_directory.as_ref();
    let root_name = root
        .and_then(|r| r.name.clone())
        .unwrap_or_else(|| name.clone());
    let root_visibility = root.and_then(|r| r.visibility).unwrap_or(visibility);
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let (module_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO modules (name, description, visibility, score, creator_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&name)
    .bind(&description)
    .bind(visibility)
    .bind(score)
    .bind(requesting_user_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let (root_directory_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO directories (name, visibility, creator_id, parent_id, module_id, created_at)
        VALUES (?, ?, ?, NULL, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&root_name)
    .bind(root_visibility)
    .bind(requesting_user_id)
    .bind(module_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE modules SET root_directory_id = ? WHERE id = ?")
        .bind(root_directory_id)
        .bind(module_id)
        .execute(&mut *tx)
        .await?;

    for owner_id in &owner_ids {
        sqlx::query("INSERT INTO module_owners (module_id, user_id) VALUES (?, ?)")
            .bind(module_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let module = fetch_module(&pool, module_id).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

/// Updates a module's name, visibility and description. Owner only.
pub async fn update_module(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<i64>,
    Json(payload): Json<UpdateModuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let body_id = payload.id.ok_or(AppError::BadRequest(
        "No 'id' is present in the Module object.".to_string(),
    ))?;

    if body_id != module_id {
        return Err(AppError::BadRequest(
            "The moduleId in the path variable does not match the id in the request body."
                .to_string(),
        ));
    }

    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid module fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    fetch_module(&pool, module_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to update this module.".to_string(),
        ));
    }

    let description = clean_html(payload.description.as_deref().unwrap_or_default());

    let module = sqlx::query_as::<_, Module>(
        r#"
        UPDATE modules SET name = ?, visibility = ?, description = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.visibility.unwrap_or(Visibility::Private))
    .bind(&description)
    .bind(module_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(module))
}

/// Deletes a module and everything beneath it: documents, directory tree,
/// card sets with their cards, ownership links and quiz history. Verifies
/// afterwards that the row is really gone.
pub async fn delete_module(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    fetch_module(&pool, module_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this module.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    // Documents referenced by the module's files.
    let file_docs: Vec<(i64,)> = sqlx::query_as(
        "SELECT document_id FROM files WHERE module_id = ? AND document_id IS NOT NULL",
    )
    .bind(module_id)
    .fetch_all(&mut *tx)
    .await?;

    // Documents referenced by the cards of the module's card sets.
    let card_docs: Vec<(Option<i64>, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT c.question_document_id, c.answer_document_id
        FROM cards c
        JOIN card_sets cs ON cs.id = c.card_set_id
        WHERE cs.module_id = ?
        "#,
    )
    .bind(module_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut document_ids: Vec<i64> = file_docs.into_iter().map(|(id,)| id).collect();
    for (question_doc, answer_doc) in card_docs {
        document_ids.extend(question_doc);
        document_ids.extend(answer_doc);
    }

    delete_documents(&mut tx, &document_ids).await?;

    // The module row cascades to module_owners, directories (and their
    // files), card_sets (and their cards and last_quizzed entries).
    sqlx::query("DELETE FROM modules WHERE id = ?")
        .bind(module_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let should_be_empty: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM modules WHERE id = ?")
            .bind(module_id)
            .fetch_optional(&pool)
            .await?;
    if should_be_empty.is_some() {
        return Err(AppError::IntegrityFailure(
            "Module could not be deleted from the database.".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_module(pool: &SqlitePool, module_id: i64) -> Result<Module, AppError> {
    sqlx::query_as::<_, Module>("SELECT * FROM modules WHERE id = ?")
        .bind(module_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(format!(
            "Module with ID {} does not exist.",
            module_id
        )))
}

/// Recomputes a module's score from the card sets that contain at least one
/// card. Runs inside the mutating transaction.
pub(crate) async fn refresh_module_score(
    conn: &mut SqliteConnection,
    module_id: i64,
) -> Result<(), AppError> {
    let scores: Vec<(i64,)> = sqlx::query_as(
        "SELECT score FROM card_sets WHERE module_id = ? AND card_count > 0",
    )
    .bind(module_id)
    .fetch_all(&mut *conn)
    .await?;

    let scores: Vec<i64> = scores.into_iter().map(|(s,)| s).collect();
    let score = score_of_module(&scores);

    sqlx::query("UPDATE modules SET score = ? WHERE id = ?")
        .bind(score)
        .bind(module_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Recomputes a module's denormalized card-set and file counters from the
/// live rows. Runs inside the mutating transaction.
pub(crate) async fn refresh_module_counts(
    conn: &mut SqliteConnection,
    module_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE modules SET
            card_set_count = (SELECT COUNT(*) FROM card_sets WHERE module_id = modules.id),
            file_count = (SELECT COUNT(*) FROM files WHERE module_id = modules.id)
        WHERE id = ?
        "#,
    )
    .bind(module_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Deletes a batch of documents. Absent ids are a no-op.
pub(crate) async fn delete_documents(
    conn: &mut SqliteConnection,
    document_ids: &[i64],
) -> Result<(), AppError> {
    if document_ids.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM documents WHERE id IN (");
    let mut separated = builder.separated(",");
    for id in document_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");
    builder.build().execute(conn).await?;

    Ok(())
}

// src/handlers/card_sets.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        Visibility,
        card::{Card, CardRow, Status},
        card_set::{CardSet, CreateCardSetRequest, UpdateCardSetRequest, score_of_card_set},
    },
    utils::{jwt::Claims, ownership, policy},
};

use super::modules::{
    delete_documents, fetch_module, refresh_module_counts, refresh_module_score,
};

/// Lists all card sets visible to the requester.
pub async fn list_card_sets(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let card_sets = sqlx::query_as::<_, CardSet>(
        r#"
        SELECT * FROM card_sets
        WHERE visibility = 'PUBLIC' OR EXISTS (
            SELECT 1 FROM module_owners mo
            WHERE mo.module_id = card_sets.module_id AND mo.user_id = ?
        )
        ORDER BY id
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(card_sets))
}

/// Fetches a single card set under the public-or-owner rule.
pub async fn get_card_set(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(card_set_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let card_set = fetch_card_set(&pool, card_set_id).await?;

    let owner_ids = ownership::module_owner_ids(&pool, card_set.module_id).await?;
    if !policy::can_read(claims.user_id(), card_set.visibility, &owner_ids) {
        return Err(AppError::Forbidden(
            "You do not have permission to access this cardset.".to_string(),
        ));
    }

    Ok(Json(card_set))
}

/// Lists the cards of a card set under the public-or-owner rule.
pub async fn cards_of_card_set(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(card_set_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let card_set = fetch_card_set(&pool, card_set_id).await?;

    let owner_ids = ownership::module_owner_ids(&pool, card_set.module_id).await?;
    if !policy::can_read(claims.user_id(), card_set.visibility, &owner_ids) {
        return Err(AppError::Forbidden(
            "You do not have permission to access cardsets for this module.".to_string(),
        ));
    }

    let rows = sqlx::query_as::<_, CardRow>(
        "SELECT * FROM cards WHERE card_set_id = ? ORDER BY id",
    )
    .bind(card_set_id)
    .fetch_all(&pool)
    .await?;

    let cards: Vec<Card> = rows.into_iter().map(Card::from).collect();
    Ok(Json(cards))
}

/// Creates a card set in a module owned by the requester. A fresh set starts
/// without cards, so its stored score and card count are zero regardless of
/// the submitted values.
pub async fn create_card_set(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCardSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid cardset fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let module_id = payload.module_id.unwrap_or_default();
    let requesting_user_id = claims.user_id();

    fetch_module(&pool, module_id).await?;

    let is_owner = ownership::is_module_owner(&pool, module_id, requesting_user_id).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to create the cardset for this module.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let (card_set_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO card_sets (name, visibility, score, card_count, module_id, creator_id, created_at)
        VALUES (?, ?, 0, 0, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.visibility.unwrap_or(Visibility::Private))
    .bind(module_id)
    .bind(requesting_user_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    refresh_module_counts(&mut tx, module_id).await?;

    tx.commit().await?;

    let card_set = fetch_card_set(&pool, card_set_id).await?;
    Ok((StatusCode::CREATED, Json(card_set)))
}

/// Deep-copies a card set into another module owned by the requester.
///
/// The copy starts over: private, score zero, every card reset to UNDONE and
/// unflagged, and attached images duplicated into fresh document rows so the
/// copy never shares bytes with the original.
pub async fn copy_card_set(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path((card_set_id, module_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let requesting_user_id = claims.user_id();

    let source = fetch_card_set(&pool, card_set_id).await?;
    let source_owner_ids = ownership::module_owner_ids(&pool, source.module_id).await?;
    if !policy::can_read(requesting_user_id, source.visibility, &source_owner_ids) {
        return Err(AppError::Forbidden(
            "No permission due to no ownership and private visibility.".to_string(),
        ));
    }

    let target_module = fetch_module(&pool, module_id).await?;
    let is_owner = ownership::is_module_owner(&pool, module_id, requesting_user_id).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "No permission due to no ownership.".to_string(),
        ));
    }

    let source_cards = sqlx::query_as::<_, CardRow>(
        "SELECT * FROM cards WHERE card_set_id = ? ORDER BY id",
    )
    .bind(card_set_id)
    .fetch_all(&pool)
    .await?;

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let (copy_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO card_sets
            (name, visibility, score, card_count, module_id, creator_id, origin_card_set_id, created_at)
        VALUES (?, 'PRIVATE', 0, 0, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(format!("(COPY) {}", source.name))
    .bind(module_id)
    .bind(target_module.creator_id)
    .bind(card_set_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    for card in &source_cards {
        let question_doc = copy_document(&mut tx, card.question_document_id).await?;
        let answer_doc = copy_document(&mut tx, card.answer_document_id).await?;

        sqlx::query(
            r#"
            INSERT INTO cards
                (card_set_id, question_text, question_document_id,
                 answer_text, answer_document_id, wrong_answers,
                 status, flagged, creator_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'UNDONE', FALSE, ?, ?)
            "#,
        )
        .bind(copy_id)
        .bind(&card.question_text)
        .bind(question_doc)
        .bind(&card.answer_text)
        .bind(answer_doc)
        .bind(serde_json::to_string(&card.wrong_answers.0)?)
        .bind(target_module.creator_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    refresh_card_set_score(&mut tx, copy_id).await?;
    refresh_module_counts(&mut tx, module_id).await?;
    refresh_module_score(&mut tx, module_id).await?;

    tx.commit().await?;

    let copy = fetch_card_set(&pool, copy_id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// Updates a card set's name and visibility. Owner only.
pub async fn update_card_set(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(card_set_id): Path<i64>,
    Json(payload): Json<UpdateCardSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid cardset fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let body_id = payload.id.ok_or(AppError::BadRequest(
        "No 'id' is present in the CardSet object.".to_string(),
    ))?;

    if body_id != card_set_id {
        return Err(AppError::BadRequest(
            "The cardSetId in the path variable does not match the id in the request body."
                .to_string(),
        ));
    }

    let existing = fetch_card_set(&pool, card_set_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, existing.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to update this cardset.".to_string(),
        ));
    }

    let card_set = sqlx::query_as::<_, CardSet>(
        r#"
        UPDATE card_sets SET name = ?, visibility = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.visibility.unwrap_or(Visibility::Private))
    .bind(card_set_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(card_set))
}

/// Deletes a card set, its cards and their attached documents, then verifies
/// the row is gone.
pub async fn delete_card_set(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(card_set_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let card_set = fetch_card_set(&pool, card_set_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, card_set.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this cardset.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let card_docs: Vec<(Option<i64>, Option<i64>)> = sqlx::query_as(
        "SELECT question_document_id, answer_document_id FROM cards WHERE card_set_id = ?",
    )
    .bind(card_set_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut document_ids = Vec::new();
    for (question_doc, answer_doc) in card_docs {
        document_ids.extend(question_doc);
        document_ids.extend(answer_doc);
    }
    delete_documents(&mut tx, &document_ids).await?;

    // Cards and last-quizzed entries cascade with the set.
    sqlx::query("DELETE FROM card_sets WHERE id = ?")
        .bind(card_set_id)
        .execute(&mut *tx)
        .await?;

    refresh_module_counts(&mut tx, card_set.module_id).await?;
    refresh_module_score(&mut tx, card_set.module_id).await?;

    tx.commit().await?;

    let should_be_empty: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM card_sets WHERE id = ?")
            .bind(card_set_id)
            .fetch_optional(&pool)
            .await?;
    if should_be_empty.is_some() {
        return Err(AppError::IntegrityFailure(
            "CardSet could not be deleted from the database.".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_card_set(
    pool: &SqlitePool,
    card_set_id: i64,
) -> Result<CardSet, AppError> {
    sqlx::query_as::<_, CardSet>("SELECT * FROM card_sets WHERE id = ?")
        .bind(card_set_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(format!(
            "CardSet with ID {} does not exist.",
            card_set_id
        )))
}

/// Recomputes a card set's score and card count from its live cards.
/// Runs inside the mutating transaction.
pub(crate) async fn refresh_card_set_score(
    conn: &mut SqliteConnection,
    card_set_id: i64,
) -> Result<(), AppError> {
    let statuses: Vec<(Status,)> =
        sqlx::query_as("SELECT status FROM cards WHERE card_set_id = ?")
            .bind(card_set_id)
            .fetch_all(&mut *conn)
            .await?;

    let statuses: Vec<Status> = statuses.into_iter().map(|(s,)| s).collect();
    let score = score_of_card_set(&statuses);

    sqlx::query("UPDATE card_sets SET score = ?, card_count = ? WHERE id = ?")
        .bind(score)
        .bind(statuses.len() as i64)
        .bind(card_set_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Duplicates a document row, returning the new id. `None` passes through.
async fn copy_document(
    conn: &mut SqliteConnection,
    document_id: Option<i64>,
) -> Result<Option<i64>, AppError> {
    let Some(document_id) = document_id else {
        return Ok(None);
    };

    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO documents (data, file_type)
        SELECT data, file_type FROM documents WHERE id = ?
        RETURNING id
        "#,
    )
    .bind(document_id)
    .fetch_optional(conn)
    .await?;

    // A dangling reference on the source card is skipped, not copied.
    Ok(row.map(|(id,)| id))
}

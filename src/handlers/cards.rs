// src/handlers/cards.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::{
        card::{Card, CardPayload, CardRow},
        document::MAX_DOCUMENT_BYTES,
        file::FileType,
    },
    utils::{jwt::Claims, ownership, policy},
};

use super::{
    card_sets::{fetch_card_set, refresh_card_set_score},
    modules::{delete_documents, refresh_module_score},
};

/// An uploaded image part of a card request.
pub(crate) struct ImageUpload {
    pub data: Vec<u8>,
    pub file_type: FileType,
}

/// Fetches a single card. Readable if the owning card set is public or the
/// requester owns the module.
pub async fn get_card(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(card_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let row = fetch_card(&pool, card_id).await?;
    let card_set = fetch_card_set(&pool, row.card_set_id).await?;

    let owner_ids = ownership::module_owner_ids(&pool, card_set.module_id).await?;
    if !policy::can_read(claims.user_id(), card_set.visibility, &owner_ids) {
        return Err(AppError::Forbidden(
            "You do not have permission to access this card.".to_string(),
        ));
    }

    Ok(Json(Card::from(row)))
}

/// Creates a card from a multipart request: a `card` JSON part plus optional
/// `question_image` and `answer_image` parts. The card-set score and the
/// module score are recomputed in the same transaction.
pub async fn create_card(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (payload, question_image, answer_image) = parse_card_multipart(multipart).await?;

    let payload = payload.into_validated().map_err(|invalid| {
        AppError::BadRequest(format!("Invalid card fields: {}", invalid.join(", ")))
    })?;

    let card_set = fetch_card_set(&pool, payload.card_set_id).await?;

    let requesting_user_id = claims.user_id();
    let is_owner =
        ownership::is_module_owner(&pool, card_set.module_id, requesting_user_id).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to create this card.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let question_document_id = match question_image {
        Some(image) => Some(insert_document(&mut tx, &image).await?),
        None => None,
    };
    let answer_document_id = match answer_image {
        Some(image) => Some(insert_document(&mut tx, &image).await?),
        None => None,
    };

    let (card_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO cards
            (card_set_id, question_text, question_document_id,
             answer_text, answer_document_id, wrong_answers,
             status, flagged, creator_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(payload.card_set_id)
    .bind(&payload.question.text)
    .bind(question_document_id)
    .bind(&payload.answer.text)
    .bind(answer_document_id)
    .bind(serde_json::to_string(&payload.wrong_answers)?)
    .bind(payload.status)
    .bind(payload.flagged)
    .bind(requesting_user_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    refresh_card_set_score(&mut tx, payload.card_set_id).await?;
    refresh_module_score(&mut tx, card_set.module_id).await?;

    tx.commit().await?;

    let card = Card::from(fetch_card(&pool, card_id).await?);
    Ok((StatusCode::CREATED, Json(card)))
}

/// Updates a card. Uploaded images overwrite the already linked document in
/// place, or create a fresh one if none is linked. Scores are recomputed only
/// when the status actually changes.
pub async fn update_card(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(card_id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (payload, question_image, answer_image) = parse_card_multipart(multipart).await?;

    let payload = payload.into_validated().map_err(|invalid| {
        AppError::BadRequest(format!("Invalid card fields: {}", invalid.join(", ")))
    })?;

    let existing = fetch_card(&pool, card_id).await?;
    let card_set = fetch_card_set(&pool, existing.card_set_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, card_set.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to update this card.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let question_document_id = upsert_document(
        &mut tx,
        existing.question_document_id,
        question_image.as_ref(),
    )
    .await?;
    let answer_document_id =
        upsert_document(&mut tx, existing.answer_document_id, answer_image.as_ref()).await?;

    sqlx::query(
        r#"
        UPDATE cards SET
            question_text = ?, question_document_id = ?,
            answer_text = ?, answer_document_id = ?,
            wrong_answers = ?, status = ?, flagged = ?
        WHERE id = ?
        "#,
    )
    .bind(&payload.question.text)
    .bind(question_document_id)
    .bind(&payload.answer.text)
    .bind(answer_document_id)
    .bind(serde_json::to_string(&payload.wrong_answers)?)
    .bind(payload.status)
    .bind(payload.flagged)
    .bind(card_id)
    .execute(&mut *tx)
    .await?;

    if payload.status != existing.status {
        refresh_card_set_score(&mut tx, existing.card_set_id).await?;
        refresh_module_score(&mut tx, card_set.module_id).await?;
    }

    tx.commit().await?;

    let card = Card::from(fetch_card(&pool, card_id).await?);
    Ok(Json(card))
}

/// Deletes a card and its attached documents, recomputing the card-set and
/// module scores.
pub async fn delete_card(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(card_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let card = fetch_card(&pool, card_id).await?;
    let card_set = fetch_card_set(&pool, card.card_set_id).await?;

    let is_owner =
        ownership::is_module_owner(&pool, card_set.module_id, claims.user_id()).await?;
    if !is_owner {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this card.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM cards WHERE id = ?")
        .bind(card_id)
        .execute(&mut *tx)
        .await?;

    refresh_card_set_score(&mut tx, card.card_set_id).await?;
    refresh_module_score(&mut tx, card_set.module_id).await?;

    let mut document_ids = Vec::new();
    document_ids.extend(card.question_document_id);
    document_ids.extend(card.answer_document_id);
    delete_documents(&mut tx, &document_ids).await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_card(pool: &SqlitePool, card_id: i64) -> Result<CardRow, AppError> {
    sqlx::query_as::<_, CardRow>("SELECT * FROM cards WHERE id = ?")
        .bind(card_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound(format!(
            "Card with ID {} does not exist.",
            card_id
        )))
}

/// Splits the multipart request into the card JSON and the optional images.
async fn parse_card_multipart(
    mut multipart: Multipart,
) -> Result<(CardPayload, Option<ImageUpload>, Option<ImageUpload>), AppError> {
    let mut payload: Option<CardPayload> = None;
    let mut question_image = None;
    let mut answer_image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("card") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                payload = Some(serde_json::from_str(&text)?);
            }
            Some("question_image") => {
                question_image = Some(read_image_field(field).await?);
            }
            Some("answer_image") => {
                answer_image = Some(read_image_field(field).await?);
            }
            _ => {}
        }
    }

    let payload = payload.ok_or(AppError::BadRequest(
        "Multipart request is missing the 'card' part.".to_string(),
    ))?;

    Ok((payload, question_image, answer_image))
}

pub(crate) async fn read_image_field(
    field: axum::extract::multipart::Field<'_>,
) -> Result<ImageUpload, AppError> {
    let file_type = field
        .content_type()
        .map(FileType::from_content_type)
        .unwrap_or(FileType::Unknown);

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .to_vec();

    if data.len() > MAX_DOCUMENT_BYTES {
        return Err(AppError::BadRequest(
            "Document exceeds the 10MB size limit.".to_string(),
        ));
    }

    Ok(ImageUpload { data, file_type })
}

pub(crate) async fn insert_document(
    conn: &mut SqliteConnection,
    image: &ImageUpload,
) -> Result<i64, AppError> {
    let (id,): (i64,) =
        sqlx::query_as("INSERT INTO documents (data, file_type) VALUES (?, ?) RETURNING id")
            .bind(&image.data)
            .bind(image.file_type)
            .fetch_one(conn)
            .await?;

    Ok(id)
}

/// Writes an uploaded image over the linked document, creates a document if
/// none is linked yet, or leaves the link untouched without an upload.
async fn upsert_document(
    conn: &mut SqliteConnection,
    linked_document_id: Option<i64>,
    image: Option<&ImageUpload>,
) -> Result<Option<i64>, AppError> {
    let Some(image) = image else {
        return Ok(linked_document_id);
    };

    match linked_document_id {
        Some(document_id) => {
            sqlx::query("UPDATE documents SET data = ?, file_type = ? WHERE id = ?")
                .bind(&image.data)
                .bind(image.file_type)
                .bind(document_id)
                .execute(conn)
                .await?;
            Ok(Some(document_id))
        }
        None => Ok(Some(insert_document(conn, image).await?)),
    }
}

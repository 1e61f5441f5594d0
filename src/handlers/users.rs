// src/handlers/users.rs

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
        card_set::CardSet,
        module::Module,
        user::{ChangePasswordRequest, Role, UpdateUserRequest, User},
    },
    utils::{
        hash::{hash_password, verify_password},
        html::clean_html,
        jwt::Claims,
        ownership, policy,
    },
};

/// How many recently-quizzed card sets are remembered per user.
const LAST_QUIZZED_LIMIT: i64 = 5;

/// Lists all users visible to the requester: public profiles plus their own.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password, visibility, role, description, created_at
        FROM users
        WHERE visibility = 'PUBLIC' OR id = ?
        ORDER BY id
        "#,
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(users))
}

/// Fetches a single user. Private profiles are only visible to themselves.
pub async fn get_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, user_id).await?;

    if user.visibility == Visibility::Public || user.id == claims.user_id() {
        Ok(Json(user))
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to access this user's information.".to_string(),
        ))
    }
}

/// Lists the modules a user owns. The user sees all of their modules; other
/// requesters see the public modules of public users only.
pub async fn modules_of_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = fetch_user(&pool, user_id).await?;
    let requesting_user_id = claims.user_id();

    let modules = if requesting_user_id == user.id {
        sqlx::query_as::<_, Module>(
            r#"
            SELECT m.* FROM modules m
            JOIN module_owners mo ON mo.module_id = m.id
            WHERE mo.user_id = ?
            ORDER BY m.id
            "#,
        )
        .bind(user.id)
        .fetch_all(&pool)
        .await?
    } else if user.visibility == Visibility::Public {
        sqlx::query_as::<_, Module>(
            r#"
            SELECT m.* FROM modules m
            JOIN module_owners mo ON mo.module_id = m.id
            WHERE mo.user_id = ? AND m.visibility = 'PUBLIC'
            ORDER BY m.id
            "#,
        )
        .bind(user.id)
        .fetch_all(&pool)
        .await?
    } else {
        return Err(AppError::Forbidden(
            "You do not have permission to access modules for this user.".to_string(),
        ));
    };

    Ok(Json(modules))
}

/// The requester's recently-quizzed card sets, most recent first. Sets the
/// requester can no longer access are silently filtered out.
pub async fn last_quizzed(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let card_sets = sqlx::query_as::<_, CardSet>(
        r#"
        SELECT cs.* FROM card_sets cs
        JOIN last_quizzed lq ON lq.card_set_id = cs.id
        WHERE lq.user_id = ?
          AND (cs.visibility = 'PUBLIC' OR EXISTS (
                SELECT 1 FROM module_owners mo
                WHERE mo.module_id = cs.module_id AND mo.user_id = ?
          ))
        ORDER BY lq.quizzed_at DESC
        "#,
    )
    .bind(claims.user_id())
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(card_sets))
}

/// Records that the requester just quizzed a card set, keeping only the
/// five most recent entries.
pub async fn mark_quizzed(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(card_set_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let requesting_user_id = claims.user_id();

    let card_set = super::card_sets::fetch_card_set(&pool, card_set_id).await?;

    let owner_ids = ownership::module_owner_ids(&pool, card_set.module_id).await?;
    if !policy::can_read(requesting_user_id, card_set.visibility, &owner_ids) {
        return Err(AppError::Forbidden(
            "You do not have permission to access this cardset.".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO last_quizzed (user_id, card_set_id, quizzed_at)
        VALUES (?, ?, ?)
        ON CONFLICT (user_id, card_set_id) DO UPDATE SET quizzed_at = excluded.quizzed_at
        "#,
    )
    .bind(requesting_user_id)
    .bind(card_set_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    // Drop everything beyond the five newest entries.
    sqlx::query(
        r#"
        DELETE FROM last_quizzed
        WHERE user_id = ? AND card_set_id NOT IN (
            SELECT card_set_id FROM last_quizzed
            WHERE user_id = ?
            ORDER BY quizzed_at DESC, card_set_id DESC
            LIMIT ?
        )
        "#,
    )
    .bind(requesting_user_id)
    .bind(requesting_user_id)
    .bind(LAST_QUIZZED_LIMIT)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let user = fetch_user(&pool, requesting_user_id).await?;
    Ok(Json(user))
}

/// Updates a user's own profile. Name, visibility, role and description
/// are mutable.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let body_id = payload.id.ok_or(AppError::BadRequest(
        "No 'id' is present in the User object.".to_string(),
    ))?;

    if body_id != user_id {
        return Err(AppError::BadRequest(
            "The userId in the path variable does not match the id in the request body."
                .to_string(),
        ));
    }

    if body_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "You do not have permission to update this user.".to_string(),
        ));
    }

    let missing = payload.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Invalid user fields: {}",
            missing.join(", ")
        )));
    }
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let description = clean_html(payload.description.as_deref().unwrap_or_default());

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET name = ?, visibility = ?, role = ?, description = ?
        WHERE id = ?
        RETURNING id, name, email, password, visibility, role, description, created_at
        "#,
    )
    .bind(payload.name.as_deref().unwrap_or_default())
    .bind(payload.visibility.unwrap_or(Visibility::Private))
    .bind(payload.role.unwrap_or(Role::User))
    .bind(&description)
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound(format!(
        "User with ID {} does not exist.",
        user_id
    )))?;

    Ok(Json(user))
}

/// Changes the requester's password after verifying the current one.
pub async fn change_password(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = fetch_user(&pool, claims.user_id()).await?;

    if !verify_password(&payload.current_password, &user.password)? {
        return Err(AppError::BadRequest("Wrong password".to_string()));
    }

    let hashed = hash_password(&payload.new_password)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(user.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::OK)
}

/// Deletes the requester's account along with their module memberships and
/// quiz history.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if user_id != claims.user_id() {
        return Err(AppError::Forbidden(
            "You do not have permission to delete this user.".to_string(),
        ));
    }

    // Existence check so a double delete is a 404, not a silent success.
    fetch_user(&pool, user_id).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM module_owners WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM last_quizzed WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_user(pool: &SqlitePool, user_id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, name, email, password, visibility, role, description, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound(format!(
        "User with ID {} does not exist.",
        user_id
    )))
}

// src/handlers/search.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        card_set::CardSet,
        file::File,
        module::Module,
        search::{ItemType, SearchParams, SearchResult},
        user::User,
    },
    utils::jwt::Claims,
};

/// Cross-entity search: case-insensitive substring match on names, public
/// entities only, and never the requester's own content.
pub async fn search_items(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let requesting_user_id = claims.user_id();
    let mut results: Vec<SearchResult> = Vec::new();

    if matches!(params.item_type, ItemType::User | ItemType::All) {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE visibility = 'PUBLIC'
              AND id != ?
              AND LOWER(name) LIKE '%' || LOWER(?) || '%'
            ORDER BY id
            "#,
        )
        .bind(requesting_user_id)
        .bind(&params.query)
        .fetch_all(&pool)
        .await?;
        results.extend(users.into_iter().map(SearchResult::User));
    }

    if matches!(params.item_type, ItemType::CardSet | ItemType::All) {
        let card_sets = sqlx::query_as::<_, CardSet>(
            r#"
            SELECT * FROM card_sets
            WHERE visibility = 'PUBLIC'
              AND LOWER(name) LIKE '%' || LOWER(?) || '%'
              AND module_id NOT IN (SELECT module_id FROM module_owners WHERE user_id = ?)
            ORDER BY id
            "#,
        )
        .bind(&params.query)
        .bind(requesting_user_id)
        .fetch_all(&pool)
        .await?;
        results.extend(card_sets.into_iter().map(SearchResult::CardSet));
    }

    if matches!(params.item_type, ItemType::Module | ItemType::All) {
        let modules = sqlx::query_as::<_, Module>(
            r#"
            SELECT * FROM modules
            WHERE visibility = 'PUBLIC'
              AND LOWER(name) LIKE '%' || LOWER(?) || '%'
              AND id NOT IN (SELECT module_id FROM module_owners WHERE user_id = ?)
            ORDER BY id
            "#,
        )
        .bind(&params.query)
        .bind(requesting_user_id)
        .fetch_all(&pool)
        .await?;
        results.extend(modules.into_iter().map(SearchResult::Module));
    }

    if matches!(params.item_type, ItemType::File | ItemType::All) {
        let files = sqlx::query_as::<_, File>(
            r#"
            SELECT * FROM files
            WHERE visibility = 'PUBLIC'
              AND LOWER(name) LIKE '%' || LOWER(?) || '%'
              AND module_id NOT IN (SELECT module_id FROM module_owners WHERE user_id = ?)
            ORDER BY id
            "#,
        )
        .bind(&params.query)
        .bind(requesting_user_id)
        .fetch_all(&pool)
        .await?;
        results.extend(files.into_iter().map(SearchResult::File));
    }

    Ok(Json(results))
}

// src/utils/ownership.rs
//
// Owner-list resolution shared by every entity handler. Access to a card set,
// card, directory or file is always decided against the owners of the
// enclosing module.

use sqlx::SqlitePool;

use crate::error::AppError;

/// The ids of all owners of a module.
pub async fn module_owner_ids(pool: &SqlitePool, module_id: i64) -> Result<Vec<i64>, AppError> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT user_id FROM module_owners WHERE module_id = ?")
            .bind(module_id)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Whether `user_id` owns `module_id`.
pub async fn is_module_owner(
    pool: &SqlitePool,
    module_id: i64,
    user_id: i64,
) -> Result<bool, AppError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM module_owners WHERE module_id = ? AND user_id = ?")
            .bind(module_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

// src/models/module.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::Visibility;

/// Represents the 'modules' table in the database.
///
/// `score`, `card_set_count` and `file_count` are derived values recomputed
/// in the same transaction as the mutation that moves them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,

    pub name: String,

    pub description: String,

    pub visibility: Visibility,

    /// Aggregate study progress in [0, 100].
    pub score: i64,

    pub card_set_count: i64,

    pub file_count: i64,

    pub creator_id: i64,

    /// Set when this module was created as a copy of another.
    pub origin_module_id: Option<i64>,

    pub root_directory_id: Option<i64>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// The root directory created together with a module.
#[derive(Debug, Deserialize)]
pub struct RootDirectoryRequest {
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
}

/// DTO for creating a module. Required fields arrive as `Option` so a missing
/// one is reported by name instead of failing deserialization.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateModuleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub score: Option<i64>,
    pub owner_ids: Option<Vec<i64>>,
    pub root_directory: Option<RootDirectoryRequest>,
}

impl CreateModuleRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.visibility.is_none() {
            missing.push("visibility");
        }
        if self.score.is_none() {
            missing.push("score");
        }
        if self.owner_ids.is_none() {
            missing.push("owner_ids");
        }
        if self.root_directory.is_none() {
            missing.push("root_directory");
        }
        missing
    }
}

/// DTO for a module update; only name, visibility and description mutate.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateModuleRequest {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

impl UpdateModuleRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.visibility.is_none() {
            missing.push("visibility");
        }
        if self.description.is_none() {
            missing.push("description");
        }
        missing
    }
}

/// Module score: mean of the scores of the card sets that contain at least
/// one card, rounded half-up and clamped to [0, 100]. Empty input scores 0.
pub fn score_of_module(non_empty_card_set_scores: &[i64]) -> i64 {
    if non_empty_card_set_scores.is_empty() {
        return 0;
    }

    let sum: i64 = non_empty_card_set_scores.iter().sum();
    let raw = (sum as f64 / non_empty_card_set_scores.len() as f64).round() as i64;
    raw.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_qualifying_card_sets_scores_zero() {
        assert_eq!(score_of_module(&[]), 0);
    }

    #[test]
    fn mean_of_card_set_scores() {
        // The empty card set is excluded by the caller; [80, 100] -> 90.
        assert_eq!(score_of_module(&[80, 100]), 90);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(score_of_module(&[50, 51]), 51);
    }

    #[test]
    fn stays_within_bounds() {
        assert_eq!(score_of_module(&[100, 100, 100]), 100);
        assert_eq!(score_of_module(&[0]), 0);
    }
}

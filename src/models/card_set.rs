// src/models/card_set.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{Visibility, card::Status};

/// Represents the 'card_sets' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CardSet {
    pub id: i64,

    pub name: String,

    pub visibility: Visibility,

    /// Derived from the statuses of the contained cards, in [0, 100].
    pub score: i64,

    /// Mirrors the live card count.
    pub card_count: i64,

    pub module_id: i64,

    pub creator_id: i64,

    /// Set when this set was created by copying another.
    pub origin_card_set_id: Option<i64>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a card set.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCardSetRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
    pub score: Option<i64>,
    pub card_count: Option<i64>,
    pub module_id: Option<i64>,
}

impl CreateCardSetRequest {
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
        if self.card_count.is_none() {
            missing.push("card_count");
        }
        if self.module_id.is_none() {
            missing.push("module_id");
        }
        missing
    }
}

/// DTO for a card-set update; only name and visibility mutate.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCardSetRequest {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
}

impl UpdateCardSetRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.visibility.is_none() {
            missing.push("visibility");
        }
        missing
    }
}

/// Card-set score: each card contributes its status points out of a maximum
/// of 4; the total is expressed as a percentage, rounded half-up and clamped
/// to [0, 100]. A set without cards scores 0.
pub fn score_of_card_set(statuses: &[Status]) -> i64 {
    if statuses.is_empty() {
        return 0;
    }

    let total_points: i64 = statuses.iter().map(|s| s.points()).sum();
    let raw = (total_points as f64 / (statuses.len() as i64 * 4) as f64 * 100.0).round() as i64;
    raw.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_scores_zero() {
        assert_eq!(score_of_card_set(&[]), 0);
    }

    #[test]
    fn good_and_bad_round_half_up() {
        // 4 + 1 points of 8 possible -> 62.5% -> 63.
        assert_eq!(score_of_card_set(&[Status::Good, Status::Bad]), 63);
    }

    #[test]
    fn all_good_is_full_score() {
        assert_eq!(score_of_card_set(&[Status::Good, Status::Good]), 100);
    }

    #[test]
    fn all_undone_is_zero() {
        assert_eq!(score_of_card_set(&[Status::Undone, Status::Undone]), 0);
    }

    #[test]
    fn status_upgrade_never_lowers_the_score() {
        let ladder = [Status::Undone, Status::Bad, Status::Ok, Status::Good];
        let others = [Status::Undone, Status::Bad, Status::Good];
        for window in ladder.windows(2) {
            let before = score_of_card_set(&[window[0], others[0], others[1], others[2]]);
            let after = score_of_card_set(&[window[1], others[0], others[1], others[2]]);
            assert!(after >= before);
            assert!((0..=100).contains(&after));
        }
    }
}

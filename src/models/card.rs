// src/models/card.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Study progress of a single card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Status {
    Undone,
    Bad,
    Ok,
    Good,
}

impl Status {
    /// Points a card contributes to its set's score.
    pub fn points(self) -> i64 {
        match self {
            Status::Undone => 0,
            Status::Bad => 1,
            Status::Ok => 2,
            Status::Good => 4,
        }
    }
}

/// A card's question or answer: text plus an optional attached image.
/// Owned exclusively by the card and deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizField {
    pub text: String,
    pub document_id: Option<i64>,
}

/// API shape of a card.
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub id: i64,
    pub card_set_id: i64,
    pub question: QuizField,
    pub answer: QuizField,
    pub wrong_answers: Vec<String>,
    pub status: Status,
    pub flagged: bool,
    pub creator_id: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Flat row shape of the 'cards' table; the two quiz fields are embedded.
#[derive(Debug, FromRow)]
pub struct CardRow {
    pub id: i64,
    pub card_set_id: i64,
    pub question_text: String,
    pub question_document_id: Option<i64>,
    pub answer_text: String,
    pub answer_document_id: Option<i64>,
    pub wrong_answers: Json<Vec<String>>,
    pub status: Status,
    pub flagged: bool,
    pub creator_id: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<CardRow> for Card {
    fn from(row: CardRow) -> Self {
        Card {
            id: row.id,
            card_set_id: row.card_set_id,
            question: QuizField {
                text: row.question_text,
                document_id: row.question_document_id,
            },
            answer: QuizField {
                text: row.answer_text,
                document_id: row.answer_document_id,
            },
            wrong_answers: row.wrong_answers.0,
            status: row.status,
            flagged: row.flagged,
            creator_id: row.creator_id,
            created_at: row.created_at,
        }
    }
}

pub const MAX_WRONG_ANSWERS: usize = 4;

/// The JSON part of the multipart card create/update request.
#[derive(Debug, Deserialize)]
pub struct CardPayload {
    pub question: Option<QuizField>,
    pub answer: Option<QuizField>,
    pub wrong_answers: Option<Vec<String>>,
    pub status: Option<Status>,
    pub flagged: Option<bool>,
    pub card_set_id: Option<i64>,
}

/// A card request with every required field present and in range.
#[derive(Debug)]
pub struct ValidCardPayload {
    pub question: QuizField,
    pub answer: QuizField,
    pub wrong_answers: Vec<String>,
    pub status: Status,
    pub flagged: bool,
    pub card_set_id: i64,
}

impl CardPayload {
    /// Checks required fields and ranges; the error lists the offending
    /// field names.
    pub fn into_validated(self) -> Result<ValidCardPayload, Vec<&'static str>> {
        let invalid = self.invalid_fields();
        match (
            self.question,
            self.answer,
            self.wrong_answers,
            self.status,
            self.flagged,
            self.card_set_id,
        ) {
            (
                Some(question),
                Some(answer),
                Some(wrong_answers),
                Some(status),
                Some(flagged),
                Some(card_set_id),
            ) if invalid.is_empty() => Ok(ValidCardPayload {
                question,
                answer,
                wrong_answers,
                status,
                flagged,
                card_set_id,
            }),
            _ => Err(invalid),
        }
    }

    /// Required fields that are absent or out of range, by name.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let mut invalid = Vec::new();
        if self.question.is_none() {
            invalid.push("question");
        }
        if self.answer.is_none() {
            invalid.push("answer");
        }
        match &self.wrong_answers {
            None => invalid.push("wrong_answers"),
            Some(answers) if answers.len() > MAX_WRONG_ANSWERS => invalid.push("wrong_answers"),
            Some(_) => {}
        }
        if self.status.is_none() {
            invalid.push("status");
        }
        if self.flagged.is_none() {
            invalid.push("flagged");
        }
        if self.card_set_id.is_none() {
            invalid.push("card_set_id");
        }
        invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_payload() -> CardPayload {
        CardPayload {
            question: Some(QuizField {
                text: "q".to_string(),
                document_id: None,
            }),
            answer: Some(QuizField {
                text: "a".to_string(),
                document_id: None,
            }),
            wrong_answers: Some(vec!["w1".to_string()]),
            status: Some(Status::Undone),
            flagged: Some(false),
            card_set_id: Some(1),
        }
    }

    #[test]
    fn complete_payload_is_valid() {
        assert!(complete_payload().invalid_fields().is_empty());
    }

    #[test]
    fn missing_flagged_is_reported() {
        let mut payload = complete_payload();
        payload.flagged = None;
        assert_eq!(payload.invalid_fields(), vec!["flagged"]);
    }

    #[test]
    fn too_many_wrong_answers_are_rejected() {
        let mut payload = complete_payload();
        payload.wrong_answers = Some(vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()]);
        assert_eq!(payload.invalid_fields(), vec!["wrong_answers"]);
    }

    #[test]
    fn status_points_are_graded() {
        assert_eq!(Status::Undone.points(), 0);
        assert_eq!(Status::Bad.points(), 1);
        assert_eq!(Status::Ok.points(), 2);
        assert_eq!(Status::Good.points(), 4);
    }
}

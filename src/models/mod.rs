// src/models/mod.rs

use serde::{Deserialize, Serialize};

pub mod card;
pub mod card_set;
pub mod directory;
pub mod document;
pub mod file;
pub mod module;
pub mod search;
pub mod user;

/// Who may read an entity: everyone, or only the owners of its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Visibility {
    Public,
    Private,
}

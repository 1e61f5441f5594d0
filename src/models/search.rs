// src/models/search.rs

use serde::{Deserialize, Serialize};

use super::{card_set::CardSet, file::File, module::Module, user::User};

/// Which entity kinds a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    User,
    CardSet,
    Module,
    File,
    All,
}

/// Query parameters of `GET /api/search`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

/// One search hit, tagged by entity kind.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "item", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchResult {
    User(User),
    CardSet(CardSet),
    Module(Module),
    File(File),
}

// src/models/document.rs

use sqlx::FromRow;

use super::file::FileType;

/// Payload ceiling for stored documents.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Represents the 'documents' table: a stored binary payload plus its type.
/// Documents carry no ownership metadata; the referencing file or card is
/// responsible for deleting them.
#[derive(Debug, Clone, FromRow)]
pub struct Document {
    pub id: i64,
    pub data: Vec<u8>,
    pub file_type: FileType,
}

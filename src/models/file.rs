// src/models/file.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::Visibility;

/// Content type tag of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum FileType {
    Pdf,
    Png,
    Jpg,
    Unknown,
}

impl FileType {
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            "application/pdf" => FileType::Pdf,
            "image/png" => FileType::Png,
            "image/jpeg" => FileType::Jpg,
            _ => FileType::Unknown,
        }
    }

    /// Content type the stored payload is served under.
    pub fn content_type(self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Png => "image/png",
            FileType::Jpg => "image/jpeg",
            FileType::Unknown => "application/octet-stream",
        }
    }
}

/// Represents the 'files' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct File {
    pub id: i64,

    pub name: String,

    pub visibility: Visibility,

    pub file_type: FileType,

    pub creator_id: i64,

    pub module_id: i64,

    pub directory_id: i64,

    /// The stored payload; deleted together with the file.
    pub document_id: Option<i64>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// The JSON part of the multipart file upload.
#[derive(Debug, Deserialize, Validate)]
pub struct FilePayload {
    /// Defaults to the uploaded part's file name when absent or empty.
    #[validate(length(max = 255))]
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
    pub directory_id: Option<i64>,
}

impl FilePayload {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.visibility.is_none() {
            missing.push("visibility");
        }
        if self.directory_id.is_none() {
            missing.push("directory_id");
        }
        missing
    }
}

/// DTO for a file update; only name and visibility mutate.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFileRequest {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
}

impl UpdateFileRequest {
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

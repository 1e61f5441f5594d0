// src/models/directory.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{Visibility, file::File};

/// Represents the 'directories' table in the database.
///
/// Directories form a tree with exactly one root per module (`parent_id`
/// NULL). The owning module id is stored on every row, so ownership checks
/// never walk parent links.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Directory {
    pub id: i64,

    pub name: String,

    pub visibility: Visibility,

    pub creator_id: i64,

    /// NULL only for a module's root directory.
    pub parent_id: Option<i64>,

    pub module_id: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a (non-root) directory.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDirectoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
    pub parent_id: Option<i64>,
}

impl CreateDirectoryRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.visibility.is_none() {
            missing.push("visibility");
        }
        if self.parent_id.is_none() {
            missing.push("parent_id");
        }
        missing
    }
}

/// DTO for a directory update; only name and visibility mutate.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDirectoryRequest {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub visibility: Option<Visibility>,
}

impl UpdateDirectoryRequest {
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

/// Listing of a directory: its immediate subdirectories and files.
#[derive(Debug, Serialize)]
pub struct DirectoryContent {
    pub sub_directories: Vec<Directory>,
    pub files: Vec<File>,
}

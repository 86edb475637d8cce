//! GEVER documents

use super::ModelBase;
use crate::error::ApiResult;

/// A document (`opengever.document.document`)
#[derive(Debug, Clone)]
pub struct Document {
    base: ModelBase,
}

model_kind!(Document, "opengever.document.document");

impl Document {
    pub fn title(&self) -> ApiResult<&str> {
        self.base.get_str("title")
    }

    pub fn created(&self) -> ApiResult<&str> {
        self.base.get_str("created")
    }

    pub fn reference_number(&self) -> ApiResult<&str> {
        self.base.get_str("reference_number")
    }

    /// File extension including the dot, e.g. `.docx`
    pub fn file_extension(&self) -> ApiResult<&str> {
        self.base.get_str("file_extension")
    }

    pub fn review_state(&self) -> ApiResult<&str> {
        self.base.get_str("review_state")
    }
}

/// A file to be stored as a new document
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub title: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    /// Additional document fields sent along with the file
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl DocumentUpload {
    pub fn new(title: impl Into<String>, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            title: title.into(),
            filename: filename.into(),
            content_type: "application/octet-stream".to_string(),
            data,
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

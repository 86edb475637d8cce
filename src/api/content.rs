use crate::client::{Client, RequestOptions};
use crate::error::ApiResult;
use crate::models::{Document, DocumentUpload, Dossier, Model, ModelKind, TYPE_KEY};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Map, Value};

/// Content API methods on the client's resource
#[async_trait]
pub trait ContentApi {
    /// Fetch the resource and wrap it in its model
    async fn fetch(&self) -> ApiResult<Box<dyn Model>>;

    /// Fetch the resource as raw JSON
    async fn fetch_raw(&self) -> ApiResult<Value>;

    /// Create a dossier inside the resource.
    ///
    /// `responsible` defaults to the acting user.
    async fn create_dossier(&self, title: &str, data: Map<String, Value>)
        -> ApiResult<Box<dyn Model>>;

    /// Create a document with a file inside the resource
    async fn upload_document(&self, upload: DocumentUpload) -> ApiResult<Box<dyn Model>>;

    /// Update fields of the resource
    async fn update_object(&self, data: Map<String, Value>) -> ApiResult<()>;

    /// Navigation tree of the resource
    async fn get_navigation(&self) -> ApiResult<Value>;
}

#[async_trait]
impl ContentApi for Client {
    async fn fetch(&self) -> ApiResult<Box<dyn Model>> {
        let item = self.fetch_raw().await?;
        self.wrap(item)
    }

    async fn fetch_raw(&self) -> ApiResult<Value> {
        self.get("", RequestOptions::new()).await
    }

    async fn create_dossier(
        &self,
        title: &str,
        mut data: Map<String, Value>,
    ) -> ApiResult<Box<dyn Model>> {
        data.entry("responsible")
            .or_insert_with(|| Value::String(self.username().to_string()));
        data.insert(TYPE_KEY.to_string(), Value::String(Dossier::PORTAL_TYPE.to_string()));
        data.insert("title".to_string(), Value::String(title.to_string()));

        let item: Value = self
            .post("", &data, RequestOptions::new().with_error_message("Could not create dossier."))
            .await?;
        tracing::info!(target: "api", parent = %self.url(), title = %title, "Created dossier");
        self.wrap(item)
    }

    async fn upload_document(&self, upload: DocumentUpload) -> ApiResult<Box<dyn Model>> {
        let mut data = upload.fields;
        data.insert(TYPE_KEY.to_string(), Value::String(Document::PORTAL_TYPE.to_string()));
        data.insert("title".to_string(), Value::String(upload.title.clone()));
        data.insert(
            "file".to_string(),
            json!({
                "data": base64::engine::general_purpose::STANDARD.encode(&upload.data),
                "encoding": "base64",
                "filename": upload.filename,
                "content-type": upload.content_type,
            }),
        );

        let item: Value = self
            .post("", &data, RequestOptions::new().with_error_message("Could not upload document."))
            .await?;
        tracing::info!(target: "api", parent = %self.url(), title = %upload.title, size = upload.data.len(), "Uploaded document");
        self.wrap(item)
    }

    async fn update_object(&self, data: Map<String, Value>) -> ApiResult<()> {
        self.patch("", &data, RequestOptions::new()).await
    }

    async fn get_navigation(&self) -> ApiResult<Value> {
        self.get("/@navigation", RequestOptions::new()).await
    }
}

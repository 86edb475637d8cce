//! Typed views over GEVER resource items
//!
//! Every item returned by the backend carries a `@type` discriminator. The
//! [`ModelRegistry`] maps it to a constructor producing a [`Model`]; unknown
//! types fall back to [`UnknownModel`]. A model keeps the raw JSON object and a
//! [`Client`] bound to the resource's own URL, so it can navigate to its parent
//! and children or [`refetch`](Refetch::refetch) its full representation.

/// Implement [`Model`], [`ModelKind`] and URL equality for a `{ base: ModelBase }` struct
macro_rules! model_kind {
    ($model:ident, $portal_type:expr) => {
        impl $crate::models::ModelKind for $model {
            const PORTAL_TYPE: &'static str = $portal_type;

            fn from_base(base: $crate::models::ModelBase) -> Self {
                Self { base }
            }
        }

        impl $crate::models::Model for $model {
            fn declared_type(&self) -> &'static str {
                <Self as $crate::models::ModelKind>::PORTAL_TYPE
            }

            fn base(&self) -> &$crate::models::ModelBase {
                &self.base
            }

            fn base_mut(&mut self) -> &mut $crate::models::ModelBase {
                &mut self.base
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }

        impl PartialEq for $model {
            fn eq(&self, other: &Self) -> bool {
                $crate::models::Model::url(self) == $crate::models::Model::url(other)
            }
        }
    };
}

pub mod document;
pub mod dossier;
pub mod listing;
pub mod registry;
pub mod repository_folder;
pub mod unknown;

pub use document::{Document, DocumentUpload};
pub use dossier::Dossier;
pub use listing::{Listing, VuetifyPaginator};
pub use registry::{ModelFactory, ModelRegistry};
pub use repository_folder::RepositoryFolder;
pub use unknown::UnknownModel;

use crate::api::ContentApi;
use crate::client::Client;
use crate::error::{ApiError, ApiResult};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::future::Future;

/// Discriminator field
pub const TYPE_KEY: &str = "@type";

/// Identity URL field
pub const ID_KEY: &str = "@id";

/// Declared type of the fallback model, which accepts any `@type`
pub const UNKNOWN_TYPE: &str = "_unknown_";

/// Raw item plus the client bound to its URL
#[derive(Clone)]
pub struct ModelBase {
    item: Map<String, Value>,
    client: Client,
}

impl ModelBase {
    /// Validate `item` for a model declaring `declared_type`
    pub fn new(item: Value, client: Client, declared_type: &'static str) -> ApiResult<Self> {
        let item = validate_item(item)?;
        let portal_type = item_type(&item);
        if declared_type != UNKNOWN_TYPE && portal_type != declared_type {
            return Err(ApiError::invalid_item(format!(
                "Invalid portal_type {} for {}",
                portal_type, declared_type
            )));
        }
        Ok(Self { item, client })
    }

    pub fn raw(&self) -> &Map<String, Value> {
        &self.item
    }

    /// `@type` as sent by the backend
    pub fn portal_type(&self) -> &str {
        item_type(&self.item)
    }

    /// Identity URL: `@id`, or the bound client's URL for items without one
    pub fn url(&self) -> &str {
        self.item
            .get(ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or_else(|| self.client.url())
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Field value; absent fields are an error, empty ones are returned as they are
    pub fn get(&self, field: &str) -> ApiResult<&Value> {
        self.item.get(field).ok_or_else(|| ApiError::FieldMissing {
            field: field.to_string(),
            portal_type: self.portal_type().to_string(),
        })
    }

    pub fn get_str(&self, field: &str) -> ApiResult<&str> {
        self.get(field)?.as_str().ok_or_else(|| ApiError::FieldType {
            field: field.to_string(),
            expected: "a string",
        })
    }

    pub fn get_u64(&self, field: &str) -> ApiResult<u64> {
        self.get(field)?.as_u64().ok_or_else(|| ApiError::FieldType {
            field: field.to_string(),
            expected: "an unsigned integer",
        })
    }

    /// Wrap the item's `parent` reference
    pub fn parent(&self) -> ApiResult<Box<dyn Model>> {
        let parent = self.get("parent")?;
        self.client.wrap(parent.clone())
    }

    /// Wrap every entry of the item's `items` collection
    pub fn items(&self) -> ApiResult<Vec<Box<dyn Model>>> {
        let items = self.get("items")?.as_array().ok_or_else(|| ApiError::FieldType {
            field: "items".to_string(),
            expected: "a list",
        })?;
        items
            .iter()
            .map(|item| self.client.wrap(item.clone()))
            .collect()
    }

    /// Replace the raw item, e.g. with a fuller representation
    pub fn update_item(&mut self, item: Value) -> ApiResult<()> {
        self.item = validate_item(item)?;
        Ok(())
    }

    /// Fetch the full item from the bound URL and replace the raw item
    pub async fn refetch(&mut self) -> ApiResult<()> {
        let item = self.client.fetch_raw().await?;
        tracing::debug!(target: "models", url = %self.client.url(), "Refetched item");
        self.update_item(item)
    }
}

impl fmt::Debug for ModelBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBase")
            .field("url", &self.url())
            .field("item", &self.item)
            .finish()
    }
}

/// Capabilities shared by every wrapped resource
pub trait Model: fmt::Debug + Send + Sync + 'static {
    /// Type this model was registered for (`_unknown_` for the fallback)
    fn declared_type(&self) -> &'static str;

    fn base(&self) -> &ModelBase;

    fn base_mut(&mut self) -> &mut ModelBase;

    fn as_any(&self) -> &dyn Any;

    fn url(&self) -> &str {
        self.base().url()
    }

    fn portal_type(&self) -> &str {
        self.base().portal_type()
    }

    fn raw(&self) -> &Map<String, Value> {
        self.base().raw()
    }

    fn client(&self) -> &Client {
        self.base().client()
    }

    fn get(&self, field: &str) -> ApiResult<&Value> {
        self.base().get(field)
    }

    fn parent(&self) -> ApiResult<Box<dyn Model>> {
        self.base().parent()
    }

    fn items(&self) -> ApiResult<Vec<Box<dyn Model>>> {
        self.base().items()
    }
}

impl dyn Model {
    pub fn downcast_ref<T: Model>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Model>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl PartialEq for dyn Model {
    fn eq(&self, other: &Self) -> bool {
        self.url() == other.url()
    }
}

/// A model registered for one concrete `@type`
pub trait ModelKind: Model + Sized {
    const PORTAL_TYPE: &'static str;

    fn from_base(base: ModelBase) -> Self;

    /// Validate and wrap `item`
    fn from_item(item: Value, client: Client) -> ApiResult<Self> {
        Ok(Self::from_base(ModelBase::new(item, client, Self::PORTAL_TYPE)?))
    }
}

/// Re-fetch support for models, usable on concrete kinds and `dyn Model`
pub trait Refetch {
    /// Replace the item with the full representation and return `self`
    fn refetch(&mut self) -> impl Future<Output = ApiResult<&mut Self>> + Send;
}

impl<T: Model + ?Sized> Refetch for T {
    async fn refetch(&mut self) -> ApiResult<&mut Self> {
        self.base_mut().refetch().await?;
        Ok(self)
    }
}

/// Check that `value` is an object with a non-empty `@type`
pub(crate) fn validate_item(value: Value) -> ApiResult<Map<String, Value>> {
    let item = match value {
        Value::Object(item) => item,
        other => {
            return Err(ApiError::invalid_item(format!(
                "Expected dict, got {}",
                json_kind(&other)
            )))
        }
    };

    let has_type = item
        .get(TYPE_KEY)
        .and_then(Value::as_str)
        .is_some_and(|t| !t.is_empty());
    if !has_type {
        return Err(ApiError::invalid_item("Missing @type in item."));
    }

    Ok(item)
}

fn item_type(item: &Map<String, Value>) -> &str {
    item.get(TYPE_KEY).and_then(Value::as_str).unwrap_or_default()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

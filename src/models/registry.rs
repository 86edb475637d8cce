//! Dispatch from `@type` to model constructors

use super::{
    validate_item, Document, Dossier, Model, ModelKind, RepositoryFolder, UnknownModel, ID_KEY,
    TYPE_KEY, UNKNOWN_TYPE,
};
use crate::client::Client;
use crate::error::{ApiError, ApiResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Constructor for a wrapped item
pub type ModelFactory = fn(Value, Client) -> ApiResult<Box<dyn Model>>;

fn construct<T: ModelKind>(item: Value, client: Client) -> ApiResult<Box<dyn Model>> {
    Ok(Box::new(T::from_item(item, client)?))
}

/// Registry of model constructors keyed by portal type.
///
/// Built once at startup and shared read-only through
/// [`ApiContext`](crate::ApiContext). New resource kinds are supported by
/// registering another constructor.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelFactory>,
}

impl ModelRegistry {
    /// Empty registry, without even the fallback model
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in models and the fallback for unknown types
    pub fn with_defaults() -> ApiResult<Self> {
        let mut registry = Self::new();
        registry.register_model::<UnknownModel>()?;
        registry.register_model::<Document>()?;
        registry.register_model::<Dossier>()?;
        registry.register_model::<RepositoryFolder>()?;
        Ok(registry)
    }

    /// Associate `portal_type` with `factory`; registering a type twice is an error
    pub fn register(&mut self, portal_type: &str, factory: ModelFactory) -> ApiResult<()> {
        if self.models.contains_key(portal_type) {
            return Err(ApiError::invalid_item(format!(
                "Duplicate model registration for {:?}",
                portal_type
            )));
        }

        tracing::debug!(target: "models", portal_type = %portal_type, "Registered model");
        self.models.insert(portal_type.to_string(), factory);
        Ok(())
    }

    /// Register a model kind under its declared portal type
    pub fn register_model<T: ModelKind>(&mut self) -> ApiResult<()> {
        self.register(T::PORTAL_TYPE, construct::<T>)
    }

    /// Constructor registered for `portal_type`
    pub fn get(&self, portal_type: &str) -> Option<ModelFactory> {
        self.models.get(portal_type).copied()
    }

    pub fn contains(&self, portal_type: &str) -> bool {
        self.models.contains_key(portal_type)
    }

    /// Registered portal types, sorted
    pub fn portal_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.models.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Wrap a backend item in the model registered for its `@type`.
    ///
    /// The model is bound to a client for the item's own `@id`; unknown types
    /// are wrapped in the fallback model.
    pub fn wrap(&self, item: Value, client: &Client) -> ApiResult<Box<dyn Model>> {
        let item = validate_item(item)?;
        let portal_type = item.get(TYPE_KEY).and_then(Value::as_str).unwrap_or_default();

        let factory = self
            .get(portal_type)
            .or_else(|| self.get(UNKNOWN_TYPE))
            .ok_or_else(|| {
                ApiError::invalid_item(format!("No model registered for {:?}", portal_type))
            })?;

        let bound = match item.get(ID_KEY).and_then(Value::as_str) {
            Some(url) => client.adopt(url)?,
            None => client.clone(),
        };

        factory(Value::Object(item), bound)
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("portal_types", &self.portal_types())
            .finish()
    }
}

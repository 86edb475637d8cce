//! Fallback model for items of unregistered types

use super::{ModelBase, UNKNOWN_TYPE};

/// Wraps any item whose `@type` has no registered model
#[derive(Debug, Clone)]
pub struct UnknownModel {
    base: ModelBase,
}

model_kind!(UnknownModel, UNKNOWN_TYPE);

//! Folders of the repository (filing plan)

use super::ModelBase;
use crate::error::ApiResult;

#[derive(Debug, Clone)]
pub struct RepositoryFolder {
    base: ModelBase,
}

model_kind!(RepositoryFolder, "opengever.repository.repositoryfolder");

impl RepositoryFolder {
    pub fn created(&self) -> ApiResult<&str> {
        self.base.get_str("created")
    }

    pub fn reference_number(&self) -> ApiResult<&str> {
        self.base.get_str("reference_number")
    }

    /// Number of children, which may exceed the length of the current `items` batch
    pub fn items_total(&self) -> ApiResult<u64> {
        self.base.get_u64("items_total")
    }
}

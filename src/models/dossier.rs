//! GEVER business case dossiers

use super::ModelBase;
use crate::error::ApiResult;

/// A business case dossier (`opengever.dossier.businesscasedossier`)
#[derive(Debug, Clone)]
pub struct Dossier {
    base: ModelBase,
}

model_kind!(Dossier, "opengever.dossier.businesscasedossier");

impl Dossier {
    pub fn title(&self) -> ApiResult<&str> {
        self.base.get_str("title")
    }

    pub fn created(&self) -> ApiResult<&str> {
        self.base.get_str("created")
    }

    /// Username of the responsible user
    pub fn responsible(&self) -> ApiResult<&str> {
        self.base.get_str("responsible")
    }

    pub fn review_state(&self) -> ApiResult<&str> {
        self.base.get_str("review_state")
    }
}

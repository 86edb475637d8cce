//! # GEVER API Client
//!
//! A Rust client for the GEVER REST API authenticating with service keys.
//!
//! ## Features
//!
//! - Service keys loaded from configurable directories, looked up by URL
//! - JWT bearer token exchange with cached sessions renewed before expiry
//! - Backend items wrapped in typed models dispatched on `@type`
//! - Listings with Vuetify data-table pagination
//!
//! ## Example
//!
//! ```no_run
//! use gever_client::{ApiContext, ClientConfig, ContentApi, Dossier, Refetch};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new().with_key_dir("/etc/gever/keys");
//!     let context = ApiContext::new(config)?;
//!
//!     let client = context.client("https://gever.example.org/fd/ordnungssystem/dossier-1", "john.doe")?;
//!     let mut model = client.fetch().await?;
//!     model.refetch().await?;
//!
//!     if let Some(dossier) = model.downcast_ref::<Dossier>() {
//!         println!("{}", dossier.title()?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod models;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use api::{ContentApi, ListingApi};
pub use auth::{Credential, CredentialStore, Session, SessionCache};
pub use client::{Client, RequestOptions};
pub use config::ClientConfig;
pub use context::ApiContext;
pub use error::{ApiError, ApiResult, RequestFailure};
pub use logging::{LogConfig, LogGuard};
pub use models::{
    Document, DocumentUpload, Dossier, Listing, Model, ModelKind, ModelRegistry, Refetch,
    RepositoryFolder, UnknownModel, VuetifyPaginator,
};

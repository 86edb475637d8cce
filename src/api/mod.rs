//! Endpoint methods implemented on [`Client`](crate::Client)

pub mod content;
pub mod listing;

pub use content::ContentApi;
pub use listing::ListingApi;

//! Service keys and authenticated sessions

pub mod assertion;
pub mod keys;
pub mod session;

pub use assertion::{unfrozen_now, GRANT_TYPE};
pub use keys::{Credential, CredentialStore, LoadSummary, TOKEN_ENDPOINT_SUFFIX};
pub use session::{BearerToken, Session, SessionCache};

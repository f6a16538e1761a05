//! Session resolution: turning "the identity provider says X is signed in"
//! into "this is the application user", including recovery for the gap where
//! an identity exists but its profile write has not landed yet.

pub mod backoff;
pub mod error;
pub mod reconciler;
pub mod registry;
pub mod routes;
pub mod service;
pub mod store;

pub use backoff::Backoff;
pub use error::SessionError;
pub use reconciler::{Reconciler, SessionState};
pub use registry::SessionRegistry;
pub use service::{SessionOutcome, SessionService};
pub use store::{IdentityOps, ProfileStore};

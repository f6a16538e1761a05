use thiserror::Error;
use uuid::Uuid;

/// Ways session resolution can fail. Every variant except `ActionInFlight`
/// is fatal for the session: the service responds by revoking the identity's
/// tokens and reporting the session absent.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The profile was written but reads still miss it after the bounded
    /// retry schedule ran out.
    #[error("profile for identity {0} not yet visible after bounded retries")]
    ProfileNotYetVisible(Uuid),

    /// A password identity with no profile and no registration in flight.
    /// This is the residue of a registration whose profile write failed.
    #[error("no profile exists for identity {0}")]
    ProfileMissing(Uuid),

    #[error("unsupported identity provider '{0}'")]
    UnsupportedProvider(String),

    /// Another explicit auth action currently owns this identity's session.
    #[error("another auth action is in flight for identity {0}")]
    ActionInFlight(Uuid),

    #[error("profile store: {0}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for SessionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

impl SessionError {
    /// True when the error means the signed-in identity cannot be mapped to a
    /// usable session and must be signed out.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ActionInFlight(_))
    }
}

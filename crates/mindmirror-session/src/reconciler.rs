use mindmirror_types::api::SessionStatus;
use mindmirror_types::models::{Identity, Provider, RoleFields, UserProfile};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backoff::Backoff;
use crate::error::SessionError;
use crate::store::ProfileStore;

/// Where a session currently stands. Exactly one of these holds at any time;
/// there is no boolean soup to keep consistent.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// No identity signed in.
    #[default]
    Unresolved,
    /// An identity is signed in and resolution is in flight.
    Resolving,
    /// Identity mapped onto an existing profile.
    ResolvedKnown(UserProfile),
    /// Identity had no profile; a default one was synthesized and persisted.
    ResolvedNew(UserProfile),
    /// Identity could not be mapped onto a usable profile and was signed out.
    ResolvedAbsent,
}

impl SessionState {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            Self::ResolvedKnown(user) | Self::ResolvedNew(user) => Some(user),
            _ => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Unresolved => SessionStatus::Unresolved,
            Self::Resolving => SessionStatus::Resolving,
            Self::ResolvedKnown(_) => SessionStatus::Known,
            Self::ResolvedNew(_) => SessionStatus::New,
            Self::ResolvedAbsent => SessionStatus::Absent,
        }
    }
}

/// Maps a signed-in identity onto its profile document.
///
/// The interesting case is the miss: registration writes the identity and the
/// profile as two separate calls, so a signed-in identity without a visible
/// profile is either replication lag (retry with backoff), a federated
/// first-timer (synthesize a patient profile), or the residue of a failed
/// registration (fatal).
pub struct Reconciler<S> {
    store: S,
    backoff: Backoff,
}

impl<S: ProfileStore> Reconciler<S> {
    pub fn new(store: S, backoff: Backoff) -> Self {
        Self { store, backoff }
    }

    /// Resolves one signed-in identity. `freshly_registered` is true only on
    /// the registration call itself, where the profile write just happened
    /// and may lag behind reads.
    pub async fn resolve(
        &self,
        identity: &Identity,
        freshly_registered: bool,
    ) -> Result<SessionState, SessionError> {
        if let Some(profile) = self.store.fetch_profile(identity.id).await? {
            debug!("Resolved identity {} to existing profile", identity.id);
            return Ok(SessionState::ResolvedKnown(merge_identity_fields(
                identity, profile,
            )));
        }

        match &identity.provider {
            Provider::Google => {
                // First federated sign-in: nobody ever collected a role from
                // this person, so they start as an unlinked patient.
                let profile = default_patient_profile(identity);
                self.store.create_profile(&profile).await?;
                let seen = self.await_profile(identity.id).await?;
                info!("Created default patient profile for federated identity {}", identity.id);
                Ok(SessionState::ResolvedNew(merge_identity_fields(identity, seen)))
            }
            Provider::Password if freshly_registered => {
                let seen = self.await_profile(identity.id).await?;
                Ok(SessionState::ResolvedKnown(merge_identity_fields(identity, seen)))
            }
            Provider::Password => Err(SessionError::ProfileMissing(identity.id)),
            Provider::Other(provider) => {
                Err(SessionError::UnsupportedProvider(provider.clone()))
            }
        }
    }

    /// Re-reads until the profile becomes visible, on the bounded backoff
    /// schedule. Distinguishes "not yet visible" from "does not exist" by
    /// giving the write a fair chance to land, then giving up loudly.
    async fn await_profile(&self, id: Uuid) -> Result<UserProfile, SessionError> {
        if let Some(profile) = self.store.fetch_profile(id).await? {
            return Ok(profile);
        }
        for delay in self.backoff.delays() {
            tokio::time::sleep(delay).await;
            if let Some(profile) = self.store.fetch_profile(id).await? {
                return Ok(profile);
            }
        }
        Err(SessionError::ProfileNotYetVisible(id))
    }
}

/// Provider-reported fields win over whatever the profile has stored, falling
/// back to the profile copy when the provider sends nothing.
fn merge_identity_fields(identity: &Identity, mut profile: UserProfile) -> UserProfile {
    if !identity.email.is_empty() {
        profile.email = identity.email.clone();
    }
    if !identity.name.is_empty() {
        profile.name = identity.name.clone();
    }
    profile
}

fn default_patient_profile(identity: &Identity) -> UserProfile {
    let name = if identity.name.is_empty() {
        "New User".to_owned()
    } else {
        identity.name.clone()
    };
    UserProfile {
        id: identity.id,
        email: identity.email.clone(),
        name,
        role: RoleFields::Patient {
            linked_doctor_code: None,
        },
        created_at: chrono::Utc::now(),
    }
}

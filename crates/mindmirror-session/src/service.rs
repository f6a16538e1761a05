use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use mindmirror_types::models::Identity;

use crate::backoff::Backoff;
use crate::error::SessionError;
use crate::reconciler::{Reconciler, SessionState};
use crate::registry::SessionRegistry;
use crate::store::{IdentityOps, ProfileStore};

/// What one resolution pass produced. `state` is the observable result;
/// when resolution failed fatally the identity's tokens were already revoked
/// and `reason` says why.
#[derive(Debug)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub forced_sign_out: bool,
    pub reason: Option<SessionError>,
}

impl SessionOutcome {
    fn resolved(state: SessionState) -> Self {
        Self {
            state,
            forced_sign_out: false,
            reason: None,
        }
    }
}

/// Session resolution with its state keeping and provider side effects wired
/// together. One instance serves the whole process; per-identity coordination
/// lives in the registry.
pub struct SessionService<S, I> {
    reconciler: Reconciler<S>,
    identities: I,
    registry: Arc<SessionRegistry>,
}

impl<S: ProfileStore, I: IdentityOps> SessionService<S, I> {
    pub fn new(store: S, identities: I, backoff: Backoff) -> Self {
        Self {
            reconciler: Reconciler::new(store, backoff),
            identities,
            registry: SessionRegistry::new(),
        }
    }

    pub fn snapshot(&self, id: Uuid) -> SessionState {
        self.registry.snapshot(id)
    }

    /// Resolution on behalf of an explicit auth action (register, login,
    /// federated callback). The action owns the session slot for its whole
    /// duration; a concurrent action is an error the caller surfaces.
    pub async fn resolve_action(
        &self,
        identity: &Identity,
        freshly_registered: bool,
    ) -> Result<SessionOutcome, SessionError> {
        let Some(guard) = self.registry.begin_action(identity.id) else {
            return Err(SessionError::ActionInFlight(identity.id));
        };
        Ok(self.run(guard, identity, freshly_registered).await)
    }

    /// Resolution on behalf of a passive session check. Defers to any writer
    /// already in flight by reporting the current snapshot unchanged.
    pub async fn resolve_passive(&self, identity: &Identity) -> SessionOutcome {
        let Some(guard) = self.registry.begin_reconcile(identity.id) else {
            return SessionOutcome::resolved(self.registry.snapshot(identity.id));
        };
        self.run(guard, identity, false).await
    }

    /// Explicit sign-out: revoke tokens and clear the session slot.
    pub async fn sign_out(&self, id: Uuid) -> anyhow::Result<()> {
        self.identities.force_sign_out(id).await?;
        match self.registry.begin_action(id) {
            Some(guard) => {
                guard.finish(SessionState::Unresolved);
            }
            None => warn!("Sign-out for identity {} raced another auth action", id),
        }
        Ok(())
    }

    async fn run(
        &self,
        guard: crate::registry::PhaseGuard,
        identity: &Identity,
        freshly_registered: bool,
    ) -> SessionOutcome {
        match self.reconciler.resolve(identity, freshly_registered).await {
            Ok(state) => {
                guard.finish(state.clone());
                SessionOutcome::resolved(state)
            }
            Err(err) => {
                warn!(
                    "Session resolution failed for identity {}: {}; signing out",
                    identity.id, err
                );
                if let Err(revoke_err) = self.identities.force_sign_out(identity.id).await {
                    error!(
                        "Failed to revoke tokens for identity {}: {}",
                        identity.id, revoke_err
                    );
                }
                // The slot returns to unresolved; the caller still sees the
                // absent resolution it should report.
                guard.finish(SessionState::Unresolved);
                SessionOutcome {
                    state: SessionState::ResolvedAbsent,
                    forced_sign_out: true,
                    reason: Some(err),
                }
            }
        }
    }
}

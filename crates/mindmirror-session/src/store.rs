use async_trait::async_trait;
use mindmirror_types::models::UserProfile;
use uuid::Uuid;

/// Where profiles live. Production wires this to SQLite; tests script it with
/// in-memory stores so visibility lag and write failures are deterministic.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, id: Uuid) -> anyhow::Result<Option<UserProfile>>;
    async fn create_profile(&self, profile: &UserProfile) -> anyhow::Result<()>;
}

/// Side effects on the identity provider that session resolution may demand.
#[async_trait]
pub trait IdentityOps: Send + Sync {
    /// Revokes every outstanding token for the identity.
    async fn force_sign_out(&self, id: Uuid) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: ProfileStore + ?Sized> ProfileStore for std::sync::Arc<T> {
    async fn fetch_profile(&self, id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        (**self).fetch_profile(id).await
    }

    async fn create_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        (**self).create_profile(profile).await
    }
}

#[async_trait]
impl<T: IdentityOps + ?Sized> IdentityOps for std::sync::Arc<T> {
    async fn force_sign_out(&self, id: Uuid) -> anyhow::Result<()> {
        (**self).force_sign_out(id).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Profile store whose reads can be made to miss a profile for the first
    /// N fetches, mimicking a write that has not become visible yet.
    #[derive(Default)]
    pub struct LaggyProfiles {
        profiles: Mutex<HashMap<Uuid, UserProfile>>,
        hide_for: Mutex<HashMap<Uuid, u32>>,
        fetches: AtomicU32,
        creates: Mutex<Vec<UserProfile>>,
    }

    impl LaggyProfiles {
        pub fn with_profile(profile: UserProfile) -> Self {
            let store = Self::default();
            store.profiles.lock().unwrap().insert(profile.id, profile);
            store
        }

        /// The next `n` fetches for `id` return `None` even if the profile
        /// is present.
        pub fn hide_for(&self, id: Uuid, n: u32) {
            self.hide_for.lock().unwrap().insert(id, n);
        }

        pub fn fetch_count(&self) -> u32 {
            self.fetches.load(Ordering::SeqCst)
        }

        pub fn created(&self) -> Vec<UserProfile> {
            self.creates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProfileStore for LaggyProfiles {
        async fn fetch_profile(&self, id: Uuid) -> anyhow::Result<Option<UserProfile>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut hidden = self.hide_for.lock().unwrap();
            if let Some(left) = hidden.get_mut(&id) {
                if *left > 0 {
                    *left -= 1;
                    return Ok(None);
                }
            }
            drop(hidden);
            Ok(self.profiles.lock().unwrap().get(&id).cloned())
        }

        async fn create_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
            self.creates.lock().unwrap().push(profile.clone());
            self.profiles
                .lock()
                .unwrap()
                .insert(profile.id, profile.clone());
            Ok(())
        }
    }

    /// Store whose every read fails, for the fetch-error path.
    pub struct BrokenProfiles;

    #[async_trait]
    impl ProfileStore for BrokenProfiles {
        async fn fetch_profile(&self, _id: Uuid) -> anyhow::Result<Option<UserProfile>> {
            Err(anyhow::anyhow!("store unavailable"))
        }

        async fn create_profile(&self, _profile: &UserProfile) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("store unavailable"))
        }
    }

    /// Records forced sign-outs instead of touching a real provider.
    #[derive(Default)]
    pub struct RecordingIdentityOps {
        signed_out: Mutex<Vec<Uuid>>,
    }

    impl RecordingIdentityOps {
        pub fn signed_out(&self) -> Vec<Uuid> {
            self.signed_out.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityOps for RecordingIdentityOps {
        async fn force_sign_out(&self, id: Uuid) -> anyhow::Result<()> {
            self.signed_out.lock().unwrap().push(id);
            Ok(())
        }
    }
}

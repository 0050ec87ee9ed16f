//! Volatile session storage tied to a successful authentication.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

/// An authenticated session as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub display_name: Option<String>,
}

/// Process-wide session store.
///
/// All three fields are written together: after any authentication outcome
/// the store holds either a complete session or nothing. Cleared on logout
/// and on authentication failure. Nothing is persisted beyond the process.
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored session in a single write.
    pub async fn establish(
        &self,
        access_token: String,
        user_id: String,
        display_name: Option<String>,
    ) {
        let session = Session {
            access_token,
            user_id,
            display_name,
        };
        *self.inner.write().await = Some(session);
        info!("session established");
    }

    /// Drop every session field in a single write.
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    pub async fn snapshot(&self) -> Option<Session> {
        self.inner.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|s| s.access_token.clone())
    }

    pub async fn user_id(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|s| s.user_id.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn establish_sets_all_fields() {
        let store = SessionStore::new();
        store
            .establish("T".into(), "U1".into(), Some("Alice".into()))
            .await;

        let session = store.snapshot().await.unwrap();
        assert_eq!(session.access_token, "T");
        assert_eq!(session.user_id, "U1");
        assert_eq!(session.display_name.as_deref(), Some("Alice"));
        assert!(store.is_authenticated().await);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let store = SessionStore::new();
        store.establish("T".into(), "U1".into(), None).await;
        store.clear().await;

        assert!(store.snapshot().await.is_none());
        assert!(store.access_token().await.is_none());
        assert!(store.user_id().await.is_none());
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn re_establish_replaces_previous_session() {
        let store = SessionStore::new();
        store
            .establish("T1".into(), "U1".into(), Some("Alice".into()))
            .await;
        store.establish("T2".into(), "U2".into(), None).await;

        let session = store.snapshot().await.unwrap();
        assert_eq!(session.access_token, "T2");
        assert_eq!(session.user_id, "U2");
        assert!(session.display_name.is_none());
    }
}

//! Invitation persistence over a key-value seam.
//!
//! The host environment supplies durable storage through [`KeyValueStore`];
//! the crate ships an in-memory implementation for tests and the CLI. Records
//! live as JSON lists under two well-known keys, upserted by id, so the
//! backing store only ever needs get/set/remove of opaque strings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::pipeline::Invitation;
use crate::publish::PublishedInvitation;

pub const SAVED_KEY: &str = "saved_invitations";
pub const PUBLISHED_KEY: &str = "published_invitations";

// ---------------------------------------------------------------------------
// Key-value seam
// ---------------------------------------------------------------------------

/// External persistence boundary: opaque string values keyed by string.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory backend.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.data.write().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Invitation store
// ---------------------------------------------------------------------------

pub struct InvitationStore {
    backend: Arc<dyn KeyValueStore>,
    /// Serializes read-modify-write cycles on the record lists. Backends
    /// yield between get and set, so without this two concurrent saves read
    /// the same list and the later write erases the earlier one.
    mutation: Mutex<()>,
}

impl InvitationStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            mutation: Mutex::new(()),
        }
    }

    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.backend.get(key).await? {
            Some(json) => serde_json::from_str(&json).map_err(Error::from),
            None => Ok(Vec::new()),
        }
    }

    async fn write_list<T: Serialize>(&self, key: &str, list: &[T]) -> Result<()> {
        let json = serde_json::to_string(list)?;
        self.backend.set(key, json).await
    }

    /// Upsert an invitation into the saved list, keyed by id. Insertion
    /// order is preserved; an update keeps the record's position.
    pub async fn save(&self, invitation: Invitation) -> Result<()> {
        let _guard = self.mutation.lock().await;
        let mut list: Vec<Invitation> = self.read_list(SAVED_KEY).await?;
        match list.iter_mut().find(|i| i.id == invitation.id) {
            Some(slot) => *slot = invitation,
            None => list.push(invitation),
        }
        self.write_list(SAVED_KEY, &list).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Invitation>> {
        let list: Vec<Invitation> = self.read_list(SAVED_KEY).await?;
        Ok(list.into_iter().find(|i| i.id == id))
    }

    pub async fn saved(&self) -> Result<Vec<Invitation>> {
        self.read_list(SAVED_KEY).await
    }

    /// Linear scan over the saved list for records carrying this owner id.
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<Invitation>> {
        let list: Vec<Invitation> = self.read_list(SAVED_KEY).await?;
        Ok(list
            .into_iter()
            .filter(|i| i.owner.as_deref() == Some(owner))
            .collect())
    }

    /// Remove a saved invitation. Returns whether a record was deleted.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.mutation.lock().await;
        let mut list: Vec<Invitation> = self.read_list(SAVED_KEY).await?;
        let before = list.len();
        list.retain(|i| i.id != id);
        let deleted = list.len() != before;
        if deleted {
            self.write_list(SAVED_KEY, &list).await?;
        }
        Ok(deleted)
    }

    pub async fn published(&self) -> Result<Vec<PublishedInvitation>> {
        self.read_list(PUBLISHED_KEY).await
    }

    /// Append (or replace by id) a published record. Only called after a
    /// successful deploy.
    pub(crate) async fn record_published(&self, record: PublishedInvitation) -> Result<()> {
        let _guard = self.mutation.lock().await;
        let mut list: Vec<PublishedInvitation> = self.read_list(PUBLISHED_KEY).await?;
        match list.iter_mut().find(|p| p.invitation.id == record.invitation.id) {
            Some(slot) => *slot = record,
            None => list.push(record),
        }
        self.write_list(PUBLISHED_KEY, &list).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{new_invitation_id, OutputFormat};
    use crate::substitute::Customization;
    use chrono::Utc;

    fn invitation(owner: Option<&str>) -> Invitation {
        Invitation {
            id: new_invitation_id(),
            template_id: "boda-elegante".to_string(),
            customization: Customization {
                template_id: "boda-elegante".to_string(),
                ..Default::default()
            },
            format: OutputFormat::Document,
            content: b"<html></html>".to_vec(),
            uri: "data:text/html;base64,PGh0bWw+PC9odG1sPg==".to_string(),
            thumbnail: None,
            generated_at: Utc::now(),
            owner: owner.map(String::from),
        }
    }

    fn store() -> InvitationStore {
        InvitationStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn save_and_get_round_trip() {
        let store = store();
        let inv = invitation(None);
        let id = inv.id.clone();
        store.save(inv).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.content, b"<html></html>");
        assert!(store.get("inv_0_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_upserts_by_id() {
        let store = store();
        let mut inv = invitation(None);
        let id = inv.id.clone();
        store.save(inv.clone()).await.unwrap();

        inv.customization.title = Some("Actualizado".to_string());
        store.save(inv).await.unwrap();

        let all = store.saved().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            all[0].customization.title.as_deref(),
            Some("Actualizado")
        );
        assert_eq!(all[0].id, id);
    }

    #[tokio::test]
    async fn list_by_owner_filters() {
        let store = store();
        store.save(invitation(Some("user-1"))).await.unwrap();
        store.save(invitation(Some("user-2"))).await.unwrap();
        store.save(invitation(Some("user-1"))).await.unwrap();
        store.save(invitation(None)).await.unwrap();

        assert_eq!(store.list_by_owner("user-1").await.unwrap().len(), 2);
        assert_eq!(store.list_by_owner("user-2").await.unwrap().len(), 1);
        assert!(store.list_by_owner("user-3").await.unwrap().is_empty());
    }

    /// Backend that yields (and sleeps) inside get/set, like any real I/O
    /// store would.
    struct SlowStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl KeyValueStore for SlowStore {
        async fn get(&self, key: &str) -> crate::error::Result<Option<String>> {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> crate::error::Result<()> {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> crate::error::Result<()> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn concurrent_saves_keep_every_record() {
        let store = Arc::new(InvitationStore::new(Arc::new(SlowStore {
            inner: MemoryStore::new(),
        })));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let inv = invitation(None);
            handles.push(tokio::spawn(async move { store.save(inv).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.saved().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn delete_removes_only_the_target() {
        let store = store();
        let a = invitation(None);
        let b = invitation(None);
        let a_id = a.id.clone();
        store.save(a).await.unwrap();
        store.save(b).await.unwrap();

        assert!(store.delete(&a_id).await.unwrap());
        assert!(!store.delete(&a_id).await.unwrap());
        assert_eq!(store.saved().await.unwrap().len(), 1);
    }
}

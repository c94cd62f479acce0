//! Publish coordinator – subdomain derivation and simulated deployment.
//!
//! Publishing turns a generated invitation into a public site: derive a
//! unique slug, deploy through the [`DeployEndpoint`] seam under a bounded
//! timeout, and only then persist the published record. A failed deploy
//! leaves the published list untouched, so the whole operation is safe to
//! retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::{random_suffix, Invitation};
use crate::store::InvitationStore;
use crate::substitute::event_year;

// ---------------------------------------------------------------------------
// Records and configuration
// ---------------------------------------------------------------------------

/// A successfully deployed invitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedInvitation {
    pub invitation: Invitation,
    pub subdomain: String,
    pub public_url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Apex domain the subdomain hangs off, e.g. `inviteu.digital`.
    pub domain: String,
    pub deploy_timeout: Duration,
    /// Bound on slug re-derivation when a collision is found.
    pub max_slug_attempts: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            domain: "inviteu.digital".to_string(),
            deploy_timeout: Duration::from_secs(30),
            max_slug_attempts: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Deploy seam
// ---------------------------------------------------------------------------

/// Target that makes a subdomain live.
#[async_trait]
pub trait DeployEndpoint: Send + Sync {
    async fn deploy(
        &self,
        subdomain: &str,
        invitation: &Invitation,
    ) -> std::result::Result<(), String>;
}

/// Stand-in deployment: waits out a fixed delay and reports success.
pub struct SimulatedDeploy {
    pub delay: Duration,
}

impl SimulatedDeploy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedDeploy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl DeployEndpoint for SimulatedDeploy {
    async fn deploy(
        &self,
        subdomain: &str,
        _invitation: &Invitation,
    ) -> std::result::Result<(), String> {
        log::debug!("deploying subdomain '{subdomain}'");
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Publisher {
    store: Arc<InvitationStore>,
    endpoint: Arc<dyn DeployEndpoint>,
    config: PublishConfig,
}

impl Publisher {
    pub fn new(
        store: Arc<InvitationStore>,
        endpoint: Arc<dyn DeployEndpoint>,
        config: PublishConfig,
    ) -> Self {
        Self {
            store,
            endpoint,
            config,
        }
    }

    /// Publish an invitation: unique slug, deploy, persist, return the
    /// record. Each call produces a fresh slug even for the same invitation.
    pub async fn publish(&self, invitation: Invitation) -> Result<PublishedInvitation> {
        let subdomain = self.free_subdomain(&invitation).await?;
        let public_url = format!("https://{}.{}", subdomain, self.config.domain);

        let deployed = tokio::time::timeout(
            self.config.deploy_timeout,
            self.endpoint.deploy(&subdomain, &invitation),
        )
        .await
        .map_err(|_| Error::Deploy {
            reason: format!("timed out after {:?}", self.config.deploy_timeout),
        })?;
        deployed.map_err(|reason| Error::Deploy { reason })?;

        let record = PublishedInvitation {
            invitation,
            subdomain: subdomain.clone(),
            public_url: public_url.clone(),
            published_at: Utc::now(),
        };
        self.store.record_published(record.clone()).await?;
        log::info!("published {public_url}");
        Ok(record)
    }

    /// Derive a slug and verify it against already-published records,
    /// re-deriving on collision up to the configured bound.
    async fn free_subdomain(&self, invitation: &Invitation) -> Result<String> {
        let taken: Vec<String> = self
            .store
            .published()
            .await?
            .into_iter()
            .map(|p| p.subdomain)
            .collect();

        for _ in 0..self.config.max_slug_attempts {
            let candidate = derive_subdomain(invitation);
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(Error::Deploy {
            reason: format!(
                "no free subdomain after {} attempts",
                self.config.max_slug_attempts
            ),
        })
    }
}

/// `slugify(names)-<event year>-<6 random alphanumerics>`, with "evento"
/// standing in when no names were given and the current year when the event
/// date is absent or malformed.
pub fn derive_subdomain(invitation: &Invitation) -> String {
    let names = invitation
        .customization
        .names
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("evento");
    let year = event_year(&invitation.customization);
    format!("{}-{}-{}", slug::slugify(names), year, random_suffix(6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{new_invitation_id, OutputFormat};
    use crate::store::MemoryStore;
    use crate::substitute::Customization;

    fn invitation() -> Invitation {
        Invitation {
            id: new_invitation_id(),
            template_id: "boda-elegante".to_string(),
            customization: Customization {
                template_id: "boda-elegante".to_string(),
                names: Some("Ana y Luis".to_string()),
                date: Some("2025-06-20".to_string()),
                ..Default::default()
            },
            format: OutputFormat::Document,
            content: b"<html></html>".to_vec(),
            uri: String::new(),
            thumbnail: None,
            generated_at: Utc::now(),
            owner: None,
        }
    }

    struct FailingDeploy;

    #[async_trait]
    impl DeployEndpoint for FailingDeploy {
        async fn deploy(
            &self,
            _subdomain: &str,
            _invitation: &Invitation,
        ) -> std::result::Result<(), String> {
            Err("edge node rejected upload".to_string())
        }
    }

    fn publisher(endpoint: Arc<dyn DeployEndpoint>) -> (Publisher, Arc<InvitationStore>) {
        let store = Arc::new(InvitationStore::new(Arc::new(MemoryStore::new())));
        let publisher = Publisher::new(Arc::clone(&store), endpoint, PublishConfig::default());
        (publisher, store)
    }

    #[test]
    fn subdomain_shape() {
        let sub = derive_subdomain(&invitation());
        let mut parts = sub.rsplitn(2, '-');
        let suffix = parts.next().unwrap();
        let head = parts.next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(head.starts_with("ana-y-luis-2025"));
    }

    #[test]
    fn subdomain_defaults_without_names() {
        let mut inv = invitation();
        inv.customization.names = None;
        inv.customization.date = None;
        let sub = derive_subdomain(&inv);
        assert!(sub.starts_with(&format!("evento-{}", Utc::now().format("%Y"))));
    }

    #[tokio::test]
    async fn publish_persists_after_deploy_success() {
        let (publisher, store) =
            publisher(Arc::new(SimulatedDeploy::new(Duration::ZERO)));
        let record = publisher.publish(invitation()).await.unwrap();

        assert!(record
            .public_url
            .starts_with(&format!("https://{}.", record.subdomain)));
        let published = store.published().await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].subdomain, record.subdomain);
    }

    #[tokio::test]
    async fn failed_deploy_leaves_published_list_unchanged() {
        let (publisher, store) = publisher(Arc::new(FailingDeploy));
        match publisher.publish(invitation()).await {
            Err(Error::Deploy { reason }) => assert!(reason.contains("rejected")),
            other => panic!("expected Deploy error, got {:?}", other.err()),
        }
        assert!(store.published().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn republishing_yields_a_fresh_subdomain() {
        let (publisher, _store) =
            publisher(Arc::new(SimulatedDeploy::new(Duration::ZERO)));
        let inv = invitation();
        let first = publisher.publish(inv.clone()).await.unwrap();
        let second = publisher.publish(inv).await.unwrap();
        assert_ne!(first.subdomain, second.subdomain);
    }
}

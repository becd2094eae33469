//! Keeps a Drive change watch alive for one site.
//!
//! Drive watch channels expire, so registration runs on a timer. A short-TTL
//! lease in the subscription store makes sure only one process registers the
//! watch per cycle; everyone else observes the lease and backs off.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::services::drive::DriveApi;
use crate::services::store::{StoreError, SubscriptionStore};

/// How long a registered watch channel lives on the provider side.
pub const WATCH_LIFETIME: Duration = Duration::from_secs(599);

/// The renewal timer runs one second longer than the watch lifetime, so the
/// previous cycle's lease has always expired by the time we try to take it.
pub const RENEWAL_MARGIN: Duration = Duration::from_secs(1);

/// What a single renewal cycle decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Lease taken and the watch registered with the provider.
    Registered,
    /// Lease held elsewhere on our very first cycle. The holder may be a
    /// leftover from a previous run of this process, so try once more.
    Deferred,
    /// Lease held elsewhere after we have cycled before. Another live process
    /// owns the watch; this renewer is redundant.
    AlreadyActive,
    /// Lease taken but the provider rejected the registration.
    SubscribeFailed,
}

pub struct WatchRenewer {
    site: String,
    document_id: String,
    address: String,
    store: Arc<dyn SubscriptionStore>,
    drive: Arc<dyn DriveApi>,
    attempts: u32,
}

impl WatchRenewer {
    pub fn new(
        site: &str,
        document_id: &str,
        address: &str,
        store: Arc<dyn SubscriptionStore>,
        drive: Arc<dyn DriveApi>,
    ) -> Self {
        Self {
            site: site.to_string(),
            document_id: document_id.to_string(),
            address: address.to_string(),
            store,
            drive,
            attempts: 0,
        }
    }

    /// Runs one renewal cycle. Errors from the store abort the cycle; a
    /// rejected registration does not, so the next cycle can retry it.
    pub async fn tick(&mut self) -> Result<TickOutcome, StoreError> {
        self.attempts += 1;

        let acquired = self
            .store
            .try_set_webhook_flag(&self.document_id, WATCH_LIFETIME)
            .await?;

        if !acquired {
            if self.attempts == 1 {
                info!(
                    site = %self.site,
                    document = %self.document_id,
                    "watch lease held elsewhere, retrying next cycle"
                );
                return Ok(TickOutcome::Deferred);
            }
            debug!("watch for {} already active elsewhere, standing down", self.document_id);
            return Ok(TickOutcome::AlreadyActive);
        }

        let channel = match self.drive.watch_file(&self.document_id, &self.address).await {
            Ok(channel) => channel,
            Err(err) => {
                error!(
                    site = %self.site,
                    document = %self.document_id,
                    "watch registration failed: {}",
                    err
                );
                return Ok(TickOutcome::SubscribeFailed);
            }
        };

        // Without this mapping, notifications for the new channel cannot be
        // resolved to a document until the next successful cycle.
        if let Err(err) = self
            .store
            .set_resource_document(&channel.resource_id, &self.document_id)
            .await
        {
            error!(
                "failed to persist resource mapping {} -> {}: {}",
                channel.resource_id, self.document_id, err
            );
        }

        info!(
            site = %self.site,
            document = %self.document_id,
            resource = %channel.resource_id,
            "registered change watch"
        );
        Ok(TickOutcome::Registered)
    }

    /// Renews forever, stopping once another process clearly owns the watch
    /// or the store becomes unusable.
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(WATCH_LIFETIME + RENEWAL_MARGIN);
        loop {
            timer.tick().await;
            match self.tick().await {
                Ok(TickOutcome::AlreadyActive) => return,
                Ok(_) => {}
                Err(err) => {
                    error!("watch renewal for {} stopped: {}", self.document_id, err);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::services::store::MemoryStore;
    use crate::test_support::{FailingStore, FakeDrive};

    const ADDRESS: &str = "https://watcher.example.com/api/hooks/drive/docs";

    fn renewer(
        store: Arc<dyn SubscriptionStore>,
        drive: Arc<dyn DriveApi>,
    ) -> WatchRenewer {
        WatchRenewer::new("docs", "root-folder", ADDRESS, store, drive)
    }

    #[tokio::test]
    async fn first_cycle_registers_and_persists_the_mapping() {
        let store = Arc::new(MemoryStore::new());
        let drive = Arc::new(FakeDrive::new().with_resource_id("resource-9"));

        let outcome = renewer(store.clone(), drive.clone()).tick().await.unwrap();

        assert_eq!(outcome, TickOutcome::Registered);
        assert_eq!(
            drive.watch_calls(),
            vec![("root-folder".to_string(), ADDRESS.to_string())]
        );
        assert_eq!(
            store.get_resource_document("resource-9").await.unwrap(),
            "root-folder"
        );
    }

    #[tokio::test]
    async fn held_lease_defers_the_first_cycle() {
        let store = Arc::new(MemoryStore::new());
        let drive = Arc::new(FakeDrive::new());
        assert!(store
            .try_set_webhook_flag("root-folder", Duration::from_secs(60))
            .await
            .unwrap());

        let outcome = renewer(store, drive.clone()).tick().await.unwrap();

        assert_eq!(outcome, TickOutcome::Deferred);
        assert!(drive.watch_calls().is_empty());
    }

    #[tokio::test]
    async fn held_lease_on_a_later_cycle_stands_down() {
        let store = Arc::new(MemoryStore::new());
        let drive = Arc::new(FakeDrive::new());
        let mut renewer = renewer(store, drive.clone());

        assert_eq!(renewer.tick().await.unwrap(), TickOutcome::Registered);
        // Our own lease is still live, which reads the same as another
        // process holding it.
        assert_eq!(renewer.tick().await.unwrap(), TickOutcome::AlreadyActive);
        assert_eq!(drive.watch_calls().len(), 1);
    }

    #[tokio::test]
    async fn rejected_registration_leaves_no_mapping() {
        let store = Arc::new(MemoryStore::new());
        let drive = Arc::new(FakeDrive::new().with_failing_watch());

        let outcome = renewer(store.clone(), drive).tick().await.unwrap();

        assert_eq!(outcome, TickOutcome::SubscribeFailed);
        assert!(matches!(
            store.get_resource_document("resource-1").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_an_error() {
        let result = renewer(Arc::new(FailingStore), Arc::new(FakeDrive::new()))
            .tick()
            .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    struct LeaseOnlyStore;

    #[async_trait]
    impl SubscriptionStore for LeaseOnlyStore {
        async fn get_resource_document(&self, _resource_id: &str) -> Result<String, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn set_resource_document(
            &self,
            _resource_id: &str,
            _document_id: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("write refused".to_string()))
        }

        async fn get_document_folder(&self, _document_id: &str) -> Result<String, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn set_document_folder(
            &self,
            _document_id: &str,
            _path: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("write refused".to_string()))
        }

        async fn try_set_webhook_flag(
            &self,
            _document_id: &str,
            _ttl: Duration,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn mapping_write_failure_still_counts_as_registered() {
        let drive = Arc::new(FakeDrive::new());

        let outcome = renewer(Arc::new(LeaseOnlyStore), drive.clone())
            .tick()
            .await
            .unwrap();

        assert_eq!(outcome, TickOutcome::Registered);
        assert_eq!(drive.watch_calls().len(), 1);
    }
}

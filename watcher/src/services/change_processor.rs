//! Drains one site's change queue and turns each change into publishes.
//!
//! Failures here are logged and dropped rather than propagated. A change we
//! cannot process is gone until the document changes again; the notification
//! channel has no redelivery.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use drivesync_config::sites::SiteConfig;
use drivesync_models::change::DriveChange;
use drivesync_models::drive::DriveItemKind;
use drivesync_models::publish::PublishRequest;
use drivesync_utils::unique_queue::UniqueQueue;

use crate::services::crawler;
use crate::services::drive::DriveApi;
use crate::services::publisher::Publisher;
use crate::services::store::SubscriptionStore;

pub struct ChangeProcessor {
    site: SiteConfig,
    queue: Arc<UniqueQueue<DriveChange>>,
    store: Arc<dyn SubscriptionStore>,
    drive: Arc<dyn DriveApi>,
    publisher: Arc<dyn Publisher>,
    throttle: Duration,
}

impl ChangeProcessor {
    pub fn new(
        site: SiteConfig,
        queue: Arc<UniqueQueue<DriveChange>>,
        store: Arc<dyn SubscriptionStore>,
        drive: Arc<dyn DriveApi>,
        publisher: Arc<dyn Publisher>,
        throttle: Duration,
    ) -> Self {
        Self {
            site,
            queue,
            store,
            drive,
            publisher,
            throttle,
        }
    }

    /// Processes changes until the queue closes. The sleep between changes
    /// spaces out Drive API calls; notification bursts are already collapsed
    /// by the queue itself.
    pub async fn run(self) {
        info!("change processor for site {} started", self.site.name);
        while let Some(change) = self.queue.pop().await {
            self.handle_change(change).await;
            tokio::time::sleep(self.throttle).await;
        }
        info!("change queue for site {} closed, processor exiting", self.site.name);
    }

    async fn handle_change(&self, change: DriveChange) {
        let file = match self.drive.get_file(&change.document_id).await {
            Ok(file) => file,
            Err(err) => {
                error!(
                    site = %self.site.name,
                    document = %change.document_id,
                    "metadata lookup failed, dropping change: {}",
                    err
                );
                return;
            }
        };

        match file.kind() {
            DriveItemKind::Folder => self.sync_folder(&file.id, &change.path).await,
            DriveItemKind::Document => {
                let request = PublishRequest {
                    site: self.site.name.clone(),
                    document_id: file.id.clone(),
                    name: file.name.clone(),
                    author: file.author().map(str::to_string),
                    path: change.path.clone(),
                };
                if let Err(err) = self.publisher.publish_document(&request).await {
                    error!("publish of {} failed: {}", request.document_id, err);
                }
            }
            DriveItemKind::Other => {
                info!(
                    "skipping change to {} ({}), not a document or folder",
                    file.name, file.mime_type
                );
            }
        }
    }

    /// Re-walks a changed folder and republishes every document under it,
    /// recording each document's folder path for future notifications.
    async fn sync_folder(&self, folder_id: &str, path: &str) {
        info!(site = %self.site.name, folder = %folder_id, "syncing folder tree");

        let (mut files, mut errors) =
            crawler::list_folder(self.drive.clone(), folder_id.to_string(), path.to_string());

        let mut published = 0usize;
        while let Some(file) = files.recv().await {
            if let Err(err) = self.store.set_document_folder(&file.id, &file.path).await {
                error!("failed to record folder for {}: {}", file.id, err);
            }

            let request = PublishRequest {
                site: self.site.name.clone(),
                document_id: file.id,
                name: file.name,
                author: file.author,
                path: file.path,
            };
            if let Err(err) = self.publisher.publish_document(&request).await {
                error!("publish of {} failed: {}", request.document_id, err);
                continue;
            }
            published += 1;
        }

        if let Some(err) = errors.recv().await {
            error!(
                site = %self.site.name,
                folder = %folder_id,
                "folder crawl aborted: {}",
                err
            );
            return;
        }

        info!(
            site = %self.site.name,
            folder = %folder_id,
            documents = published,
            "folder sync finished"
        );
    }
}

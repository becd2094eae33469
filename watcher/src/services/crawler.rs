//! Breadth-first crawl of a remote folder tree, streaming recognized
//! documents to a consumer as they are discovered.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use drivesync_models::drive::{DriveItemKind, ProviderFile};

use super::drive::{DriveApi, DriveError};

struct FolderNode {
    id: String,
    path: String,
}

/// List every recognized document nested under `root_id`, breadth first.
///
/// A background worker feeds the returned channels: one of discovered files,
/// one carrying at most a single error. Any listing failure aborts the whole
/// crawl. Both channels close when the traversal completes or aborts, so
/// consumers drain the file channel and then check the error channel.
pub fn list_folder(
    drive: Arc<dyn DriveApi>,
    root_id: String,
    root_path: String,
) -> (mpsc::Receiver<ProviderFile>, mpsc::Receiver<DriveError>) {
    let (file_tx, file_rx) = mpsc::channel(1);
    let (error_tx, error_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        crawl(drive, root_id, root_path, file_tx, error_tx).await;
    });

    (file_rx, error_rx)
}

async fn crawl(
    drive: Arc<dyn DriveApi>,
    root_id: String,
    root_path: String,
    files: mpsc::Sender<ProviderFile>,
    errors: mpsc::Sender<DriveError>,
) {
    // Folders we have seen but not yet listed.
    let mut frontier = VecDeque::new();
    frontier.push_back(FolderNode {
        id: root_id,
        path: root_path,
    });

    while let Some(folder) = frontier.pop_front() {
        info!(folder = %folder.id, path = %folder.path, "exploring folder");

        // Exhaust this folder's pages before moving to the next one.
        let mut page_token: Option<String> = None;
        loop {
            let page = match drive.list_children(&folder.id, page_token.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    // Returning drops both senders, which closes the streams.
                    let _ = errors.send(e).await;
                    return;
                }
            };

            for file in page.files {
                match file.kind() {
                    DriveItemKind::Folder => {
                        info!(folder = %file.name, "queuing directory");
                        frontier.push_back(FolderNode {
                            path: join_path(&folder.path, &file.name),
                            id: file.id,
                        });
                    }
                    DriveItemKind::Document => {
                        let author = file.author().map(|a| a.to_string());
                        let found = ProviderFile {
                            id: file.id,
                            name: file.name,
                            author,
                            path: folder.path.clone(),
                        };
                        if files.send(found).await.is_err() {
                            // Consumer went away; stop quietly.
                            return;
                        }
                    }
                    DriveItemKind::Other => {
                        info!(mime_type = %file.mime_type, name = %file.name,
                            "skipping object of unrecognized type");
                    }
                }
            }

            // An absent or empty token ends the listing.
            page_token = page.next_page_token.filter(|token| !token.is_empty());
            if page_token.is_none() {
                break;
            }
        }
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

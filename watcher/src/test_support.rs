//! Synthetic collaborators shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use drivesync_models::drive::{
    DriveFile, DriveFileList, DriveUser, WatchChannel, MIME_TYPE_DRIVE_DOC,
    MIME_TYPE_DRIVE_FOLDER,
};
use drivesync_models::publish::PublishRequest;

use crate::services::drive::{DriveApi, DriveError};
use crate::services::publisher::{PublishError, Publisher};
use crate::services::store::{StoreError, SubscriptionStore};

pub fn doc(id: &str, name: &str, author: &str) -> DriveFile {
    DriveFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: MIME_TYPE_DRIVE_DOC.to_string(),
        last_modifying_user: Some(DriveUser {
            display_name: Some(author.to_string()),
        }),
    }
}

pub fn folder(id: &str, name: &str) -> DriveFile {
    DriveFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: MIME_TYPE_DRIVE_FOLDER.to_string(),
        last_modifying_user: None,
    }
}

pub fn other(id: &str, name: &str, mime_type: &str) -> DriveFile {
    DriveFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        last_modifying_user: None,
    }
}

/// Canned Drive API. Folder listings are given as pages; page tokens are the
/// page index as a string.
#[derive(Default)]
pub struct FakeDrive {
    files: HashMap<String, DriveFile>,
    pages: HashMap<String, Vec<Vec<DriveFile>>>,
    listing_errors: HashSet<String>,
    get_errors: HashSet<String>,
    watch_fails: bool,
    resource_id: String,
    watch_calls: Mutex<Vec<(String, String)>>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self {
            resource_id: "resource-1".to_string(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, file: DriveFile) -> Self {
        self.files.insert(file.id.clone(), file);
        self
    }

    pub fn with_children(mut self, folder_id: &str, pages: Vec<Vec<DriveFile>>) -> Self {
        self.pages.insert(folder_id.to_string(), pages);
        self
    }

    pub fn with_listing_error(mut self, folder_id: &str) -> Self {
        self.listing_errors.insert(folder_id.to_string());
        self
    }

    pub fn with_get_error(mut self, file_id: &str) -> Self {
        self.get_errors.insert(file_id.to_string());
        self
    }

    pub fn with_failing_watch(mut self) -> Self {
        self.watch_fails = true;
        self
    }

    pub fn with_resource_id(mut self, resource_id: &str) -> Self {
        self.resource_id = resource_id.to_string();
        self
    }

    /// Every `(file_id, address)` pair passed to `watch_file`.
    pub fn watch_calls(&self) -> Vec<(String, String)> {
        self.watch_calls.lock().clone()
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn get_file(&self, file_id: &str) -> Result<DriveFile, DriveError> {
        if self.get_errors.contains(file_id) {
            return Err(DriveError::Http(format!("metadata lookup failed for {}", file_id)));
        }
        self.files.get(file_id).cloned().ok_or(DriveError::Api {
            status: 404,
            body: format!("no such file {}", file_id),
        })
    }

    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<DriveFileList, DriveError> {
        if self.listing_errors.contains(folder_id) {
            return Err(DriveError::Http(format!("listing failed for {}", folder_id)));
        }

        let pages = match self.pages.get(folder_id) {
            Some(pages) => pages,
            None => {
                return Ok(DriveFileList {
                    files: Vec::new(),
                    next_page_token: None,
                })
            }
        };

        let index: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let files = pages.get(index).cloned().unwrap_or_default();
        let next_page_token = if index + 1 < pages.len() {
            Some((index + 1).to_string())
        } else {
            None
        };

        Ok(DriveFileList {
            files,
            next_page_token,
        })
    }

    async fn watch_file(&self, file_id: &str, address: &str) -> Result<WatchChannel, DriveError> {
        self.watch_calls
            .lock()
            .push((file_id.to_string(), address.to_string()));

        if self.watch_fails {
            return Err(DriveError::Api {
                status: 500,
                body: "watch registration failed".to_string(),
            });
        }

        Ok(WatchChannel {
            resource_id: self.resource_id.clone(),
            expiration: None,
        })
    }
}

/// Publisher that records every request it sees.
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<PublishRequest>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PublishRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Publisher for RecordingSink {
    async fn publish_document(&self, request: &PublishRequest) -> Result<(), PublishError> {
        self.calls.lock().push(request.clone());
        if self.fail {
            return Err(PublishError::Rejected {
                status: 500,
                body: "sink unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Store whose every operation fails, for exercising backend-outage paths.
pub struct FailingStore;

#[async_trait]
impl SubscriptionStore for FailingStore {
    async fn get_resource_document(&self, _resource_id: &str) -> Result<String, StoreError> {
        Err(StoreError::Backend("store offline".to_string()))
    }

    async fn set_resource_document(
        &self,
        _resource_id: &str,
        _document_id: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("store offline".to_string()))
    }

    async fn get_document_folder(&self, _document_id: &str) -> Result<String, StoreError> {
        Err(StoreError::Backend("store offline".to_string()))
    }

    async fn set_document_folder(&self, _document_id: &str, _path: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("store offline".to_string()))
    }

    async fn try_set_webhook_flag(
        &self,
        _document_id: &str,
        _ttl: Duration,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Backend("store offline".to_string()))
    }
}

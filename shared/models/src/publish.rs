use serde::{Deserialize, Serialize};

/// What the watcher hands to the publishing pipeline for one document.
/// `path` is the site-local folder path, not a filesystem path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishRequest {
    pub site: String,
    pub document_id: String,
    pub name: String,
    pub author: Option<String>,
    pub path: String,
}

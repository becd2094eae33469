use serde::{Deserialize, Serialize};

pub const MIME_TYPE_DRIVE_FOLDER: &str = "application/vnd.google-apps.folder";
pub const MIME_TYPE_DRIVE_DOC: &str = "application/vnd.google-apps.document";

/// What a remote item is, decided once from the provider's mime string at the
/// API boundary. Downstream code dispatches on this and never re-reads the
/// raw mime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveItemKind {
    Folder,
    Document,
    Other,
}

impl DriveItemKind {
    pub fn from_mime_type(mime_type: &str) -> Self {
        match mime_type {
            MIME_TYPE_DRIVE_FOLDER => DriveItemKind::Folder,
            MIME_TYPE_DRIVE_DOC => DriveItemKind::Document,
            _ => DriveItemKind::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveUser {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// File metadata as returned by the Drive API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "lastModifyingUser")]
    pub last_modifying_user: Option<DriveUser>,
}

impl DriveFile {
    pub fn kind(&self) -> DriveItemKind {
        DriveItemKind::from_mime_type(&self.mime_type)
    }

    pub fn author(&self) -> Option<&str> {
        self.last_modifying_user
            .as_ref()
            .and_then(|user| user.display_name.as_deref())
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveFileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Response of a `files/{id}/watch` registration. The provider assigns the
/// resource id; we only echo it back into the subscription store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchChannel {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub expiration: Option<String>,
}

/// A document discovered by a folder crawl, with the local path of the folder
/// it was found in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderFile {
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    pub path: String,
}

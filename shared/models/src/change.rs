use serde::{Deserialize, Serialize};

/// One pending mutation to a remote document or folder.
///
/// Identity is `document_id`; `path` is the folder path the document was last
/// known under and may be stale by the time the change is processed (a rename
/// notification still carries the pre-rename path).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriveChange {
    pub document_id: String,
    pub path: String,
}

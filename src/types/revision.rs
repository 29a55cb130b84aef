use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::store::PayloadRef;
use crate::types::{PrincipalId, RevisionId};

/// one immutable revision of a file under an owner's logical path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRevision {
    pub id: RevisionId,
    /// uploading principal
    pub owner: PrincipalId,
    /// normalized slash-separated directory, scoped to the owner
    pub path: String,
    /// basename of the uploaded payload
    pub file_name: String,
    /// 1-based, unique within (owner, path)
    pub revision: u32,
    /// SHA-256 of the payload bytes
    pub content_hash: ContentHash,
    pub created_at: DateTime<Utc>,
    pub payload: PayloadRef,
}

impl FileRevision {
    /// `path/file_name`
    pub fn file_path(&self) -> String {
        if self.path.is_empty() {
            self.file_name.clone()
        } else {
            format!("{}/{}", self.path, self.file_name)
        }
    }

    /// download location in the form `path/file_name?revision=N`
    pub fn download_path(&self) -> String {
        format!("{}?revision={}", self.file_path(), self.revision)
    }
}

impl std::fmt::Display for FileRevision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (v{}) {} {}",
            self.id,
            self.file_path(),
            self.revision,
            self.content_hash,
            self.created_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

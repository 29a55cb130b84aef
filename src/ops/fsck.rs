use std::collections::HashSet;
use std::fs::File;
use std::io::Read;

use tracing::warn;

use crate::catalog::Catalog;
use crate::error::{IoResultExt, Result};
use crate::hash::{ContentHash, ContentHasher};
use crate::ops::gc::list_payloads;
use crate::repo::Repo;
use crate::types::RevisionId;

/// fsck report
#[derive(Debug, Default)]
pub struct FsckReport {
    /// payloads and revisions checked
    pub objects_checked: usize,
    /// payloads whose bytes no longer hash to their address
    pub corrupt_payloads: Vec<CorruptPayload>,
    /// revisions pointing at a payload that is gone
    pub missing_payloads: Vec<MissingPayload>,
    /// payloads no revision references (collected by gc)
    pub dangling_payloads: Vec<ContentHash>,
}

impl FsckReport {
    pub fn is_ok(&self) -> bool {
        self.corrupt_payloads.is_empty() && self.missing_payloads.is_empty()
    }
}

#[derive(Debug)]
pub struct CorruptPayload {
    pub hash: ContentHash,
    pub actual: ContentHash,
}

#[derive(Debug)]
pub struct MissingPayload {
    pub hash: ContentHash,
    pub revision: RevisionId,
    pub file_path: String,
}

/// verify repository integrity.
/// this is the only place payload bytes are re-hashed.
pub fn fsck(repo: &Repo) -> Result<FsckReport> {
    let mut report = FsckReport::default();
    let catalog = Catalog::new(repo);
    let store = catalog.store();

    let mut referenced = HashSet::new();
    for revision in catalog.all_revisions()? {
        report.objects_checked += 1;
        referenced.insert(revision.content_hash);

        if !store.contains(&revision.payload) {
            warn!(revision = %revision.id, hash = %revision.content_hash, "payload missing");
            report.missing_payloads.push(MissingPayload {
                hash: revision.content_hash,
                revision: revision.id,
                file_path: revision.file_path(),
            });
        }
    }

    for (hash, path) in list_payloads(&repo.blobs_path())? {
        report.objects_checked += 1;

        let mut file = File::open(&path).with_path(&path)?;
        let mut hasher = ContentHasher::new();
        let mut buf = vec![0u8; repo.config().catalog.chunk_size.max(1)];
        loop {
            let n = file.read(&mut buf).with_path(&path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        let actual = hasher.finalize();
        if actual != hash {
            warn!(hash = %hash, actual = %actual, "payload hash mismatch");
            report.corrupt_payloads.push(CorruptPayload { hash, actual });
        }

        if !referenced.contains(&hash) {
            report.dangling_payloads.push(hash);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrincipalId;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_fsck_healthy() {
        let (_dir, repo) = test_repo();
        let catalog = Catalog::new(&repo);
        catalog
            .create_revision(PrincipalId::new(), "docs", "a.txt", b"fine")
            .unwrap();

        let report = fsck(&repo).unwrap();

        assert!(report.is_ok());
        assert_eq!(report.objects_checked, 2);
        assert!(report.dangling_payloads.is_empty());
    }

    #[test]
    fn test_fsck_detects_corruption() {
        let (_dir, repo) = test_repo();
        let catalog = Catalog::new(&repo);
        let rev = catalog
            .create_revision(PrincipalId::new(), "docs", "a.txt", b"original")
            .unwrap();

        let path = catalog.store().blob_path(&rev.content_hash);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        fs::write(&path, b"tampered").unwrap();

        let report = fsck(&repo).unwrap();

        assert!(!report.is_ok());
        assert_eq!(report.corrupt_payloads.len(), 1);
        assert_eq!(report.corrupt_payloads[0].hash, rev.content_hash);
        assert_eq!(report.corrupt_payloads[0].actual, ContentHash::of(b"tampered"));
    }

    #[test]
    fn test_fsck_detects_missing_payload() {
        let (_dir, repo) = test_repo();
        let catalog = Catalog::new(&repo);
        let rev = catalog
            .create_revision(PrincipalId::new(), "docs", "a.txt", b"lost")
            .unwrap();

        fs::remove_file(catalog.store().blob_path(&rev.content_hash)).unwrap();

        let report = fsck(&repo).unwrap();

        assert_eq!(report.missing_payloads.len(), 1);
        assert_eq!(report.missing_payloads[0].revision, rev.id);
        assert_eq!(report.missing_payloads[0].file_path, "docs/a.txt");
    }

    #[test]
    fn test_fsck_reports_dangling() {
        let (_dir, repo) = test_repo();
        let catalog = Catalog::new(&repo);
        catalog.store().put(b"never cataloged").unwrap();

        let report = fsck(&repo).unwrap();

        assert!(report.is_ok());
        assert_eq!(
            report.dangling_payloads,
            vec![ContentHash::of(b"never cataloged")]
        );
    }
}

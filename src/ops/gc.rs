use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::ContentHash;
use crate::repo::Repo;

/// gc statistics
#[derive(Debug, Default)]
pub struct GcStats {
    pub revisions_scanned: usize,
    pub payloads_removed: usize,
    pub bytes_freed: u64,
}

/// remove payloads that no revision references.
///
/// holds the exclusive repository lock, so uploads whose record is not yet
/// committed are never swept; fails with `LockContention` while any run.
pub fn gc(repo: &Repo, dry_run: bool) -> Result<GcStats> {
    let _lock = repo.lock()?;

    // mark phase: every payload a revision record points at
    let revisions = Catalog::new(repo).all_revisions()?;
    let referenced: HashSet<ContentHash> = revisions.iter().map(|r| r.content_hash).collect();

    let mut stats = GcStats {
        revisions_scanned: revisions.len(),
        ..GcStats::default()
    };

    // sweep phase
    for (hash, path) in list_payloads(&repo.blobs_path())? {
        if referenced.contains(&hash) {
            continue;
        }

        let meta = fs::metadata(&path).with_path(&path)?;
        stats.bytes_freed += meta.len();
        stats.payloads_removed += 1;

        if !dry_run {
            fs::remove_file(&path).with_path(&path)?;
        }
    }

    // clean up empty fan-out directories
    if !dry_run {
        for entry in WalkDir::new(repo.blobs_path()).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| walk_error(&repo.blobs_path(), e))?;
            if entry.file_type().is_dir() {
                // only succeeds if empty
                let _ = fs::remove_dir(entry.path());
            }
        }
    }

    info!(
        dry_run,
        removed = stats.payloads_removed,
        bytes = stats.bytes_freed,
        "gc sweep finished"
    );
    Ok(stats)
}

/// every payload on disk with its content address
pub(crate) fn list_payloads(dir: &Path) -> Result<Vec<(ContentHash, PathBuf)>> {
    let mut payloads = Vec::new();
    if !dir.exists() {
        return Ok(payloads);
    }

    for entry in WalkDir::new(dir).min_depth(2).max_depth(2) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        // reconstruct hash from path: blobs/XX/YYYYYY...
        let path = entry.path();
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let parent_name = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");

        if let Ok(hash) = ContentHash::from_hex(&format!("{}{}", parent_name, file_name)) {
            payloads.push((hash, path.to_path_buf()));
        }
    }
    Ok(payloads)
}

fn walk_error(dir: &Path, e: walkdir::Error) -> Error {
    Error::Io {
        path: dir.to_path_buf(),
        source: e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("walkdir error")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrincipalId;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_gc_keeps_referenced() {
        let (_dir, repo) = test_repo();
        let catalog = Catalog::new(&repo);
        catalog
            .create_revision(PrincipalId::new(), "docs", "a.txt", b"kept")
            .unwrap();

        let stats = gc(&repo, false).unwrap();

        assert_eq!(stats.revisions_scanned, 1);
        assert_eq!(stats.payloads_removed, 0);
    }

    #[test]
    fn test_gc_dry_run() {
        let (_dir, repo) = test_repo();
        let catalog = Catalog::new(&repo);
        let owner = PrincipalId::new();
        let rev = catalog.create_revision(owner, "docs", "a.txt", b"orphan").unwrap();
        catalog.delete_by_id(owner, rev.id).unwrap();

        let stats = gc(&repo, true).unwrap();

        assert_eq!(stats.payloads_removed, 1);
        assert_eq!(stats.bytes_freed, 6);
        assert!(catalog.store().contains(&rev.payload));
    }

    #[test]
    fn test_gc_removes_unreferenced() {
        let (_dir, repo) = test_repo();
        let catalog = Catalog::new(&repo);
        let owner = PrincipalId::new();

        let gone = catalog.create_revision(owner, "docs", "a.txt", b"v1").unwrap();
        let kept = catalog.create_revision(owner, "docs", "a.txt", b"v2").unwrap();
        catalog.delete_by_id(owner, gone.id).unwrap();

        let stats = gc(&repo, false).unwrap();

        assert_eq!(stats.payloads_removed, 1);
        assert!(!catalog.store().contains(&gone.payload));
        assert!(catalog.store().contains(&kept.payload));
    }

    #[test]
    fn test_gc_keeps_payload_shared_with_live_revision() {
        let (_dir, repo) = test_repo();
        let catalog = Catalog::new(&repo);
        let owner = PrincipalId::new();

        let a = catalog.create_revision(owner, "one", "a.txt", b"shared").unwrap();
        catalog.create_revision(owner, "two", "b.txt", b"shared").unwrap();
        catalog.delete_by_id(owner, a.id).unwrap();

        let stats = gc(&repo, false).unwrap();
        assert_eq!(stats.payloads_removed, 0);
        assert!(catalog.store().contains(&a.payload));
    }

    #[test]
    fn test_gc_waits_for_writers() {
        let (_dir, repo) = test_repo();
        let _writer = repo.lock_shared().unwrap();

        assert!(matches!(gc(&repo, false), Err(Error::LockContention)));
    }
}

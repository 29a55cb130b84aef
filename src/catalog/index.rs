use std::fs::{self, File};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::catalog::record::remove_if_exists;
use crate::error::{IoResultExt, Result};

/// secondary index stored as empty marker files: `<root>/<key>/<member>`.
///
/// markers are written after the record they point at and removed before
/// it, so a reader may see a marker whose record is gone; callers skip those.
pub(crate) struct Index {
    root: PathBuf,
}

impl Index {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub(crate) fn insert(&self, key: &str, member: &str) -> Result<()> {
        let dir = self.root.join(key);
        fs::create_dir_all(&dir).with_path(&dir)?;
        let marker = dir.join(member);
        File::create(&marker).with_path(&marker)?;
        Ok(())
    }

    pub(crate) fn remove(&self, key: &str, member: &str) -> Result<()> {
        remove_if_exists(&self.root.join(key).join(member))?;
        Ok(())
    }

    /// members under a key, parsed; unparseable marker names are skipped
    pub(crate) fn members<T: FromStr>(&self, key: &str) -> Result<Vec<T>> {
        let dir = self.root.join(key);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(crate::Error::Io { path: dir, source: e }),
        };

        let mut members = Vec::new();
        for entry in entries {
            let entry = entry.with_path(&dir)?;
            let name = entry.file_name().to_string_lossy().to_string();
            match name.parse() {
                Ok(member) => members.push(member),
                Err(_) => warn!(index = %dir.display(), marker = %name, "skipping unparseable marker"),
            }
        }
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RevisionId;
    use tempfile::tempdir;

    #[test]
    fn test_insert_members_remove() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join("owner"));

        let a = RevisionId::new();
        let b = RevisionId::new();
        index.insert("k", &a.to_string()).unwrap();
        index.insert("k", &b.to_string()).unwrap();
        index.insert("k", &a.to_string()).unwrap(); // idempotent

        let mut members: Vec<RevisionId> = index.members("k").unwrap();
        members.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(members, expected);

        index.remove("k", &a.to_string()).unwrap();
        index.remove("k", &a.to_string()).unwrap(); // removing twice is fine
        assert_eq!(index.members::<RevisionId>("k").unwrap(), vec![b]);
    }

    #[test]
    fn test_missing_key_is_empty() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join("hash"));
        assert!(index.members::<RevisionId>("ab/cdef").unwrap().is_empty());
    }
}

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, IoResultExt, Result};
use crate::repo::Repo;

/// write a catalog record: CBOR, zstd compressed, temp -> fsync -> rename
pub(crate) fn write_record<T: Serialize>(repo: &Repo, path: &Path, record: &T) -> Result<()> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(record, &mut cbor_bytes)?;

    let compressed = zstd::encode_all(&cbor_bytes[..], 3).map_err(|e| Error::Io {
        path: PathBuf::from("<zstd>"),
        source: e,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(&compressed).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    fs::rename(&tmp_path, path).with_path(path)?;
    Ok(())
}

/// read a catalog record, `None` if it does not exist
pub(crate) fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let compressed = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let cbor_bytes = zstd::decode_all(&compressed[..]).with_path(path)?;
    let record = ciborium::from_reader(&cbor_bytes[..])?;
    Ok(Some(record))
}

/// remove a file, returning whether it existed
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessLevel, Grant, GrantId, PrincipalId, RevisionId};
    use tempfile::tempdir;

    #[test]
    fn test_write_read_remove() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();
        let path = repo.grants_path().join("nested/record");

        let grant = Grant {
            id: GrantId::new(),
            grantee: PrincipalId::new(),
            revision: RevisionId::new(),
            owner: PrincipalId::new(),
            level: AccessLevel::Read,
        };

        write_record(&repo, &path, &grant).unwrap();
        let read: Option<Grant> = read_record(&path).unwrap();
        assert_eq!(read, Some(grant));

        assert!(remove_if_exists(&path).unwrap());
        assert!(!remove_if_exists(&path).unwrap());

        let missing: Option<Grant> = read_record(&path).unwrap();
        assert!(missing.is_none());
    }
}

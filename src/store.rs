//! content store: immutable payload bytes addressed by their SHA-256
//!
//! payloads live at `objects/blobs/<2 hex>/<62 hex>`. writes go through
//! `tmp/` and are renamed into place, so a payload is either absent or
//! complete. identical bytes are stored once.

use std::fmt;
use std::fs::{self, File, Permissions};
use std::io::{Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{ContentHash, ContentHasher};
use crate::repo::Repo;

/// opaque handle that resolves back to the exact bytes written
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadRef(ContentHash);

impl PayloadRef {
    #[cfg(test)]
    pub(crate) fn from_hash(hash: ContentHash) -> Self {
        Self(hash)
    }
}

impl fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blob:{}", self.0)
    }
}

impl fmt::Debug for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadRef({})", &self.0.to_hex()[..12])
    }
}

/// payload storage rooted in a repository
#[derive(Clone, Debug)]
pub struct ContentStore {
    blobs: PathBuf,
    tmp: PathBuf,
    chunk_size: usize,
}

impl ContentStore {
    pub fn new(repo: &Repo) -> Self {
        Self {
            blobs: repo.blobs_path(),
            tmp: repo.tmp_path(),
            chunk_size: repo.config().catalog.chunk_size.max(1),
        }
    }

    /// store a payload held in memory
    pub fn put(&self, content: &[u8]) -> Result<(PayloadRef, ContentHash)> {
        let hash = ContentHash::of(content);
        let blob_path = self.blob_path(&hash);

        // deduplication: if payload already exists, we're done
        if blob_path.exists() {
            debug!(hash = %hash, "payload already stored");
            return Ok((PayloadRef(hash), hash));
        }

        let tmp_path = self.tmp.join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(content).with_path(&tmp_path)?;
            tmp_file.sync_all().with_path(&tmp_path)?;
        }

        self.commit(&tmp_path, &hash)?;
        Ok((PayloadRef(hash), hash))
    }

    /// store a payload from a reader, hashing chunk by chunk
    pub fn put_reader<R: Read>(&self, reader: &mut R) -> Result<(PayloadRef, ContentHash)> {
        // the hash is only known at the end, so stage to a temp file first
        let tmp_path = self.tmp.join(uuid::Uuid::new_v4().to_string());

        let mut hasher = ContentHasher::new();
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            let mut buf = vec![0u8; self.chunk_size];
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(n) => n,
                    Err(e) => {
                        let _ = fs::remove_file(&tmp_path);
                        return Err(Error::Io {
                            path: tmp_path,
                            source: e,
                        });
                    }
                };
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                tmp_file.write_all(&buf[..n]).with_path(&tmp_path)?;
            }
            tmp_file.sync_all().with_path(&tmp_path)?;
        }

        let hash = hasher.finalize();

        // dedup check
        if self.blob_path(&hash).exists() {
            debug!(hash = %hash, "payload already stored");
            fs::remove_file(&tmp_path).with_path(&tmp_path)?;
            return Ok((PayloadRef(hash), hash));
        }

        self.commit(&tmp_path, &hash)?;
        Ok((PayloadRef(hash), hash))
    }

    /// read payload content
    pub fn get(&self, payload: &PayloadRef) -> Result<Vec<u8>> {
        let path = self.blob_path(&payload.0);
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::PayloadNotFound(payload.0)
            } else {
                Error::Io { path, source: e }
            }
        })
    }

    /// read payload content into a writer (streaming)
    pub fn get_to<W: Write>(&self, payload: &PayloadRef, writer: &mut W) -> Result<u64> {
        let path = self.blob_path(&payload.0);
        let mut file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::PayloadNotFound(payload.0)
            } else {
                Error::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        loop {
            let n = file.read(&mut buf).with_path(&path)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).with_path(&path)?;
            total += n as u64;
        }
        Ok(total)
    }

    /// look up a stored payload by content hash
    pub fn find_by_hash(&self, hash: &ContentHash) -> Option<PayloadRef> {
        self.blob_path(hash).exists().then_some(PayloadRef(*hash))
    }

    /// check if a payload exists
    pub fn contains(&self, payload: &PayloadRef) -> bool {
        self.blob_path(&payload.0).exists()
    }

    /// get the filesystem path to a payload
    pub fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        let (dir, file) = hash.to_path_components();
        self.blobs.join(dir).join(file)
    }

    /// move a fully written temp file to its content address
    fn commit(&self, tmp_path: &Path, hash: &ContentHash) -> Result<()> {
        let blob_path = self.blob_path(hash);
        let blob_dir = match blob_path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => self.blobs.clone(),
        };

        fs::create_dir_all(&blob_dir).with_path(&blob_dir)?;

        // payloads are never modified after they are written
        fs::set_permissions(tmp_path, Permissions::from_mode(0o444)).with_path(tmp_path)?;

        fs::rename(tmp_path, &blob_path).with_path(&blob_path)?;
        fsync_dir(&blob_dir)?;

        debug!(hash = %hash, "payload stored");
        Ok(())
    }
}

/// fsync a directory
fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_put_and_get() {
        let (_dir, repo) = test_repo();
        let store = ContentStore::new(&repo);

        let (payload, hash) = store.put(b"Hello world").unwrap();

        assert!(store.contains(&payload));
        assert_eq!(hash, ContentHash::of(b"Hello world"));
        assert_eq!(store.get(&payload).unwrap(), b"Hello world");
    }

    #[test]
    fn test_deduplication() {
        let (_dir, repo) = test_repo();
        let store = ContentStore::new(&repo);

        let (p1, h1) = store.put(b"duplicate content").unwrap();
        let (p2, h2) = store.put(b"duplicate content").unwrap();

        assert_eq!(h1, h2);
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_blob_path_structure() {
        let (_dir, repo) = test_repo();
        let store = ContentStore::new(&repo);

        let (_, hash) = store.put(b"test").unwrap();
        let path = store.blob_path(&hash);

        // path should be blobs/XX/YYYY...
        let hex = hash.to_hex();
        assert!(path.ends_with(format!("{}/{}", &hex[..2], &hex[2..])));
    }

    #[test]
    fn test_stored_payload_is_read_only() {
        let (_dir, repo) = test_repo();
        let store = ContentStore::new(&repo);

        let (_, hash) = store.put(b"immutable").unwrap();
        let mode = fs::metadata(store.blob_path(&hash))
            .unwrap()
            .permissions()
            .mode();

        assert_eq!(mode & 0o777, 0o444);
    }

    #[test]
    fn test_get_missing_payload() {
        let (_dir, repo) = test_repo();
        let store = ContentStore::new(&repo);

        let missing = PayloadRef::from_hash(ContentHash::of(b"never stored"));
        let result = store.get(&missing);

        assert!(matches!(result, Err(Error::PayloadNotFound(_))));
    }

    #[test]
    fn test_streaming_put_matches_put() {
        let (_dir, repo) = test_repo();
        let mut repo = repo;
        repo.config_mut().catalog.chunk_size = 3; // force several chunks
        let store = ContentStore::new(&repo);

        let content = b"streaming content test";
        let mut cursor = std::io::Cursor::new(content.as_slice());

        let (streamed, streamed_hash) = store.put_reader(&mut cursor).unwrap();
        let (direct, direct_hash) = store.put(content).unwrap();

        assert_eq!(streamed, direct);
        assert_eq!(streamed_hash, direct_hash);
        assert_eq!(store.get(&streamed).unwrap(), content);

        // the dedup path must not leave staging files behind
        let mut cursor = std::io::Cursor::new(content.as_slice());
        store.put_reader(&mut cursor).unwrap();
        assert_eq!(fs::read_dir(repo.tmp_path()).unwrap().count(), 0);
    }

    #[test]
    fn test_get_to_writer() {
        let (_dir, repo) = test_repo();
        let store = ContentStore::new(&repo);

        let content = b"content to stream out";
        let (payload, _) = store.put(content).unwrap();

        let mut output = Vec::new();
        let bytes_read = store.get_to(&payload, &mut output).unwrap();

        assert_eq!(bytes_read, content.len() as u64);
        assert_eq!(output, content);
    }

    #[test]
    fn test_find_by_hash() {
        let (_dir, repo) = test_repo();
        let store = ContentStore::new(&repo);

        let (payload, hash) = store.put(b"findable").unwrap();

        assert_eq!(store.find_by_hash(&hash), Some(payload));
        assert_eq!(store.find_by_hash(&ContentHash::of(b"other")), None);
    }
}

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::catalog::record::remove_if_exists;
use crate::error::{Error, IoResultExt, Result};
use crate::hash::key_of;
use crate::repo::Repo;
use crate::types::{PrincipalId, RevisionId};

/// revision slots for one (owner, path): one file per claimed number.
///
/// a slot is claimed with an exclusive create, which is the uniqueness
/// constraint on (owner, path, revision). the slot file holds the id of the
/// revision that won it.
pub(crate) struct Sequence {
    dir: PathBuf,
}

impl Sequence {
    pub(crate) fn new(repo: &Repo, owner: &PrincipalId, path: &str) -> Self {
        let key = key_of(&[&owner.as_bytes()[..], path.as_bytes()]);
        let (prefix, rest) = key.to_path_components();
        Self {
            dir: repo.sequences_path().join(prefix).join(rest),
        }
    }

    /// highest claimed revision number, 0 if none
    pub(crate) fn current(&self) -> Result<u32> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(Error::Io {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut max = 0;
        for entry in entries {
            let entry = entry.with_path(&self.dir)?;
            if let Some(n) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) {
                max = max.max(n);
            }
        }
        Ok(max)
    }

    /// try to claim slot `n` for `id`; false if another writer holds it
    pub(crate) fn claim(&self, n: u32, id: &RevisionId) -> Result<bool> {
        fs::create_dir_all(&self.dir).with_path(&self.dir)?;

        let slot = self.dir.join(n.to_string());
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&slot) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(Error::Io { path: slot, source: e }),
        };

        writeln!(file, "{}", id).with_path(&slot)?;
        file.sync_all().with_path(&slot)?;
        Ok(true)
    }

    /// claim the next free number, re-reading the max after each lost race
    pub(crate) fn allocate(&self, id: &RevisionId, path: &str, attempts: u32) -> Result<u32> {
        for attempt in 1..=attempts {
            let next = self.current()? + 1;
            if self.claim(next, id)? {
                return Ok(next);
            }
            debug!(path = %path, revision = next, attempt, "revision slot taken, retrying");
        }

        Err(Error::Conflict {
            path: path.to_string(),
            attempts,
        })
    }

    /// free slot `n` so the number can be allocated again
    pub(crate) fn release(&self, n: u32) -> Result<()> {
        remove_if_exists(&self.dir.join(n.to_string()))?;
        Ok(())
    }
}

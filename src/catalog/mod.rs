//! version catalog: per-(owner, path) revision sequences over the content
//! store, with grant-based visibility.
//!
//! every operation takes the acting principal explicitly. rows a principal
//! can neither own nor hold a grant on are reported as `NotFound`.

pub mod access;
mod grants;
mod index;
pub mod path;
mod record;
mod sequence;

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::ContentHash;
use crate::repo::Repo;
use crate::store::{ContentStore, PayloadRef};
use crate::types::{FileRevision, PrincipalId, RevisionId};

use self::access::{can_read, can_write};
use self::index::Index;
use self::path::{file_base_name, split_file_path, validate_path};
use self::record::{read_record, remove_if_exists, write_record};
use self::sequence::Sequence;

/// catalog over a repository
pub struct Catalog<'r> {
    repo: &'r Repo,
    store: ContentStore,
}

impl<'r> Catalog<'r> {
    pub fn new(repo: &'r Repo) -> Self {
        Self {
            repo,
            store: ContentStore::new(repo),
        }
    }

    /// the content store backing this catalog
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// store `content` as the next revision of `path` for `owner`
    pub fn create_revision(
        &self,
        owner: PrincipalId,
        path: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<FileRevision> {
        validate_path(path)?;
        let file_name = file_base_name(file_name)?;

        let _lock = self.repo.lock_shared()?;
        let (payload, content_hash) = self.store.put(content)?;
        self.commit_revision(owner, path, file_name, payload, content_hash)
    }

    /// streaming variant of [`Catalog::create_revision`]
    pub fn create_revision_from_reader<R: Read>(
        &self,
        owner: PrincipalId,
        path: &str,
        file_name: &str,
        reader: &mut R,
    ) -> Result<FileRevision> {
        validate_path(path)?;
        let file_name = file_base_name(file_name)?;

        let _lock = self.repo.lock_shared()?;
        let (payload, content_hash) = self.store.put_reader(reader)?;
        self.commit_revision(owner, path, file_name, payload, content_hash)
    }

    fn commit_revision(
        &self,
        owner: PrincipalId,
        path: &str,
        file_name: String,
        payload: PayloadRef,
        content_hash: ContentHash,
    ) -> Result<FileRevision> {
        let id = RevisionId::new();
        let sequence = Sequence::new(self.repo, &owner, path);
        let attempts = self.repo.config().catalog.allocation_attempts.max(1);
        let revision = sequence.allocate(&id, path, attempts)?;

        let record = FileRevision {
            id,
            owner,
            path: path.to_string(),
            file_name,
            revision,
            content_hash,
            created_at: Utc::now(),
            payload,
        };

        // markers before the record: the record is the commit point
        let owner_key = owner.to_string();
        let digest_key = hash_key(&content_hash);
        let member = id.to_string();
        let committed = self
            .owner_index()
            .insert(&owner_key, &member)
            .and_then(|()| self.hash_index().insert(&digest_key, &member))
            .and_then(|()| write_record(self.repo, &self.revision_path(&id), &record));

        if let Err(e) = committed {
            // give the number back; the payload stays behind as garbage
            let _ = self.owner_index().remove(&owner_key, &member);
            let _ = self.hash_index().remove(&digest_key, &member);
            let _ = sequence.release(revision);
            return Err(e);
        }

        info!(
            owner = %owner,
            path = %record.path,
            file_name = %record.file_name,
            revision = record.revision,
            hash = %record.content_hash,
            "revision created"
        );
        Ok(record)
    }

    /// every revision `principal` owns or holds a grant on, newest first
    pub fn list_visible(&self, principal: PrincipalId) -> Result<Vec<FileRevision>> {
        let mut revisions = self.visible(&principal)?;
        sort_newest_first(&mut revisions);
        Ok(revisions)
    }

    /// visible revisions whose `path/file_name` matches a glob pattern
    pub fn list_visible_matching(
        &self,
        principal: PrincipalId,
        pattern: &str,
    ) -> Result<Vec<FileRevision>> {
        let glob = glob::Pattern::new(pattern).map_err(|e| Error::InvalidPattern(e.to_string()))?;
        Ok(self
            .list_visible(principal)?
            .into_iter()
            .filter(|r| glob.matches(&r.file_path()))
            .collect())
    }

    pub fn get_by_id(&self, principal: PrincipalId, id: RevisionId) -> Result<FileRevision> {
        let revision = self.load_revision(&id)?.ok_or_else(|| not_found_revision(&id))?;
        if !can_read(&principal, &revision, &self.grants_on_revision(&id)?) {
            return Err(not_found_revision(&id));
        }
        Ok(revision)
    }

    /// delete a revision; requires ownership or a ReadWrite grant
    pub fn delete_by_id(&self, principal: PrincipalId, id: RevisionId) -> Result<()> {
        let revision = self.load_revision(&id)?.ok_or_else(|| not_found_revision(&id))?;
        let grants = self.grants_on_revision(&id)?;

        if !can_read(&principal, &revision, &grants) {
            return Err(not_found_revision(&id));
        }
        if !can_write(&principal, &revision, &grants) {
            return Err(Error::Forbidden(format!(
                "read-only access to revision {}",
                id
            )));
        }

        // record first: from here on the revision is gone, and whatever
        // cleanup fails below only leaves entries readers already skip
        remove_if_exists(&self.revision_path(&id))?;

        let member = id.to_string();
        let mut cleanup = vec![
            Sequence::new(self.repo, &revision.owner, &revision.path).release(revision.revision),
            self.owner_index().remove(&revision.owner.to_string(), &member),
            self.hash_index()
                .remove(&hash_key(&revision.content_hash), &member),
        ];
        cleanup.extend(grants.iter().map(|grant| self.remove_grant(grant)));
        for e in cleanup.into_iter().filter_map(|r| r.err()) {
            warn!(revision = %id, error = %e, "cleanup after delete failed");
        }

        info!(
            principal = %principal,
            owner = %revision.owner,
            path = %revision.path,
            revision = revision.revision,
            grants_removed = grants.len(),
            "revision deleted"
        );
        Ok(())
    }

    /// latest (or a specific) visible revision of `path/file_name`
    pub fn resolve_by_path(
        &self,
        principal: PrincipalId,
        path: &str,
        file_name: &str,
        revision: Option<u32>,
    ) -> Result<FileRevision> {
        let matching: Vec<FileRevision> = self
            .visible(&principal)?
            .into_iter()
            .filter(|r| r.path == path && r.file_name == file_name)
            .collect();

        if matching.is_empty() {
            return Err(Error::NotFound(format!("file {}/{}", path, file_name)));
        }

        let found = match revision {
            Some(n) => matching.into_iter().find(|r| r.revision == n),
            None => matching.into_iter().max_by_key(|r| r.revision),
        };

        found.ok_or_else(|| Error::RevisionNotFound {
            path: path.to_string(),
            file_name: file_name.to_string(),
            revision: revision.unwrap_or_default(),
        })
    }

    /// resolve a download path of the form `dir/sub/name.ext`
    pub fn resolve_file_path(
        &self,
        principal: PrincipalId,
        file_path: &str,
        revision: Option<u32>,
    ) -> Result<FileRevision> {
        let (path, file_name) = split_file_path(file_path);
        self.resolve_by_path(principal, path, file_name, revision)
    }

    /// visible revisions whose content hashes to `hash`, newest first
    pub fn find_by_hash(
        &self,
        principal: PrincipalId,
        hash: &ContentHash,
    ) -> Result<Vec<FileRevision>> {
        let no_match = || Error::NotFound(format!("no files with content hash {}", hash));

        if self.store.find_by_hash(hash).is_none() {
            return Err(no_match());
        }

        let mut revisions = Vec::new();
        for id in self.hash_index().members::<RevisionId>(&hash_key(hash))? {
            let Some(revision) = self.load_revision(&id)? else {
                continue;
            };
            if can_read(&principal, &revision, &self.grants_on_revision(&id)?) {
                revisions.push(revision);
            }
        }

        if revisions.is_empty() {
            return Err(no_match());
        }
        sort_newest_first(&mut revisions);
        debug!(principal = %principal, hash = %hash, matches = revisions.len(), "hash lookup");
        Ok(revisions)
    }

    /// payload bytes of a visible revision
    pub fn read_content(&self, principal: PrincipalId, id: RevisionId) -> Result<Vec<u8>> {
        let revision = self.get_by_id(principal, id)?;
        self.store.get(&revision.payload)
    }

    /// stream the payload of a visible revision into `writer`
    pub fn read_content_to<W: Write>(
        &self,
        principal: PrincipalId,
        id: RevisionId,
        writer: &mut W,
    ) -> Result<u64> {
        let revision = self.get_by_id(principal, id)?;
        self.store.get_to(&revision.payload, writer)
    }

    /// every revision record in the repository, for maintenance passes
    pub(crate) fn all_revisions(&self) -> Result<Vec<FileRevision>> {
        let dir = self.repo.revisions_path();
        let mut revisions = Vec::new();
        for entry in std::fs::read_dir(&dir).with_path(&dir)? {
            let entry = entry.with_path(&dir)?;
            if let Some(revision) = read_record::<FileRevision>(&entry.path())? {
                revisions.push(revision);
            }
        }
        Ok(revisions)
    }

    /// owned plus granted revisions, unordered, de-duplicated
    fn visible(&self, principal: &PrincipalId) -> Result<Vec<FileRevision>> {
        let mut ids: Vec<RevisionId> = self.owner_index().members(&principal.to_string())?;
        ids.extend(self.grants_received(principal)?.into_iter().map(|g| g.revision));

        let mut seen = HashSet::new();
        let mut revisions = Vec::new();
        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            match self.load_revision(&id)? {
                Some(revision) => revisions.push(revision),
                None => warn!(revision = %id, "index points at a missing revision record"),
            }
        }
        Ok(revisions)
    }

    fn load_revision(&self, id: &RevisionId) -> Result<Option<FileRevision>> {
        read_record(&self.revision_path(id))
    }

    fn revision_path(&self, id: &RevisionId) -> PathBuf {
        self.repo.revisions_path().join(id.to_string())
    }

    fn owner_index(&self) -> Index {
        Index::new(self.repo.index_path().join("owner"))
    }

    fn hash_index(&self) -> Index {
        Index::new(self.repo.index_path().join("hash"))
    }
}

fn hash_key(hash: &ContentHash) -> String {
    let (prefix, rest) = hash.to_path_components();
    format!("{}/{}", prefix, rest)
}

fn not_found_revision(id: &RevisionId) -> Error {
    Error::NotFound(format!("revision {}", id))
}

fn sort_newest_first(revisions: &mut [FileRevision]) {
    revisions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.revision.cmp(&a.revision))
    });
}

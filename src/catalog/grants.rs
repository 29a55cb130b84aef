use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::info;

use crate::catalog::index::Index;
use crate::catalog::record::{read_record, remove_if_exists, write_record};
use crate::catalog::{not_found_revision, Catalog};
use crate::error::{Error, IoResultExt, Result};
use crate::hash::key_of;
use crate::identity::{GranteeRef, IdentityProvider};
use crate::types::{AccessLevel, Grant, GrantId, PrincipalId, RevisionId};

impl Catalog<'_> {
    /// give `grantee` access to one of `owner`'s revisions
    pub fn grant(
        &self,
        owner: PrincipalId,
        grantee: &GranteeRef,
        revision_id: RevisionId,
        level: AccessLevel,
        identity: &dyn IdentityProvider,
    ) -> Result<Grant> {
        let grantee = identity.resolve(grantee)?;

        let revision = self
            .load_revision(&revision_id)?
            .ok_or_else(|| not_found_revision(&revision_id))?;
        if revision.owner != owner {
            return Err(Error::Forbidden(format!(
                "not the owner of revision {}",
                revision_id
            )));
        }
        if grantee == revision.owner {
            return Err(Error::InvalidGrant(
                "cannot grant access to the owner".to_string(),
            ));
        }

        let grant = Grant {
            id: GrantId::new(),
            grantee,
            revision: revision_id,
            owner,
            level,
        };

        if !self.claim_grant_key(&grant)? {
            return Err(Error::DuplicateGrant(format!(
                "{} already holds {} on {}",
                grantee, level, revision_id
            )));
        }

        // markers before the record, as for revisions
        let grantee_key = grantee.to_string();
        let revision_key = revision_id.to_string();
        let member = grant.id.to_string();
        let committed = self
            .grantee_index()
            .insert(&grantee_key, &member)
            .and_then(|()| self.revision_grants_index().insert(&revision_key, &member))
            .and_then(|()| write_record(self.repo, &self.grant_path(&grant.id), &grant));

        if let Err(e) = committed {
            let _ = self.grantee_index().remove(&grantee_key, &member);
            let _ = self.revision_grants_index().remove(&revision_key, &member);
            let _ = remove_if_exists(&self.grant_key_path(&grant));
            return Err(e);
        }

        info!(
            owner = %owner,
            grantee = %grantee,
            revision = %revision_id,
            level = %level,
            "grant created"
        );
        Ok(grant)
    }

    /// withdraw a grant; only the owner of the underlying revision may
    pub fn revoke_grant(&self, owner: PrincipalId, grant_id: GrantId) -> Result<()> {
        let grant: Grant = read_record(&self.grant_path(&grant_id))?
            .ok_or_else(|| Error::NotFound(format!("grant {}", grant_id)))?;

        if grant.owner != owner {
            return Err(Error::Forbidden(format!(
                "not the owner of grant {}",
                grant_id
            )));
        }

        self.remove_grant(&grant)?;
        info!(owner = %owner, grant = %grant_id, grantee = %grant.grantee, "grant revoked");
        Ok(())
    }

    /// grants on a revision, as seen by its owner
    pub fn grants_on(&self, owner: PrincipalId, revision_id: RevisionId) -> Result<Vec<Grant>> {
        let revision = self
            .load_revision(&revision_id)?
            .ok_or_else(|| not_found_revision(&revision_id))?;
        if revision.owner != owner {
            return Err(Error::Forbidden(format!(
                "not the owner of revision {}",
                revision_id
            )));
        }
        self.grants_on_revision(&revision_id)
    }

    pub(crate) fn grants_on_revision(&self, revision_id: &RevisionId) -> Result<Vec<Grant>> {
        let ids = self
            .revision_grants_index()
            .members::<GrantId>(&revision_id.to_string())?;
        self.load_grants(ids)
    }

    pub(crate) fn grants_received(&self, grantee: &PrincipalId) -> Result<Vec<Grant>> {
        let ids = self.grantee_index().members::<GrantId>(&grantee.to_string())?;
        self.load_grants(ids)
    }

    /// drop a grant's record, uniqueness claim and markers, in that order
    pub(crate) fn remove_grant(&self, grant: &Grant) -> Result<()> {
        remove_if_exists(&self.grant_path(&grant.id))?;
        remove_if_exists(&self.grant_key_path(grant))?;
        self.grantee_index()
            .remove(&grant.grantee.to_string(), &grant.id.to_string())?;
        self.revision_grants_index()
            .remove(&grant.revision.to_string(), &grant.id.to_string())?;
        Ok(())
    }

    fn load_grants(&self, ids: Vec<GrantId>) -> Result<Vec<Grant>> {
        let mut grants = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(grant) = read_record(&self.grant_path(&id))? {
                grants.push(grant);
            }
        }
        Ok(grants)
    }

    /// exclusive create on the (grantee, revision, level) key
    fn claim_grant_key(&self, grant: &Grant) -> Result<bool> {
        let key_path = self.grant_key_path(grant);
        if let Some(parent) = key_path.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&key_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => {
                return Err(Error::Io {
                    path: key_path,
                    source: e,
                })
            }
        };
        writeln!(file, "{}", grant.id).with_path(&key_path)?;
        Ok(true)
    }

    fn grant_path(&self, id: &GrantId) -> PathBuf {
        self.repo.grants_path().join(id.to_string())
    }

    fn grant_key_path(&self, grant: &Grant) -> PathBuf {
        let level = [grant.level as u8];
        let key = key_of(&[
            &grant.grantee.as_bytes()[..],
            &grant.revision.as_bytes()[..],
            &level[..],
        ]);
        let (prefix, rest) = key.to_path_components();
        self.repo.grant_keys_path().join(prefix).join(rest)
    }

    fn grantee_index(&self) -> Index {
        Index::new(self.repo.index_path().join("grantee"))
    }

    fn revision_grants_index(&self) -> Index {
        Index::new(self.repo.index_path().join("revision-grants"))
    }
}

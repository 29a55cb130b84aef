//! access predicates shared by every catalog read and write.
//!
//! `grants` is any set of grants; only those naming `principal` as grantee
//! and `revision` as target count.

use crate::types::{AccessLevel, FileRevision, Grant, PrincipalId};

/// highest level `principal` holds on `revision` through grants.
/// holding both Read and ReadWrite rows is allowed; the max wins.
pub fn effective_level(
    principal: &PrincipalId,
    revision: &FileRevision,
    grants: &[Grant],
) -> Option<AccessLevel> {
    grants
        .iter()
        .filter(|g| g.grantee == *principal && g.revision == revision.id)
        .map(|g| g.level)
        .max()
}

pub fn can_read(principal: &PrincipalId, revision: &FileRevision, grants: &[Grant]) -> bool {
    revision.owner == *principal || effective_level(principal, revision, grants).is_some()
}

pub fn can_write(principal: &PrincipalId, revision: &FileRevision, grants: &[Grant]) -> bool {
    revision.owner == *principal
        || effective_level(principal, revision, grants).is_some_and(AccessLevel::allows_write)
}

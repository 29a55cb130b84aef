mod grant;
mod id;
mod principal;
mod revision;

pub use grant::{AccessLevel, Grant};
pub use id::{GrantId, PrincipalId, RevisionId};
pub use principal::Principal;
pub use revision::FileRevision;

//! revstore - path-versioned file store
//!
//! a content-addressed payload store with a catalog of per-owner revision
//! sequences and per-revision access grants. the host application supplies
//! the acting principal on every call; authentication and transport live
//! outside this crate.
//!
//! # Core concepts
//!
//! - **Payload**: immutable file bytes, addressed by their SHA-256
//! - **FileRevision**: one upload of `path/file_name` by an owner, numbered
//!   `1..N` within (owner, path)
//! - **Grant**: Read or ReadWrite access for another principal on one revision
//!
//! # Access rules
//!
//! owners can do everything. any grant allows reads; a ReadWrite grant also
//! allows delete. only owners create revisions and manage grants. rows outside
//! a principal's scope are reported as not found.
//!
//! # Example usage
//!
//! ```no_run
//! use revstore::{AccessLevel, Catalog, GranteeRef, Repo};
//! use std::path::Path;
//!
//! let mut repo = Repo::init(Path::new("/path/to/store")).unwrap();
//! let alice = repo.config_mut().add_principal("alice@example.com", "Alice").unwrap();
//! let bob = repo.config_mut().add_principal("bob@example.com", "Bob").unwrap();
//! repo.save_config().unwrap();
//!
//! let catalog = Catalog::new(&repo);
//! let rev = catalog.create_revision(alice, "documents/test", "test.txt", b"Hello world").unwrap();
//!
//! let bob_ref: GranteeRef = "bob@example.com".parse().unwrap();
//! catalog.grant(alice, &bob_ref, rev.id, AccessLevel::Read, repo.config()).unwrap();
//!
//! let latest = catalog.resolve_file_path(bob, "documents/test/test.txt", None).unwrap();
//! assert_eq!(latest.revision, 1);
//! ```

mod config;
mod error;
mod hash;
mod identity;
mod repo;

pub mod catalog;
pub mod ops;
pub mod store;
pub mod types;

pub use catalog::Catalog;
pub use config::{CatalogConfig, Config};
pub use error::{Error, IoResultExt, Result};
pub use hash::{ContentHash, ContentHasher};
pub use identity::{GranteeRef, IdentityProvider};
pub use repo::{Repo, RepoLock};
pub use store::{ContentStore, PayloadRef};
pub use types::{AccessLevel, FileRevision, Grant, GrantId, Principal, PrincipalId, RevisionId};

use std::path::PathBuf;

use crate::hash::ContentHash;

/// error type for revstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("repository not found at {0}")]
    NoRepo(PathBuf),

    #[error("repository already exists at {0}")]
    RepoExists(PathBuf),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("revision allocation for {path} lost the race {attempts} times")]
    Conflict { path: String, attempts: u32 },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("revision {revision} not found for {path}/{file_name}")]
    RevisionNotFound {
        path: String,
        file_name: String,
        revision: u32,
    },

    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    #[error("grant already exists: {0}")]
    DuplicateGrant(String),

    #[error("principal already exists: {0}")]
    PrincipalExists(String),

    #[error("payload not found: {0}")]
    PayloadNotFound(ContentHash),

    #[error("repository integrity check failed")]
    IntegrityCheckFailed,

    #[error("lock contention on repository")]
    LockContention,

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid access level: {0}")]
    InvalidAccessLevel(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

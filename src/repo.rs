use std::fs::File;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};

/// a revstore repository
pub struct Repo {
    path: PathBuf,
    config: Config,
}

impl Repo {
    /// initialize a new repository at the given path
    pub fn init(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if config_path.exists() {
            return Err(Error::RepoExists(path.to_path_buf()));
        }

        // create directory structure
        std::fs::create_dir_all(path.join("objects/blobs")).with_path(path)?;
        std::fs::create_dir_all(path.join("catalog/revisions")).with_path(path)?;
        std::fs::create_dir_all(path.join("catalog/sequences")).with_path(path)?;
        std::fs::create_dir_all(path.join("catalog/grants")).with_path(path)?;
        std::fs::create_dir_all(path.join("catalog/grant-keys")).with_path(path)?;
        std::fs::create_dir_all(path.join("catalog/index")).with_path(path)?;
        std::fs::create_dir_all(path.join("tmp")).with_path(path)?;

        let config = Config::default();
        config.save(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// open an existing repository
    pub fn open(path: &Path) -> Result<Self> {
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoRepo(path.to_path_buf()));
        }

        let config = Config::load(&config_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// repository root path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// save configuration changes
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path())
    }

    /// path to config.toml
    pub fn config_path(&self) -> PathBuf {
        self.path.join("config.toml")
    }

    /// path to payload blobs
    pub fn blobs_path(&self) -> PathBuf {
        self.path.join("objects/blobs")
    }

    /// path to catalog directory
    pub fn catalog_path(&self) -> PathBuf {
        self.path.join("catalog")
    }

    /// path to revision records
    pub fn revisions_path(&self) -> PathBuf {
        self.catalog_path().join("revisions")
    }

    /// path to per-(owner, path) revision slots
    pub fn sequences_path(&self) -> PathBuf {
        self.catalog_path().join("sequences")
    }

    /// path to grant records
    pub fn grants_path(&self) -> PathBuf {
        self.catalog_path().join("grants")
    }

    /// path to grant uniqueness claims
    pub fn grant_keys_path(&self) -> PathBuf {
        self.catalog_path().join("grant-keys")
    }

    /// path to secondary index markers
    pub fn index_path(&self) -> PathBuf {
        self.catalog_path().join("index")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// path to lock file
    pub fn lock_path(&self) -> PathBuf {
        self.path.join(".lock")
    }

    /// acquire shared lock, held by writers while a payload is not yet referenced.
    /// blocks while an exclusive holder (gc) is running.
    pub fn lock_shared(&self) -> Result<RepoLock> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock =
            Flock::lock(file, FlockArg::LockShared).map_err(|_| Error::LockContention)?;

        Ok(RepoLock { flock })
    }

    /// acquire exclusive lock on repository, failing if anyone holds it
    pub fn lock(&self) -> Result<RepoLock> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|_| Error::LockContention)?;

        Ok(RepoLock { flock })
    }

    /// try to acquire exclusive lock, returning None if already locked
    pub fn try_lock(&self) -> Result<Option<RepoLock>> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => Ok(Some(RepoLock { flock })),
            Err((_, nix::errno::Errno::EWOULDBLOCK)) => Ok(None),
            Err(_) => Err(Error::LockContention),
        }
    }
}

/// guard that holds repository lock until dropped
pub struct RepoLock {
    #[allow(dead_code)]
    flock: Flock<File>,
}
// lock is released automatically when Flock is dropped

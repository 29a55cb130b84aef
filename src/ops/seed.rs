use std::fs::File;
use std::path::Path;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::{Error, IoResultExt, Result};
use crate::repo::Repo;
use crate::types::{FileRevision, PrincipalId};

/// logical path fixtures are loaded under
pub const FIXTURE_PATH: &str = "fixtures";

/// outcome of loading one fixture file
#[derive(Debug)]
pub struct SeedEntry {
    pub file_name: String,
    pub owner_email: String,
    pub principal_created: bool,
    /// `None` when the fixture was already loaded
    pub revision: Option<FileRevision>,
}

/// load every regular file in `dir` as revision 1 of `fixtures/<file>`,
/// owned by a per-file principal `<file>@example.com`. re-running is a no-op.
pub fn seed(repo: &mut Repo, dir: &Path) -> Result<Vec<SeedEntry>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        if !entry.file_type().with_path(entry.path())?.is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidFileName(path.display().to_string()))?
            .to_string();
        files.push((file_name, path));
    }
    files.sort();

    // principals first, so the config is written once
    let mut owners: Vec<(PrincipalId, bool)> = Vec::with_capacity(files.len());
    for (file_name, _) in &files {
        let email = fixture_email(file_name);
        let existing = repo.config().get_principal(&email).map(|p| p.id);
        let owner = match existing {
            Some(id) => (id, false),
            None => {
                let id = repo
                    .config_mut()
                    .add_principal(email.clone(), file_name.clone())?;
                info!(email = %email, "created fixture principal");
                (id, true)
            }
        };
        owners.push(owner);
    }
    if owners.iter().any(|(_, created)| *created) {
        repo.save_config()?;
    }

    let catalog = Catalog::new(repo);
    let mut entries = Vec::with_capacity(files.len());
    for ((file_name, path), (owner, principal_created)) in files.into_iter().zip(owners) {
        let owner_email = fixture_email(&file_name);

        // any visible revision counts as loaded
        let revision = match catalog.resolve_by_path(owner, FIXTURE_PATH, &file_name, None) {
            Ok(_) => {
                warn!(file = %file_name, "fixture already loaded");
                None
            }
            Err(Error::NotFound(_)) => {
                let mut file = File::open(&path).with_path(&path)?;
                let rev = catalog.create_revision_from_reader(
                    owner,
                    FIXTURE_PATH,
                    &file_name,
                    &mut file,
                )?;
                Some(rev)
            }
            Err(e) => return Err(e),
        };

        entries.push(SeedEntry {
            file_name,
            owner_email,
            principal_created,
            revision,
        });
    }

    Ok(entries)
}

fn fixture_email(file_name: &str) -> String {
    format!("{}@example.com", file_name)
}

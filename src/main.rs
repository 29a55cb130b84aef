//! revstore CLI - path-versioned file store command line interface

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use revstore::ops::{fsck, gc, seed};
use revstore::{
    AccessLevel, Catalog, ContentHash, GrantId, GranteeRef, IdentityProvider, IoResultExt,
    PrincipalId, Repo, RevisionId,
};

#[derive(Parser)]
#[command(name = "revstore")]
#[command(about = "path-versioned file store with per-revision access grants")]
#[command(version)]
struct Cli {
    /// repository path
    #[arg(short, long, default_value = ".", env = "REVSTORE_REPO")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new repository
    Init {
        /// path to create repository at
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// manage the principal directory
    Principal {
        #[command(subcommand)]
        action: PrincipalAction,
    },

    /// store a local file as the next revision of a logical path
    Upload {
        /// acting principal email
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        /// logical directory, e.g. documents/reviews
        path: String,

        /// local file to upload
        file: PathBuf,

        /// file name to record instead of the local basename
        #[arg(long)]
        name: Option<String>,
    },

    /// list visible revisions, newest first
    Ls {
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        /// glob over path/file_name
        #[arg(short, long = "match")]
        pattern: Option<String>,
    },

    /// show one revision
    Show {
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        id: String,
    },

    /// download a file by path, latest revision unless given
    Get {
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        /// path/file_name
        file_path: String,

        #[arg(long)]
        revision: Option<u32>,

        /// output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// list visible revisions with the given content hash
    FindHash {
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        hash: String,
    },

    /// delete a revision
    Rm {
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        id: String,
    },

    /// grant another principal access to one of your revisions
    Grant {
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        revision: String,

        /// grantee email or principal id
        grantee: String,

        /// read or read_write
        #[arg(short, long, default_value = "read")]
        level: String,
    },

    /// withdraw a grant
    Revoke {
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        grant: String,
    },

    /// list grants on one of your revisions
    Grants {
        #[arg(long = "as", env = "REVSTORE_AS")]
        principal: String,

        revision: String,
    },

    /// verify repository integrity
    Fsck,

    /// garbage collect unreferenced payloads
    Gc {
        /// only show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// load fixture files as revision 1, one owner per file
    Seed {
        /// directory of fixture files
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum PrincipalAction {
    /// register a principal
    Add {
        email: String,

        /// display name
        #[arg(short, long, default_value = "")]
        name: String,
    },

    /// remove a principal
    Remove { email: String },

    /// list principals
    List,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> revstore::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            Repo::init(&path)?;
            println!("initialized revstore repository at {}", path.display());
        }

        Commands::Principal { action } => {
            let mut repo = Repo::open(&cli.repo)?;
            match action {
                PrincipalAction::Add { email, name } => {
                    let id = repo.config_mut().add_principal(email.clone(), name)?;
                    repo.save_config()?;
                    println!("{} {}", id, email);
                }
                PrincipalAction::Remove { email } => {
                    let removed = repo.config_mut().remove_principal(&email)?;
                    repo.save_config()?;
                    println!("removed {} {}", removed.id, removed.email);
                }
                PrincipalAction::List => {
                    for p in &repo.config().principals {
                        if p.name.is_empty() {
                            println!("{} {}", p.id, p.email);
                        } else {
                            println!("{} {} ({})", p.id, p.email, p.name);
                        }
                    }
                }
            }
        }

        Commands::Upload {
            principal,
            path,
            file,
            name,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let owner = acting(&repo, &principal)?;
            let file_name = match name {
                Some(name) => name,
                None => file.to_string_lossy().into_owned(),
            };

            let mut reader = File::open(&file).with_path(&file)?;
            let rev = Catalog::new(&repo)
                .create_revision_from_reader(owner, &path, &file_name, &mut reader)?;
            println!("{}", rev);
            println!("download: {}", rev.download_path());
        }

        Commands::Ls { principal, pattern } => {
            let repo = Repo::open(&cli.repo)?;
            let who = acting(&repo, &principal)?;
            let catalog = Catalog::new(&repo);

            let revisions = match pattern {
                Some(pattern) => catalog.list_visible_matching(who, &pattern)?,
                None => catalog.list_visible(who)?,
            };
            for rev in revisions {
                println!("{}", rev);
            }
        }

        Commands::Show { principal, id } => {
            let repo = Repo::open(&cli.repo)?;
            let who = acting(&repo, &principal)?;
            let rev = Catalog::new(&repo).get_by_id(who, id.parse::<RevisionId>()?)?;

            println!("id        {}", rev.id);
            println!("owner     {}", rev.owner);
            println!("path      {}", rev.path);
            println!("file_name {}", rev.file_name);
            println!("revision  {}", rev.revision);
            println!("hash      {}", rev.content_hash);
            println!("created   {}", rev.created_at.to_rfc3339());
            println!("download  {}", rev.download_path());
        }

        Commands::Get {
            principal,
            file_path,
            revision,
            output,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let who = acting(&repo, &principal)?;
            let catalog = Catalog::new(&repo);
            let rev = catalog.resolve_file_path(who, &file_path, revision)?;

            match output {
                Some(out) => {
                    let mut file = File::create(&out).with_path(&out)?;
                    let written = catalog.read_content_to(who, rev.id, &mut file)?;
                    eprintln!("wrote {} bytes to {}", written, out.display());
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    catalog.read_content_to(who, rev.id, &mut stdout)?;
                    stdout.flush().with_path("stdout")?;
                }
            }
        }

        Commands::FindHash { principal, hash } => {
            let repo = Repo::open(&cli.repo)?;
            let who = acting(&repo, &principal)?;
            let hash = ContentHash::from_hex(&hash)?;

            for rev in Catalog::new(&repo).find_by_hash(who, &hash)? {
                println!("{}", rev);
            }
        }

        Commands::Rm { principal, id } => {
            let repo = Repo::open(&cli.repo)?;
            let who = acting(&repo, &principal)?;
            let id = id.parse::<RevisionId>()?;
            Catalog::new(&repo).delete_by_id(who, id)?;
            println!("deleted {}", id);
        }

        Commands::Grant {
            principal,
            revision,
            grantee,
            level,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let owner = acting(&repo, &principal)?;
            let grantee = grantee.parse::<GranteeRef>()?;
            let level = level.parse::<AccessLevel>()?;

            let grant = Catalog::new(&repo).grant(
                owner,
                &grantee,
                revision.parse::<RevisionId>()?,
                level,
                repo.config(),
            )?;
            println!("{}", grant);
        }

        Commands::Revoke { principal, grant } => {
            let repo = Repo::open(&cli.repo)?;
            let owner = acting(&repo, &principal)?;
            let grant = grant.parse::<GrantId>()?;
            Catalog::new(&repo).revoke_grant(owner, grant)?;
            println!("revoked {}", grant);
        }

        Commands::Grants {
            principal,
            revision,
        } => {
            let repo = Repo::open(&cli.repo)?;
            let owner = acting(&repo, &principal)?;
            let grants = Catalog::new(&repo).grants_on(owner, revision.parse::<RevisionId>()?)?;

            for grant in grants {
                let email = repo
                    .config()
                    .principals
                    .iter()
                    .find(|p| p.id == grant.grantee)
                    .map(|p| p.email.as_str())
                    .unwrap_or("?");
                println!("{} {} {}", grant.id, email, grant.level);
            }
        }

        Commands::Fsck => {
            let repo = Repo::open(&cli.repo)?;
            let report = fsck(&repo)?;

            println!("objects checked: {}", report.objects_checked);

            if !report.corrupt_payloads.is_empty() {
                println!("\ncorrupt payloads:");
                for p in &report.corrupt_payloads {
                    println!("  {} (content hashes to {})", p.hash, p.actual);
                }
            }

            if !report.missing_payloads.is_empty() {
                println!("\nmissing payloads:");
                for p in &report.missing_payloads {
                    println!("  {} (referenced by {} {})", p.hash, p.revision, p.file_path);
                }
            }

            if !report.dangling_payloads.is_empty() {
                println!("\ndangling payloads: {}", report.dangling_payloads.len());
            }

            if report.is_ok() {
                println!("\nrepository is healthy");
            } else {
                println!("\nrepository has issues");
                return Err(revstore::Error::IntegrityCheckFailed);
            }
        }

        Commands::Gc { dry_run } => {
            let repo = Repo::open(&cli.repo)?;
            let stats = gc(&repo, dry_run)?;

            let action = if dry_run { "would remove" } else { "removed" };
            println!(
                "{} {} payloads ({} revisions scanned)",
                action, stats.payloads_removed, stats.revisions_scanned
            );
            println!("freed {} bytes", stats.bytes_freed);
        }

        Commands::Seed { dir } => {
            let mut repo = Repo::open(&cli.repo)?;
            for entry in seed(&mut repo, &dir)? {
                if entry.principal_created {
                    println!("created principal {}", entry.owner_email);
                }
                match entry.revision {
                    Some(rev) => {
                        println!("created {} owned by {}", rev.file_path(), entry.owner_email)
                    }
                    None => println!("{} already exists", entry.file_name),
                }
            }
        }
    }

    Ok(())
}

/// resolve the `--as` email against the repository's principal directory
fn acting(repo: &Repo, email: &str) -> revstore::Result<PrincipalId> {
    repo.config().lookup_by_email(email)
}

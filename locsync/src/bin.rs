use std::{
    env,
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
};

use env_logger::Env;
use structopt::StructOpt;

use locsync_core::config::{ProjectConfig, UserConfig};
use locsync_core::language::TableLanguageLookup;
use locsync_core::remote::RemoteUrl;

use locsync::backup::BackupManager;
use locsync::context::Context;
use locsync::error::Error;
use locsync::operation::link::link;
use locsync::operation::pull::{pull, PullOptions};
use locsync::operation::push::{push, PushOptions};
use locsync::operation::status::status;

#[derive(StructOpt, Debug)]
#[structopt(name = "locsync", about = "Synchronize local localization resources with a remote project")]
struct Opt {
    /// Project directory
    #[structopt(long, short, parse(from_os_str), default_value = ".")]
    project: PathBuf,

    /// Read the api token from this environment variable
    #[structopt(long)]
    token_env: Option<String>,

    /// Accept raw api tokens from the user config file
    #[structopt(long)]
    allow_raw_tokens: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Upload local changes to the remote project
    Push {
        /// Push despite detected conflicts
        #[structopt(long)]
        force: bool,
        /// Delete remote files that no longer exist locally
        #[structopt(long)]
        allow_delete: bool,
    },
    /// Overwrite local files with the remote project content
    Pull {
        /// Pull despite detected conflicts
        #[structopt(long)]
        force: bool,
        /// Backups to keep after a successful pull
        #[structopt(long, default_value = "10")]
        keep_backups: usize,
    },
    /// Attach this folder to an existing remote project
    Link {
        /// Remote project url, e.g. https://host/org/project
        url: String,
    },
    /// Report local drift against the recorded sync state
    Status,
    /// Manage pull backups
    Backups(BackupsCommand),
}

#[derive(StructOpt, Debug)]
enum BackupsCommand {
    /// List backups, newest first
    List,
    /// Restore a backup archive over the current files
    Restore {
        #[structopt(parse(from_os_str))]
        archive: PathBuf,
    },
    /// Delete the oldest backups beyond the kept count
    Prune {
        #[structopt(long, default_value = "5")]
        keep: usize,
    },
}

impl Opt {
    fn remote_url(&self) -> Result<RemoteUrl, Error> {
        if let Command::Link { url } = &self.command {
            return RemoteUrl::parse(url)
                .map_err(|error| Error::UnexpectedError(format!("{}", error)));
        }

        let config = ProjectConfig::load(&self.project)
            .map_err(|error| Error::UnexpectedError(format!("{:#}", error)))?;
        let raw = config
            .and_then(|config| config.remote)
            .ok_or_else(|| {
                Error::MissingRemote(format!(
                    "No remote configured in '{}', run 'locsync link <url>' first",
                    self.project.display()
                ))
            })?;
        RemoteUrl::parse(&raw).map_err(|error| Error::UnexpectedError(format!("{}", error)))
    }

    fn to_context(&self) -> Result<Context, Error> {
        let remote_url = self.remote_url()?;
        let (username, token) = self.credentials(&remote_url)?;
        Context::new(self.project.clone(), remote_url, username, token)
    }

    /// Token resolution order: explicit env var, user config (keyring
    /// or raw token), interactive prompt.
    fn credentials(&self, remote_url: &RemoteUrl) -> Result<(String, String), Error> {
        if let Some(token_env) = &self.token_env {
            match env::var(token_env) {
                Ok(token) => return Ok((whoami::username(), token)),
                Err(_) => {
                    return Err(Error::UnexpectedError(format!(
                        "No env var set for name {}",
                        token_env
                    )))
                }
            }
        }

        if let Ok(user_config) = UserConfig::from_env(self.allow_raw_tokens) {
            if let Some(credentials) = user_config.credentials_for(&remote_url.host) {
                return Ok((credentials.username.clone(), credentials.token.clone()));
            }
        }

        let token = rpassword::prompt_password(format!(
            "Api token for {} ? ",
            remote_url.host
        ))?;
        Ok((whoami::username(), token))
    }
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let opt = Opt::from_args();
    let stop_signal = Arc::new(AtomicBool::new(false));
    let languages = TableLanguageLookup::builtin();

    match &opt.command {
        Command::Push {
            force,
            allow_delete,
        } => {
            let context = opt.to_context()?;
            let client = context
                .client()
                .map_err(|error| Error::UnexpectedError(format!("{}", error)))?;
            let options = PushOptions {
                force: *force,
                allow_delete: *allow_delete,
            };
            let outcome = push(&context, &client, &languages, &stop_signal, &options)
                .map_err(|error| Error::UnexpectedError(format!("{}", error)))?;
            println!(
                "Pushed {} file(s), deleted {} remote file(s)",
                outcome.uploaded, outcome.deleted
            );
        }
        Command::Pull { force, keep_backups } => {
            let context = opt.to_context()?;
            let client = context
                .client()
                .map_err(|error| Error::UnexpectedError(format!("{}", error)))?;
            let options = PullOptions {
                force: *force,
                keep_backups: Some(*keep_backups),
            };
            let outcome = pull(&context, &client, &languages, &stop_signal, &options)
                .map_err(|error| Error::UnexpectedError(format!("{}", error)))?;
            println!(
                "Pulled {} file(s), deleted {} local file(s) (backup at {})",
                outcome.written,
                outcome.deleted,
                outcome.backup_path.display()
            );
        }
        Command::Link { .. } => {
            let context = opt.to_context()?;
            let client = context
                .client()
                .map_err(|error| Error::UnexpectedError(format!("{}", error)))?;
            link(&context, &client, &languages)
                .map_err(|error| Error::UnexpectedError(format!("{}", error)))?;
            println!("Linked {} to {}", opt.project.display(), context.remote_url);
        }
        Command::Status => {
            let report = status(&opt.project)
                .map_err(|error| Error::UnexpectedError(format!("{:#}", error)))?;
            if report.needs_migration {
                println!("Sync state uses the legacy shape, a fresh sync will rebuild it");
            }
            if report.was_corrupted {
                println!("Sync state is corrupted, a fresh sync will rebuild it");
            }
            for path in &report.modified {
                println!("modified: {}", path);
            }
            for path in &report.unsynced {
                println!("unsynced: {}", path);
            }
            for entry in &report.missing {
                println!("missing:  {}", entry);
            }
            if report.is_clean() && !report.was_corrupted && !report.needs_migration {
                println!("Up to date");
            }
        }
        Command::Backups(backups_command) => {
            let manager = BackupManager::new(&opt.project);
            match backups_command {
                BackupsCommand::List => {
                    let backups = manager
                        .list_backups()
                        .map_err(|error| Error::UnexpectedError(format!("{:#}", error)))?;
                    if backups.is_empty() {
                        println!("No backups");
                    }
                    for backup in backups {
                        println!("{}  {}", backup.timestamp, backup.path.display());
                    }
                }
                BackupsCommand::Restore { archive } => {
                    manager
                        .restore_backup(archive)
                        .map_err(|error| Error::UnexpectedError(format!("{:#}", error)))?;
                    println!("Restored {}", archive.display());
                }
                BackupsCommand::Prune { keep } => {
                    let removed = manager
                        .prune_backups(*keep)
                        .map_err(|error| Error::UnexpectedError(format!("{:#}", error)))?;
                    println!("Removed {} backup(s)", removed.len());
                }
            }
        }
    }

    log::info!("Exit application");
    Ok(())
}

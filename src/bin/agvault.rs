// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use agvault::{
    config::{ConfigError, GlobalDefaults, ProjectConfig},
    output::Output,
    vault::{workspace::Workspace, StoreReport, Vault},
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Text};
use serde::Serialize;
use std::{
    env::current_dir,
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "agvault [options] <agvault-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Only show results and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Project root to operate on instead of the current directory.
    #[arg(short, long, global = true, value_name = "dir")]
    pub root: Option<PathBuf>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let root = match self.root {
            Some(root) => root,
            None => current_dir()?,
        };
        let quiet = self.quiet;

        match self.command {
            Command::Init(opts) => run_init(root, opts),
            Command::Reinit(opts) => run_reinit(root, opts),
            Command::Sync(opts) => run_sync(root, quiet, opts),
            Command::Pull(opts) => run_pull(root, quiet, opts),
            Command::Store => run_store(root, quiet),
            Command::Clean(opts) => run_clean(root, quiet, opts),
            Command::List(opts) => run_list(root, quiet, opts),
            Command::Remove(opts) => run_remove(root, quiet, opts),
            Command::Add(opts) => run_add(root, quiet, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Connect project to a vault.
    #[command(override_usage = "agvault init [options]")]
    Init(InitOptions),

    /// Reset project configuration to default patterns.
    #[command(override_usage = "agvault reinit [options]")]
    Reinit(InitOptions),

    /// Pull vault files into project, then store project files in vault.
    #[command(override_usage = "agvault sync [options]")]
    Sync(SyncOptions),

    /// Copy vault files into project.
    #[command(override_usage = "agvault pull [options]")]
    Pull(PullOptions),

    /// Copy project files into vault and push.
    #[command(override_usage = "agvault store")]
    Store,

    /// Delete local files already kept in vault, or purge the vault.
    #[command(override_usage = "agvault clean [options]")]
    Clean(CleanOptions),

    /// List files in vault or project.
    #[command(override_usage = "agvault list [options]")]
    List(ListOptions),

    /// Stop keeping paths in vault.
    #[command(override_usage = "agvault remove <path>...")]
    Remove(PathOptions),

    /// Start keeping paths in vault.
    #[command(override_usage = "agvault add <path>...")]
    Add(PathOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// URL of remote vault repository.
    #[arg(short, long, value_name = "url")]
    pub url: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Print result as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PullOptions {
    /// Only pull vault files matching these paths.
    #[arg(short, long = "file", value_name = "path", num_args = 1..)]
    pub files: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CleanOptions {
    /// Delete every file in vault instead, for all projects.
    #[arg(long)]
    pub purge: bool,

    /// Do not ask for confirmation before purging.
    #[arg(short, long, requires = "purge")]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// List project files that would be stored.
    #[arg(short, long, group = "target")]
    pub local: bool,

    /// List files of every project in vault.
    #[arg(short, long, group = "target")]
    pub all: bool,

    /// Print result as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PathOptions {
    /// Paths relative to project root.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time()
        .with_writer(std::io::stderr);
    let level = if cli.quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run_init(root: PathBuf, opts: InitOptions) -> Result<()> {
    if existing_config(&root)?.is_some_and(|config| config.is_initialized()) {
        bail!("project is already initialized, use `agvault reinit` to reset it");
    }

    let url = match opts.url {
        Some(url) => url,
        None => match GlobalDefaults::load()?.default_repo_url {
            Some(url) => {
                info!("using default vault {url:?}");
                url
            }
            None => prompt_url()?,
        },
    };

    write_config(&root, url)
}

fn run_reinit(root: PathBuf, opts: InitOptions) -> Result<()> {
    let existing = existing_config(&root)?.filter(ProjectConfig::is_initialized);
    let url = match (opts.url, existing) {
        (Some(url), _) => url,
        (None, Some(config)) => config.repo_url,
        (None, None) => prompt_url()?,
    };

    write_config(&root, url)
}

fn run_sync(root: PathBuf, quiet: bool, opts: SyncOptions) -> Result<()> {
    let output = Output::new(quiet, opts.json);
    let vault = Vault::open(root)?;
    let observer = output.observer();
    let report = vault.sync(observer.as_ref())?;
    drop(observer);

    if output.is_json() {
        return print_json(&report);
    }

    println!("pulled {} files", report.pulled);
    print_store(&report.stored);

    Ok(())
}

fn run_pull(root: PathBuf, quiet: bool, opts: PullOptions) -> Result<()> {
    let output = Output::new(quiet, false);
    let vault = Vault::open(root)?;
    let observer = output.observer();
    let pulled = vault.pull(&opts.files, observer.as_ref())?;
    drop(observer);

    println!("pulled {pulled} files");

    Ok(())
}

fn run_store(root: PathBuf, quiet: bool) -> Result<()> {
    let output = Output::new(quiet, false);
    let vault = Vault::open(root)?;
    let observer = output.observer();
    let report = vault.store(observer.as_ref())?;
    drop(observer);

    print_store(&report);

    Ok(())
}

fn run_clean(root: PathBuf, quiet: bool, opts: CleanOptions) -> Result<()> {
    let output = Output::new(quiet, false);
    let vault = Vault::open(root)?;

    if opts.purge {
        if !opts.yes && !confirm_purge(&vault)? {
            info!("purge cancelled");
            return Ok(());
        }

        let observer = output.observer();
        let removed = vault.purge(observer.as_ref())?;
        drop(observer);
        println!("purged {removed} files from vault");

        return Ok(());
    }

    let observer = output.observer();
    let removed = vault.clean(observer.as_ref())?;
    drop(observer);

    for path in &removed {
        println!("{path}");
    }
    if output.is_human() {
        println!("removed {} local files kept in vault", removed.len());
    }

    Ok(())
}

fn run_list(root: PathBuf, quiet: bool, opts: ListOptions) -> Result<()> {
    let output = Output::new(quiet, opts.json);
    let vault = Vault::open(root)?;

    let files = if opts.local {
        vault
            .list_local()?
            .into_iter()
            .map(|file| file.relative_path)
            .collect()
    } else {
        let observer = output.observer();
        let files = if opts.all {
            vault.list_all(observer.as_ref())?
        } else {
            vault.list(observer.as_ref())?
        };
        drop(observer);
        files
    };

    if output.is_json() {
        return print_json(&files);
    }

    if files.is_empty() && output.is_human() {
        println!("no files");
    }
    for file in files {
        println!("{file}");
    }

    Ok(())
}

fn run_remove(root: PathBuf, quiet: bool, opts: PathOptions) -> Result<()> {
    let output = Output::new(quiet, false);
    let mut vault = Vault::open(root)?;
    let observer = output.observer();
    let report = vault.remove(&opts.paths, observer.as_ref())?;
    drop(observer);

    print_store(&report);

    Ok(())
}

fn run_add(root: PathBuf, quiet: bool, opts: PathOptions) -> Result<()> {
    let output = Output::new(quiet, false);
    let mut vault = Vault::open(root)?;
    let observer = output.observer();
    let report = vault.add(&opts.paths, observer.as_ref())?;
    drop(observer);

    print_store(&report);

    Ok(())
}

fn existing_config(root: &Path) -> Result<Option<ProjectConfig>> {
    match ProjectConfig::load(root) {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::NotFound { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn write_config(root: &Path, url: String) -> Result<()> {
    let url = url.trim().to_string();
    if url.is_empty() {
        bail!("vault repository URL cannot be empty");
    }

    let config = ProjectConfig::new(url.clone());
    config.save(root)?;
    info!(
        "project uses vault {url:?} as workspace {:?}",
        Workspace::from_project_root(root).name()
    );

    let defaults = GlobalDefaults {
        default_repo_url: Some(url),
    };
    if let Err(err) = defaults.save() {
        warn!("cannot remember default vault: {err}");
    }

    Ok(())
}

fn prompt_url() -> Result<String> {
    let url = Text::new("vault repository URL")
        .with_help_message("private git repository, e.g., git@github.com:me/vault.git")
        .prompt()?;

    Ok(url)
}

fn confirm_purge(vault: &Vault) -> Result<bool> {
    let answer = Confirm::new(&format!(
        "delete every file in vault {} for all projects?",
        vault.config().repo_url
    ))
    .with_default(false)
    .prompt()?;

    Ok(answer)
}

fn print_store(report: &StoreReport) {
    if report.pushed {
        println!("stored {} files", report.files);
    } else {
        println!("stored {} files, vault already up to date", report.files);
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

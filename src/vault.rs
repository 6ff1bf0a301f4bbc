// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Vault reconciliation.
//!
//! A __vault__ is a private remote git repository that stores a curated
//! subset of files from many local projects. Files travel between a project
//! and its vault workspace in two directions:
//!
//! - __Copy-in__ moves collected project files into the workspace, then
//!   prunes anything in the workspace that is no longer collected.
//! - __Copy-out__ moves workspace files back into the project root.
//!
//! Every operation runs in its own ephemeral [`Session`], so the vault is
//! cloned fresh each time and never left on disk afterwards. There is no
//! merging: the side being copied from always wins.
//!
//! # Vault Layout
//!
//! ```text
//! vault/
//! ├── .gitkeep
//! ├── webapp/          <- workspace of project "webapp"
//! │   ├── README.md
//! │   └── docs/notes.md
//! └── cli-tool/
//!     └── CLAUDE.md
//! ```
//!
//! # See Also
//!
//! 1. [`workspace`]
//! 2. [`session`]

pub mod host;
pub mod repo;
pub mod session;
pub mod tree;
pub mod workspace;

use crate::{
    collect::{collect, CollectError, VaultFile},
    config::{ConfigError, ProjectConfig},
    output::{Phase, PhaseObserver},
    path::slash_relative,
    vault::{
        host::{GhCli, RepoHost},
        repo::RepoError,
        session::Session,
        tree::{PrunePlan, TreeError},
        workspace::{content_root_in, Workspace, PLACEHOLDER},
    },
};

use serde::Serialize;
use std::{
    collections::HashSet,
    fs::{canonicalize, copy, read, remove_dir, remove_file, symlink_metadata},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

const STORE_MESSAGE: &str = "chore: update vault";
const PURGE_MESSAGE: &str = "chore: purge vault";

/// Outcome of storing project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    /// Number of project files now in the workspace.
    pub files: usize,

    /// New commit was made.
    pub committed: bool,

    /// Remote was updated.
    pub pushed: bool,
}

/// Outcome of pulling then storing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Number of files written into the project.
    pub pulled: usize,

    /// Result of the store phase.
    pub stored: StoreReport,
}

/// Project bound to its vault workspace.
#[derive(Debug)]
pub struct Vault<H = GhCli>
where
    H: RepoHost,
{
    root: PathBuf,
    config: ProjectConfig,
    workspace: Workspace,
    host: H,
}

impl Vault<GhCli> {
    /// Open vault of project at root.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::NotInitialized`] if the project has no
    ///   configuration, or no vault URL.
    /// - Return [`VaultError::InvalidConfig`] if the configuration file
    ///   cannot be parsed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_host(root, GhCli::new())
    }
}

impl<H> Vault<H>
where
    H: RepoHost,
{
    /// Open vault of project at root with specific repository host.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::NotInitialized`] if the project has no
    ///   configuration, or no vault URL.
    /// - Return [`VaultError::InvalidConfig`] if the configuration file
    ///   cannot be parsed.
    /// - Return [`VaultError::Io`] if the root cannot be resolved.
    pub fn open_with_host(root: impl AsRef<Path>, host: H) -> Result<Self> {
        let root = canonicalize(root.as_ref()).map_err(|err| VaultError::Io {
            source: err,
            path: root.as_ref().to_path_buf(),
        })?;

        let config = ProjectConfig::load(&root).map_err(|err| match err {
            ConfigError::NotFound { .. } => VaultError::NotInitialized,
            ConfigError::Invalid { source, path } => VaultError::InvalidConfig { source, path },
            err => VaultError::Config(err),
        })?;

        if !config.is_initialized() {
            return Err(VaultError::NotInitialized);
        }

        Ok(Self::new(root, config, host))
    }

    /// Construct new vault from already loaded configuration.
    pub fn new(root: impl Into<PathBuf>, config: ProjectConfig, host: H) -> Self {
        let root = root.into();
        let workspace = Workspace::from_project_root(&root);

        Self {
            root,
            config,
            workspace,
            host,
        }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project configuration.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Workspace of project inside vault.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// List project files that would be stored.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::Collect`] if configured patterns are invalid.
    pub fn list_local(&self) -> Result<Vec<VaultFile>> {
        Ok(collect(&self.root, &self.config)?)
    }

    /// List files in project's workspace, sorted.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError`] if the session cannot be opened, or the
    ///   workspace cannot be read.
    pub fn list(&self, observer: &dyn PhaseObserver) -> Result<Vec<String>> {
        Session::run(&self.config, &self.host, observer, |session| {
            session.report(Phase::Listing);
            let entries = tree::scan(self.workspace.dir_in(session.dir()))?;
            Ok(tree::list_files(&entries))
        })
    }

    /// List files of every workspace in vault, sorted.
    ///
    /// Paths are prefixed with their workspace name.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError`] if the session cannot be opened, or the
    ///   vault cannot be read.
    pub fn list_all(&self, observer: &dyn PhaseObserver) -> Result<Vec<String>> {
        Session::run(&self.config, &self.host, observer, |session| {
            session.report(Phase::Listing);
            let entries = tree::scan(content_root_in(session.dir()))?;
            Ok(tree::list_files(&entries)
                .into_iter()
                .filter(|path| path != PLACEHOLDER)
                .collect())
        })
    }

    /// Copy workspace files into project root.
    ///
    /// An empty request copies every workspace file. Otherwise only the
    /// files matching the requested paths are copied. Never touches the
    /// remote. Returns the number of files written.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError`] if the session cannot be opened, or files
    ///   cannot be copied.
    #[instrument(skip(self, observer), level = "debug")]
    pub fn pull(&self, requested: &[String], observer: &dyn PhaseObserver) -> Result<usize> {
        Session::run(&self.config, &self.host, observer, |session| {
            session.report(Phase::Listing);
            let entries = tree::scan(self.workspace.dir_in(session.dir()))?;
            let plan = tree::copy_out_plan(&entries, &self.workspace, requested);
            for missing in &plan.unmatched {
                warn!("no vault file matches {missing:?}");
            }

            session.report(Phase::Copying);
            for relative in &plan.files {
                debug!("pull {:?}", self.workspace.vault_path(relative));
                copy_file(
                    self.workspace.file_in(session.dir(), relative),
                    join_relative(&self.root, relative),
                )?;
            }

            info!("pulled {} files", plan.files.len());
            Ok(plan.files.len())
        })
    }

    /// Copy project files into workspace, and push the result.
    ///
    /// Workspace files that are no longer collected are removed. Nothing is
    /// committed or pushed when the workspace already matches the project.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::RemoteCreation`] if the remote vault does not
    ///   exist and cannot be created.
    /// - Return [`VaultError`] if the session cannot be opened, or files
    ///   cannot be copied, committed, or pushed.
    #[instrument(skip(self, observer), level = "debug")]
    pub fn store(&self, observer: &dyn PhaseObserver) -> Result<StoreReport> {
        Session::run(&self.config, &self.host, observer, |session| {
            let files = self.copy_in(session)?;
            let committed = commit(session, STORE_MESSAGE)?;
            let pushed = self.publish(session, committed)?;

            Ok(StoreReport {
                files,
                committed,
                pushed,
            })
        })
    }

    /// Pull, then store, each in a separate session.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError`] if either phase fails. A failed store does
    ///   not undo the pull.
    pub fn sync(&self, observer: &dyn PhaseObserver) -> Result<SyncReport> {
        observer.phase(Phase::Pulling);
        let pulled = self.pull(&[], observer)?;

        observer.phase(Phase::Storing);
        let stored = self.store(observer)?;

        Ok(SyncReport { pulled, stored })
    }

    /// Delete content of every workspace in vault, and push the result.
    ///
    /// Irreversible. Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError`] if the session cannot be opened, or the vault
    ///   cannot be emptied, committed, or pushed.
    #[instrument(skip(self, observer), level = "debug")]
    pub fn purge(&self, observer: &dyn PhaseObserver) -> Result<usize> {
        Session::run(&self.config, &self.host, observer, |session| {
            session.report(Phase::Purging);
            let content_root = content_root_in(session.dir());
            let entries = tree::scan(&content_root)?;
            let removed = tree::list_files(&entries)
                .iter()
                .filter(|path| *path != PLACEHOLDER)
                .count();

            apply_prune(&content_root, &tree::prune_plan(&entries, &HashSet::new()))?;
            session.repo().write_placeholder()?;

            let committed = commit(session, PURGE_MESSAGE)?;
            self.publish(session, committed)?;
            warn!("purged {removed} files from vault {:?}", session.repo().url());

            Ok(removed)
        })
    }

    /// Exclude paths from vault, and store the result.
    ///
    /// Paths are persisted as exclude patterns in the project configuration,
    /// so the excluded files are pruned from the workspace.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::Config`] if configuration cannot be saved.
    /// - Return [`VaultError`] if storing fails.
    pub fn remove(
        &mut self,
        paths: &[impl AsRef<str>],
        observer: &dyn PhaseObserver,
    ) -> Result<StoreReport> {
        for path in paths {
            let pattern = self.pattern_for(path.as_ref(), PatternKind::Exclude);
            info!("exclude {pattern:?}");
            self.config.exclude_pattern(pattern);
        }
        self.config.save(&self.root)?;

        self.store(observer)
    }

    /// Include paths in vault, and store the result.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::Config`] if configuration cannot be saved.
    /// - Return [`VaultError`] if storing fails.
    pub fn add(
        &mut self,
        paths: &[impl AsRef<str>],
        observer: &dyn PhaseObserver,
    ) -> Result<StoreReport> {
        for path in paths {
            let pattern = self.pattern_for(path.as_ref(), PatternKind::Include);
            info!("include {pattern:?}");
            self.config.include_pattern(pattern);
        }
        self.config.save(&self.root)?;

        self.store(observer)
    }

    /// Delete local project files that are safely kept in the vault.
    ///
    /// Only files whose contents are identical to their workspace copy are
    /// deleted. Never touches the remote. Returns the deleted relative
    /// paths.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError`] if the session cannot be opened, or files
    ///   cannot be compared or deleted.
    #[instrument(skip(self, observer), level = "debug")]
    pub fn clean(&self, observer: &dyn PhaseObserver) -> Result<Vec<String>> {
        Session::run(&self.config, &self.host, observer, |session| {
            session.report(Phase::Cleaning);
            let entries = tree::scan(self.workspace.dir_in(session.dir()))?;

            let mut removed = Vec::new();
            for relative in tree::list_files(&entries) {
                let local = join_relative(&self.root, &relative);
                let stored = self.workspace.file_in(session.dir(), &relative);
                if !same_contents(&local, &stored)? {
                    continue;
                }

                remove_file(&local).map_err(|err| VaultError::Io {
                    source: err,
                    path: local.clone(),
                })?;
                remove_empty_parents(&self.root, &local);
                removed.push(relative);
            }

            info!("cleaned {} files", removed.len());
            Ok(removed)
        })
    }

    fn copy_in(&self, session: &Session<'_>) -> Result<usize> {
        let files = collect(&self.root, &self.config)?;

        session.report(Phase::Copying);
        for file in &files {
            debug!("store {:?}", self.workspace.vault_path(&file.relative_path));
            copy_file(
                &file.absolute_path,
                self.workspace.file_in(session.dir(), &file.relative_path),
            )?;
        }

        session.report(Phase::Pruning);
        let workspace_dir = self.workspace.dir_in(session.dir());
        let keep = files
            .iter()
            .map(|file| file.relative_path.clone())
            .collect::<HashSet<_>>();
        let plan = tree::prune_plan(&tree::scan(&workspace_dir)?, &keep);
        apply_prune(&workspace_dir, &plan)?;

        Ok(files.len())
    }

    // INVARIANT: Bootstrapped sessions always push, their commits exist
    // nowhere else.
    fn publish(&self, session: &Session<'_>, committed: bool) -> Result<bool> {
        if !committed && !session.is_bootstrapped() {
            info!("vault already up to date");
            return Ok(false);
        }

        session.report(Phase::Pushing);
        match session.repo().push() {
            Ok(()) => Ok(true),
            Err(RepoError::MissingRemote { url, message }) => {
                warn!("remote vault does not exist yet ({message}), trying to create it");
                session.report(Phase::CreatingRemote);
                self.host
                    .create_repository(&url)
                    .map_err(|err| VaultError::RemoteCreation {
                        url: url.clone(),
                        reason: err.to_string(),
                    })?;

                session.report(Phase::Pushing);
                session
                    .repo()
                    .push()
                    .map_err(|err| VaultError::RemoteCreation {
                        url,
                        reason: err.to_string(),
                    })?;

                Ok(true)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn pattern_for(&self, path: &str, kind: PatternKind) -> String {
        let path = Path::new(path);
        let relative = if path.is_absolute() {
            slash_relative(&self.root, path).unwrap_or_else(|| path.to_string_lossy().into_owned())
        } else {
            path.to_string_lossy().replace('\\', "/")
        };
        let relative = relative
            .trim_start_matches("./")
            .trim_matches('/')
            .to_string();

        if join_relative(&self.root, &relative).is_dir() {
            return format!("{relative}/**");
        }

        match kind {
            // INVARIANT: Anchor bare names to project root, gitignore rules
            // without a slash would match at any depth.
            PatternKind::Exclude if !relative.contains('/') => format!("/{relative}"),
            _ => relative,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PatternKind {
    Include,
    Exclude,
}

fn commit(session: &Session<'_>, message: &str) -> Result<bool> {
    if !session.repo().has_changes()? {
        return Ok(false);
    }

    session.report(Phase::Committing);
    Ok(session.repo().commit_all(message)?.is_some())
}

fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
    let (from, to) = (from.as_ref(), to.as_ref());
    if let Some(parent) = to.parent() {
        mkdirp::mkdirp(parent).map_err(|err| VaultError::Io {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }

    copy(from, to).map_err(|err| VaultError::Io {
        source: err,
        path: from.to_path_buf(),
    })?;

    Ok(())
}

fn apply_prune(base: &Path, plan: &PrunePlan) -> Result<()> {
    if plan.is_empty() {
        return Ok(());
    }

    for file in &plan.files {
        info!("prune {file:?}");
        let path = join_relative(base, file);
        remove_file(&path).map_err(|err| VaultError::Io { source: err, path })?;
    }

    for dir in &plan.dirs {
        let path = join_relative(base, dir);
        if let Err(err) = remove_dir(&path) {
            warn!("cannot remove directory {:?}: {err}", path.display());
        }
    }

    Ok(())
}

fn same_contents(local: &Path, stored: &Path) -> Result<bool> {
    match symlink_metadata(local) {
        Ok(meta) if meta.file_type().is_file() => {}
        _ => return Ok(false),
    }

    let read_err = |path: &Path| {
        let path = path.to_path_buf();
        move |err| VaultError::Io { source: err, path }
    };

    Ok(read(local).map_err(read_err(local))? == read(stored).map_err(read_err(stored))?)
}

fn remove_empty_parents(root: &Path, file: &Path) {
    for dir in file.ancestors().skip(1) {
        if dir == root || !dir.starts_with(root) || remove_dir(dir).is_err() {
            break;
        }
    }
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |path, part| path.join(part))
}

/// Vault operation error types.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Project has no vault configured.
    #[error("project is not initialized, run `agvault init` first")]
    NotInitialized,

    /// Project configuration exists, but cannot be parsed.
    #[error(
        "invalid configuration file at {:?}, fix it by hand since `agvault init` would overwrite it: {source}",
        path.display()
    )]
    InvalidConfig {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Remote vault does not exist, and could not be created automatically.
    #[error(
        "vault repository {url} does not exist and could not be created automatically ({reason}); \
         create the repository {url} manually, then run the command again"
    )]
    RemoteCreation { url: String, reason: String },

    /// Temporary session directory cannot be created.
    #[error("failed to create temporary session directory")]
    TempDir {
        #[source]
        source: std::io::Error,
    },

    /// File system operation fails.
    #[error("file system operation failed on {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Project configuration cannot be handled.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Project files cannot be collected.
    #[error(transparent)]
    Collect(#[from] CollectError),

    /// Vault checkout cannot be scanned.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Git operations on vault checkout fail.
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Friendly result alias :3
pub type Result<T, E = VaultError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Ephemeral vault sessions.
//!
//! Vault content never lives on the local file system longer than a single
//! operation. Each operation opens a __session__: a temporary directory that
//! holds a fresh clone of the vault, or a freshly bootstrapped skeleton if
//! the vault cannot be cloned. The operation works inside that directory,
//! and the directory is deleted afterwards whether the operation succeeded
//! or not.

use crate::{
    config::ProjectConfig,
    output::{Phase, PhaseObserver},
    vault::{host::RepoHost, repo::VaultRepo, VaultError},
};

use std::{
    fs::remove_dir_all,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Vault checkout owned by one operation.
pub struct Session<'a> {
    dir: PathBuf,
    repo: VaultRepo,
    bootstrapped: bool,
    observer: &'a dyn PhaseObserver,
}

impl<'a> Session<'a> {
    /// Run operation inside a new ephemeral session.
    ///
    /// Clones the configured branch of the vault into a temporary directory,
    /// falling back to bootstrapping an empty vault if cloning fails. The
    /// temporary directory is removed before this function returns, and the
    /// operation's result is handed back unchanged.
    ///
    /// # Errors
    ///
    /// - Return [`VaultError::NotInitialized`] if configuration has no vault
    ///   URL.
    /// - Return [`VaultError::TempDir`] if no temporary directory can be made.
    /// - Return [`VaultError::Repo`] if bootstrapping fails.
    /// - Return whatever error the operation returns.
    #[instrument(skip_all, level = "debug")]
    pub fn run<T, H, F>(
        config: &ProjectConfig,
        host: &H,
        observer: &'a dyn PhaseObserver,
        op: F,
    ) -> Result<T, VaultError>
    where
        H: RepoHost,
        F: FnOnce(&Session<'a>) -> Result<T, VaultError>,
    {
        if !config.is_initialized() {
            return Err(VaultError::NotInitialized);
        }

        let tempdir = tempfile::Builder::new()
            .prefix("agvault-")
            .tempdir()
            .map_err(|err| VaultError::TempDir { source: err })?;
        debug!("open session in {:?}", tempdir.path().display());

        let result =
            Self::open(tempdir.path(), config, host, observer).and_then(|session| op(&session));

        // INVARIANT: Session repository is dropped before its directory goes away.
        let path = tempdir.path().to_path_buf();
        if let Err(err) = tempdir.close() {
            warn!("failed to remove session directory {:?}: {err}", path.display());
        }

        result
    }

    fn open<H>(
        dir: &Path,
        config: &ProjectConfig,
        host: &H,
        observer: &'a dyn PhaseObserver,
    ) -> Result<Self, VaultError>
    where
        H: RepoHost,
    {
        let url = config.repo_url.as_str();
        let branch = config.branch.as_str();
        host.prepare_credentials(url);

        observer.phase(Phase::Cloning);
        let cloned = match VaultRepo::clone(url, branch, dir) {
            Ok(repo) if repo.is_empty() => {
                info!("vault has no commits yet, bootstrapping instead");
                None
            }
            Ok(repo) => Some(repo),
            Err(err) => {
                info!("cannot clone vault, bootstrapping instead: {err}");
                None
            }
        };

        let (repo, bootstrapped) = match cloned {
            Some(repo) => (repo, false),
            None => {
                observer.phase(Phase::Bootstrapping);
                reset_dir(dir)?;
                (VaultRepo::bootstrap(url, branch, dir)?, true)
            }
        };

        debug!("session tracks branch {:?}", repo.branch());
        Ok(Self {
            dir: dir.to_path_buf(),
            repo,
            bootstrapped,
            observer,
        })
    }

    /// Directory of vault checkout.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Git handle bound to vault checkout.
    pub fn repo(&self) -> &VaultRepo {
        &self.repo
    }

    /// Vault was bootstrapped locally rather than cloned.
    ///
    /// A bootstrapped vault has commits that exist nowhere else yet.
    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// Report phase transition to observer.
    pub fn report(&self, phase: Phase) {
        self.observer.phase(phase);
    }
}

// INVARIANT: Failed clones may leave partial content behind.
fn reset_dir(dir: &Path) -> Result<(), VaultError> {
    let io_err = |err| VaultError::Io {
        source: err,
        path: dir.to_path_buf(),
    };

    if dir.exists() {
        remove_dir_all(dir).map_err(io_err)?;
    }
    mkdirp::mkdirp(dir).map_err(io_err)?;

    Ok(())
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git access to a vault checkout.
//!
//! A [`VaultRepo`] is a normal (non-bare) repository living inside an
//! ephemeral session directory. It is either cloned from the remote vault,
//! or bootstrapped from nothing when the remote cannot be cloned yet. Either
//! way it tracks exactly one branch of one remote named `origin`.
//!
//! # Missing Remotes
//!
//! Pushing a bootstrapped vault to a remote that does not exist yet fails
//! with an error whose wording depends on the transport. Such failures are
//! recognized by matching a fixed set of message fragments, and reported as
//! [`RepoError::MissingRemote`] so the caller can try to create the remote
//! and push again. All other push failures are final.

use crate::vault::workspace::{content_root_in, PLACEHOLDER};

use auth_git2::GitAuthenticator;
use git2::{
    build::RepoBuilder, Config, FetchOptions, IndexAddOption, Oid, PushOptions,
    RemoteCallbacks, Repository, RepositoryInitOptions, Signature, Status, StatusOptions,
};
use std::{
    cell::RefCell,
    fs::write,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Name of the only remote a vault checkout tracks.
pub const REMOTE_NAME: &str = "origin";

const BOOTSTRAP_MESSAGE: &str = "chore: initialize vault";

// INVARIANT: Lowercase fragments only, messages are lowercased before matching.
const MISSING_REMOTE_FRAGMENTS: [&str; 13] = [
    "repository not found",
    "could not find repository",
    "does not appear to be a git repository",
    "not a git repository",
    "couldn't find remote ref",
    "remote ref does not exist",
    "empty repository",
    "failed to resolve path",
    "http status code: 404",
    "could not read from remote repository",
    "could not resolve host",
    "failed to connect",
    "connection refused",
];

/// Git handle bound to a vault checkout.
pub struct VaultRepo {
    repository: Repository,
    url: String,
    branch: String,
}

impl VaultRepo {
    /// Clone branch of remote vault into target directory.
    ///
    /// Credentials are supplied through the user's git credential helpers
    /// and SSH agent.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if cloning fails for any reason.
    #[instrument(skip(url, branch, path), level = "debug")]
    pub fn clone(url: &str, branch: &str, path: impl AsRef<Path>) -> Result<Self> {
        debug!("clone {url:?} branch {branch:?} into {:?}", path.as_ref().display());
        let authenticator = GitAuthenticator::default();
        let config = Config::open_default()?;

        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);

        let repository = RepoBuilder::new()
            .branch(branch)
            .fetch_options(fo)
            .clone(url, path.as_ref())?;

        Ok(Self {
            repository,
            url: url.into(),
            branch: branch.into(),
        })
    }

    /// Bootstrap minimal vault repository in target directory.
    ///
    /// Initializes a repository whose default branch is the target branch,
    /// commits a placeholder under the vault content root, and registers the
    /// remote. Nothing is sent over the network.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if libgit2 operations fail.
    /// - Return [`RepoError::Io`] if the placeholder cannot be written.
    #[instrument(skip(url, branch, path), level = "debug")]
    pub fn bootstrap(url: &str, branch: &str, path: impl AsRef<Path>) -> Result<Self> {
        info!("bootstrap new vault for {url:?}");
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(branch);
        let repository = Repository::init_opts(path.as_ref(), &opts)?;
        repository.remote(REMOTE_NAME, url)?;

        let vault = Self {
            repository,
            url: url.into(),
            branch: branch.into(),
        };
        vault.write_placeholder()?;
        vault.commit_all(BOOTSTRAP_MESSAGE)?;

        Ok(vault)
    }

    /// URL of remote vault.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Branch being synced.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Write placeholder file at top of vault content root.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Io`] if the placeholder cannot be written.
    pub fn write_placeholder(&self) -> Result<()> {
        let content_root = content_root_in(self.workdir()?);
        mkdirp::mkdirp(&content_root).map_err(|err| RepoError::Io {
            source: err,
            path: content_root.clone(),
        })?;

        let placeholder = content_root.join(PLACEHOLDER);
        write(&placeholder, "").map_err(|err| RepoError::Io {
            source: err,
            path: placeholder,
        })
    }

    /// Repository has no commits.
    pub fn is_empty(&self) -> bool {
        self.repository.is_empty().unwrap_or(false)
    }

    /// Check if working tree has modified, untracked, or deleted entries.
    ///
    /// Untracked files matched by ignore rules count as changes, since
    /// [`VaultRepo::commit_all`] stages them anyway.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if status cannot be determined.
    pub fn has_changes(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(true)
            .recurse_ignored_dirs(true);
        let statuses = self.repository.statuses(Some(&mut opts))?;

        Ok(statuses
            .iter()
            .any(|entry| entry.status() != Status::CURRENT))
    }

    /// Stage everything in working tree and commit it.
    ///
    /// Deleted files are staged as removals, and ignore rules found inside
    /// the vault are not honored. Returns [`None`] if the staged tree is
    /// identical to the current commit.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Git2`] if staging or committing fails.
    #[instrument(skip(self), level = "debug")]
    pub fn commit_all(&self, message: &str) -> Result<Option<Oid>> {
        let mut index = self.repository.index()?;
        index.add_all(["*"], IndexAddOption::DEFAULT | IndexAddOption::FORCE, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        let tree_oid = index.write_tree()?;

        // INVARIANT: Always determine latest parent commit to append to.
        let parent = self
            .repository
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        if parent.as_ref().is_some_and(|parent| parent.tree_id() == tree_oid) {
            debug!("nothing to commit");
            return Ok(None);
        }

        let tree = self.repository.find_tree(tree_oid)?;
        let signature = self.signature()?;
        let parents = parent.iter().collect::<Vec<_>>();
        let oid = self.repository.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        info!("commit {oid}: {message}");

        Ok(Some(oid))
    }

    /// Push current branch to remote vault.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::MissingRemote`] if the remote repository or
    ///   branch looks like it does not exist.
    /// - Return [`RepoError::Rejected`] if the remote refused the update.
    /// - Return [`RepoError::Git2`] for any other failure.
    #[instrument(skip(self), level = "debug")]
    pub fn push(&self) -> Result<()> {
        info!("push {:?} to {:?}", self.branch, self.url);
        let mut remote = self.repository.find_remote(REMOTE_NAME)?;
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", self.branch);
        let config = self.repository.config()?;
        let authenticator = GitAuthenticator::default();
        let push_error: RefCell<Option<String>> = RefCell::new(None);

        {
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(authenticator.credentials(&config));
            callbacks.push_update_reference(|_ref_name, status| {
                if let Some(message) = status {
                    *push_error.borrow_mut() = Some(message.to_string());
                }
                Ok(())
            });

            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);

            if let Err(err) = remote.push(&[refspec.as_str()], Some(&mut push_options)) {
                if is_missing_remote(err.message()) {
                    return Err(RepoError::MissingRemote {
                        url: self.url.clone(),
                        message: err.message().to_string(),
                    });
                }
                return Err(RepoError::Git2(err));
            }
        }

        if let Some(message) = push_error.into_inner() {
            return Err(RepoError::Rejected {
                url: self.url.clone(),
                message,
            });
        }

        Ok(())
    }

    fn workdir(&self) -> Result<&Path> {
        self.repository.workdir().ok_or_else(|| {
            RepoError::Git2(git2::Error::from_str("vault checkout has no working tree"))
        })
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repository.signature() {
            Ok(signature) => Ok(signature),
            Err(err) => {
                debug!("no git identity configured ({err}), using fallback");
                Ok(Signature::now("agvault", "agvault@localhost")?)
            }
        }
    }
}

/// Check if a git error message means the remote does not exist yet.
pub fn is_missing_remote(message: &str) -> bool {
    let message = message.to_lowercase();
    MISSING_REMOTE_FRAGMENTS
        .iter()
        .any(|fragment| message.contains(fragment))
}

/// Vault repository error types.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Remote repository or branch does not exist.
    #[error("remote vault {url:?} does not exist: {message}")]
    MissingRemote { url: String, message: String },

    /// Remote refused to update branch.
    #[error("remote vault {url:?} rejected push: {message}")]
    Rejected { url: String, message: String },

    /// File in vault checkout cannot be written.
    #[error("failed to write {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = RepoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("ERROR: Repository not found."; "github https")]
    #[test_case("fatal: 'x' does not appear to be a git repository"; "ssh")]
    #[test_case("could not find repository at '/tmp/nope.git'"; "local path")]
    #[test_case("failed to resolve address for github.invalid: Name or service not known, could not resolve host"; "dns")]
    #[test_case("failed to connect to example.com: Connection refused"; "connection")]
    #[test_case("unexpected http status code: 404"; "http not found")]
    #[test_case("failed to resolve path '/tmp/nope.git': No such file or directory"; "missing local path")]
    #[test]
    fn missing_remote_messages(message: &str) {
        assert!(is_missing_remote(message));
    }

    #[test_case("cannot push non-fast-forwardable reference"; "non fast forward")]
    #[test_case("authentication required but no callback set"; "auth")]
    #[test_case("reference 'refs/heads/main' not found"; "local reference")]
    #[test_case("failed to open '/tmp/vault/.git/index': No such file or directory"; "local io")]
    #[test_case("remote branch main rejected"; "branch rejection")]
    #[test]
    fn other_push_failures(message: &str) {
        assert!(!is_missing_remote(message));
    }

    #[test]
    fn bootstrap_commits_placeholder() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vault = VaultRepo::bootstrap("/tmp/vault.git", "trunk", dir.path())?;

        assert!(dir.path().join("vault").join(PLACEHOLDER).is_file());
        assert!(!vault.has_changes()?);

        let head = vault.repository.head()?;
        assert_eq!(head.shorthand(), Some("trunk"));
        assert_eq!(
            head.peel_to_commit()?.message(),
            Some(BOOTSTRAP_MESSAGE)
        );

        let remote = vault.repository.find_remote(REMOTE_NAME)?;
        assert_eq!(remote.url(), Some("/tmp/vault.git"));

        Ok(())
    }

    #[test]
    fn commit_all_skips_unchanged_tree() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vault = VaultRepo::bootstrap("/tmp/vault.git", "main", dir.path())?;
        assert_eq!(vault.commit_all("chore: nothing")?, None);

        std::fs::write(dir.path().join("vault").join("notes.md"), "notes")?;
        assert!(vault.has_changes()?);
        assert!(vault.commit_all("chore: add notes")?.is_some());
        assert!(!vault.has_changes()?);

        std::fs::remove_file(dir.path().join("vault").join("notes.md"))?;
        assert!(vault.has_changes()?);
        assert!(vault.commit_all("chore: drop notes")?.is_some());
        assert!(!vault.has_changes()?);

        Ok(())
    }

    #[test]
    fn ignored_files_still_count_as_changes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let vault = VaultRepo::bootstrap("/tmp/vault.git", "main", dir.path())?;
        let workspace = dir.path().join("vault").join("webapp");
        std::fs::create_dir_all(&workspace)?;
        std::fs::write(workspace.join(".gitignore"), "*.md\n")?;
        assert!(vault.commit_all("chore: add ignore rules")?.is_some());

        std::fs::write(workspace.join("NOTES.md"), "notes")?;
        assert!(vault.has_changes()?);
        assert!(vault.commit_all("chore: add notes")?.is_some());
        assert!(!vault.has_changes()?);

        let tree = vault.repository.head()?.peel_to_tree()?;
        assert!(tree.get_path(Path::new("vault/webapp/NOTES.md")).is_ok());

        Ok(())
    }
}

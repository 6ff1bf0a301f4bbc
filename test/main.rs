// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use agvault::{
    config::ProjectConfig,
    vault::{
        host::{self, HostError, RepoHost},
        Vault,
    },
};

use anyhow::Result;
use git2::{ObjectType, Repository, RepositoryInitOptions, TreeWalkMode, TreeWalkResult};
use std::{
    fs::{create_dir_all, read_to_string, write},
    path::{Path, PathBuf},
};

/// Bare repository standing in for a remote vault.
pub(crate) struct RemoteFixture {
    path: PathBuf,
}

impl RemoteFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        init_bare(path.as_ref())?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Fixture for a remote that does not exist yet.
    pub(crate) fn missing(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub(crate) fn url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    pub(crate) fn exists(&self) -> bool {
        Repository::open_bare(&self.path).is_ok()
    }

    pub(crate) fn commit_count(&self) -> Result<usize> {
        let repo = Repository::open_bare(&self.path)?;
        if repo.find_reference("refs/heads/main").is_err() {
            return Ok(0);
        }

        let mut walk = repo.revwalk()?;
        walk.push_ref("refs/heads/main")?;

        Ok(walk.count())
    }

    /// All file paths on the main branch, sorted.
    pub(crate) fn files(&self) -> Result<Vec<String>> {
        let repo = Repository::open_bare(&self.path)?;
        let tree = repo.find_reference("refs/heads/main")?.peel_to_tree()?;

        let mut files = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                files.push(format!("{root}{}", entry.name().unwrap_or_default()));
            }
            TreeWalkResult::Ok
        })?;
        files.sort();

        Ok(files)
    }

    pub(crate) fn read(&self, path: &str) -> Result<String> {
        let repo = Repository::open_bare(&self.path)?;
        let tree = repo.find_reference("refs/heads/main")?.peel_to_tree()?;
        let blob = tree.get_path(Path::new(path))?.to_object(&repo)?.peel_to_blob()?;

        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }
}

/// Local project directory bound to a vault.
pub(crate) struct ProjectFixture {
    root: PathBuf,
}

impl ProjectFixture {
    pub(crate) fn new(path: impl AsRef<Path>, remote: &RemoteFixture) -> Result<Self> {
        create_dir_all(path.as_ref())?;
        ProjectConfig::new(remote.url()).save(path.as_ref())?;

        Ok(Self {
            root: path.as_ref().canonicalize()?,
        })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn write(&self, path: &str, contents: &str) -> Result<()> {
        let path = self.root.join(path);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(path, contents)?;

        Ok(())
    }

    pub(crate) fn read(&self, path: &str) -> Result<String> {
        Ok(read_to_string(self.root.join(path))?)
    }

    pub(crate) fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }

    pub(crate) fn vault<H: RepoHost>(&self, host: H) -> Result<Vault<H>> {
        Ok(Vault::open_with_host(&self.root, host)?)
    }
}

/// Host that creates missing remotes as local bare repositories.
pub(crate) struct LocalBareHost;

impl RepoHost for LocalBareHost {
    fn prepare_credentials(&self, _url: &str) {}

    fn create_repository(&self, url: &str) -> host::Result<()> {
        init_bare(Path::new(url)).map_err(|err| HostError::Command {
            program: "git init --bare".into(),
            message: err.to_string(),
        })
    }
}

/// Host whose CLI is not installed.
pub(crate) struct UnavailableHost;

impl RepoHost for UnavailableHost {
    fn prepare_credentials(&self, _url: &str) {}

    fn create_repository(&self, _url: &str) -> host::Result<()> {
        Err(HostError::Unavailable {
            program: "gh".into(),
        })
    }
}

fn init_bare(path: &Path) -> Result<(), git2::Error> {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    opts.bare(true);
    Repository::init_opts(path, &opts)?;

    Ok(())
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote repository hosting.
//!
//! A vault may be configured with a URL whose repository does not exist yet.
//! Instead of failing outright, agvault can ask the hosting service to create
//! the repository through its CLI, and then push the freshly bootstrapped
//! vault as the repository's initial state. Only GitHub through the `gh`
//! binary is supported. Everything here is a convenience; without it the user
//! simply has to create the repository by hand.

use std::{
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    io::ErrorKind,
    process::Command,
};
use tracing::{debug, info, instrument};

/// Hosting service that can create vault repositories.
pub trait RepoHost {
    /// Make authenticated git operations against URL work without prompting.
    ///
    /// Failure is never fatal, git simply falls back to its own credential
    /// handling.
    fn prepare_credentials(&self, url: &str);

    /// Create private repository that URL points at.
    ///
    /// Creating a repository that already exists is not an error.
    fn create_repository(&self, url: &str) -> Result<()>;
}

/// GitHub hosting through the `gh` CLI.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: String,
}

impl GhCli {
    /// Construct new GitHub host using `gh` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("gh")
    }

    /// Construct new GitHub host using a specific `gh` binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn is_available(&self) -> bool {
        syscall_non_interactive(&self.program, ["--version"]).is_ok()
    }

    fn github_slug(&self, url: &str) -> Result<RepoSlug> {
        let slug = RepoSlug::parse(url).ok_or_else(|| HostError::UnknownSlug {
            url: url.to_string(),
        })?;

        if slug.host != "github.com" {
            return Err(HostError::UnsupportedHost { host: slug.host });
        }

        Ok(slug)
    }
}

impl Default for GhCli {
    fn default() -> Self {
        Self::new()
    }
}

impl RepoHost for GhCli {
    #[instrument(skip(self), level = "debug")]
    fn prepare_credentials(&self, url: &str) {
        if self.github_slug(url).is_err() || !self.is_available() {
            return;
        }

        match syscall_non_interactive(&self.program, ["auth", "setup-git"]) {
            Ok(_) => debug!("gh credential helper configured"),
            Err(err) => debug!("gh credential helper unavailable: {err}"),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn create_repository(&self, url: &str) -> Result<()> {
        let slug = self.github_slug(url)?;
        if !self.is_available() {
            return Err(HostError::Unavailable {
                program: self.program.clone(),
            });
        }

        let name = slug.to_string();
        if syscall_non_interactive(&self.program, ["repo", "view", name.as_str()]).is_ok() {
            info!("repository {name} already exists");
            return Ok(());
        }

        info!("create private repository {name}");
        syscall_non_interactive(&self.program, ["repo", "create", name.as_str(), "--private"])?;

        Ok(())
    }
}

/// Repository identifier parsed from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    /// Host name of hosting service.
    pub host: String,

    /// Owning user or organization.
    pub owner: String,

    /// Repository name without `.git` suffix.
    pub name: String,
}

impl RepoSlug {
    /// Parse repository identifier from HTTPS, SSH, or SCP-like URL.
    ///
    /// Returns [`None`] for anything else, e.g., local paths.
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        let (host, path) = if let Some((_, rest)) = url.split_once("://") {
            let (authority, path) = rest.split_once('/')?;
            let host = authority.rsplit('@').next()?;
            let host = host.split(':').next()?;
            (host, path)
        } else {
            // INVARIANT: SCP-like syntax is "[user@]host:path" with no slash
            // before the colon.
            let (authority, path) = url.split_once(':')?;
            if authority.contains('/') {
                return None;
            }
            let host = authority.rsplit('@').next()?;
            (host, path)
        };

        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, name) = path.split_once('/')?;
        if host.is_empty() || owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }

        Some(Self {
            host: host.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl Display for RepoSlug {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}/{}", self.owner, self.name)
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref())
        .args(args)
        .output()
        .map_err(|err| match err.kind() {
            ErrorKind::NotFound => HostError::Unavailable {
                program: cmd.as_ref().to_string_lossy().into_owned(),
            },
            _ => HostError::Syscall(err),
        })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message.trim_end_matches(['\r', '\n']).to_string();

    if !output.status.success() {
        return Err(HostError::Command {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            message,
        });
    }

    Ok(message)
}

/// Repository hosting error types.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Hosting CLI is not installed.
    #[error("{program:?} is not installed")]
    Unavailable { program: String },

    /// Repository owner and name cannot be derived from URL.
    #[error("cannot determine repository owner and name from {url:?}")]
    UnknownSlug { url: String },

    /// No CLI support for hosting service.
    #[error("automatic repository creation is not supported for host {host:?}")]
    UnsupportedHost { host: String },

    /// Hosting CLI ran, but failed.
    #[error("command {program:?} failed:\n{message}")]
    Command { program: String, message: String },

    /// Hosting CLI could not be run.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = HostError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("https://github.com/me/vault.git"; "https")]
    #[test_case("https://token@github.com/me/vault"; "https with user")]
    #[test_case("git@github.com:me/vault.git"; "scp like")]
    #[test_case("ssh://git@github.com:22/me/vault.git"; "ssh with port")]
    #[test_case("  git@github.com:me/vault  "; "padded")]
    #[test]
    fn parse_github_slugs(url: &str) {
        let expect = RepoSlug {
            host: "github.com".into(),
            owner: "me".into(),
            name: "vault".into(),
        };

        pretty_assertions::assert_eq!(RepoSlug::parse(url), Some(expect));
    }

    #[test_case("/home/me/vault.git"; "absolute path")]
    #[test_case("./vault"; "relative path")]
    #[test_case("file:///home/me/vault.git"; "file url")]
    #[test_case("https://github.com/vault.git"; "no owner")]
    #[test_case("https://gitlab.com/group/sub/vault.git"; "nested group")]
    #[test]
    fn reject_unparsable_urls(url: &str) {
        pretty_assertions::assert_eq!(RepoSlug::parse(url), None);
    }

    #[test]
    fn slug_display() {
        let slug = RepoSlug::parse("git@github.com:me/vault.git").unwrap();
        assert_eq!(slug.to_string(), "me/vault");
    }

    #[test]
    fn missing_cli_is_unavailable() {
        let host = GhCli::with_program("agvault-definitely-not-gh");
        let result = host.create_repository("https://github.com/me/vault.git");

        assert!(matches!(result, Err(HostError::Unavailable { .. })));
    }

    #[test]
    fn non_github_host_is_unsupported() {
        let host = GhCli::with_program("agvault-definitely-not-gh");
        let result = host.create_repository("https://gitlab.com/me/vault.git");

        assert!(matches!(result, Err(HostError::UnsupportedHost { .. })));
    }
}

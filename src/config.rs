// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration files that agvault uses, and the
//! small amount of file I/O needed to load and persist them.
//!
//! # Project Configuration
//!
//! Every project that uses a vault carries a `.agvault.json` file at its
//! root. This file names the remote vault repository, the glob patterns that
//! select which project files belong in the vault, and the branch to sync
//! against. A project without a usable `repoUrl` is considered
//! __uninitialized__, no matter what other fields are present.
//!
//! A configuration file that exists but cannot be parsed is reported as
//! invalid rather than uninitialized. Treating it as uninitialized would
//! invite the user to run `init` again, which overwrites the file.
//!
//! # Global Defaults
//!
//! A single per-user file remembers the last vault URL the user initialized
//! a project with, so that later projects can skip the URL prompt.

use crate::path::{self, NoWayHome};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Name of the project configuration file at the project root.
pub const PROJECT_CONFIG_FILE: &str = ".agvault.json";

/// Branch used when configuration does not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Exclude patterns that every project configuration must carry.
pub const ALWAYS_EXCLUDE: [&str; 2] = [PROJECT_CONFIG_FILE, ".git/**"];

const DEFAULT_INCLUDE: [&str; 5] = [
    "**/*.md",
    ".cursorrules",
    ".cursor/rules/**",
    ".claude/**",
    ".github/copilot-instructions.md",
];

const DEFAULT_EXCLUDE: [&str; 6] = [
    PROJECT_CONFIG_FILE,
    ".git/**",
    "node_modules/**",
    "target/**",
    "dist/**",
    "build/**",
];

/// Per-project vault configuration.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// URL of the remote vault repository.
    #[serde(default)]
    pub repo_url: String,

    /// Glob patterns selecting files to keep in the vault.
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Patterns removing files from the include selection.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Branch of the vault repository to sync against.
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl ProjectConfig {
    /// Construct new configuration with default patterns for target vault.
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }

    /// Load project configuration from project root.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NotFound`] if there is no configuration file.
    /// - Return [`ConfigError::Invalid`] if the file cannot be parsed.
    /// - Return [`ConfigError::Read`] for any other I/O failure.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let path = path::project_config_path(root);
        debug!("load project config {:?}", path.display());
        let data = read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ConfigError::NotFound { path: path.clone() },
            _ => ConfigError::Read {
                source: err,
                path: path.clone(),
            },
        })?;

        data.parse::<Self>().map_err(|err| match err {
            ConfigError::Deserialize(source) => ConfigError::Invalid { source, path },
            err => err,
        })
    }

    /// Write project configuration into project root.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Serialize`] if serialization fails.
    /// - Return [`ConfigError::Write`] if the file cannot be written.
    pub fn save(&self, root: impl AsRef<Path>) -> Result<()> {
        let path = path::project_config_path(root);
        debug!("save project config {:?}", path.display());
        let mut data = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        data.push('\n');
        write(&path, data).map_err(|err| ConfigError::Write { source: err, path })
    }

    /// Project has a vault to sync against.
    pub fn is_initialized(&self) -> bool {
        !self.repo_url.trim().is_empty()
    }

    /// Add exclude pattern if not already present.
    ///
    /// Also drops an identical include pattern. Returns true if anything
    /// changed.
    pub fn exclude_pattern(&mut self, pattern: impl Into<String>) -> bool {
        let pattern = pattern.into();
        let before = self.include.len();
        self.include.retain(|include| include != &pattern);
        let mut changed = before != self.include.len();
        if !self.exclude.contains(&pattern) {
            self.exclude.push(pattern);
            changed = true;
        }

        changed
    }

    /// Add include pattern if not already present.
    ///
    /// Also drops an identical exclude pattern, unless it is one of the
    /// always excluded entries. Returns true if anything changed.
    pub fn include_pattern(&mut self, pattern: impl Into<String>) -> bool {
        let pattern = pattern.into();
        let before = self.exclude.len();
        self.exclude
            .retain(|exclude| exclude != &pattern || ALWAYS_EXCLUDE.contains(&exclude.as_str()));
        let mut changed = before != self.exclude.len();
        if !self.include.contains(&pattern) {
            self.include.push(pattern);
            changed = true;
        }

        changed
    }

    // INVARIANT: Fill in defaults serde cannot express.
    //   - Empty branch means default branch.
    //   - Bookkeeping and VCS paths are always excluded.
    fn fill_defaults(&mut self) {
        if self.branch.trim().is_empty() {
            self.branch = DEFAULT_BRANCH.into();
        }

        for pattern in ALWAYS_EXCLUDE {
            if !self.exclude.iter().any(|exclude| exclude == pattern) {
                self.exclude.push(pattern.into());
            }
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            include: default_include(),
            exclude: default_exclude(),
            branch: default_branch(),
        }
    }
}

impl FromStr for ProjectConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: ProjectConfig =
            serde_json::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on repository URL field.
        config.repo_url = shellexpand::full(config.repo_url.trim())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();
        config.fill_defaults();

        Ok(config)
    }
}

impl Display for ProjectConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_json::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn default_include() -> Vec<String> {
    DEFAULT_INCLUDE.iter().map(ToString::to_string).collect()
}

fn default_exclude() -> Vec<String> {
    DEFAULT_EXCLUDE.iter().map(ToString::to_string).collect()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.into()
}

/// Per-user defaults shared by all projects.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDefaults {
    /// Vault URL offered to new projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_repo_url: Option<String>,
}

impl GlobalDefaults {
    /// Load global defaults from user's configuration directory.
    ///
    /// A missing file yields empty defaults.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if the configuration directory
    ///   cannot be determined.
    /// - Return [`ConfigError::Invalid`] if the file cannot be parsed.
    /// - Return [`ConfigError::Read`] for any other I/O failure.
    pub fn load() -> Result<Self> {
        let path = path::global_defaults_path()?;
        let data = match read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(ConfigError::Read { source: err, path }),
        };

        serde_json::from_str(&data).map_err(|source| ConfigError::Invalid { source, path })
    }

    /// Write global defaults into user's configuration directory.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if the configuration directory
    ///   cannot be determined.
    /// - Return [`ConfigError::Write`] if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = path::global_defaults_path()?;
        if let Some(parent) = path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| ConfigError::Write {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        let data = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        write(&path, data).map_err(|err| ConfigError::Write { source: err, path })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file does not exist.
    #[error("no configuration file at {:?}", path.display())]
    NotFound { path: PathBuf },

    /// Configuration file exists, but cannot be parsed.
    #[error("invalid configuration file at {:?}: {source}", path.display())]
    Invalid {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be read from.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be written to.
    #[error("failed to write configuration file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(serde_json::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(serde_json::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configuration directory cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("VAULTS", "/home/blah/vaults")])]
    fn deserialize_project_config() -> anyhow::Result<()> {
        let result: ProjectConfig = r#"
            {
                "repoUrl": "$VAULTS/notes.git",
                "include": ["docs/**", "CLAUDE.md"],
                "exclude": ["docs/private/**"],
                "branch": "trunk"
            }
        "#
        .parse()?;

        let expect = ProjectConfig {
            repo_url: "/home/blah/vaults/notes.git".into(),
            include: vec!["docs/**".into(), "CLAUDE.md".into()],
            exclude: vec![
                "docs/private/**".into(),
                ".agvault.json".into(),
                ".git/**".into(),
            ],
            branch: "trunk".into(),
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_fills_defaults() -> anyhow::Result<()> {
        let result: ProjectConfig = r#"{ "repoUrl": "git@github.com:me/vault.git", "branch": "" }"#
            .parse()?;

        assert_eq!(result, ProjectConfig::new("git@github.com:me/vault.git"));
        assert!(result.is_initialized());

        Ok(())
    }

    #[test]
    fn missing_repo_url_is_uninitialized() -> anyhow::Result<()> {
        let result: ProjectConfig = r#"{ "include": ["**/*.md"] }"#.parse()?;
        assert!(!result.is_initialized());

        let result: ProjectConfig = r#"{ "repoUrl": "   " }"#.parse()?;
        assert!(!result.is_initialized());

        Ok(())
    }

    #[test]
    fn malformed_json_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path().join(PROJECT_CONFIG_FILE), "{ \"repoUrl\": ").unwrap();
        let result = ProjectConfig::load(dir.path());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));

        write(dir.path().join(PROJECT_CONFIG_FILE), r#"{ "include": "*.md" }"#).unwrap();
        let result = ProjectConfig::load(dir.path());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProjectConfig::load(dir.path());
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn save_then_load() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = ProjectConfig::new("https://github.com/me/vault.git");
        config.exclude_pattern("/secret.md");
        config.save(dir.path())?;

        assert_eq!(ProjectConfig::load(dir.path())?, config);

        Ok(())
    }

    #[test]
    fn serialize_project_config() {
        let result = ProjectConfig {
            repo_url: "https://github.com/me/vault.git".into(),
            include: vec!["**/*.md".into()],
            exclude: vec![".agvault.json".into(), ".git/**".into()],
            branch: "main".into(),
        }
        .to_string();

        let expect = indoc! {r#"
            {
              "repoUrl": "https://github.com/me/vault.git",
              "include": [
                "**/*.md"
              ],
              "exclude": [
                ".agvault.json",
                ".git/**"
              ],
              "branch": "main"
            }"#};

        assert_eq!(result, expect);
    }

    #[test]
    fn exclude_and_include_patterns() {
        let mut config = ProjectConfig::new("url");

        assert!(config.exclude_pattern("**/*.md"));
        assert!(!config.include.contains(&"**/*.md".to_string()));
        assert!(!config.exclude_pattern("**/*.md"));

        assert!(config.include_pattern("**/*.md"));
        assert!(!config.exclude.contains(&"**/*.md".to_string()));

        // Bookkeeping stays excluded.
        config.include_pattern(".git/**");
        assert!(config.exclude.contains(&".git/**".to_string()));
    }

    #[sealed_test(env = [("XDG_CONFIG_HOME", "/tmp/agvault-sealed-config")])]
    fn global_defaults_round_trip() -> anyhow::Result<()> {
        let _ = std::fs::remove_dir_all("/tmp/agvault-sealed-config");
        assert_eq!(GlobalDefaults::load()?, GlobalDefaults::default());

        let defaults = GlobalDefaults {
            default_repo_url: Some("git@github.com:me/vault.git".into()),
        };
        defaults.save()?;
        assert_eq!(GlobalDefaults::load()?, defaults);

        Ok(())
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace partitioning of vault content.
//!
//! Many projects share one vault. Each project owns a single __workspace__
//! under the vault content root, named after the base name of the project
//! directory. So a project at `~/code/webapp` keeps its files under
//! `vault/webapp/` in the vault repository.

use std::path::{Path, PathBuf};

/// Directory at top-level of vault repository that holds all workspaces.
pub const CONTENT_ROOT: &str = "vault";

/// Placeholder that keeps otherwise empty directories in the commit history.
pub const PLACEHOLDER: &str = ".gitkeep";

/// Workspace name used when project directory has no base name.
pub const FALLBACK_WORKSPACE: &str = "default";

/// Named partition of vault content owned by one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    name: String,
}

impl Workspace {
    /// Construct new workspace by name.
    ///
    /// An empty name falls back to [`FALLBACK_WORKSPACE`].
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = match name.trim() {
            "" | "." | ".." => FALLBACK_WORKSPACE.to_string(),
            trimmed => trimmed.to_string(),
        };

        Self { name }
    }

    /// Derive workspace from base name of project root.
    pub fn from_project_root(root: impl AsRef<Path>) -> Self {
        let name = root
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::new(name)
    }

    /// Name of workspace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Map project relative path to path inside vault repository.
    pub fn vault_path(&self, relative: &str) -> String {
        format!("{CONTENT_ROOT}/{}/{relative}", self.name)
    }

    /// Map vault repository path back to project relative path.
    ///
    /// Returns [`None`] if the path lies outside of this workspace.
    pub fn project_path<'a>(&self, vault_path: &'a str) -> Option<&'a str> {
        vault_path
            .strip_prefix(CONTENT_ROOT)?
            .strip_prefix('/')?
            .strip_prefix(self.name.as_str())?
            .strip_prefix('/')
            .filter(|relative| !relative.is_empty())
    }

    /// Directory of workspace inside a vault checkout.
    pub fn dir_in(&self, checkout: impl AsRef<Path>) -> PathBuf {
        content_root_in(checkout).join(&self.name)
    }

    /// Location of project relative path inside a vault checkout.
    pub fn file_in(&self, checkout: impl AsRef<Path>, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.dir_in(checkout), |path, part| path.join(part))
    }
}

/// Vault content root inside a vault checkout.
pub fn content_root_in(checkout: impl AsRef<Path>) -> PathBuf {
    checkout.as_ref().join(CONTENT_ROOT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("/home/me/code/webapp", "webapp"; "base name")]
    #[test_case("/", "default"; "filesystem root")]
    #[test_case("", "default"; "empty path")]
    #[test]
    fn workspace_from_project_root(root: &str, expect: &str) {
        pretty_assertions::assert_eq!(Workspace::from_project_root(root).name(), expect);
    }

    #[test_case("vault/webapp/docs/notes.md", Some("docs/notes.md"); "nested file")]
    #[test_case("vault/webapp/README.md", Some("README.md"); "top level file")]
    #[test_case("vault/webapp2/README.md", None; "sibling with shared prefix")]
    #[test_case("vault/other/README.md", None; "other workspace")]
    #[test_case("vault/webapp/", None; "workspace itself")]
    #[test_case("notes/webapp/README.md", None; "outside content root")]
    #[test]
    fn project_path_stays_inside_workspace(vault_path: &str, expect: Option<&str>) {
        let workspace = Workspace::new("webapp");
        pretty_assertions::assert_eq!(workspace.project_path(vault_path), expect);
    }

    #[test]
    fn vault_path_round_trip() {
        let workspace = Workspace::new("webapp");
        let vault_path = workspace.vault_path("docs/notes.md");

        assert_eq!(vault_path, "vault/webapp/docs/notes.md");
        assert_eq!(workspace.project_path(&vault_path), Some("docs/notes.md"));
    }

    #[test]
    fn file_in_checkout() {
        let workspace = Workspace::new("webapp");
        assert_eq!(
            workspace.file_in("/tmp/checkout", "docs/notes.md"),
            Path::new("/tmp/checkout/vault/webapp/docs/notes.md")
        );
    }
}

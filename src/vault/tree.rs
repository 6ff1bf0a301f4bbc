// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Directory tree planning.
//!
//! Listing, pruning, and copy-out all walk a directory tree. The walk itself
//! is done once by [`scan`], which flattens a directory into [`TreeEntry`]
//! values. Everything else in this module is a pure function over those
//! entries that decides _what_ should happen, leaving the file system side
//! effects to the caller.

use crate::{path::slash_relative, vault::workspace::Workspace};

use ignore::WalkBuilder;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

/// Kind of directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Directory entry relative to the scanned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Relative path with forward slashes.
    pub path: String,

    /// Kind of entry.
    pub kind: EntryKind,
}

impl TreeEntry {
    /// Construct new file entry.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    /// Construct new directory entry.
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Dir,
        }
    }

    fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Entries to delete from a tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrunePlan {
    /// Files to delete.
    pub files: Vec<String>,

    /// Directories left empty, deepest first.
    pub dirs: Vec<String>,
}

impl PrunePlan {
    /// Nothing to delete.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

/// Files to copy out of a workspace.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    /// Workspace relative files to copy.
    pub files: Vec<String>,

    /// Requested paths that matched nothing.
    pub unmatched: Vec<String>,
}

/// List all files of a tree in lexicographic order.
pub fn list_files(entries: &[TreeEntry]) -> Vec<String> {
    let mut files = entries
        .iter()
        .filter(|entry| entry.is_file())
        .map(|entry| entry.path.clone())
        .collect::<Vec<_>>();
    files.sort();
    files
}

/// Plan deletion of every file not in the keep set.
///
/// Directories that contain no kept file afterwards are scheduled for
/// removal too, ordered so that children are removed before their parents.
pub fn prune_plan(entries: &[TreeEntry], keep: &HashSet<String>) -> PrunePlan {
    let (kept, mut files): (Vec<_>, Vec<_>) = entries
        .iter()
        .filter(|entry| entry.is_file())
        .map(|entry| entry.path.clone())
        .partition(|path| keep.contains(path));
    files.sort();

    let mut dirs = entries
        .iter()
        .filter(|entry| entry.is_dir())
        .filter(|entry| {
            let prefix = format!("{}/", entry.path);
            !kept.iter().any(|path| path.starts_with(&prefix))
        })
        .map(|entry| entry.path.clone())
        .collect::<Vec<_>>();

    // INVARIANT: Deepest directories first, so each one is empty when reached.
    dirs.sort_by(|a, b| depth(b).cmp(&depth(a)).then_with(|| b.cmp(a)));

    PrunePlan { files, dirs }
}

/// Plan which workspace files to copy back into the project.
///
/// An empty request copies everything. Otherwise each requested path picks
/// one workspace file, trying in turn an exact relative path, a vault
/// qualified path, a path suffix, and finally a bare file name. Within each
/// of those tiers, the first file in lexicographic order wins.
pub fn copy_out_plan(entries: &[TreeEntry], workspace: &Workspace, requested: &[String]) -> CopyPlan {
    let files = list_files(entries);
    if requested.is_empty() {
        return CopyPlan {
            files,
            unmatched: Vec::new(),
        };
    }

    let mut plan = CopyPlan::default();
    for wanted in requested {
        let wanted = wanted.trim_start_matches("./");
        let found = MatchTier::ALL.iter().find_map(|tier| {
            files
                .iter()
                .find(|file| tier.matches(file, wanted, workspace))
        });

        match found {
            Some(file) if !plan.files.contains(file) => plan.files.push(file.clone()),
            Some(_) => {}
            None => plan.unmatched.push(wanted.to_string()),
        }
    }

    plan
}

#[derive(Debug, Clone, Copy)]
enum MatchTier {
    Exact,
    VaultQualified,
    Suffix,
    FileName,
}

impl MatchTier {
    const ALL: [Self; 4] = [Self::Exact, Self::VaultQualified, Self::Suffix, Self::FileName];

    fn matches(self, file: &str, wanted: &str, workspace: &Workspace) -> bool {
        match self {
            Self::Exact => file == wanted,
            Self::VaultQualified => workspace.project_path(wanted) == Some(file),
            Self::Suffix => file
                .strip_suffix(wanted)
                .is_some_and(|head| head.ends_with('/')),
            Self::FileName => file.rsplit('/').next() == Some(wanted),
        }
    }
}

/// Flatten directory into tree entries.
///
/// A missing directory is an empty tree. Symbolic links are left out.
///
/// # Errors
///
/// - Return [`TreeError::Walk`] if the directory cannot be traversed.
pub fn scan(dir: impl AsRef<Path>) -> Result<Vec<TreeEntry>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(|err| TreeError::Walk {
            source: err,
            path: dir.to_path_buf(),
        })?;

        if entry.depth() == 0 {
            continue;
        }

        let Some(path) = slash_relative(dir, entry.path()) else {
            continue;
        };

        match entry.file_type() {
            Some(kind) if kind.is_file() => entries.push(TreeEntry::file(path)),
            Some(kind) if kind.is_dir() => entries.push(TreeEntry::dir(path)),
            _ => continue,
        }
    }

    Ok(entries)
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

/// Tree scanning error types.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Directory cannot be traversed.
    #[error("failed to walk directory {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = TreeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn workspace_tree() -> Vec<TreeEntry> {
        vec![
            TreeEntry::file("README.md"),
            TreeEntry::dir("docs"),
            TreeEntry::file("docs/guide.md"),
            TreeEntry::dir("docs/old"),
            TreeEntry::file("docs/old/notes.md"),
            TreeEntry::dir("rules"),
            TreeEntry::file("rules/notes.md"),
            TreeEntry::dir("empty"),
        ]
    }

    #[test]
    fn list_files_sorted_without_dirs() {
        let mut entries = workspace_tree();
        entries.reverse();

        assert_eq!(
            list_files(&entries),
            vec!["README.md", "docs/guide.md", "docs/old/notes.md", "rules/notes.md"]
        );
    }

    #[test]
    fn prune_removes_unkept_files_and_emptied_dirs() {
        let keep = ["README.md", "docs/guide.md"]
            .into_iter()
            .map(String::from)
            .collect::<HashSet<_>>();

        let expect = PrunePlan {
            files: vec!["docs/old/notes.md".into(), "rules/notes.md".into()],
            dirs: vec!["docs/old".into(), "rules".into(), "empty".into()],
        };

        assert_eq!(prune_plan(&workspace_tree(), &keep), expect);
    }

    #[test]
    fn prune_nothing_when_everything_kept() {
        let entries = workspace_tree();
        let keep = list_files(&entries).into_iter().collect::<HashSet<_>>();
        let plan = prune_plan(&entries, &keep);

        assert_eq!(plan.files, Vec::<String>::new());
        assert_eq!(plan.dirs, vec!["empty".to_string()]);
    }

    #[test]
    fn prune_parent_after_child() {
        let entries = vec![
            TreeEntry::dir("a"),
            TreeEntry::dir("a/b"),
            TreeEntry::dir("a/b/c"),
            TreeEntry::file("a/b/c/gone.md"),
        ];
        let plan = prune_plan(&entries, &HashSet::new());

        assert_eq!(plan.dirs, vec!["a/b/c", "a/b", "a"]);
    }

    #[test]
    fn copy_out_everything_without_request() {
        let plan = copy_out_plan(&workspace_tree(), &Workspace::new("webapp"), &[]);

        assert_eq!(plan.files, list_files(&workspace_tree()));
        assert!(plan.unmatched.is_empty());
    }

    #[test_case("docs/guide.md", "docs/guide.md"; "exact path")]
    #[test_case("./README.md", "README.md"; "dot slash prefix")]
    #[test_case("vault/webapp/rules/notes.md", "rules/notes.md"; "vault qualified path")]
    #[test_case("old/notes.md", "docs/old/notes.md"; "path suffix")]
    #[test_case("guide.md", "docs/guide.md"; "bare file name")]
    #[test_case("notes.md", "docs/old/notes.md"; "ambiguous name takes first in order")]
    #[test]
    fn copy_out_requested_file(wanted: &str, expect: &str) {
        let plan = copy_out_plan(
            &workspace_tree(),
            &Workspace::new("webapp"),
            &[wanted.to_string()],
        );

        pretty_assertions::assert_eq!(plan.files, vec![expect.to_string()]);
    }

    #[test]
    fn copy_out_reports_unmatched_and_skips_duplicates() {
        let requested = ["guide.md", "docs/guide.md", "missing.md"].map(String::from);
        let plan = copy_out_plan(&workspace_tree(), &Workspace::new("webapp"), &requested);

        assert_eq!(plan.files, vec!["docs/guide.md".to_string()]);
        assert_eq!(plan.unmatched, vec!["missing.md".to_string()]);
    }

    #[test]
    fn scan_missing_dir_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(scan(dir.path().join("nope"))?, Vec::new());

        Ok(())
    }

    #[test]
    fn scan_flattens_tree() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("docs/old"))?;
        std::fs::write(dir.path().join("docs/old/notes.md"), "old")?;
        std::fs::write(dir.path().join(".hidden"), "hidden")?;

        let mut result = scan(dir.path())?;
        result.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(
            result,
            vec![
                TreeEntry::file(".hidden"),
                TreeEntry::dir("docs"),
                TreeEntry::dir("docs/old"),
                TreeEntry::file("docs/old/notes.md"),
            ]
        );

        Ok(())
    }
}

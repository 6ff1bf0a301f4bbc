// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project file collection.
//!
//! Expand the include patterns of a project configuration against the
//! project root, and drop everything that the exclude patterns match. The
//! result is the set of files that belong in the project's vault workspace.
//!
//! # Pattern Semantics
//!
//! Include patterns are plain globs evaluated relative to the project root.
//! Hidden files are only matched when the pattern spells out the leading dot,
//! e.g., `**/*.md` does not match `.claude/notes.md`, but `.claude/**` does.
//!
//! Exclude patterns use gitignore semantics. Excluding a directory excludes
//! everything beneath it, and a pattern without a slash matches at any depth.

use crate::{config::ProjectConfig, path::slash_relative};

use glob::{glob_with, MatchOptions};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::{
    collections::HashSet,
    fs::symlink_metadata,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Project file selected for the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultFile {
    /// Location on local file system.
    pub absolute_path: PathBuf,

    /// Path relative to project root with forward slashes.
    pub relative_path: String,
}

/// Collect project files matching configuration patterns.
///
/// Output follows include pattern order, and is deduplicated by absolute
/// path. Only regular files are returned. Symbolic links, directories, and
/// paths that cannot be inspected are skipped.
///
/// # Errors
///
/// - Return [`CollectError::Include`] if an include pattern is invalid.
/// - Return [`CollectError::Exclude`] if an exclude pattern is invalid.
#[instrument(skip(root, config), level = "debug")]
pub fn collect(root: impl AsRef<Path>, config: &ProjectConfig) -> Result<Vec<VaultFile>> {
    let root = root.as_ref();
    let excludes = exclude_matcher(root, &config.exclude)?;
    // INVARIANT: Hidden paths are filtered per pattern below, requiring a
    // literal leading dot here stops `**` from descending into `.claude/`.
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for pattern in &config.include {
        let pattern = pattern.trim_start_matches("./").trim_start_matches('/');
        let allows_hidden = pattern.split('/').any(|part| part.starts_with('.'));
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(root.to_string_lossy().as_ref()),
            pattern
        );

        let paths = glob_with(&full, options).map_err(|err| CollectError::Include {
            source: err,
            pattern: pattern.to_string(),
        })?;

        for entry in paths {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    debug!("skip unreadable path: {err}");
                    continue;
                }
            };

            if !is_regular_file(&path) || seen.contains(&path) {
                continue;
            }

            if excludes.matched_path_or_any_parents(&path, false).is_ignore() {
                debug!("exclude {:?}", path.display());
                continue;
            }

            let Some(relative_path) = slash_relative(root, &path) else {
                continue;
            };

            if !allows_hidden && relative_path.split('/').any(|part| part.starts_with('.')) {
                continue;
            }

            seen.insert(path.clone());
            files.push(VaultFile {
                absolute_path: path,
                relative_path,
            });
        }
    }

    debug!("collected {} files", files.len());
    Ok(files)
}

fn exclude_matcher(root: &Path, patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|err| CollectError::Exclude {
                source: err,
                pattern: pattern.clone(),
            })?;
    }

    builder.build().map_err(|err| CollectError::Exclude {
        source: err,
        pattern: patterns.join(", "),
    })
}

// INVARIANT: Permission errors and broken links mean "file absent".
fn is_regular_file(path: &Path) -> bool {
    match symlink_metadata(path) {
        Ok(meta) => meta.file_type().is_file(),
        Err(err) => {
            debug!("cannot stat {:?}: {err}", path.display());
            false
        }
    }
}

/// File collection error types.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Include pattern is not a valid glob.
    #[error("invalid include pattern {pattern:?}")]
    Include {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Exclude pattern is not a valid gitignore rule.
    #[error("invalid exclude pattern {pattern:?}")]
    Exclude {
        #[source]
        source: ignore::Error,
        pattern: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CollectError> = std::result::Result<T, E>;

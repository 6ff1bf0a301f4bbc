// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use crate::config::PROJECT_CONFIG_FILE;

use std::path::{Path, PathBuf};

/// Determine absolute path to project configuration file.
///
/// Does not check if the path returned actually exists.
pub fn project_config_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(PROJECT_CONFIG_FILE)
}

/// Determine absolute path to global defaults file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/agvault/config.json`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn global_defaults_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("agvault").join("config.json"))
        .ok_or(NoWayHome)
}

/// Render path relative to some base using forward slashes.
///
/// Returns [`None`] if the path is not under the base.
pub fn slash_relative(base: impl AsRef<Path>, path: impl AsRef<Path>) -> Option<String> {
    let relative = path.as_ref().strip_prefix(base.as_ref()).ok()?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>();

    if parts.is_empty() {
        return None;
    }

    Some(parts.join("/"))
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

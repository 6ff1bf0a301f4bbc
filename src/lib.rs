// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Keep project docs, rules, and notes in a private git vault.
//!
//! Agent instruction files, design notes, and other project documentation
//! often should not live in a project's own repository, yet they are worth
//! keeping and carrying between machines. agvault selects such files from a
//! project by glob patterns, and mirrors them into a single private remote
//! git repository called the __vault__. Each project gets its own
//! __workspace__ inside the vault, named after the project directory.
//!
//! The vault is never kept on disk. Every operation clones it into a
//! temporary directory, does its work, pushes if needed, and deletes the
//! clone again.
//!
//! # See Also
//!
//! 1. [`vault`]
//! 2. [`config`]

pub mod collect;
pub mod config;
pub mod output;
pub mod path;
pub mod vault;

pub use collect::VaultFile;
pub use config::{GlobalDefaults, ProjectConfig};
pub use output::{Output, Phase, PhaseObserver};
pub use vault::{StoreReport, SyncReport, Vault, VaultError};

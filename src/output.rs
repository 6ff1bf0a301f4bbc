// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Console output and phase reporting.
//!
//! Vault operations report progress through a [`PhaseObserver`]. The CLI
//! decides once per invocation how that progress is shown by building an
//! [`Output`] context, which is then passed down explicitly.

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    cell::RefCell,
    fmt::{Display, Formatter, Result as FmtResult},
    time::Duration,
};

/// Step of a vault operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Cloning,
    Bootstrapping,
    Copying,
    Pruning,
    Committing,
    Pushing,
    CreatingRemote,
    Listing,
    Pulling,
    Storing,
    Purging,
    Cleaning,
}

impl Display for Phase {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Cloning => "cloning vault",
            Self::Bootstrapping => "bootstrapping new vault",
            Self::Copying => "copying files",
            Self::Pruning => "pruning stale files",
            Self::Committing => "committing changes",
            Self::Pushing => "pushing to remote",
            Self::CreatingRemote => "creating remote repository",
            Self::Listing => "listing vault files",
            Self::Pulling => "pulling",
            Self::Storing => "storing",
            Self::Purging => "purging vault",
            Self::Cleaning => "cleaning local files",
        };

        fmt.write_str(label)
    }
}

/// Observe phase transitions of vault operations.
pub trait PhaseObserver {
    /// Operation entered a new phase.
    fn phase(&self, phase: Phase);
}

/// Ignore all phases.
impl PhaseObserver for () {
    fn phase(&self, _phase: Phase) {}
}

/// Show current phase on a terminal spinner.
#[derive(Debug)]
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Construct new spinner that ticks in the background.
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl PhaseObserver for Spinner {
    fn phase(&self, phase: Phase) {
        self.bar.set_message(phase.to_string());
    }
}

/// Record phases in order of arrival.
#[derive(Debug, Default)]
pub struct Recorder {
    phases: RefCell<Vec<Phase>>,
}

impl Recorder {
    /// Construct new empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Phases seen so far.
    pub fn phases(&self) -> Vec<Phase> {
        self.phases.borrow().clone()
    }
}

impl PhaseObserver for Recorder {
    fn phase(&self, phase: Phase) {
        self.phases.borrow_mut().push(phase);
    }
}

/// How results are shown to the user.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Spinner plus human readable summaries.
    #[default]
    Human,

    /// Only results, no spinner.
    Quiet,

    /// Machine readable results, no spinner.
    Json,
}

/// Output configuration for a single invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub mode: OutputMode,
}

impl Output {
    /// Construct new output context.
    pub fn new(quiet: bool, json: bool) -> Self {
        let mode = if json {
            OutputMode::Json
        } else if quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Human
        };

        Self { mode }
    }

    /// Observer matching output mode.
    pub fn observer(&self) -> Box<dyn PhaseObserver> {
        match self.mode {
            OutputMode::Human => Box::new(Spinner::new()),
            OutputMode::Quiet | OutputMode::Json => Box::new(()),
        }
    }

    /// Human readable messages should be shown.
    pub fn is_human(&self) -> bool {
        self.mode == OutputMode::Human
    }

    /// Machine readable results were requested.
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }
}

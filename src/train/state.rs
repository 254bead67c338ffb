//! Per-repository train state.
//!
//! One `RepositoryState` exists per repository for the lifetime of the
//! process. The train itself is only written by jobs, which the repository's
//! queue runs one at a time; the flags are also written by the admin surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{PrNumber, RepoId};

/// The flags that can be flipped per repository.
///
/// This is a closed set: the admin surface can't address any other field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoFlag {
    /// Whether events are queued for evaluation at all.
    Enabled,
    /// Whether a ready train is actually merged (off = dry run).
    MutationEnabled,
}

impl RepoFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoFlag::Enabled => "enabled",
            RepoFlag::MutationEnabled => "mutation_enabled",
        }
    }
}

impl fmt::Display for RepoFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a flag name outside [`RepoFlag`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown flag: {0}")]
pub struct UnknownFlag(pub String);

impl FromStr for RepoFlag {
    type Err = UnknownFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(RepoFlag::Enabled),
            "mutation_enabled" => Ok(RepoFlag::MutationEnabled),
            other => Err(UnknownFlag(other.to_string())),
        }
    }
}

/// Code freeze settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFreeze {
    pub enforce: bool,
    pub branch: String,
}

impl CodeFreeze {
    /// Whether a PR targeting `target_branch` may be merged.
    ///
    /// While enforced, only PRs targeting exactly the freeze branch pass; an
    /// empty freeze branch admits nothing.
    pub fn admits(&self, target_branch: &str) -> bool {
        !self.enforce || (!self.branch.is_empty() && target_branch == self.branch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    pub repo: RepoId,
    train: Vec<PrNumber>,
    pub enabled: bool,
    pub mutation_enabled: bool,
    pub code_freeze: CodeFreeze,
    decision_log: Vec<String>,
}

impl RepositoryState {
    pub fn new(repo: RepoId, enabled: bool, mutation_enabled: bool, code_freeze: CodeFreeze) -> Self {
        Self {
            repo,
            train: Vec::new(),
            enabled,
            mutation_enabled,
            code_freeze,
            decision_log: Vec::new(),
        }
    }

    pub fn train(&self) -> &[PrNumber] {
        &self.train
    }

    pub fn in_train(&self, pr: PrNumber) -> bool {
        self.train.contains(&pr)
    }

    /// Appends `pr` unless it is already a member. Returns whether it was added.
    pub fn push_to_train(&mut self, pr: PrNumber) -> bool {
        if self.in_train(pr) {
            return false;
        }
        self.train.push(pr);
        true
    }

    /// Removes `pr`. Returns whether it was a member.
    pub fn remove_from_train(&mut self, pr: PrNumber) -> bool {
        let before = self.train.len();
        self.train.retain(|p| *p != pr);
        self.train.len() != before
    }

    /// Replaces the train, dropping any repeated numbers.
    pub fn replace_train(&mut self, train: Vec<PrNumber>) {
        self.train.clear();
        for pr in train {
            self.push_to_train(pr);
        }
    }

    pub fn clear_train(&mut self) {
        self.train.clear();
    }

    pub fn decision_log(&self) -> &[String] {
        &self.decision_log
    }

    pub fn clear_log(&mut self) {
        self.decision_log.clear();
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.decision_log.push(line.into());
    }

    pub fn flag(&self, flag: RepoFlag) -> bool {
        match flag {
            RepoFlag::Enabled => self.enabled,
            RepoFlag::MutationEnabled => self.mutation_enabled,
        }
    }

    pub fn set_flag(&mut self, flag: RepoFlag, value: bool) {
        match flag {
            RepoFlag::Enabled => self.enabled = value,
            RepoFlag::MutationEnabled => self.mutation_enabled = value,
        }
    }

    /// Flips `flag` and returns the new value.
    pub fn toggle_flag(&mut self, flag: RepoFlag) -> bool {
        let value = !self.flag(flag);
        self.set_flag(flag, value);
        value
    }
}

/// Read-only view of a repository for the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSnapshot {
    pub repo: String,
    pub enabled: bool,
    pub mutation_enabled: bool,
    pub enforce_code_freeze: bool,
    pub code_freeze_branch: String,
    pub train: Vec<PrNumber>,
    pub decision_log: Vec<String>,
    pub queue_size: usize,
}

impl RepoSnapshot {
    pub fn new(state: &RepositoryState, queue_size: usize) -> Self {
        Self {
            repo: state.repo.to_string(),
            enabled: state.enabled,
            mutation_enabled: state.mutation_enabled,
            enforce_code_freeze: state.code_freeze.enforce,
            code_freeze_branch: state.code_freeze.branch.clone(),
            train: state.train.clone(),
            decision_log: state.decision_log.clone(),
            queue_size,
        }
    }
}

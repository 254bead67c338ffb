//! The merge train.
//!
//! # Flow
//!
//! ```text
//! TrainEvent ──► TrainRegistry ──► RepoController ──► JobQueue ──► job
//!                (lazy, by repo)   (enabled gate)     (FIFO, 1)     │
//!                                                                   ▼
//!                                     seed / fetch ──► plan_train ──► merge_batch
//! ```
//!
//! A job re-reads the train's PRs and their combined statuses, keeps the
//! labeled PRs that are clean or still have pending CI, and merges the whole
//! train once nothing is pending. After a merge attempt the train is emptied
//! whatever the outcome; later events seed a new one.

pub mod controller;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod job;
pub mod queue;
pub mod registry;
pub mod state;

pub use controller::{RepoController, TrainConfig};
pub use error::TrainError;
pub use evaluator::{Candidate, Classification, TrainPlan, Verdict, classify, plan_train};
pub use executor::{MergeFailure, MergeReport, merge_batch};
pub use job::{Job, JobKind};
pub use queue::{JobQueue, JobRunner, QueueError};
pub use registry::{Connector, TrainRegistry};
pub use state::{CodeFreeze, RepoFlag, RepoSnapshot, RepositoryState, UnknownFlag};

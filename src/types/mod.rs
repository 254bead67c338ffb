//! Core domain types for the merge train bot.

pub mod ids;
pub mod pr;

pub use ids::{DeliveryId, PrNumber, RepoId, Sha, format_pr_list};
pub use pr::{
    ChangesetData, CombinedStatus, CommitStatus, IssueSummary, MergeableState, StatusState,
};

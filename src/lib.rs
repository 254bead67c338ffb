//! Steward Bot - a GitHub bot that merges trains of labeled, green pull requests.
//!
//! Each repository keeps a proposed train: the labeled PRs that are either
//! clean or still waiting on CI. Webhook events queue a re-evaluation; once
//! every member of the train is clean, the whole train is squash-merged.

pub mod config;
pub mod effects;
pub mod github;
pub mod server;
pub mod train;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;

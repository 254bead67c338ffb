//! Effects-as-data for GitHub operations.
//!
//! The train logic describes what it wants from GitHub as [`GitHubEffect`]
//! values. This keeps evaluation testable against a fake interpreter and makes
//! every outbound call visible in one enum.

pub mod github;
pub mod interpreter;

pub use github::{GitHubEffect, GitHubResponse};
pub use interpreter::GitHubInterpreter;

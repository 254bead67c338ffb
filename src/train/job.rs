//! Queued units of work.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::types::{PrNumber, RepoId};

/// What a job was scheduled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// A commit status changed somewhere in the repository.
    StatusChanged,
    /// The merge label was added to a PR.
    Labeled(PrNumber),
    /// The merge label was removed from a PR.
    Unlabeled(PrNumber),
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::StatusChanged => f.write_str("status"),
            JobKind::Labeled(_) => f.write_str("labeled"),
            JobKind::Unlabeled(_) => f.write_str("unlabeled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub repo: RepoId,
    pub kind: JobKind,
    pub requested_at: DateTime<Utc>,
}

impl Job {
    pub fn new(repo: RepoId, kind: JobKind) -> Self {
        Self {
            repo,
            kind,
            requested_at: Utc::now(),
        }
    }

    /// The opening decision-log line of the job.
    pub fn header(&self, processed_at: DateTime<Utc>) -> String {
        format!(
            "request at: {} processed at {} event type {}",
            self.requested_at.to_rfc3339(),
            processed_at.to_rfc3339(),
            self.kind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn header_names_times_and_kind() {
        let job = Job {
            repo: RepoId::new("o", "r"),
            kind: JobKind::Labeled(PrNumber(3)),
            requested_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        let processed = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap();

        assert_eq!(
            job.header(processed),
            "request at: 2024-05-01T12:00:00+00:00 processed at 2024-05-01T12:00:05+00:00 event type labeled"
        );
    }
}

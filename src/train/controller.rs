//! The per-repository train controller.
//!
//! `RepoController` is the single entry point for a repository's events.
//! Each accepted event becomes a [`Job`] on the repository's queue; the
//! queue's worker runs the job against the shared [`RepositoryState`].
//!
//! Jobs never overlap within a repository, so the train is only ever
//! mutated by one job at a time. The state mutex is held only for short,
//! synchronous reads and writes, never across a GitHub request, so the
//! admin surface can read a snapshot while an evaluation is in flight.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::effects::GitHubInterpreter;
use crate::types::{PrNumber, RepoId, format_pr_list};

use super::error::TrainError;
use super::evaluator::{Classification, fetch_candidates, fetch_pr, plan_train, seed_candidates};
use super::executor::merge_batch;
use super::job::{Job, JobKind};
use super::queue::{JobQueue, JobRunner, QueueError};
use super::state::{CodeFreeze, RepoFlag, RepoSnapshot, RepositoryState};

/// Settings shared by every repository's controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainConfig {
    /// The label that makes a PR a train candidate.
    pub merge_label: String,
    /// Name used in the merge acknowledgement comment.
    pub app_name: String,
    /// Initial value of both `enabled` and `mutation_enabled`.
    pub mutate: bool,
    /// Initial code freeze setting.
    pub code_freeze: CodeFreeze,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            merge_label: "ready-to-merge".to_string(),
            app_name: "steward-bot".to_string(),
            mutate: false,
            code_freeze: CodeFreeze::default(),
        }
    }
}

/// Runs jobs for one repository.
struct TrainRunner<I> {
    repo: RepoId,
    interpreter: I,
    state: Mutex<RepositoryState>,
    config: Arc<TrainConfig>,
}

impl<I: GitHubInterpreter> JobRunner<Job> for TrainRunner<I> {
    async fn run(&self, job: Job) {
        self.process(job).await;
    }
}

impl<I: GitHubInterpreter> TrainRunner<I> {
    fn state(&self) -> MutexGuard<'_, RepositoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends to the decision log and mirrors the line to tracing.
    fn log(&self, line: impl Into<String>) {
        let line = line.into();
        info!(repo = %self.repo, "{}", line);
        self.state().log(line);
    }

    #[instrument(skip(self, job), fields(repo = %self.repo, kind = %job.kind))]
    async fn process(&self, job: Job) {
        self.state().clear_log();
        self.log(job.header(Utc::now()));

        let result = match job.kind {
            JobKind::StatusChanged => self.evaluate().await,
            JobKind::Labeled(pr) => self.on_labeled(pr).await,
            JobKind::Unlabeled(pr) => self.on_unlabeled(pr).await,
        };

        if let Err(e) = result {
            warn!(repo = %self.repo, error = %e, "Train evaluation failed");
            self.log(format!("evaluation failed: {}", e));
        }

        self.log("request complete");
    }

    async fn on_labeled(&self, pr: PrNumber) -> Result<(), TrainError> {
        let train_empty = self.state().train().is_empty();
        if train_empty {
            self.log(format!(
                "PR {} labeled; proposed trains empty, starting",
                pr.0
            ));
            self.evaluate().await
        } else {
            self.check_single(pr).await
        }
    }

    async fn on_unlabeled(&self, pr: PrNumber) -> Result<(), TrainError> {
        let removed_from = {
            let mut state = self.state();
            let before = format_pr_list(state.train());
            state.remove_from_train(pr).then_some(before)
        };

        match removed_from {
            Some(before) => {
                self.log(format!(
                    "PR {} was part of proposed train {}, but was unlabeled. Removing",
                    pr.0, before
                ));
                self.evaluate().await
            }
            None => Ok(()),
        }
    }

    /// Fast path for a newly labeled PR while a train is already forming.
    async fn check_single(&self, pr: PrNumber) -> Result<(), TrainError> {
        if self.state().in_train(pr) {
            return Ok(());
        }

        let data = fetch_pr(&self.interpreter, pr).await?;

        let freeze = self.state().code_freeze.clone();
        if !freeze.admits(&data.target_branch) {
            self.log(format!(
                "{} is not pointing towards the code freeze branch. It will not be merged",
                data.number.0
            ));
            return Ok(());
        }

        if data.has_label(&self.config.merge_label) && data.mergeable_state.is_clean() {
            if self.state().push_to_train(data.number) {
                self.log(format!(
                    "{} added to the proposed train: clean and ready to merge",
                    data.number.0
                ));
            }
        } else {
            debug!(repo = %self.repo, pr = %pr, state = %data.mergeable_state, "Labeled PR not clean yet");
        }
        Ok(())
    }

    /// Re-evaluates the whole train and merges it once every member is clean.
    ///
    /// Nothing is written to the train until every candidate has been
    /// fetched, so a failed request leaves the train as it was.
    async fn evaluate(&self) -> Result<(), TrainError> {
        let (train, freeze) = {
            let state = self.state();
            (state.train().to_vec(), state.code_freeze.clone())
        };

        let candidates = if train.is_empty() {
            self.log("there are no proposed trains, building a new one");
            seed_candidates(&self.interpreter, &self.config.merge_label).await?
        } else {
            train
        };

        let fetched = fetch_candidates(&self.interpreter, &candidates).await?;
        let plan = plan_train(&fetched, &self.config.merge_label, &freeze);

        for verdict in &plan.verdicts {
            if verdict.classification == Classification::Frozen {
                debug!(repo = %self.repo, pr = %verdict.pr, "Excluded by code freeze");
            }
            self.log(verdict.describe());
        }

        self.log(format!(
            "after recalculating, train: {} becomes new train {}",
            format_pr_list(&candidates),
            format_pr_list(&plan.new_train)
        ));

        if plan.all_ready() {
            self.log(format!(
                "in train {} all PRs ready to merge",
                format_pr_list(&plan.new_train)
            ));
            self.merge(&plan.new_train).await;
            self.state().clear_train();
        } else {
            self.log(format!(
                "in train {} has {} ready to merge, some pending, waiting",
                format_pr_list(&plan.new_train),
                format_pr_list(&plan.ready)
            ));
            self.state().replace_train(plan.new_train);
        }
        Ok(())
    }

    async fn merge(&self, batch: &[PrNumber]) {
        if batch.is_empty() {
            return;
        }

        self.log(format!("attempting to merge {}", format_pr_list(batch)));

        let mutation_enabled = self.state().mutation_enabled;
        if !mutation_enabled {
            self.log("ignoring merge; mutation off");
            return;
        }

        let report = merge_batch(&self.interpreter, batch, &self.config.app_name).await;
        self.log(report.summary());
        if let Some(reasons) = report.failure_reasons() {
            self.log(reasons);
        }
    }
}

/// The controller for one repository.
pub struct RepoController<I> {
    repo: RepoId,
    runner: Arc<TrainRunner<I>>,
    queue: JobQueue<Job>,
}

impl<I: GitHubInterpreter> RepoController<I> {
    /// Creates the controller and spawns its queue worker.
    pub fn new(
        repo: RepoId,
        interpreter: I,
        config: Arc<TrainConfig>,
        code_freeze: CodeFreeze,
    ) -> Self {
        let state = RepositoryState::new(repo.clone(), config.mutate, config.mutate, code_freeze);
        let runner = Arc::new(TrainRunner {
            repo: repo.clone(),
            interpreter,
            state: Mutex::new(state),
            config,
        });
        let queue = JobQueue::spawn(repo.to_string(), runner.clone());

        info!(repo = %repo, "Created train controller");
        Self {
            repo,
            runner,
            queue,
        }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// A commit status changed: re-evaluate the whole train.
    pub fn on_status(&self) -> bool {
        self.schedule(JobKind::StatusChanged)
    }

    /// A label was added. Only the merge label schedules work.
    pub fn on_labeled(&self, pr: PrNumber, label: &str) -> bool {
        if label != self.runner.config.merge_label {
            return false;
        }
        info!(repo = %self.repo, pr = %pr, "PR labeled for merge");
        self.schedule(JobKind::Labeled(pr))
    }

    /// A label was removed. Only the merge label schedules work.
    pub fn on_unlabeled(&self, pr: PrNumber, label: &str) -> bool {
        if label != self.runner.config.merge_label {
            return false;
        }
        self.schedule(JobKind::Unlabeled(pr))
    }

    /// Liveness probe. Creating the controller is its only effect.
    pub fn on_ping(&self) {
        debug!(repo = %self.repo, "Ping");
    }

    /// Queues a job unless the repository is disabled. Returns whether the
    /// job was queued.
    fn schedule(&self, kind: JobKind) -> bool {
        if !self.runner.state().enabled {
            debug!(repo = %self.repo, kind = %kind, "not enabled, bailing");
            return false;
        }

        debug!(repo = %self.repo, kind = %kind, queue_len = self.queue.size(), "Enqueueing job");
        match self.queue.enqueue(Job::new(self.repo.clone(), kind)) {
            Ok(()) => true,
            Err(QueueError::Closed) => {
                warn!(repo = %self.repo, kind = %kind, "Job queue closed; dropping event");
                false
            }
        }
    }

    pub fn queue(&self) -> &JobQueue<Job> {
        &self.queue
    }

    /// Waits until every queued job has finished.
    pub async fn drain(&self) {
        self.queue.drain().await;
    }

    pub fn train(&self) -> Vec<PrNumber> {
        self.runner.state().train().to_vec()
    }

    pub fn decision_log(&self) -> Vec<String> {
        self.runner.state().decision_log().to_vec()
    }

    pub fn flag(&self, flag: RepoFlag) -> bool {
        self.runner.state().flag(flag)
    }

    pub fn set_flag(&self, flag: RepoFlag, value: bool) {
        self.runner.state().set_flag(flag, value);
        info!(repo = %self.repo, flag = %flag, value, "Changed flag");
    }

    /// Flips `flag` and returns the new value.
    pub fn toggle_flag(&self, flag: RepoFlag) -> bool {
        let value = self.runner.state().toggle_flag(flag);
        info!(repo = %self.repo, flag = %flag, value, "Changed flag");
        value
    }

    pub fn code_freeze(&self) -> CodeFreeze {
        self.runner.state().code_freeze.clone()
    }

    pub fn set_code_freeze(&self, code_freeze: CodeFreeze) {
        self.runner.state().code_freeze = code_freeze;
    }

    pub fn snapshot(&self) -> RepoSnapshot {
        let queue_size = self.queue.size();
        RepoSnapshot::new(&self.runner.state(), queue_size)
    }
}

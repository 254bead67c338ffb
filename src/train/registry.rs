//! Registry of per-repository controllers.
//!
//! Controllers are created lazily on the first event for a repository and
//! live for the rest of the process. Different repositories run their jobs
//! concurrently; each repository's own jobs are serialized by its queue.

use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::effects::GitHubInterpreter;
use crate::types::RepoId;
use crate::webhooks::TrainEvent;

use super::controller::{RepoController, TrainConfig};
use super::state::{CodeFreeze, RepoSnapshot};

/// Builds the interpreter for a newly seen repository.
pub type Connector<I> = Arc<dyn Fn(&RepoId) -> I + Send + Sync>;

pub struct TrainRegistry<I> {
    repos: RwLock<HashMap<RepoId, Arc<RepoController<I>>>>,
    connector: Connector<I>,
    config: Arc<TrainConfig>,
    /// Current global setting, inherited by repositories created later.
    code_freeze: StdRwLock<CodeFreeze>,
}

impl<I: GitHubInterpreter> TrainRegistry<I> {
    pub fn new(
        config: TrainConfig,
        connector: impl Fn(&RepoId) -> I + Send + Sync + 'static,
    ) -> Self {
        info!(
            label = %config.merge_label,
            mutate = config.mutate,
            "Creating train registry"
        );
        Self {
            repos: RwLock::new(HashMap::new()),
            connector: Arc::new(connector),
            code_freeze: StdRwLock::new(config.code_freeze.clone()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// The code freeze applied to every repository, including ones not yet seen.
    pub fn code_freeze(&self) -> CodeFreeze {
        self.code_freeze
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Returns the controller for `repo`, creating it on first use.
    pub async fn controller(&self, repo: &RepoId) -> Arc<RepoController<I>> {
        {
            let repos = self.repos.read().await;
            if let Some(controller) = repos.get(repo) {
                return controller.clone();
            }
        }

        let mut repos = self.repos.write().await;

        // Another task may have created it while we waited for the write lock.
        if let Some(controller) = repos.get(repo) {
            return controller.clone();
        }

        let interpreter = (self.connector)(repo);
        let controller = Arc::new(RepoController::new(
            repo.clone(),
            interpreter,
            self.config.clone(),
            self.code_freeze(),
        ));
        repos.insert(repo.clone(), controller.clone());
        controller
    }

    /// Returns the controller for `repo` if one exists.
    pub async fn get(&self, repo: &RepoId) -> Option<Arc<RepoController<I>>> {
        self.repos.read().await.get(repo).cloned()
    }

    pub async fn len(&self) -> usize {
        self.repos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.repos.read().await.is_empty()
    }

    /// Routes an inbound event to its repository's controller.
    ///
    /// Returns whether a job was queued. Pings for hooks not attached to a
    /// repository are ignored.
    #[instrument(skip(self, event), fields(kind = event.kind()))]
    pub async fn handle_event(&self, event: &TrainEvent) -> bool {
        let Some(repo) = event.repo() else {
            debug!("Event without repository; ignoring");
            return false;
        };
        let controller = self.controller(repo).await;

        match event {
            TrainEvent::Status { .. } => controller.on_status(),
            TrainEvent::Labeled { pr, label, .. } => controller.on_labeled(*pr, label),
            TrainEvent::Unlabeled { pr, label, .. } => controller.on_unlabeled(*pr, label),
            TrainEvent::Ping { .. } => {
                controller.on_ping();
                false
            }
        }
    }

    /// Snapshots of every repository, ordered by name.
    pub async fn snapshots(&self) -> Vec<RepoSnapshot> {
        let controllers: Vec<Arc<RepoController<I>>> =
            self.repos.read().await.values().cloned().collect();
        let mut snapshots: Vec<RepoSnapshot> = controllers.iter().map(|c| c.snapshot()).collect();
        snapshots.sort_by(|a, b| a.repo.cmp(&b.repo));
        snapshots
    }

    /// Applies a code freeze setting to every known repository and to any
    /// created afterwards. Returns the number of existing repositories changed.
    pub async fn set_code_freeze_all(&self, code_freeze: CodeFreeze) -> usize {
        // Holding the map's read lock keeps `controller` from creating a
        // repository between the two writes below.
        let repos = self.repos.read().await;
        *self.code_freeze.write().unwrap_or_else(|e| e.into_inner()) = code_freeze.clone();
        for controller in repos.values() {
            controller.set_code_freeze(code_freeze.clone());
        }
        info!(
            repos = repos.len(),
            enforce = code_freeze.enforce,
            branch = %code_freeze.branch,
            "Changed code freeze for all repositories"
        );
        repos.len()
    }
}

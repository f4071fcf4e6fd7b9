//! Bounded worker pool with an all-or-nothing failure policy.
//!
//! The orchestrator dispatches one task per theme whenever a slot is free
//! and polls the running workers. The first failed task moves the run to
//! `Draining`: results that already finished are still collected, every
//! other worker is killed, and nothing further is dispatched.

use std::collections::VecDeque;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use pbfcut_core::Theme;
use thiserror::Error;

use crate::task::{FailureStage, TaskFailure, TaskOutcome, ThemeTask};

/// Default delay between polls of the running workers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Error raised when a worker cannot be started.
#[derive(Debug, Error)]
#[error("failed to start worker for {theme}: {message}")]
pub struct LaunchError {
    /// Theme whose worker failed to start.
    pub theme: Theme,
    /// What went wrong.
    pub message: String,
    /// Underlying error.
    #[source]
    pub source: Option<std::io::Error>,
}

/// A running worker.
pub trait WorkerHandle {
    /// Return the outcome once the worker has finished, without blocking.
    fn poll(&mut self) -> Option<TaskOutcome>;

    /// Force the worker to stop and reap it.
    fn kill(&mut self);

    /// Resident memory in bytes, when the platform reports it.
    fn resident_memory(&self) -> Option<u64> {
        None
    }
}

/// Starts workers for tasks.
pub trait WorkerLauncher {
    /// Handle type for started workers.
    type Handle: WorkerHandle;

    /// Start a worker for `task`.
    ///
    /// # Errors
    /// Returns [`LaunchError`] when the worker cannot be started.
    fn launch(&mut self, task: &ThemeTask) -> Result<Self::Handle, LaunchError>;
}

/// Pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of concurrent workers, at least one.
    pub workers: usize,
    /// Delay between polls when nothing changed.
    pub poll_interval: Duration,
    /// Kill workers whose resident memory exceeds this many bytes.
    pub max_worker_memory: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_worker_memory: None,
        }
    }
}

/// Orchestrator states, logged as the run progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Preparing the queue.
    Initializing,
    /// Filling free slots.
    Dispatching,
    /// Waiting on workers.
    Running,
    /// Stopping siblings after a failure.
    Draining,
    /// Every task finished.
    Completing,
    /// The run is over.
    Terminal,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Every dispatched task completed.
    Success,
    /// A task failed and the pool was stopped.
    Failure {
        /// The first failure observed.
        trigger: TaskFailure,
        /// Number of running siblings that were killed.
        terminated: usize,
    },
}

/// Everything the orchestrator observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Final status.
    pub status: RunStatus,
    /// Outcomes in completion order.
    pub completed: Vec<TaskOutcome>,
    /// Themes in dispatch order.
    pub dispatched: Vec<Theme>,
    /// Themes whose workers were killed.
    pub terminated: Vec<Theme>,
    /// Themes never dispatched.
    pub not_started: Vec<Theme>,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Whether the run succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Success)
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            RunStatus::Success => write!(
                f,
                "{} themes completed in {:.2?}",
                self.completed.len(),
                self.elapsed
            ),
            RunStatus::Failure {
                trigger,
                terminated,
            } => write!(
                f,
                "{trigger}; terminated {terminated} running workers, {} themes not started",
                self.not_started.len()
            ),
        }
    }
}

/// Runs tasks through a bounded pool of workers.
#[derive(Debug)]
pub struct Orchestrator<L> {
    launcher: L,
    config: PoolConfig,
    state: RunState,
}

struct Running<H> {
    theme: Theme,
    handle: H,
}

impl<L: WorkerLauncher> Orchestrator<L> {
    /// Use `launcher` to start workers, `config.workers` at a time.
    pub fn new(launcher: L, config: PoolConfig) -> Self {
        Self {
            launcher,
            config: PoolConfig {
                workers: config.workers.max(1),
                ..config
            },
            state: RunState::Initializing,
        }
    }

    /// The launcher, for inspection after a run.
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Current state.
    pub const fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!("orchestrator {:?} -> {next:?}", self.state);
            self.state = next;
        }
    }

    /// Run every task and report how the run ended.
    pub fn run(&mut self, tasks: Vec<ThemeTask>) -> PipelineReport {
        let started = Instant::now();
        self.transition(RunState::Initializing);
        let mut queue: VecDeque<ThemeTask> = tasks.into();
        let mut running: Vec<Running<L::Handle>> = Vec::new();
        let mut completed = Vec::new();
        let mut dispatched = Vec::new();
        let mut trigger: Option<TaskFailure> = None;

        loop {
            self.transition(RunState::Dispatching);
            while trigger.is_none() && running.len() < self.config.workers {
                let Some(task) = queue.pop_front() else {
                    break;
                };
                dispatched.push(task.theme);
                match self.launcher.launch(&task) {
                    Ok(handle) => {
                        info!("dispatched {}", task.theme);
                        running.push(Running {
                            theme: task.theme,
                            handle,
                        });
                    }
                    Err(err) => {
                        error!("{err}");
                        let failure = TaskFailure::new(task.theme, FailureStage::Crashed, err.to_string());
                        completed.push(TaskOutcome::Failed(failure.clone()));
                        trigger = Some(failure);
                    }
                }
            }
            if trigger.is_some() || running.is_empty() {
                break;
            }

            self.transition(RunState::Running);
            let progressed = self.poll_running(&mut running, &mut completed, &mut trigger);
            if trigger.is_some() {
                break;
            }
            if !progressed {
                thread::sleep(self.config.poll_interval);
            }
        }

        let mut terminated = Vec::new();
        let status = match trigger {
            Some(trigger) => {
                self.transition(RunState::Draining);
                for mut worker in running.drain(..) {
                    if let Some(outcome) = worker.handle.poll() {
                        log_outcome(&outcome);
                        completed.push(outcome);
                        continue;
                    }
                    warn!("terminating {}", worker.theme);
                    worker.handle.kill();
                    terminated.push(worker.theme);
                }
                RunStatus::Failure {
                    terminated: terminated.len(),
                    trigger,
                }
            }
            None => {
                self.transition(RunState::Completing);
                RunStatus::Success
            }
        };
        self.transition(RunState::Terminal);
        let report = PipelineReport {
            status,
            completed,
            dispatched,
            terminated,
            not_started: queue.into_iter().map(|task| task.theme).collect(),
            elapsed: started.elapsed(),
        };
        if report.is_success() {
            info!("{report}");
        } else {
            error!("{report}");
        }
        report
    }

    fn poll_running(
        &self,
        running: &mut Vec<Running<L::Handle>>,
        completed: &mut Vec<TaskOutcome>,
        trigger: &mut Option<TaskFailure>,
    ) -> bool {
        let mut progressed = false;
        let mut index = 0;
        while index < running.len() {
            let Some(worker) = running.get_mut(index) else {
                break;
            };
            let outcome = worker
                .handle
                .poll()
                .or_else(|| self.enforce_memory_ceiling(worker));
            let Some(outcome) = outcome else {
                index += 1;
                continue;
            };
            running.remove(index);
            progressed = true;
            log_outcome(&outcome);
            if let TaskOutcome::Failed(failure) = &outcome
                && trigger.is_none()
            {
                *trigger = Some(failure.clone());
            }
            completed.push(outcome);
        }
        progressed
    }

    fn enforce_memory_ceiling(&self, worker: &mut Running<L::Handle>) -> Option<TaskOutcome> {
        let limit = self.config.max_worker_memory?;
        let resident = worker.handle.resident_memory()?;
        if resident <= limit {
            return None;
        }
        error!(
            "{} uses {resident} bytes, above the {limit} byte ceiling",
            worker.theme
        );
        worker.handle.kill();
        Some(TaskOutcome::Failed(TaskFailure::new(
            worker.theme,
            FailureStage::ResourceLimit,
            format!("resident memory {resident} bytes exceeded the {limit} byte ceiling"),
        )))
    }
}

fn log_outcome(outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::Done(report) => {
            info!("{} done ({} files)", report.theme, report.outputs().count());
        }
        TaskOutcome::Failed(failure) => error!("{failure}"),
    }
}

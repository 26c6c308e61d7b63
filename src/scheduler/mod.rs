//! The cognitive job scheduler.
//!
//! A plugin registry plus a bounded priority queue, driven by a tokio cycle
//! loop. Jobs run concurrently up to `max_concurrent_jobs`, each under its
//! own timeout; failures re-queue while retries remain. The cycle tick
//! itself is single-threaded: dispatch happens on every tick and after every
//! completion, so a freed slot never waits for the next tick.
//!
//! Cancellation is advisory: plugin bodies get a [`CancellationFlag`] to
//! poll, the scheduler reclaims the slot immediately and does not wait for
//! native work to wind down.

pub mod plugins;

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use dashmap::DashMap;

use crate::ecan::EcanEngine;
use crate::error::{NoesisResult, PluginResult, SchedulerError};
use crate::pln::PlnEngine;
use crate::space::AtomSpace;

/// Monotonic job identifier.
pub type JobId = u64;

/// Tunables for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum jobs running at once.
    pub max_concurrent_jobs: usize,
    /// Cycle tick interval.
    pub cycle_interval: Duration,
    /// Timeout applied to jobs that don't specify their own.
    pub default_job_timeout: Duration,
    /// Bounded queue capacity.
    pub max_queue_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            cycle_interval: Duration::from_secs(1),
            default_job_timeout: Duration::from_secs(30),
            max_queue_size: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Plugins
// ---------------------------------------------------------------------------

/// Identity and default priority of a plugin.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    /// Registry key.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Default priority for jobs that don't specify one.
    pub priority: i32,
}

/// Advisory cancellation signal handed to plugin bodies.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested. Long-running plugin bodies should
    /// poll this between work units.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Core handles available to a running plugin.
///
/// Plugin outputs are returned by value; bodies must not stash references to
/// space internals across await points.
#[derive(Clone)]
pub struct PluginContext {
    pub space: Arc<AtomSpace>,
    pub ecan: Arc<EcanEngine>,
    pub pln: Arc<PlnEngine>,
    pub cancelled: CancellationFlag,
}

/// A periodic cognitive job body.
#[async_trait]
pub trait CognitivePlugin: Send + Sync {
    /// Identity and default priority.
    fn descriptor(&self) -> PluginDescriptor;

    /// Execute one job against the core.
    async fn execute(
        &self,
        ctx: PluginContext,
        params: serde_json::Value,
    ) -> PluginResult<serde_json::Value>;
}

/// Execution statistics for one plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginStats {
    /// Completed executions.
    pub executions: u64,
    /// Running average execution duration, in milliseconds.
    pub avg_duration_ms: f64,
}

struct RegisteredPlugin {
    descriptor: PluginDescriptor,
    plugin: Arc<dyn CognitivePlugin>,
    enabled: AtomicBool,
    stats: Mutex<PluginStats>,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A request to run a plugin.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Target plugin id.
    pub plugin_id: String,
    /// Opaque parameters handed to the plugin body.
    pub parameters: serde_json::Value,
    /// Priority; defaults to the plugin's registered priority.
    pub priority: Option<i32>,
    /// Per-job timeout; defaults to the scheduler's `default_job_timeout`.
    pub timeout: Option<Duration>,
    /// Retries granted on failure or timeout.
    pub max_retries: u32,
}

impl JobRequest {
    /// A request with defaults for everything but the plugin id.
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            parameters: serde_json::Value::Null,
            priority: None,
            timeout: None,
            max_retries: 0,
        }
    }

    /// Set the plugin parameters.
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set an explicit priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set an explicit timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Grant retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// The full record of a job's life.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub plugin_id: String,
    pub parameters: serde_json::Value,
    pub priority: i32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_count: u32,
    pub state: JobState,
    /// Plugin output on success.
    pub result: Option<serde_json::Value>,
    /// Error description on failure.
    pub error: Option<String>,
    /// Whether the terminal failure was a timeout.
    pub timed_out: bool,
    pub enqueued_at: Instant,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

/// Events emitted over the scheduler's broadcast channel.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// One cycle tick happened.
    Cycle {
        cycle: u64,
        queue_size: usize,
        running_count: usize,
    },
    /// A job completed successfully.
    JobCompleted { job_id: JobId, plugin_id: String },
    /// A job exhausted its retries.
    JobFailed {
        job_id: JobId,
        plugin_id: String,
        timed_out: bool,
    },
}

/// Aggregate scheduler counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStatistics {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub cycles: u64,
}

// ---------------------------------------------------------------------------
// Internal queue plumbing
// ---------------------------------------------------------------------------

/// Heap entry: highest priority first, FIFO among equal priorities.
#[derive(Debug, PartialEq, Eq)]
struct QueueEntry {
    priority: i32,
    seq: u64,
    job_id: JobId,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct RunningJob {
    handle: JoinHandle<()>,
    cancel: CancellationFlag,
}

enum Outcome {
    Success {
        value: serde_json::Value,
        duration: Duration,
    },
    Error {
        message: String,
    },
    TimedOut,
}

struct JobOutcome {
    job_id: JobId,
    outcome: Outcome,
}

/// Channels owned by a live cycle loop.
#[derive(Default)]
struct LoopHandles {
    done_tx: Option<mpsc::UnboundedSender<JobOutcome>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    loop_handle: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// The plugin scheduler.
pub struct CogScheduler {
    config: SchedulerConfig,
    space: Arc<AtomSpace>,
    ecan: Arc<EcanEngine>,
    pln: Arc<PlnEngine>,
    plugins: DashMap<String, Arc<RegisteredPlugin>>,
    jobs: DashMap<JobId, JobRecord>,
    queue: Mutex<BinaryHeap<QueueEntry>>,
    running: Mutex<HashMap<JobId, RunningJob>>,
    next_job_id: AtomicU64,
    next_seq: AtomicU64,
    cycle_count: AtomicU64,
    running_flag: AtomicBool,
    loop_handles: Mutex<LoopHandles>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl CogScheduler {
    /// Create a scheduler over the shared core handles.
    pub fn new(
        space: Arc<AtomSpace>,
        ecan: Arc<EcanEngine>,
        pln: Arc<PlnEngine>,
        config: SchedulerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            space,
            ecan,
            pln,
            plugins: DashMap::new(),
            jobs: DashMap::new(),
            queue: Mutex::new(BinaryHeap::new()),
            running: Mutex::new(HashMap::new()),
            next_job_id: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
            cycle_count: AtomicU64::new(0),
            running_flag: AtomicBool::new(false),
            loop_handles: Mutex::new(LoopHandles::default()),
            events,
        }
    }

    /// The scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Subscribe to scheduler events.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Plugin registry
    // -----------------------------------------------------------------------

    /// Register (or replace) a plugin under its descriptor id.
    pub fn register_plugin(&self, plugin: Arc<dyn CognitivePlugin>) {
        let descriptor = plugin.descriptor();
        tracing::debug!(plugin = %descriptor.id, "registering plugin");
        self.plugins.insert(
            descriptor.id.clone(),
            Arc::new(RegisteredPlugin {
                descriptor,
                plugin,
                enabled: AtomicBool::new(true),
                stats: Mutex::new(PluginStats::default()),
            }),
        );
    }

    /// Enable or disable a plugin.
    pub fn set_plugin_enabled(&self, plugin_id: &str, enabled: bool) -> NoesisResult<()> {
        let entry = self
            .plugins
            .get(plugin_id)
            .ok_or_else(|| SchedulerError::PluginNotFound {
                plugin_id: plugin_id.to_string(),
            })?;
        entry.enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    /// Registered plugin ids, sorted.
    pub fn plugin_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.plugins.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Execution statistics for a plugin.
    pub fn plugin_stats(&self, plugin_id: &str) -> Option<PluginStats> {
        self.plugins
            .get(plugin_id)
            .map(|e| *e.stats.lock().expect("stats lock poisoned"))
    }

    // -----------------------------------------------------------------------
    // Job intake
    // -----------------------------------------------------------------------

    /// Queue a job. Rejects when the plugin is unknown or disabled, or the
    /// bounded queue is at capacity.
    pub fn enqueue(&self, request: JobRequest) -> NoesisResult<JobId> {
        let priority = {
            let entry = self.plugins.get(&request.plugin_id).ok_or_else(|| {
                SchedulerError::PluginNotFound {
                    plugin_id: request.plugin_id.clone(),
                }
            })?;
            if !entry.enabled.load(Ordering::Relaxed) {
                return Err(SchedulerError::PluginDisabled {
                    plugin_id: request.plugin_id.clone(),
                }
                .into());
            }
            request.priority.unwrap_or(entry.descriptor.priority)
        };

        let mut queue = self.queue.lock().expect("queue lock poisoned");
        if queue.len() >= self.config.max_queue_size {
            return Err(SchedulerError::QueueFull {
                capacity: self.config.max_queue_size,
            }
            .into());
        }

        let id = self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = JobRecord {
            id,
            plugin_id: request.plugin_id,
            parameters: request.parameters,
            priority,
            timeout: request.timeout.unwrap_or(self.config.default_job_timeout),
            max_retries: request.max_retries,
            retry_count: 0,
            state: JobState::Queued,
            result: None,
            error: None,
            timed_out: false,
            enqueued_at: Instant::now(),
            started_at: None,
            finished_at: None,
        };
        self.jobs.insert(id, record);
        queue.push(QueueEntry {
            priority,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            job_id: id,
        });
        tracing::debug!(job_id = id, priority, "job enqueued");
        Ok(id)
    }

    /// Look up a job record.
    pub fn job(&self, job_id: JobId) -> Option<JobRecord> {
        self.jobs.get(&job_id).map(|r| r.value().clone())
    }

    /// Cancel a job. Returns whether the job was still cancellable.
    pub fn cancel(&self, job_id: JobId) -> NoesisResult<bool> {
        let mut record = self
            .jobs
            .get_mut(&job_id)
            .ok_or(SchedulerError::JobNotFound { job_id })?;
        match record.state {
            JobState::Queued => {
                record.state = JobState::Cancelled;
                record.finished_at = Some(Instant::now());
                Ok(true)
            }
            JobState::Running => {
                record.state = JobState::Cancelled;
                record.finished_at = Some(Instant::now());
                drop(record);
                if let Some(run) = self
                    .running
                    .lock()
                    .expect("running lock poisoned")
                    .remove(&job_id)
                {
                    run.cancel.cancel();
                    run.handle.abort();
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the cycle loop. Idempotent. Must be called from within a tokio
    /// runtime.
    pub fn start(self: &Arc<Self>) {
        if self.running_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        {
            let mut handles = self.loop_handles.lock().expect("loop lock poisoned");
            handles.done_tx = Some(done_tx);
            handles.shutdown_tx = Some(shutdown_tx);
        }

        let weak = Arc::downgrade(self);
        let cycle_interval = self.config.cycle_interval;
        let handle = tokio::spawn(Self::run_loop(weak, cycle_interval, done_rx, shutdown_rx));
        self.loop_handles
            .lock()
            .expect("loop lock poisoned")
            .loop_handle = Some(handle);
        tracing::info!("scheduler started");
    }

    /// Stop the cycle loop and cancel every running job.
    ///
    /// Idempotent and safe to call before `start`. Queued jobs stay queued
    /// and resume if the scheduler is started again.
    pub fn stop(&self) {
        let was_running = self.running_flag.swap(false, Ordering::SeqCst);

        {
            let mut handles = self.loop_handles.lock().expect("loop lock poisoned");
            if let Some(tx) = handles.shutdown_tx.take() {
                let _ = tx.send(true);
            }
            handles.done_tx = None;
            if let Some(handle) = handles.loop_handle.take() {
                handle.abort();
            }
        }

        let drained: Vec<(JobId, RunningJob)> = self
            .running
            .lock()
            .expect("running lock poisoned")
            .drain()
            .collect();
        for (job_id, run) in drained {
            run.cancel.cancel();
            run.handle.abort();
            if let Some(mut record) = self.jobs.get_mut(&job_id) {
                record.state = JobState::Cancelled;
                record.finished_at = Some(Instant::now());
            }
            tracing::debug!(job_id, "job cancelled on stop");
        }

        if was_running {
            tracing::info!("scheduler stopped");
        }
    }

    /// Whether the cycle loop is running.
    pub fn is_running(&self) -> bool {
        self.running_flag.load(Ordering::Relaxed)
    }

    /// The cycle loop holds only a weak reference, so dropping the last
    /// external handle to the scheduler also winds the loop down.
    async fn run_loop(
        weak: std::sync::Weak<Self>,
        cycle_interval: Duration,
        mut done_rx: mpsc::UnboundedReceiver<JobOutcome>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut tick = tokio::time::interval(cycle_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let Some(scheduler) = weak.upgrade() else { break };
                    scheduler.on_tick();
                }
                Some(outcome) = done_rx.recv() => {
                    let Some(scheduler) = weak.upgrade() else { break };
                    scheduler.handle_outcome(outcome);
                    scheduler.dispatch_ready();
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }
    }

    fn on_tick(self: &Arc<Self>) {
        self.dispatch_ready();
        let cycle = self.cycle_count.fetch_add(1, Ordering::Relaxed) + 1;
        let queue_size = self.queue.lock().expect("queue lock poisoned").len();
        let running_count = self.running.lock().expect("running lock poisoned").len();
        let _ = self.events.send(SchedulerEvent::Cycle {
            cycle,
            queue_size,
            running_count,
        });
    }

    // -----------------------------------------------------------------------
    // Dispatch & completion
    // -----------------------------------------------------------------------

    /// Fill free slots from the queue, highest priority first.
    fn dispatch_ready(self: &Arc<Self>) {
        let done_tx = match self.loop_handles.lock().expect("loop lock poisoned").done_tx {
            Some(ref tx) => tx.clone(),
            None => return,
        };

        loop {
            {
                let running = self.running.lock().expect("running lock poisoned");
                if running.len() >= self.config.max_concurrent_jobs {
                    return;
                }
            }
            let entry = match self.queue.lock().expect("queue lock poisoned").pop() {
                Some(entry) => entry,
                None => return,
            };

            // Skip entries whose job was cancelled while queued.
            let dispatch = {
                let Some(mut record) = self.jobs.get_mut(&entry.job_id) else {
                    continue;
                };
                if record.state != JobState::Queued {
                    continue;
                }

                let Some(registered) = self.plugins.get(&record.plugin_id) else {
                    record.state = JobState::Failed;
                    record.error = Some(format!("plugin not found: {}", record.plugin_id));
                    record.finished_at = Some(Instant::now());
                    continue;
                };
                if !registered.enabled.load(Ordering::Relaxed) {
                    record.state = JobState::Failed;
                    record.error = Some(format!("plugin disabled: {}", record.plugin_id));
                    record.finished_at = Some(Instant::now());
                    continue;
                }

                record.state = JobState::Running;
                record.started_at = Some(Instant::now());
                (
                    Arc::clone(&registered.plugin),
                    record.parameters.clone(),
                    record.timeout,
                )
            };
            let (plugin, params, timeout) = dispatch;

            let cancel = CancellationFlag::default();
            let ctx = PluginContext {
                space: Arc::clone(&self.space),
                ecan: Arc::clone(&self.ecan),
                pln: Arc::clone(&self.pln),
                cancelled: cancel.clone(),
            };
            let job_id = entry.job_id;
            let tx = done_tx.clone();
            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let outcome = match tokio::time::timeout(timeout, plugin.execute(ctx, params)).await
                {
                    Ok(Ok(value)) => Outcome::Success {
                        value,
                        duration: started.elapsed(),
                    },
                    Ok(Err(err)) => Outcome::Error {
                        message: err.to_string(),
                    },
                    Err(_) => Outcome::TimedOut,
                };
                let _ = tx.send(JobOutcome { job_id, outcome });
            });

            self.running
                .lock()
                .expect("running lock poisoned")
                .insert(job_id, RunningJob { handle, cancel });
            tracing::debug!(job_id, "job dispatched");
        }
    }

    fn handle_outcome(&self, JobOutcome { job_id, outcome }: JobOutcome) {
        let Some(run) = self
            .running
            .lock()
            .expect("running lock poisoned")
            .remove(&job_id)
        else {
            // Already cancelled; the late outcome is dropped.
            return;
        };

        // The record drives everything; collect follow-up work first and act
        // on queues/events only after the record reference is released.
        enum FollowUp {
            Completed { plugin_id: String, duration: Duration },
            Requeue { priority: i32 },
            Failed { plugin_id: String, timed_out: bool },
            None,
        }

        let follow_up = {
            let Some(mut record) = self.jobs.get_mut(&job_id) else {
                return;
            };
            if record.state != JobState::Running {
                FollowUp::None
            } else {
                match outcome {
                    Outcome::Success { value, duration } => {
                        record.state = JobState::Completed;
                        record.result = Some(value);
                        record.finished_at = Some(Instant::now());
                        FollowUp::Completed {
                            plugin_id: record.plugin_id.clone(),
                            duration,
                        }
                    }
                    Outcome::Error { .. } | Outcome::TimedOut => {
                        let timed_out = matches!(outcome, Outcome::TimedOut);
                        if timed_out {
                            run.cancel.cancel();
                        }
                        if record.retry_count < record.max_retries {
                            record.retry_count += 1;
                            record.state = JobState::Queued;
                            record.started_at = None;
                            tracing::debug!(
                                job_id,
                                retry = record.retry_count,
                                timed_out,
                                "job re-queued"
                            );
                            FollowUp::Requeue {
                                priority: record.priority,
                            }
                        } else {
                            record.state = JobState::Failed;
                            record.timed_out = timed_out;
                            record.error = Some(match outcome {
                                Outcome::TimedOut => "timed out".to_string(),
                                Outcome::Error { message } => message,
                                Outcome::Success { .. } => unreachable!(),
                            });
                            record.finished_at = Some(Instant::now());
                            FollowUp::Failed {
                                plugin_id: record.plugin_id.clone(),
                                timed_out,
                            }
                        }
                    }
                }
            }
        };

        match follow_up {
            FollowUp::Completed {
                plugin_id,
                duration,
            } => {
                if let Some(registered) = self.plugins.get(&plugin_id) {
                    let mut stats = registered.stats.lock().expect("stats lock poisoned");
                    stats.executions += 1;
                    let n = stats.executions as f64;
                    let ms = duration.as_secs_f64() * 1000.0;
                    stats.avg_duration_ms += (ms - stats.avg_duration_ms) / n;
                }
                tracing::debug!(job_id, plugin = %plugin_id, "job completed");
                let _ = self.events.send(SchedulerEvent::JobCompleted { job_id, plugin_id });
            }
            FollowUp::Requeue { priority } => {
                self.queue
                    .lock()
                    .expect("queue lock poisoned")
                    .push(QueueEntry {
                        priority,
                        seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                        job_id,
                    });
            }
            FollowUp::Failed {
                plugin_id,
                timed_out,
            } => {
                tracing::warn!(job_id, plugin = %plugin_id, timed_out, "job failed");
                let _ = self.events.send(SchedulerEvent::JobFailed {
                    job_id,
                    plugin_id,
                    timed_out,
                });
            }
            FollowUp::None => {}
        }
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    /// Aggregate counts over every job this scheduler has seen.
    pub fn statistics(&self) -> SchedulerStatistics {
        let mut stats = SchedulerStatistics {
            cycles: self.cycle_count.load(Ordering::Relaxed),
            ..Default::default()
        };
        for entry in self.jobs.iter() {
            match entry.value().state {
                JobState::Queued => stats.queued += 1,
                JobState::Running => stats.running += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
                JobState::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}

impl std::fmt::Debug for CogScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CogScheduler")
            .field("plugins", &self.plugins.len())
            .field("running", &self.is_running())
            .field("stats", &self.statistics())
            .finish()
    }
}

impl Drop for CogScheduler {
    fn drop(&mut self) {
        // The loop would notice the dead Weak on its next tick anyway;
        // aborting here makes teardown immediate.
        if let Ok(mut handles) = self.loop_handles.lock() {
            if let Some(handle) = handles.loop_handle.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecan::EcanConfig;
    use crate::pln::PlnConfig;
    use serde_json::json;

    /// Plugin that records the order its jobs execute in.
    struct RecorderPlugin {
        order: Arc<Mutex<Vec<i64>>>,
    }

    #[async_trait]
    impl CognitivePlugin for RecorderPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor {
                id: "recorder".into(),
                name: "Recorder".into(),
                priority: 0,
            }
        }

        async fn execute(
            &self,
            _ctx: PluginContext,
            params: serde_json::Value,
        ) -> PluginResult<serde_json::Value> {
            let tag = params["tag"].as_i64().unwrap_or(-1);
            self.order.lock().unwrap().push(tag);
            Ok(json!({ "tag": tag }))
        }
    }

    /// Plugin that never completes on its own.
    struct SleeperPlugin;

    #[async_trait]
    impl CognitivePlugin for SleeperPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor {
                id: "sleeper".into(),
                name: "Sleeper".into(),
                priority: 0,
            }
        }

        async fn execute(
            &self,
            _ctx: PluginContext,
            _params: serde_json::Value,
        ) -> PluginResult<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(serde_json::Value::Null)
        }
    }

    /// Plugin that fails until its counter runs out.
    struct FlakyPlugin {
        failures_left: Arc<AtomicU64>,
    }

    #[async_trait]
    impl CognitivePlugin for FlakyPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor {
                id: "flaky".into(),
                name: "Flaky".into(),
                priority: 0,
            }
        }

        async fn execute(
            &self,
            _ctx: PluginContext,
            _params: serde_json::Value,
        ) -> PluginResult<serde_json::Value> {
            let left = self.failures_left.load(Ordering::Relaxed);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::Relaxed);
                return Err(crate::error::PluginError::Internal {
                    message: "transient".into(),
                });
            }
            Ok(json!({ "ok": true }))
        }
    }

    fn test_scheduler(config: SchedulerConfig) -> Arc<CogScheduler> {
        let space = Arc::new(AtomSpace::new());
        let ecan = Arc::new(
            EcanEngine::new(
                Arc::clone(&space),
                EcanConfig {
                    rng_seed: Some(7),
                    ..Default::default()
                },
            )
            .unwrap(),
        );
        let pln = Arc::new(PlnEngine::new(Arc::clone(&space), PlnConfig::default()).unwrap());
        Arc::new(CogScheduler::new(space, ecan, pln, config))
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            cycle_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    /// Poll until the predicate holds or the deadline passes.
    async fn wait_until(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if predicate() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        predicate()
    }

    #[tokio::test]
    async fn jobs_run_in_priority_order_fifo_on_ties() {
        let scheduler = test_scheduler(SchedulerConfig {
            max_concurrent_jobs: 1,
            ..fast_config()
        });
        let order = Arc::new(Mutex::new(Vec::new()));
        scheduler.register_plugin(Arc::new(RecorderPlugin {
            order: Arc::clone(&order),
        }));

        for priority in [3, 1, 2] {
            scheduler
                .enqueue(
                    JobRequest::new("recorder")
                        .with_priority(priority as i32)
                        .with_parameters(json!({ "tag": priority })),
                )
                .unwrap();
        }
        scheduler.start();

        assert!(
            wait_until(Duration::from_secs(5), || order.lock().unwrap().len() == 3).await
        );
        assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
        scheduler.stop();
    }

    #[tokio::test]
    async fn equal_priorities_dispatch_fifo() {
        let scheduler = test_scheduler(SchedulerConfig {
            max_concurrent_jobs: 1,
            ..fast_config()
        });
        let order = Arc::new(Mutex::new(Vec::new()));
        scheduler.register_plugin(Arc::new(RecorderPlugin {
            order: Arc::clone(&order),
        }));

        for tag in [10, 20, 30] {
            scheduler
                .enqueue(
                    JobRequest::new("recorder")
                        .with_priority(5)
                        .with_parameters(json!({ "tag": tag })),
                )
                .unwrap();
        }
        scheduler.start();

        assert!(
            wait_until(Duration::from_secs(5), || order.lock().unwrap().len() == 3).await
        );
        assert_eq!(*order.lock().unwrap(), vec![10, 20, 30]);
        scheduler.stop();
    }

    #[tokio::test]
    async fn job_times_out_quickly() {
        let scheduler = test_scheduler(fast_config());
        scheduler.register_plugin(Arc::new(SleeperPlugin));
        let id = scheduler
            .enqueue(JobRequest::new("sleeper").with_timeout(Duration::from_millis(50)))
            .unwrap();
        scheduler.start();

        let failed = wait_until(Duration::from_millis(500), || {
            scheduler
                .job(id)
                .map(|j| j.state == JobState::Failed)
                .unwrap_or(false)
        })
        .await;
        assert!(failed, "job should fail within a small multiple of its deadline");

        let record = scheduler.job(id).unwrap();
        assert!(record.timed_out);
        assert_eq!(record.error.as_deref(), Some("timed out"));
        scheduler.stop();
    }

    #[tokio::test]
    async fn failed_jobs_retry_until_exhausted() {
        let scheduler = test_scheduler(fast_config());
        scheduler.register_plugin(Arc::new(FlakyPlugin {
            failures_left: Arc::new(AtomicU64::new(2)),
        }));
        let id = scheduler
            .enqueue(JobRequest::new("flaky").with_max_retries(3))
            .unwrap();
        scheduler.start();

        assert!(
            wait_until(Duration::from_secs(5), || {
                scheduler
                    .job(id)
                    .map(|j| j.state == JobState::Completed)
                    .unwrap_or(false)
            })
            .await
        );
        let record = scheduler.job(id).unwrap();
        assert_eq!(record.retry_count, 2);
        scheduler.stop();
    }

    #[tokio::test]
    async fn retries_exhausted_means_failed() {
        let scheduler = test_scheduler(fast_config());
        scheduler.register_plugin(Arc::new(FlakyPlugin {
            failures_left: Arc::new(AtomicU64::new(10)),
        }));
        let id = scheduler
            .enqueue(JobRequest::new("flaky").with_max_retries(1))
            .unwrap();
        scheduler.start();

        assert!(
            wait_until(Duration::from_secs(5), || {
                scheduler
                    .job(id)
                    .map(|j| j.state == JobState::Failed)
                    .unwrap_or(false)
            })
            .await
        );
        let record = scheduler.job(id).unwrap();
        assert_eq!(record.retry_count, 1);
        assert!(!record.timed_out);
        assert!(record.error.unwrap().contains("transient"));
        scheduler.stop();
    }

    #[tokio::test]
    async fn queue_rejects_when_full() {
        let scheduler = test_scheduler(SchedulerConfig {
            max_queue_size: 2,
            ..fast_config()
        });
        scheduler.register_plugin(Arc::new(SleeperPlugin));
        scheduler.enqueue(JobRequest::new("sleeper")).unwrap();
        scheduler.enqueue(JobRequest::new("sleeper")).unwrap();
        let err = scheduler.enqueue(JobRequest::new("sleeper")).unwrap_err();
        assert!(err.to_string().contains("queue is full"));
    }

    #[tokio::test]
    async fn unknown_and_disabled_plugins_rejected() {
        let scheduler = test_scheduler(fast_config());
        assert!(scheduler.enqueue(JobRequest::new("ghost")).is_err());

        scheduler.register_plugin(Arc::new(SleeperPlugin));
        scheduler.set_plugin_enabled("sleeper", false).unwrap();
        let err = scheduler.enqueue(JobRequest::new("sleeper")).unwrap_err();
        assert!(err.to_string().contains("disabled"));

        scheduler.set_plugin_enabled("sleeper", true).unwrap();
        assert!(scheduler.enqueue(JobRequest::new("sleeper")).is_ok());
    }

    #[tokio::test]
    async fn stop_cancels_running_jobs_and_is_idempotent() {
        let scheduler = test_scheduler(fast_config());
        scheduler.register_plugin(Arc::new(SleeperPlugin));
        let id = scheduler.enqueue(JobRequest::new("sleeper")).unwrap();
        scheduler.start();

        assert!(
            wait_until(Duration::from_secs(5), || {
                scheduler
                    .job(id)
                    .map(|j| j.state == JobState::Running)
                    .unwrap_or(false)
            })
            .await
        );

        scheduler.stop();
        assert_eq!(scheduler.job(id).unwrap().state, JobState::Cancelled);
        assert!(!scheduler.is_running());
        // Second stop is a no-op.
        scheduler.stop();
    }

    #[tokio::test]
    async fn stop_before_start_is_safe() {
        let scheduler = test_scheduler(fast_config());
        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn cancel_queued_job_never_runs() {
        let scheduler = test_scheduler(SchedulerConfig {
            max_concurrent_jobs: 1,
            ..fast_config()
        });
        scheduler.register_plugin(Arc::new(SleeperPlugin));
        let blocker = scheduler.enqueue(JobRequest::new("sleeper")).unwrap();
        let victim = scheduler.enqueue(JobRequest::new("sleeper")).unwrap();

        assert!(scheduler.cancel(victim).unwrap());
        scheduler.start();

        assert!(
            wait_until(Duration::from_secs(5), || {
                scheduler
                    .job(blocker)
                    .map(|j| j.state == JobState::Running)
                    .unwrap_or(false)
            })
            .await
        );
        assert_eq!(scheduler.job(victim).unwrap().state, JobState::Cancelled);
        scheduler.stop();
    }

    #[tokio::test]
    async fn cycle_events_are_emitted() {
        let scheduler = test_scheduler(fast_config());
        let mut events = scheduler.subscribe();
        scheduler.start();

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("a cycle event should arrive")
            .unwrap();
        assert!(matches!(event, SchedulerEvent::Cycle { .. }));
        scheduler.stop();
    }

    #[tokio::test]
    async fn plugin_stats_track_executions() {
        let scheduler = test_scheduler(fast_config());
        let order = Arc::new(Mutex::new(Vec::new()));
        scheduler.register_plugin(Arc::new(RecorderPlugin {
            order: Arc::clone(&order),
        }));
        for tag in 0..3 {
            scheduler
                .enqueue(JobRequest::new("recorder").with_parameters(json!({ "tag": tag })))
                .unwrap();
        }
        scheduler.start();

        assert!(
            wait_until(Duration::from_secs(5), || {
                scheduler
                    .plugin_stats("recorder")
                    .map(|s| s.executions == 3)
                    .unwrap_or(false)
            })
            .await
        );
        let stats = scheduler.plugin_stats("recorder").unwrap();
        assert!(stats.avg_duration_ms >= 0.0);
        scheduler.stop();
    }
}

//! Asynchronous planet generation on a dedicated thread pool.
//!
//! A scene loader submits a [`PlanetTask`], polls [`AsyncPlanetGenerator::status`]
//! until the planet is finished (meshes built, props placed, result sent), then
//! drains the result. Cancelled tasks never deliver a result.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use nebula_config::GenerationConfig;
use nebula_mesh::Shading;
use nebula_terrain::{DensitySource, PlanetAttributes};
use tracing::{debug, error, info, warn};

use crate::generator::{GeneratedPlanet, PlanetError, PlanetGenerator};
use crate::props::PropSettings;

/// A request to generate one planet.
#[derive(Clone)]
pub struct PlanetTask {
    /// Unique name, used to query status and to cancel.
    pub name: String,
    pub attributes: PlanetAttributes,
    pub shading: Shading,
    pub props: PropSettings,
    /// Producer of the density field.
    pub source: Arc<dyn DensitySource>,
}

impl fmt::Debug for PlanetTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanetTask")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("shading", &self.shading)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a submitted task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationStatus {
    Queued,
    Running,
    /// Meshes and props are done and the result is waiting in the channel.
    Finished,
    /// The pass failed; the error is waiting in the channel.
    Failed,
    Cancelled,
}

/// Outcome of one task, delivered through [`AsyncPlanetGenerator::drain_results`].
pub struct PlanetResult {
    pub name: String,
    pub outcome: Result<GeneratedPlanet, PlanetError>,
    /// Generation time in microseconds (for profiling).
    pub generation_time_us: u64,
    /// Cancellation flag of the run that produced this result.
    run: Run,
}

impl fmt::Debug for PlanetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanetResult")
            .field("name", &self.name)
            .field("outcome", &self.outcome)
            .field("generation_time_us", &self.generation_time_us)
            .finish_non_exhaustive()
    }
}

/// Identity of one submission: its cancellation flag.
///
/// A resubmitted name gets a fresh flag, so state left behind by an older
/// run never matches the current one.
type Run = Arc<AtomicBool>;

/// Status of the latest run submitted under a name.
struct TaskState {
    status: GenerationStatus,
    run: Run,
}

type StateMap = DashMap<String, TaskState>;

/// Internal wrapper that carries the task and its run identity.
struct QueuedTask {
    task: PlanetTask,
    run: Run,
}

/// Runs planet generation passes on background threads.
pub struct AsyncPlanetGenerator {
    /// Sender for submitting tasks. `None` once shut down.
    task_sender: Option<Sender<QueuedTask>>,
    /// Receiver for finished and failed planets.
    result_receiver: Receiver<PlanetResult>,
    states: Arc<StateMap>,
    /// Tasks queued or executing.
    in_flight: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<()>>,
}

impl AsyncPlanetGenerator {
    /// Spawn `thread_count` workers sharing a task queue of `queue_capacity`.
    pub fn new(thread_count: usize, queue_capacity: usize) -> Self {
        let (task_sender, task_receiver) = bounded::<QueuedTask>(queue_capacity.max(1));
        let (result_sender, result_receiver) = unbounded::<PlanetResult>();
        let states: Arc<StateMap> = Arc::new(DashMap::new());
        let in_flight = Arc::new(AtomicUsize::new(0));

        let workers = (0..thread_count.max(1))
            .map(|_| {
                let receiver = task_receiver.clone();
                let sender = result_sender.clone();
                let states = Arc::clone(&states);
                let in_flight = Arc::clone(&in_flight);

                std::thread::Builder::new()
                    .name("planet-gen-worker".into())
                    .spawn(move || {
                        while let Ok(queued) = receiver.recv() {
                            run_task(&queued, &states, &sender);
                            in_flight.fetch_sub(1, Ordering::Relaxed);
                        }
                    })
                    .expect("Failed to spawn planet generation worker thread")
            })
            .collect();

        info!("Planet generator started with {} workers", thread_count.max(1));

        Self {
            task_sender: Some(task_sender),
            result_receiver,
            states,
            in_flight,
            workers,
        }
    }

    /// Create a generator with a thread count based on CPU cores.
    pub fn with_defaults() -> Self {
        Self::new(default_thread_count(), 4)
    }

    /// Create a generator from the `generation` config section.
    pub fn from_config(config: &GenerationConfig) -> Self {
        let threads = match config.worker_threads {
            0 => default_thread_count(),
            n => n,
        };
        Self::new(threads, config.queue_capacity)
    }

    /// Queue a planet for background generation.
    ///
    /// Returns `Err(task)` if the queue is full, the generator is shut down,
    /// or a task with the same name is still queued or running.
    #[allow(clippy::result_large_err)]
    pub fn submit(&self, task: PlanetTask) -> Result<(), PlanetTask> {
        let Some(sender) = &self.task_sender else {
            return Err(task);
        };

        let name = task.name.clone();
        let run: Run = Arc::new(AtomicBool::new(false));
        let state = TaskState {
            status: GenerationStatus::Queued,
            run: Arc::clone(&run),
        };
        match self.states.entry(name.clone()) {
            Entry::Occupied(entry)
                if matches!(
                    entry.get().status,
                    GenerationStatus::Queued | GenerationStatus::Running
                ) =>
            {
                return Err(task);
            }
            Entry::Occupied(mut entry) => {
                entry.insert(state);
            }
            Entry::Vacant(entry) => {
                entry.insert(state);
            }
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        match sender.try_send(QueuedTask { task, run }) {
            Ok(()) => {
                debug!("Queued planet '{name}'");
                Ok(())
            }
            Err(TrySendError::Full(queued) | TrySendError::Disconnected(queued)) => {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                self.states
                    .remove_if(&name, |_, state| Arc::ptr_eq(&state.run, &queued.run));
                Err(queued.task)
            }
        }
    }

    /// Cancel a queued or running task.
    ///
    /// Returns `false` if the task is unknown or has already completed.
    pub fn cancel(&self, name: &str) -> bool {
        let Some(mut state) = self.states.get_mut(name) else {
            return false;
        };
        if !matches!(
            state.status,
            GenerationStatus::Queued | GenerationStatus::Running
        ) {
            return false;
        }
        state.status = GenerationStatus::Cancelled;
        state.run.store(true, Ordering::Relaxed);
        drop(state);

        info!("Cancelled planet '{name}'");
        true
    }

    pub fn status(&self, name: &str) -> Option<GenerationStatus> {
        self.states.get(name).map(|state| state.status)
    }

    /// `true` once every chunk mesh and prop of the planet is done.
    pub fn is_finished(&self, name: &str) -> bool {
        self.status(name) == Some(GenerationStatus::Finished)
    }

    /// Drain all delivered results. Results of runs cancelled after they
    /// were sent are dropped here.
    pub fn drain_results(&self) -> Vec<PlanetResult> {
        self.result_receiver
            .try_iter()
            .filter(|result| !result.run.load(Ordering::Relaxed))
            .collect()
    }

    /// Number of tasks currently in flight (queued or executing).
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Cancel everything outstanding, close the queue and join the workers.
    pub fn shutdown(&mut self) {
        let Some(sender) = self.task_sender.take() else {
            return;
        };
        for mut state in self.states.iter_mut() {
            if matches!(
                state.status,
                GenerationStatus::Queued | GenerationStatus::Running
            ) {
                state.status = GenerationStatus::Cancelled;
                state.run.store(true, Ordering::Relaxed);
            }
        }
        drop(sender);

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Planet generation worker panicked");
            }
        }
        debug!("Planet generator shut down");
    }
}

impl Drop for AsyncPlanetGenerator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn default_thread_count() -> usize {
    num_cpus::get().saturating_sub(2).max(1)
}

/// Update the status of `run`, unless the name now belongs to a newer run or
/// the run was cancelled in the meantime.
fn set_status(states: &StateMap, name: &str, run: &Run, status: GenerationStatus) {
    if let Some(mut state) = states.get_mut(name)
        && Arc::ptr_eq(&state.run, run)
        && state.status != GenerationStatus::Cancelled
    {
        state.status = status;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Generate one planet on the current worker thread.
///
/// A panicking pass is reported as a failure; the worker keeps serving.
fn run_task(queued: &QueuedTask, states: &StateMap, sender: &Sender<PlanetResult>) {
    let task = &queued.task;
    if queued.run.load(Ordering::Relaxed) {
        debug!("Skipping cancelled planet '{}'", task.name);
        return;
    }
    set_status(states, &task.name, &queued.run, GenerationStatus::Running);

    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        PlanetGenerator::new(task.attributes, task.shading)
            .with_props(task.props)
            .generate_with_cancel(task.source.as_ref(), &queued.run)
    }))
    .unwrap_or_else(|payload| Err(PlanetError::Panicked(panic_message(payload.as_ref()))));
    let elapsed = start.elapsed().as_micros() as u64;

    // Cancelled work never reaches the caller; partial meshes drop here.
    if matches!(outcome, Err(PlanetError::Cancelled)) || queued.run.load(Ordering::Relaxed) {
        debug!("Planet '{}' cancelled after {elapsed} us", task.name);
        return;
    }

    let status = match &outcome {
        Ok(_) => GenerationStatus::Finished,
        Err(err @ PlanetError::Panicked(_)) => {
            error!("Planet '{}' failed: {err}", task.name);
            GenerationStatus::Failed
        }
        Err(err) => {
            warn!("Planet '{}' failed: {err}", task.name);
            GenerationStatus::Failed
        }
    };
    let result = PlanetResult {
        name: task.name.clone(),
        outcome,
        generation_time_us: elapsed,
        run: Arc::clone(&queued.run),
    };
    if sender.send(result).is_ok() {
        set_status(states, &task.name, &queued.run, status);
    }
}

//! Time-sliced spike scheduler (§4.2, C2): a ring of per-step slots, one
//! advancement thread, and a worker pool that fans out slot delivery.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::config::SchedulerConfig;
use crate::error::{Result, RuntimeError};
use crate::event::{ForwardSpike, RetrogradeSpike};
use crate::graph::{Dendrite, Synapse};
use crate::worker_pool::SharedWorkerPool;

/// The scheduler's three lifecycle states (§4.2, "States").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
}

/// Receives events as the advancement loop drains each slot. Implemented
/// by the Propagator; held as a [`Weak`] reference so the Scheduler never
/// keeps the Propagator alive past its last external owner (§9, "shared
/// handles", avoiding the Scheduler<->Propagator reference cycle).
pub trait EventSink: Send + Sync {
    fn deliver_forward(&self, dendrite: &Arc<Dendrite>, event: ForwardSpike);
    fn deliver_retrograde(&self, synapse: &Arc<Synapse>, event: RetrogradeSpike);
}

#[derive(Debug, Default)]
struct SlotContents {
    forward: Vec<ForwardSpike>,
    retrograde: Vec<RetrogradeSpike>,
}

/// Advancement-loop timing statistics, in the spirit of the source
/// runtime's `PerfReport` (§4.2, implementation notes).
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfReport {
    pub iterations: u64,
    pub avg_iteration_us: f64,
    pub max_iteration_us: f64,
    pub last_drift_ms: f64,
}

#[derive(Debug, Default)]
struct PerfStats {
    iterations: u64,
    total_iteration_us: f64,
    max_iteration_us: f64,
    last_drift_ms: f64,
}

impl PerfStats {
    fn record(&mut self, iteration: Duration, drift_ms: f64) {
        let micros = iteration.as_secs_f64() * 1_000_000.0;
        self.iterations += 1;
        self.total_iteration_us += micros;
        if micros > self.max_iteration_us {
            self.max_iteration_us = micros;
        }
        self.last_drift_ms = drift_ms;
    }

    fn report(&self) -> PerfReport {
        let avg = if self.iterations == 0 {
            0.0
        } else {
            self.total_iteration_us / self.iterations as f64
        };
        PerfReport {
            iterations: self.iterations,
            avg_iteration_us: avg,
            max_iteration_us: self.max_iteration_us,
            last_drift_ms: self.last_drift_ms,
        }
    }
}

/// The time-sliced event ring and its single advancement thread.
pub struct SpikeScheduler {
    config: SchedulerConfig,
    ring: Vec<Mutex<SlotContents>>,
    /// Count of elapsed steps since construction; `current_time_ms =
    /// current_step * step_ms`, computed exactly rather than accumulated
    /// in floating point.
    current_step: AtomicU64,
    state: RwLock<SchedulerState>,
    real_time_sync: AtomicBool,
    dendrites: RwLock<std::collections::HashMap<u64, Arc<Dendrite>>>,
    synapses: RwLock<std::collections::HashMap<u64, Arc<Synapse>>>,
    sink: RwLock<Option<Weak<dyn EventSink>>>,
    worker_pool: SharedWorkerPool,
    perf: Mutex<PerfStats>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
    stop_requested: AtomicBool,
    /// Handle to this scheduler's own `Arc`, so the advancement thread can
    /// hold a strong reference without `start` needing to accept one.
    self_weak: Weak<SpikeScheduler>,
}

impl std::fmt::Debug for SpikeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpikeScheduler")
            .field("config", &self.config)
            .field("state", &*self.state.read())
            .field("current_step", &self.current_step.load(Ordering::SeqCst))
            .finish()
    }
}

impl SpikeScheduler {
    pub fn new(config: SchedulerConfig, worker_pool: SharedWorkerPool) -> Arc<Self> {
        let n_slots = config.n_slots as usize;
        Arc::new_cyclic(|self_weak| {
            let ring = (0..n_slots).map(|_| Mutex::new(SlotContents::default())).collect();
            Self {
                real_time_sync: AtomicBool::new(config.real_time_sync),
                config,
                ring,
                current_step: AtomicU64::new(0),
                state: RwLock::new(SchedulerState::Idle),
                dendrites: RwLock::new(std::collections::HashMap::new()),
                synapses: RwLock::new(std::collections::HashMap::new()),
                sink: RwLock::new(None),
                worker_pool,
                perf: Mutex::new(PerfStats::default()),
                thread_handle: Mutex::new(None),
                stop_requested: AtomicBool::new(false),
                self_weak: self_weak.clone(),
            }
        })
    }

    /// Install the sink events are delivered to. Stored as a [`Weak`]: the
    /// scheduler never extends the sink's lifetime.
    pub fn set_sink(&self, sink: &Arc<dyn EventSink>) {
        *self.sink.write() = Some(Arc::downgrade(sink));
    }

    pub fn register_dendrite(&self, dendrite: Arc<Dendrite>) {
        self.dendrites.write().entry(dendrite.id().raw()).or_insert(dendrite);
    }

    pub fn register_synapse(&self, synapse: Arc<Synapse>) {
        self.synapses.write().entry(synapse.id().raw()).or_insert(synapse);
    }

    pub fn is_running(&self) -> bool {
        *self.state.read() == SchedulerState::Running
    }

    pub fn set_real_time_sync(&self, enabled: bool) {
        self.real_time_sync.store(enabled, Ordering::SeqCst);
    }

    pub fn current_time_ms(&self) -> f64 {
        self.current_step.load(Ordering::SeqCst) as f64 * self.config.step_ms
    }

    pub fn horizon_ms(&self) -> f64 {
        self.config.horizon_ms()
    }

    pub fn perf_report(&self) -> PerfReport {
        self.perf.lock().report()
    }

    fn slot_index(&self, t: f64) -> u64 {
        (t / self.config.step_ms).floor() as u64 % self.config.n_slots
    }

    fn check_schedulable(&self, t: f64) -> Result<u64> {
        if !self.is_running() {
            return Err(RuntimeError::SchedulerNotRunning);
        }
        let current = self.current_time_ms();
        if t < current {
            return Err(RuntimeError::slot_already_drained(t, current));
        }
        let horizon = self.horizon_ms();
        // Strict: a distance of exactly one ring period aliases back onto the
        // slot index the advancement loop is draining this very step
        // (`slot_index` reduces mod n_slots), which would deliver the event
        // up to a full ring period early. Only distances strictly less than
        // one period are schedulable (§8, I1).
        if t - current >= horizon {
            return Err(RuntimeError::horizon_overflow(t, horizon));
        }
        Ok(self.slot_index(t))
    }

    /// Append a forward spike to its target slot (§4.2, `schedule_spike`).
    pub fn schedule_spike(&self, event: ForwardSpike) -> Result<()> {
        let idx = self.check_schedulable(event.scheduled_time_ms)?;
        self.ring[idx as usize].lock().forward.push(event);
        Ok(())
    }

    /// Append a retrograde spike to its target slot.
    pub fn schedule_retrograde_spike(&self, event: RetrogradeSpike) -> Result<()> {
        let idx = self.check_schedulable(event.scheduled_time_ms)?;
        self.ring[idx as usize].lock().retrograde.push(event);
        Ok(())
    }

    /// Idempotent: starts the advancement thread if Idle, a no-op if
    /// already Running or Stopping.
    pub fn start(&self) {
        let mut state = self.state.write();
        if *state != SchedulerState::Idle {
            return;
        }
        *state = SchedulerState::Running;
        self.stop_requested.store(false, Ordering::SeqCst);
        drop(state);

        let scheduler = self
            .self_weak
            .upgrade()
            .expect("scheduler's own Arc dropped out from under a live start() call");
        let handle = thread::Builder::new()
            .name("spikenet-scheduler".to_string())
            .spawn(move || scheduler.advancement_loop())
            .expect("failed to spawn spikenet scheduler thread");
        *self.thread_handle.lock() = Some(handle);
    }

    /// Idempotent: requests termination and joins the advancement thread.
    /// The thread finishes its current iteration before exiting
    /// (§4.2, "Cancellation").
    pub fn stop(&self) {
        {
            let mut state = self.state.write();
            if *state != SchedulerState::Running {
                return;
            }
            *state = SchedulerState::Stopping;
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
        *self.state.write() = SchedulerState::Idle;
    }

    fn advancement_loop(self: Arc<Self>) {
        let step = Duration::from_secs_f64((self.config.step_ms / 1000.0).max(0.0));
        let mut next_deadline = Instant::now() + step;

        while !self.stop_requested.load(Ordering::SeqCst) {
            let iter_start = Instant::now();
            let step_count = self.current_step.load(Ordering::SeqCst);
            let idx = (step_count % self.config.n_slots) as usize;

            let contents = {
                let mut slot = self.ring[idx].lock();
                mem::take(&mut *slot)
            };

            let sink = self.sink.read().as_ref().and_then(Weak::upgrade);
            if let Some(sink) = sink {
                for event in contents.forward {
                    let dendrite = self.dendrites.read().get(&event.dendrite_id.raw()).cloned();
                    let sink = Arc::clone(&sink);
                    if let Some(dendrite) = dendrite {
                        self.worker_pool.enqueue(move || {
                            sink.deliver_forward(&dendrite, event);
                        });
                    } else {
                        log::warn!("forward spike referenced unknown dendrite {}", event.dendrite_id);
                    }
                }
                for event in contents.retrograde {
                    let synapse = self.synapses.read().get(&event.synapse_id.raw()).cloned();
                    let sink = Arc::clone(&sink);
                    if let Some(synapse) = synapse {
                        self.worker_pool.enqueue(move || {
                            sink.deliver_retrograde(&synapse, event);
                        });
                    } else {
                        log::warn!("retrograde spike referenced unknown synapse {}", event.synapse_id);
                    }
                }
            } else if !contents.forward.is_empty() || !contents.retrograde.is_empty() {
                log::warn!("scheduler draining a slot with no sink installed; events dropped");
            }

            self.current_step.fetch_add(1, Ordering::SeqCst);

            let drift_ms = if self.real_time_sync.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now < next_deadline {
                    thread::sleep(next_deadline - now);
                }
                let drift = Instant::now().saturating_duration_since(next_deadline);
                next_deadline += step;
                drift.as_secs_f64() * 1000.0
            } else {
                next_deadline = Instant::now() + step;
                0.0
            };

            self.perf.lock().record(iter_start.elapsed(), drift_ms);
        }
    }
}

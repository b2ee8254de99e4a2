//! The spiking engine core: a time-sliced spike scheduler, the graph
//! registries it delivers into, the neuron firing model, and the STDP
//! propagator that ties the three together.
//!
//! Persistence and identifiers live one crate over, in `spikenet-storage`,
//! which this crate treats as an external collaborator (§0 of the design
//! notes): graph objects here are built from, and snapshot back into, the
//! storage crate's `*Record` JSON shapes, but never reach into its
//! internals.

pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod neuron;
pub mod propagator;
pub mod scheduler;
pub mod similarity;
pub mod worker_pool;

pub use config::{NeuronConfig, SchedulerConfig, SimilarityMetric, StdpParams};
pub use error::{Result, RuntimeError};
pub use event::{ForwardSpike, RetrogradeSpike};
pub use graph::{Axon, Dendrite, GraphRegistry, Synapse, WEIGHT_MAX, WEIGHT_MIN};
pub use neuron::Neuron;
pub use propagator::Propagator;
pub use scheduler::{EventSink, PerfReport, SchedulerState, SpikeScheduler};
pub use worker_pool::{SharedWorkerPool, TaskHandle, TaskOutcome, WorkerPool};

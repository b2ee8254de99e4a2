//! Construction-time validated parameter structs for the scheduler, the
//! STDP protocol, and newly constructed neurons.
//!
//! Mirrors the teacher runtime's `SimulationParams`/`STDPParams` shape:
//! a `new(..)` constructor that validates, a `Default` impl with sane
//! defaults, fluent `with_*` builders, and a standalone `validate()` so a
//! struct built via `Default` + field mutation can still be checked before use.

use crate::error::{Result, RuntimeError};

/// Parameters governing the time-sliced spike scheduler (§4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Number of ring slots. `n_slots * step_ms` is the look-ahead horizon.
    pub n_slots: u64,
    /// Width of one slot, in milliseconds.
    pub step_ms: f64,
    /// Number of delivery worker threads.
    pub n_workers: usize,
    /// Whether the advancement loop paces itself against wall-clock time.
    pub real_time_sync: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            n_slots: 10_000,
            step_ms: 1.0,
            n_workers: 8,
            real_time_sync: false,
        }
    }
}

impl SchedulerConfig {
    /// Build scheduler parameters, validating them up front.
    pub fn new(n_slots: u64, step_ms: f64, n_workers: usize) -> Result<Self> {
        let cfg = Self {
            n_slots,
            step_ms,
            n_workers,
            real_time_sync: false,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Toggle real-time wall-clock pacing.
    pub fn with_real_time_sync(mut self, enabled: bool) -> Self {
        self.real_time_sync = enabled;
        self
    }

    /// Set the worker thread count.
    pub fn with_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    /// The scheduler's look-ahead horizon in milliseconds.
    pub fn horizon_ms(&self) -> f64 {
        self.n_slots as f64 * self.step_ms
    }

    /// Validate the parameters, returning a descriptive error on failure.
    pub fn validate(&self) -> Result<()> {
        if self.n_slots == 0 {
            return Err(RuntimeError::invalid_config("n_slots", "must be > 0"));
        }
        if !(self.step_ms > 0.0) {
            return Err(RuntimeError::invalid_config("step_ms", "must be > 0.0"));
        }
        if self.n_workers == 0 {
            return Err(RuntimeError::invalid_config("n_workers", "must be > 0"));
        }
        Ok(())
    }
}

/// Parameters for the classical exponential STDP rule (§4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdpParams {
    /// LTP learning rate.
    pub a_plus: f64,
    /// LTD learning rate.
    pub a_minus: f64,
    /// LTP time constant, in milliseconds.
    pub tau_plus: f64,
    /// LTD time constant, in milliseconds.
    pub tau_minus: f64,
}

impl Default for StdpParams {
    fn default() -> Self {
        Self {
            a_plus: 0.05,
            a_minus: 0.05,
            tau_plus: 20.0,
            tau_minus: 20.0,
        }
    }
}

impl StdpParams {
    /// Build STDP parameters, validating them up front.
    pub fn new(a_plus: f64, a_minus: f64, tau_plus: f64, tau_minus: f64) -> Result<Self> {
        let params = Self { a_plus, a_minus, tau_plus, tau_minus };
        params.validate()?;
        Ok(params)
    }

    /// Validate the parameters, returning a descriptive error on failure.
    pub fn validate(&self) -> Result<()> {
        if !(self.a_plus > 0.0) {
            return Err(RuntimeError::invalid_config("a_plus", "must be > 0.0"));
        }
        if !(self.a_minus > 0.0) {
            return Err(RuntimeError::invalid_config("a_minus", "must be > 0.0"));
        }
        if !(self.tau_plus > 0.0) {
            return Err(RuntimeError::invalid_config("tau_plus", "must be > 0.0"));
        }
        if !(self.tau_minus > 0.0) {
            return Err(RuntimeError::invalid_config("tau_minus", "must be > 0.0"));
        }
        Ok(())
    }
}

/// Which pairwise similarity strategy a neuron's [`crate::neuron::Neuron`]
/// reads spikes through (§4.4, "Similarity metrics").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    /// Cosine similarity of the two histograms.
    Cosine,
    /// `1 / (1 + euclidean_distance)`.
    NormalizedEuclidean,
    /// Pearson correlation, shifted from `[-1, 1]` into `[0, 1]`.
    Pearson,
    /// Best lag-shifted normalized dot product within `+/- bucket_count/4`.
    CrossCorrelation,
    /// Classical histogram-intersection similarity.
    HistogramOverlap,
}

impl Default for SimilarityMetric {
    fn default() -> Self {
        SimilarityMetric::Cosine
    }
}

/// Parameters for constructing a new neuron (§3, "Neuron").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeuronConfig {
    /// Sliding retention horizon for the rolling spike window, in milliseconds.
    pub window_size_ms: f64,
    /// Similarity threshold in `[0, 1]`, read by consumer firing decisions.
    pub similarity_threshold: f64,
    /// Capacity of the reference pattern library.
    pub max_reference_patterns: usize,
    /// The strategy `best_similarity` computes under.
    pub similarity_metric: SimilarityMetric,
    /// Number of fixed-width histogram buckets spanning `[0, window_size_ms]`.
    pub bucket_count: usize,
}

impl Default for NeuronConfig {
    fn default() -> Self {
        Self {
            window_size_ms: 50.0,
            similarity_threshold: 0.8,
            max_reference_patterns: 20,
            similarity_metric: SimilarityMetric::Cosine,
            bucket_count: 32,
        }
    }
}

impl NeuronConfig {
    /// Build neuron parameters, validating them up front.
    pub fn new(window_size_ms: f64, similarity_threshold: f64, max_reference_patterns: usize) -> Result<Self> {
        let cfg = Self {
            window_size_ms,
            similarity_threshold,
            max_reference_patterns,
            ..Default::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Select the similarity metric.
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.similarity_metric = metric;
        self
    }

    /// Select the histogram bucket count.
    pub fn with_bucket_count(mut self, bucket_count: usize) -> Self {
        self.bucket_count = bucket_count;
        self
    }

    /// Validate the parameters, returning a descriptive error on failure.
    pub fn validate(&self) -> Result<()> {
        if !(self.window_size_ms > 0.0) {
            return Err(RuntimeError::invalid_config("window_size_ms", "must be > 0.0"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RuntimeError::invalid_config("similarity_threshold", "must be within [0, 1]"));
        }
        if self.max_reference_patterns == 0 {
            return Err(RuntimeError::invalid_config("max_reference_patterns", "must be > 0"));
        }
        if self.bucket_count == 0 {
            return Err(RuntimeError::invalid_config("bucket_count", "must be > 0"));
        }
        Ok(())
    }
}

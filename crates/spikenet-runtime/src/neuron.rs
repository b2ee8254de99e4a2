//! Neuron core (§4.4, C4): the rolling spike window, the learned reference
//! pattern library, and the similarity-based activation readout.
//!
//! The pattern library and rolling window of one neuron are guarded
//! together (§5): both live behind a single `parking_lot::Mutex`, so a
//! concurrent `insert_spike` and `best_similarity` on the same neuron
//! serialize, exactly as the concurrency model requires.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use spikenet_storage::entity::{Entity, NeuronRecord};
use spikenet_storage::{AxonId, DendriteId, NeuronId, StorageError, SynapseId};

use crate::config::{NeuronConfig, SimilarityMetric};
use crate::similarity;

/// How many `(arrival_time, dispatch_time)` pairs are retained per synapse
/// in [`NeuronState::incoming_spike_log`] before the oldest is dropped.
/// The log is conceptually bounded by the rolling window; this cap keeps a
/// burst of deliveries from one synapse from growing it unboundedly between
/// prunes.
const INCOMING_LOG_CAP_PER_SYNAPSE: usize = 256;

/// Mutable state guarded by one lock: the rolling window, the pattern
/// library, the emitted temporal signature, and firing bookkeeping.
#[derive(Debug)]
struct NeuronState {
    spikes: Vec<f64>,
    reference_patterns: VecDeque<Vec<f64>>,
    temporal_signature: Vec<f64>,
    incoming_spike_log: std::collections::HashMap<u64, VecDeque<(f64, f64)>>,
    last_fire_time: f64,
}

impl NeuronState {
    fn new() -> Self {
        Self {
            spikes: Vec::new(),
            reference_patterns: VecDeque::new(),
            // Defaults to a single 0 offset until a pattern has been learned.
            temporal_signature: vec![0.0],
            incoming_spike_log: std::collections::HashMap::new(),
            last_fire_time: f64::NEG_INFINITY,
        }
    }
}

/// A stateful neuron: rolling spike window, learned pattern library, and the
/// fixed temporal signature it emits on every forward firing (§3, "Neuron").
#[derive(Debug)]
pub struct Neuron {
    id: NeuronId,
    axon_id: RwLock<AxonId>,
    dendrite_ids: RwLock<Vec<DendriteId>>,
    config: NeuronConfig,
    state: Mutex<NeuronState>,
}

impl Neuron {
    /// Construct a fresh neuron with no axon, no dendrites, an empty
    /// window, and an empty pattern library. `axon_id`/`dendrite_ids` are
    /// filled in as the surrounding graph is wired up.
    pub fn new(id: NeuronId, config: NeuronConfig) -> Self {
        Self {
            id,
            axon_id: RwLock::new(AxonId::NONE),
            dendrite_ids: RwLock::new(Vec::new()),
            config,
            state: Mutex::new(NeuronState::new()),
        }
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn axon_id(&self) -> AxonId {
        *self.axon_id.read()
    }

    /// Point this neuron at its (at most one) outgoing axon.
    pub fn set_axon_id(&self, axon_id: AxonId) {
        *self.axon_id.write() = axon_id;
    }

    pub fn dendrite_ids(&self) -> Vec<DendriteId> {
        self.dendrite_ids.read().clone()
    }

    /// Append a dendrite that targets this neuron.
    pub fn add_dendrite_id(&self, dendrite_id: DendriteId) {
        let mut ids = self.dendrite_ids.write();
        if !ids.contains(&dendrite_id) {
            ids.push(dendrite_id);
        }
    }

    pub fn config(&self) -> NeuronConfig {
        self.config
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.config.similarity_threshold
    }

    pub fn last_fire_time(&self) -> f64 {
        self.state.lock().last_fire_time
    }

    /// Overwrite the last-fire timestamp directly. Exposed for consumers
    /// (and scenario tests, per §8 S3/S4) that drive postsynaptic firing
    /// decisions from outside the core.
    pub fn set_last_fire_time(&self, t: f64) {
        self.state.lock().last_fire_time = t;
    }

    pub fn temporal_signature(&self) -> Vec<f64> {
        self.state.lock().temporal_signature.clone()
    }

    /// Current contents of the rolling spike window, oldest first.
    pub fn spikes(&self) -> Vec<f64> {
        self.state.lock().spikes.clone()
    }

    pub fn reference_pattern_count(&self) -> usize {
        self.state.lock().reference_patterns.len()
    }

    /// Append `t` to the rolling window, then discard everything older
    /// than `t - window_size_ms` (§4.4, "Rolling window"). `spikes` is kept
    /// sorted on insert since callers only ever advance the clock forward.
    pub fn insert_spike(&self, t: f64) {
        let mut state = self.state.lock();
        let insert_at = state.spikes.partition_point(|&s| s <= t);
        state.spikes.insert(insert_at, t);
        let cutoff = t - self.config.window_size_ms;
        state.spikes.retain(|&s| s >= cutoff);
    }

    /// Empty the rolling window. Used by the propagator's
    /// `clear_all_spikes` between training examples.
    pub fn clear_spikes(&self) {
        self.state.lock().spikes.clear();
    }

    /// Snapshot the current window (shifted so its earliest spike sits at
    /// 0), insert it into the pattern library, evict the oldest pattern if
    /// capacity is exceeded, and refresh the temporal signature from the
    /// newly learned pattern (§4.4, "Pattern library").
    pub fn learn_current_pattern(&self) {
        let mut state = self.state.lock();
        if state.spikes.is_empty() {
            return;
        }
        let origin = state.spikes[0];
        let pattern: Vec<f64> = state.spikes.iter().map(|&s| s - origin).collect();

        state.reference_patterns.push_back(pattern.clone());
        while state.reference_patterns.len() > self.config.max_reference_patterns {
            state.reference_patterns.pop_front();
        }
        state.temporal_signature = pattern;
    }

    /// `max_i similarity(current_window, reference_patterns[i])`, or 0 if
    /// the library is empty (§4.4, "Similarity"; §8 I7 bounds the result to
    /// `[0, 1]`).
    pub fn best_similarity(&self) -> f64 {
        let state = self.state.lock();
        if state.reference_patterns.is_empty() {
            return 0.0;
        }
        let window_hist = similarity::histogram(&state.spikes, self.config.window_size_ms, self.config.bucket_count);
        state
            .reference_patterns
            .iter()
            .map(|pattern| {
                let pattern_hist = similarity::histogram(pattern, self.config.window_size_ms, self.config.bucket_count);
                similarity::similarity(self.config.similarity_metric, &window_hist, &pattern_hist)
            })
            .fold(0.0_f64, f64::max)
    }

    /// Stamp `last_fire_time = t` and insert the temporal signature offsets
    /// into the rolling window as a self-record (§4.4, "Firing decision").
    pub fn fire_signature(&self, t: f64) {
        let signature = {
            let mut state = self.state.lock();
            state.last_fire_time = t;
            state.temporal_signature.clone()
        };
        for delta in signature {
            self.insert_spike(t + delta);
        }
    }

    /// Append a `(arrival_time, dispatch_time)` pair to the per-synapse
    /// incoming log, bounded by a hard cap (§4.4, "Postsynaptic bookkeeping").
    pub fn record_incoming_spike(&self, synapse_id: SynapseId, arrival_time: f64, dispatch_time: f64) {
        let mut state = self.state.lock();
        let cutoff = arrival_time - self.config.window_size_ms;
        let log = state
            .incoming_spike_log
            .entry(synapse_id.raw())
            .or_insert_with(VecDeque::new);
        log.push_back((arrival_time, dispatch_time));
        while log.front().is_some_and(|&(t, _)| t < cutoff) {
            log.pop_front();
        }
        while log.len() > INCOMING_LOG_CAP_PER_SYNAPSE {
            log.pop_front();
        }
    }

    /// Recent `(arrival_time, dispatch_time)` pairs logged for one synapse.
    pub fn incoming_spike_log(&self, synapse_id: SynapseId) -> Vec<(f64, f64)> {
        self.state
            .lock()
            .incoming_spike_log
            .get(&synapse_id.raw())
            .map(|log| log.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot this neuron's persistable fields into a [`NeuronRecord`].
    /// The rolling window and pattern library are runtime-only state and
    /// are not part of the persisted payload (§9, "position" design note
    /// and the storage crate's own doc comment on `NeuronRecord`).
    pub fn to_record(&self) -> NeuronRecord {
        NeuronRecord {
            id: self.id.raw(),
            axon_id: self.axon_id().raw(),
            dendrite_ids: self.dendrite_ids().iter().map(|d| d.raw()).collect(),
            window_size_ms: self.config.window_size_ms,
            similarity_threshold: self.config.similarity_threshold,
            max_reference_patterns: self.config.max_reference_patterns as u32,
            similarity_metric: metric_name(self.config.similarity_metric).to_string(),
            position: None,
        }
    }

    /// Rebuild a fresh (empty window, empty pattern library) neuron from a
    /// persisted record.
    pub fn from_record(record: &NeuronRecord) -> Self {
        let metric = metric_from_name(&record.similarity_metric);
        let config = NeuronConfig {
            window_size_ms: record.window_size_ms,
            similarity_threshold: record.similarity_threshold,
            max_reference_patterns: record.max_reference_patterns.max(1) as usize,
            similarity_metric: metric,
            ..NeuronConfig::default()
        };
        let neuron = Self::new(NeuronId::new(record.id), config);
        neuron.set_axon_id(AxonId::new(record.axon_id));
        for &d in &record.dendrite_ids {
            neuron.add_dendrite_id(DendriteId::new(d));
        }
        neuron
    }
}

fn metric_name(metric: SimilarityMetric) -> &'static str {
    match metric {
        SimilarityMetric::Cosine => "cosine",
        SimilarityMetric::NormalizedEuclidean => "normalized_euclidean",
        SimilarityMetric::Pearson => "pearson",
        SimilarityMetric::CrossCorrelation => "cross_correlation",
        SimilarityMetric::HistogramOverlap => "histogram_overlap",
    }
}

fn metric_from_name(name: &str) -> SimilarityMetric {
    match name {
        "normalized_euclidean" => SimilarityMetric::NormalizedEuclidean,
        "pearson" => SimilarityMetric::Pearson,
        "cross_correlation" => SimilarityMetric::CrossCorrelation,
        "histogram_overlap" => SimilarityMetric::HistogramOverlap,
        _ => SimilarityMetric::Cosine,
    }
}

impl Entity for Neuron {
    fn entity_id(&self) -> u64 {
        self.id.raw()
    }

    fn type_name(&self) -> &'static str {
        "Neuron"
    }

    fn to_json(&self) -> Result<String, StorageError> {
        self.to_record().to_json()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
        self
    }
}

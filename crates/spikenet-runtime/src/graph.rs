//! The propagation graph (§3, §4.3, C3): axons, dendrites, synapses, and
//! the registries that hold live instances of all four plus neurons,
//! keyed by raw id, with a reverse index from dendrite to inbound synapse
//! for O(degree) reward-modulated STDP sweeps (§4.5).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use spikenet_storage::entity::{AxonRecord, DendriteRecord, Entity, SynapseRecord};
use spikenet_storage::{AxonId, DendriteId, NeuronId, StorageError, SynapseId};

use crate::config::NeuronConfig;
use crate::error::{Result, RuntimeError};
use crate::neuron::Neuron;

/// An axon: the single outbound fiber of one neuron, fanning out to zero
/// or more synapses.
#[derive(Debug)]
pub struct Axon {
    id: AxonId,
    source_neuron_id: NeuronId,
    outbound_synapse_ids: RwLock<Vec<SynapseId>>,
}

impl Axon {
    pub fn new(id: AxonId, source_neuron_id: NeuronId) -> Self {
        Self {
            id,
            source_neuron_id,
            outbound_synapse_ids: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> AxonId {
        self.id
    }

    pub fn source_neuron_id(&self) -> NeuronId {
        self.source_neuron_id
    }

    pub fn outbound_synapse_ids(&self) -> Vec<SynapseId> {
        self.outbound_synapse_ids.read().clone()
    }

    fn add_outbound_synapse(&self, synapse_id: SynapseId) {
        self.outbound_synapse_ids.write().push(synapse_id);
    }

    pub fn to_record(&self) -> AxonRecord {
        AxonRecord {
            id: self.id.raw(),
            source_neuron_id: self.source_neuron_id.raw(),
            synapse_ids: self.outbound_synapse_ids().iter().map(|s| s.raw()).collect(),
            position: None,
        }
    }
}

impl Entity for Axon {
    fn entity_id(&self) -> u64 {
        self.id.raw()
    }
    fn type_name(&self) -> &'static str {
        "Axon"
    }
    fn to_json(&self) -> std::result::Result<String, StorageError> {
        self.to_record().to_json()
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A dendrite: one of a neuron's inbound fibers, receiving from zero or
/// more synapses.
#[derive(Debug)]
pub struct Dendrite {
    id: DendriteId,
    target_neuron_id: NeuronId,
    inbound_synapse_ids: RwLock<Vec<SynapseId>>,
}

impl Dendrite {
    pub fn new(id: DendriteId, target_neuron_id: NeuronId) -> Self {
        Self {
            id,
            target_neuron_id,
            inbound_synapse_ids: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> DendriteId {
        self.id
    }

    pub fn target_neuron_id(&self) -> NeuronId {
        self.target_neuron_id
    }

    pub fn inbound_synapse_ids(&self) -> Vec<SynapseId> {
        self.inbound_synapse_ids.read().clone()
    }

    fn add_inbound_synapse(&self, synapse_id: SynapseId) {
        self.inbound_synapse_ids.write().push(synapse_id);
    }

    pub fn to_record(&self) -> DendriteRecord {
        DendriteRecord {
            id: self.id.raw(),
            target_neuron_id: self.target_neuron_id.raw(),
            synapse_ids: self.inbound_synapse_ids().iter().map(|s| s.raw()).collect(),
            position: None,
        }
    }
}

impl Entity for Dendrite {
    fn entity_id(&self) -> u64 {
        self.id.raw()
    }
    fn type_name(&self) -> &'static str {
        "Dendrite"
    }
    fn to_json(&self) -> std::result::Result<String, StorageError> {
        self.to_record().to_json()
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A synapse: the weighted, delayed connection from one axon to one
/// dendrite. Weight is mutable (STDP); delay is fixed at construction
/// (§3, "Synapse").
#[derive(Debug)]
pub struct Synapse {
    id: SynapseId,
    axon_id: AxonId,
    dendrite_id: DendriteId,
    weight: Mutex<f64>,
    delay_ms: f64,
}

/// Synapse weights are clamped to this range by every STDP update (§4.5,
/// "Weight bounds").
pub const WEIGHT_MIN: f64 = 0.0;
pub const WEIGHT_MAX: f64 = 2.0;

impl Synapse {
    pub fn new(id: SynapseId, axon_id: AxonId, dendrite_id: DendriteId, weight: f64, delay_ms: f64) -> Self {
        Self {
            id,
            axon_id,
            dendrite_id,
            weight: Mutex::new(weight.clamp(WEIGHT_MIN, WEIGHT_MAX)),
            delay_ms,
        }
    }

    pub fn id(&self) -> SynapseId {
        self.id
    }

    pub fn axon_id(&self) -> AxonId {
        self.axon_id
    }

    pub fn dendrite_id(&self) -> DendriteId {
        self.dendrite_id
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn weight(&self) -> f64 {
        *self.weight.lock()
    }

    /// Apply `delta` to the weight, clamping into `[WEIGHT_MIN, WEIGHT_MAX]`.
    pub fn adjust_weight(&self, delta: f64) -> f64 {
        let mut weight = self.weight.lock();
        *weight = (*weight + delta).clamp(WEIGHT_MIN, WEIGHT_MAX);
        *weight
    }

    pub fn to_record(&self) -> SynapseRecord {
        SynapseRecord {
            id: self.id.raw(),
            axon_id: self.axon_id.raw(),
            dendrite_id: self.dendrite_id.raw(),
            weight: self.weight(),
            delay: self.delay_ms,
            position: None,
        }
    }
}

impl Entity for Synapse {
    fn entity_id(&self) -> u64 {
        self.id.raw()
    }
    fn type_name(&self) -> &'static str {
        "Synapse"
    }
    fn to_json(&self) -> std::result::Result<String, StorageError> {
        self.to_record().to_json()
    }
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Owns live instances of every neuron, axon, dendrite, and synapse, plus
/// the reverse index from dendrite to its inbound synapses that the
/// reward-modulated STDP sweep walks in O(degree) (§4.5).
#[derive(Debug, Default)]
pub struct GraphRegistry {
    neurons: RwLock<HashMap<u64, Arc<Neuron>>>,
    axons: RwLock<HashMap<u64, Arc<Axon>>>,
    dendrites: RwLock<HashMap<u64, Arc<Dendrite>>>,
    synapses: RwLock<HashMap<u64, Arc<Synapse>>>,
    /// dendrite id -> inbound synapse ids, maintained incrementally as
    /// synapses register.
    reverse_index: RwLock<HashMap<u64, Vec<SynapseId>>>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh neuron, constructing it with `config`.
    pub fn register_neuron(&self, id: NeuronId, config: NeuronConfig) -> Arc<Neuron> {
        let neuron = Arc::new(Neuron::new(id, config));
        self.neurons.write().insert(id.raw(), neuron.clone());
        neuron
    }

    /// Register a rehydrated neuron (e.g. loaded from persistence).
    pub fn insert_neuron(&self, neuron: Arc<Neuron>) {
        self.neurons.write().insert(neuron.id().raw(), neuron);
    }

    pub fn get_neuron(&self, id: NeuronId) -> Result<Arc<Neuron>> {
        self.neurons
            .read()
            .get(&id.raw())
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_id("Neuron", id.raw()))
    }

    /// Create a new axon for `source_neuron_id` and point the neuron at it.
    /// A neuron has at most one axon (§3); calling this twice replaces the
    /// neuron's axon pointer but leaves the stale `Axon` registered.
    pub fn register_axon(&self, id: AxonId, source_neuron_id: NeuronId) -> Result<Arc<Axon>> {
        let neuron = self.get_neuron(source_neuron_id)?;
        let axon = Arc::new(Axon::new(id, source_neuron_id));
        self.axons.write().insert(id.raw(), axon.clone());
        neuron.set_axon_id(id);
        Ok(axon)
    }

    pub fn get_axon(&self, id: AxonId) -> Result<Arc<Axon>> {
        self.axons
            .read()
            .get(&id.raw())
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_id("Axon", id.raw()))
    }

    /// Create a new dendrite targeting `target_neuron_id` and register it
    /// against the neuron's dendrite list.
    pub fn register_dendrite(&self, id: DendriteId, target_neuron_id: NeuronId) -> Result<Arc<Dendrite>> {
        let neuron = self.get_neuron(target_neuron_id)?;
        let dendrite = Arc::new(Dendrite::new(id, target_neuron_id));
        self.dendrites.write().insert(id.raw(), dendrite.clone());
        neuron.add_dendrite_id(id);
        Ok(dendrite)
    }

    pub fn get_dendrite(&self, id: DendriteId) -> Result<Arc<Dendrite>> {
        self.dendrites
            .read()
            .get(&id.raw())
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_id("Dendrite", id.raw()))
    }

    /// Create a synapse from `axon_id` to `dendrite_id`, wiring both
    /// endpoints' adjacency lists and the dendrite->synapse reverse index.
    pub fn register_synapse(
        &self,
        id: SynapseId,
        axon_id: AxonId,
        dendrite_id: DendriteId,
        weight: f64,
        delay_ms: f64,
    ) -> Result<Arc<Synapse>> {
        let axon = self.get_axon(axon_id)?;
        let dendrite = self.get_dendrite(dendrite_id)?;
        let synapse = Arc::new(Synapse::new(id, axon_id, dendrite_id, weight, delay_ms));
        self.synapses.write().insert(id.raw(), synapse.clone());
        axon.add_outbound_synapse(id);
        dendrite.add_inbound_synapse(id);
        self.reverse_index
            .write()
            .entry(dendrite_id.raw())
            .or_default()
            .push(id);
        Ok(synapse)
    }

    pub fn get_synapse(&self, id: SynapseId) -> Result<Arc<Synapse>> {
        self.synapses
            .read()
            .get(&id.raw())
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_id("Synapse", id.raw()))
    }

    /// Every synapse delivering into `dendrite_id`, via the reverse index.
    pub fn dendrite_inbound_synapses(&self, dendrite_id: DendriteId) -> Vec<SynapseId> {
        self.reverse_index
            .read()
            .get(&dendrite_id.raw())
            .cloned()
            .unwrap_or_default()
    }

    /// Every synapse feeding any of `neuron_id`'s dendrites, via the
    /// reverse index — the O(degree) walk `apply_reward_modulated_stdp`
    /// (§4.5) depends on.
    pub fn neuron_inbound_synapses(&self, neuron_id: NeuronId) -> Result<Vec<SynapseId>> {
        let neuron = self.get_neuron(neuron_id)?;
        let reverse_index = self.reverse_index.read();
        Ok(neuron
            .dendrite_ids()
            .into_iter()
            .flat_map(|d| reverse_index.get(&d.raw()).cloned().unwrap_or_default())
            .collect())
    }

    /// Every registered neuron id, in arbitrary order.
    pub fn neuron_ids(&self) -> Vec<NeuronId> {
        self.neurons.read().keys().map(|&raw| NeuronId::new(raw)).collect()
    }

    pub fn neuron_count(&self) -> usize {
        self.neurons.read().len()
    }

    pub fn synapse_count(&self) -> usize {
        self.synapses.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikenet_storage::EntityKind;

    fn ids(kind: EntityKind, offset: u64) -> u64 {
        kind.range_start() + offset
    }

    #[test]
    fn register_synapse_wires_both_endpoints_and_reverse_index() {
        let registry = GraphRegistry::new();
        let pre = registry.register_neuron(NeuronId::new(ids(EntityKind::Neuron, 1)), NeuronConfig::default());
        let post = registry.register_neuron(NeuronId::new(ids(EntityKind::Neuron, 2)), NeuronConfig::default());

        let axon_id = AxonId::new(ids(EntityKind::Axon, 1));
        registry.register_axon(axon_id, pre.id()).unwrap();
        let dendrite_id = DendriteId::new(ids(EntityKind::Dendrite, 1));
        registry.register_dendrite(dendrite_id, post.id()).unwrap();

        let synapse_id = SynapseId::new(ids(EntityKind::Synapse, 1));
        registry.register_synapse(synapse_id, axon_id, dendrite_id, 0.5, 2.0).unwrap();

        let axon = registry.get_axon(axon_id).unwrap();
        assert_eq!(axon.outbound_synapse_ids(), vec![synapse_id]);

        let dendrite = registry.get_dendrite(dendrite_id).unwrap();
        assert_eq!(dendrite.inbound_synapse_ids(), vec![synapse_id]);

        assert_eq!(registry.dendrite_inbound_synapses(dendrite_id), vec![synapse_id]);
        assert_eq!(registry.neuron_inbound_synapses(post.id()).unwrap(), vec![synapse_id]);
    }

    #[test]
    fn unknown_lookups_are_reported() {
        let registry = GraphRegistry::new();
        let err = registry.get_neuron(NeuronId::new(ids(EntityKind::Neuron, 99))).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownId { kind: "Neuron", .. }));
    }

    #[test]
    fn synapse_weight_clamps_on_construction_and_adjustment() {
        let synapse = Synapse::new(
            SynapseId::new(ids(EntityKind::Synapse, 1)),
            AxonId::new(ids(EntityKind::Axon, 1)),
            DendriteId::new(ids(EntityKind::Dendrite, 1)),
            5.0,
            1.0,
        );
        assert_eq!(synapse.weight(), WEIGHT_MAX);
        synapse.adjust_weight(-100.0);
        assert_eq!(synapse.weight(), WEIGHT_MIN);
    }
}

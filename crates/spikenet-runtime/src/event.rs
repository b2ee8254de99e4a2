//! The two event variants carried through the scheduler's ring (§3,
//! "Events"). Created at firing time, owned by the slot they reside in
//! until a worker delivers them, then dropped.

use spikenet_storage::{DendriteId, NeuronId, SynapseId};

/// An action potential travelling forward from a synapse to a dendrite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForwardSpike {
    pub synapse_id: SynapseId,
    pub dendrite_id: DendriteId,
    pub scheduled_time_ms: f64,
    pub amplitude: f64,
    pub dispatch_time_ms: f64,
}

/// A retrograde signal carrying the timing information STDP needs, travelling
/// backwards along the synapse it was dispatched from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrogradeSpike {
    pub synapse_id: SynapseId,
    pub postsynaptic_neuron_id: NeuronId,
    pub scheduled_time_ms: f64,
    pub dispatch_time_ms: f64,
    pub last_firing_time_ms: f64,
}

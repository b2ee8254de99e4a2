//! The Propagator (§4.5, C5): behavioural glue between the scheduler, the
//! graph registries, and the neuron core. Owns STDP parameters and exposes
//! the two primary runtime operations — forward firing and reward-modulated
//! bulk weight updates.

use std::sync::Arc;

use parking_lot::RwLock;

use spikenet_storage::NeuronId;

use crate::config::StdpParams;
use crate::error::Result;
use crate::event::{ForwardSpike, RetrogradeSpike};
use crate::graph::{Dendrite, GraphRegistry, Synapse};
use crate::scheduler::{EventSink, SpikeScheduler};

/// Composes the graph registries and the scheduler, and carries the STDP
/// parameters every retrograde delivery reads.
pub struct Propagator {
    registry: Arc<GraphRegistry>,
    scheduler: Arc<SpikeScheduler>,
    stdp: RwLock<StdpParams>,
}

impl Propagator {
    pub fn new(registry: Arc<GraphRegistry>, scheduler: Arc<SpikeScheduler>, stdp: StdpParams) -> Arc<Self> {
        Arc::new(Self {
            registry,
            scheduler,
            stdp: RwLock::new(stdp),
        })
    }

    pub fn registry(&self) -> &Arc<GraphRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<SpikeScheduler> {
        &self.scheduler
    }

    pub fn stdp_params(&self) -> StdpParams {
        *self.stdp.read()
    }

    /// Replace the STDP parameters wholesale (§4.5: "exposed as tunable
    /// parameters with a single setter").
    pub fn set_stdp_params(&self, params: StdpParams) {
        *self.stdp.write() = params;
    }

    /// Fire `neuron_id` at `t_fire`: schedule every forward and retrograde
    /// event its outbound synapses and temporal signature imply, then
    /// stamp the neuron's own firing bookkeeping last (§4.5, steps 1-6,
    /// and §9's fixed retrograde-before-`fire_signature` ordering decision).
    ///
    /// Returns the number of events successfully scheduled. A neuron with
    /// no axon is a valid terminal neuron and returns 0.
    pub fn fire_neuron(&self, neuron_id: NeuronId, t_fire: f64) -> Result<usize> {
        let neuron = self.registry.get_neuron(neuron_id)?;
        let axon_id = neuron.axon_id();
        if axon_id.is_none() {
            neuron.fire_signature(t_fire);
            return Ok(0);
        }
        let axon = match self.registry.get_axon(axon_id) {
            Ok(axon) => axon,
            Err(err) => {
                log::warn!("neuron {neuron_id} has a dangling axon reference: {err}");
                neuron.fire_signature(t_fire);
                return Ok(0);
            }
        };

        let signature = neuron.temporal_signature();
        let mut scheduled = 0usize;

        for synapse_id in axon.outbound_synapse_ids() {
            let synapse = match self.registry.get_synapse(synapse_id) {
                Ok(synapse) => synapse,
                Err(_) => {
                    log::warn!("axon {axon_id} references unknown synapse {synapse_id}, skipping");
                    continue;
                }
            };
            let delay = synapse.delay_ms();
            let weight = synapse.weight();

            for &delta in &signature {
                let forward = ForwardSpike {
                    synapse_id,
                    dendrite_id: synapse.dendrite_id(),
                    scheduled_time_ms: t_fire + delay + delta,
                    amplitude: weight,
                    dispatch_time_ms: t_fire,
                };
                match self.scheduler.schedule_spike(forward) {
                    Ok(()) => scheduled += 1,
                    Err(err) => log::warn!("forward spike on synapse {synapse_id} not scheduled: {err}"),
                }
            }

            let retrograde = RetrogradeSpike {
                synapse_id,
                postsynaptic_neuron_id: self
                    .registry
                    .get_dendrite(synapse.dendrite_id())
                    .map(|d| d.target_neuron_id())
                    .unwrap_or(NeuronId::NONE),
                scheduled_time_ms: t_fire + delay,
                dispatch_time_ms: t_fire,
                last_firing_time_ms: t_fire,
            };
            match self.scheduler.schedule_retrograde_spike(retrograde) {
                Ok(()) => scheduled += 1,
                Err(err) => log::warn!("retrograde spike on synapse {synapse_id} not scheduled: {err}"),
            }
        }

        neuron.fire_signature(t_fire);
        Ok(scheduled)
    }

    /// Apply the classical exponential STDP rule to one synapse given
    /// `Δt = last_firing_time − dispatch_time` (§4.5, "STDP update").
    fn apply_stdp(&self, synapse: &Synapse, delta_t: f64) {
        let params = self.stdp_params();
        let delta_w = if delta_t > 0.0 {
            params.a_plus * (-delta_t / params.tau_plus).exp()
        } else if delta_t < 0.0 {
            -params.a_minus * (delta_t / params.tau_minus).exp()
        } else {
            0.0
        };
        if delta_w != 0.0 {
            synapse.adjust_weight(delta_w);
        }
    }

    /// Reward-modulated bulk update (§4.5): walks the reverse index in
    /// O(degree) and nudges every inbound synapse toward the reward.
    pub fn apply_reward_modulated_stdp(&self, neuron_id: NeuronId, reward_factor: f64) -> Result<usize> {
        let synapse_ids = self.registry.neuron_inbound_synapses(neuron_id)?;
        let a_plus = self.stdp_params().a_plus;
        let mut updated = 0usize;
        for synapse_id in synapse_ids {
            if let Ok(synapse) = self.registry.get_synapse(synapse_id) {
                synapse.adjust_weight(a_plus * (reward_factor - 1.0));
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// `best_similarity()` for every id, in input order; 0 for an unknown
    /// neuron id rather than a hard failure (§4.5, "Layer activation readout").
    pub fn layer_activation(&self, neuron_ids: &[NeuronId]) -> Vec<f64> {
        neuron_ids
            .iter()
            .map(|&id| {
                self.registry
                    .get_neuron(id)
                    .map(|n| n.best_similarity())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    /// Clear every registered neuron's rolling window. Used between
    /// training examples.
    pub fn clear_all_spikes(&self) {
        for neuron_id in self.registry.neuron_ids() {
            if let Ok(neuron) = self.registry.get_neuron(neuron_id) {
                neuron.clear_spikes();
            }
        }
    }
}

impl EventSink for Propagator {
    /// Forward delivery (§4.5): insert the spike into the target neuron's
    /// rolling window and log it against the originating synapse.
    fn deliver_forward(&self, dendrite: &Arc<Dendrite>, event: ForwardSpike) {
        let neuron_id = dendrite.target_neuron_id();
        match self.registry.get_neuron(neuron_id) {
            Ok(neuron) => {
                neuron.insert_spike(event.scheduled_time_ms);
                neuron.record_incoming_spike(event.synapse_id, event.scheduled_time_ms, event.dispatch_time_ms);
            }
            Err(err) => log::warn!("forward delivery to dendrite {} failed: {err}", dendrite.id()),
        }
    }

    /// Retrograde delivery (§4.5): apply the STDP update implied by the
    /// synapse's postsynaptic neuron's current `last_fire_time`.
    fn deliver_retrograde(&self, synapse: &Arc<Synapse>, event: RetrogradeSpike) {
        let last_fire_time = match self.registry.get_neuron(event.postsynaptic_neuron_id) {
            Ok(neuron) => neuron.last_fire_time(),
            Err(_) => event.last_firing_time_ms,
        };
        if last_fire_time.is_finite() {
            let delta_t = last_fire_time - event.dispatch_time_ms;
            self.apply_stdp(synapse, delta_t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NeuronConfig, SchedulerConfig};
    use crate::worker_pool::WorkerPool;
    use spikenet_storage::{AxonId, DendriteId, EntityKind, SynapseId};
    use std::thread;
    use std::time::Duration;

    fn wire_pair(registry: &Arc<GraphRegistry>) -> (NeuronId, NeuronId, SynapseId) {
        let pre = registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 1), NeuronConfig::default());
        let post = registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 2), NeuronConfig::default());
        let axon_id = AxonId::new(EntityKind::Axon.range_start() + 1);
        registry.register_axon(axon_id, pre.id()).unwrap();
        let dendrite_id = DendriteId::new(EntityKind::Dendrite.range_start() + 1);
        registry.register_dendrite(dendrite_id, post.id()).unwrap();
        let synapse_id = SynapseId::new(EntityKind::Synapse.range_start() + 1);
        registry.register_synapse(synapse_id, axon_id, dendrite_id, 1.0, 1.0).unwrap();
        (pre.id(), post.id(), synapse_id)
    }

    fn make_propagator() -> (Arc<Propagator>, Arc<GraphRegistry>) {
        let registry = Arc::new(GraphRegistry::new());
        let pool = Arc::new(WorkerPool::new(2));
        let scheduler = SpikeScheduler::new(SchedulerConfig::new(1000, 1.0, 2).unwrap(), pool);
        let propagator = Propagator::new(registry.clone(), scheduler.clone(), StdpParams::default());
        let sink: Arc<dyn EventSink> = propagator.clone();
        scheduler.set_sink(&sink);
        (propagator, registry)
    }

    #[test]
    fn fire_neuron_with_no_axon_returns_zero_and_fires_signature() {
        let (propagator, registry) = make_propagator();
        let neuron = registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 5), NeuronConfig::default());
        let count = propagator.fire_neuron(neuron.id(), 10.0).unwrap();
        assert_eq!(count, 0);
        assert_eq!(neuron.last_fire_time(), 10.0);
    }

    #[test]
    fn fire_neuron_schedules_forward_and_retrograde_per_synapse() {
        let (propagator, registry) = make_propagator();
        let (pre_id, _post_id, synapse_id) = wire_pair(&registry);

        propagator.scheduler().register_dendrite(registry.get_dendrite(registry.get_synapse(synapse_id).unwrap().dendrite_id()).unwrap());
        propagator.scheduler().register_synapse(registry.get_synapse(synapse_id).unwrap());
        propagator.scheduler().start();

        let t_fire = propagator.scheduler().current_time_ms();
        let count = propagator.fire_neuron(pre_id, t_fire).unwrap();
        // Default temporal signature is a single {0} offset: one forward + one retrograde.
        assert_eq!(count, 2);

        propagator.scheduler().stop();
    }

    #[test]
    fn stdp_strengthens_weight_when_post_fires_after_dispatch() {
        let (propagator, registry) = make_propagator();
        let (_pre_id, post_id, synapse_id) = wire_pair(&registry);
        let synapse = registry.get_synapse(synapse_id).unwrap();

        // S3 scenario: dispatch_time = 10, last_firing_time = 15 => delta_t = 5.
        registry.get_neuron(post_id).unwrap().set_last_fire_time(15.0);

        let event = RetrogradeSpike {
            synapse_id: synapse.id(),
            postsynaptic_neuron_id: post_id,
            scheduled_time_ms: 11.0,
            dispatch_time_ms: 10.0,
            last_firing_time_ms: 10.0,
        };
        propagator.deliver_retrograde(&synapse, event);

        let expected = 1.0 + 0.05 * (-5.0_f64 / 20.0).exp();
        assert!((synapse.weight() - expected).abs() < 1e-9, "weight was {}", synapse.weight());
    }

    #[test]
    fn stdp_weakens_weight_when_post_fires_before_dispatch() {
        let (propagator, registry) = make_propagator();
        let (_pre_id, post_id, synapse_id) = wire_pair(&registry);
        let synapse = registry.get_synapse(synapse_id).unwrap();

        // S4 scenario: dispatch_time = 10, last_firing_time = 5 => delta_t = -5.
        registry.get_neuron(post_id).unwrap().set_last_fire_time(5.0);

        let event = RetrogradeSpike {
            synapse_id: synapse.id(),
            postsynaptic_neuron_id: post_id,
            scheduled_time_ms: 11.0,
            dispatch_time_ms: 10.0,
            last_firing_time_ms: 10.0,
        };
        propagator.deliver_retrograde(&synapse, event);

        let expected = 1.0 - 0.05 * (-5.0_f64 / 20.0).exp();
        assert!((synapse.weight() - expected).abs() < 1e-9, "weight was {}", synapse.weight());
    }

    #[test]
    fn reward_modulated_update_touches_only_inbound_synapses() {
        let (propagator, registry) = make_propagator();
        let (_pre_id, post_id, synapse_id) = wire_pair(&registry);
        propagator.apply_reward_modulated_stdp(post_id, 2.0).unwrap();
        let synapse = registry.get_synapse(synapse_id).unwrap();
        assert!((synapse.weight() - 1.05).abs() < 1e-9);
    }

    #[test]
    fn layer_activation_preserves_input_order_and_defaults_unknown_to_zero() {
        let (propagator, registry) = make_propagator();
        let a = registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 1), NeuronConfig::default());
        let unknown = NeuronId::new(EntityKind::Neuron.range_start() + 999);
        let activations = propagator.layer_activation(&[a.id(), unknown]);
        assert_eq!(activations, vec![0.0, 0.0]);
    }

    #[test]
    fn clear_all_spikes_empties_every_neuron_window() {
        let (propagator, registry) = make_propagator();
        let n = registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 1), NeuronConfig::default());
        n.insert_spike(1.0);
        assert_eq!(n.spikes().len(), 1);
        propagator.clear_all_spikes();
        assert_eq!(n.spikes().len(), 0);
    }

    #[test]
    fn fire_neuron_on_unknown_id_is_reported() {
        let (propagator, registry) = make_propagator();
        let unknown = NeuronId::new(EntityKind::Neuron.range_start() + 777);
        assert!(propagator.fire_neuron(unknown, 1.0).is_err());
        let _ = &registry;
        thread::sleep(Duration::from_millis(1));
    }
}

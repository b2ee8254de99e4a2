//! End-to-end scenarios (§8 S1, S2, S5, S6): a real scheduler thread,
//! real worker pool, and the full Propagator wired together exactly as a
//! consumer would assemble them.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use spikenet_runtime::{
    EventSink, GraphRegistry, NeuronConfig, Propagator, SchedulerConfig, SpikeScheduler, StdpParams,
    WorkerPool,
};
use spikenet_storage::{AxonId, DendriteId, EntityKind, NeuronId, SynapseId};

/// Every scenario in §8 starts the scheduler with these parameters unless
/// stated otherwise.
fn scenario_scheduler_config() -> SchedulerConfig {
    SchedulerConfig::new(1000, 1.0, 4).unwrap()
}

struct Harness {
    propagator: Arc<Propagator>,
    registry: Arc<GraphRegistry>,
    scheduler: Arc<SpikeScheduler>,
}

fn build_harness(config: SchedulerConfig) -> Harness {
    let registry = Arc::new(GraphRegistry::new());
    let pool = Arc::new(WorkerPool::new(4));
    let scheduler = SpikeScheduler::new(config, pool);
    let propagator = Propagator::new(registry.clone(), scheduler.clone(), StdpParams::default());
    let sink: Arc<dyn EventSink> = propagator.clone();
    scheduler.set_sink(&sink);
    Harness { propagator, registry, scheduler }
}

fn wait_until(mut cond: impl FnMut() -> bool, description: &str) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("timed out waiting for: {description}");
}

/// (S1) Single synapse, single spike: weight is unchanged when the
/// retrograde marker arrives at `Δt = 0`.
#[test]
fn s1_single_synapse_single_spike() {
    let harness = build_harness(scenario_scheduler_config());
    let a = harness.registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start()), NeuronConfig::default());
    let b = harness.registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 1), NeuronConfig::default());

    let axon = harness.registry.register_axon(AxonId::new(EntityKind::Axon.range_start()), a.id()).unwrap();
    let dendrite = harness.registry.register_dendrite(DendriteId::new(EntityKind::Dendrite.range_start()), b.id()).unwrap();
    let synapse = harness
        .registry
        .register_synapse(SynapseId::new(EntityKind::Synapse.range_start()), axon.id(), dendrite.id(), 1.0, 3.0)
        .unwrap();

    harness.scheduler.register_dendrite(dendrite.clone());
    harness.scheduler.register_synapse(synapse.clone());
    harness.scheduler.start();

    harness.propagator.fire_neuron(a.id(), 10.0).unwrap();

    wait_until(|| harness.scheduler.current_time_ms() >= 14.0, "scheduler to reach t=14");
    wait_until(|| !b.spikes().is_empty(), "B to receive its forward spike");

    assert_eq!(b.spikes(), vec![13.0]);
    assert_eq!(synapse.weight(), 1.0, "retrograde at Δt=0 must not change the weight");

    harness.scheduler.stop();
}

/// (S2) Signature propagation: a three-offset temporal signature produces
/// three forward spikes at the synapse's delay plus each offset.
#[test]
fn s2_signature_propagation() {
    let harness = build_harness(scenario_scheduler_config());
    let a = harness.registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start()), NeuronConfig::default());
    let b = harness.registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 1), NeuronConfig::default());
    {
        // Force A's temporal signature to {0, 2, 5} as the scenario specifies.
        a.insert_spike(0.0);
        a.insert_spike(2.0);
        a.insert_spike(5.0);
        a.learn_current_pattern();
        a.clear_spikes();
    }

    let axon = harness.registry.register_axon(AxonId::new(EntityKind::Axon.range_start()), a.id()).unwrap();
    let dendrite = harness.registry.register_dendrite(DendriteId::new(EntityKind::Dendrite.range_start()), b.id()).unwrap();
    let synapse = harness
        .registry
        .register_synapse(SynapseId::new(EntityKind::Synapse.range_start()), axon.id(), dendrite.id(), 1.0, 3.0)
        .unwrap();

    harness.scheduler.register_dendrite(dendrite.clone());
    harness.scheduler.register_synapse(synapse.clone());
    harness.scheduler.start();

    harness.propagator.fire_neuron(a.id(), 10.0).unwrap();

    wait_until(|| harness.scheduler.current_time_ms() >= 19.0, "scheduler to reach t=19");
    wait_until(|| b.spikes().len() >= 3, "B to receive all three forward spikes");

    assert_eq!(b.spikes(), vec![13.0, 15.0, 18.0]);

    harness.scheduler.stop();
}

/// (S5) Reward-modulated update touches exactly the inbound synapses of
/// the target neuron and no others.
#[test]
fn s5_reward_modulated_update_touches_only_inbound_synapses() {
    let harness = build_harness(scenario_scheduler_config());
    let target = harness
        .registry
        .register_neuron(NeuronId::new(EntityKind::Neuron.range_start()), NeuronConfig::default());
    let bystander = harness
        .registry
        .register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 1), NeuronConfig::default());

    let mut inbound_ids = Vec::new();
    for i in 0..100u64 {
        let pre = harness
            .registry
            .register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 10 + i), NeuronConfig::default());
        let axon = harness
            .registry
            .register_axon(AxonId::new(EntityKind::Axon.range_start() + i), pre.id())
            .unwrap();
        let dendrite = harness.registry.register_dendrite(DendriteId::new(EntityKind::Dendrite.range_start() + i), target.id()).unwrap();
        let synapse = harness
            .registry
            .register_synapse(SynapseId::new(EntityKind::Synapse.range_start() + i), axon.id(), dendrite.id(), 0.5, 1.0)
            .unwrap();
        inbound_ids.push(synapse.id());
    }

    // One unrelated synapse onto `bystander`, which must stay untouched.
    let outside_pre = harness
        .registry
        .register_neuron(NeuronId::new(EntityKind::Neuron.range_start() + 500), NeuronConfig::default());
    let outside_axon = harness
        .registry
        .register_axon(AxonId::new(EntityKind::Axon.range_start() + 500), outside_pre.id())
        .unwrap();
    let outside_dendrite = harness
        .registry
        .register_dendrite(DendriteId::new(EntityKind::Dendrite.range_start() + 500), bystander.id())
        .unwrap();
    let outside_synapse = harness
        .registry
        .register_synapse(SynapseId::new(EntityKind::Synapse.range_start() + 500), outside_axon.id(), outside_dendrite.id(), 0.5, 1.0)
        .unwrap();

    let updated = harness.propagator.apply_reward_modulated_stdp(target.id(), 2.5).unwrap();
    assert_eq!(updated, 100);

    for id in inbound_ids {
        let synapse = harness.registry.get_synapse(id).unwrap();
        assert!((synapse.weight() - 0.575).abs() < 1e-9);
    }
    assert_eq!(outside_synapse.weight(), 0.5, "bystander's synapse must be untouched");
}

/// (S6) Horizon overflow: scheduling just inside the horizon succeeds,
/// just beyond it fails.
#[test]
fn s6_horizon_overflow_boundary() {
    let registry = Arc::new(GraphRegistry::new());
    let pool = Arc::new(WorkerPool::new(2));
    let scheduler = SpikeScheduler::new(SchedulerConfig::new(10, 1.0, 2).unwrap(), pool);
    let propagator = Propagator::new(registry, scheduler.clone(), StdpParams::default());
    let sink: Arc<dyn EventSink> = propagator;
    scheduler.set_sink(&sink);
    scheduler.start();

    let dendrite_id = DendriteId::new(EntityKind::Dendrite.range_start());
    let synapse_id = SynapseId::new(EntityKind::Synapse.range_start());

    let within_horizon = spikenet_runtime::ForwardSpike {
        synapse_id,
        dendrite_id,
        scheduled_time_ms: 9.5,
        amplitude: 1.0,
        dispatch_time_ms: 0.0,
    };
    assert!(scheduler.schedule_spike(within_horizon).is_ok());

    let beyond_horizon = spikenet_runtime::ForwardSpike {
        synapse_id,
        dendrite_id,
        scheduled_time_ms: 10.5,
        amplitude: 1.0,
        dispatch_time_ms: 0.0,
    };
    assert!(scheduler.schedule_spike(beyond_horizon).is_err());

    scheduler.stop();
}

/// Boundary: a neuron with no axon fires zero events and reports success
/// rather than failing.
#[test]
fn terminal_neuron_fires_zero_events() {
    let harness = build_harness(scenario_scheduler_config());
    let n = harness.registry.register_neuron(NeuronId::new(EntityKind::Neuron.range_start()), NeuronConfig::default());
    harness.scheduler.start();
    let count = harness.propagator.fire_neuron(n.id(), 5.0).unwrap();
    assert_eq!(count, 0);
    harness.scheduler.stop();
}

/// Boundary: scheduling before the scheduler starts fails with
/// `SchedulerNotRunning`, not a panic or silent drop.
#[test]
fn scheduling_before_start_fails_explicitly() {
    let harness = build_harness(scenario_scheduler_config());
    let event = spikenet_runtime::ForwardSpike {
        synapse_id: SynapseId::new(EntityKind::Synapse.range_start()),
        dendrite_id: DendriteId::new(EntityKind::Dendrite.range_start()),
        scheduled_time_ms: 1.0,
        amplitude: 1.0,
        dispatch_time_ms: 0.0,
    };
    assert!(matches!(
        harness.scheduler.schedule_spike(event),
        Err(spikenet_runtime::RuntimeError::SchedulerNotRunning)
    ));
}

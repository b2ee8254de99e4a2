//! Sixty-four bit identifiers and the process-wide [`Factory`] that hands them out.
//!
//! Every graph entity carries an id drawn from one of twelve disjoint,
//! contiguous ranges, one per [`EntityKind`]. The kind of any raw id is
//! recoverable by range-check alone; inspectors and the structural validator
//! both depend on this property, so it must never be broken by a future
//! change to the range table.

use core::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Width of a single kind's id range (10^14).
pub const RANGE_WIDTH: u64 = 100_000_000_000_000;

/// The twelve entity kinds that share the 64-bit id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Neuron,
    Axon,
    Dendrite,
    Synapse,
    Cluster,
    Layer,
    Column,
    Nucleus,
    Region,
    Lobe,
    Hemisphere,
    Brain,
}

impl EntityKind {
    /// All twelve kinds, in range order. Also the iteration order the
    /// [`Factory`]'s internal counters are laid out in.
    pub const ALL: [EntityKind; 12] = [
        EntityKind::Neuron,
        EntityKind::Axon,
        EntityKind::Dendrite,
        EntityKind::Synapse,
        EntityKind::Cluster,
        EntityKind::Layer,
        EntityKind::Column,
        EntityKind::Nucleus,
        EntityKind::Region,
        EntityKind::Lobe,
        EntityKind::Hemisphere,
        EntityKind::Brain,
    ];

    /// Ordinal position of this kind's range, 1-based (Neuron = 1 .. Brain = 12).
    pub const fn ordinal(self) -> u64 {
        match self {
            EntityKind::Neuron => 1,
            EntityKind::Axon => 2,
            EntityKind::Dendrite => 3,
            EntityKind::Synapse => 4,
            EntityKind::Cluster => 5,
            EntityKind::Layer => 6,
            EntityKind::Column => 7,
            EntityKind::Nucleus => 8,
            EntityKind::Region => 9,
            EntityKind::Lobe => 10,
            EntityKind::Hemisphere => 11,
            EntityKind::Brain => 12,
        }
    }

    /// Inclusive start of this kind's id range.
    pub const fn range_start(self) -> u64 {
        self.ordinal() * RANGE_WIDTH
    }

    /// Exclusive end of this kind's id range.
    pub const fn range_end(self) -> u64 {
        self.range_start() + RANGE_WIDTH
    }

    /// Whether a raw id falls within this kind's range.
    pub const fn contains(self, raw: u64) -> bool {
        raw >= self.range_start() && raw < self.range_end()
    }

    /// Index into the [`Factory`]'s counter array for this kind.
    const fn index(self) -> usize {
        self.ordinal() as usize - 1
    }

    /// Human-readable kind name, also used as the JSON `type` discriminator
    /// prefix for the primary four entity kinds.
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Neuron => "Neuron",
            EntityKind::Axon => "Axon",
            EntityKind::Dendrite => "Dendrite",
            EntityKind::Synapse => "Synapse",
            EntityKind::Cluster => "Cluster",
            EntityKind::Layer => "Layer",
            EntityKind::Column => "Column",
            EntityKind::Nucleus => "Nucleus",
            EntityKind::Region => "Region",
            EntityKind::Lobe => "Lobe",
            EntityKind::Hemisphere => "Hemisphere",
            EntityKind::Brain => "Brain",
        }
    }

    /// Recover the kind of a raw id by range-check alone, or `None` if the
    /// id does not fall in any of the twelve ranges.
    pub fn of(raw: u64) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|k| k.contains(raw))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for EntityKind {
    /// Arbitrary placeholder kind, only meaningful as a `#[serde(skip)]`
    /// fill-in immediately overwritten by the caller (see `HierarchyRecord`).
    fn default() -> Self {
        EntityKind::Neuron
    }
}

/// Defines a newtype wrapper around a raw 64-bit id, bound to a single
/// [`EntityKind`]'s range. `0` is reserved to mean "no such reference"
/// (e.g. a neuron with no axon).
macro_rules! define_id {
    ($name:ident, $kind:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The entity kind this id type is bound to.
            pub const KIND: EntityKind = $kind;

            /// Sentinel meaning "no reference" (e.g. an axon-less neuron).
            pub const NONE: Self = Self(0);

            /// Wrap a raw value without checking it against the kind's range.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The wrapped raw value.
            pub const fn raw(self) -> u64 {
                self.0
            }

            /// `true` for the `NONE` sentinel.
            pub const fn is_none(self) -> bool {
                self.0 == 0
            }

            /// `true` if this id is either `NONE` or falls within its kind's range.
            pub const fn is_well_formed(self) -> bool {
                self.is_none() || Self::KIND.contains(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", Self::KIND.name(), self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

define_id!(NeuronId, EntityKind::Neuron, "Identifier for a neuron.");
define_id!(AxonId, EntityKind::Axon, "Identifier for an axon.");
define_id!(DendriteId, EntityKind::Dendrite, "Identifier for a dendrite.");
define_id!(SynapseId, EntityKind::Synapse, "Identifier for a synapse.");
define_id!(ClusterId, EntityKind::Cluster, "Identifier for a cluster container.");
define_id!(LayerId, EntityKind::Layer, "Identifier for a layer container.");
define_id!(ColumnId, EntityKind::Column, "Identifier for a column container.");
define_id!(NucleusId, EntityKind::Nucleus, "Identifier for a nucleus container.");
define_id!(RegionId, EntityKind::Region, "Identifier for a region container.");
define_id!(LobeId, EntityKind::Lobe, "Identifier for a lobe container.");
define_id!(HemisphereId, EntityKind::Hemisphere, "Identifier for a hemisphere container.");
define_id!(BrainId, EntityKind::Brain, "Identifier for the root brain container.");

/// Process-wide id generator. Hands out the next free id in a kind's range
/// under a single mutex; fails when a range is exhausted rather than
/// wrapping into the next kind's territory.
#[derive(Debug)]
pub struct Factory {
    counters: Mutex<[u64; 12]>,
}

impl Factory {
    /// Build a factory with all twelve counters at their range starts.
    pub fn new() -> Self {
        let mut counters = [0u64; 12];
        for kind in EntityKind::ALL {
            counters[kind.index()] = kind.range_start();
        }
        Self {
            counters: Mutex::new(counters),
        }
    }

    /// Reset every counter back to its range start. Intended for test
    /// isolation between cases that otherwise share a `static` factory.
    pub fn reset(&self) {
        let mut counters = self.counters.lock();
        for kind in EntityKind::ALL {
            counters[kind.index()] = kind.range_start();
        }
    }

    fn next_raw(&self, kind: EntityKind) -> Result<u64, StorageError> {
        let mut counters = self.counters.lock();
        let current = counters[kind.index()];
        if current >= kind.range_end() {
            return Err(StorageError::IdRangeExhausted { kind });
        }
        counters[kind.index()] = current + 1;
        Ok(current)
    }

    /// Allocate the next [`NeuronId`].
    pub fn next_neuron(&self) -> Result<NeuronId, StorageError> {
        self.next_raw(EntityKind::Neuron).map(NeuronId)
    }

    /// Allocate the next [`AxonId`].
    pub fn next_axon(&self) -> Result<AxonId, StorageError> {
        self.next_raw(EntityKind::Axon).map(AxonId)
    }

    /// Allocate the next [`DendriteId`].
    pub fn next_dendrite(&self) -> Result<DendriteId, StorageError> {
        self.next_raw(EntityKind::Dendrite).map(DendriteId)
    }

    /// Allocate the next [`SynapseId`].
    pub fn next_synapse(&self) -> Result<SynapseId, StorageError> {
        self.next_raw(EntityKind::Synapse).map(SynapseId)
    }

    /// Allocate the next [`ClusterId`].
    pub fn next_cluster(&self) -> Result<ClusterId, StorageError> {
        self.next_raw(EntityKind::Cluster).map(ClusterId)
    }

    /// Allocate the next [`LayerId`].
    pub fn next_layer(&self) -> Result<LayerId, StorageError> {
        self.next_raw(EntityKind::Layer).map(LayerId)
    }

    /// Allocate the next [`ColumnId`].
    pub fn next_column(&self) -> Result<ColumnId, StorageError> {
        self.next_raw(EntityKind::Column).map(ColumnId)
    }

    /// Allocate the next [`NucleusId`].
    pub fn next_nucleus(&self) -> Result<NucleusId, StorageError> {
        self.next_raw(EntityKind::Nucleus).map(NucleusId)
    }

    /// Allocate the next [`RegionId`].
    pub fn next_region(&self) -> Result<RegionId, StorageError> {
        self.next_raw(EntityKind::Region).map(RegionId)
    }

    /// Allocate the next [`LobeId`].
    pub fn next_lobe(&self) -> Result<LobeId, StorageError> {
        self.next_raw(EntityKind::Lobe).map(LobeId)
    }

    /// Allocate the next [`HemisphereId`].
    pub fn next_hemisphere(&self) -> Result<HemisphereId, StorageError> {
        self.next_raw(EntityKind::Hemisphere).map(HemisphereId)
    }

    /// Allocate the next [`BrainId`].
    pub fn next_brain(&self) -> Result<BrainId, StorageError> {
        self.next_raw(EntityKind::Brain).map(BrainId)
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// However many ids a fresh factory hands out for one kind, each
        /// one range-checks back to that exact kind and none repeat.
        #[test]
        fn factory_ids_for_one_kind_stay_in_range_and_unique(count in 0usize..200) {
            let factory = Factory::new();
            let mut seen = std::collections::HashSet::new();
            for _ in 0..count {
                let id = factory.next_synapse().unwrap();
                prop_assert!(EntityKind::Synapse.contains(id.raw()));
                prop_assert_eq!(EntityKind::of(id.raw()), Some(EntityKind::Synapse));
                prop_assert!(seen.insert(id.raw()));
            }
        }

        /// Any raw id recovered as kind `k` by [`EntityKind::of`] falls
        /// strictly within `k`'s own `[start, end)` range, never a neighbor's.
        #[test]
        fn kind_of_never_crosses_a_range_boundary(raw in 0u64..1_300_000_000_000_000) {
            if let Some(kind) = EntityKind::of(raw) {
                prop_assert!(kind.contains(raw));
                for other in EntityKind::ALL {
                    if other != kind {
                        prop_assert!(!other.contains(raw));
                    }
                }
            }
        }
    }

    #[test]
    fn ranges_are_disjoint_and_ordered() {
        for pair in EntityKind::ALL.windows(2) {
            assert_eq!(pair[0].range_end(), pair[1].range_start());
        }
    }

    #[test]
    fn kind_of_recovers_exact_kind() {
        assert_eq!(EntityKind::of(100_000_000_000_000), Some(EntityKind::Neuron));
        assert_eq!(EntityKind::of(200_000_000_000_000), Some(EntityKind::Axon));
        assert_eq!(EntityKind::of(1_200_000_000_000_000 - 1), Some(EntityKind::Brain));
        assert_eq!(EntityKind::of(0), None);
        assert_eq!(EntityKind::of(1_300_000_000_000_000), None);
    }

    #[test]
    fn factory_allocates_sequentially_within_range() {
        let factory = Factory::new();
        let a = factory.next_neuron().unwrap();
        let b = factory.next_neuron().unwrap();
        assert_eq!(a.raw(), EntityKind::Neuron.range_start());
        assert_eq!(b.raw(), a.raw() + 1);
        assert!(EntityKind::Neuron.contains(a.raw()));
    }

    #[test]
    fn factory_ranges_do_not_interfere() {
        let factory = Factory::new();
        let neuron = factory.next_neuron().unwrap();
        let axon = factory.next_axon().unwrap();
        assert_ne!(neuron.raw(), axon.raw());
        assert!(EntityKind::Axon.contains(axon.raw()));
        assert!(!EntityKind::Neuron.contains(axon.raw()));
    }

    #[test]
    fn factory_exhaustion_fails_without_rollover() {
        let factory = Factory::new();
        {
            let mut counters = factory.counters.lock();
            counters[EntityKind::Neuron.index()] = EntityKind::Neuron.range_end() - 1;
        }
        assert!(factory.next_neuron().is_ok());
        let err = factory.next_neuron().unwrap_err();
        assert!(matches!(err, StorageError::IdRangeExhausted { kind: EntityKind::Neuron }));
    }

    #[test]
    fn reset_restores_range_starts() {
        let factory = Factory::new();
        let _ = factory.next_neuron().unwrap();
        let _ = factory.next_axon().unwrap();
        factory.reset();
        assert_eq!(factory.next_neuron().unwrap().raw(), EntityKind::Neuron.range_start());
        assert_eq!(factory.next_axon().unwrap().raw(), EntityKind::Axon.range_start());
    }

    #[test]
    fn factory_never_hands_out_duplicate_ids_across_all_kinds() {
        let factory = Factory::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            for raw in [
                factory.next_neuron().unwrap().raw(),
                factory.next_axon().unwrap().raw(),
                factory.next_dendrite().unwrap().raw(),
                factory.next_synapse().unwrap().raw(),
                factory.next_cluster().unwrap().raw(),
                factory.next_layer().unwrap().raw(),
                factory.next_column().unwrap().raw(),
                factory.next_nucleus().unwrap().raw(),
                factory.next_region().unwrap().raw(),
                factory.next_lobe().unwrap().raw(),
                factory.next_hemisphere().unwrap().raw(),
                factory.next_brain().unwrap().raw(),
            ] {
                assert!(seen.insert(raw), "duplicate id {raw} handed out");
                assert!(EntityKind::of(raw).is_some(), "id {raw} does not range-check to any kind");
            }
        }
    }

    #[test]
    fn fresh_default_matches_a_freshly_reset_factory() {
        let fresh = Factory::default();
        let reset = Factory::new();
        let _ = reset.next_neuron().unwrap();
        reset.reset();
        assert_eq!(fresh.next_neuron().unwrap().raw(), reset.next_neuron().unwrap().raw());
        assert_eq!(fresh.next_brain().unwrap().raw(), reset.next_brain().unwrap().raw());
    }

    #[test]
    fn none_sentinel_is_well_formed_but_out_of_range() {
        assert!(AxonId::NONE.is_none());
        assert!(AxonId::NONE.is_well_formed());
        assert!(!EntityKind::Axon.contains(0));
    }

    #[test]
    fn display_format() {
        let id = NeuronId::new(EntityKind::Neuron.range_start() + 5);
        assert_eq!(format!("{id}"), format!("Neuron#{}", EntityKind::Neuron.range_start() + 5));
    }
}

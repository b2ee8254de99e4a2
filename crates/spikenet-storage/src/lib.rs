//! Identifiers, the entity JSON schema, and the write-back persistence
//! cache that the spiking engine core treats as an external collaborator.
//!
//! This crate owns the twelve-range 64-bit id space and the [`Factory`]
//! that allocates from it, the JSON shape every graph or hierarchy entity
//! persists as, and a reference in-process implementation of the
//! `get`/`put`/`mark_dirty`/`flush` cache the runtime crate consumes.

pub mod entity;
pub mod error;
pub mod ids;
pub mod persistence;
pub mod validation;

pub use entity::{AxonRecord, DendriteRecord, Entity, HierarchyRecord, NeuronRecord, Position, SynapseRecord};
pub use error::{Result, StorageError};
pub use ids::{
    AxonId, BrainId, ClusterId, ColumnId, DendriteId, EntityKind, Factory, HemisphereId, LayerId,
    LobeId, NeuronId, NucleusId, RegionId, SynapseId,
};
pub use persistence::{Backend, CacheStats, FactoryFn, MemoryBackend, PersistenceCache};
pub use validation::{validate_hierarchy_container, validate_hierarchy_forest, Severity, ValidationIssue, ValidationReport};

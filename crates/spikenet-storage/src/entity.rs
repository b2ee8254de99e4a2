//! The JSON entity schema persisted entities round-trip through, and the
//! [`Entity`] trait objects handled by the persistence cache.
//!
//! Every persisted object serializes as a JSON object carrying a `type` tag
//! naming its exact kind, an `id`, an optional `position`, and kind-specific
//! fields. Deserialization rejects a payload whose `type` does not match the
//! kind requested by the caller.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::ids::EntityKind;

/// Optional, non-semantic spatial placement carried by some entities.
/// No runtime decision reads this field; it exists purely for round-trip
/// fidelity with records that carry it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Anything that can be named, persisted as a JSON object, and identified
/// by a single 64-bit id. Implemented both by the plain-data `*Record`
/// types in this module and by the live runtime objects in `spikenet-runtime`,
/// so the persistence cache can hold either behind one trait object.
pub trait Entity: Send + Sync + fmt::Debug {
    /// The entity's own id, raw.
    fn entity_id(&self) -> u64;

    /// The exact `type` tag this entity serializes under.
    fn type_name(&self) -> &'static str;

    /// Render this entity as its canonical JSON form.
    fn to_json(&self) -> Result<String, StorageError>;

    /// Recover a type-erased handle to this entity, for downcasting back to
    /// a concrete type via [`std::sync::Arc::downcast`].
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

macro_rules! impl_entity_for_record {
    ($ty:ty, $kind_name:literal) => {
        impl Entity for $ty {
            fn entity_id(&self) -> u64 {
                self.id
            }

            fn type_name(&self) -> &'static str {
                $kind_name
            }

            fn to_json(&self) -> Result<String, StorageError> {
                // The struct itself carries no `type` field; stamp it into
                // the serialized map so every persisted payload carries the
                // `type` discriminator the spec's JSON envelope requires.
                let mut value = serde_json::to_value(self)?;
                if let serde_json::Value::Object(map) = &mut value {
                    map.insert("type".to_string(), serde_json::Value::String($kind_name.to_string()));
                }
                Ok(value.to_string())
            }

            fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
                self
            }
        }
    };
}

/// Persisted shape of a neuron. Mirrors the essential attributes of §3's
/// data model; the live rolling window and pattern library are runtime-only
/// state, snapshotted into this record on flush and restored from it on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronRecord {
    pub id: u64,
    #[serde(rename = "axonId")]
    pub axon_id: u64,
    #[serde(rename = "dendriteIds")]
    pub dendrite_ids: Vec<u64>,
    #[serde(rename = "windowSizeMs")]
    pub window_size_ms: f64,
    #[serde(rename = "similarityThreshold")]
    pub similarity_threshold: f64,
    #[serde(rename = "maxReferencePatterns")]
    pub max_reference_patterns: u32,
    #[serde(rename = "similarityMetric")]
    pub similarity_metric: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<Position>,
}
impl_entity_for_record!(NeuronRecord, "Neuron");

/// Persisted shape of an axon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxonRecord {
    pub id: u64,
    #[serde(rename = "sourceNeuronId")]
    pub source_neuron_id: u64,
    #[serde(rename = "synapseIds")]
    pub synapse_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<Position>,
}
impl_entity_for_record!(AxonRecord, "Axon");

/// Persisted shape of a dendrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DendriteRecord {
    pub id: u64,
    #[serde(rename = "targetNeuronId")]
    pub target_neuron_id: u64,
    #[serde(rename = "synapseIds")]
    pub synapse_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<Position>,
}
impl_entity_for_record!(DendriteRecord, "Dendrite");

/// Persisted shape of a synapse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseRecord {
    pub id: u64,
    #[serde(rename = "axonId")]
    pub axon_id: u64,
    #[serde(rename = "dendriteId")]
    pub dendrite_id: u64,
    pub weight: f64,
    pub delay: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<Position>,
}
impl_entity_for_record!(SynapseRecord, "Synapse");

/// Persisted shape of any of the eight pure-structure hierarchical
/// containers (brain / hemisphere / lobe / region / nucleus / column /
/// layer / cluster). They differ only in the `type` tag they serialize
/// under, which [`HierarchyRecord::to_json`] stamps from `self.kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyRecord {
    pub id: u64,
    #[serde(skip)]
    pub kind: EntityKind,
    #[serde(rename = "childIds")]
    pub child_ids: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<Position>,
}

impl HierarchyRecord {
    pub fn new(kind: EntityKind, id: u64) -> Self {
        Self {
            id,
            kind,
            child_ids: Vec::new(),
            name: None,
            position: None,
        }
    }
}

impl Entity for HierarchyRecord {
    fn entity_id(&self) -> u64 {
        self.id
    }

    fn type_name(&self) -> &'static str {
        self.kind.name()
    }

    fn to_json(&self) -> Result<String, StorageError> {
        // `kind` is `#[serde(skip)]`'d on the struct (it is not part of the
        // persisted payload shape) and re-inserted as the `type` tag here.
        let mut value = serde_json::to_value(self)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "type".to_string(),
                serde_json::Value::String(self.kind.name().to_string()),
            );
        }
        Ok(value.to_string())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl HierarchyRecord {
    /// Parse a hierarchy record, checking its `type` tag against `expected`.
    pub fn from_json(json: &str, expected: EntityKind) -> Result<Self, StorageError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let tag = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StorageError::mismatch("missing `type` field"))?;
        if tag != expected.name() {
            return Err(StorageError::mismatch(format!(
                "expected type {}, found {tag}",
                expected.name()
            )));
        }
        let mut record: HierarchyRecord = serde_json::from_value(value)?;
        record.kind = expected;
        Ok(record)
    }
}

/// Parse a `NeuronRecord`, rejecting a payload whose `type` tag is not `"Neuron"`.
pub fn neuron_from_json(json: &str) -> Result<NeuronRecord, StorageError> {
    from_json_checked(json, "Neuron")
}

/// Parse an `AxonRecord`, rejecting a payload whose `type` tag is not `"Axon"`.
pub fn axon_from_json(json: &str) -> Result<AxonRecord, StorageError> {
    from_json_checked(json, "Axon")
}

/// Parse a `DendriteRecord`, rejecting a payload whose `type` tag is not `"Dendrite"`.
pub fn dendrite_from_json(json: &str) -> Result<DendriteRecord, StorageError> {
    from_json_checked(json, "Dendrite")
}

/// Parse a `SynapseRecord`, rejecting a payload whose `type` tag is not `"Synapse"`.
pub fn synapse_from_json(json: &str) -> Result<SynapseRecord, StorageError> {
    from_json_checked(json, "Synapse")
}

fn from_json_checked<T: for<'de> Deserialize<'de>>(
    json: &str,
    expected_type: &str,
) -> Result<T, StorageError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let tag = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StorageError::mismatch("missing `type` field"))?;
    if tag != expected_type {
        return Err(StorageError::mismatch(format!(
            "expected type {expected_type}, found {tag}"
        )));
    }
    serde_json::from_value(value).map_err(StorageError::from)
}

/// Peek the `type` tag of a serialized entity without fully parsing it.
/// Used by the persistence cache to route a cache-miss payload to the
/// correct registered factory.
pub fn peek_type(json: &str) -> Result<String, StorageError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    value
        .get("type")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| StorageError::mismatch("missing `type` field"))
}

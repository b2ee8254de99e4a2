//! Structural validation of hierarchical containers (§7, ValidationError).
//!
//! Brain, Hemisphere, Lobe, Region, Nucleus, Column, Layer, and Cluster carry
//! no runtime behaviour; their sole contract is structural: every child id
//! must range-check to the expected child kind for that container's level,
//! and a container must not list itself among its own children. Violations
//! are reported, never thrown — this mirrors the reference implementation's
//! own `ValidationError`/`ValidationSeverity` split (info/warning/error/critical)
//! returned by value from its network validator.

use std::fmt;

use crate::entity::HierarchyRecord;
use crate::ids::EntityKind;

/// Severity of a single validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A single structural finding against one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
    pub object_id: u64,
    pub object_type: &'static str,
}

impl ValidationIssue {
    pub fn new(severity: Severity, object_id: u64, object_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            object_id,
            object_type,
        }
    }
}

/// A batch of structural findings, returned by value rather than thrown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn worst(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

/// The expected kind of a hierarchy container's children, one level down.
/// `None` for `Cluster`, whose children are neurons (not another hierarchy kind).
fn expected_child_kind(kind: EntityKind) -> Option<EntityKind> {
    match kind {
        EntityKind::Brain => Some(EntityKind::Hemisphere),
        EntityKind::Hemisphere => Some(EntityKind::Lobe),
        EntityKind::Lobe => Some(EntityKind::Region),
        EntityKind::Region => Some(EntityKind::Nucleus),
        EntityKind::Nucleus => Some(EntityKind::Column),
        EntityKind::Column => Some(EntityKind::Layer),
        EntityKind::Layer => Some(EntityKind::Cluster),
        EntityKind::Cluster => Some(EntityKind::Neuron),
        _ => None,
    }
}

/// Validate one hierarchical container in isolation: every child id must
/// range-check to the expected child kind, and the container must not
/// reference itself. Does not walk the tree — callers validate each
/// container they hold, e.g. while iterating a persistence cache or a
/// freshly loaded hierarchy.
pub fn validate_hierarchy_container(record: &HierarchyRecord) -> ValidationReport {
    let mut report = ValidationReport::new();
    let Some(expected_kind) = expected_child_kind(record.kind) else {
        return report;
    };

    for &child in &record.child_ids {
        if child == record.id {
            report.push(ValidationIssue::new(
                Severity::Critical,
                record.id,
                record.kind.name(),
                format!("{} self-references as its own child", record.kind.name()),
            ));
            continue;
        }
        if !expected_kind.contains(child) {
            report.push(ValidationIssue::new(
                Severity::Critical,
                record.id,
                record.kind.name(),
                format!(
                    "dangling child reference {child}: expected a {} id, found one outside its range",
                    expected_kind.name()
                ),
            ));
        }
    }

    report
}

/// Validate a whole set of hierarchy containers, merging every container's
/// findings into one report.
pub fn validate_hierarchy_forest<'a>(records: impl IntoIterator<Item = &'a HierarchyRecord>) -> ValidationReport {
    let mut report = ValidationReport::new();
    for record in records {
        report.merge(validate_hierarchy_container(record));
    }
    report
}

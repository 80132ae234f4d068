//! On-demand snapshot completion for differential profiles.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::types::StructureDefinition;

use super::ValidationSupport;

/// Splices a profile's differential over the snapshot of its nearest
/// snapshot-bearing ancestor.
///
/// Differential elements are matched to snapshot elements by `id`, then by
/// `path`; matched elements are merged field-wise with the differential
/// winning, unmatched elements are appended. Novel sliced elements keep
/// insertion order rather than their canonical position; nothing in the
/// gateway depends on element order.
pub struct SnapshotGeneratingSupport;

impl SnapshotGeneratingSupport {
    pub fn new() -> Self {
        Self
    }

    /// Fold an ancestor stack `[profile, base, base-of-base, ...]` into a
    /// snapshot-bearing profile.
    ///
    /// The deepest snapshot found is taken as the starting point and every
    /// differential between it and the target profile is applied in
    /// inheritance order. Without any snapshot-bearing ancestor the target
    /// is returned unchanged.
    pub fn complete_from_ancestry(&self, mut stack: Vec<StructureDefinition>) -> StructureDefinition {
        let Some(snapshot_idx) = stack.iter().position(StructureDefinition::has_snapshot) else {
            if let Some(target) = stack.first() {
                tracing::warn!(
                    url = %target.url(),
                    "no snapshot-bearing ancestor found; returning differential profile as-is"
                );
            }
            return stack.swap_remove(0);
        };

        let mut elements: Vec<Value> = stack[snapshot_idx]
            .as_value()
            .pointer("/snapshot/element")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for sd in stack[..snapshot_idx].iter().rev() {
            let differential: Vec<Value> = sd
                .as_value()
                .pointer("/differential/element")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            apply_differential(&mut elements, differential);
        }

        let mut completed = stack[0].as_value().clone();
        completed["snapshot"] = json!({ "element": elements });
        match StructureDefinition::from_value(completed) {
            Some(sd) => sd,
            // resourceType and url are intact by construction; this arm
            // is unreachable but keeps the fold total.
            None => stack.swap_remove(0),
        }
    }
}

impl Default for SnapshotGeneratingSupport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationSupport for SnapshotGeneratingSupport {
    // Declines direct lookups; the chain invokes snapshot completion on
    // profiles resolved by other providers.
    fn name(&self) -> &str {
        "snapshot-generating"
    }
}

fn apply_differential(elements: &mut Vec<Value>, differential: Vec<Value>) {
    for diff in differential {
        let position = elements.iter().position(|e| matches(e, &diff));
        match position {
            Some(idx) => merge_element(&mut elements[idx], &diff),
            None => elements.push(diff),
        }
    }
}

fn matches(snapshot_element: &Value, diff_element: &Value) -> bool {
    let by_id = match (snapshot_element.get("id"), diff_element.get("id")) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    by_id
        || matches!(
            (snapshot_element.get("path"), diff_element.get("path")),
            (Some(a), Some(b)) if a == b
        )
}

fn merge_element(target: &mut Value, diff: &Value) {
    let (Some(target_map), Some(diff_map)) = (target.as_object_mut(), diff.as_object()) else {
        return;
    };
    for (key, value) in diff_map {
        target_map.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sd(value: Value) -> StructureDefinition {
        StructureDefinition::from_value(value).unwrap()
    }

    #[test]
    fn differential_overrides_matching_snapshot_elements() {
        let base = sd(json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/sd/base",
            "snapshot": { "element": [
                {"path": "Observation"},
                {"path": "Observation.value", "min": 0, "max": "1"}
            ]}
        }));
        let profile = sd(json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/sd/profile",
            "baseDefinition": "http://example.org/sd/base",
            "differential": { "element": [
                {"path": "Observation.value", "min": 1},
                {"path": "Observation.note", "max": "0"}
            ]}
        }));

        let completed =
            SnapshotGeneratingSupport::new().complete_from_ancestry(vec![profile, base]);
        let elements = completed.as_value()["snapshot"]["element"]
            .as_array()
            .unwrap();
        assert_eq!(elements.len(), 3);

        let value_element = elements
            .iter()
            .find(|e| e["path"] == "Observation.value")
            .unwrap();
        assert_eq!(value_element["min"], 1, "differential wins");
        assert_eq!(value_element["max"], "1", "untouched base field survives");

        assert!(elements.iter().any(|e| e["path"] == "Observation.note"));
    }

    #[test]
    fn folds_through_multiple_differential_levels() {
        let root = sd(json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/sd/root",
            "snapshot": { "element": [{"path": "Patient.name", "min": 0}] }
        }));
        let mid = sd(json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/sd/mid",
            "differential": { "element": [{"path": "Patient.name", "min": 1}] }
        }));
        let leaf = sd(json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/sd/leaf",
            "differential": { "element": [{"path": "Patient.name", "mustSupport": true}] }
        }));

        let completed =
            SnapshotGeneratingSupport::new().complete_from_ancestry(vec![leaf, mid, root]);
        let elements = completed.as_value()["snapshot"]["element"]
            .as_array()
            .unwrap();
        assert_eq!(elements[0]["min"], 1);
        assert_eq!(elements[0]["mustSupport"], true);
    }

    #[test]
    fn without_snapshot_ancestor_the_profile_is_unchanged() {
        let orphan = sd(json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/sd/orphan",
            "differential": { "element": [{"path": "Patient.name"}] }
        }));
        let completed = SnapshotGeneratingSupport::new().complete_from_ancestry(vec![orphan.clone()]);
        assert_eq!(&completed, &orphan);
    }
}

//! Built-in base profile definitions.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use crate::types::StructureDefinition;

use super::ValidationSupport;

/// Resource types with a built-in base definition.
///
/// Covers the types validation traffic routinely references; anything else
/// must come from a configured structure server.
const BASE_RESOURCE_TYPES: &[&str] = &[
    "AllergyIntolerance",
    "Bundle",
    "CapabilityStatement",
    "CodeSystem",
    "Condition",
    "Device",
    "DiagnosticReport",
    "Encounter",
    "Immunization",
    "Location",
    "Medication",
    "MedicationRequest",
    "MedicationStatement",
    "Observation",
    "OperationOutcome",
    "Organization",
    "Parameters",
    "Patient",
    "Practitioner",
    "PractitionerRole",
    "Procedure",
    "Questionnaire",
    "QuestionnaireResponse",
    "ServiceRequest",
    "Specimen",
    "StructureDefinition",
    "ValueSet",
];

/// First provider in the chain: answers profile lookups for the FHIR base
/// resource types so a resource without custom profiles always resolves.
pub struct DefaultProfileSupport {
    definitions: HashMap<String, StructureDefinition>,
}

impl DefaultProfileSupport {
    pub fn new() -> Self {
        let mut definitions = HashMap::new();
        for resource_type in BASE_RESOURCE_TYPES {
            let url = base_profile_url(resource_type);
            let value = json!({
                "resourceType": "StructureDefinition",
                "url": url,
                "name": resource_type,
                "status": "active",
                "kind": "resource",
                "abstract": false,
                "type": resource_type,
                "snapshot": { "element": [
                    { "id": resource_type, "path": resource_type, "min": 0, "max": "*" }
                ]}
            });
            if let Some(sd) = StructureDefinition::from_value(value) {
                definitions.insert(url, sd);
            }
        }
        Self { definitions }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for DefaultProfileSupport {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical URL of the base definition for a resource type.
pub fn base_profile_url(resource_type: &str) -> String {
    format!("http://hl7.org/fhir/StructureDefinition/{resource_type}")
}

#[async_trait]
impl ValidationSupport for DefaultProfileSupport {
    fn name(&self) -> &str {
        "default-profiles"
    }

    async fn fetch_structure_definition(&self, url: &str) -> Option<StructureDefinition> {
        self.definitions.get(url).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_base_profiles() {
        let support = DefaultProfileSupport::new();
        let sd = support
            .fetch_structure_definition("http://hl7.org/fhir/StructureDefinition/Patient")
            .await
            .unwrap();
        assert_eq!(sd.name(), Some("Patient"));
        assert!(sd.has_snapshot());
    }

    #[tokio::test]
    async fn declines_unknown_urls() {
        let support = DefaultProfileSupport::new();
        assert!(
            support
                .fetch_structure_definition("http://example.org/sd/custom")
                .await
                .is_none()
        );
    }
}

//! In-memory terminology rules.
//!
//! Validates codes against CodeSystem and ValueSet documents registered at
//! build time. A ValueSet answers through its expansion when present,
//! otherwise through its compose definition; code systems are searched
//! hierarchically through nested `concept` lists.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::CodeValidation;

use super::ValidationSupport;

pub struct InMemoryTerminologySupport {
    code_systems: HashMap<String, Value>,
    value_sets: HashMap<String, Value>,
}

impl InMemoryTerminologySupport {
    pub fn new() -> Self {
        Self {
            code_systems: HashMap::new(),
            value_sets: HashMap::new(),
        }
    }

    /// Register a CodeSystem document; ignored unless it carries a `url`.
    pub fn add_code_system(&mut self, document: Value) {
        if let Some(url) = document.get("url").and_then(Value::as_str) {
            self.code_systems.insert(url.to_string(), document);
        }
    }

    /// Register a ValueSet document; ignored unless it carries a `url`.
    pub fn add_value_set(&mut self, document: Value) {
        if let Some(url) = document.get("url").and_then(Value::as_str) {
            self.value_sets.insert(url.to_string(), document);
        }
    }

    /// Find a concept in a CodeSystem's hierarchical concept list.
    fn find_concept_in_hierarchy<'a>(concepts: &'a [Value], code: &str) -> Option<&'a Value> {
        for concept in concepts {
            let concept_code = concept.get("code").and_then(Value::as_str).unwrap_or("");
            if concept_code == code {
                return Some(concept);
            }
            if let Some(children) = concept.get("concept").and_then(Value::as_array)
                && let Some(found) = Self::find_concept_in_hierarchy(children, code)
            {
                return Some(found);
            }
        }
        None
    }

    /// Validate a code against a ValueSet's expansion.
    fn validate_in_expansion(
        expansion: &Value,
        code: &str,
        system: Option<&str>,
    ) -> Option<CodeValidation> {
        let contains = expansion.get("contains").and_then(Value::as_array)?;

        for entry in contains {
            let entry_code = entry.get("code").and_then(Value::as_str).unwrap_or("");
            let entry_system = entry.get("system").and_then(Value::as_str);
            let entry_display = entry.get("display").and_then(Value::as_str);

            if entry_code == code {
                if let Some(expected_system) = system
                    && entry_system != Some(expected_system)
                {
                    continue;
                }
                return Some(CodeValidation::valid_with_display(
                    entry_display.unwrap_or(code),
                ));
            }
        }

        None
    }

    /// Validate a code against a ValueSet's compose definition.
    fn validate_in_compose(
        &self,
        compose: &Value,
        code: &str,
        system: Option<&str>,
    ) -> Option<CodeValidation> {
        // Excludes first
        if let Some(excludes) = compose.get("exclude").and_then(Value::as_array) {
            for exclude in excludes {
                let exclude_system = exclude.get("system").and_then(Value::as_str);
                if let Some(concepts) = exclude.get("concept").and_then(Value::as_array) {
                    for concept in concepts {
                        if concept.get("code").and_then(Value::as_str) == Some(code)
                            && (system.is_none() || exclude_system == system)
                        {
                            return Some(CodeValidation::invalid());
                        }
                    }
                }
            }
        }

        if let Some(includes) = compose.get("include").and_then(Value::as_array) {
            for include in includes {
                let include_system = include.get("system").and_then(Value::as_str);

                if let Some(expected_system) = system
                    && include_system != Some(expected_system)
                {
                    continue;
                }

                if let Some(concepts) = include.get("concept").and_then(Value::as_array) {
                    for concept in concepts {
                        let concept_code = concept.get("code").and_then(Value::as_str);
                        let concept_display = concept.get("display").and_then(Value::as_str);
                        if concept_code == Some(code) {
                            return Some(CodeValidation::valid_with_display(
                                concept_display.unwrap_or(code),
                            ));
                        }
                    }
                } else if let Some(sys) = include_system {
                    // No concept list means every code from the system is
                    // included; consult the registered CodeSystem.
                    if let Some(cs) = self.code_systems.get(sys) {
                        let concepts = cs
                            .get("concept")
                            .and_then(Value::as_array)
                            .cloned()
                            .unwrap_or_default();
                        if let Some(found) = Self::find_concept_in_hierarchy(&concepts, code) {
                            let display = found
                                .get("display")
                                .and_then(Value::as_str)
                                .unwrap_or(code);
                            return Some(CodeValidation::valid_with_display(display));
                        }
                    }
                }
            }
        }

        None
    }
}

impl Default for InMemoryTerminologySupport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationSupport for InMemoryTerminologySupport {
    fn name(&self) -> &str {
        "in-memory-terminology"
    }

    async fn validate_code(
        &self,
        system: Option<&str>,
        code: &str,
        value_set_url: Option<&str>,
    ) -> Option<CodeValidation> {
        if let Some(vs_url) = value_set_url {
            let value_set = self.value_sets.get(vs_url)?;

            if let Some(expansion) = value_set.get("expansion") {
                return Some(
                    Self::validate_in_expansion(expansion, code, system)
                        .unwrap_or_else(CodeValidation::invalid),
                );
            }

            if let Some(compose) = value_set.get("compose") {
                return Some(
                    self.validate_in_compose(compose, code, system)
                        .unwrap_or_else(CodeValidation::invalid),
                );
            }

            return Some(CodeValidation::invalid());
        }

        // System-only lookup
        let cs = self.code_systems.get(system?)?;
        let concepts = cs
            .get("concept")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Some(match Self::find_concept_in_hierarchy(&concepts, code) {
            Some(found) => {
                let display = found.get("display").and_then(Value::as_str).unwrap_or(code);
                CodeValidation::valid_with_display(display)
            }
            None => CodeValidation::invalid(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn support_with_gender_codes() -> InMemoryTerminologySupport {
        let mut support = InMemoryTerminologySupport::new();
        support.add_code_system(json!({
            "resourceType": "CodeSystem",
            "url": "http://hl7.org/fhir/administrative-gender",
            "concept": [
                {"code": "male", "display": "Male"},
                {"code": "female", "display": "Female"},
                {"code": "other", "display": "Other", "concept": [
                    {"code": "unknown", "display": "Unknown"}
                ]}
            ]
        }));
        support.add_value_set(json!({
            "resourceType": "ValueSet",
            "url": "http://hl7.org/fhir/ValueSet/administrative-gender",
            "compose": { "include": [
                {"system": "http://hl7.org/fhir/administrative-gender"}
            ]}
        }));
        support
    }

    #[tokio::test]
    async fn finds_nested_concepts() {
        let support = support_with_gender_codes();
        let v = support
            .validate_code(Some("http://hl7.org/fhir/administrative-gender"), "unknown", None)
            .await
            .unwrap();
        assert!(v.valid);
        assert_eq!(v.display.as_deref(), Some("Unknown"));
    }

    #[tokio::test]
    async fn compose_include_without_concept_list_uses_the_code_system() {
        let support = support_with_gender_codes();
        let v = support
            .validate_code(
                Some("http://hl7.org/fhir/administrative-gender"),
                "female",
                Some("http://hl7.org/fhir/ValueSet/administrative-gender"),
            )
            .await
            .unwrap();
        assert!(v.valid);

        let v = support
            .validate_code(
                Some("http://hl7.org/fhir/administrative-gender"),
                "robot",
                Some("http://hl7.org/fhir/ValueSet/administrative-gender"),
            )
            .await
            .unwrap();
        assert!(!v.valid);
    }

    #[tokio::test]
    async fn expansion_wins_over_compose() {
        let mut support = InMemoryTerminologySupport::new();
        support.add_value_set(json!({
            "resourceType": "ValueSet",
            "url": "http://example.org/vs/status",
            "expansion": { "contains": [
                {"system": "http://example.org/cs", "code": "draft", "display": "Draft"}
            ]},
            "compose": { "include": [
                {"system": "http://example.org/cs", "concept": [{"code": "retired"}]}
            ]}
        }));

        let v = support
            .validate_code(None, "draft", Some("http://example.org/vs/status"))
            .await
            .unwrap();
        assert!(v.valid);
        let v = support
            .validate_code(None, "retired", Some("http://example.org/vs/status"))
            .await
            .unwrap();
        assert!(!v.valid, "expansion is authoritative when present");
    }

    #[tokio::test]
    async fn excluded_codes_are_invalid() {
        let mut support = InMemoryTerminologySupport::new();
        support.add_value_set(json!({
            "resourceType": "ValueSet",
            "url": "http://example.org/vs/partial",
            "compose": {
                "include": [{"system": "http://example.org/cs", "concept": [
                    {"code": "a"}, {"code": "b"}
                ]}],
                "exclude": [{"system": "http://example.org/cs", "concept": [{"code": "b"}]}]
            }
        }));

        let v = support
            .validate_code(Some("http://example.org/cs"), "b", Some("http://example.org/vs/partial"))
            .await
            .unwrap();
        assert!(!v.valid);
    }

    #[tokio::test]
    async fn unknown_value_set_is_a_lookup_miss() {
        let support = InMemoryTerminologySupport::new();
        assert!(
            support
                .validate_code(None, "x", Some("http://example.org/vs/unknown"))
                .await
                .is_none()
        );
    }
}

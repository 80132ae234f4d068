//! Core data types shared across the validation chain.
//!
//! Resources are opaque `serde_json::Value` documents; the newtypes here
//! only expose the handful of fields the chain navigates.

use serde_json::Value;

/// A retrieved StructureDefinition, immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureDefinition(Value);

impl StructureDefinition {
    /// Wrap a document iff it is a StructureDefinition with a canonical URL.
    pub fn from_value(value: Value) -> Option<Self> {
        let is_structure_definition = value
            .get("resourceType")
            .and_then(Value::as_str)
            .map(|rt| rt == "StructureDefinition")
            .unwrap_or(false);
        if is_structure_definition && value.get("url").and_then(Value::as_str).is_some() {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Canonical URL identity. Guaranteed present by construction.
    pub fn url(&self) -> &str {
        self.0
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn base_definition(&self) -> Option<&str> {
        self.0.get("baseDefinition").and_then(Value::as_str)
    }

    pub fn has_snapshot(&self) -> bool {
        self.0
            .get("snapshot")
            .and_then(|s| s.get("element"))
            .and_then(Value::as_array)
            .map(|e| !e.is_empty())
            .unwrap_or(false)
    }

    pub fn has_differential(&self) -> bool {
        self.0
            .get("differential")
            .and_then(|d| d.get("element"))
            .and_then(Value::as_array)
            .map(|e| !e.is_empty())
            .unwrap_or(false)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Answer to a "validate code against system/value set" lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeValidation {
    pub valid: bool,
    pub display: Option<String>,
    pub message: Option<String>,
}

impl CodeValidation {
    pub fn valid() -> Self {
        Self {
            valid: true,
            display: None,
            message: None,
        }
    }

    pub fn valid_with_display(display: impl Into<String>) -> Self {
        Self {
            valid: true,
            display: Some(display.into()),
            message: None,
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            display: None,
            message: None,
        }
    }

    pub fn invalid_with_message(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            display: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_requires_type_and_url() {
        assert!(
            StructureDefinition::from_value(json!({
                "resourceType": "StructureDefinition",
                "url": "http://example.org/sd/a",
                "status": "active"
            }))
            .is_some()
        );

        // Wrong type
        assert!(
            StructureDefinition::from_value(json!({
                "resourceType": "ValueSet",
                "url": "http://example.org/vs/a"
            }))
            .is_none()
        );

        // Missing url
        assert!(
            StructureDefinition::from_value(json!({
                "resourceType": "StructureDefinition"
            }))
            .is_none()
        );
    }

    #[test]
    fn snapshot_and_differential_detection() {
        let sd = StructureDefinition::from_value(json!({
            "resourceType": "StructureDefinition",
            "url": "http://example.org/sd/a",
            "differential": { "element": [{"path": "Patient.name"}] }
        }))
        .unwrap();
        assert!(!sd.has_snapshot());
        assert!(sd.has_differential());
    }
}

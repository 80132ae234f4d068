//! Thin validation engine backed by the support chain.
//!
//! The gateway's job is aggregating validation support and enriching
//! results; deep FHIR semantics stay out of scope. This engine performs
//! the structural checks that exercise the chain: the resource type must
//! resolve to a base definition, every declared profile must resolve,
//! required top-level elements from the resolved snapshots must be
//! present, and the resource language must be a well-formed code.

use async_trait::async_trait;
use marshal_core::support::base_profile_url;
use marshal_core::{CachingSupport, IssueSeverity, StructureDefinition, ValidationIssue};
use serde_json::Value;

#[async_trait]
pub trait ValidationEngine: Send + Sync {
    async fn validate(&self, resource: &Value, chain: &CachingSupport) -> Vec<ValidationIssue>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicValidationEngine;

impl BasicValidationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Required top-level elements: snapshot entries of the form
    /// `Type.field` with `min >= 1`. Choice elements (`value[x]`) are
    /// skipped; resolving the chosen type is the full validator's job.
    fn check_required_elements(
        resource: &Value,
        resource_type: &str,
        profile: &StructureDefinition,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let Some(elements) = profile
            .as_value()
            .pointer("/snapshot/element")
            .and_then(Value::as_array)
        else {
            return;
        };

        for element in elements {
            let min = element.get("min").and_then(Value::as_u64).unwrap_or(0);
            if min == 0 {
                continue;
            }
            let Some(path) = element.get("path").and_then(Value::as_str) else {
                continue;
            };
            let Some(field) = path.strip_prefix(&format!("{resource_type}.")) else {
                continue;
            };
            if field.contains('.') || field.contains("[x]") {
                continue;
            }
            let present = match resource.get(field) {
                None | Some(Value::Null) => false,
                Some(Value::Array(items)) => !items.is_empty(),
                Some(_) => true,
            };
            if !present {
                issues.push(
                    ValidationIssue::new(
                        IssueSeverity::Error,
                        format!("Required element '{field}' is missing (defined by {})", profile.url()),
                    )
                    .at(path),
                );
            }
        }
    }
}

#[async_trait]
impl ValidationEngine for BasicValidationEngine {
    async fn validate(&self, resource: &Value, chain: &CachingSupport) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let Some(resource_type) = resource.get("resourceType").and_then(Value::as_str) else {
            issues.push(ValidationIssue::new(
                IssueSeverity::Fatal,
                "Resource carries no resourceType and cannot be validated",
            ));
            return issues;
        };

        match chain.resolve_profile(&base_profile_url(resource_type)).await {
            Some(base) => {
                Self::check_required_elements(resource, resource_type, &base, &mut issues);
            }
            None => {
                issues.push(
                    ValidationIssue::new(
                        IssueSeverity::Error,
                        format!("Unknown resource type '{resource_type}'"),
                    )
                    .at(resource_type),
                );
            }
        }

        if let Some(profiles) = resource.pointer("/meta/profile").and_then(Value::as_array) {
            for (i, declared) in profiles.iter().enumerate() {
                let Some(profile_url) = declared.as_str() else {
                    continue;
                };
                match chain.resolve_profile(profile_url).await {
                    Some(profile) => {
                        Self::check_required_elements(resource, resource_type, &profile, &mut issues);
                    }
                    None => {
                        issues.push(
                            ValidationIssue::new(
                                IssueSeverity::Error,
                                format!("Profile '{profile_url}' could not be resolved"),
                            )
                            .at(format!("{resource_type}.meta.profile[{i}]")),
                        );
                    }
                }
            }
        }

        if let Some(language) = resource.get("language").and_then(Value::as_str) {
            let verdict = chain
                .validate_code(Some("urn:ietf:bcp:47"), language, None)
                .await;
            if let Some(verdict) = verdict
                && !verdict.valid
            {
                issues.push(
                    ValidationIssue::new(
                        IssueSeverity::Warning,
                        format!("'{language}' is not a valid language code"),
                    )
                    .at(format!("{resource_type}.language")),
                );
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marshal_config::{CacheSettings, FhirSettings, HttpClientSettings};
    use marshal_core::ChainBuilder;
    use serde_json::json;
    use std::sync::Arc;

    async fn local_chain() -> Arc<CachingSupport> {
        ChainBuilder::new(
            FhirSettings::default(),
            HttpClientSettings::default(),
            CacheSettings::default(),
        )
        .build()
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn valid_patient_produces_no_issues() {
        let chain = local_chain().await;
        let issues = BasicValidationEngine::new()
            .validate(&json!({"resourceType": "Patient", "language": "en"}), &chain)
            .await;
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[tokio::test]
    async fn missing_resource_type_is_fatal() {
        let chain = local_chain().await;
        let issues = BasicValidationEngine::new()
            .validate(&json!({"name": []}), &chain)
            .await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Fatal);
    }

    #[tokio::test]
    async fn unknown_resource_type_is_an_error_not_a_crash() {
        let chain = local_chain().await;
        let issues = BasicValidationEngine::new()
            .validate(&json!({"resourceType": "Wombat"}), &chain)
            .await;
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("Wombat"));
    }

    #[tokio::test]
    async fn unresolved_declared_profile_is_reported_with_its_index() {
        let chain = local_chain().await;
        let issues = BasicValidationEngine::new()
            .validate(
                &json!({
                    "resourceType": "Patient",
                    "meta": {"profile": ["http://example.org/sd/unknown"]}
                }),
                &chain,
            )
            .await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location_expression, "Patient.meta.profile[0]");
    }

    #[tokio::test]
    async fn bad_language_code_is_a_warning() {
        let chain = local_chain().await;
        let issues = BasicValidationEngine::new()
            .validate(&json!({"resourceType": "Patient", "language": "q"}), &chain)
            .await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
        assert_eq!(issues[0].location_expression, "Patient.language");
    }
}

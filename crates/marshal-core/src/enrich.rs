//! Post-validation enrichment.
//!
//! Re-interprets each raw issue's location expression as a structural
//! query against the validated resource and attaches every matched
//! sub-element or sub-resource, serialized, to the issue. Enrichment is
//! strictly best-effort: a failing expression empties the issue's location
//! elements but never the issue itself.

use std::sync::Arc;

use serde_json::{Value, json};

/// Placeholder used in synthesized location descriptors when a line or
/// column is absent or carries the `-1` sentinel.
const UNKNOWN: &str = "(unknown)";

/// Line/column values of `-1` mean "not known" in validator output.
const UNKNOWN_SENTINEL: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Fatal => "fatal",
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Information => "information",
        }
    }
}

/// Raw issue produced by the validation engine. Read-only input to
/// enrichment.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub message: String,
    pub location_expression: String,
    pub location_line: Option<i32>,
    pub location_col: Option<i32>,
}

impl ValidationIssue {
    pub fn new(severity: IssueSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location_expression: String::new(),
            location_line: None,
            location_col: None,
        }
    }

    pub fn at(mut self, expression: impl Into<String>) -> Self {
        self.location_expression = expression.into();
        self
    }
}

/// Raw issue plus resolved location elements and a rendering descriptor.
/// Created exactly once per raw issue.
#[derive(Debug, Clone)]
pub struct EnrichedIssue {
    pub severity: IssueSeverity,
    pub message: String,
    pub location_expression: String,
    pub location_line: Option<i32>,
    pub location_col: Option<i32>,
    pub location_elements: Vec<String>,
    pub location_description: Option<String>,
}

/// Outcome of classifying one structural-query match.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(Value),
    Skipped(String),
}

/// Wrapper pseudo-resource for matches that are bare elements rather than
/// stand-alone resources, so they pass through the same serialization
/// facility. Holds exactly one element and has no FHIR resource type of
/// its own.
pub struct ElementContainer;

impl ElementContainer {
    pub const RESOURCE_TYPE: &'static str = "Container";

    pub fn wrap(element: Value) -> Value {
        json!({
            "resourceType": Self::RESOURCE_TYPE,
            "element": element,
        })
    }

    pub fn unwrap(container: &Value) -> Option<&Value> {
        if container.get("resourceType").and_then(Value::as_str) == Some(Self::RESOURCE_TYPE) {
            container.get("element")
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("location query evaluation failed: {0}")]
pub struct EvaluationError(pub String);

/// Structural-query capability; the gateway ships a location-path
/// implementation and admits a full FHIRPath engine through this seam.
pub trait LocationEvaluator: Send + Sync {
    fn evaluate(&self, resource: &Value, expression: &str) -> Result<Vec<Value>, EvaluationError>;
}

/// Document serialization capability for matched elements/resources.
pub trait ResourceSerializer: Send + Sync {
    fn serialize(&self, resource: &Value) -> Result<String, serde_json::Error>;
}

/// Classify one match: stand-alone resources serialize directly, bare
/// elements go through the [`ElementContainer`], anything else is skipped
/// with a reason.
pub fn classify_match(matched: &Value, expression: &str) -> MatchOutcome {
    match matched {
        Value::Object(map) if map.get("resourceType").and_then(Value::as_str).is_some() => {
            MatchOutcome::Matched(matched.clone())
        }
        Value::Object(_) | Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            MatchOutcome::Matched(ElementContainer::wrap(matched.clone()))
        }
        other => MatchOutcome::Skipped(format!(
            "match of type {} for expression '{expression}' is neither resource nor element",
            value_type_name(other)
        )),
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Derive the rendering descriptor for an issue's location.
///
/// The expression text wins when non-blank; otherwise a `Line[L] Col[C]`
/// label is synthesized when either coordinate is known, with `(unknown)`
/// standing in for an absent or `-1` coordinate.
pub fn location_description(
    expression: &str,
    line: Option<i32>,
    col: Option<i32>,
) -> Option<String> {
    if !expression.trim().is_empty() {
        return Some(expression.to_string());
    }
    let known = |v: Option<i32>| v.filter(|&n| n != UNKNOWN_SENTINEL);
    let (line, col) = (known(line), known(col));
    if line.is_none() && col.is_none() {
        return None;
    }
    let render = |v: Option<i32>| v.map_or_else(|| UNKNOWN.to_string(), |n| n.to_string());
    Some(format!("Line[{}] Col[{}]", render(line), render(col)))
}

/// Evaluates issue locations against the validated resource.
///
/// Collaborators are passed in explicitly; the resolver holds no global
/// state and may be shared across concurrent requests.
pub struct LocationResolver {
    evaluator: Arc<dyn LocationEvaluator>,
    serializer: Arc<dyn ResourceSerializer>,
}

impl LocationResolver {
    pub fn new(evaluator: Arc<dyn LocationEvaluator>, serializer: Arc<dyn ResourceSerializer>) -> Self {
        Self {
            evaluator,
            serializer,
        }
    }

    /// Enrich raw issues, one-to-one and order-preserving.
    ///
    /// An empty input yields exactly one synthesized informational issue
    /// so the report is never silently empty.
    pub fn resolve(&self, resource: &Value, raw_issues: &[ValidationIssue]) -> Vec<EnrichedIssue> {
        if raw_issues.is_empty() {
            return vec![EnrichedIssue {
                severity: IssueSeverity::Information,
                message: "No issues detected during validation".to_string(),
                location_expression: String::new(),
                location_line: None,
                location_col: None,
                location_elements: Vec::new(),
                location_description: None,
            }];
        }

        let navigable = resource.is_object();
        if !navigable {
            tracing::warn!(
                "resource is not a structured document; location queries skipped for all issues"
            );
        }

        raw_issues
            .iter()
            .map(|issue| self.enrich_one(resource, issue, navigable))
            .collect()
    }

    fn enrich_one(
        &self,
        resource: &Value,
        issue: &ValidationIssue,
        navigable: bool,
    ) -> EnrichedIssue {
        let mut elements = Vec::new();
        if navigable && !issue.location_expression.trim().is_empty() {
            match self.evaluator.evaluate(resource, &issue.location_expression) {
                Ok(matches) => {
                    for matched in &matches {
                        match classify_match(matched, &issue.location_expression) {
                            MatchOutcome::Matched(document) => {
                                match self.serializer.serialize(&document) {
                                    Ok(encoded) => elements.push(encoded),
                                    Err(e) => tracing::warn!(
                                        expression = %issue.location_expression,
                                        error = %e,
                                        "matched element could not be serialized; skipping match"
                                    ),
                                }
                            }
                            MatchOutcome::Skipped(reason) => tracing::warn!("{reason}"),
                        }
                    }
                }
                Err(e) => {
                    // Base fields survive; only the enrichment degrades.
                    tracing::warn!(
                        expression = %issue.location_expression,
                        error = %e,
                        "location query failed; issue emitted without location elements"
                    );
                    elements.clear();
                }
            }
        }

        EnrichedIssue {
            severity: issue.severity,
            message: issue.message.clone(),
            location_expression: issue.location_expression.clone(),
            location_line: issue.location_line,
            location_col: issue.location_col,
            location_elements: elements,
            location_description: location_description(
                &issue.location_expression,
                issue.location_line,
                issue.location_col,
            ),
        }
    }
}

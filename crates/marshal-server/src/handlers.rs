//! HTTP entry points: the validation endpoint plus service endpoints.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use marshal_core::EnrichedIssue;

use crate::server::AppState;

const NDJSON_CONTENT_TYPE: &str = "application/fhir+ndjson";

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "FHIR Marshal",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz() -> impl IntoResponse {
    // The chain is built before the listener binds; reachable means ready.
    (StatusCode::OK, Json(HealthResponse { status: "ready" }))
}

pub async fn metadata() -> impl IntoResponse {
    let body = json!({
        "resourceType": "CapabilityStatement",
        "status": "active",
        "kind": "instance",
        "software": { "name": "FHIR Marshal", "version": env!("CARGO_PKG_VERSION") },
        "format": ["application/fhir+json", "application/fhir+ndjson"],
    });
    (StatusCode::OK, Json(body))
}

/// Main entry point for the HTTP API: validates a single resource or an
/// NDJSON stream of resources and answers with OperationOutcome reports.
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match content_type.as_str() {
        "application/xml" | "application/fhir+xml" | "text/xml" => unsupported_xml(),
        "application/ndjson" | "application/fhir+ndjson" => validate_ndjson(&state, &body).await,
        _ => validate_json(&state, &body).await,
    }
}

fn unsupported_xml() -> Response {
    let outcome = error_outcome(
        "not-supported",
        "XML request bodies are not supported; submit application/fhir+json or application/fhir+ndjson",
    );
    (StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(outcome)).into_response()
}

async fn validate_json(state: &AppState, body: &str) -> Response {
    let resource: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "request body could not be parsed as a FHIR resource");
            let outcome = error_outcome(
                "structure",
                format!("Request body is not parseable JSON: {e}"),
            );
            return (StatusCode::BAD_REQUEST, Json(outcome)).into_response();
        }
    };

    let outcome = validate_one(state, &resource).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/fhir+json")],
        // Pretty output mirrors what the validation report is for: humans.
        serde_json::to_string_pretty(&outcome).unwrap_or_else(|_| outcome.to_string()),
    )
        .into_response()
}

/// One outcome line per non-empty input line, in input order.
async fn validate_ndjson(state: &AppState, body: &str) -> Response {
    let mut outcome_lines = Vec::new();
    for (index, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = match serde_json::from_str::<Value>(line) {
            Ok(resource) => validate_one(state, &resource).await,
            Err(e) => error_outcome(
                "structure",
                format!("Line {}: not parseable JSON: {e}", index + 1),
            ),
        };
        outcome_lines.push(outcome.to_string());
    }

    if outcome_lines.is_empty() {
        let outcome = error_outcome("structure", "NDJSON body contained no resources");
        return (StatusCode::BAD_REQUEST, Json(outcome)).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        outcome_lines.join("\n"),
    )
        .into_response()
}

async fn validate_one(state: &AppState, resource: &Value) -> Value {
    let raw_issues = state.engine.validate(resource, &state.chain).await;
    let enriched = state.resolver.resolve(resource, &raw_issues);
    tracing::info!(
        resource_type = %resource.get("resourceType").and_then(|v| v.as_str()).unwrap_or("unknown"),
        issues = raw_issues.len(),
        "validated"
    );
    render_outcome(&enriched)
}

/// Render enriched issues as a FHIR OperationOutcome.
///
/// Each issue's `location` carries the location descriptor, a
/// `Line L, Col C` label when either coordinate is known, and every
/// serialized location element.
fn render_outcome(issues: &[EnrichedIssue]) -> Value {
    let rendered: Vec<Value> = issues
        .iter()
        .map(|issue| {
            let mut location: Vec<String> = Vec::new();
            if let Some(description) = &issue.location_description {
                location.push(description.clone());
            }
            if let Some(label) = line_col_label(issue.location_line, issue.location_col) {
                location.push(label);
            }
            location.extend(issue.location_elements.iter().cloned());

            let code = match issue.severity {
                marshal_core::IssueSeverity::Information => "informational",
                _ => "processing",
            };
            let mut rendered = json!({
                "severity": issue.severity.as_str(),
                "code": code,
                "diagnostics": issue.message,
            });
            if !location.is_empty() {
                rendered["location"] = json!(location);
            }
            rendered
        })
        .collect();

    json!({
        "resourceType": "OperationOutcome",
        "issue": rendered,
    })
}

fn line_col_label(line: Option<i32>, col: Option<i32>) -> Option<String> {
    let known = |v: Option<i32>| v.filter(|&n| n != -1);
    let (line, col) = (known(line), known(col));
    if line.is_none() && col.is_none() {
        return None;
    }
    let render = |v: Option<i32>| v.map_or_else(|| "(unknown)".to_string(), |n| n.to_string());
    Some(format!("Line {}, Col {}", render(line), render(col)))
}

fn error_outcome(code: &str, diagnostics: impl Into<String>) -> Value {
    json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": "error",
            "code": code,
            "diagnostics": diagnostics.into(),
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marshal_core::IssueSeverity;

    fn enriched(severity: IssueSeverity) -> EnrichedIssue {
        EnrichedIssue {
            severity,
            message: "message".into(),
            location_expression: "Patient.name".into(),
            location_line: Some(4),
            location_col: None,
            location_elements: vec!["{\"family\":\"Chalmers\"}".into()],
            location_description: Some("Patient.name".into()),
        }
    }

    #[test]
    fn outcome_carries_descriptor_label_and_elements() {
        let outcome = render_outcome(&[enriched(IssueSeverity::Error)]);
        let issue = &outcome["issue"][0];
        assert_eq!(issue["severity"], "error");
        assert_eq!(issue["code"], "processing");
        let location = issue["location"].as_array().unwrap();
        assert_eq!(location.len(), 3);
        assert_eq!(location[0], "Patient.name");
        assert_eq!(location[1], "Line 4, Col (unknown)");
        assert_eq!(location[2], "{\"family\":\"Chalmers\"}");
    }

    #[test]
    fn informational_issues_use_the_informational_code() {
        let outcome = render_outcome(&[enriched(IssueSeverity::Information)]);
        assert_eq!(outcome["issue"][0]["code"], "informational");
    }

    #[test]
    fn line_col_label_needs_at_least_one_known_coordinate() {
        assert_eq!(line_col_label(None, None), None);
        assert_eq!(line_col_label(Some(-1), None), None);
        assert_eq!(line_col_label(Some(3), Some(9)).as_deref(), Some("Line 3, Col 9"));
    }
}

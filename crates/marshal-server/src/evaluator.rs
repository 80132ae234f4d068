//! Location-path evaluation and document serialization.
//!
//! Validators report issue locations in the dotted-index form
//! `Patient.name[0].given[1]`. This evaluator resolves that grammar
//! against a JSON resource; a full FHIRPath engine can be substituted
//! through the `LocationEvaluator` seam without touching enrichment.

use marshal_core::{EvaluationError, LocationEvaluator, ResourceSerializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocationPathEvaluator;

impl LocationPathEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl LocationEvaluator for LocationPathEvaluator {
    fn evaluate(&self, resource: &Value, expression: &str) -> Result<Vec<Value>, EvaluationError> {
        let segments = parse_expression(expression)?;
        let mut current: Vec<&Value> = vec![resource];

        for (position, segment) in segments.iter().enumerate() {
            // The leading segment may simply restate the resource type.
            if position == 0
                && segment.index.is_none()
                && resource.get("resourceType").and_then(Value::as_str) == Some(&segment.name)
            {
                continue;
            }

            let mut next = Vec::new();
            for value in current {
                let Some(child) = value.get(&segment.name) else {
                    continue;
                };
                match (child, segment.index) {
                    (Value::Array(items), Some(idx)) => {
                        if let Some(item) = items.get(idx) {
                            next.push(item);
                        }
                    }
                    (Value::Array(items), None) => next.extend(items.iter()),
                    // Indexing a singular element: only [0] addresses it.
                    (other, Some(0)) | (other, None) => next.push(other),
                    (_, Some(_)) => {}
                }
            }
            current = next;
        }

        Ok(current.into_iter().cloned().collect())
    }
}

struct Segment {
    name: String,
    index: Option<usize>,
}

fn parse_expression(expression: &str) -> Result<Vec<Segment>, EvaluationError> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(EvaluationError("expression is empty".into()));
    }

    trimmed.split('.').map(parse_segment).collect()
}

fn parse_segment(raw: &str) -> Result<Segment, EvaluationError> {
    let (name, index) = match raw.find('[') {
        Some(open) => {
            let Some(close) = raw.rfind(']') else {
                return Err(EvaluationError(format!("unterminated index in '{raw}'")));
            };
            if close != raw.len() - 1 || close <= open + 1 {
                return Err(EvaluationError(format!("malformed index in '{raw}'")));
            }
            let index: usize = raw[open + 1..close]
                .parse()
                .map_err(|_| EvaluationError(format!("non-numeric index in '{raw}'")))?;
            (&raw[..open], Some(index))
        }
        None => (raw, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(EvaluationError(format!("invalid path segment '{raw}'")));
    }

    Ok(Segment {
        name: name.to_string(),
        index,
    })
}

/// JSON rendering of matched elements and resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResourceSerializer;

impl JsonResourceSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceSerializer for JsonResourceSerializer {
    fn serialize(&self, resource: &Value) -> Result<String, serde_json::Error> {
        serde_json::to_string(resource)
    }
}

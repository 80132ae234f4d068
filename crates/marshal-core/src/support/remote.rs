//! Remote terminology service provider.
//!
//! Delegates code validation to one configured terminology server through
//! the `$validate-code` operation and decodes the FHIR `Parameters`
//! answer. Transport failures at lookup time are logged and treated as a
//! lookup miss so a later provider (or the engine's unknown-code handling)
//! takes over; only the startup preflight is allowed to fail the service.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::RemoteServerClient;
use crate::types::CodeValidation;

use super::ValidationSupport;

pub struct RemoteTerminologySupport {
    client: RemoteServerClient,
}

impl RemoteTerminologySupport {
    pub fn new(client: RemoteServerClient) -> Self {
        Self { client }
    }

    pub fn server_name(&self) -> &str {
        self.client.name()
    }

    fn validate_code_url(
        &self,
        system: Option<&str>,
        code: &str,
        value_set_url: Option<&str>,
    ) -> Option<String> {
        let encode = |s: &str| url_encode(s);
        match (value_set_url, system) {
            (Some(vs), _) => {
                let mut url = format!(
                    "{}/ValueSet/$validate-code?url={}&code={}",
                    self.client.base_url(),
                    encode(vs),
                    encode(code)
                );
                if let Some(sys) = system {
                    url.push_str(&format!("&system={}", encode(sys)));
                }
                Some(url)
            }
            (None, Some(sys)) => Some(format!(
                "{}/CodeSystem/$validate-code?url={}&code={}",
                self.client.base_url(),
                encode(sys),
                encode(code)
            )),
            // Nothing to validate against.
            (None, None) => None,
        }
    }
}

#[async_trait]
impl ValidationSupport for RemoteTerminologySupport {
    fn name(&self) -> &str {
        "remote-terminology"
    }

    async fn validate_code(
        &self,
        system: Option<&str>,
        code: &str,
        value_set_url: Option<&str>,
    ) -> Option<CodeValidation> {
        let url = self.validate_code_url(system, code, value_set_url)?;
        let parameters = match self.client.get_json(&url).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    server = %self.client.name(),
                    code = %code,
                    error = %e,
                    "remote code validation failed; treating as lookup miss"
                );
                return None;
            }
        };
        decode_parameters(&parameters)
    }
}

/// Decode a `Parameters` answer: `result` (boolean) is required for an
/// opinion, `display` and `message` are carried when present.
fn decode_parameters(parameters: &Value) -> Option<CodeValidation> {
    if parameters.get("resourceType").and_then(Value::as_str) != Some("Parameters") {
        return None;
    }
    let entries = parameters.get("parameter").and_then(Value::as_array)?;
    let find_param = |name: &str| {
        entries
            .iter()
            .find(|p| p.get("name").and_then(Value::as_str) == Some(name))
    };

    let valid = find_param("result")?.get("valueBoolean")?.as_bool()?;
    let display = find_param("display")
        .and_then(|p| p.get("valueString"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = find_param("message")
        .and_then(|p| p.get("valueString"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(CodeValidation {
        valid,
        display,
        message,
    })
}

/// Percent-encode a query value. Covers the reserved characters canonical
/// URLs and codes actually contain.
fn url_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

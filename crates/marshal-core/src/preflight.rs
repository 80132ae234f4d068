//! Startup conformance preflight.
//!
//! Every configured server must answer its capability probe before the
//! service accepts traffic; an incomplete validation chain is worse than
//! no service. Failures abort boot and are not retried here.

use serde_json::Value;

use crate::client::RemoteServerClient;
use crate::error::{ChainError, ServerRole};

/// Probe `{url}/metadata` and require a FHIR CapabilityStatement answer.
///
/// Logs server identity and FHIR version on success. Any transport or
/// protocol failure becomes a [`ChainError::Configuration`] naming the
/// server's role, logical name, and URL.
pub async fn preflight(role: ServerRole, client: &RemoteServerClient) -> crate::error::Result<()> {
    let url = format!("{}/metadata", client.base_url());
    let capabilities = client.get_json(&url).await.map_err(|e| {
        ChainError::configuration(role, client.name(), client.base_url(), e)
    })?;

    let resource_type = capabilities
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if resource_type != "CapabilityStatement" {
        return Err(ChainError::Configuration {
            role,
            server: client.name().to_string(),
            url: client.base_url(),
            source: format!("metadata endpoint answered with a '{resource_type}' resource").into(),
        });
    }

    let fhir_version = capabilities
        .get("fhirVersion")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let software_name = capabilities
        .pointer("/software/name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let software_version = capabilities
        .pointer("/software/version")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    tracing::info!(
        role = %role,
        server = %client.name(),
        url = %client.base_url(),
        fhir_version = %fhir_version,
        software = %format!("{software_name} {software_version}"),
        "connected to remote server"
    );
    Ok(())
}

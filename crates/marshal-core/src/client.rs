//! HTTP access to one configured remote FHIR server.

use marshal_config::{HttpClientSettings, ServerSettings};
use reqwest::header;
use serde_json::Value;

use crate::error::ClientError;

/// Build the shared outbound HTTP client with per-call timeouts.
///
/// Timeout expiry surfaces as a transport failure on the individual call.
pub fn build_http_client(
    http: &HttpClientSettings,
) -> std::result::Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(http.connect_timeout())
        .timeout(http.read_timeout())
        .build()
}

/// Executes GETs against one named remote server, attaching basic auth
/// when the server's settings carry both credentials.
#[derive(Debug, Clone)]
pub struct RemoteServerClient {
    name: String,
    settings: ServerSettings,
    client: reqwest::Client,
}

impl RemoteServerClient {
    pub fn new(name: impl Into<String>, settings: ServerSettings, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            settings,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        self.settings.base_url()
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json(&self, url: &str) -> Result<Value, ClientError> {
        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/fhir+json");
        if let Some((user, password)) = self.settings.basic_auth() {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|e| ClientError::Transport {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(server = %self.name, url = %url, status = status.as_u16(), "remote server answered with error status");
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| ClientError::Decode {
            url: url.to_string(),
            source: e,
        })
    }
}

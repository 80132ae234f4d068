//! Validation-chain assembly.
//!
//! Runs the startup sequence: preflight every configured server, retrieve
//! structure definitions from every structure server, assemble the
//! provider chain in priority order, and wrap it in the lookup cache. Any
//! failure aborts the build; no partial chain is ever handed out.

use std::sync::Arc;

use marshal_config::{AppConfig, CacheSettings, FhirSettings, HttpClientSettings};
use serde_json::Value;

use crate::client::{RemoteServerClient, build_http_client};
use crate::error::ServerRole;
use crate::preflight::preflight;
use crate::retrieval::retrieve_structure_definitions;
use crate::support::{
    CachingSupport, CommonCodeSystemsSupport, DefaultProfileSupport, InMemoryTerminologySupport,
    PrePopulatedSupport, RemoteTerminologySupport, SnapshotGeneratingSupport, SupportChain,
    ValidationSupport,
};

pub struct ChainBuilder {
    fhir: FhirSettings,
    http: HttpClientSettings,
    cache: CacheSettings,
    in_memory: InMemoryTerminologySupport,
}

impl ChainBuilder {
    pub fn new(fhir: FhirSettings, http: HttpClientSettings, cache: CacheSettings) -> Self {
        Self {
            fhir,
            http,
            cache,
            in_memory: InMemoryTerminologySupport::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.fhir.clone(),
            config.http.clone(),
            config.cache.clone(),
        )
    }

    /// Seed the in-memory terminology provider with a CodeSystem document.
    pub fn with_code_system(mut self, document: Value) -> Self {
        self.in_memory.add_code_system(document);
        self
    }

    /// Seed the in-memory terminology provider with a ValueSet document.
    pub fn with_value_set(mut self, document: Value) -> Self {
        self.in_memory.add_value_set(document);
        self
    }

    /// Build the chain: preflight, retrieve, assemble, wrap in the cache.
    pub async fn build(self) -> crate::error::Result<Arc<CachingSupport>> {
        let http_client = build_http_client(&self.http)?;

        // Preflight both maps; terminology first, each in name order, so a
        // misconfiguration always fails the same way.
        let mut terminology_clients = Vec::new();
        for (name, settings) in &self.fhir.remote_terminology_servers {
            let client = RemoteServerClient::new(name, settings.clone(), http_client.clone());
            preflight(ServerRole::Terminology, &client).await?;
            terminology_clients.push(client);
        }
        let mut structure_clients = Vec::new();
        for (name, settings) in &self.fhir.remote_structure_servers {
            let client = RemoteServerClient::new(name, settings.clone(), http_client.clone());
            preflight(ServerRole::Structure, &client).await?;
            structure_clients.push(client);
        }

        // Union of every structure server's definitions, in server order.
        let mut prepopulated = PrePopulatedSupport::new();
        for client in &structure_clients {
            let definitions =
                retrieve_structure_definitions(client, &self.fhir.retrieval).await?;
            tracing::info!(
                server = %client.name(),
                definitions = definitions.len(),
                "seeding pre-populated provider"
            );
            for sd in definitions {
                prepopulated.add(sd);
            }
        }

        let snapshot_generator = Arc::new(SnapshotGeneratingSupport::new());
        let mut providers: Vec<Arc<dyn ValidationSupport>> = vec![
            Arc::new(DefaultProfileSupport::new()),
            Arc::new(CommonCodeSystemsSupport::new()),
            Arc::new(self.in_memory),
        ];
        for client in terminology_clients {
            providers.push(Arc::new(RemoteTerminologySupport::new(client)));
        }
        providers.push(snapshot_generator.clone());
        providers.push(Arc::new(prepopulated));

        let chain = SupportChain::new(providers, snapshot_generator);
        tracing::info!(providers = ?chain.provider_names(), "validation support chain assembled");
        Ok(Arc::new(CachingSupport::new(chain, self.cache.ttl())))
    }
}

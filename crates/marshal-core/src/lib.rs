//! Validation-support aggregation and result enrichment for the FHIR
//! Marshal gateway.
//!
//! The crate covers the startup side (capability preflight, paginated
//! StructureDefinition retrieval, provider-chain assembly with a TTL
//! lookup cache) and the request side (re-locating each validation
//! issue inside the validated resource). The HTTP controller and the
//! validation engine itself live in `marshal-server`; they consume this
//! crate through [`ChainBuilder`] and [`LocationResolver`].

pub mod builder;
pub mod client;
pub mod enrich;
pub mod error;
pub mod preflight;
pub mod retrieval;
pub mod support;
pub mod types;

pub use builder::ChainBuilder;
pub use client::{RemoteServerClient, build_http_client};
pub use enrich::{
    ElementContainer, EnrichedIssue, EvaluationError, IssueSeverity, LocationEvaluator,
    LocationResolver, MatchOutcome, ResourceSerializer, ValidationIssue, classify_match,
    location_description,
};
pub use error::{ChainError, ClientError, ServerRole};
pub use retrieval::retrieve_structure_definitions;
pub use support::{CachingSupport, SupportChain, ValidationSupport};
pub use types::{CodeValidation, StructureDefinition};

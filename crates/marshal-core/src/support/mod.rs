//! Validation-support providers and their fallback chain.
//!
//! A provider answers "resolve profile by URL" and/or "validate code
//! against system/value set" lookups. The chain consults providers in a
//! fixed priority order and returns the first non-`None` answer; no answer
//! at all is a lookup miss, which the validation engine turns into a
//! normal validation issue rather than a system error.

mod cache;
mod chain;
mod common_codes;
mod defaults;
mod in_memory;
mod prepopulated;
mod remote;
mod snapshot;

pub use cache::{CachingSupport, LookupKind};
pub use chain::SupportChain;
pub use common_codes::CommonCodeSystemsSupport;
pub use defaults::{DefaultProfileSupport, base_profile_url};
pub use in_memory::InMemoryTerminologySupport;
pub use prepopulated::PrePopulatedSupport;
pub use remote::RemoteTerminologySupport;
pub use snapshot::SnapshotGeneratingSupport;

use async_trait::async_trait;

use crate::types::{CodeValidation, StructureDefinition};

/// One lookup provider in the validation-support chain.
///
/// Providers implement only the capability they carry; the default
/// implementations decline every lookup.
#[async_trait]
pub trait ValidationSupport: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_structure_definition(&self, _url: &str) -> Option<StructureDefinition> {
        None
    }

    async fn validate_code(
        &self,
        _system: Option<&str>,
        _code: &str,
        _value_set_url: Option<&str>,
    ) -> Option<CodeValidation> {
        None
    }
}

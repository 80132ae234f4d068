//! Ordered fallback chain over validation-support providers.

use std::sync::Arc;

use crate::types::{CodeValidation, StructureDefinition};

use super::{SnapshotGeneratingSupport, ValidationSupport};

/// Profiles may inherit through at most this many differential-only
/// ancestors before snapshot completion gives up.
const MAX_BASE_DEPTH: usize = 16;

/// Immutable, ordered list of lookup providers.
///
/// Assembled once at startup and read-only afterwards; request handling
/// never mutates it. Profile resolution additionally completes missing
/// snapshots through the chain's snapshot generator, so callers always see
/// a snapshot-bearing profile when one can be derived.
pub struct SupportChain {
    providers: Vec<Arc<dyn ValidationSupport>>,
    snapshot_generator: Arc<SnapshotGeneratingSupport>,
}

impl SupportChain {
    pub fn new(
        providers: Vec<Arc<dyn ValidationSupport>>,
        snapshot_generator: Arc<SnapshotGeneratingSupport>,
    ) -> Self {
        Self {
            providers,
            snapshot_generator,
        }
    }

    /// Provider names in consultation order, for logging and tests.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// First non-`None` answer across providers, without snapshot
    /// completion.
    async fn fetch_raw(&self, url: &str) -> Option<StructureDefinition> {
        for provider in &self.providers {
            if let Some(sd) = provider.fetch_structure_definition(url).await {
                tracing::trace!(provider = %provider.name(), url = %url, "profile resolved");
                return Some(sd);
            }
        }
        None
    }

    /// Resolve a profile by canonical URL.
    ///
    /// A differential-only profile is completed by walking its
    /// `baseDefinition` ancestry through the chain and splicing the
    /// differential over the nearest snapshot. If no ancestor carries a
    /// snapshot the profile is returned as-is; the engine decides what to
    /// make of it.
    pub async fn resolve_profile(&self, url: &str) -> Option<StructureDefinition> {
        let sd = self.fetch_raw(url).await?;
        if sd.has_snapshot() || !sd.has_differential() {
            return Some(sd);
        }

        // Ancestor stack: [profile, base, base-of-base, ...] until a
        // snapshot-bearing ancestor or a dead end.
        let mut stack = vec![sd];
        for _ in 0..MAX_BASE_DEPTH {
            let top = stack.last().expect("stack is never empty");
            if top.has_snapshot() {
                break;
            }
            let Some(base_url) = top.base_definition().map(str::to_string) else {
                break;
            };
            let Some(base) = self.fetch_raw(&base_url).await else {
                tracing::warn!(url = %base_url, "base definition not resolvable; snapshot left incomplete");
                break;
            };
            stack.push(base);
        }

        Some(self.snapshot_generator.complete_from_ancestry(stack))
    }

    /// Validate a coded value; first provider with an opinion wins.
    pub async fn validate_code(
        &self,
        system: Option<&str>,
        code: &str,
        value_set_url: Option<&str>,
    ) -> Option<CodeValidation> {
        for provider in &self.providers {
            if let Some(result) = provider.validate_code(system, code, value_set_url).await {
                tracing::trace!(provider = %provider.name(), code = %code, "code lookup answered");
                return Some(result);
            }
        }
        None
    }
}

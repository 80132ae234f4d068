//! Pre-populated profile definitions retrieved at startup.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::StructureDefinition;

use super::ValidationSupport;

/// Last provider in the chain, seeded with the union of every
/// StructureDefinition retrieved from the configured structure servers.
pub struct PrePopulatedSupport {
    definitions: HashMap<String, StructureDefinition>,
}

impl PrePopulatedSupport {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    pub fn with_definitions(definitions: impl IntoIterator<Item = StructureDefinition>) -> Self {
        let mut support = Self::new();
        for sd in definitions {
            support.add(sd);
        }
        support
    }

    /// Later registrations win on URL collision; with several structure
    /// servers the last-configured server's copy is the one served.
    pub fn add(&mut self, definition: StructureDefinition) {
        let url = definition.url().to_string();
        if self.definitions.insert(url.clone(), definition).is_some() {
            tracing::debug!(url = %url, "replacing previously registered structure definition");
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for PrePopulatedSupport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationSupport for PrePopulatedSupport {
    fn name(&self) -> &str {
        "pre-populated"
    }

    async fn fetch_structure_definition(&self, url: &str) -> Option<StructureDefinition> {
        self.definitions.get(url).cloned()
    }
}

//! Paginated StructureDefinition retrieval from one configured server.
//!
//! Follows the Bundle "next" link verbatim rather than reconstructing
//! query parameters, so server-specific paging tokens survive untouched.

use std::collections::HashSet;

use marshal_config::RetrievalSettings;
use serde_json::Value;

use crate::client::RemoteServerClient;
use crate::error::ChainError;
use crate::types::StructureDefinition;

/// Upper bound on pages followed per server. A well-behaved server ends
/// pagination by omitting the "next" link long before this.
const MAX_PAGES: usize = 1000;

/// Collect every StructureDefinition the server offers, page by page.
///
/// The initial query asks for `_count` entries per page and an accurate
/// total, filtered to `status=active` unless the server's settings (or the
/// global default) turn that off. Entries that do not resolve to a
/// StructureDefinition are skipped silently; any transport or parse error
/// aborts the whole retrieval for this server.
pub async fn retrieve_structure_definitions(
    client: &RemoteServerClient,
    retrieval: &RetrievalSettings,
) -> crate::error::Result<Vec<StructureDefinition>> {
    let page_size = client.settings().effective_page_size(retrieval);
    let active_only = client.settings().effective_active_only(retrieval);

    let mut url = format!(
        "{}/StructureDefinition?_count={}&_total=accurate",
        client.base_url(),
        page_size
    );
    if active_only {
        url.push_str("&status=active");
    }

    let mut definitions = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        if !visited.insert(url.clone()) {
            return Err(ChainError::PaginationCycle {
                server: client.name().to_string(),
                url,
            });
        }
        if pages >= MAX_PAGES {
            return Err(ChainError::PageLimitExceeded {
                server: client.name().to_string(),
                limit: MAX_PAGES,
            });
        }

        let page = client.get_json(&url).await.map_err(|e| {
            ChainError::retrieval_caused_by(client.name(), format!("page fetch failed: {url}"), e)
        })?;
        pages += 1;

        let resource_type = page
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if resource_type != "Bundle" {
            return Err(ChainError::retrieval(
                client.name(),
                format!("expected a Bundle page, got '{resource_type}' from {url}"),
            ));
        }

        if let Some(entries) = page.get("entry").and_then(Value::as_array) {
            for entry in entries {
                let Some(resource) = entry.get("resource") else {
                    continue;
                };
                match StructureDefinition::from_value(resource.clone()) {
                    Some(sd) => definitions.push(sd),
                    None => {
                        tracing::debug!(
                            server = %client.name(),
                            resource_type = %resource.get("resourceType").and_then(|v| v.as_str()).unwrap_or("unknown"),
                            "skipping non-StructureDefinition bundle entry"
                        );
                    }
                }
            }
        }

        match next_link(&page) {
            Some(next) => url = next.to_string(),
            None => break,
        }
    }

    tracing::info!(
        server = %client.name(),
        pages = pages,
        definitions = definitions.len(),
        "structure definition retrieval finished"
    );
    Ok(definitions)
}

/// The page's "next" link, taken verbatim.
fn next_link(bundle: &Value) -> Option<&str> {
    bundle
        .get("link")
        .and_then(Value::as_array)?
        .iter()
        .find(|l| l.get("relation").and_then(Value::as_str) == Some("next"))
        .and_then(|l| l.get("url"))
        .and_then(Value::as_str)
}

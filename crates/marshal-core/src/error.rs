use thiserror::Error;

/// Role a remote server plays in the validation chain, used in error
/// messages and preflight logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    Structure,
    Terminology,
}

impl std::fmt::Display for ServerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Structure => write!(f, "structure"),
            Self::Terminology => write!(f, "terminology"),
        }
    }
}

/// Errors raised while talking to one remote server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors fatal to validation-chain assembly.
///
/// Any of these at startup prevents the service from accepting traffic;
/// no partial chain is ever put into service.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A configured server failed its conformance preflight.
    #[error("could not connect to {role} server '{server}' at {url}: {source}")]
    Configuration {
        role: ServerRole,
        server: String,
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport or parse failure mid-pagination. Not retried.
    #[error("structure definition retrieval from '{server}' failed: {detail}")]
    Retrieval {
        server: String,
        detail: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A page's "next" link pointed back at an already-fetched page.
    #[error("pagination cycle detected on '{server}': next link {url} was already fetched")]
    PaginationCycle { server: String, url: String },

    /// Safety cap on the number of pages followed per server.
    #[error("'{server}' produced more than {limit} pages without a final page")]
    PageLimitExceeded { server: String, limit: usize },

    /// The shared outbound HTTP client could not be constructed.
    #[error("outbound HTTP client could not be constructed: {source}")]
    HttpClient {
        #[from]
        source: reqwest::Error,
    },
}

impl ChainError {
    pub fn configuration(
        role: ServerRole,
        server: impl Into<String>,
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Configuration {
            role,
            server: server.into(),
            url: url.into(),
            source: Box::new(source),
        }
    }

    pub fn retrieval(server: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Retrieval {
            server: server.into(),
            detail: detail.into(),
            source: None,
        }
    }

    pub fn retrieval_caused_by(
        server: impl Into<String>,
        detail: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Retrieval {
            server: server.into(),
            detail: detail.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Convenience result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;

//! Remote SPARQL endpoint over the SPARQL 1.1 Protocol.
//!
//! Queries are POSTed as `application/sparql-query` and answered as
//! `application/sparql-results+json`. Every request carries the configured
//! timeout; expiry is reported as [`QueryFailure::Timeout`] and never retried.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{QueryFailure, QueryResult};

use super::{Solution, SparqlBackend};

const SPARQL_QUERY: &str = "application/sparql-query";
const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Longest error body kept in a [`QueryFailure::Status`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for one SPARQL endpoint.
///
/// The underlying `ureq::Agent` pools connections and is safe to share between
/// threads; it holds no per-query state.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    url: String,
    timeout: Duration,
    http: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct SparqlJsonResults {
    #[serde(default)]
    results: Option<SparqlJsonBindings>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SparqlJsonBindings {
    bindings: Vec<Solution>,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let http = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            url: url.into(),
            timeout,
            http,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn failure(&self, err: ureq::Error) -> QueryFailure {
        match err {
            ureq::Error::Status(status, resp) => {
                let mut body = resp.into_string().unwrap_or_default();
                if body.len() > MAX_ERROR_BODY {
                    let mut cut = MAX_ERROR_BODY;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                }
                QueryFailure::Status { status, body }
            }
            ureq::Error::Transport(transport) => {
                if is_timeout(&transport) {
                    QueryFailure::Timeout {
                        endpoint: self.url.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    QueryFailure::Transport {
                        endpoint: self.url.clone(),
                        message: transport.to_string(),
                    }
                }
            }
        }
    }
}

/// Whether a transport error was caused by the request timing out.
fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(transport);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        source = err.source();
    }
    transport.to_string().contains("timed out")
}

fn parse_results(body: &str) -> QueryResult<Vec<Solution>> {
    let parsed: SparqlJsonResults =
        serde_json::from_str(body).map_err(|e| QueryFailure::MalformedResponse {
            message: format!("invalid SPARQL JSON results: {e}"),
        })?;
    match (parsed.results, parsed.boolean) {
        (Some(results), _) => Ok(results.bindings),
        (None, Some(_)) => Err(QueryFailure::MalformedResponse {
            message: "endpoint returned a boolean result; expected SELECT bindings".into(),
        }),
        (None, None) => Err(QueryFailure::MalformedResponse {
            message: "response has neither `results` nor `boolean`".into(),
        }),
    }
}

impl SparqlBackend for HttpEndpoint {
    fn select(&self, query: &str) -> QueryResult<Vec<Solution>> {
        let resp = self
            .http
            .post(&self.url)
            .set("Content-Type", SPARQL_QUERY)
            .set("Accept", SPARQL_RESULTS_JSON)
            .send_string(query)
            .map_err(|e| self.failure(e))?;

        let body = resp.into_string().map_err(|e| {
            if matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                QueryFailure::Timeout {
                    endpoint: self.url.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                QueryFailure::Transport {
                    endpoint: self.url.clone(),
                    message: format!("failed to read response body: {e}"),
                }
            }
        })?;
        parse_results(&body)
    }

    fn describe(&self) -> String {
        format!("SPARQL endpoint {}", self.url)
    }
}

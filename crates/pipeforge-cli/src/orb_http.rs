//! HTTP-backed [`OrbSource`]: fetches an orb's rendered YAML source from the
//! CircleCI orb registry's public resolution endpoint.

use pipeforge_core::errors::CompileError;
use pipeforge_core::OrbSource;

const ORB_RESOLVE_URL: &str = "https://circleci.com/api/v2/orbs/resolve";

pub struct HttpOrbSource {
    client: reqwest::blocking::Client,
}

impl HttpOrbSource {
    pub fn new() -> Self {
        HttpOrbSource {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpOrbSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Deserialize)]
struct ResolveResponse {
    source: Option<String>,
}

impl OrbSource for HttpOrbSource {
    fn fetch(&self, reference: &str) -> Result<String, CompileError> {
        let response = self
            .client
            .get(ORB_RESOLVE_URL)
            .query(&[("orb", reference)])
            .send()
            .map_err(|e| CompileError::Other(format!("orb fetch request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CompileError::OrbFetchFailed(reference.to_string()));
        }

        let parsed: ResolveResponse = response
            .json()
            .map_err(|e| CompileError::Other(format!("orb fetch response malformed: {e}")))?;

        parsed
            .source
            .ok_or_else(|| CompileError::OrbFetchFailed(reference.to_string()))
    }
}

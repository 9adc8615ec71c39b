//! Upstream service clients.
//!
//! One module per service, each exposing a client struct plus the pure
//! response-parsing helpers its tests exercise:
//! - `nominatim` — reverse geocoding (coordinates → postcode)
//! - `viacep` — address lookup (CEP → IBGE locality code)
//! - `population` — IBGE agregados (locality code → city/population)
//! - `names` — IBGE censos (locality code → first-name ranking)
//!
//! Clients never retry; retry policy belongs to the orchestrator. Each
//! client reports through [`Outcome`]: transport / non-2xx / undecodable
//! body ⇒ `Failure`, reachable-but-no-data ⇒ `Empty`.

pub mod names;
pub mod nominatim;
pub mod population;
pub mod viacep;

pub use names::IbgeNamesClient;
pub use nominatim::NominatimClient;
pub use population::IbgePopulationClient;
pub use viacep::ViaCepClient;

use crate::model::{Coordinates, LocalityCode, NameRankingEntry, Outcome, PipelineError, Stage};
use async_trait::async_trait;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Stage seams
// ---------------------------------------------------------------------------

/// Coordinates → raw postcode candidate.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn postcode_for(&self, coordinates: &Coordinates) -> Outcome<String>;
}

/// Raw postcode → IBGE locality code. Implementations must validate the
/// postcode shape before touching the network.
#[async_trait]
pub trait PostalResolver: Send + Sync {
    async fn locality_for(&self, raw_postcode: &str) -> Outcome<LocalityCode>;
}

/// Locality code → resolved city name, region and latest population figure.
#[async_trait]
pub trait PopulationSource: Send + Sync {
    async fn population_for(&self, locality: &LocalityCode) -> Outcome<PopulationRecord>;
}

/// Locality code (or none, for the national list) → ordered name ranking.
#[async_trait]
pub trait NameRankingSource: Send + Sync {
    async fn ranking_for(&self, locality: Option<&LocalityCode>) -> Outcome<Vec<NameRankingEntry>>;
}

/// Output of a successful population lookup, before the orchestrator stamps
/// it into a [`crate::model::CityProfile`].
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub city_name: String,
    pub region_code: String,
    pub population: String,
}

// ---------------------------------------------------------------------------
// Shared HTTP plumbing
// ---------------------------------------------------------------------------

/// Builds the reqwest client shared by a service module: fixed identity
/// header and a per-request socket timeout.
pub(crate) fn build_http_client(
    user_agent: &str,
    timeout_secs: u64,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Issues a single GET and returns the body text.
///
/// Transport errors and non-2xx statuses both come back as
/// [`PipelineError::Network`] for `stage` — the stages themselves never
/// retry.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    stage: Stage,
    url: &str,
) -> Result<String, PipelineError> {
    let response = client.get(url).send().await.map_err(|e| PipelineError::Network {
        stage,
        detail: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Network {
            stage,
            detail: format!("HTTP {}", status),
        });
    }

    response.text().await.map_err(|e| PipelineError::Network {
        stage,
        detail: e.to_string(),
    })
}

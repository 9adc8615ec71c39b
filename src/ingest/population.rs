//! IBGE population lookup (agregados API, aggregate 6579 / variable 9324).
//!
//! The response nests the payload four levels deep:
//! `[0].resultados[0].series[0]` → `{ localidade: { nome }, serie: { year: value } }`.
//! The `serie` object maps year strings to population strings with no
//! ordering guarantee; the latest numeric year wins. The locality name has
//! the shape `"City Name (UF)"`.
//!
//! API documentation: https://servicodados.ibge.gov.br/api/docs/agregados

use crate::config::Config;
use crate::ingest::{self, PopulationRecord, PopulationSource};
use crate::model::{LocalityCode, Outcome, PipelineError, Stage};
use async_trait::async_trait;
use tracing::debug;

pub struct IbgePopulationClient {
    http: reqwest::Client,
    base: String,
}

impl IbgePopulationClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: ingest::build_http_client(&config.user_agent, config.ibge_timeout_secs)?,
            base: config.ibge_agregados_base.clone(),
        })
    }

    fn aggregate_url(&self, locality: &LocalityCode) -> String {
        format!(
            "{}/agregados/6579/periodos/-1/variaveis/9324?localidades=N6[{}]",
            self.base, locality
        )
    }
}

#[async_trait]
impl PopulationSource for IbgePopulationClient {
    async fn population_for(&self, locality: &LocalityCode) -> Outcome<PopulationRecord> {
        let url = self.aggregate_url(locality);
        debug!(target: "ingest", stage = %Stage::Population, %url, "fetching population");

        let body = match ingest::get_text(&self.http, Stage::Population, &url).await {
            Ok(body) => body,
            Err(err) => return Outcome::Failure(err),
        };
        parse_aggregate_response(&body)
    }
}

/// Walks the nested agregados response down to the locality name and the
/// latest-year population value. Any missing array or field along the way
/// is an `Empty` outcome — the structure varies for localities outside the
/// aggregate's coverage — while an undecodable body is a `Failure`.
pub fn parse_aggregate_response(body: &str) -> Outcome<PopulationRecord> {
    let json: serde_json::Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => {
            return Outcome::Failure(PipelineError::MalformedResponse {
                stage: Stage::Population,
                detail: e.to_string(),
            })
        }
    };

    let series = match json
        .get(0)
        .and_then(|root| root.get("resultados"))
        .and_then(|resultados| resultados.get(0))
        .and_then(|resultado| resultado.get("series"))
        .and_then(|series| series.get(0))
    {
        Some(series) => series,
        None => return Outcome::Empty("no series in response".to_string()),
    };

    let full_name = match series
        .get("localidade")
        .and_then(|localidade| localidade.get("nome"))
        .and_then(|nome| nome.as_str())
    {
        Some(name) => name,
        None => return Outcome::Empty("no locality name in series".to_string()),
    };

    let serie = match series.get("serie").and_then(|serie| serie.as_object()) {
        Some(serie) => serie,
        None => return Outcome::Empty("no year series for locality".to_string()),
    };

    let population = match latest_year_value(serie) {
        Some((_, value)) => value,
        None => return Outcome::Empty("year series held no numeric year".to_string()),
    };

    let (city_name, region_code) = split_locality_name(full_name);
    Outcome::Success(PopulationRecord {
        city_name,
        region_code,
        population,
    })
}

/// Picks the value belonging to the maximum numeric year key. Keys that do
/// not parse as integers are skipped rather than failing the lookup. Year
/// keys are unique, so ties cannot occur.
pub fn latest_year_value(serie: &serde_json::Map<String, serde_json::Value>) -> Option<(i32, String)> {
    let mut latest: Option<(i32, String)> = None;
    for (key, value) in serie {
        let year: i32 = match key.trim().parse() {
            Ok(year) => year,
            Err(_) => continue,
        };
        let value = match value.as_str() {
            Some(value) => value.to_string(),
            None => continue,
        };
        match &latest {
            Some((max_year, _)) if *max_year >= year => {}
            _ => latest = Some((year, value)),
        }
    }
    latest
}

/// Splits `"City Name (UF)"` into city and region parts. Without a
/// parenthesised group the whole string is the city and the region is
/// empty.
pub fn split_locality_name(full_name: &str) -> (String, String) {
    match full_name.split_once('(') {
        Some((city, rest)) => {
            let region = rest.split(')').next().unwrap_or("").trim().to_string();
            (city.trim().to_string(), region)
        }
        None => (full_name.trim().to_string(), String::new()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

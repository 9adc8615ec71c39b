//! IBGE census first-name ranking client (nomes v2 API).
//!
//! Fetches the ordered `(name, frequency, rank)` list for a locality, or
//! the national ranking when no locality is given. The response is an
//! array whose first element carries the entries under `res`; an empty
//! array or absent list is an `Empty` outcome (an empty ranking is data,
//! not an error).
//!
//! API documentation: https://servicodados.ibge.gov.br/api/docs/nomes

use crate::config::Config;
use crate::ingest::{self, NameRankingSource};
use crate::model::{LocalityCode, NameRankingEntry, Outcome, PipelineError, Stage};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

pub struct IbgeNamesClient {
    http: reqwest::Client,
    base: String,
}

impl IbgeNamesClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: ingest::build_http_client(&config.user_agent, config.ibge_timeout_secs)?,
            base: config.ibge_nomes_base.clone(),
        })
    }

    fn ranking_url(&self, locality: Option<&LocalityCode>) -> String {
        match locality {
            Some(code) => format!("{}/censos/nomes/ranking?localidade={}", self.base, code),
            None => format!("{}/censos/nomes/ranking", self.base),
        }
    }
}

#[async_trait]
impl NameRankingSource for IbgeNamesClient {
    async fn ranking_for(&self, locality: Option<&LocalityCode>) -> Outcome<Vec<NameRankingEntry>> {
        let url = self.ranking_url(locality);
        debug!(target: "ingest", stage = %Stage::NameRanking, %url, "fetching name ranking");

        let body = match ingest::get_text(&self.http, Stage::NameRanking, &url).await {
            Ok(body) => body,
            Err(err) => return Outcome::Failure(err),
        };
        parse_ranking_response(&body)
    }
}

// Wire shapes for the nomes API.

#[derive(Debug, Deserialize)]
struct RankingResponse {
    #[serde(default)]
    res: Vec<RankingRow>,
}

#[derive(Debug, Deserialize)]
struct RankingRow {
    nome: String,
    frequencia: u64,
    ranking: u32,
}

/// Decodes a ranking response body into entries, upper-casing each name.
/// Entry order is preserved exactly as the service returned it.
pub fn parse_ranking_response(body: &str) -> Outcome<Vec<NameRankingEntry>> {
    let response: Vec<RankingResponse> = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            return Outcome::Failure(PipelineError::MalformedResponse {
                stage: Stage::NameRanking,
                detail: e.to_string(),
            })
        }
    };

    let rows = match response.into_iter().next() {
        Some(first) => first.res,
        None => return Outcome::Empty("ranking response was an empty array".to_string()),
    };
    if rows.is_empty() {
        return Outcome::Empty("ranking list was empty".to_string());
    }

    let entries = rows
        .into_iter()
        .map(|row| NameRankingEntry {
            name: row.nome.to_uppercase(),
            frequency: row.frequencia,
            rank: row.ranking,
        })
        .collect();
    Outcome::Success(entries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

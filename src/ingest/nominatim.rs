//! Nominatim reverse-geocoding client.
//!
//! Turns device coordinates into a postcode candidate via one GET against
//! the public reverse endpoint. The postcode comes from the nested
//! `address.postcode` field; its absence is an `Empty` outcome, not an
//! error — plenty of rural coordinates genuinely have no postcode.
//!
//! API documentation: https://nominatim.org/release-docs/latest/api/Reverse/

use crate::config::Config;
use crate::ingest::{self, ReverseGeocoder};
use crate::model::{Coordinates, Outcome, PipelineError, Stage};
use async_trait::async_trait;
use tracing::debug;

pub struct NominatimClient {
    http: reqwest::Client,
    base: String,
    accept_language: String,
}

impl NominatimClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: ingest::build_http_client(&config.user_agent, config.geocode_timeout_secs)?,
            base: config.nominatim_base.clone(),
            accept_language: config.accept_language.clone(),
        })
    }

    fn reverse_url(&self, coordinates: &Coordinates) -> String {
        format!(
            "{}/reverse?format=json&lat={:.6}&lon={:.6}&addressdetails=1&accept-language={}",
            self.base, coordinates.latitude, coordinates.longitude, self.accept_language
        )
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn postcode_for(&self, coordinates: &Coordinates) -> Outcome<String> {
        let url = self.reverse_url(coordinates);
        debug!(target: "ingest", stage = %Stage::Geocode, %url, "reverse geocoding");

        let body = match ingest::get_text(&self.http, Stage::Geocode, &url).await {
            Ok(body) => body,
            Err(err) => return Outcome::Failure(err),
        };
        parse_reverse_response(&body)
    }
}

/// Extracts `address.postcode` from a reverse-geocoding response body.
/// Missing address object or postcode field ⇒ `Empty`; a body that is not
/// JSON at all ⇒ `Failure`.
pub fn parse_reverse_response(body: &str) -> Outcome<String> {
    let json: serde_json::Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => {
            return Outcome::Failure(PipelineError::MalformedResponse {
                stage: Stage::Geocode,
                detail: e.to_string(),
            })
        }
    };

    match json
        .get("address")
        .and_then(|address| address.get("postcode"))
        .and_then(|postcode| postcode.as_str())
    {
        Some(postcode) => {
            let trimmed = postcode.trim();
            if trimmed.is_empty() {
                Outcome::Empty("postcode field is blank".to_string())
            } else {
                Outcome::Success(trimmed.to_string())
            }
        }
        None => Outcome::Empty("no postcode in address".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

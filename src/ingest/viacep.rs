//! ViaCEP address-lookup client.
//!
//! Resolves an 8-digit CEP into the IBGE municipality code. The CEP shape
//! is validated *before* any request goes out — ViaCEP rejects malformed
//! codes anyway, so the guard saves a round trip. ViaCEP signals "unknown
//! CEP" with `{"erro": true}` on an otherwise 200 response.
//!
//! API documentation: https://viacep.com.br/

use crate::cep;
use crate::config::Config;
use crate::ingest::{self, PostalResolver};
use crate::model::{LocalityCode, Outcome, PipelineError, Stage};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

pub struct ViaCepClient {
    http: reqwest::Client,
    base: String,
}

impl ViaCepClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: ingest::build_http_client(&config.user_agent, config.geocode_timeout_secs)?,
            base: config.viacep_base.clone(),
        })
    }

    fn lookup_url(&self, digits: &str) -> String {
        format!("{}/ws/{}/json/", self.base, digits)
    }
}

#[async_trait]
impl PostalResolver for ViaCepClient {
    async fn locality_for(&self, raw_postcode: &str) -> Outcome<LocalityCode> {
        // Shape guard: malformed codes never reach the network.
        let digits = match cep::normalize_cep(raw_postcode) {
            Some(digits) => digits,
            None => {
                warn!(target: "ingest", stage = %Stage::PostalResolve, postcode = raw_postcode,
                      "postcode failed shape validation, skipping lookup");
                return Outcome::Empty(format!("postcode '{}' is not a valid CEP", raw_postcode));
            }
        };

        let url = self.lookup_url(&digits);
        debug!(target: "ingest", stage = %Stage::PostalResolve, %url, "resolving CEP");

        let body = match ingest::get_text(&self.http, Stage::PostalResolve, &url).await {
            Ok(body) => body,
            Err(err) => return Outcome::Failure(err),
        };
        parse_lookup_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    erro: bool,
    #[serde(default)]
    ibge: Option<String>,
}

/// Extracts the IBGE locality code from a ViaCEP response body.
/// An explicit `erro` flag or a missing/blank `ibge` field ⇒ `Empty`.
pub fn parse_lookup_response(body: &str) -> Outcome<LocalityCode> {
    let response: ViaCepResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            return Outcome::Failure(PipelineError::MalformedResponse {
                stage: Stage::PostalResolve,
                detail: e.to_string(),
            })
        }
    };

    if response.erro {
        return Outcome::Empty("ViaCEP reported an unknown CEP".to_string());
    }

    match response.ibge.as_deref().and_then(LocalityCode::new) {
        Some(code) => Outcome::Success(code),
        None => Outcome::Empty("response carried no IBGE code".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> ViaCepClient {
        // Any request through this client fails fast with a connection
        // error, so an Empty outcome proves the network was never touched.
        let config = Config {
            viacep_base: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        ViaCepClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_cep_short_circuits_without_network() {
        let client = offline_client();
        for raw in ["", "abc", "1310-100", "01310 100", "013101009"] {
            match client.locality_for(raw).await {
                Outcome::Empty(_) => {}
                other => panic!("expected Empty for '{}', got {:?}", raw, other),
            }
        }
    }

    #[tokio::test]
    async fn test_valid_cep_reaches_the_network_layer() {
        // The guard passes a well-formed CEP through; with no server
        // listening the outcome must be a network Failure, not Empty.
        let client = offline_client();
        match client.locality_for("01310-100").await {
            Outcome::Failure(PipelineError::Network { stage, .. }) => {
                assert_eq!(stage, Stage::PostalResolve);
            }
            other => panic!("expected network Failure, got {:?}", other),
        }
    }

    #[test]
    fn test_lookup_url_uses_stripped_digits() {
        let client = offline_client();
        assert_eq!(client.lookup_url("01310100"), "http://127.0.0.1:9/ws/01310100/json/");
    }

    #[test]
    fn test_parse_extracts_ibge_code() {
        let body = r#"{
            "cep": "01310-100",
            "logradouro": "Avenida Paulista",
            "localidade": "São Paulo",
            "uf": "SP",
            "ibge": "3550308"
        }"#;
        assert_eq!(
            parse_lookup_response(body),
            Outcome::Success(LocalityCode::new("3550308").unwrap())
        );
    }

    #[test]
    fn test_erro_flag_is_empty() {
        assert!(matches!(
            parse_lookup_response(r#"{"erro": true}"#),
            Outcome::Empty(_)
        ));
    }

    #[test]
    fn test_missing_or_blank_ibge_is_empty() {
        assert!(matches!(
            parse_lookup_response(r#"{"cep": "01310-100"}"#),
            Outcome::Empty(_)
        ));
        assert!(matches!(
            parse_lookup_response(r#"{"ibge": "   "}"#),
            Outcome::Empty(_)
        ));
    }

    #[test]
    fn test_ibge_code_is_trimmed() {
        assert_eq!(
            parse_lookup_response(r#"{"ibge": " 3550308 "}"#),
            Outcome::Success(LocalityCode::new("3550308").unwrap())
        );
    }

    #[test]
    fn test_non_json_body_is_malformed_response() {
        assert!(matches!(
            parse_lookup_response("not json"),
            Outcome::Failure(PipelineError::MalformedResponse { .. })
        ));
    }
}

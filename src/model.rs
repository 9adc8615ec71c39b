//! Core data types for the locality resolution pipeline.
//!
//! This module defines the shared domain model imported by all other modules.
//! It contains no I/O — only types, the stage/error taxonomy, and the
//! `Outcome` shape every pipeline stage reports through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A device position in WGS84 degrees.
///
/// Produced once per resolution attempt by the coordinate provider and
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

// ---------------------------------------------------------------------------
// Locality code
// ---------------------------------------------------------------------------

/// IBGE municipality code — the join key between the population lookup and
/// the name-ranking lookup.
///
/// Opaque to this crate: the only guarantee is non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalityCode(String);

impl LocalityCode {
    /// Wraps a raw identifier, trimming surrounding whitespace.
    /// Returns `None` if the trimmed value is empty.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// City profile
// ---------------------------------------------------------------------------

/// The fully resolved result of one pipeline run.
///
/// Either every field is populated by a successful population lookup or the
/// profile does not exist — there is no partially constructed form. The
/// population is kept as the raw decimal-digit string from the IBGE series;
/// display formatting lives in [`crate::format`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityProfile {
    pub city_name: String,
    /// Two-letter state code ("SP"), empty when the locality name carried
    /// no parenthesised region.
    pub region_code: String,
    pub population: String,
    pub locality_code: LocalityCode,
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Name ranking
// ---------------------------------------------------------------------------

/// One row of the IBGE census first-name ranking.
///
/// Entries arrive rank-ascending from the service and are never re-sorted
/// locally. Held only for the current screen session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRankingEntry {
    /// Given name, normalized to uppercase.
    pub name: String,
    pub frequency: u64,
    pub rank: u32,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// One independently retriable unit of the resolution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Geocode,
    PostalResolve,
    Population,
    NameRanking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Geocode => write!(f, "NOMINATIM"),
            Stage::PostalResolve => write!(f, "VIACEP"),
            Stage::Population => write!(f, "IBGE-POP"),
            Stage::NameRanking => write!(f, "IBGE-NOMES"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Errors that can arise while resolving a city profile or name ranking.
///
/// Variants carry only owned strings so the type stays `Clone + PartialEq`
/// and can travel over the state channel to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The user declined the location permission.
    #[error("location permission denied")]
    PermissionDenied,
    /// The coordinate provider failed or returned no position.
    #[error("device location unavailable")]
    LocationUnavailable,
    /// Transport failure or non-2xx response from an upstream service.
    #[error("network failure during {stage}: {detail}")]
    Network { stage: Stage, detail: String },
    /// The service responded but the body could not be interpreted.
    #[error("malformed response from {stage}: {detail}")]
    MalformedResponse { stage: Stage, detail: String },
    /// The service was reachable but held no usable data.
    #[error("no data from {stage}: {detail}")]
    NotFound { stage: Stage, detail: String },
    /// The cache slot held unreadable contents. Downgraded to a cache miss
    /// internally; never surfaced to the user.
    #[error("cached profile is corrupt")]
    CacheCorrupt,
}

impl PipelineError {
    /// Localized (pt-BR) text suitable for direct display, matching the
    /// messages of the original front-ends.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::PermissionDenied => "Permissão de localização negada.".to_string(),
            PipelineError::LocationUnavailable => {
                "Não foi possível obter a localização. Verifique o GPS.".to_string()
            }
            PipelineError::Network { stage, .. } | PipelineError::MalformedResponse { stage, .. } => {
                match stage {
                    Stage::Geocode | Stage::PostalResolve => {
                        "Erro ao buscar dados de localidade.".to_string()
                    }
                    Stage::Population => "Erro ao buscar dados de população.".to_string(),
                    Stage::NameRanking => "Falha ao carregar o ranking de nomes.".to_string(),
                }
            }
            PipelineError::NotFound { stage, .. } => match stage {
                Stage::Geocode => "Não foi possível determinar um CEP válido.".to_string(),
                Stage::PostalResolve => "Não foi possível obter o código IBGE.".to_string(),
                Stage::Population => {
                    "Não foi possível obter os dados de população para esta localidade.".to_string()
                }
                Stage::NameRanking => {
                    "Nenhum ranking de nomes encontrado para esta localidade.".to_string()
                }
            },
            // Cache corruption is silent; this text exists only for logs.
            PipelineError::CacheCorrupt => "Dados locais inválidos.".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage outcome
// ---------------------------------------------------------------------------

/// Uniform result shape reported by every pipeline stage.
///
/// `Empty` means "the service answered but held nothing useful" — the
/// orchestrator converts it to [`PipelineError::NotFound`] for the stage in
/// question. `Failure` is reserved for transport and decoding problems.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Empty(String),
    Failure(PipelineError),
}

impl<T> Outcome<T> {
    /// Collapses the outcome into a `Result`, mapping `Empty` onto
    /// `NotFound` for `stage`.
    pub fn or_not_found(self, stage: Stage) -> Result<T, PipelineError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Empty(reason) => Err(PipelineError::NotFound {
                stage,
                detail: reason,
            }),
            Outcome::Failure(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Empty(reason) => Outcome::Empty(reason),
            Outcome::Failure(err) => Outcome::Failure(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

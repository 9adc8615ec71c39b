//! Locality data resolution for the CivisPlus front-ends.
//!
//! Turns device GPS coordinates into a validated IBGE locality code and
//! from there into city, population and first-name-ranking data, chaining
//! three public services: Nominatim reverse geocoding, ViaCEP address
//! lookup, and the IBGE statistics APIs.
//!
//! The platform UI layers are thin shells over [`pipeline::Pipeline`]:
//! they supply a [`location::CoordinateProvider`], subscribe to
//! [`pipeline::PipelineState`] transitions, and render. All resolution
//! logic, retry policy and caching live here so the two front-ends cannot
//! drift apart.
//!
//! ```no_run
//! use std::sync::Arc;
//! use civis_service::cache::{FileStore, ResultCache};
//! use civis_service::config::Config;
//! use civis_service::ingest::{IbgeNamesClient, IbgePopulationClient, NominatimClient, ViaCepClient};
//! use civis_service::location::{CoordinateProvider, ScriptedProvider};
//! use civis_service::model::Coordinates;
//! use civis_service::pipeline::Pipeline;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let provider: Arc<dyn CoordinateProvider> = Arc::new(ScriptedProvider::granted(
//!     Coordinates { latitude: -23.5505, longitude: -46.6333 },
//! ));
//! let pipeline = Pipeline::new(
//!     Arc::new(NominatimClient::new(&config)?),
//!     Arc::new(ViaCepClient::new(&config)?),
//!     Arc::new(IbgePopulationClient::new(&config)?),
//!     Arc::new(IbgeNamesClient::new(&config)?),
//!     provider,
//!     ResultCache::new(
//!         Box::new(FileStore::new(std::env::temp_dir())),
//!         config.cache_freshness_minutes,
//!     ),
//! );
//! let outcome = pipeline.resolve_city_profile().await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cep;
pub mod config;
pub mod format;
pub mod ingest;
pub mod location;
pub mod logging;
pub mod model;
pub mod pipeline;

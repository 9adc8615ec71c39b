//! Pipeline orchestrator.
//!
//! Sequences permission → coordinates → reverse geocode → postal
//! resolution → population lookup as an explicit state machine, owns the
//! retry and cache policy, and exposes the two operations the UI layer
//! consumes: resolve the city profile, resolve a name ranking. The UI only
//! subscribes to state changes over a watch channel and renders per
//! current state — it never re-derives pipeline logic.
//!
//! Concurrency model: one logical resolution in flight per pipeline
//! instance. A request arriving while one runs is ignored, not queued.
//! Every await is followed by a generation check so a cancelled or
//! superseded run discards its results instead of applying them to a
//! screen that has moved on.

use crate::cache::{CacheRead, ResultCache};
use crate::ingest::{NameRankingSource, PopulationSource, PostalResolver, ReverseGeocoder};
use crate::location::{CoordinateProvider, PermissionStatus};
use crate::model::{
    CityProfile, Coordinates, LocalityCode, NameRankingEntry, Outcome, PipelineError, Stage,
};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Observable state
// ---------------------------------------------------------------------------

/// The state the UI renders. Published over the watch channel on every
/// transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    AwaitingPermission,
    AwaitingCoordinates,
    /// Covers both the reverse-geocode and the ViaCEP sub-stage.
    AwaitingPostalResolution,
    AwaitingPopulation,
    Ready(CityProfile),
    Error {
        error: PipelineError,
        retry_from: RetryStage,
    },
}

/// Where a retry re-enters the pipeline. Earlier stages restart
/// themselves; later stages resume with the context already resolved.
/// Ordered by pipeline position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RetryStage {
    Permission,
    Coordinates,
    Geocode,
    PostalResolve,
    Population,
}

// ---------------------------------------------------------------------------
// Internal bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ResumePoint {
    stage: RetryStage,
    /// Progress count at the moment of failure. Any stage success after
    /// this point invalidates the handle — no stale retry may re-trigger
    /// a stage whose output has been superseded.
    progress: u64,
}

#[derive(Debug, Default)]
struct RunState {
    /// Bumped on every new run and on cancel; in-flight work checks it
    /// after each await and abandons itself when it no longer matches.
    generation: u64,
    /// Bumped on every successful stage completion.
    progress: u64,
    in_flight: bool,
    resume: Option<ResumePoint>,
    coordinates: Option<Coordinates>,
    postcode: Option<String>,
    locality: Option<LocalityCode>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    geocoder: Arc<dyn ReverseGeocoder>,
    resolver: Arc<dyn PostalResolver>,
    population: Arc<dyn PopulationSource>,
    names: Arc<dyn NameRankingSource>,
    provider: Arc<dyn CoordinateProvider>,
    cache: ResultCache,
    state_tx: watch::Sender<PipelineState>,
    run: Mutex<RunState>,
    /// Self-handle for spawning the background refresh task.
    this: Weak<Self>,
}

impl Pipeline {
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        resolver: Arc<dyn PostalResolver>,
        population: Arc<dyn PopulationSource>,
        names: Arc<dyn NameRankingSource>,
        provider: Arc<dyn CoordinateProvider>,
        cache: ResultCache,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(PipelineState::Idle);
        Arc::new_cyclic(|this| Self {
            geocoder,
            resolver,
            population,
            names,
            provider,
            cache,
            state_tx,
            run: Mutex::new(RunState::default()),
            this: this.clone(),
        })
    }

    /// Subscribes to state transitions. The receiver starts at the current
    /// state.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> PipelineState {
        self.state_tx.borrow().clone()
    }

    // -- operations ---------------------------------------------------------

    /// Resolves the city profile for the current device position.
    ///
    /// Cache policy (single slot, 15-minute window):
    /// - fresh entry ⇒ returned as-is, zero network calls;
    /// - stale entry ⇒ returned immediately while exactly one background
    ///   refresh runs; the stale profile stays on display (the refresh
    ///   publishes no awaiting states, only its final Ready);
    /// - miss ⇒ the full pipeline runs inline.
    ///
    /// A request while another resolution is in flight is ignored
    /// (`Empty`), not queued.
    pub async fn resolve_city_profile(&self) -> Outcome<CityProfile> {
        match self.cache.read() {
            CacheRead::Fresh(profile) => {
                debug!(target: "pipeline", "cache fresh, skipping network pipeline");
                self.publish(PipelineState::Ready(profile.clone()));
                Outcome::Success(profile)
            }
            CacheRead::Stale(profile) => {
                self.publish(PipelineState::Ready(profile.clone()));
                if let (Some(pipeline), Some(generation)) =
                    (self.this.upgrade(), self.begin_run())
                {
                    debug!(target: "pipeline", "cache stale, starting background refresh");
                    let fallback = profile.clone();
                    tokio::spawn(async move {
                        pipeline
                            .run_from(RetryStage::Permission, generation, Some(fallback))
                            .await;
                    });
                }
                Outcome::Success(profile)
            }
            CacheRead::Miss => match self.begin_run() {
                Some(generation) => {
                    self.run_from(RetryStage::Permission, generation, None)
                        .await
                }
                None => Outcome::Empty("a resolution is already in flight".to_string()),
            },
        }
    }

    /// Re-runs the pipeline from the stage that last failed. A no-op
    /// (`Empty`) when there is nothing to retry, when the handle has been
    /// invalidated by later progress, or while a run is in flight.
    pub async fn retry(&self) -> Outcome<CityProfile> {
        let (stage, generation) = {
            let mut run = self.run_state();
            let resume = match run.resume {
                Some(resume) => resume,
                None => return Outcome::Empty("nothing to retry".to_string()),
            };
            if resume.progress != run.progress {
                debug!(target: "pipeline", "retry handle superseded by later progress");
                return Outcome::Empty("retry handle is stale".to_string());
            }
            if run.in_flight {
                return Outcome::Empty("a resolution is already in flight".to_string());
            }
            run.in_flight = true;
            run.generation += 1;
            run.resume = None;
            (resume.stage, run.generation)
        };
        info!(target: "pipeline", ?stage, "retrying from failed stage");
        self.run_from(stage, generation, None).await
    }

    /// Abandons any in-flight run; its results will be discarded when they
    /// arrive. Called on screen teardown.
    pub fn cancel(&self) {
        let mut run = self.run_state();
        run.generation += 1;
        run.in_flight = false;
        run.resume = None;
        drop(run);
        self.publish(PipelineState::Idle);
    }

    /// Fetches the name ranking for `locality`, or the national ranking
    /// when `None`. Independent of the profile state machine; the caller
    /// maps `Empty` to a NotFound message via
    /// [`Outcome::or_not_found`].
    pub async fn resolve_name_ranking(
        &self,
        locality: Option<&LocalityCode>,
    ) -> Outcome<Vec<NameRankingEntry>> {
        let outcome = self.names.ranking_for(locality).await;
        if let Outcome::Failure(err) = &outcome {
            warn!(target: "pipeline", stage = %Stage::NameRanking, error = %err, "ranking fetch failed");
        }
        outcome
    }

    // -- run machinery ------------------------------------------------------

    fn run_state(&self) -> MutexGuard<'_, RunState> {
        // A poisoned lock only means a panicked test thread; the state
        // itself is plain data.
        self.run.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claims the single run slot. Returns the new generation, or `None`
    /// when a run is already in flight.
    fn begin_run(&self) -> Option<u64> {
        let mut run = self.run_state();
        if run.in_flight {
            debug!(target: "pipeline", "resolution already in flight, ignoring request");
            return None;
        }
        run.in_flight = true;
        run.generation += 1;
        run.resume = None;
        run.coordinates = None;
        run.postcode = None;
        run.locality = None;
        Some(run.generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.run_state().generation == generation
    }

    fn publish(&self, state: PipelineState) {
        self.state_tx.send_replace(state);
    }

    /// Publishes `state` unless the run has been superseded. The publish
    /// happens under the run lock so a concurrent cancel cannot slip in
    /// between the generation check and the send.
    fn publish_if_current(&self, generation: u64, state: PipelineState) -> bool {
        let run = self.run_state();
        if run.generation != generation {
            return false;
        }
        self.publish(state);
        true
    }

    /// Marks entry into a stage. A foreground run publishes the awaiting
    /// state; a background refresh leaves the stale profile on display and
    /// only checks that it has not been superseded.
    fn enter_stage(&self, generation: u64, state: PipelineState, background: bool) -> bool {
        if background {
            self.is_current(generation)
        } else {
            self.publish_if_current(generation, state)
        }
    }

    fn note_progress(&self, generation: u64) {
        let mut run = self.run_state();
        if run.generation == generation {
            run.progress += 1;
        }
    }

    /// Records a terminal failure for this run. With a stale profile on
    /// display (background refresh) the error is logged and the profile
    /// stays visible; otherwise the error state is published with its
    /// retry entry point.
    fn fail(
        &self,
        generation: u64,
        error: PipelineError,
        retry_from: RetryStage,
        fallback: Option<&CityProfile>,
    ) -> Outcome<CityProfile> {
        let mut run = self.run_state();
        if run.generation != generation {
            return Outcome::Empty("resolution superseded".to_string());
        }
        run.resume = Some(ResumePoint {
            stage: retry_from,
            progress: run.progress,
        });
        // Published under the run lock; see publish_if_current.
        match fallback {
            Some(profile) => {
                warn!(target: "pipeline", error = %error, "background refresh failed, keeping stale profile");
                self.publish(PipelineState::Ready(profile.clone()));
            }
            None => {
                warn!(target: "pipeline", error = %error, ?retry_from, "pipeline run failed");
                self.publish(PipelineState::Error {
                    error: error.clone(),
                    retry_from,
                });
            }
        }
        Outcome::Failure(error)
    }

    async fn run_from(
        &self,
        from: RetryStage,
        generation: u64,
        fallback: Option<CityProfile>,
    ) -> Outcome<CityProfile> {
        let result = self.execute(from, generation, fallback.as_ref()).await;
        let mut run = self.run_state();
        if run.generation == generation {
            run.in_flight = false;
        }
        result
    }

    async fn execute(
        &self,
        from: RetryStage,
        generation: u64,
        fallback: Option<&CityProfile>,
    ) -> Outcome<CityProfile> {
        let superseded = || Outcome::Empty("resolution superseded".to_string());
        let background = fallback.is_some();

        // Permission gate.
        if from <= RetryStage::Permission {
            if !self.enter_stage(generation, PipelineState::AwaitingPermission, background) {
                return superseded();
            }
            let status = self.provider.permission_status().await;
            let granted = match status {
                PermissionStatus::Granted => true,
                _ => self.provider.request_permission().await == PermissionStatus::Granted,
            };
            if !self.is_current(generation) {
                return superseded();
            }
            if !granted {
                return self.fail(
                    generation,
                    PipelineError::PermissionDenied,
                    RetryStage::Permission,
                    fallback,
                );
            }
            self.note_progress(generation);
        }

        // Device coordinates.
        if from <= RetryStage::Coordinates {
            if !self.enter_stage(generation, PipelineState::AwaitingCoordinates, background) {
                return superseded();
            }
            let coordinates = self.provider.current_coordinates().await;
            if !self.is_current(generation) {
                return superseded();
            }
            match coordinates {
                Some(coordinates) => {
                    self.run_state().coordinates = Some(coordinates);
                    self.note_progress(generation);
                }
                None => {
                    return self.fail(
                        generation,
                        PipelineError::LocationUnavailable,
                        RetryStage::Coordinates,
                        fallback,
                    )
                }
            }
        }

        // Reverse geocode: coordinates → postcode candidate.
        if from <= RetryStage::Geocode {
            if !self.enter_stage(generation, PipelineState::AwaitingPostalResolution, background) {
                return superseded();
            }
            // Bind before matching: a match scrutinee keeps the run guard
            // alive through every arm, and fail() re-locks the run state.
            let coordinates = self.run_state().coordinates;
            let coordinates = match coordinates {
                Some(coordinates) => coordinates,
                None => {
                    return self.fail(
                        generation,
                        PipelineError::LocationUnavailable,
                        RetryStage::Coordinates,
                        fallback,
                    )
                }
            };
            let outcome = self.geocoder.postcode_for(&coordinates).await;
            if !self.is_current(generation) {
                return superseded();
            }
            match outcome.or_not_found(Stage::Geocode) {
                Ok(postcode) => {
                    self.run_state().postcode = Some(postcode);
                    self.note_progress(generation);
                }
                Err(error) => {
                    return self.fail(generation, error, RetryStage::Geocode, fallback)
                }
            }
        }

        // Postal resolution: postcode → locality code.
        if from <= RetryStage::PostalResolve {
            if from == RetryStage::PostalResolve
                && !self.enter_stage(generation, PipelineState::AwaitingPostalResolution, background)
            {
                return superseded();
            }
            // Bind before matching, as above.
            let postcode = self.run_state().postcode.clone();
            let postcode = match postcode {
                Some(postcode) => postcode,
                None => {
                    return self.fail(
                        generation,
                        PipelineError::NotFound {
                            stage: Stage::Geocode,
                            detail: "no postcode to resolve".to_string(),
                        },
                        RetryStage::Geocode,
                        fallback,
                    )
                }
            };
            let outcome = self.resolver.locality_for(&postcode).await;
            if !self.is_current(generation) {
                return superseded();
            }
            match outcome.or_not_found(Stage::PostalResolve) {
                Ok(locality) => {
                    self.run_state().locality = Some(locality);
                    self.note_progress(generation);
                }
                Err(error) => {
                    return self.fail(generation, error, RetryStage::PostalResolve, fallback)
                }
            }
        }

        // Population lookup: locality code → city profile.
        if !self.enter_stage(generation, PipelineState::AwaitingPopulation, background) {
            return superseded();
        }
        // Bind before matching, as above.
        let locality = self.run_state().locality.clone();
        let locality = match locality {
            Some(locality) => locality,
            None => {
                return self.fail(
                    generation,
                    PipelineError::NotFound {
                        stage: Stage::PostalResolve,
                        detail: "no locality code to look up".to_string(),
                    },
                    RetryStage::PostalResolve,
                    fallback,
                )
            }
        };
        let outcome = self.population.population_for(&locality).await;
        match outcome.or_not_found(Stage::Population) {
            Ok(record) => {
                let profile = CityProfile {
                    city_name: record.city_name,
                    region_code: record.region_code,
                    population: record.population,
                    locality_code: locality,
                    fetched_at: Utc::now(),
                };
                {
                    let mut run = self.run_state();
                    if run.generation != generation {
                        return superseded();
                    }
                    run.progress += 1;
                    // Published under the run lock; see publish_if_current.
                    self.publish(PipelineState::Ready(profile.clone()));
                }
                // Only a fully successful, still-current lookup reaches the
                // cache.
                self.cache.write(&profile);
                info!(target: "pipeline", city = %profile.city_name, "city profile resolved");
                Outcome::Success(profile)
            }
            Err(error) => self.fail(generation, error, RetryStage::Population, fallback),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, ProfileStore, ResultCache};
    use crate::ingest::PopulationRecord;
    use crate::location::ScriptedProvider;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coordinates() -> Coordinates {
        Coordinates {
            latitude: -23.5505,
            longitude: -46.6333,
        }
    }

    struct CountingGeocoder {
        calls: AtomicUsize,
        result: Outcome<String>,
    }

    #[async_trait]
    impl ReverseGeocoder for CountingGeocoder {
        async fn postcode_for(&self, _coordinates: &Coordinates) -> Outcome<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    struct FixedResolver(Outcome<LocalityCode>);

    #[async_trait]
    impl PostalResolver for FixedResolver {
        async fn locality_for(&self, _raw_postcode: &str) -> Outcome<LocalityCode> {
            self.0.clone()
        }
    }

    struct FixedPopulation(Outcome<PopulationRecord>);

    #[async_trait]
    impl PopulationSource for FixedPopulation {
        async fn population_for(&self, _locality: &LocalityCode) -> Outcome<PopulationRecord> {
            self.0.clone()
        }
    }

    struct FixedNames(Outcome<Vec<NameRankingEntry>>);

    #[async_trait]
    impl NameRankingSource for FixedNames {
        async fn ranking_for(
            &self,
            _locality: Option<&LocalityCode>,
        ) -> Outcome<Vec<NameRankingEntry>> {
            self.0.clone()
        }
    }

    fn happy_record() -> PopulationRecord {
        PopulationRecord {
            city_name: "São Paulo".to_string(),
            region_code: "SP".to_string(),
            population: "11451999".to_string(),
        }
    }

    fn happy_pipeline(
        geocoder: Arc<CountingGeocoder>,
        store: Arc<MemoryStore>,
    ) -> Arc<Pipeline> {
        Pipeline::new(
            geocoder,
            Arc::new(FixedResolver(Outcome::Success(
                LocalityCode::new("3550308").unwrap(),
            ))),
            Arc::new(FixedPopulation(Outcome::Success(happy_record()))),
            Arc::new(FixedNames(Outcome::Empty("unused".to_string()))),
            Arc::new(ScriptedProvider::granted(coordinates())),
            ResultCache::new(Box::new(store), 15),
        )
    }

    fn counting_geocoder() -> Arc<CountingGeocoder> {
        Arc::new(CountingGeocoder {
            calls: AtomicUsize::new(0),
            result: Outcome::Success("01310-100".to_string()),
        })
    }

    fn cached_profile(age_minutes: i64) -> CityProfile {
        CityProfile {
            city_name: "São Paulo".to_string(),
            region_code: "SP".to_string(),
            population: "11451999".to_string(),
            locality_code: LocalityCode::new("3550308").unwrap(),
            fetched_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    fn seed_cache(store: &MemoryStore, profile: &CityProfile) {
        store
            .save(&serde_json::to_string(profile).unwrap())
            .unwrap();
    }

    #[tokio::test]
    async fn test_happy_path_reaches_ready_and_writes_cache() {
        let store = Arc::new(MemoryStore::default());
        let geocoder = counting_geocoder();
        let pipeline = happy_pipeline(Arc::clone(&geocoder), Arc::clone(&store));

        let outcome = pipeline.resolve_city_profile().await;
        let profile = match outcome {
            Outcome::Success(profile) => profile,
            other => panic!("expected Success, got {:?}", other),
        };
        assert_eq!(profile.city_name, "São Paulo");
        assert_eq!(profile.region_code, "SP");
        assert_eq!(pipeline.current_state(), PipelineState::Ready(profile));
        assert!(store.load().is_some(), "successful run must write the cache");
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network_entirely() {
        let store = Arc::new(MemoryStore::default());
        seed_cache(&store, &cached_profile(5));
        let geocoder = counting_geocoder();
        let pipeline = happy_pipeline(Arc::clone(&geocoder), Arc::clone(&store));

        let outcome = pipeline.resolve_city_profile().await;
        assert!(outcome.is_success());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_permission_denied_surfaces_with_permission_retry() {
        let pipeline = Pipeline::new(
            counting_geocoder(),
            Arc::new(FixedResolver(Outcome::Empty("unused".to_string()))),
            Arc::new(FixedPopulation(Outcome::Empty("unused".to_string()))),
            Arc::new(FixedNames(Outcome::Empty("unused".to_string()))),
            Arc::new(ScriptedProvider::prompting(
                crate::location::PermissionStatus::Denied,
                None,
            )),
            ResultCache::new(Box::new(MemoryStore::default()), 15),
        );

        let outcome = pipeline.resolve_city_profile().await;
        assert_eq!(
            outcome,
            Outcome::Failure(PipelineError::PermissionDenied)
        );
        assert_eq!(
            pipeline.current_state(),
            PipelineState::Error {
                error: PipelineError::PermissionDenied,
                retry_from: RetryStage::Permission,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_fix_surfaces_location_unavailable() {
        let pipeline = Pipeline::new(
            counting_geocoder(),
            Arc::new(FixedResolver(Outcome::Empty("unused".to_string()))),
            Arc::new(FixedPopulation(Outcome::Empty("unused".to_string()))),
            Arc::new(FixedNames(Outcome::Empty("unused".to_string()))),
            Arc::new(ScriptedProvider::granted_without_fix()),
            ResultCache::new(Box::new(MemoryStore::default()), 15),
        );

        let outcome = pipeline.resolve_city_profile().await;
        assert_eq!(
            outcome,
            Outcome::Failure(PipelineError::LocationUnavailable)
        );
        assert_eq!(
            pipeline.current_state(),
            PipelineState::Error {
                error: PipelineError::LocationUnavailable,
                retry_from: RetryStage::Coordinates,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_geocode_maps_to_not_found_with_geocode_retry() {
        let geocoder = Arc::new(CountingGeocoder {
            calls: AtomicUsize::new(0),
            result: Outcome::Empty("no postcode in address".to_string()),
        });
        let store = Arc::new(MemoryStore::default());
        let pipeline = happy_pipeline(geocoder, store);

        match pipeline.resolve_city_profile().await {
            Outcome::Failure(PipelineError::NotFound { stage, .. }) => {
                assert_eq!(stage, Stage::Geocode);
            }
            other => panic!("expected NotFound failure, got {:?}", other),
        }
        match pipeline.current_state() {
            PipelineState::Error { retry_from, .. } => {
                assert_eq!(retry_from, RetryStage::Geocode);
            }
            other => panic!("expected Error state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retry_without_failure_is_a_no_op() {
        let pipeline = happy_pipeline(counting_geocoder(), Arc::new(MemoryStore::default()));
        assert!(matches!(pipeline.retry().await, Outcome::Empty(_)));
    }

    #[tokio::test]
    async fn test_resuming_without_recorded_stage_inputs_fails_cleanly() {
        // A run entered mid-pipeline with no recorded coordinates, postcode
        // or locality must surface a failure for the earlier stage, not
        // hang on the run-state lock.
        let pipeline = happy_pipeline(counting_geocoder(), Arc::new(MemoryStore::default()));
        let generation = pipeline.begin_run().expect("run slot free");
        assert_eq!(
            pipeline.execute(RetryStage::Geocode, generation, None).await,
            Outcome::Failure(PipelineError::LocationUnavailable)
        );
        match pipeline.current_state() {
            PipelineState::Error { retry_from, .. } => {
                assert_eq!(retry_from, RetryStage::Coordinates)
            }
            other => panic!("expected Error state, got {:?}", other),
        }

        let pipeline = happy_pipeline(counting_geocoder(), Arc::new(MemoryStore::default()));
        let generation = pipeline.begin_run().expect("run slot free");
        match pipeline
            .execute(RetryStage::PostalResolve, generation, None)
            .await
        {
            Outcome::Failure(PipelineError::NotFound { stage, .. }) => {
                assert_eq!(stage, Stage::Geocode)
            }
            other => panic!("expected NotFound failure, got {:?}", other),
        }

        let pipeline = happy_pipeline(counting_geocoder(), Arc::new(MemoryStore::default()));
        let generation = pipeline.begin_run().expect("run slot free");
        match pipeline
            .execute(RetryStage::Population, generation, None)
            .await
        {
            Outcome::Failure(PipelineError::NotFound { stage, .. }) => {
                assert_eq!(stage, Stage::PostalResolve)
            }
            other => panic!("expected NotFound failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_superseded_run_cannot_publish_over_cancel() {
        let pipeline = happy_pipeline(counting_geocoder(), Arc::new(MemoryStore::default()));
        let generation = pipeline.begin_run().expect("run slot free");
        pipeline.cancel();

        let outcome = pipeline
            .run_from(RetryStage::Permission, generation, None)
            .await;
        assert!(matches!(outcome, Outcome::Empty(_)));
        assert_eq!(pipeline.current_state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_name_ranking_empty_surfaces_as_not_found() {
        let pipeline = Pipeline::new(
            counting_geocoder(),
            Arc::new(FixedResolver(Outcome::Empty("unused".to_string()))),
            Arc::new(FixedPopulation(Outcome::Empty("unused".to_string()))),
            Arc::new(FixedNames(Outcome::Empty("lista vazia".to_string()))),
            Arc::new(ScriptedProvider::granted(coordinates())),
            ResultCache::new(Box::new(MemoryStore::default()), 15),
        );
        let code = LocalityCode::new("3550308").unwrap();
        let err = pipeline
            .resolve_name_ranking(Some(&code))
            .await
            .or_not_found(Stage::NameRanking)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { stage: Stage::NameRanking, .. }));
    }
}

//! Single-slot result cache for the last successful city profile.
//!
//! The slot lives under a fixed key in a pluggable key-value store: a
//! file-backed store in production (the platform key-value facility on a
//! device build), an in-memory store in tests. Only a fully successful
//! population lookup writes; readers never observe a partial entry because
//! the file store replaces atomically via temp-file + rename. Corrupt
//! contents are downgraded to a miss and the slot is cleared — never
//! surfaced to the user.
//!
//! # Clock injection
//! Freshness checks accept a `now: DateTime<Utc>` parameter, with thin
//! `Utc::now()` wrappers, so tests stay deterministic without time
//! manipulation.

use crate::model::CityProfile;
use chrono::{DateTime, Duration, Utc};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Fixed key the profile record is stored under.
pub const CACHE_KEY: &str = "last_city_data";

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Minimal key-value slot the cache persists through. One key, string
/// payloads; the platform front-end may back this with its native
/// preferences store.
pub trait ProfileStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, payload: &str) -> io::Result<()>;
    fn clear(&self);
}

/// File-backed store: the payload lives in `<dir>/last_city_data.json`.
/// Writes go to a temp file first and are renamed into place so readers
/// never see a half-written record.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(format!("{}.json", CACHE_KEY)),
        }
    }
}

impl ProfileStore for FileStore {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok()
    }

    fn save(&self, payload: &str) -> io::Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)
    }

    fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

impl<S: ProfileStore + ?Sized> ProfileStore for std::sync::Arc<S> {
    fn load(&self) -> Option<String> {
        (**self).load()
    }

    fn save(&self, payload: &str) -> io::Result<()> {
        (**self).save(payload)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-memory store for tests and ephemeral hosts.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl ProfileStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, payload: &str) -> io::Result<()> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(payload.to_string());
        }
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Cache reads
// ---------------------------------------------------------------------------

/// What the read path found, already classified against the freshness
/// window.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead {
    /// No usable entry (absent or corrupt-and-cleared).
    Miss,
    /// Entry younger than the freshness window — display it, skip the
    /// network pipeline entirely.
    Fresh(CityProfile),
    /// Entry past the window — display it immediately, refresh in the
    /// background.
    Stale(CityProfile),
}

pub struct ResultCache {
    store: Box<dyn ProfileStore>,
    freshness: Duration,
}

impl ResultCache {
    pub fn new(store: Box<dyn ProfileStore>, freshness_minutes: i64) -> Self {
        Self {
            store,
            freshness: Duration::minutes(freshness_minutes),
        }
    }

    /// Reads and classifies the slot against `now`.
    ///
    /// Freshness is strict: `now - fetched_at < window` ⇒ fresh. Corrupt
    /// payloads clear the slot and read as a miss.
    pub fn read_at(&self, now: DateTime<Utc>) -> CacheRead {
        let payload = match self.store.load() {
            Some(payload) => payload,
            None => return CacheRead::Miss,
        };

        let profile: CityProfile = match serde_json::from_str(&payload) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(target: "cache", error = %e, "corrupt cache entry, clearing slot");
                self.store.clear();
                return CacheRead::Miss;
            }
        };

        if now - profile.fetched_at < self.freshness {
            CacheRead::Fresh(profile)
        } else {
            CacheRead::Stale(profile)
        }
    }

    /// Reads the slot against the real clock.
    pub fn read(&self) -> CacheRead {
        self.read_at(Utc::now())
    }

    /// Overwrites the slot with a new profile. Serialization of a
    /// `CityProfile` cannot fail, so only store I/O errors surface — and
    /// those are logged rather than propagated: losing a cache write must
    /// not fail the pipeline run that produced the profile.
    pub fn write(&self, profile: &CityProfile) {
        let payload = match serde_json::to_string(profile) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "cache", error = %e, "failed to serialize profile");
                return;
            }
        };
        if let Err(e) = self.store.save(&payload) {
            warn!(target: "cache", error = %e, "failed to persist profile");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LocalityCode;
    use chrono::TimeZone;

    fn profile_fetched_at(fetched_at: DateTime<Utc>) -> CityProfile {
        CityProfile {
            city_name: "São Paulo".to_string(),
            region_code: "SP".to_string(),
            population: "11451999".to_string(),
            locality_code: LocalityCode::new("3550308").unwrap(),
            fetched_at,
        }
    }

    /// A fixed "now" used across all tests: 2024-05-01 13:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn cache() -> ResultCache {
        ResultCache::new(Box::new(MemoryStore::default()), 15)
    }

    #[test]
    fn test_empty_slot_reads_as_miss() {
        assert_eq!(cache().read_at(fixed_now()), CacheRead::Miss);
    }

    #[test]
    fn test_entry_five_minutes_old_is_fresh() {
        let cache = cache();
        let profile = profile_fetched_at(fixed_now() - Duration::minutes(5));
        cache.write(&profile);
        assert_eq!(cache.read_at(fixed_now()), CacheRead::Fresh(profile));
    }

    #[test]
    fn test_entry_twenty_minutes_old_is_stale_but_returned() {
        let cache = cache();
        let profile = profile_fetched_at(fixed_now() - Duration::minutes(20));
        cache.write(&profile);
        assert_eq!(cache.read_at(fixed_now()), CacheRead::Stale(profile));
    }

    #[test]
    fn test_entry_exactly_at_window_is_stale() {
        // Freshness is strictly less-than: age == window is already stale.
        let cache = cache();
        let profile = profile_fetched_at(fixed_now() - Duration::minutes(15));
        cache.write(&profile);
        assert!(matches!(cache.read_at(fixed_now()), CacheRead::Stale(_)));
    }

    #[test]
    fn test_corrupt_payload_clears_slot_and_misses() {
        let store = Box::new(MemoryStore::default());
        store.save("{not valid json").unwrap();
        let cache = ResultCache::new(store, 15);
        assert_eq!(cache.read_at(fixed_now()), CacheRead::Miss);
        // The slot was cleared, not just skipped.
        assert_eq!(cache.read_at(fixed_now()), CacheRead::Miss);
    }

    #[test]
    fn test_newer_write_supersedes_older_entry() {
        let cache = cache();
        cache.write(&profile_fetched_at(fixed_now() - Duration::minutes(30)));
        let newer = profile_fetched_at(fixed_now() - Duration::minutes(1));
        cache.write(&newer);
        assert_eq!(cache.read_at(fixed_now()), CacheRead::Fresh(newer));
    }

    #[test]
    fn test_file_store_round_trips_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        assert_eq!(store.load(), None);
        store.save("payload").unwrap();
        assert_eq!(store.load().as_deref(), Some("payload"));
        store.clear();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.save("payload").unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec![format!("{}.json", CACHE_KEY)]);
    }

    #[test]
    fn test_file_backed_cache_round_trips_profile() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(Box::new(FileStore::new(dir.path().to_path_buf())), 15);
        let profile = profile_fetched_at(fixed_now() - Duration::minutes(2));
        cache.write(&profile);
        assert_eq!(cache.read_at(fixed_now()), CacheRead::Fresh(profile));
    }
}

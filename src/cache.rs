//! Match-result cache over a single storage blob.
//!
//! Every public operation runs its own load -> migrate -> expire -> mutate ->
//! persist cycle against the one storage key; nothing is kept in memory
//! between calls. The read-modify-write is not atomic across the whole map:
//! two near-simultaneous writers race and the last write wins for the entire
//! blob. Callers are expected to serialize matching per page; this module
//! does not mask the gap with locking.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;

use crate::cache_key::{generate_cache_key, normalize_source};
use crate::models::{CachedMatchResult, JobDescription, MatchResult};
use crate::storage::Storage;

pub const CACHE_VERSION: u32 = 2;
pub const CACHE_STORAGE_KEY: &str = "job_match_cache";
const MAX_AGE_DAYS: i64 = 30;

type CacheMap = HashMap<String, CachedMatchResult>;

pub struct MatchCache<S: Storage> {
    storage: S,
}

impl<S: Storage> MatchCache<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Look up a cached result for this job. The returned result does not
    /// have `is_cached` set; callers flip it.
    pub fn get(&self, job: &JobDescription) -> Option<MatchResult> {
        let key = generate_cache_key(job);
        let map = self.load();
        map.get(&key)
            .filter(|entry| entry.version == CACHE_VERSION)
            .map(|entry| entry.result.clone())
    }

    /// Store a freshly computed result under the key derived from its job.
    /// Storage write failures propagate to the caller.
    pub fn save(&self, result: &MatchResult) -> Result<()> {
        let key = generate_cache_key(&result.job);
        let mut map = self.load();
        map.insert(
            key,
            CachedMatchResult {
                result: result.clone(),
                cached_at: Utc::now().timestamp_millis(),
                version: CACHE_VERSION,
            },
        );
        self.persist(&map)
    }

    pub fn clear(&self, job: &JobDescription) -> Result<()> {
        let key = generate_cache_key(job);
        let mut map = self.load();
        map.remove(&key);
        self.persist(&map)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.storage
            .remove(CACHE_STORAGE_KEY)
            .context("Failed to clear match cache")
    }

    /// Loaded, migrated, pruned snapshot sorted by key, for display.
    pub fn entries(&self) -> Vec<(String, CachedMatchResult)> {
        let mut entries: Vec<_> = self.load().into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    // Read the blob, migrate stale entries, evict expired ones. Read and
    // parse failures degrade to an empty map (cold start); migration and
    // expiry write-backs are best-effort on this read path.
    fn load(&self) -> CacheMap {
        let raw = match self.storage.get(CACHE_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheMap::new(),
            Err(e) => {
                eprintln!("Warning: cache read failed, starting empty: {e}");
                return CacheMap::new();
            }
        };

        let map: CacheMap = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                eprintln!("Warning: cache blob unreadable, starting empty: {e}");
                return CacheMap::new();
            }
        };

        let (map, dirty) = migrate(map);
        if dirty {
            if let Err(e) = self.persist(&map) {
                eprintln!("Warning: failed to persist migrated cache: {e}");
            }
        }

        let before = map.len();
        let map = expire(map);
        if map.len() != before {
            if let Err(e) = self.persist(&map) {
                eprintln!("Warning: failed to persist pruned cache: {e}");
            }
        }

        map
    }

    fn persist(&self, map: &CacheMap) -> Result<()> {
        let raw = serde_json::to_string(map).context("Failed to serialize match cache")?;
        self.storage
            .set(CACHE_STORAGE_KEY, &raw)
            .context("Failed to persist match cache")
    }
}

/// Bring every entry up to the current key scheme and version. Returns the
/// migrated map and whether anything changed (one unconditional write-back
/// happens on any change, never per-entry).
///
/// Key collisions resolve first-writer-wins: an entry already present under
/// its correct key is never overwritten by a stale duplicate.
fn migrate(map: CacheMap) -> (CacheMap, bool) {
    let mut out = CacheMap::new();
    let mut moved: Vec<(String, CachedMatchResult)> = Vec::new();
    let mut dirty = false;

    let mut items: Vec<_> = map.into_iter().collect();
    items.sort_by(|a, b| a.0.cmp(&b.0));

    for (key, mut entry) in items {
        // Pre-key-scheme format used "<url>|<hash>" keys.
        if key.contains('|') {
            dirty = true;
            entry.result.job.source = normalize_source(&entry.result.job);
            entry.version = CACHE_VERSION;
            let new_key = generate_cache_key(&entry.result.job);
            moved.push((new_key, entry));
            continue;
        }

        let normalized = normalize_source(&entry.result.job);
        if normalized != entry.result.job.source {
            dirty = true;
            entry.result.job.source = normalized;
            entry.version = CACHE_VERSION;
            let new_key = generate_cache_key(&entry.result.job);
            if new_key == key {
                out.insert(key, entry);
            } else {
                moved.push((new_key, entry));
            }
            continue;
        }

        if entry.version != CACHE_VERSION {
            entry.version = CACHE_VERSION;
            dirty = true;
        }
        out.insert(key, entry);
    }

    // Entries that kept their key are settled first, so a rekeyed entry
    // never displaces an existing occupant.
    for (new_key, entry) in moved {
        out.entry(new_key).or_insert(entry);
    }

    (out, dirty)
}

fn expire(map: CacheMap) -> CacheMap {
    let cutoff = (Utc::now() - chrono::Duration::days(MAX_AGE_DAYS)).timestamp_millis();
    map.into_iter()
        .filter(|(_, entry)| entry.cached_at >= cutoff && entry.version == CACHE_VERSION)
        .collect()
}

//! Incremental transform cache.
//!
//! Build pipelines re-run the loader over mostly-unchanged trees; caching the
//! per-file result keyed by content hash skips the script reparse entirely.
//! Entries also key on the classification flags, since the same source
//! transforms differently per axis.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

use crate::transform::{transform, Classification, TransformResult};

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub result: TransformResult,
}

pub struct TransformCache {
    cache_dir: PathBuf,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::with_dir(PathBuf::from(".asyncload/cache"))
    }

    pub fn with_dir(cache_dir: PathBuf) -> Self {
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn compute_hash(source: &str, classification: Classification) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([classification.consumer as u8, classification.provider as u8]);
        format!("{:x}", hasher.finalize())
    }

    fn cache_path(&self, file_path: &str) -> PathBuf {
        // Stable file name per source path
        let safe_name = file_path
            .replace("/", "_")
            .replace("\\", "_")
            .replace(":", "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(
        &self,
        file_path: &str,
        source: &str,
        classification: Classification,
    ) -> Option<TransformResult> {
        let cache_path = self.cache_path(file_path);
        if !cache_path.exists() {
            return None;
        }

        let data = match fs::read_to_string(&cache_path) {
            Ok(data) => data,
            Err(_) => return None,
        };

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!(
                    "[AsyncLoadNative] Cache deserialization failed for {}: {}",
                    file_path, e
                );
                // Invalidate corrupt cache file
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == Self::compute_hash(source, classification) {
            Some(entry.result)
        } else {
            None
        }
    }

    pub fn set(
        &self,
        file_path: &str,
        source: &str,
        classification: Classification,
        result: TransformResult,
    ) {
        let cache_path = self.cache_path(file_path);
        let hash = Self::compute_hash(source, classification);
        let entry = CacheEntry { hash, result };

        if let Ok(data) = serde_json::to_string(&entry) {
            fs::write(cache_path, data).ok();
        }
    }
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform through the cache: hit returns the stored result, miss runs the
/// transform and stores it.
pub fn transform_cached(
    cache: &TransformCache,
    source: &str,
    file_path: &str,
    classification: Classification,
) -> TransformResult {
    if let Some(result) = cache.get(file_path, source, classification) {
        return result;
    }
    let result = transform(source, file_path, classification);
    cache.set(file_path, source, classification, result.clone());
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformStatus;

    fn temp_cache(name: &str) -> TransformCache {
        let dir = std::env::temp_dir().join(format!("asyncload-cache-test-{}", name));
        fs::remove_dir_all(&dir).ok();
        TransformCache::with_dir(dir)
    }

    const SOURCE: &str =
        "<template><div ref=\"c\"></div></template><script>export default { methods: { go() { this.$refs.c.x(); } } };</script>";

    #[test]
    fn test_miss_then_hit() {
        let cache = temp_cache("hit");
        let classification = Classification {
            consumer: true,
            provider: false,
        };
        assert!(cache.get("a.vue", SOURCE, classification).is_none());
        let first = transform_cached(&cache, SOURCE, "a.vue", classification);
        assert_eq!(first.status, TransformStatus::Transformed);
        let second = cache.get("a.vue", SOURCE, classification).expect("cached");
        assert_eq!(second.code, first.code);
    }

    #[test]
    fn test_source_change_invalidates() {
        let cache = temp_cache("invalidate");
        let classification = Classification {
            consumer: true,
            provider: false,
        };
        transform_cached(&cache, SOURCE, "a.vue", classification);
        assert!(cache.get("a.vue", "<script>export default {};</script>", classification).is_none());
    }

    #[test]
    fn test_classification_keys_the_entry() {
        let cache = temp_cache("axes");
        let consumer = Classification {
            consumer: true,
            provider: false,
        };
        let provider = Classification {
            consumer: false,
            provider: true,
        };
        transform_cached(&cache, SOURCE, "a.vue", consumer);
        assert!(cache.get("a.vue", SOURCE, provider).is_none());
    }

    #[test]
    fn test_corrupt_entry_removed() {
        let cache = temp_cache("corrupt");
        let classification = Classification {
            consumer: true,
            provider: false,
        };
        let path = cache.cache_path("a.vue");
        fs::write(&path, "not json").expect("write");
        assert!(cache.get("a.vue", SOURCE, classification).is_none());
        assert!(!path.exists());
    }
}

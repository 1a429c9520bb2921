//! Startup pre-load
//!
//! Drives one namespace's pre-load the way the host expects it: enumerate
//! keys once, then fetch values in batches and hand each batch to a sink.
//! A store answering with the "not configured" sentinel gets no further
//! calls.

use gridstore_core::{LoadedKeys, MapStore, Result, StoreKey, StoreValue};
use std::collections::HashMap;
use tracing::{debug, info};

/// Keys fetched per `load_all` call
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Outcome of one pre-load run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreloadReport {
    /// Keys returned by enumeration
    pub keys: usize,
    /// Values actually loaded (keys can vanish between enumeration and load)
    pub loaded: usize,
    /// Number of `load_all` calls made
    pub batches: usize,
    /// The store answered with the "not configured" sentinel
    pub skipped: bool,
}

/// Batched pre-load driver
#[derive(Debug, Clone, Copy)]
pub struct Preloader {
    batch_size: usize,
}

impl Default for Preloader {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl Preloader {
    /// Pre-loader fetching `batch_size` keys per call (at least one).
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Keys fetched per call
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pre-load `store`, passing every loaded batch to `sink`.
    pub fn run<K, V, F>(&self, store: &dyn MapStore<K, V>, mut sink: F) -> Result<PreloadReport>
    where
        K: StoreKey,
        V: StoreValue,
        F: FnMut(HashMap<K, V>),
    {
        let namespace = store.namespace();
        let keys = match store.load_all_keys()? {
            LoadedKeys::NotConfigured => {
                debug!(namespace, "pre-load not configured, skipping");
                return Ok(PreloadReport {
                    skipped: true,
                    ..PreloadReport::default()
                });
            }
            LoadedKeys::Keys(keys) => keys.into_iter().collect::<Vec<K>>(),
        };

        let mut report = PreloadReport {
            keys: keys.len(),
            ..PreloadReport::default()
        };
        for chunk in keys.chunks(self.batch_size) {
            let values = store.load_all(chunk)?;
            report.batches += 1;
            report.loaded += values.len();
            if !values.is_empty() {
                sink(values);
            }
        }

        info!(
            namespace,
            keys = report.keys,
            loaded = report.loaded,
            batches = report.batches,
            "pre-load complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstore_core::Error;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Memory store that records every call it receives.
    struct Scripted {
        data: HashMap<u32, u32>,
        sentinel: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Scripted {
        fn with_keys(n: u32) -> Self {
            Self {
                data: (0..n).map(|i| (i, i * 10)).collect(),
                sentinel: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MapStore<u32, u32> for Scripted {
        fn namespace(&self) -> &str {
            "scripted"
        }
        fn load(&self, key: &u32) -> Result<Option<u32>> {
            self.calls.lock().push("load");
            Ok(self.data.get(key).copied())
        }
        fn load_all(&self, keys: &[u32]) -> Result<HashMap<u32, u32>> {
            self.calls.lock().push("load_all");
            Ok(keys
                .iter()
                .filter_map(|k| self.data.get(k).map(|v| (*k, *v)))
                .collect())
        }
        fn load_all_keys(&self) -> Result<LoadedKeys<u32>> {
            self.calls.lock().push("load_all_keys");
            if self.sentinel {
                Ok(LoadedKeys::NotConfigured)
            } else {
                Ok(LoadedKeys::Keys(self.data.keys().copied().collect()))
            }
        }
        fn store(&self, _key: &u32, _value: &u32) -> Result<()> {
            Err(Error::storage("read only"))
        }
        fn delete(&self, _key: &u32) -> Result<()> {
            Err(Error::storage("read only"))
        }
        fn destroy(&self) {}
    }

    #[test]
    fn test_sentinel_makes_no_further_calls() {
        let store = Scripted {
            sentinel: true,
            ..Scripted::with_keys(5)
        };
        let mut batches = 0;
        let report = Preloader::default().run(&store, |_| batches += 1).unwrap();

        assert!(report.skipped);
        assert_eq!(batches, 0);
        assert_eq!(*store.calls.lock(), vec!["load_all_keys"]);
    }

    #[test]
    fn test_batches_cover_every_key() {
        let store = Scripted::with_keys(25);
        let mut seen = HashSet::new();
        let report = Preloader::new(10)
            .run(&store, |batch| seen.extend(batch.into_keys()))
            .unwrap();

        assert_eq!(report.keys, 25);
        assert_eq!(report.loaded, 25);
        assert_eq!(report.batches, 3);
        assert_eq!(seen.len(), 25);
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let store = Scripted::with_keys(0);
        let report = Preloader::default().run(&store, |_| panic!("no batch expected")).unwrap();
        assert_eq!(report, PreloadReport::default());
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        assert_eq!(Preloader::new(0).batch_size(), 1);
    }
}

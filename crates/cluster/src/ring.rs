//! Round-robin endpoint selection
//!
//! Each operation kind keeps its own [`EndpointRing`] so get, update and
//! select traffic rotate independently. A ring has two locks: one guarding
//! the endpoint list (swapped wholesale by topology refresh) and one guarding
//! the cursor.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Rotating list of endpoint URLs.
#[derive(Debug)]
pub struct EndpointRing {
    endpoints: RwLock<Arc<[String]>>,
    cursor: Mutex<usize>,
}

impl EndpointRing {
    /// Create a ring over `endpoints`. The first selection returns the first.
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints: RwLock::new(endpoints.into()),
            cursor: Mutex::new(0),
        }
    }

    /// Select the next endpoint, `None` if the ring is empty.
    ///
    /// A single-endpoint ring never touches the cursor lock.
    pub fn next_endpoint(&self) -> Option<String> {
        let endpoints = self.endpoints.read().clone();
        match endpoints.len() {
            0 => None,
            1 => Some(endpoints[0].clone()),
            len => {
                let mut cursor = self.cursor.lock();
                let index = *cursor % len;
                *cursor = (index + 1) % len;
                Some(endpoints[index].clone())
            }
        }
    }

    /// Swap the endpoint list. The cursor carries over, wrapped on next use.
    pub fn replace(&self, endpoints: Vec<String>) {
        *self.endpoints.write() = endpoints.into();
    }

    /// Current endpoint list
    pub fn snapshot(&self) -> Arc<[String]> {
        self.endpoints.read().clone()
    }

    /// Number of endpoints
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Check if the ring has no endpoints.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

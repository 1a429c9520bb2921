//! View of the host engine.

use std::sync::atomic::{AtomicUsize, Ordering};

/// What an adapter may ask the host engine.
pub trait HostContext: Send + Sync {
    /// Number of members in the host cluster
    fn member_count(&self) -> usize;

    /// Check for a single-node deployment.
    fn is_single_node(&self) -> bool {
        self.member_count() == 1
    }
}

/// Host with a settable member count.
#[derive(Debug)]
pub struct StaticHost {
    members: AtomicUsize,
}

impl StaticHost {
    /// Host reporting `members` members.
    pub fn new(members: usize) -> Self {
        Self {
            members: AtomicUsize::new(members),
        }
    }

    /// Host reporting exactly one member.
    pub fn single_node() -> Self {
        Self::new(1)
    }

    /// Update the member count.
    pub fn set_members(&self, members: usize) {
        self.members.store(members, Ordering::SeqCst);
    }
}

impl HostContext for StaticHost {
    fn member_count(&self) -> usize {
        self.members.load(Ordering::SeqCst)
    }
}

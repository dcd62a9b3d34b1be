//! In-memory snapshot of suppressed addresses.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::{SuppressionError, SuppressionResult};
use crate::store::FeedbackStore;

/// Union of the bounced and complained lists as of the last completed rebuild.
///
/// Readers take an `Arc` to the current snapshot; a rebuild assembles a new
/// set off to the side and swaps it in with a single assignment, so a reader
/// sees either the old set or the new one in full. Rebuilds are serialized:
/// one that starts after a store write is guaranteed to observe that write.
pub struct SuppressionSet {
    store: Arc<dyn FeedbackStore>,
    snapshot: RwLock<Arc<HashSet<String>>>,
    rebuild_lock: Mutex<()>,
}

impl SuppressionSet {
    /// Empty set; call [`load`](Self::load) once the store is connected.
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Arc::new(HashSet::new())),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Replace the set with the store's current lists. Returns the new size.
    ///
    /// On failure the previous snapshot stays in place.
    #[instrument(skip(self))]
    pub async fn load(&self) -> SuppressionResult<usize> {
        self.rebuild().await
    }

    /// Same as [`load`](Self::load); run after every feedback write.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> SuppressionResult<usize> {
        self.rebuild().await
    }

    pub fn contains(&self, address: &str) -> bool {
        self.snapshot().contains(address)
    }

    /// The current snapshot. Holding it pins that version.
    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    async fn rebuild(&self) -> SuppressionResult<usize> {
        let _guard = self.rebuild_lock.lock().await;

        let document = self
            .store
            .find_suppression_lists()
            .await
            .and_then(|document| document.ok_or(SuppressionError::ConfigDocumentMissing))
            .inspect_err(|e| warn!(error = %e, "Could not rebuild suppression set"))?;

        let next: HashSet<String> = document
            .bounced_mails
            .into_iter()
            .chain(document.complained_mails)
            .collect();
        let size = next.len();

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        info!(size, "Suppression set rebuilt");
        Ok(size)
    }
}

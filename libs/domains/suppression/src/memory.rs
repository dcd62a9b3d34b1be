//! In-process [`FeedbackStore`] for tests and local runs.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{SuppressionError, SuppressionResult};
use crate::lifecycle::Collaborator;
use crate::models::{FeedbackRecord, InsertOutcome, SuppressionDocument, SuppressionList, UpdateOutcome};
use crate::store::FeedbackStore;

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    document: Option<SuppressionDocument>,
    feedback: Vec<FeedbackRecord>,
}

/// Keeps the suppression document and complaint log in memory.
///
/// Mirrors the persistent store's contract: operations fail with
/// [`SuppressionError::NotConnected`] until [`Collaborator::init`] runs, and
/// a store created with [`without_document`](Self::without_document) behaves
/// like a database where the config document was never seeded.
#[derive(Debug)]
pub struct InMemoryFeedbackStore {
    state: Mutex<MemoryState>,
}

impl InMemoryFeedbackStore {
    /// Disconnected store with an empty suppression document.
    pub fn new() -> Self {
        Self::with_document(SuppressionDocument::default())
    }

    pub fn with_document(document: SuppressionDocument) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                document: Some(document),
                ..Default::default()
            }),
        }
    }

    pub fn without_document() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Empty store that is already connected.
    pub fn connected() -> Self {
        let store = Self::new();
        store.lock().connected = true;
        store
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn document(&self) -> Option<SuppressionDocument> {
        self.lock().document.clone()
    }

    pub fn feedback(&self) -> Vec<FeedbackRecord> {
        self.lock().feedback.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connected_state(&self) -> SuppressionResult<MutexGuard<'_, MemoryState>> {
        let state = self.lock();
        if state.connected {
            Ok(state)
        } else {
            Err(SuppressionError::NotConnected)
        }
    }
}

impl Default for InMemoryFeedbackStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn find_suppression_lists(&self) -> SuppressionResult<Option<SuppressionDocument>> {
        Ok(self.connected_state()?.document.clone())
    }

    async fn add_to_set(
        &self,
        list: SuppressionList,
        address: &str,
    ) -> SuppressionResult<UpdateOutcome> {
        let mut state = self.connected_state()?;
        let Some(document) = state.document.as_mut() else {
            return Ok(UpdateOutcome {
                matched_count: 0,
                modified_count: 0,
            });
        };

        let entries = document.list_mut(list);
        let modified_count = if entries.iter().any(|a| a == address) {
            0
        } else {
            entries.push(address.to_string());
            1
        };

        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count,
        })
    }

    async fn insert_feedback(&self, record: &FeedbackRecord) -> SuppressionResult<InsertOutcome> {
        let mut state = self.connected_state()?;
        state.feedback.push(record.clone());

        Ok(InsertOutcome {
            inserted_id: format!("memory-{}", state.feedback.len()),
        })
    }
}

#[async_trait]
impl Collaborator for InMemoryFeedbackStore {
    fn name(&self) -> &'static str {
        "memory-store"
    }

    async fn init(&self) -> SuppressionResult<()> {
        self.lock().connected = true;
        Ok(())
    }

    async fn close(&self) -> SuppressionResult<()> {
        self.lock().connected = false;
        Ok(())
    }
}

use async_trait::async_trait;

use crate::error::SuppressionResult;
use crate::models::{FeedbackRecord, InsertOutcome, SuppressionDocument, SuppressionList, UpdateOutcome};

/// Persistence seam for suppression lists and the complaint log.
///
/// Implementations must make [`add_to_set`](FeedbackStore::add_to_set)
/// idempotent: adding an address already in the list is a no-op that still
/// succeeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Read the suppression document, `None` if it does not exist.
    async fn find_suppression_lists(&self) -> SuppressionResult<Option<SuppressionDocument>>;

    /// Add `address` to `list` unless it is already there.
    async fn add_to_set(
        &self,
        list: SuppressionList,
        address: &str,
    ) -> SuppressionResult<UpdateOutcome>;

    /// Append a record to the complaint log.
    async fn insert_feedback(&self, record: &FeedbackRecord) -> SuppressionResult<InsertOutcome>;
}

//! Records bounce and complaint feedback and keeps the suppression set in step.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::error::{SuppressionError, SuppressionResult};
use crate::models::{ComplaintOutcome, FeedbackKind, FeedbackRecord, UpdateOutcome};
use crate::store::FeedbackStore;
use crate::suppression::SuppressionSet;

/// A refresh of the suppression set that was started after a feedback write.
///
/// The refresh is already running when the handle is returned. Call
/// [`wait`](Self::wait) to block until the write is visible to
/// [`SuppressionSet::contains`], or [`detach`](Self::detach) to let it finish
/// in the background. Until a detached refresh completes, sends may still be
/// filtered against the previous snapshot.
#[must_use = "either wait() on the refresh or detach() it"]
pub struct RefreshHandle(JoinHandle<SuppressionResult<usize>>);

impl RefreshHandle {
    /// Wait for the refresh and return the new set size.
    pub async fn wait(self) -> SuppressionResult<usize> {
        self.0
            .await
            .map_err(|e| SuppressionError::Internal(format!("refresh task failed: {}", e)))?
    }

    pub fn detach(self) {}
}

/// Result of a feedback write plus the refresh it triggered.
#[must_use]
pub struct Recorded<T> {
    pub outcome: T,
    pub refresh: RefreshHandle,
}

pub struct FeedbackRecorder {
    store: Arc<dyn FeedbackStore>,
    suppression: Arc<SuppressionSet>,
}

impl FeedbackRecorder {
    pub fn new(store: Arc<dyn FeedbackStore>, suppression: Arc<SuppressionSet>) -> Self {
        Self { store, suppression }
    }

    /// Add `mail_id` to the bounced list.
    ///
    /// Recording the same address twice succeeds both times; the second
    /// outcome reports `modified_count == 0`.
    #[instrument(skip(self))]
    pub async fn record_bounce(&self, mail_id: &str) -> SuppressionResult<Recorded<UpdateOutcome>> {
        require_mail_id(mail_id)?;

        let outcome = self.add(FeedbackKind::Bounced, mail_id).await?;
        info!(added = outcome.added(), "Bounce recorded");

        Ok(Recorded {
            outcome,
            refresh: self.schedule_refresh(),
        })
    }

    /// Add `mail_id` to the complained list and append the complaint to the log.
    ///
    /// The two writes are independent. If only the list write succeeds the
    /// refresh still runs (suppression depends on the list alone) but the
    /// call reports the log failure.
    #[instrument(skip(self, complaint))]
    pub async fn record_complaint(
        &self,
        mail_id: &str,
        complaint: serde_json::Value,
    ) -> SuppressionResult<Recorded<ComplaintOutcome>> {
        require_mail_id(mail_id)?;
        if complaint.is_null() {
            return Err(SuppressionError::MissingParameter("complaint is required".into()));
        }

        let record = FeedbackRecord::complaint(mail_id, complaint);
        let (config, logged) = tokio::join!(
            self.add(FeedbackKind::Complained, mail_id),
            self.store.insert_feedback(&record),
        );
        let logged = logged.inspect_err(|e| warn!(error = %e, "Failed to log complaint"));

        let config = config?;
        let refresh = self.schedule_refresh();

        let complaint = match logged {
            Ok(complaint) => complaint,
            Err(e) => {
                refresh.detach();
                return Err(e);
            }
        };

        info!(added = config.added(), complaint_id = %complaint.inserted_id, "Complaint recorded");
        Ok(Recorded {
            outcome: ComplaintOutcome { config, complaint },
            refresh,
        })
    }

    async fn add(&self, kind: FeedbackKind, mail_id: &str) -> SuppressionResult<UpdateOutcome> {
        let list = kind.list();
        let outcome = self
            .store
            .add_to_set(list, mail_id)
            .await
            .inspect_err(|e| warn!(error = %e, list = list.field(), "Failed to update suppression list"))?;

        if outcome.matched_count == 0 {
            warn!(list = list.field(), "Suppression config document not found");
            return Err(SuppressionError::ConfigDocumentMissing);
        }
        Ok(outcome)
    }

    fn schedule_refresh(&self) -> RefreshHandle {
        let suppression = Arc::clone(&self.suppression);
        RefreshHandle(tokio::spawn(async move { suppression.refresh().await }))
    }
}

fn require_mail_id(mail_id: &str) -> SuppressionResult<()> {
    if mail_id.trim().is_empty() {
        return Err(SuppressionError::MissingParameter("mailId is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Collaborator;
    use crate::memory::InMemoryFeedbackStore;
    use crate::models::{InsertOutcome, SuppressionDocument, SuppressionList};
    use crate::store::MockFeedbackStore;
    use mockall::predicate::eq;
    use serde_json::json;

    fn recorder_with(store: Arc<dyn FeedbackStore>) -> (FeedbackRecorder, Arc<SuppressionSet>) {
        let suppression = Arc::new(SuppressionSet::new(Arc::clone(&store)));
        (FeedbackRecorder::new(store, Arc::clone(&suppression)), suppression)
    }

    #[tokio::test]
    async fn test_bounce_is_idempotent() {
        let store = Arc::new(InMemoryFeedbackStore::connected());
        let (recorder, suppression) = recorder_with(store.clone());

        let first = recorder.record_bounce("a@x.com").await.unwrap();
        assert!(first.outcome.added());
        assert_eq!(first.refresh.wait().await.unwrap(), 1);

        let second = recorder.record_bounce("a@x.com").await.unwrap();
        assert!(!second.outcome.added());
        assert_eq!(second.outcome.matched_count, 1);
        assert_eq!(second.refresh.wait().await.unwrap(), 1);

        assert!(suppression.contains("a@x.com"));
        assert_eq!(store.document().unwrap().bounced_mails, vec!["a@x.com"]);
    }

    #[tokio::test]
    async fn test_complaint_is_logged_and_suppressed() {
        let store = Arc::new(InMemoryFeedbackStore::connected());
        let (recorder, suppression) = recorder_with(store.clone());

        let recorded = recorder
            .record_complaint("c@x.com", json!({"complaintFeedbackType": "abuse"}))
            .await
            .unwrap();
        recorded.refresh.wait().await.unwrap();

        let log = store.feedback();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].mail_id, "c@x.com");
        assert_eq!(log[0].kind, FeedbackKind::Complained);
        assert!(suppression.contains("c@x.com"));
    }

    #[tokio::test]
    async fn test_detached_refresh_eventually_converges() {
        let store = Arc::new(InMemoryFeedbackStore::connected());
        let (recorder, suppression) = recorder_with(store);

        recorder.record_bounce("late@x.com").await.unwrap().refresh.detach();

        for _ in 0..100 {
            if suppression.contains("late@x.com") {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("suppression set never picked up the bounce");
    }

    #[tokio::test]
    async fn test_blank_mail_id_never_touches_store() {
        // no expectations: any store call fails the test
        let store = MockFeedbackStore::new();
        let (recorder, _) = recorder_with(Arc::new(store));

        let err = recorder.record_bounce("  ").await.err().unwrap();
        assert!(matches!(err, SuppressionError::MissingParameter(_)));

        let err = recorder
            .record_complaint("a@x.com", serde_json::Value::Null)
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "complaint is required");
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_without_refresh() {
        let mut store = MockFeedbackStore::new();
        store
            .expect_add_to_set()
            .with(eq(SuppressionList::Bounced), eq("a@x.com"))
            .times(1)
            .returning(|_, _| Err(SuppressionError::Store("write concern timeout".into())));
        store.expect_find_suppression_lists().never();

        let (recorder, _) = recorder_with(Arc::new(store));
        let err = recorder.record_bounce("a@x.com").await.err().unwrap();
        assert!(matches!(err, SuppressionError::Store(_)));
    }

    #[tokio::test]
    async fn test_missing_config_document_is_a_failure() {
        let store = Arc::new(InMemoryFeedbackStore::without_document());
        store.init().await.unwrap();
        let (recorder, _) = recorder_with(store);

        let err = recorder.record_bounce("a@x.com").await.err().unwrap();
        assert!(matches!(err, SuppressionError::ConfigDocumentMissing));
    }

    #[tokio::test]
    async fn test_complaint_log_failure_still_refreshes() {
        let mut store = MockFeedbackStore::new();
        store.expect_add_to_set().returning(|_, _| {
            Ok(UpdateOutcome {
                matched_count: 1,
                modified_count: 1,
            })
        });
        store
            .expect_insert_feedback()
            .returning(|_| Err(SuppressionError::Store("complaints collection unavailable".into())));
        store.expect_find_suppression_lists().times(1).returning(|| {
            Ok(Some(SuppressionDocument {
                complained_mails: vec!["c@x.com".into()],
                ..Default::default()
            }))
        });

        let (recorder, suppression) = recorder_with(Arc::new(store));
        let err = recorder
            .record_complaint("c@x.com", json!({"type": "abuse"}))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SuppressionError::Store(_)));

        for _ in 0..100 {
            if suppression.contains("c@x.com") {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("refresh did not run after the list write");
    }

    #[tokio::test]
    async fn test_complaint_list_failure_skips_refresh() {
        let mut store = MockFeedbackStore::new();
        store
            .expect_add_to_set()
            .returning(|_, _| Err(SuppressionError::NotConnected));
        store.expect_insert_feedback().returning(|_| {
            Ok(InsertOutcome {
                inserted_id: "1".into(),
            })
        });
        store.expect_find_suppression_lists().never();

        let (recorder, _) = recorder_with(Arc::new(store));
        let err = recorder
            .record_complaint("c@x.com", json!({}))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SuppressionError::NotConnected));
    }
}

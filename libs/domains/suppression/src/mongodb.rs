//! MongoDB implementation of FeedbackStore

use async_trait::async_trait;
use database::mongodb::{MongoConfig, connect_from_config};
use mongodb::{
    Client, Collection,
    bson::{self, Bson, Document, doc},
};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::error::{SuppressionError, SuppressionResult};
use crate::lifecycle::Collaborator;
use crate::models::{FeedbackRecord, InsertOutcome, SuppressionDocument, SuppressionList, UpdateOutcome};
use crate::store::FeedbackStore;

const CONFIG_COLLECTION: &str = "config";
const COMPLAINTS_COLLECTION: &str = "complaints";
const CONFIG_DOCUMENT_ID: i32 = 1;

/// MongoDB-backed feedback store.
///
/// The suppression lists live in the `config` collection as the single
/// document `{_id: 1, bounced_mails, complained_mails}`, which must be seeded
/// out of band. Complaints are appended to the `complaints` collection.
///
/// The client is created by [`Collaborator::init`] and dropped by
/// [`Collaborator::close`]; every other call fails with
/// [`SuppressionError::NotConnected`] outside that window.
pub struct MongoFeedbackStore {
    config: MongoConfig,
    client: RwLock<Option<Client>>,
}

impl MongoFeedbackStore {
    /// Create a disconnected store
    ///
    /// # Example
    /// ```ignore
    /// let store = Arc::new(MongoFeedbackStore::new(MongoConfig::from_env()?));
    /// let lifecycle = ServiceLifecycle::new(vec![store.clone()]);
    /// ```
    pub fn new(config: MongoConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
        }
    }

    /// Wrap an already connected client, e.g. one owned by a test container.
    pub fn with_client(config: MongoConfig, client: Client) -> Self {
        Self {
            config,
            client: RwLock::new(Some(client)),
        }
    }

    async fn collection(&self, name: &str) -> SuppressionResult<Collection<Document>> {
        self.client
            .read()
            .await
            .as_ref()
            .map(|client| client.database(&self.config.database).collection(name))
            .ok_or(SuppressionError::NotConnected)
    }
}

#[async_trait]
impl FeedbackStore for MongoFeedbackStore {
    #[instrument(skip(self))]
    async fn find_suppression_lists(&self) -> SuppressionResult<Option<SuppressionDocument>> {
        let collection = self.collection(CONFIG_COLLECTION).await?;

        collection
            .find_one(doc! { "_id": CONFIG_DOCUMENT_ID })
            .await?
            .map(bson::from_document::<SuppressionDocument>)
            .transpose()
            .map_err(|e| SuppressionError::Store(format!("malformed config document: {}", e)))
    }

    #[instrument(skip(self), fields(list = list.field()))]
    async fn add_to_set(
        &self,
        list: SuppressionList,
        address: &str,
    ) -> SuppressionResult<UpdateOutcome> {
        let collection = self.collection(CONFIG_COLLECTION).await?;

        let mut entry = Document::new();
        entry.insert(list.field(), address);

        let result = collection
            .update_one(doc! { "_id": CONFIG_DOCUMENT_ID }, doc! { "$addToSet": entry })
            .await?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    #[instrument(skip(self, record), fields(mail_id = %record.mail_id))]
    async fn insert_feedback(&self, record: &FeedbackRecord) -> SuppressionResult<InsertOutcome> {
        let collection = self.collection(COMPLAINTS_COLLECTION).await?;

        let complaint = match &record.complaint {
            Some(value) => bson::to_bson(value)
                .map_err(|e| SuppressionError::InvalidPayload(e.to_string()))?,
            None => Bson::Null,
        };

        let result = collection
            .insert_one(doc! {
                "mailId": record.mail_id.as_str(),
                "kind": record.kind.as_str(),
                "complaint": complaint,
                "timestamp": bson::DateTime::from_millis(record.timestamp.timestamp_millis()),
            })
            .await?;

        let inserted_id = match result.inserted_id {
            Bson::ObjectId(id) => id.to_hex(),
            other => other.to_string(),
        };

        Ok(InsertOutcome { inserted_id })
    }
}

#[async_trait]
impl Collaborator for MongoFeedbackStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn init(&self) -> SuppressionResult<()> {
        let mut slot = self.client.write().await;
        if slot.is_none() {
            *slot = Some(connect_from_config(&self.config).await?);
        }
        Ok(())
    }

    async fn close(&self) -> SuppressionResult<()> {
        let client = self.client.write().await.take();
        if let Some(client) = client {
            client.shutdown().await;
            info!("MongoDB client closed");
        }
        Ok(())
    }
}

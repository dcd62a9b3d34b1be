//! Suppression Domain
//!
//! Suppression-aware mail dispatch: addresses that bounced or complained are
//! recorded in a persisted feedback store and stripped from every outbound
//! envelope before it reaches the mail provider.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Handlers                   │  ← HTTP endpoints
//! └──────┬───────────────────────────────┬──────┘
//!        │                               │
//! ┌──────▼──────────┐           ┌────────▼───────┐
//! │ FeedbackRecorder│           │ MailDispatcher │  ← record feedback / filter + send
//! └──────┬──────────┘           └──┬──────────┬──┘
//!        │   refresh  ┌────────────▼──┐       │
//!        ├───────────►│ SuppressionSet│       │    ← in-memory snapshot
//!        │            └───────┬───────┘       │
//! ┌──────▼────────────────────▼──┐   ┌────────▼───────┐
//! │        FeedbackStore         │   │  MailProvider  │  ← traits + MongoDB / SES
//! └──────────────────────────────┘   └────────────────┘
//! ```
//!
//! [`ServiceLifecycle`] owns startup and shutdown of the store.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_suppression::{
//!     Collaborator, FeedbackRecorder, MailDispatcher, MongoFeedbackStore, RelayState, ServiceLifecycle,
//!     SesProvider, SuppressionSet, handlers, models::{MailTemplate, SesConfig},
//! };
//! use database::mongodb::MongoConfig;
//!
//! # async fn example(template: MailTemplate, ses: SesConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MongoFeedbackStore::new(MongoConfig::default()));
//! let lifecycle = ServiceLifecycle::new(vec![store.clone() as Arc<dyn Collaborator>]);
//! lifecycle.start().await?;
//!
//! let suppression = Arc::new(SuppressionSet::new(store.clone()));
//! suppression.load().await?;
//!
//! let provider = Arc::new(SesProvider::from_config(&ses).await);
//! let state = RelayState::new(
//!     Arc::new(FeedbackRecorder::new(store, suppression.clone())),
//!     Arc::new(MailDispatcher::new(provider, suppression, template)),
//! );
//! let router = handlers::router(state);
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod provider;
pub mod recorder;
pub mod store;
pub mod suppression;

// Re-export commonly used types
pub use dispatcher::{FilteredDestination, MailDispatcher, RemovedCounts};
pub use error::{SuppressionError, SuppressionResult};
pub use handlers::RelayState;
pub use lifecycle::{Collaborator, LifecycleState, ServiceLifecycle, ShutdownReport};
pub use memory::InMemoryFeedbackStore;
pub use models::{Destination, FeedbackKind, MailEnvelope, MailTemplate, SesConfig};
pub use mongodb::MongoFeedbackStore;
pub use provider::{MailProvider, RecordingMailProvider, SesProvider};
pub use recorder::{FeedbackRecorder, Recorded, RefreshHandle};
pub use store::FeedbackStore;
pub use suppression::SuppressionSet;

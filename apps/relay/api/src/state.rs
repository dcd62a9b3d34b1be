//! Application state and wiring.
//!
//! Everything the relay needs is built here from a store and a provider:
//! - the suppression set shared by the recorder and the dispatcher
//! - the lifecycle owning the store's connection
//! - the router state handed to the HTTP handlers

use axum::Router;
use axum_helpers::health_router;
use core_config::AppInfo;
use domain_suppression::{
    Collaborator, FeedbackRecorder, FeedbackStore, MailDispatcher, MailProvider, MailTemplate,
    RelayState, ServiceLifecycle, SuppressionSet, handlers,
};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub app: AppInfo,
    pub lifecycle: Arc<ServiceLifecycle>,
    pub suppression: Arc<SuppressionSet>,
    pub relay: RelayState,
}

impl AppState {
    /// Wire the relay around `store`. The store is also the only lifecycle
    /// collaborator.
    pub fn new<S>(
        app: AppInfo,
        store: Arc<S>,
        provider: Arc<dyn MailProvider>,
        template: MailTemplate,
    ) -> Self
    where
        S: FeedbackStore + Collaborator + 'static,
    {
        let lifecycle = Arc::new(ServiceLifecycle::new(vec![
            store.clone() as Arc<dyn Collaborator>
        ]));
        let suppression = Arc::new(SuppressionSet::new(store.clone()));

        let recorder = Arc::new(FeedbackRecorder::new(store, Arc::clone(&suppression)));
        let dispatcher = Arc::new(MailDispatcher::new(
            provider,
            Arc::clone(&suppression),
            template,
        ));

        Self {
            app,
            lifecycle,
            suppression,
            relay: RelayState::new(recorder, dispatcher),
        }
    }

    /// Relay routes plus the health endpoints
    pub fn routes(&self) -> Router {
        handlers::router(self.relay.clone()).merge(health_router(self.app))
    }
}

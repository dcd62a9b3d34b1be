use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::dispatcher::MailDispatcher;
use crate::error::{SuppressionError, SuppressionResult};
use crate::models::{ComplaintOutcome, InsertOutcome, MailEnvelope, UpdateOutcome};
use crate::recorder::FeedbackRecorder;

/// Shared state behind every relay route.
#[derive(Clone)]
pub struct RelayState {
    pub recorder: Arc<FeedbackRecorder>,
    pub dispatcher: Arc<MailDispatcher>,
}

impl RelayState {
    pub fn new(recorder: Arc<FeedbackRecorder>, dispatcher: Arc<MailDispatcher>) -> Self {
        Self {
            recorder,
            dispatcher,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailIdQuery {
    pub mail_id: Option<String>,
}

impl MailIdQuery {
    fn require(self) -> SuppressionResult<String> {
        self.mail_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| SuppressionError::MissingParameter("mailId is required".into()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BouncedResponse {
    pub updated: UpdateOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComplainedResponse {
    pub config: UpdateOutcome,
    pub complaint: InsertOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifiedResponse {
    pub verified: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddressesResponse {
    pub addresses: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: String,
}

/// Create the relay router: feedback intake, send and provider passthroughs
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/bounced", get(bounced))
        .route("/complained", post(complained))
        .route("/send", post(send))
        .route("/verify", get(verify))
        .route("/list", get(list))
        .route("/delete", get(delete))
        .with_state(state)
}

/// Record a bounce for `?mailId=`
async fn bounced(
    State(state): State<RelayState>,
    Query(query): Query<MailIdQuery>,
) -> SuppressionResult<Json<BouncedResponse>> {
    let mail_id = query.require()?;
    let recorded = state.recorder.record_bounce(&mail_id).await?;
    recorded.refresh.detach();

    Ok(Json(BouncedResponse {
        updated: recorded.outcome,
    }))
}

/// Record a complaint for `?mailId=` with body `{"complaint": ...}`
async fn complained(
    State(state): State<RelayState>,
    Query(query): Query<MailIdQuery>,
    body: Bytes,
) -> SuppressionResult<Json<ComplainedResponse>> {
    let mail_id = query.require()?;
    let complaint = complaint_from_body(&body)?;

    let recorded = state.recorder.record_complaint(&mail_id, complaint).await?;
    recorded.refresh.detach();

    let ComplaintOutcome { config, complaint } = recorded.outcome;
    Ok(Json(ComplainedResponse { config, complaint }))
}

/// Accept a mail for delivery.
///
/// Returns 202 as soon as the body parses; filtering and the provider call
/// run in the background and the dispatcher logs how they went.
async fn send(
    State(state): State<RelayState>,
    body: Bytes,
) -> SuppressionResult<impl IntoResponse> {
    let envelope = envelope_from_body(&body)?;

    let dispatcher = Arc::clone(&state.dispatcher);
    tokio::spawn(async move {
        let _ = dispatcher.dispatch(envelope).await;
    });

    Ok(StatusCode::ACCEPTED)
}

async fn verify(State(state): State<RelayState>) -> SuppressionResult<Json<VerifiedResponse>> {
    let verified = state.dispatcher.verify_sender().await?;
    Ok(Json(VerifiedResponse { verified }))
}

async fn list(State(state): State<RelayState>) -> SuppressionResult<Json<AddressesResponse>> {
    let addresses = state.dispatcher.list_verified().await?;
    Ok(Json(AddressesResponse { addresses }))
}

async fn delete(State(state): State<RelayState>) -> SuppressionResult<Json<DeletedResponse>> {
    let deleted = state.dispatcher.delete_sender().await?;
    Ok(Json(DeletedResponse { deleted }))
}

fn complaint_from_body(body: &[u8]) -> SuppressionResult<serde_json::Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(SuppressionError::MissingParameter("complaint is required".into()));
    }

    let mut payload: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| SuppressionError::InvalidPayload(e.to_string()))?;

    match payload.get_mut("complaint").map(serde_json::Value::take) {
        Some(complaint) if !complaint.is_null() => Ok(complaint),
        _ => Err(SuppressionError::MissingParameter("complaint is required".into())),
    }
}

/// An empty body means "use the default template".
fn envelope_from_body(body: &[u8]) -> SuppressionResult<Option<MailEnvelope>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| SuppressionError::InvalidPayload(e.to_string()))
}

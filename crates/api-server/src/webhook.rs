//! Platform webhook: verification handshake and inbound message intake.
//!
//! Every received body is acknowledged with 200 so the platform never
//! retries; processing happens on a spawned task after the response.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use survey_channels::{InboundMessage, WebhookEnvelope};
use survey_engine::{Progression, SurveyEngine};

use crate::server::AppState;
use crate::signature::{verify_signature, SIGNATURE_HEADER};

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhook: subscription handshake.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let subscribed = params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == Some(state.verify_token.as_str());

    if subscribed {
        info!("Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        warn!(mode = ?params.mode, "Webhook verification rejected");
        StatusCode::FORBIDDEN.into_response()
    }
}

/// POST /webhook: inbound messages.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    metrics::counter!("webhook.received").increment(1);

    if let Some(secret) = state.app_secret.as_deref() {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        if !verify_signature(secret, header, &body) {
            warn!("Webhook signature mismatch");
            metrics::counter!("webhook.rejected").increment(1);
            return StatusCode::UNAUTHORIZED;
        }
    }

    let envelope = match WebhookEnvelope::parse(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Unparseable webhook body");
            metrics::counter!("webhook.malformed").increment(1);
            return StatusCode::OK;
        }
    };

    let messages = envelope.messages();
    if messages.is_empty() {
        debug!("Webhook carried no messages");
        return StatusCode::OK;
    }

    let engine = state.engine.clone();
    tokio::spawn(async move {
        process_messages(&engine, messages).await;
    });

    StatusCode::OK
}

/// Feed messages to the engine in delivery order and return the outcomes.
/// Errors are logged per message and do not stop the batch.
pub async fn process_messages(
    engine: &Arc<SurveyEngine>,
    messages: Vec<InboundMessage>,
) -> Vec<Option<Progression>> {
    let mut outcomes = Vec::with_capacity(messages.len());
    for message in messages {
        let answer = message.answer();
        debug!(from = %message.from, kind = message.kind(), "Inbound message");
        match engine.handle(&message.from, answer).await {
            Ok(progression) => {
                debug!(from = %message.from, ?progression, "Inbound message processed");
                outcomes.push(Some(progression));
            }
            Err(e) => {
                error!(from = %message.from, error = %e, "Inbound message failed");
                metrics::counter!("webhook.processing_errors").increment(1);
                outcomes.push(None);
            }
        }
    }
    outcomes
}

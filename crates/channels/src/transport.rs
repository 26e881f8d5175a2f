//! Outbound message model and the transport seam.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use survey_core::types::{ChoiceOption, TemplateRef};
use survey_core::{SurveyError, SurveyResult};

/// A message addressed to one respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub to: String,
    pub body: MessageBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MessageBody {
    /// Pre-approved template, required for first contact.
    Template(TemplateRef),
    /// Interactive message with one reply button per choice.
    Buttons {
        text: String,
        buttons: Vec<ChoiceOption>,
    },
    Text { body: String },
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Template(_) => "template",
            MessageBody::Buttons { .. } => "interactive",
            MessageBody::Text { .. } => "text",
        }
    }
}

/// Something that can deliver a typed message to the messaging platform.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Send the message and return the platform-assigned message id.
    async fn send(&self, message: &OutboundMessage) -> SurveyResult<String>;
}

/// In-memory transport that captures sent messages for testing.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    fail: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose sends all fail (messages are still captured).
    pub fn failing() -> Self {
        let transport = Self::new();
        transport.set_failing(true);
        transport
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn last(&self) -> Option<OutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, message: &OutboundMessage) -> SurveyResult<String> {
        let id = {
            let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
            sent.push(message.clone());
            format!("wamid.test-{}", sent.len())
        };
        if self.fail.load(Ordering::SeqCst) {
            return Err(SurveyError::Transport("simulated send failure".to_string()));
        }
        Ok(id)
    }
}

//! Inbound webhook payloads and answer extraction.
//!
//! Only `entry[].changes[].value.messages[]` is of interest; delivery
//! statuses and other change fields are ignored. Each message is decoded on
//! its own so one malformed message never hides the others.

use serde::Deserialize;
use tracing::debug;

use survey_core::types::Answer;

/// Top-level webhook body posted by the platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// All well-formed messages in delivery order.
    pub fn messages(&self) -> Vec<InboundMessage> {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .flat_map(|change| change.value.messages.iter())
            .filter_map(|raw| match InboundMessage::deserialize(raw) {
                Ok(message) => Some(message),
                Err(e) => {
                    debug!(error = %e, "Skipping malformed inbound message");
                    None
                }
            })
            .collect()
    }
}

/// One inbound chat message. The `type` tag selects the content variant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub content: InboundContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundContent {
    Interactive { interactive: InteractiveReply },
    /// Quick-reply button on a template message.
    Button { button: LegacyButton },
    Text { text: TextBody },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractiveReply {
    ButtonReply { button_reply: ReplyOption },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReplyOption {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyButton {
    pub payload: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextBody {
    pub body: String,
}

impl InboundMessage {
    /// Normalize the message into an `(id, label)` answer. Unsupported
    /// variants and empty answers yield `None`.
    pub fn answer(&self) -> Option<Answer> {
        let answer = match &self.content {
            InboundContent::Interactive {
                interactive: InteractiveReply::ButtonReply { button_reply },
            } => Answer::new(&button_reply.id, &button_reply.title),
            InboundContent::Interactive {
                interactive: InteractiveReply::Other,
            } => return None,
            InboundContent::Button { button } => Answer::new(&button.payload, &button.text),
            InboundContent::Text { text } => Answer::new(&text.body, &text.body),
            InboundContent::Unsupported => return None,
        };
        (!answer.id.is_empty()).then_some(answer)
    }

    pub fn kind(&self) -> &'static str {
        match self.content {
            InboundContent::Interactive { .. } => "interactive",
            InboundContent::Button { .. } => "button",
            InboundContent::Text { .. } => "text",
            InboundContent::Unsupported => "unsupported",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(messages: Vec<serde_json::Value>) -> WebhookEnvelope {
        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": { "phone_number_id": "PN-1" },
                        "messages": messages
                    }
                }]
            }]
        });
        WebhookEnvelope::parse(body.to_string().as_bytes()).unwrap()
    }

    fn single(message: serde_json::Value) -> InboundMessage {
        let mut messages = envelope(vec![message]).messages();
        assert_eq!(messages.len(), 1);
        messages.remove(0)
    }

    #[test]
    fn test_interactive_button_reply() {
        let message = single(json!({
            "from": "573001112233",
            "id": "wamid.1",
            "timestamp": "1717000000",
            "type": "interactive",
            "interactive": {
                "type": "button_reply",
                "button_reply": { "id": "promos", "title": "Promociones y descuentos" }
            }
        }));
        assert_eq!(message.from, "573001112233");
        assert_eq!(message.kind(), "interactive");
        assert_eq!(
            message.answer(),
            Some(Answer::new("promos", "Promociones y descuentos"))
        );
    }

    #[test]
    fn test_legacy_template_button() {
        let message = single(json!({
            "from": "A",
            "type": "button",
            "button": { "payload": "yes", "text": "Sí" }
        }));
        assert_eq!(message.answer(), Some(Answer::new("yes", "Sí")));
    }

    #[test]
    fn test_free_text_uses_body_for_id_and_label() {
        let message = single(json!({
            "from": "A",
            "type": "text",
            "text": { "body": "hi" }
        }));
        assert_eq!(message.answer(), Some(Answer::new("hi", "hi")));
    }

    #[test]
    fn test_unsupported_variants_yield_no_answer() {
        let image = single(json!({
            "from": "A",
            "type": "image",
            "image": { "id": "media-1", "mime_type": "image/jpeg" }
        }));
        assert_eq!(image.content, InboundContent::Unsupported);
        assert_eq!(image.answer(), None);

        let list = single(json!({
            "from": "A",
            "type": "interactive",
            "interactive": {
                "type": "list_reply",
                "list_reply": { "id": "row-1", "title": "Row" }
            }
        }));
        assert_eq!(list.answer(), None);
    }

    #[test]
    fn test_empty_text_yields_no_answer() {
        let message = single(json!({
            "from": "A",
            "type": "text",
            "text": { "body": "" }
        }));
        assert_eq!(message.answer(), None);
    }

    #[test]
    fn test_malformed_message_is_skipped_without_hiding_others() {
        let messages = envelope(vec![
            json!({ "from": "A", "type": "text" }),
            json!({ "type": "text", "text": { "body": "no sender" } }),
            json!({ "from": "B", "type": "text", "text": { "body": "ok" } }),
        ])
        .messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, "B");
    }

    #[test]
    fn test_status_only_payload_has_no_messages() {
        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": { "statuses": [{ "id": "wamid.1", "status": "delivered" }] }
                }]
            }]
        });
        let envelope = WebhookEnvelope::parse(body.to_string().as_bytes()).unwrap();
        assert!(envelope.messages().is_empty());
    }
}

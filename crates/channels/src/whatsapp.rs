//! WhatsApp Business Cloud API send integration.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use survey_core::config::WhatsAppConfig;
use survey_core::{SurveyError, SurveyResult};

use crate::transport::{MessageBody, MessageTransport, OutboundMessage};

/// Reply buttons the platform accepts on one interactive message.
pub const MAX_REPLY_BUTTONS: usize = 3;

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// Posts messages to `{base}/{version}/{phone_number_id}/messages`.
pub struct WhatsAppProvider {
    client: reqwest::Client,
    messages_url: String,
    access_token: String,
    timeout_ms: u64,
}

impl WhatsAppProvider {
    pub fn new(config: &WhatsAppConfig) -> SurveyResult<Self> {
        if config.phone_number_id.is_empty() {
            return Err(SurveyError::Config(
                "whatsapp.phone_number_id must be set".to_string(),
            ));
        }
        if config.access_token.is_empty() {
            warn!("whatsapp.access_token is empty, sends will be rejected by the platform");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.send_timeout_ms))
            .build()
            .map_err(|e| SurveyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            messages_url: messages_url(config),
            access_token: config.access_token.clone(),
            timeout_ms: config.send_timeout_ms,
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    fn map_error(&self, err: reqwest::Error) -> SurveyError {
        if err.is_timeout() {
            SurveyError::Timeout {
                operation: "whatsapp send",
                timeout_ms: self.timeout_ms,
            }
        } else {
            SurveyError::Transport(err.to_string())
        }
    }
}

fn messages_url(config: &WhatsAppConfig) -> String {
    format!(
        "{}/{}/{}/messages",
        config.api_base_url.trim_end_matches('/'),
        config.api_version,
        config.phone_number_id
    )
}

/// Build the Cloud API JSON payload for a message.
pub fn payload(message: &OutboundMessage) -> serde_json::Value {
    match &message.body {
        MessageBody::Template(template) => json!({
            "messaging_product": "whatsapp",
            "to": message.to,
            "type": "template",
            "template": {
                "name": template.name,
                "language": { "code": template.language }
            }
        }),
        MessageBody::Buttons { text, buttons } => {
            let buttons: Vec<serde_json::Value> = buttons
                .iter()
                .map(|option| {
                    json!({
                        "type": "reply",
                        "reply": { "id": option.id, "title": option.title }
                    })
                })
                .collect();
            json!({
                "messaging_product": "whatsapp",
                "to": message.to,
                "type": "interactive",
                "interactive": {
                    "type": "button",
                    "body": { "text": text },
                    "action": { "buttons": buttons }
                }
            })
        }
        MessageBody::Text { body } => json!({
            "messaging_product": "whatsapp",
            "to": message.to,
            "type": "text",
            "text": { "body": body }
        }),
    }
}

#[async_trait]
impl MessageTransport for WhatsAppProvider {
    async fn send(&self, message: &OutboundMessage) -> SurveyResult<String> {
        if let MessageBody::Buttons { buttons, .. } = &message.body {
            if buttons.len() > MAX_REPLY_BUTTONS {
                warn!(
                    to = %message.to,
                    buttons = buttons.len(),
                    max = MAX_REPLY_BUTTONS,
                    "Interactive message exceeds the platform button limit"
                );
            }
        }

        debug!(to = %message.to, kind = message.body.kind(), "Sending WhatsApp message");

        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&payload(message))
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            metrics::counter!("whatsapp.send_errors", "kind" => message.body.kind()).increment(1);
            error!(to = %message.to, status = %status, body = %body, "WhatsApp send rejected");
            return Err(SurveyError::Transport(format!(
                "send rejected with HTTP {status}: {body}"
            )));
        }

        let parsed: SendResponse = response.json().await.map_err(|e| self.map_error(e))?;
        let id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| SurveyError::Transport("send response carried no message id".into()))?;

        metrics::counter!("whatsapp.messages_sent", "kind" => message.body.kind()).increment(1);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::types::{ChoiceOption, TemplateRef};

    fn config() -> WhatsAppConfig {
        WhatsAppConfig {
            api_base_url: "https://graph.facebook.com/".to_string(),
            phone_number_id: "PN-1".to_string(),
            access_token: "token".to_string(),
            ..WhatsAppConfig::default()
        }
    }

    #[test]
    fn test_messages_url() {
        let provider = WhatsAppProvider::new(&config()).unwrap();
        assert_eq!(
            provider.messages_url(),
            "https://graph.facebook.com/v20.0/PN-1/messages"
        );
    }

    #[test]
    fn test_missing_phone_number_id_is_a_config_error() {
        let config = WhatsAppConfig {
            phone_number_id: String::new(),
            ..config()
        };
        assert!(matches!(
            WhatsAppProvider::new(&config),
            Err(SurveyError::Config(_))
        ));
    }

    #[test]
    fn test_button_payload_keeps_option_order() {
        let message = OutboundMessage {
            to: "573001112233".to_string(),
            body: MessageBody::Buttons {
                text: "How often?".to_string(),
                buttons: vec![
                    ChoiceOption {
                        id: "weekly".to_string(),
                        title: "1 vez por semana".to_string(),
                    },
                    ChoiceOption {
                        id: "important".to_string(),
                        title: "Solo info importante".to_string(),
                    },
                ],
            },
        };
        let payload = payload(&message);
        assert_eq!(payload["type"], "interactive");
        assert_eq!(payload["interactive"]["type"], "button");
        assert_eq!(payload["interactive"]["body"]["text"], "How often?");
        let buttons = payload["interactive"]["action"]["buttons"].as_array().unwrap();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0]["type"], "reply");
        assert_eq!(buttons[0]["reply"]["id"], "weekly");
        assert_eq!(buttons[1]["reply"]["title"], "Solo info importante");
    }

    #[test]
    fn test_text_and_template_payloads() {
        let text = payload(&OutboundMessage {
            to: "A".to_string(),
            body: MessageBody::Text {
                body: "Any comments?".to_string(),
            },
        });
        assert_eq!(text["messaging_product"], "whatsapp");
        assert_eq!(text["type"], "text");
        assert_eq!(text["text"]["body"], "Any comments?");

        let template = payload(&OutboundMessage {
            to: "A".to_string(),
            body: MessageBody::Template(TemplateRef {
                name: "feedback_survey2".to_string(),
                language: "es_ES".to_string(),
            }),
        });
        assert_eq!(template["type"], "template");
        assert_eq!(template["template"]["name"], "feedback_survey2");
        assert_eq!(template["template"]["language"]["code"], "es_ES");
    }
}

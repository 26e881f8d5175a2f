//! Outbound question dispatcher: turns a catalog position into a concrete
//! message and hands it to the transport.
//!
//! The message shape depends only on the question's options: choices become
//! reply buttons in catalog order, no choices (and the closing message)
//! become plain text.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use survey_channels::{MessageBody, MessageTransport, OutboundMessage};
use survey_core::{SurveyError, SurveyResult};

use crate::catalog::QuestionCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchTarget {
    Question(u32),
    Closing,
}

pub struct QuestionDispatcher {
    catalog: Arc<QuestionCatalog>,
    transport: Arc<dyn MessageTransport>,
    send_timeout: Duration,
}

impl QuestionDispatcher {
    pub fn new(
        catalog: Arc<QuestionCatalog>,
        transport: Arc<dyn MessageTransport>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            transport,
            send_timeout,
        }
    }

    /// Build the outbound message for `target` without sending it.
    pub fn build(&self, address: &str, target: DispatchTarget) -> SurveyResult<OutboundMessage> {
        let body = match target {
            DispatchTarget::Question(number) => {
                let question = self.catalog.get(number).ok_or_else(|| {
                    SurveyError::Catalog(format!("question {number} is not in the catalog"))
                })?;
                if question.is_free_text() {
                    MessageBody::Text {
                        body: question.prompt.clone(),
                    }
                } else {
                    MessageBody::Buttons {
                        text: question.prompt.clone(),
                        buttons: question.options.clone(),
                    }
                }
            }
            DispatchTarget::Closing => MessageBody::Text {
                body: self.catalog.closing_message().to_string(),
            },
        };

        Ok(OutboundMessage {
            to: address.to_string(),
            body,
        })
    }

    /// Send `target` to the respondent and return the platform message id.
    pub async fn dispatch(&self, address: &str, target: DispatchTarget) -> SurveyResult<String> {
        let message = self.build(address, target)?;
        debug!(to = %address, ?target, kind = message.body.kind(), "Dispatching");

        tokio::time::timeout(self.send_timeout, self.transport.send(&message))
            .await
            .map_err(|_| SurveyError::Timeout {
                operation: "dispatch",
                timeout_ms: self.send_timeout.as_millis() as u64,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_channels::RecordingTransport;
    use survey_core::types::{ChoiceOption, QuestionDefinition, TemplateRef};

    fn catalog() -> Arc<QuestionCatalog> {
        let options = ["tiempo", "producto", "atencion", "otro"]
            .iter()
            .map(|id| ChoiceOption {
                id: id.to_string(),
                title: format!("Option {id}"),
            })
            .collect();
        Arc::new(
            QuestionCatalog::new(
                vec![
                    QuestionDefinition {
                        number: 2,
                        prompt: "How often?".to_string(),
                        options,
                    },
                    QuestionDefinition {
                        number: 3,
                        prompt: "Anything else?".to_string(),
                        options: vec![],
                    },
                ],
                "Thanks!",
                TemplateRef {
                    name: "survey_intro".to_string(),
                    language: "en_US".to_string(),
                },
            )
            .unwrap(),
        )
    }

    fn dispatcher(transport: Arc<RecordingTransport>) -> QuestionDispatcher {
        QuestionDispatcher::new(catalog(), transport, Duration::from_secs(1))
    }

    #[test]
    fn test_options_become_buttons_in_catalog_order() {
        let dispatcher = dispatcher(Arc::new(RecordingTransport::new()));
        let message = dispatcher.build("A", DispatchTarget::Question(2)).unwrap();
        match message.body {
            MessageBody::Buttons { text, buttons } => {
                assert_eq!(text, "How often?");
                let ids: Vec<&str> = buttons.iter().map(|b| b.id.as_str()).collect();
                assert_eq!(ids, vec!["tiempo", "producto", "atencion", "otro"]);
            }
            other => panic!("expected buttons, got {other:?}"),
        }
    }

    #[test]
    fn test_free_text_and_closing_are_text() {
        let dispatcher = dispatcher(Arc::new(RecordingTransport::new()));
        let question = dispatcher.build("A", DispatchTarget::Question(3)).unwrap();
        assert_eq!(
            question.body,
            MessageBody::Text {
                body: "Anything else?".to_string()
            }
        );

        let closing = dispatcher.build("A", DispatchTarget::Closing).unwrap();
        assert_eq!(closing.to, "A");
        assert_eq!(
            closing.body,
            MessageBody::Text {
                body: "Thanks!".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_question_is_a_catalog_error() {
        let dispatcher = dispatcher(Arc::new(RecordingTransport::new()));
        assert!(matches!(
            dispatcher.build("A", DispatchTarget::Question(9)),
            Err(SurveyError::Catalog(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_hands_message_to_transport() {
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = dispatcher(transport.clone());
        let id = dispatcher
            .dispatch("573001112233", DispatchTarget::Question(2))
            .await
            .unwrap();
        assert_eq!(id, "wamid.test-1");
        assert_eq!(transport.last().unwrap().to, "573001112233");
        assert_eq!(transport.last().unwrap().body.kind(), "interactive");
    }
}

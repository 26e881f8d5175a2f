//! WhatsApp Cloud API plumbing for the survey bot.
//!
//! Inbound: webhook envelopes normalized into typed messages and answers.
//! Outbound: typed messages serialized and posted to the send endpoint,
//! plus bulk template outreach for first contact.

pub mod inbound;
pub mod outreach;
pub mod transport;
pub mod whatsapp;

pub use inbound::{InboundMessage, WebhookEnvelope};
pub use outreach::{OutreachReport, OutreachRunner};
pub use transport::{MessageBody, MessageTransport, OutboundMessage, RecordingTransport};
pub use whatsapp::WhatsAppProvider;

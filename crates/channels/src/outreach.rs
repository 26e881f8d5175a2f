//! Bulk first-contact outreach: sends the approved survey template to a list
//! of contacts at a fixed rate.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use survey_core::types::TemplateRef;

use crate::transport::{MessageBody, MessageTransport, OutboundMessage};

/// Rates above one message per nanosecond are clamped to this period.
const MIN_SEND_INTERVAL: Duration = Duration::from_nanos(1);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutreachReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct OutreachRunner {
    transport: Arc<dyn MessageTransport>,
    template: TemplateRef,
    interval: Duration,
}

impl OutreachRunner {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        template: TemplateRef,
        messages_per_second: u32,
    ) -> Self {
        let rate = messages_per_second.max(1);
        Self {
            transport,
            template,
            interval: (Duration::from_secs(1) / rate).max(MIN_SEND_INTERVAL),
        }
    }

    /// Parse a newline-separated contact list. Blank lines and `#` comments
    /// are skipped, a leading `+` is dropped and duplicates are kept once.
    pub fn parse_contacts(contents: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.trim_start_matches('+').to_string())
            .filter(|contact| seen.insert(contact.clone()))
            .collect()
    }

    /// Send the template to every contact. Failures are logged and counted
    /// but never stop the run.
    pub async fn run(&self, contacts: &[String]) -> OutreachReport {
        info!(
            contacts = contacts.len(),
            template = %self.template.name,
            interval_ms = self.interval.as_millis() as u64,
            "Starting survey outreach"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report = OutreachReport::default();
        for contact in contacts {
            ticker.tick().await;
            let message = OutboundMessage {
                to: contact.clone(),
                body: MessageBody::Template(self.template.clone()),
            };
            match self.transport.send(&message).await {
                Ok(message_id) => {
                    info!(to = %contact, message_id = %message_id, "Survey template sent");
                    metrics::counter!("outreach.sent").increment(1);
                    report.sent += 1;
                }
                Err(e) => {
                    error!(to = %contact, error = %e, "Survey template send failed");
                    metrics::counter!("outreach.failed").increment(1);
                    report.failed += 1;
                }
            }
        }

        info!(sent = report.sent, failed = report.failed, "Survey outreach finished");
        report
    }
}

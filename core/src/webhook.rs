//! Forwarding of rendered exports to an external automation webhook.

use crate::config::WebhookConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookPayload {
    pub xml: String,
    pub test_suite_id: i64,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook rejected the export with status {status}")]
    Rejected { status: u16 },
    #[error("webhook request failed: {0}")]
    Transport(String),
}

/// Receiver of forwarded exports.
pub trait Forwarder {
    fn forward(&self, payload: &WebhookPayload) -> Result<(), WebhookError>;
}

/// Posts the payload as JSON to a configured HTTP endpoint.
pub struct HttpForwarder {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpForwarder {
    pub fn new(config: &WebhookConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            agent,
            endpoint: config.endpoint.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Forwarder for HttpForwarder {
    fn forward(&self, payload: &WebhookPayload) -> Result<(), WebhookError> {
        log::debug!(
            "posting export of suite {} to {}",
            payload.test_suite_id,
            self.endpoint
        );
        match self.agent.post(&self.endpoint).send_json(payload) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(status, _)) => Err(WebhookError::Rejected { status }),
            Err(err) => Err(WebhookError::Transport(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn payload_serializes_with_wire_field_names() {
        let payload = WebhookPayload {
            xml: "<testcases/>".to_string(),
            test_suite_id: 201,
        };
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["xml"], "<testcases/>");
        assert_eq!(json["test_suite_id"], 201);
    }

    #[test]
    fn unreachable_endpoint_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);

        let forwarder = HttpForwarder::new(&WebhookConfig {
            endpoint: format!("http://{addr}/webhook"),
            timeout_secs: 2,
        });
        let result = forwarder.forward(&WebhookPayload {
            xml: String::new(),
            test_suite_id: 1,
        });
        assert!(matches!(result, Err(WebhookError::Transport(_))));
    }
}

use super::logging::{debug_payload_enabled, emit_debug_payload};
use super::stream::decode_data_stream;
use super::transport::{EventStream, Transport};
use crate::config::Config;
use crate::error::TransportError;
use crate::types::StreamRequest;
use crate::util::is_local_endpoint_url;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

/// Streams agent turns from an HTTP chat endpoint speaking the data stream protocol.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
        }
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

pub fn request_payload(request: &StreamRequest) -> Value {
    let mut payload = json!({
        "id": request.session_id,
        "messages": request.conversation(),
        "visibility": request.visibility,
    });
    if let (Some(agent), Some(object)) = (&request.agent, payload.as_object_mut()) {
        object.insert("agentId".to_string(), json!(agent.agent_id));
    }
    payload
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open_stream(&self, request: StreamRequest) -> Result<EventStream, TransportError> {
        let payload = request_payload(&request);
        if debug_payload_enabled() {
            emit_debug_payload(&self.api_url, &payload);
        }

        let mut http_request = self
            .http
            .post(&self.api_url)
            .header("content-type", "application/json")
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.header("authorization", format!("Bearer {api_key}"));
        }

        let response = http_request.send().await.map_err(|error| {
            log_request_error(&error, &self.api_url);
            TransportError::Http(error)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes_stream()
            .map(|item| item.map_err(TransportError::Http));
        Ok(decode_data_stream(Box::pin(bytes)))
    }
}

fn log_request_error(error: &reqwest::Error, request_url: &str) {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        tracing::error!(
            url = request_url,
            %error,
            "cannot reach local chat endpoint; start the local server or update AGENTCHAT_API_URL"
        );
    } else if error.is_connect() {
        tracing::error!(url = request_url, %error, "cannot reach chat endpoint");
    } else if error.is_timeout() {
        tracing::error!(url = request_url, %error, "chat request timed out");
    } else {
        tracing::error!(url = request_url, %error, "chat request failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentBinding, Message, Visibility};

    #[test]
    fn test_request_payload_includes_new_turn_and_agent() {
        let request = StreamRequest {
            session_id: "chat-1".to_string(),
            messages: vec![Message::user("earlier", Vec::new())],
            new_user_turn: Some(Message::user("now", Vec::new())),
            agent: Some(AgentBinding {
                agent_id: "agent-7".to_string(),
                name: "Weather".to_string(),
                ..AgentBinding::default()
            }),
            visibility: Visibility::Public,
        };

        let payload = request_payload(&request);
        assert_eq!(payload["id"], "chat-1");
        assert_eq!(payload["messages"].as_array().map(Vec::len), Some(2));
        assert_eq!(payload["messages"][1]["parts"][0]["text"], "now");
        assert_eq!(payload["agentId"], "agent-7");
        assert_eq!(payload["visibility"], "public");
    }

    #[test]
    fn test_transport_reports_local_endpoint() {
        let transport = HttpTransport::new(&Config::default());
        assert!(transport.is_local_endpoint());
    }
}

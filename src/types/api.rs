use super::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Incremental events produced by one agent stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    Start {
        #[serde(default, rename = "messageId")]
        message_id: Option<String>,
    },
    TextDelta {
        text: String,
    },
    ReasoningDelta {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        result: Value,
    },
    #[serde(rename_all = "camelCase")]
    Finish {
        #[serde(default)]
        finish_reason: Option<String>,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Start { .. } => "start",
            StreamEvent::TextDelta { .. } => "text-delta",
            StreamEvent::ReasoningDelta { .. } => "reasoning-delta",
            StreamEvent::ToolCall { .. } => "tool-call",
            StreamEvent::ToolResult { .. } => "tool-result",
            StreamEvent::Finish { .. } => "finish",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Everything a transport needs to open one stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    pub session_id: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_user_turn: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentBinding>,
    pub visibility: Visibility,
}

impl StreamRequest {
    /// Full message list as the agent should see it.
    pub fn conversation(&self) -> Vec<Message> {
        let mut messages = self.messages.clone();
        messages.extend(self.new_user_turn.clone());
        messages
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentBinding {
    pub agent_id: String,
    pub name: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Tools of this agent that must be approved by a human before they run.
    #[serde(default)]
    pub confirmation_required: BTreeSet<String>,
}

/// Structured answer a host sends back for a confirmation prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultPayload {
    pub success: bool,
    pub output: Value,
}

impl ToolResultPayload {
    pub fn approved(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn denied(reason: impl Into<Value>) -> Self {
        Self {
            success: false,
            output: reason.into(),
        }
    }
}

/// A persisted conversation record as listed in the history sidebar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    pub title: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

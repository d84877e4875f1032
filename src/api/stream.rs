use super::logging::emit_stream_parse_error;
use super::transport::{ByteStream, EventStream};
use crate::error::TransportError;
use crate::types::StreamEvent;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;

/// Incremental decoder for the line-oriented data stream protocol.
///
/// Every line is `<code>:<json>`. Chunks may split a line (or a UTF-8
/// sequence) anywhere; bytes are buffered until a newline arrives.
#[derive(Default)]
pub struct DataStreamParser {
    buffer: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallLine {
    tool_call_id: String,
    tool_name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultLine {
    tool_call_id: String,
    result: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishLine {
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartLine {
    #[serde(default)]
    message_id: Option<String>,
}

impl DataStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, TransportError>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;

        while let Some(end) = self.buffer[start..].iter().position(|byte| *byte == b'\n') {
            let line_end = start + end;
            if let Some(decoded) = decode_line_bytes(&self.buffer[start..line_end]) {
                events.push(decoded);
            }
            start = line_end + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        events
    }

    /// Decodes a trailing line that was not newline-terminated.
    pub fn flush(&mut self) -> Vec<Result<StreamEvent, TransportError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line_bytes(&rest).into_iter().collect()
    }
}

fn decode_line_bytes(bytes: &[u8]) -> Option<Result<StreamEvent, TransportError>> {
    match std::str::from_utf8(bytes) {
        Ok(line) => decode_line(line).transpose(),
        Err(error) => Some(Err(TransportError::Decode(format!("invalid utf-8: {error}")))),
    }
}

pub fn decode_line(line: &str) -> Result<Option<StreamEvent>, TransportError> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Ok(None);
    }

    let Some((code, json_data)) = line.split_once(':') else {
        return Err(TransportError::Decode(line.to_string()));
    };
    let mut code_chars = code.chars();
    let (Some(code), None) = (code_chars.next(), code_chars.next()) else {
        return Err(TransportError::Decode(line.to_string()));
    };

    let event = match code {
        '0' => parse::<String>(code, json_data).map(|text| StreamEvent::TextDelta { text }),
        'g' => parse::<String>(code, json_data).map(|text| StreamEvent::ReasoningDelta { text }),
        '9' => parse::<ToolCallLine>(code, json_data).map(|call| StreamEvent::ToolCall {
            tool_call_id: call.tool_call_id,
            tool_name: call.tool_name,
            args: call.args,
        }),
        'a' => parse::<ToolResultLine>(code, json_data).map(|result| StreamEvent::ToolResult {
            tool_call_id: result.tool_call_id,
            result: result.result,
        }),
        '3' => parse::<String>(code, json_data).map(|message| StreamEvent::Error { message }),
        'd' => parse::<FinishLine>(code, json_data).map(|finish| StreamEvent::Finish {
            finish_reason: finish.finish_reason,
        }),
        'f' => parse::<StartLine>(code, json_data).map(|start| StreamEvent::Start {
            message_id: start.message_id,
        }),
        other => {
            tracing::trace!(code = %other, "ignoring unsupported stream line");
            return Ok(None);
        }
    }?;

    Ok(Some(event))
}

fn parse<T: serde::de::DeserializeOwned>(code: char, json_data: &str) -> Result<T, TransportError> {
    serde_json::from_str::<T>(json_data).map_err(|error| {
        emit_stream_parse_error(code, json_data, &error);
        TransportError::Decode(format!("{code}: {error}"))
    })
}

struct DecodeState {
    bytes: ByteStream,
    parser: DataStreamParser,
    ready: VecDeque<Result<StreamEvent, TransportError>>,
    finished: bool,
}

/// Turns a raw response body into an event stream. The first error ends the stream.
pub fn decode_data_stream(bytes: ByteStream) -> EventStream {
    let state = DecodeState {
        bytes,
        parser: DataStreamParser::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                if item.is_err() {
                    state.ready.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let decoded = state.parser.process(&chunk);
                    state.ready.extend(decoded);
                }
                Some(Err(error)) => {
                    state.ready.push_back(Err(error));
                }
                None => {
                    state.finished = true;
                    let decoded = state.parser.flush();
                    state.ready.extend(decoded);
                }
            }
        }
    }))
}

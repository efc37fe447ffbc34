//! Wire schema exchanged between a worker client and host

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Correlates a reply with the call that caused it.
///
/// The handshake id and per-call ids are separate variants, so they never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationId {
	Init,
	Call(u64),
}

impl std::fmt::Display for CorrelationId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CorrelationId::Init => write!(f, "init"),
			CorrelationId::Call(n) => write!(f, "#{}", n),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
	pub id: CorrelationId,
	/// Present (even as `null`) only for execution requests
	#[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	pub task: String,
	pub model_id: String,
	#[serde(default)]
	pub options: Map<String, Value>,
	#[serde(default, rename = "pipeOptions", skip_serializing_if = "Option::is_none")]
	pub pipe_options: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
	#[serde(rename = "REQUEST")]
	Request(PipelineRequest),

	#[serde(rename = "RESPONSE_READY")]
	Ready { id: CorrelationId },

	#[serde(rename = "RESPONSE_RESULT")]
	Outcome {
		id: CorrelationId,
		#[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
		result: Option<Value>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		error: Option<String>,
	},

	#[serde(rename = "RESPONSE_INVOKE_CALLBACK")]
	InvokeCallback {
		#[serde(rename = "functionId")]
		function_id: String,
		#[serde(default)]
		args: Vec<Value>,
	},
}

/// What a reply means once its wire shape is decoded
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
	Ready,
	Output(Value),
	Failed(String),
}

impl WorkerMessage {
	pub fn ready(id: CorrelationId) -> Self {
		WorkerMessage::Ready { id }
	}

	pub fn output(id: CorrelationId, result: Value) -> Self {
		WorkerMessage::Outcome { id, result: Some(result), error: None }
	}

	pub fn failure(id: CorrelationId, error: impl Into<String>) -> Self {
		WorkerMessage::Outcome { id, result: None, error: Some(error.into()) }
	}

	/// Decode a reply; `None` for requests and callback invocations
	pub fn into_reply(self) -> Option<(CorrelationId, Reply)> {
		match self {
			WorkerMessage::Ready { id } => Some((id, Reply::Ready)),
			WorkerMessage::Outcome { id, error: Some(error), .. } => Some((id, Reply::Failed(error))),
			WorkerMessage::Outcome { id, result, error: None } => {
				Some((id, Reply::Output(result.unwrap_or(Value::Null))))
			}
			WorkerMessage::Request(_) | WorkerMessage::InvokeCallback { .. } => None,
		}
	}
}

// Distinguishes an explicit `null` from an absent field
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
	D: Deserializer<'de>,
{
	Value::deserialize(deserializer).map(Some)
}

//! Callback serialization across the worker boundary
//!
//! The client swaps each callback option for `{"__fn": true, "functionId": "cb_<name>"}`
//! and keeps the closure; the host swaps the marker back for a proxy that posts
//! an invoke message. Ids come from the option name, so serializing the same
//! option twice yields the same id.

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Outbox, WorkerMessage};
use crate::ui;

pub const FUNCTION_MARKER: &str = "__fn";
pub const FUNCTION_ID_FIELD: &str = "functionId";
pub const FUNCTION_ID_PREFIX: &str = "cb_";

pub type Callback = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// An option value: plain data or a live callback
#[derive(Clone)]
pub enum OptionValue {
	Value(Value),
	Callback(Callback),
}

impl OptionValue {
	pub fn callback<F>(f: F) -> Self
	where
		F: Fn(Vec<Value>) + Send + Sync + 'static,
	{
		OptionValue::Callback(Arc::new(f))
	}

	pub fn as_value(&self) -> Option<&Value> {
		match self {
			OptionValue::Value(value) => Some(value),
			OptionValue::Callback(_) => None,
		}
	}

	pub fn as_callback(&self) -> Option<&Callback> {
		match self {
			OptionValue::Callback(callback) => Some(callback),
			OptionValue::Value(_) => None,
		}
	}

	/// Invoke if this is a callback; returns whether anything was called
	pub fn call(&self, args: Vec<Value>) -> bool {
		match self {
			OptionValue::Callback(callback) => {
				callback(args);
				true
			}
			OptionValue::Value(_) => false,
		}
	}
}

impl From<Value> for OptionValue {
	fn from(value: Value) -> Self {
		OptionValue::Value(value)
	}
}

impl std::fmt::Debug for OptionValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OptionValue::Value(value) => write!(f, "{}", value),
			OptionValue::Callback(_) => write!(f, "<callback>"),
		}
	}
}

pub type Options = BTreeMap<String, OptionValue>;

pub fn function_id(name: &str) -> String {
	format!("{}{}", FUNCTION_ID_PREFIX, name)
}

/// Placeholder substituted for a callback on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
	pub function_id: String,
}

impl FunctionRef {
	pub fn to_value(&self) -> Value {
		json!({ FUNCTION_MARKER: true, FUNCTION_ID_FIELD: self.function_id })
	}

	pub fn from_value(value: &Value) -> Option<Self> {
		let object = value.as_object()?;
		if object.get(FUNCTION_MARKER)?.as_bool() != Some(true) {
			return None;
		}
		let function_id = object.get(FUNCTION_ID_FIELD)?.as_str()?;
		Some(Self { function_id: function_id.to_string() })
	}
}

/// Client side: remembers serialized callbacks so invocations can be dispatched
#[derive(Default)]
pub struct CallbackRegistry {
	functions: Mutex<HashMap<String, Callback>>,
}

impl CallbackRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Wire form of `options`; a later callback under the same name replaces the earlier one
	pub fn serialize_options(&self, options: &Options) -> Map<String, Value> {
		let mut functions = self.lock();

		options
			.iter()
			.map(|(name, value)| {
				let wire = match value {
					OptionValue::Value(value) => value.clone(),
					OptionValue::Callback(callback) => {
						let reference = FunctionRef { function_id: function_id(name) };
						functions.insert(reference.function_id.clone(), callback.clone());
						reference.to_value()
					}
				};
				(name.clone(), wire)
			})
			.collect()
	}

	/// Run the callback registered under `function_id`; unknown ids are ignored
	pub fn dispatch(&self, function_id: &str, args: Vec<Value>) -> bool {
		let callback = self.lock().get(function_id).cloned();
		match callback {
			Some(callback) => {
				callback(args);
				true
			}
			None => {
				ui::debug(&format!("Ignoring invocation of unknown callback {}", function_id));
				false
			}
		}
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<String, Callback>> {
		self.functions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

/// Host side: markers become proxies that post fire-and-forget invoke messages
pub fn deserialize_options(options: Map<String, Value>, outbox: &Outbox) -> Options {
	options
		.into_iter()
		.map(|(name, value)| {
			let live = match FunctionRef::from_value(&value) {
				Some(reference) => proxy(reference.function_id, outbox.clone()),
				None => OptionValue::Value(value),
			};
			(name, live)
		})
		.collect()
}

fn proxy(function_id: String, outbox: Outbox) -> OptionValue {
	OptionValue::callback(move |args| {
		let message = WorkerMessage::InvokeCallback {
			function_id: function_id.clone(),
			args,
		};
		if let Err(e) = outbox.post(message) {
			ui::debug(&format!("Callback {} not delivered: {}", function_id, e));
		}
	})
}

//! Caller side of the worker channel

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::oneshot;

use super::bridge::{CallbackRegistry, Options};
use super::{CorrelationId, Inbox, MessagePort, Outbox, PipelineRequest, Reply, WorkerMessage};
use crate::error::{Error, Result};
use crate::ui;

/// Where an outstanding call is in its exchange with the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
	/// Handshake sent; settles on the first non-error reply
	AwaitingInit,
	/// Execution request sent; the host has not confirmed the pipeline yet
	AwaitingReady,
	/// Pipeline confirmed; settles on the result or error
	Executing,
}

struct PendingCall {
	phase: Phase,
	reply: oneshot::Sender<Result<Value>>,
}

struct ClientState {
	outbox: Outbox,
	pending: Mutex<HashMap<CorrelationId, PendingCall>>,
	callbacks: CallbackRegistry,
	next_id: AtomicU64,
	closed: AtomicBool,
}

impl ClientState {
	async fn request(&self, id: CorrelationId, phase: Phase, request: PipelineRequest) -> Result<Value> {
		let (reply, settled) = oneshot::channel();

		{
			let mut pending = self.lock();
			if self.closed.load(Ordering::Acquire) {
				return Err(Error::ChannelClosed);
			}
			if pending.contains_key(&id) {
				return Err(Error::Protocol(format!("call {} is already outstanding", id)));
			}
			pending.insert(id, PendingCall { phase, reply });
		}

		if let Err(e) = self.outbox.post(WorkerMessage::Request(request)) {
			self.lock().remove(&id);
			return Err(e);
		}

		settled.await.map_err(|_| Error::ChannelClosed)?
	}

	fn handle(&self, message: WorkerMessage) {
		if let WorkerMessage::InvokeCallback { function_id, args } = message {
			self.callbacks.dispatch(&function_id, args);
			return;
		}

		let Some((id, reply)) = message.into_reply() else {
			ui::debug("Client ignored an inbound request");
			return;
		};

		let mut pending = self.lock();
		let Some(call) = pending.get_mut(&id) else {
			ui::debug(&format!("No pending call for reply {}", id));
			return;
		};

		let outcome = match (call.phase, reply) {
			(_, Reply::Failed(message)) => Err(Error::RemoteExecution(message)),
			(Phase::AwaitingInit, _) => Ok(Value::Null),
			(Phase::AwaitingReady, Reply::Ready) => {
				call.phase = Phase::Executing;
				return;
			}
			(Phase::Executing, Reply::Ready) => {
				ui::debug(&format!("Duplicate ready for {}", id));
				return;
			}
			(_, Reply::Output(value)) => Ok(value),
		};

		if let Some(call) = pending.remove(&id) {
			// The caller may have stopped waiting
			let _ = call.reply.send(outcome);
		}
	}

	fn close(&self) {
		self.closed.store(true, Ordering::Release);
		let drained: Vec<PendingCall> = self.lock().drain().map(|(_, call)| call).collect();
		for call in drained {
			let _ = call.reply.send(Err(Error::ChannelClosed));
		}
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, PendingCall>> {
		self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

/// Issues pipeline calls to a worker host over one channel
pub struct WorkerClient {
	state: Arc<ClientState>,
}

impl WorkerClient {
	/// Start listening on `port`; must be called inside a tokio runtime
	pub fn connect(port: MessagePort) -> Self {
		let (outbox, inbox) = port.into_parts();

		let state = Arc::new(ClientState {
			outbox,
			pending: Mutex::new(HashMap::new()),
			callbacks: CallbackRegistry::new(),
			next_id: AtomicU64::new(0),
			closed: AtomicBool::new(false),
		});

		tokio::spawn(listen(Arc::downgrade(&state), inbox));
		Self { state }
	}

	/// Handshake: ask the host to build (or reuse) a pipeline
	pub async fn pipeline(&self, task: &str, model_id: &str, options: Options) -> Result<RemotePipeline> {
		let options = self.state.callbacks.serialize_options(&options);

		let request = PipelineRequest {
			id: CorrelationId::Init,
			data: None,
			task: task.to_string(),
			model_id: model_id.to_string(),
			options: options.clone(),
			pipe_options: None,
		};

		self.state
			.request(CorrelationId::Init, Phase::AwaitingInit, request)
			.await?;
		ui::debug(&format!("Pipeline ready: {} ({})", task, model_id));

		Ok(RemotePipeline {
			state: self.state.clone(),
			task: task.to_string(),
			model_id: model_id.to_string(),
			options,
		})
	}

	pub fn pending_calls(&self) -> usize {
		self.state.lock().len()
	}
}

/// Callable handle to an initialized pipeline on the host
#[derive(Clone)]
pub struct RemotePipeline {
	state: Arc<ClientState>,
	task: String,
	model_id: String,
	options: Map<String, Value>,
}

impl RemotePipeline {
	/// Run the pipeline on `data`; concurrent calls settle independently
	pub async fn call(&self, data: Value, pipe_options: Options) -> Result<Value> {
		let id = CorrelationId::Call(self.state.next_id.fetch_add(1, Ordering::Relaxed));
		let pipe_options = self.state.callbacks.serialize_options(&pipe_options);

		let request = PipelineRequest {
			id,
			data: Some(data),
			task: self.task.clone(),
			model_id: self.model_id.clone(),
			options: self.options.clone(),
			pipe_options: Some(pipe_options),
		};

		self.state.request(id, Phase::AwaitingReady, request).await
	}

	pub fn task(&self) -> &str {
		&self.task
	}

	pub fn model_id(&self) -> &str {
		&self.model_id
	}
}

async fn listen(state: Weak<ClientState>, mut inbox: Inbox) {
	while let Some(message) = inbox.recv().await {
		let Some(state) = state.upgrade() else {
			return;
		};
		state.handle(message);
	}

	if let Some(state) = state.upgrade() {
		ui::debug("Worker channel closed");
		state.close();
	}
}

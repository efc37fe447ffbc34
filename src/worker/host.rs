//! Callee side of the worker channel

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::bridge::{deserialize_options, Options};
use super::{MessagePort, Outbox, PipelineRequest, WorkerMessage};
use crate::cache::PromiseCache;
use crate::error::Result;
use crate::ui;

/// A constructed task pipeline, e.g. a loaded model behind a runtime session
#[async_trait]
pub trait Pipeline: Send + Sync {
	async fn run(&self, data: Value, options: Options) -> Result<Value>;
}

/// Builds pipelines; the expensive step the host deduplicates
#[async_trait]
pub trait PipelineFactory: Send + Sync {
	async fn create(&self, task: &str, model_id: &str, options: Options) -> Result<Arc<dyn Pipeline>>;
}

pub struct WorkerHost {
	factory: Arc<dyn PipelineFactory>,
	pipelines: PromiseCache<Arc<dyn Pipeline>>,
}

impl WorkerHost {
	pub fn new(factory: Arc<dyn PipelineFactory>) -> Self {
		Self {
			factory,
			pipelines: PromiseCache::new(),
		}
	}

	/// Number of pipelines built or being built
	pub fn cached_pipelines(&self) -> usize {
		self.pipelines.len()
	}

	/// Serve `port` on a background task
	pub fn spawn(self: Arc<Self>, port: MessagePort) -> JoinHandle<()> {
		tokio::spawn(self.serve(port))
	}

	/// Handle requests until the client hangs up; each request runs on its own task
	pub async fn serve(self: Arc<Self>, port: MessagePort) {
		let (outbox, mut inbox) = port.into_parts();

		while let Some(message) = inbox.recv().await {
			match message {
				WorkerMessage::Request(request) => {
					let host = self.clone();
					let outbox = outbox.clone();
					tokio::spawn(async move { host.handle(request, outbox).await });
				}
				other => ui::debug(&format!("Host ignored {:?}", other)),
			}
		}

		ui::debug("Worker host stopped: client disconnected");
	}

	async fn handle(&self, request: PipelineRequest, outbox: Outbox) {
		let id = request.id;
		let key = pipeline_key(&request.task, &request.model_id, &request.options);

		let factory = self.factory.clone();
		let task = request.task.clone();
		let model_id = request.model_id.clone();
		let options = deserialize_options(request.options.clone(), &outbox);

		let built = self
			.pipelines
			.get_or_create(&key, move || async move { factory.create(&task, &model_id, options).await })
			.await;

		let pipeline = match built {
			Ok(pipeline) => pipeline,
			Err(e) => {
				ui::debug(&format!("Pipeline construction failed for {}: {}", id, e));
				reply(&outbox, WorkerMessage::failure(id, e.to_string()));
				return;
			}
		};

		reply(&outbox, WorkerMessage::ready(id));

		let Some(data) = request.data else {
			return;
		};

		let pipe_options = deserialize_options(request.pipe_options.unwrap_or_default(), &outbox);
		let message = match pipeline.run(data, pipe_options).await {
			Ok(result) => WorkerMessage::output(id, result),
			Err(e) => WorkerMessage::failure(id, e.to_string()),
		};
		reply(&outbox, message);
	}
}

/// Identical `(task, model_id, options)` share one pipeline
pub fn pipeline_key(task: &str, model_id: &str, options: &Map<String, Value>) -> String {
	json!({ "task": task, "model_id": model_id, "options": options }).to_string()
}

fn reply(outbox: &Outbox, message: WorkerMessage) {
	if let Err(e) = outbox.post(message) {
		ui::debug(&format!("Reply not delivered: {}", e));
	}
}

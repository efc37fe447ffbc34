// Worker client and host over an in-process channel

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hubcache::worker::bridge::deserialize_options;
use hubcache::worker::{
	message_channel, CallbackRegistry, CorrelationId, OptionValue, Options, Pipeline,
	PipelineFactory, WorkerClient, WorkerHost, WorkerMessage,
};
use hubcache::{Error, Result};

/// Answers every input with a fixed label; reports progress when asked
struct Sentiment;

#[async_trait]
impl Pipeline for Sentiment {
	async fn run(&self, data: Value, options: Options) -> Result<Value> {
		if data == json!("explode") {
			return Err(Error::RemoteExecution("boom".into()));
		}
		if let Some(report) = options.get("callback_function") {
			report.call(vec![json!({"status": "running"})]);
		}
		if let Some(delay) = data.get("delay_ms").and_then(Value::as_u64) {
			tokio::time::sleep(Duration::from_millis(delay)).await;
			return Ok(data);
		}
		Ok(json!([{"label": "POSITIVE", "score": 0.99}]))
	}
}

#[derive(Default)]
struct Factory {
	built: AtomicUsize,
	fail_first: bool,
}

#[async_trait]
impl PipelineFactory for Factory {
	async fn create(&self, task: &str, _model_id: &str, options: Options) -> Result<Arc<dyn Pipeline>> {
		let attempt = self.built.fetch_add(1, Ordering::SeqCst);
		tokio::time::sleep(Duration::from_millis(20)).await;

		if self.fail_first && attempt == 0 {
			return Err(Error::NotFound("onnx/model.onnx".into()));
		}
		if task != "sentiment-analysis" {
			return Err(Error::RemoteExecution(format!("Unsupported task: {}", task)));
		}
		if let Some(progress) = options.get("progress_callback") {
			progress.call(vec![json!({"status": "done", "file": "onnx/model.onnx"})]);
		}
		Ok(Arc::new(Sentiment))
	}
}

fn start(factory: Arc<Factory>) -> (Arc<WorkerHost>, WorkerClient) {
	let host = Arc::new(WorkerHost::new(factory));
	let (client_port, host_port) = message_channel();
	host.clone().spawn(host_port);
	(host, WorkerClient::connect(client_port))
}

const MODEL: &str = "Xenova/distilbert-base-uncased-finetuned-sst-2-english";

#[test]
fn callbacks_serialize_as_function_references() {
	let registry = CallbackRegistry::new();
	let mut options = Options::new();
	options.insert("onProgress".into(), OptionValue::callback(|_| {}));
	options.insert("device".into(), json!("cpu").into());

	let wire = registry.serialize_options(&options);

	assert_eq!(
		Value::Object(wire),
		json!({
			"onProgress": {"__fn": true, "functionId": "cb_onProgress"},
			"device": "cpu"
		})
	);
	assert_eq!(registry.len(), 1);
}

#[test]
fn unknown_callback_ids_are_ignored() {
	let registry = CallbackRegistry::new();
	assert!(!registry.dispatch("cb_missing", vec![json!(1)]));
}

#[tokio::test]
async fn proxy_posts_one_invocation_per_call() {
	let (host_port, mut client_port) = message_channel();
	let wire = json!({
		"onProgress": {"__fn": true, "functionId": "cb_onProgress"},
		"device": "cpu"
	});
	let Value::Object(wire) = wire else { unreachable!() };

	let options = deserialize_options(wire, &host_port.outbox());
	assert_eq!(options["device"].as_value(), Some(&json!("cpu")));
	assert!(options["onProgress"].call(vec![json!(42), json!("x")]));

	let message = client_port.recv().await.expect("invocation");
	assert_eq!(
		message,
		WorkerMessage::InvokeCallback {
			function_id: "cb_onProgress".into(),
			args: vec![json!(42), json!("x")],
		}
	);

	drop(host_port);
	assert!(client_port.recv().await.is_none());
}

#[tokio::test]
async fn pipeline_round_trip() {
	let (host, client) = start(Arc::default());

	let pipe = client.pipeline("sentiment-analysis", MODEL, Options::new()).await.unwrap();
	assert_eq!(pipe.task(), "sentiment-analysis");

	let mut pipe_options = Options::new();
	pipe_options.insert("top_k".into(), json!(1).into());
	let output = pipe.call(json!("I love transformers!"), pipe_options).await.unwrap();

	assert_eq!(output, json!([{"label": "POSITIVE", "score": 0.99}]));
	assert_eq!(host.cached_pipelines(), 1);
	assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn execution_errors_reject_with_the_message() {
	let (_host, client) = start(Arc::default());
	let pipe = client.pipeline("sentiment-analysis", MODEL, Options::new()).await.unwrap();

	let err = pipe.call(json!("explode"), Options::new()).await.unwrap_err();
	assert!(matches!(&err, Error::RemoteExecution(message) if message == "boom"));
	assert_eq!(err.to_string(), "boom");
}

#[tokio::test]
async fn construction_errors_reject_init() {
	let (_host, client) = start(Arc::default());

	let err = client.pipeline("text-to-audio", MODEL, Options::new()).await.err().expect("rejected");
	assert_eq!(err.to_string(), "Unsupported task: text-to-audio");
}

#[tokio::test]
async fn failed_construction_is_retried() {
	let factory = Arc::new(Factory { fail_first: true, ..Factory::default() });
	let (host, client) = start(factory.clone());

	assert!(client.pipeline("sentiment-analysis", MODEL, Options::new()).await.is_err());
	assert_eq!(host.cached_pipelines(), 0);

	assert!(client.pipeline("sentiment-analysis", MODEL, Options::new()).await.is_ok());
	assert_eq!(factory.built.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn calls_settle_independently_of_order() {
	let (_host, client) = start(Arc::default());
	let pipe = client.pipeline("sentiment-analysis", MODEL, Options::new()).await.unwrap();

	let slow = pipe.call(json!({"delay_ms": 60, "n": 1}), Options::new());
	let fast = pipe.call(json!({"delay_ms": 5, "n": 2}), Options::new());
	let (slow, fast) = tokio::join!(slow, fast);

	assert_eq!(slow.unwrap()["n"], json!(1));
	assert_eq!(fast.unwrap()["n"], json!(2));
}

#[tokio::test]
async fn replies_are_matched_by_id_not_arrival() {
	let (client_port, mut host_port) = message_channel();
	let client = WorkerClient::connect(client_port);

	let host = tokio::spawn(async move {
		let Some(WorkerMessage::Request(init)) = host_port.recv().await else {
			panic!("expected init request");
		};
		assert_eq!(init.id, CorrelationId::Init);
		assert!(init.data.is_none());
		host_port.post(WorkerMessage::ready(CorrelationId::Init)).unwrap();

		let mut calls = Vec::new();
		for _ in 0..2 {
			let Some(WorkerMessage::Request(call)) = host_port.recv().await else {
				panic!("expected call request");
			};
			calls.push(call);
		}

		// Answer the later call first
		for call in calls.iter().rev() {
			host_port.post(WorkerMessage::ready(call.id)).unwrap();
			let echoed = call.data.clone().unwrap_or(Value::Null);
			host_port.post(WorkerMessage::output(call.id, echoed)).unwrap();
		}
		host_port
	});

	let pipe = client.pipeline("feature-extraction", MODEL, Options::new()).await.unwrap();
	let (a, b) = tokio::join!(
		pipe.call(json!("first"), Options::new()),
		pipe.call(json!("second"), Options::new()),
	);

	assert_eq!(a.unwrap(), json!("first"));
	assert_eq!(b.unwrap(), json!("second"));
	drop(host.await.unwrap());
}

#[tokio::test]
async fn error_reply_rejects_before_ready() {
	let (client_port, mut host_port) = message_channel();
	let client = WorkerClient::connect(client_port);

	let host = tokio::spawn(async move {
		let Some(WorkerMessage::Request(init)) = host_port.recv().await else {
			panic!("expected init request");
		};
		// An unknown callback invocation must not disturb anything
		host_port
			.post(WorkerMessage::InvokeCallback { function_id: "cb_missing".into(), args: vec![] })
			.unwrap();
		host_port.post(WorkerMessage::ready(init.id)).unwrap();

		let Some(WorkerMessage::Request(call)) = host_port.recv().await else {
			panic!("expected call request");
		};
		host_port.post(WorkerMessage::failure(call.id, "boom")).unwrap();
		host_port
	});

	let pipe = client.pipeline("sentiment-analysis", MODEL, Options::new()).await.unwrap();
	let err = pipe.call(json!("text"), Options::new()).await.unwrap_err();
	assert_eq!(err.to_string(), "boom");
	drop(host.await.unwrap());
}

#[tokio::test]
async fn callbacks_fire_across_the_channel() {
	let (_host, client) = start(Arc::default());

	let progress: Arc<Mutex<Vec<Value>>> = Arc::default();
	let sink = progress.clone();
	let mut options = Options::new();
	options.insert(
		"progress_callback".into(),
		OptionValue::callback(move |args| sink.lock().unwrap().extend(args)),
	);
	let pipe = client.pipeline("sentiment-analysis", MODEL, options).await.unwrap();

	let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
	let sink = seen.clone();
	let mut pipe_options = Options::new();
	pipe_options.insert(
		"callback_function".into(),
		OptionValue::callback(move |args| sink.lock().unwrap().extend(args)),
	);
	pipe.call(json!("great"), pipe_options).await.unwrap();

	// Invocations are posted before the reply that settles the call
	assert_eq!(
		*progress.lock().unwrap(),
		vec![json!({"status": "done", "file": "onnx/model.onnx"})]
	);
	assert_eq!(*seen.lock().unwrap(), vec![json!({"status": "running"})]);
}

#[tokio::test]
async fn clients_share_pipelines_on_one_host() {
	let factory = Arc::new(Factory::default());
	let host = Arc::new(WorkerHost::new(factory.clone()));

	let (a_port, a_host) = message_channel();
	let (b_port, b_host) = message_channel();
	host.clone().spawn(a_host);
	host.clone().spawn(b_host);
	let a = WorkerClient::connect(a_port);
	let b = WorkerClient::connect(b_port);

	let (pa, pb) = tokio::join!(
		a.pipeline("sentiment-analysis", MODEL, Options::new()),
		b.pipeline("sentiment-analysis", MODEL, Options::new()),
	);
	assert!(pa.is_ok() && pb.is_ok());
	assert_eq!(factory.built.load(Ordering::SeqCst), 1);
	assert_eq!(host.cached_pipelines(), 1);

	let mut other = Options::new();
	other.insert("quantized".into(), json!(false).into());
	a.pipeline("sentiment-analysis", MODEL, other).await.unwrap();
	assert_eq!(factory.built.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn hangup_rejects_pending_calls() {
	let (client_port, mut host_port) = message_channel();
	let client = WorkerClient::connect(client_port);

	let host = tokio::spawn(async move {
		let Some(WorkerMessage::Request(init)) = host_port.recv().await else {
			panic!("expected init request");
		};
		host_port.post(WorkerMessage::ready(init.id)).unwrap();
		// Receive the call, then hang up without answering
		host_port.recv().await;
	});

	let pipe = client.pipeline("sentiment-analysis", MODEL, Options::new()).await.unwrap();
	let err = pipe.call(json!("text"), Options::new()).await.unwrap_err();
	assert!(matches!(err, Error::ChannelClosed));
	host.await.unwrap();

	let again = pipe.call(json!("text"), Options::new()).await.unwrap_err();
	assert!(matches!(again, Error::ChannelClosed));
}

#[tokio::test]
async fn concurrent_init_on_one_channel_is_a_protocol_error() {
	let (client_port, mut host_port) = message_channel();
	let client = WorkerClient::connect(client_port);

	let host = tokio::spawn(async move {
		let Some(WorkerMessage::Request(init)) = host_port.recv().await else {
			panic!("expected init request");
		};
		tokio::time::sleep(Duration::from_millis(20)).await;
		host_port.post(WorkerMessage::ready(init.id)).unwrap();
		host_port
	});

	let (first, second) = tokio::join!(
		client.pipeline("sentiment-analysis", MODEL, Options::new()),
		client.pipeline("sentiment-analysis", MODEL, Options::new()),
	);

	assert!(first.is_ok());
	assert!(matches!(second.err(), Some(Error::Protocol(_))));
	drop(host.await.unwrap());
}

// File tier tests against a temporary directory

mod common;

use futures::StreamExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use hubcache::cache::{Cache, FileCache, ProgressInfo};
use hubcache::core::Response;
use hubcache::Error;

use common::{chunked, stalled};

const CONFIG_URL: &str = "https://huggingface.co/org/bert/resolve/main/config.json";

fn setup() -> (TempDir, FileCache) {
	let dir = TempDir::new().unwrap();
	let cache = FileCache::new(dir.path());
	(dir, cache)
}

#[tokio::test]
async fn put_then_lookup_returns_identical_bytes() {
	let (_dir, cache) = setup();
	let body = br#"{"model_type":"bert","hidden_size":768}"#.to_vec();

	cache.put(CONFIG_URL, Response::from_bytes(body.clone()), None).await.unwrap();

	let entry = cache.entry(CONFIG_URL).unwrap();
	assert!(entry.exists());
	assert_eq!(entry.status(), 200);
	assert_eq!(entry.content_length(), Some(body.len() as u64));
	assert_eq!(entry.content_type(), Some("application/json"));
	assert!(entry.path().ends_with("huggingface.co/org/bert/resolve/main/config.json"));

	let hit = cache.lookup(CONFIG_URL).await.unwrap().expect("cached");
	assert_eq!(hit.status(), 200);
	assert_eq!(hit.bytes().await.unwrap().as_ref(), body.as_slice());
}

#[tokio::test]
async fn missing_key_is_a_miss() {
	let (_dir, cache) = setup();

	assert!(cache.lookup(CONFIG_URL).await.unwrap().is_none());

	let entry = cache.entry(CONFIG_URL).unwrap();
	assert!(!entry.exists());
	assert_eq!(entry.status(), 404);
	assert!(matches!(entry.bytes().await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn relative_keys_create_nested_directories() {
	let (dir, cache) = setup();

	cache
		.put("org/model/onnx/model_quantized.onnx", Response::from_bytes(vec![1u8, 2, 3]), None)
		.await
		.unwrap();

	let path = dir.path().join("org/model/onnx/model_quantized.onnx");
	assert_eq!(std::fs::read(path).unwrap(), vec![1u8, 2, 3]);

	let entry = cache.entry("org/model/onnx/model_quantized.onnx").unwrap();
	assert_eq!(entry.content_type(), Some("application/octet-stream"));
}

#[tokio::test]
async fn invalid_keys_are_rejected() {
	let (_dir, cache) = setup();

	let result = cache.put("../outside.bin", Response::from_bytes(vec![0u8]), None).await;
	assert!(matches!(result, Err(Error::InvalidKey(_))));
	assert!(matches!(cache.lookup("").await, Err(Error::InvalidKey(_))));
}

#[tokio::test]
async fn progress_is_reported_per_chunk() {
	let (_dir, cache) = setup();
	let seen: Arc<Mutex<Vec<ProgressInfo>>> = Arc::default();
	let sink = seen.clone();
	let report = move |info: ProgressInfo| sink.lock().unwrap().push(info);

	let response = chunked(vec![Ok(b"abc".to_vec()), Ok(b"defgh".to_vec())], Some(8));
	cache.put("org/m/vocab.txt", response, Some(&report)).await.unwrap();

	let seen = seen.lock().unwrap();
	assert_eq!(seen.len(), 2);
	assert_eq!(seen[0], ProgressInfo { progress: 37.5, loaded: 3, total: 8 });
	assert_eq!(seen[1], ProgressInfo { progress: 100.0, loaded: 8, total: 8 });
}

#[tokio::test]
async fn unknown_length_reports_zero_progress() {
	let (_dir, cache) = setup();
	let seen: Arc<Mutex<Vec<ProgressInfo>>> = Arc::default();
	let sink = seen.clone();
	let report = move |info: ProgressInfo| sink.lock().unwrap().push(info);

	let response = chunked(vec![Ok(vec![7u8; 10]), Ok(vec![7u8; 6])], None);
	cache.put("org/m/blob.bin", response, Some(&report)).await.unwrap();

	let seen = seen.lock().unwrap();
	assert_eq!(seen.last().map(|info| info.loaded), Some(16));
	assert!(seen.iter().all(|info| info.progress == 0.0 && info.total == 0));
}

#[tokio::test]
async fn failed_stream_leaves_no_partial_file() {
	let (dir, cache) = setup();

	let response = chunked(
		vec![
			Ok(vec![1u8; 1024]),
			Err(Error::TransientNetwork("connection reset".into())),
		],
		Some(4096),
	);
	let result = cache.put("org/m/model.onnx", response, None).await;

	assert!(matches!(result, Err(Error::TransientNetwork(_))));
	assert!(!dir.path().join("org/m/model.onnx").exists());
	assert_eq!(entries_in(&dir.path().join("org/m")), Vec::<String>::new());
	assert!(cache.lookup("org/m/model.onnx").await.unwrap().is_none());
}

fn entries_in(dir: &Path) -> Vec<String> {
	std::fs::read_dir(dir)
		.map(|entries| {
			entries
				.filter_map(|e| e.ok())
				.map(|e| e.file_name().to_string_lossy().into_owned())
				.collect()
		})
		.unwrap_or_default()
}

#[tokio::test]
async fn download_in_progress_is_not_visible() {
	let (dir, cache) = setup();
	let writer = cache.clone();

	let put = tokio::spawn(async move {
		writer.put("org/m/model.onnx", stalled(vec![9u8; 1024], 2048), None).await
	});
	tokio::time::sleep(Duration::from_millis(100)).await;

	assert!(cache.lookup("org/m/model.onnx").await.unwrap().is_none());
	assert!(!cache.entry("org/m/model.onnx").unwrap().exists());
	assert!(!dir.path().join("org/m/model.onnx").exists());

	put.abort();
	let _ = put.await;
}

#[tokio::test]
async fn abandoned_put_leaves_nothing_behind() {
	let (dir, cache) = setup();
	let writer = cache.clone();

	let put = tokio::spawn(async move {
		writer.put("org/m/model.onnx", stalled(vec![9u8; 1024], 2048), None).await
	});
	tokio::time::sleep(Duration::from_millis(100)).await;
	put.abort();
	assert!(put.await.unwrap_err().is_cancelled());

	assert!(cache.lookup("org/m/model.onnx").await.unwrap().is_none());
	assert_eq!(entries_in(&dir.path().join("org/m")), Vec::<String>::new());
}

#[tokio::test]
async fn timed_out_put_keeps_the_previous_file() {
	let (_dir, cache) = setup();
	cache.put("org/m/config.json", Response::from_bytes(b"{}".to_vec()), None).await.unwrap();

	let slow = cache.put("org/m/config.json", stalled(b"{\"partial".to_vec(), 64), None);
	assert!(tokio::time::timeout(Duration::from_millis(50), slow).await.is_err());

	let hit = cache.lookup("org/m/config.json").await.unwrap().expect("cached");
	assert_eq!(hit.text().await.unwrap(), "{}");
}

#[tokio::test]
async fn dropping_a_body_midway_keeps_the_entry_readable() {
	let (_dir, cache) = setup();
	let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

	cache
		.put("org/m/weights.bin", Response::from_bytes(content.clone()), None)
		.await
		.unwrap();

	let partial = cache.lookup("org/m/weights.bin").await.unwrap().expect("cached");
	let mut body = partial.into_body();
	let first = body.next().await.expect("chunk").unwrap();
	assert!(!first.is_empty());
	assert!(first.len() < content.len());
	drop(body);

	let again = cache.lookup("org/m/weights.bin").await.unwrap().expect("cached");
	assert_eq!(again.bytes().await.unwrap().as_ref(), content.as_slice());
}

#[tokio::test]
async fn put_overwrites_previous_content() {
	let (_dir, cache) = setup();

	cache.put("org/m/a.txt", Response::from_bytes(b"old contents".to_vec()), None).await.unwrap();
	cache.put("org/m/a.txt", Response::from_bytes(b"new".to_vec()), None).await.unwrap();

	let hit = cache.lookup("org/m/a.txt").await.unwrap().expect("cached");
	assert_eq!(hit.text().await.unwrap(), "new");
}

#[tokio::test]
async fn remove_reports_whether_anything_was_deleted() {
	let (_dir, cache) = setup();

	cache.put("org/m/a.txt", Response::from_bytes(b"x".to_vec()), None).await.unwrap();
	assert!(cache.remove("org/m/a.txt").await.unwrap());
	assert!(!cache.remove("org/m/a.txt").await.unwrap());
}

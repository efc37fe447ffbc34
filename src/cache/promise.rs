//! Request deduplication by key
//!
//! The first caller for a key runs the factory; everyone else awaits the same
//! shared future. Failures are evicted so the next caller retries, successes
//! stay memoized for the lifetime of the cache.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use crate::error::Error;

type SharedResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

pub struct PromiseCache<T, E = Error> {
	entries: Mutex<HashMap<String, SharedResult<T, E>>>,
}

impl<T, E> Default for PromiseCache<T, E> {
	fn default() -> Self {
		Self {
			entries: Mutex::new(HashMap::new()),
		}
	}
}

impl<T, E> PromiseCache<T, E>
where
	T: Clone + Send + Sync + 'static,
	E: Clone + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the live future for `key`, invoking `factory` only when none exists.
	///
	/// The entry is inserted before anything is awaited, so concurrent callers
	/// always observe it. A rejected entry is removed, a fulfilled one is kept.
	pub async fn get_or_create<F, Fut>(&self, key: &str, factory: F) -> Result<T, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
	{
		let entry = {
			let mut entries = self.lock();
			match entries.get(key) {
				Some(existing) => existing.clone(),
				None => {
					let created = factory().boxed().shared();
					entries.insert(key.to_string(), created.clone());
					created
				}
			}
		};

		let outcome = entry.clone().await;
		if outcome.is_err() {
			self.evict(key, &entry);
		}
		outcome
	}

	pub fn contains(&self, key: &str) -> bool {
		self.lock().contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	/// Forget one key; in-flight work keeps running for callers already waiting
	pub fn remove(&self, key: &str) -> bool {
		self.lock().remove(key).is_some()
	}

	pub fn clear(&self) {
		self.lock().clear();
	}

	// Only drop the entry we awaited; a retry may already have replaced it.
	fn evict(&self, key: &str, settled: &SharedResult<T, E>) {
		let mut entries = self.lock();
		if entries.get(key).is_some_and(|current| current.ptr_eq(settled)) {
			entries.remove(key);
			crate::ui::debug(&format!("Evicted failed entry: {}", key));
		}
	}

	fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedResult<T, E>>> {
		self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreError, StoreFuture, StoredParameter},
};

type ParameterMap = Arc<RwLock<HashMap<String, StoredParameter>>>;

/// Storage backend that keeps parameters in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(ParameterMap);
impl MemoryStore {
	/// Builds a store pre-populated with secure parameters (credentials, usually).
	pub fn with_secure<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let map = entries
			.into_iter()
			.map(|(key, value)| (key.into(), StoredParameter { value: value.into(), secure: true }))
			.collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Returns a copy of the raw parameter, including its secure flag.
	pub fn parameter(&self, key: &str) -> Option<StoredParameter> {
		self.0.read().get(key).cloned()
	}

	/// Number of stored parameters.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn get_now(map: ParameterMap, key: &str, decrypt: bool) -> Result<String, StoreError> {
		let guard = map.read();

		guard
			.get(key)
			.ok_or_else(|| StoreError::NotFound { key: key.to_owned() })
			.and_then(|parameter| parameter.read(key, decrypt))
	}

	fn put_now(map: ParameterMap, key: &str, value: &str, secure: bool) {
		map.write().insert(key.to_owned(), StoredParameter { value: value.to_owned(), secure });
	}
}
impl CredentialStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str, decrypt: bool) -> StoreFuture<'a, String> {
		let map = self.0.clone();

		Box::pin(async move { Self::get_now(map, key, decrypt) })
	}

	fn put<'a>(&'a self, key: &'a str, value: &'a str, secure: bool) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::put_now(map, key, value, secure);

			Ok(())
		})
	}
}

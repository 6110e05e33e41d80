//! Credential store contract, parameter key layout, and bundled store backends.
//!
//! The relay never owns durable state: client credentials and the current access token live in
//! an external key/value store. [`CredentialStore`] is the narrow contract the relay needs, and
//! [`ParameterKeys`] fixes the key layout under a configurable prefix. The free helpers in this
//! module translate between raw parameters and the typed [`ClientCredentials`] /
//! [`TokenRecord`] models.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use time::{UtcOffset, format_description::well_known::Rfc3339};
// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, ClientId, TokenRecord, TokenState},
	error::ConfigError,
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key/value parameter store holding credentials and the current token.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the value stored under `key`.
	///
	/// Secure values must be read with `decrypt` set; missing keys fail with
	/// [`StoreError::NotFound`].
	fn get<'a>(&'a self, key: &'a str, decrypt: bool) -> StoreFuture<'a, String>;

	/// Inserts or overwrites the value stored under `key`.
	fn put<'a>(&'a self, key: &'a str, value: &'a str, secure: bool) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// No parameter is stored under the key.
	#[error("Parameter `{key}` does not exist.")]
	NotFound {
		/// Key that was looked up.
		key: String,
	},
	/// A secure parameter was read without decryption.
	#[error("Parameter `{key}` is secure and must be read with decryption.")]
	Encrypted {
		/// Key that was looked up.
		key: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// A stored value together with its secure flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredParameter {
	/// Raw parameter value.
	pub value: String,
	/// Whether the value is stored as a secure (encrypted) parameter.
	pub secure: bool,
}
impl StoredParameter {
	/// Returns the value if the read is allowed for the requested decryption mode.
	pub(crate) fn read(&self, key: &str, decrypt: bool) -> Result<String, StoreError> {
		if self.secure && !decrypt {
			return Err(StoreError::Encrypted { key: key.to_owned() });
		}

		Ok(self.value.clone())
	}
}

/// Concrete key names for every parameter the relay reads or writes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterKeys {
	/// Secure client identifier.
	pub client_id: String,
	/// Secure client secret.
	pub client_secret: String,
	/// Secure current access token.
	pub access_token: String,
	/// Plain RFC 3339 expiration instant of the current access token.
	pub expires_at: String,
}
impl ParameterKeys {
	/// Prefix used when none is configured.
	pub const DEFAULT_PREFIX: &'static str = "/spotify";

	/// Derives the key layout under `prefix` (for example `/spotify/access_token`).
	pub fn with_prefix(prefix: &str) -> Self {
		let prefix = prefix.trim_end_matches('/');

		Self {
			client_id: format!("{prefix}/client_id"),
			client_secret: format!("{prefix}/client_secret"),
			access_token: format!("{prefix}/access_token"),
			expires_at: format!("{prefix}/expires_at"),
		}
	}
}
impl Default for ParameterKeys {
	fn default() -> Self {
		Self::with_prefix(Self::DEFAULT_PREFIX)
	}
}

/// Reads the client credential pair.
pub async fn read_credentials(
	store: &dyn CredentialStore,
	keys: &ParameterKeys,
) -> Result<ClientCredentials> {
	let client_id = store.get(&keys.client_id, true).await?;
	let client_secret = store.get(&keys.client_secret, true).await?;
	let client_id = ClientId::new(&client_id).map_err(|e| StoreError::Serialization {
		message: format!("Stored `{}` is not a valid client id: {e}", keys.client_id),
	})?;

	Ok(ClientCredentials::new(client_id, client_secret))
}

/// Reads the cached token and classifies it against `now`.
///
/// A missing token, a missing expiration, or an unparseable expiration all read as
/// [`TokenState::Absent`].
pub async fn read_token_state(
	store: &dyn CredentialStore,
	keys: &ParameterKeys,
	now: OffsetDateTime,
) -> Result<TokenState> {
	let Some(access_token) = optional(store.get(&keys.access_token, true).await)? else {
		return Ok(TokenState::Absent);
	};
	let Some(raw_expiry) = optional(store.get(&keys.expires_at, false).await)? else {
		return Ok(TokenState::Absent);
	};
	let Ok(expires_at) = OffsetDateTime::parse(raw_expiry.trim(), &Rfc3339) else {
		#[cfg(feature = "tracing")]
		tracing::warn!(key = %keys.expires_at, "Stored token expiration is not RFC 3339.");

		return Ok(TokenState::Absent);
	};
	let record = TokenRecord::builder()
		.access_token(access_token)
		.expires_at(expires_at)
		.build()
		.map_err(ConfigError::from)?;

	Ok(TokenState::classify(Some(record), now))
}

/// Persists the token first and its expiration second.
///
/// A crash between both writes leaves the new token paired with the previous expiration, which
/// at worst forces one extra refresh.
pub async fn write_token(
	store: &dyn CredentialStore,
	keys: &ParameterKeys,
	record: &TokenRecord,
) -> Result<()> {
	let expires_at =
		record.expires_at.to_offset(UtcOffset::UTC).format(&Rfc3339).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to format token expiration: {e}") }
		})?;

	store.put(&keys.access_token, record.access_token.expose(), true).await?;
	store.put(&keys.expires_at, &expires_at, false).await?;

	Ok(())
}

fn optional(result: Result<String, StoreError>) -> Result<Option<String>, StoreError> {
	match result {
		Ok(value) => Ok(Some(value)),
		Err(StoreError::NotFound { .. }) => Ok(None),
		Err(e) => Err(e),
	}
}

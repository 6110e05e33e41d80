//! Relay-level error types shared across the store, issuer, refresh, and proxy layers.

// self
use crate::{_prelude::*, store::StoreError};

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure other than a missing key.
	#[error("{0}")]
	Storage(#[source] StoreError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// A credential or token parameter is missing from the store.
	#[error("Parameter `{key}` was not found.")]
	NotFound {
		/// Store key that was looked up.
		key: String,
	},
	/// Token endpoint rejected the client credentials.
	#[error("Token endpoint rejected the credentials with status {status}: {body}")]
	UpstreamAuth {
		/// HTTP status returned by the token endpoint.
		status: u16,
		/// Response body returned alongside the status.
		body: String,
	},
	/// Outbound call exceeded the configured timeout.
	#[error("Request to the {target} timed out.")]
	UpstreamTimeout {
		/// Which upstream timed out.
		target: &'static str,
	},
	/// Catalog API answered with a non-success status.
	#[error("Catalog API returned status {status}: {body}")]
	UpstreamStatus {
		/// HTTP status returned by the catalog API.
		status: u16,
		/// Response body returned alongside the status.
		body: String,
	},
	/// Upstream response could not be interpreted.
	#[error("Malformed upstream response: {message}")]
	Protocol {
		/// Human-readable description of the malformed payload.
		message: String,
		/// Structured parsing failure, when available.
		#[source]
		source: Option<BoxError>,
	},
	/// Caller input is missing or invalid.
	#[error("Bad request: {reason}")]
	BadRequest {
		/// Explanation returned to the caller.
		reason: String,
	},
	/// Token issuance failed while refreshing the cached token.
	#[error("Token refresh failed: {0}")]
	RefreshFailed(#[source] Box<Error>),
}
impl Error {
	/// Builds a [`Error::Protocol`] without a structured source.
	pub fn protocol(message: impl Into<String>) -> Self {
		Self::Protocol { message: message.into(), source: None }
	}

	/// Builds a [`Error::Protocol`] that keeps the parsing failure as its source.
	pub fn protocol_with_source(
		message: impl Into<String>,
		source: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Protocol { message: message.into(), source: Some(Box::new(source)) }
	}

	/// Builds a [`Error::BadRequest`].
	pub fn bad_request(reason: impl Into<String>) -> Self {
		Self::BadRequest { reason: reason.into() }
	}

	/// Returns `true` when the failure was caused by caller input.
	pub fn is_bad_request(&self) -> bool {
		matches!(self, Self::BadRequest { .. })
	}
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::NotFound { key } => Self::NotFound { key },
			other => Self::Storage(other),
		}
	}
}

/// Configuration and validation failures raised by the relay.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Configuration field holding the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Parameter prefix is malformed.
	#[error("Parameter prefix `{prefix}` must start with `/`, not end with `/`, and contain no whitespace.")]
	InvalidParameterPrefix {
		/// Rejected prefix.
		prefix: String,
	},
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
	/// Timeout is outside the supported range.
	#[error("Timeout must be between 1 and {max} seconds, got `{value}`.")]
	InvalidTimeout {
		/// Raw value that failed validation.
		value: String,
		/// Maximum accepted number of seconds.
		max: u64,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {target}.")]
	Network {
		/// Which upstream was being called.
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		target: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { target, source: Box::new(src) }
	}
}

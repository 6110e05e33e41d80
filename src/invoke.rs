//! Operation dispatch between relay entry points.
//!
//! An [`Invoker`] runs a named relay operation with a JSON payload and answers with the
//! serialized response envelope. [`crate::handlers::Relay`] implements it in-process;
//! [`HttpInvoker`] forwards the call to a relay deployed behind `<base>/<operation>`.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::header::CONTENT_TYPE;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	http::ReqwestHttpClient,
	oauth,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const TARGET: &str = "invoke endpoint";

/// Boxed future returned by [`Invoker::invoke`].
pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + 'a + Send>>;

/// Runs a relay operation by name.
pub trait Invoker
where
	Self: Send + Sync,
{
	/// Invokes `operation` with `payload`, returning the operation's JSON envelope.
	fn invoke<'a>(&'a self, operation: &'a str, payload: Value) -> InvokeFuture<'a>;
}

/// Operations exposed by the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Authenticated catalog passthrough.
	CatalogRequest,
	/// Forced token refresh.
	TokenRefresh,
	/// Playlists of one user, routed through the catalog passthrough.
	UserPlaylists,
}
impl Operation {
	/// Every known operation.
	pub const ALL: [Operation; 3] =
		[Operation::CatalogRequest, Operation::TokenRefresh, Operation::UserPlaylists];

	/// Stable operation name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::CatalogRequest => "catalog-request",
			Operation::TokenRefresh => "token-refresh",
			Operation::UserPlaylists => "user-playlists",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Operation {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|op| op.as_str() == s)
			.ok_or_else(|| Error::bad_request(format!("Unknown operation `{s}`")))
	}
}

/// Invokes operations on a remote relay over HTTP.
///
/// The payload is POSTed as JSON to `<base>/<operation>` and the response body is decoded as
/// the JSON envelope, whatever its HTTP status.
#[derive(Clone, Debug)]
pub struct HttpInvoker {
	base: Url,
	http_client: ReqwestHttpClient,
}
impl HttpInvoker {
	/// Creates an invoker for `base` with a timeout-bound client.
	pub fn new(base: Url, timeout: StdDuration) -> Result<Self> {
		Ok(Self::with_http_client(base, ReqwestHttpClient::with_timeout(timeout)?))
	}

	/// Creates an invoker reusing an existing client.
	pub fn with_http_client(mut base: Url, http_client: ReqwestHttpClient) -> Self {
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		Self { base, http_client }
	}

	/// Endpoint that serves `operation`.
	pub fn operation_url(&self, operation: Operation) -> Result<Url> {
		self.base.join(operation.as_str()).map_err(|e| {
			Error::bad_request(format!("Operation `{operation}` does not form a valid URL: {e}"))
		})
	}

	async fn post(&self, operation: Operation, payload: &Value) -> Result<Value> {
		let body = serde_json::to_vec(payload)
			.map_err(|e| Error::protocol_with_source("Invoke payload could not be serialized", e))?;
		let response = self
			.http_client
			.post(self.operation_url(operation)?)
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.send()
			.await
			.map_err(|e| oauth::map_reqwest_error(TARGET, e))?;
		let body = response.bytes().await.map_err(|e| {
			if e.is_timeout() {
				Error::UpstreamTimeout { target: TARGET }
			} else {
				TransportError::network(TARGET, e).into()
			}
		})?;
		let mut de = serde_json::Deserializer::from_slice(&body);

		serde_path_to_error::deserialize(&mut de).map_err(|e| {
			Error::protocol(format!(
				"Invoke endpoint returned an invalid envelope at `{}`: {}",
				e.path(),
				e.inner()
			))
		})
	}
}
impl Invoker for HttpInvoker {
	fn invoke<'a>(&'a self, operation: &'a str, payload: Value) -> InvokeFuture<'a> {
		const KIND: FlowKind = FlowKind::Invoke;

		Box::pin(async move {
			let span = FlowSpan::new(KIND, "http");

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span
				.instrument(async {
					let operation = operation.parse::<Operation>()?;

					self.post(operation, &payload).await
				})
				.await;

			obs::record_result(KIND, &result);

			result
		})
	}
}

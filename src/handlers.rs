//! Serverless-style entry points and the JSON response envelope.
//!
//! [`Relay`] wires the store, issuer, refresher, and proxy together once per process and
//! exposes the three relay operations. Every entry point answers with an [`Envelope`]: status
//! 200 and the JSON result on success, status 500 and `{"error": message}` on any failure.

// self
use crate::{
	_prelude::*,
	config::RelayConfig,
	http::ReqwestHttpClient,
	invoke::{HttpInvoker, InvokeFuture, Invoker, Operation},
	oauth::ClientCredentialsIssuer,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	proxy::{self, CatalogProxy},
	refresh::TokenRefresher,
	store::CredentialStore,
};

/// Inbound event shared by the catalog and user-playlists entry points.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEvent {
	/// Path of the inbound request, relative to the relay.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub raw_path: Option<String>,
	/// Resolved catalog route; takes precedence over `raw_path`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub route: Option<String>,
	/// Inbound query parameters.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub query_string_parameters: Option<BTreeMap<String, String>>,
}
impl CatalogEvent {
	/// Event for `path` without query parameters.
	pub fn for_path(path: impl Into<String>) -> Self {
		Self { raw_path: Some(path.into()), ..Default::default() }
	}

	/// Adds one query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query_string_parameters
			.get_or_insert_with(BTreeMap::new)
			.insert(key.into(), value.into());

		self
	}

	/// Decodes an event from a raw JSON payload.
	pub fn from_value(value: Value) -> Result<Self> {
		serde_path_to_error::deserialize(value).map_err(|e| {
			Error::bad_request(format!("Invalid event at `{}`: {}", e.path(), e.inner()))
		})
	}

	/// Catalog path to forward: `route` when present, otherwise `raw_path`.
	pub fn path(&self) -> Result<&str> {
		self.route
			.as_deref()
			.or(self.raw_path.as_deref())
			.ok_or_else(|| Error::bad_request("Event carries neither `route` nor `rawPath`"))
	}
}

/// Response envelope returned by every entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
	/// HTTP status code.
	pub status_code: u16,
	/// JSON-encoded response body.
	pub body: String,
	/// Response headers.
	pub headers: BTreeMap<String, String>,
}
impl Envelope {
	/// Successful envelope carrying `body`.
	pub fn ok(body: &Value) -> Self {
		Self::new(200, body)
	}

	/// Failure envelope carrying `{"error": message}`.
	pub fn failure(error: &Error) -> Self {
		Self::new(500, &proxy::error_body(error))
	}

	fn new(status_code: u16, body: &Value) -> Self {
		Self {
			status_code,
			body: body.to_string(),
			headers: BTreeMap::from([("Content-Type".into(), "application/json".into())]),
		}
	}

	/// Wraps a handler result.
	pub fn from_result(result: Result<Value>) -> Self {
		match result {
			Ok(body) => Self::ok(&body),
			Err(e) => Self::failure(&e),
		}
	}

	/// Returns `true` for 2xx envelopes.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status_code)
	}

	/// Decodes the JSON body.
	pub fn body_json(&self) -> Result<Value> {
		serde_json::from_str(&self.body)
			.map_err(|e| Error::protocol_with_source("Envelope body is not JSON", e))
	}
}

/// Relay entry points over shared, process-wide collaborators.
#[derive(Clone)]
pub struct Relay {
	refresher: Arc<TokenRefresher>,
	proxy: CatalogProxy,
	invoker: Option<Arc<dyn Invoker>>,
}
impl Relay {
	/// Builds the relay from configuration and a credential store.
	///
	/// One HTTP client is shared by the issuer and the proxy. When
	/// [`RelayConfig::invoke_endpoint`] is set, the user-playlists operation is dispatched
	/// through an [`HttpInvoker`].
	pub fn new(config: &RelayConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(config.timeout())?;
		let issuer = ClientCredentialsIssuer::new(&config.token_endpoint, http_client.clone())?;
		let refresher =
			Arc::new(TokenRefresher::new(store, Arc::new(issuer), config.parameter_keys()));
		let proxy = CatalogProxy::new(http_client.clone(), config.api_base.clone(), refresher);
		let mut relay = Self::from_parts(proxy);

		if let Some(endpoint) = config.invoke_endpoint.as_ref() {
			relay = relay.with_invoker(Arc::new(HttpInvoker::with_http_client(
				endpoint.clone(),
				http_client,
			)));
		}

		Ok(relay)
	}

	/// Builds the relay around an existing proxy, reusing its refresher.
	pub fn from_parts(proxy: CatalogProxy) -> Self {
		Self { refresher: proxy.refresher().clone(), proxy, invoker: None }
	}

	/// Routes the user-playlists delegation through `invoker` instead of in-process.
	pub fn with_invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
		self.invoker = Some(invoker);

		self
	}

	/// Refresher shared by every entry point.
	pub fn refresher(&self) -> &Arc<TokenRefresher> {
		&self.refresher
	}

	/// Forwards the event's catalog path and query to the catalog API.
	pub async fn handle_catalog_request(&self, event: &CatalogEvent) -> Envelope {
		let result = async {
			let path = event.path()?;
			let empty = BTreeMap::new();
			let query = event.query_string_parameters.as_ref().unwrap_or(&empty);

			self.proxy.try_request(path, query).await
		}
		.await;

		Envelope::from_result(result)
	}

	/// Forces a token refresh and reports the new token.
	pub async fn handle_token_refresh(&self) -> Envelope {
		let now = OffsetDateTime::now_utc();
		let result = self.refresher.refresh_at(now).await.map(|record| {
			let expires_in = record.remaining_at(now).whole_seconds();

			serde_json::json!({
				"message": "Token refreshed.",
				"access_token": record.access_token.into_exposed(),
				"expires_in": expires_in,
			})
		});

		Envelope::from_result(result)
	}

	/// Resolves `/users/{userId}/playlists` and delegates to the catalog operation.
	pub async fn handle_user_playlists(&self, mut event: CatalogEvent) -> Envelope {
		let route = match proxy::user_playlists_path(event.query_string_parameters.as_ref()) {
			Ok(route) => route,
			Err(e) => return Envelope::failure(&e),
		};

		#[cfg(feature = "tracing")]
		tracing::info!(route = %route, "Resolved user playlists route.");

		event.route = Some(route);

		match self.invoker.as_ref() {
			Some(invoker) => Self::delegate(invoker.as_ref(), &event)
				.await
				.unwrap_or_else(|e| Envelope::failure(&e)),
			None => self.handle_catalog_request(&event).await,
		}
	}

	async fn delegate(invoker: &dyn Invoker, event: &CatalogEvent) -> Result<Envelope> {
		let payload = serde_json::to_value(event)
			.map_err(|e| Error::protocol_with_source("Event could not be serialized", e))?;
		let response = invoker.invoke(Operation::CatalogRequest.as_str(), payload).await?;

		serde_path_to_error::deserialize(response).map_err(|e| {
			Error::protocol(format!(
				"Invoker returned an invalid envelope at `{}`: {}",
				e.path(),
				e.inner()
			))
		})
	}

	async fn dispatch(&self, operation: &str, payload: Value) -> Result<Envelope> {
		let envelope = match operation.parse::<Operation>()? {
			Operation::CatalogRequest =>
				self.handle_catalog_request(&CatalogEvent::from_value(payload)?).await,
			Operation::TokenRefresh => self.handle_token_refresh().await,
			Operation::UserPlaylists =>
				self.handle_user_playlists(CatalogEvent::from_value(payload)?).await,
		};

		Ok(envelope)
	}
}
impl Invoker for Relay {
	fn invoke<'a>(&'a self, operation: &'a str, payload: Value) -> InvokeFuture<'a> {
		const KIND: FlowKind = FlowKind::Invoke;

		Box::pin(async move {
			let span = FlowSpan::new(KIND, "in_process");

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span.instrument(self.dispatch(operation, payload)).await;

			obs::record_result(KIND, &result);

			result.and_then(|envelope| {
				serde_json::to_value(envelope)
					.map_err(|e| Error::protocol_with_source("Envelope could not be serialized", e))
			})
		})
	}
}
impl Debug for Relay {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Relay")
			.field("refresher", &self.refresher)
			.field("proxy", &self.proxy)
			.field("remote_invoker", &self.invoker.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn relay() -> Relay {
		let refresher = Arc::new(static_refresher(seeded_store(), "abc123", 3600));

		Relay::from_parts(CatalogProxy::new(
			ReqwestHttpClient::default(),
			Url::parse("https://api.example.com/v1").expect("Failed to parse API base."),
			refresher,
		))
	}

	#[test]
	fn route_takes_precedence_over_raw_path() {
		let mut event = CatalogEvent::for_path("/users/me");

		assert_eq!(event.path().ok(), Some("/users/me"));

		event.route = Some("/users/smedjan/playlists".into());

		assert_eq!(event.path().ok(), Some("/users/smedjan/playlists"));
		assert!(CatalogEvent::default().path().expect_err("No path.").is_bad_request());
	}

	#[test]
	fn events_decode_from_camel_case_json() {
		let event = CatalogEvent::from_value(serde_json::json!({
			"rawPath": "/search",
			"queryStringParameters": { "q": "a b" }
		}))
		.expect("Event should decode.");

		assert_eq!(event, CatalogEvent::for_path("/search").with_query("q", "a b"));

		let err = CatalogEvent::from_value(serde_json::json!({ "rawPath": 7 }))
			.expect_err("Numeric path should fail.");

		assert!(err.to_string().contains("rawPath"));
	}

	#[test]
	fn failure_envelope_has_error_body_and_json_header() {
		let envelope = Envelope::failure(&Error::bad_request("Missing userId"));

		assert_eq!(envelope.status_code, 500);
		assert!(!envelope.is_success());
		assert_eq!(envelope.headers.get("Content-Type").map(String::as_str), Some("application/json"));
		assert_eq!(
			envelope.body_json().expect("Body should be JSON."),
			serde_json::json!({ "error": "Bad request: Missing userId" })
		);
	}

	#[tokio::test]
	async fn playlists_without_user_id_is_an_error_envelope() {
		let relay = relay();

		for event in [
			CatalogEvent::default(),
			CatalogEvent::default().with_query("limit", "10"),
			CatalogEvent::default().with_query("userId", "a b"),
		] {
			let envelope = relay.handle_user_playlists(event).await;

			assert_eq!(envelope.status_code, 500);
			assert!(envelope.body_json().expect("Body should be JSON.")["error"].is_string());
		}
	}

	#[tokio::test]
	async fn token_refresh_reports_issued_token() {
		let envelope = relay().handle_token_refresh().await;
		let body = envelope.body_json().expect("Body should be JSON.");

		assert_eq!(envelope.status_code, 200);
		assert_eq!(body["message"], "Token refreshed.");
		assert_eq!(body["access_token"], "abc123");
		assert_eq!(body["expires_in"], 3600);
	}

	#[tokio::test]
	async fn unknown_operation_is_rejected() {
		let err = relay()
			.invoke("drop-tables", Value::Null)
			.await
			.expect_err("Unknown operations should fail.");

		assert!(err.is_bad_request());
	}
}

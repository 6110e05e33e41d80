//! Catalog API proxy: attaches the current bearer token and forwards GET requests.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	error::TransportError,
	http::ReqwestHttpClient,
	oauth,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::TokenRefresher,
};

const TARGET: &str = "catalog API";
const BODY_PREVIEW_LIMIT: usize = 512;

/// Forwards relative catalog paths to the configured API base.
#[derive(Clone, Debug)]
pub struct CatalogProxy {
	http_client: ReqwestHttpClient,
	api_base: Url,
	refresher: Arc<TokenRefresher>,
}
impl CatalogProxy {
	/// Creates a proxy for `api_base` that obtains tokens from `refresher`.
	pub fn new(
		http_client: ReqwestHttpClient,
		api_base: Url,
		refresher: Arc<TokenRefresher>,
	) -> Self {
		Self { http_client, api_base, refresher }
	}

	/// Refresher used to obtain bearer tokens.
	pub fn refresher(&self) -> &Arc<TokenRefresher> {
		&self.refresher
	}

	/// Forwards the call and folds any failure into `{"error": message}`.
	pub async fn request(&self, path: &str, query: &BTreeMap<String, String>) -> Value {
		self.try_request(path, query).await.unwrap_or_else(|e| error_body(&e))
	}

	/// Forwards the call and returns the decoded JSON response verbatim.
	pub async fn try_request(&self, path: &str, query: &BTreeMap<String, String>) -> Result<Value> {
		const KIND: FlowKind = FlowKind::Proxy;

		let span = FlowSpan::new(KIND, "request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.build_url(path, query)?;
				let token = self.refresher.get_valid_token().await?;
				let response = self
					.http_client
					.get(url)
					.bearer_auth(token.expose())
					.send()
					.await
					.map_err(|e| oauth::map_reqwest_error(TARGET, e))?;
				let status = response.status();
				let body = response.bytes().await.map_err(|e| {
					if e.is_timeout() {
						Error::UpstreamTimeout { target: TARGET }
					} else {
						TransportError::network(TARGET, e).into()
					}
				})?;

				if !status.is_success() {
					return Err(Error::UpstreamStatus {
						status: status.as_u16(),
						body: preview(&body),
					});
				}

				serde_json::from_slice::<Value>(&body).map_err(|e| {
					Error::protocol_with_source("Catalog API returned a non-JSON body", e)
				})
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Builds `api_base + path`, appending a form-encoded query string when `query` is non-empty.
	pub fn build_url(&self, path: &str, query: &BTreeMap<String, String>) -> Result<Url> {
		let base = self.api_base.as_str().trim_end_matches('/');
		let path = path.trim();

		if path.is_empty() {
			return Err(Error::bad_request("Catalog path must not be empty"));
		}

		let joined = if path.starts_with('/') {
			format!("{base}{path}")
		} else {
			format!("{base}/{path}")
		};
		let mut url = Url::parse(&joined)
			.map_err(|e| Error::bad_request(format!("Catalog path `{path}` is invalid: {e}")))?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query.iter());
		}

		Ok(url)
	}
}

/// Resolves the user-playlists route from inbound query parameters.
pub fn user_playlists_path(query: Option<&BTreeMap<String, String>>) -> Result<String> {
	let raw = query
		.ok_or_else(|| Error::bad_request("Missing query string parameters"))?
		.get("userId")
		.ok_or_else(|| Error::bad_request("Missing required query parameter `userId`"))?;
	let user = UserId::new(raw).map_err(|e| Error::bad_request(e.to_string()))?;

	Ok(format!("/users/{user}/playlists"))
}

/// Renders an error as the `{"error": message}` body shared by every entry point.
pub fn error_body(error: &Error) -> Value {
	serde_json::json!({ "error": error.to_string() })
}

fn preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);

	match text.char_indices().nth(BODY_PREVIEW_LIMIT) {
		Some((idx, _)) => format!("{}...", &text[..idx]),
		None => text.into_owned(),
	}
}

#![allow(dead_code)]

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use httpmock::prelude::*;
use url::Url;
// self
use catalog_relay::{
	config::RelayConfig,
	handlers::Relay,
	http::ReqwestHttpClient,
	oauth::ClientCredentialsIssuer,
	refresh::TokenRefresher,
	store::{CredentialStore, MemoryStore, ParameterKeys},
};

pub const CLIENT_ID: &str = "relay-client";
pub const CLIENT_SECRET: &str = "relay-secret";
/// `Basic base64("relay-client:relay-secret")`.
pub const BASIC_AUTH: &str = "Basic cmVsYXktY2xpZW50OnJlbGF5LXNlY3JldA==";
pub const TOKEN_PATH: &str = "/api/token";
pub const API_PATH: &str = "/v1";

pub fn seeded_store() -> Arc<MemoryStore> {
	let keys = ParameterKeys::default();

	Arc::new(MemoryStore::with_secure([
		(keys.client_id, CLIENT_ID),
		(keys.client_secret, CLIENT_SECRET),
	]))
}

pub fn http_client() -> ReqwestHttpClient {
	ReqwestHttpClient::with_timeout(StdDuration::from_secs(5))
		.expect("Failed to build Reqwest client for tests.")
}

pub fn mock_url(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock server URL should parse.")
}

pub fn token_body(access_token: &str, expires_in: u64) -> String {
	format!(
		"{{\"access_token\":\"{access_token}\",\"token_type\":\"bearer\",\"expires_in\":{expires_in}}}"
	)
}

pub async fn mock_token_endpoint<'a>(
	server: &'a MockServer,
	access_token: &str,
	expires_in: u64,
) -> httpmock::Mock<'a> {
	let body = token_body(access_token, expires_in);

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).header("authorization", BASIC_AUTH);
			then.status(200).header("content-type", "application/json").body(body.as_str());
		})
		.await
}

pub fn refresher(server: &MockServer, store: Arc<dyn CredentialStore>) -> TokenRefresher {
	let issuer = ClientCredentialsIssuer::new(&mock_url(server, TOKEN_PATH), http_client())
		.expect("Issuer should build for the mock token endpoint.");

	TokenRefresher::new(store, Arc::new(issuer), ParameterKeys::default())
}

pub fn config(server: &MockServer) -> RelayConfig {
	RelayConfig::builder()
		.token_endpoint(mock_url(server, TOKEN_PATH))
		.api_base(mock_url(server, API_PATH))
		.timeout_secs(5)
		.build()
		.expect("Loopback mock endpoints should pass validation.")
}

pub fn relay(server: &MockServer, store: Arc<dyn CredentialStore>) -> Relay {
	Relay::new(&config(server), store).expect("Relay should build from mock configuration.")
}

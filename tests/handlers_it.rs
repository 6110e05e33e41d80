mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use catalog_relay::{
	config::RelayConfig,
	handlers::{CatalogEvent, Envelope, Relay},
	invoke::{Invoker, Operation},
	store::{CredentialStore, ParameterKeys},
};
use common::*;

async fn mock_playlists<'a>(server: &'a MockServer, user: &str) -> httpmock::Mock<'a> {
	let path = format!("{API_PATH}/users/{user}/playlists");

	server
		.mock_async(|when, then| {
			when.method(GET).path(path.as_str()).header("authorization", "Bearer abc123");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[{\"name\":\"Forge Sessions\"}],\"total\":1}");
		})
		.await
}

#[tokio::test]
async fn catalog_request_answers_with_json_envelope() {
	let server = MockServer::start_async().await;
	let _token = mock_token_endpoint(&server, "abc123", 3600).await;
	let search = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/search").query_param("q", "a b");
			then.status(200).header("content-type", "application/json").body("{\"ok\":true}");
		})
		.await;
	let relay = relay(&server, seeded_store());
	let event = CatalogEvent::for_path("/search").with_query("q", "a b");
	let envelope = relay.handle_catalog_request(&event).await;

	assert_eq!(envelope.status_code, 200);
	assert_eq!(envelope.headers.get("Content-Type").map(String::as_str), Some("application/json"));
	assert_eq!(envelope.body_json().expect("Body should be JSON."), json!({ "ok": true }));

	search.assert_calls_async(1).await;
}

#[tokio::test]
async fn route_overrides_raw_path() {
	let server = MockServer::start_async().await;
	let _token = mock_token_endpoint(&server, "abc123", 3600).await;
	let playlists = mock_playlists(&server, "smedjan").await;
	let relay = relay(&server, seeded_store());
	let event = CatalogEvent {
		raw_path: Some("/user-playlists".into()),
		route: Some("/users/smedjan/playlists".into()),
		query_string_parameters: None,
	};
	let envelope = relay.handle_catalog_request(&event).await;

	assert!(envelope.is_success(), "{envelope:?}");

	playlists.assert_calls_async(1).await;
}

#[tokio::test]
async fn catalog_request_without_path_is_an_error_envelope() {
	let server = MockServer::start_async().await;
	let envelope =
		relay(&server, seeded_store()).handle_catalog_request(&CatalogEvent::default()).await;

	assert_eq!(envelope.status_code, 500);
	assert!(envelope.body_json().expect("Body should be JSON.")["error"].is_string());
}

#[tokio::test]
async fn token_refresh_reports_new_token() {
	let server = MockServer::start_async().await;
	let token = mock_token_endpoint(&server, "abc123", 3600).await;
	let store = seeded_store();
	let envelope = relay(&server, store.clone()).handle_token_refresh().await;
	let body = envelope.body_json().expect("Body should be JSON.");

	assert_eq!(envelope.status_code, 200);
	assert_eq!(body["message"], "Token refreshed.");
	assert_eq!(body["access_token"], "abc123");
	assert_eq!(body["expires_in"], 3600);
	assert_eq!(
		store.get(&ParameterKeys::default().access_token, true).await.as_deref(),
		Ok("abc123")
	);

	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_refresh_returns_error_and_keeps_stale_token() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let store = seeded_store();
	let keys = ParameterKeys::default();

	store.put(&keys.access_token, "stale-token", true).await.expect("Seed token.");
	store.put(&keys.expires_at, "2020-01-01T00:00:00Z", false).await.expect("Seed expiry.");

	let envelope = relay(&server, store.clone()).handle_token_refresh().await;
	let body = envelope.body_json().expect("Body should be JSON.");

	assert_eq!(envelope.status_code, 500);
	assert!(body["error"].as_str().is_some_and(|message| message.contains("401")));
	assert!(body.get("access_token").is_none());
	assert!(!envelope.body.contains("stale-token"));
	assert_eq!(store.get(&keys.access_token, true).await.as_deref(), Ok("stale-token"));
}

#[tokio::test]
async fn user_playlists_missing_user_id_is_an_error_envelope() {
	let server = MockServer::start_async().await;
	let relay = relay(&server, seeded_store());

	for payload in [json!({}), json!({ "queryStringParameters": { "limit": "5" } })] {
		let response = relay
			.invoke(Operation::UserPlaylists.as_str(), payload)
			.await
			.expect("Entry point should answer with an envelope.");
		let envelope: Envelope =
			serde_json::from_value(response).expect("Response should be an envelope.");

		assert_eq!(envelope.status_code, 500);
		assert!(envelope.body_json().expect("Body should be JSON.")["error"].is_string());
	}
}

#[tokio::test]
async fn user_playlists_resolves_route_in_process() {
	let server = MockServer::start_async().await;
	let _token = mock_token_endpoint(&server, "abc123", 3600).await;
	let playlists = mock_playlists(&server, "smedjan").await;
	let envelope = relay(&server, seeded_store())
		.handle_user_playlists(CatalogEvent::default().with_query("userId", "smedjan"))
		.await;

	assert_eq!(envelope.status_code, 200);
	assert_eq!(envelope.body_json().expect("Body should be JSON.")["total"], 1);

	playlists.assert_calls_async(1).await;
}

#[tokio::test]
async fn user_playlists_delegates_through_invoker() {
	let front = MockServer::start_async().await;
	let front_token = mock_token_endpoint(&front, "unused", 3600).await;
	let backend = MockServer::start_async().await;
	let _backend_token = mock_token_endpoint(&backend, "abc123", 3600).await;
	let playlists = mock_playlists(&backend, "smedjan").await;
	let backend_relay: Arc<dyn Invoker> = Arc::new(relay(&backend, seeded_store()));
	let relay = relay(&front, seeded_store()).with_invoker(backend_relay);
	let envelope =
		relay.handle_user_playlists(CatalogEvent::default().with_query("userId", "smedjan")).await;

	assert_eq!(envelope.status_code, 200);
	assert_eq!(
		envelope.body_json().expect("Body should be JSON.")["items"][0]["name"],
		"Forge Sessions"
	);

	playlists.assert_calls_async(1).await;
	front_token.assert_calls_async(0).await;
}

#[tokio::test]
async fn user_playlists_delegates_over_http() {
	let server = MockServer::start_async().await;
	let remote = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/relay/catalog-request")
				.header("content-type", "application/json")
				.body_includes("/users/smedjan/playlists");
			then.status(200).header("content-type", "application/json").body(
				"{\"statusCode\":200,\"body\":\"{\\\"total\\\":3}\",\"headers\":{\"Content-Type\":\"application/json\"}}",
			);
		})
		.await;
	let config = RelayConfig::builder()
		.token_endpoint(mock_url(&server, TOKEN_PATH))
		.api_base(mock_url(&server, API_PATH))
		.invoke_endpoint(mock_url(&server, "/relay"))
		.build()
		.expect("Loopback mock endpoints should pass validation.");
	let store: Arc<dyn CredentialStore> = seeded_store();
	let relay = Relay::new(&config, store).expect("Relay should build.");
	let envelope =
		relay.handle_user_playlists(CatalogEvent::default().with_query("userId", "smedjan")).await;

	assert_eq!(envelope.status_code, 200);
	assert_eq!(envelope.body_json().expect("Body should be JSON.")["total"], 3);

	remote.assert_calls_async(1).await;
}

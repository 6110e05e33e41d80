//! Runs the relay against a local mock token endpoint and catalog API: one forced refresh, one
//! catalog search, and one user-playlists lookup sharing the cached token.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use catalog_relay::{
	config::RelayConfig,
	handlers::{CatalogEvent, Relay},
	store::{CredentialStore, MemoryStore, ParameterKeys},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let _search_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/search").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"artists\":{\"items\":[{\"name\":\"Demo Artist\"}]}}");
		})
		.await;
	let _playlists_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/users/demo-user/playlists");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[],\"total\":0}");
		})
		.await;
	let keys = ParameterKeys::default();
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_secure([
		(keys.client_id, "demo-client"),
		(keys.client_secret, "demo-secret"),
	]));
	let config = RelayConfig::builder()
		.token_endpoint(Url::parse(&server.url("/api/token"))?)
		.api_base(Url::parse(&server.url("/v1"))?)
		.build()?;
	let relay = Relay::new(&config, store)?;
	let refreshed = relay.handle_token_refresh().await;

	println!("token-refresh -> {} {}", refreshed.status_code, refreshed.body);

	let search = relay
		.handle_catalog_request(&CatalogEvent::for_path("/search").with_query("q", "demo artist"))
		.await;

	println!("catalog-request -> {} {}", search.status_code, search.body);

	let playlists = relay
		.handle_user_playlists(CatalogEvent::default().with_query("userId", "demo-user"))
		.await;

	println!("user-playlists -> {} {}", playlists.status_code, playlists.body);

	token_mock.assert_async().await;

	Ok(())
}

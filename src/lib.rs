//! Token-refreshing relay for a music-catalog HTTP API: client-credentials token caching,
//! authenticated catalog proxying, and serverless-style JSON entry points.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod http;
pub mod invoke;
pub mod issuer;
pub mod oauth;
pub mod obs;
pub mod proxy;
pub mod refresh;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and test doubles; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration as StdDuration,
	};
	// self
	use crate::{
		auth::ClientCredentials,
		http::ReqwestHttpClient,
		issuer::{IssueFuture, IssuedToken, TokenIssuer},
		refresh::TokenRefresher,
		store::{MemoryStore, ParameterKeys},
	};

	/// Client identifier seeded by [`seeded_store`].
	pub const TEST_CLIENT_ID: &str = "relay-client";
	/// Client secret seeded by [`seeded_store`].
	pub const TEST_CLIENT_SECRET: &str = "relay-secret";

	/// Issuer that answers every call with the same outcome and counts invocations.
	#[derive(Debug)]
	pub struct StaticIssuer {
		outcome: std::result::Result<IssuedToken, u16>,
		calls: AtomicUsize,
	}
	impl StaticIssuer {
		/// Always issues `token` valid for `ttl_seconds`.
		pub fn new(token: &str, ttl_seconds: i64) -> Self {
			Self { outcome: Ok(IssuedToken::new(token, ttl_seconds)), calls: AtomicUsize::new(0) }
		}

		/// Always fails as if the token endpoint answered with `status`.
		pub fn failing(status: u16) -> Self {
			Self { outcome: Err(status), calls: AtomicUsize::new(0) }
		}

		/// Number of issuance attempts observed so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl TokenIssuer for StaticIssuer {
		fn issue<'a>(&'a self, _credentials: &'a ClientCredentials) -> IssueFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let outcome = match &self.outcome {
				Ok(token) => Ok(token.clone()),
				Err(status) => Err(Error::UpstreamAuth {
					status: *status,
					body: r#"{"error":"invalid_client"}"#.into(),
				}),
			};

			Box::pin(async move { outcome })
		}
	}

	/// Memory store pre-populated with client credentials under the default prefix.
	pub fn seeded_store() -> Arc<MemoryStore> {
		let keys = ParameterKeys::default();

		Arc::new(MemoryStore::with_secure([
			(keys.client_id, TEST_CLIENT_ID.to_owned()),
			(keys.client_secret, TEST_CLIENT_SECRET.to_owned()),
		]))
	}

	/// Refresher over `store` whose issuer always returns `token`.
	pub fn static_refresher(store: Arc<MemoryStore>, token: &str, ttl_seconds: i64) -> TokenRefresher {
		TokenRefresher::new(
			store,
			Arc::new(StaticIssuer::new(token, ttl_seconds)),
			ParameterKeys::default(),
		)
	}

	/// Builds a short-timeout reqwest client for tests against local mock servers.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		ReqwestHttpClient::with_timeout(StdDuration::from_secs(5))
			.expect("Failed to build Reqwest client for tests.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

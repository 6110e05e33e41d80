//! Token refresh orchestration.
//!
//! [`TokenRefresher`] owns the lifecycle of the single shared access token. Every lookup reads
//! the cached token from the credential store and classifies it as fresh, stale, or absent.
//! Fresh tokens are returned as-is; otherwise the refresher loads the client credentials, asks
//! the [`TokenIssuer`] for a new token, stamps `expires_at = now + ttl`, and writes the token
//! back before handing it out. Issuer failures surface as [`Error::RefreshFailed`] so a stale
//! token is never returned.
//!
//! Concurrent refreshes are not serialized. Two callers that both observe a stale token both
//! call the issuer and both write; the last write wins and both tokens are valid.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Secret, TokenRecord, TokenState},
	error::ConfigError,
	issuer::TokenIssuer,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{self, CredentialStore, ParameterKeys},
};

/// Decides whether the cached token is usable and re-issues it when it is not.
#[derive(Clone)]
pub struct TokenRefresher {
	/// Store holding credentials and the cached token.
	pub store: Arc<dyn CredentialStore>,
	/// Issuer used whenever the cached token is stale or absent.
	pub issuer: Arc<dyn TokenIssuer>,
	/// Store key layout.
	pub keys: ParameterKeys,
	/// Shared counters for lookups and refreshes.
	pub metrics: Arc<RefreshMetrics>,
}
impl TokenRefresher {
	/// Creates a refresher over the provided collaborators.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		issuer: Arc<dyn TokenIssuer>,
		keys: ParameterKeys,
	) -> Self {
		Self { store, issuer, keys, metrics: Default::default() }
	}

	/// Returns a usable access token, refreshing it first when needed.
	pub async fn get_valid_token(&self) -> Result<Secret> {
		self.get_valid_token_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenRefresher::get_valid_token`] with an explicit clock reading.
	pub async fn get_valid_token_at(&self, now: OffsetDateTime) -> Result<Secret> {
		self.valid_record_at(now).await.map(|record| record.access_token)
	}

	/// Returns the cached record when fresh at `now`, otherwise a newly issued one.
	pub async fn valid_record_at(&self, now: OffsetDateTime) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "get_valid_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async move {
				let state = self.token_state_at(now).await.inspect_err(|_| {
					self.metrics.record_failure();
				})?;

				match state {
					TokenState::Fresh(record) => {
						self.metrics.record_cache_hit();

						Ok(record)
					},
					state => {
						#[cfg(feature = "tracing")]
						tracing::info!(state = state.as_str(), "Cached token needs a refresh.");
						#[cfg(not(feature = "tracing"))]
						let _ = state;

						self.issue_and_store(now).await
					},
				}
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Reads and classifies the cached token at `now` without refreshing it.
	pub async fn token_state_at(&self, now: OffsetDateTime) -> Result<TokenState> {
		store::read_token_state(self.store.as_ref(), &self.keys, now).await
	}

	/// Issues and stores a new token regardless of the cached one.
	pub async fn refresh(&self) -> Result<TokenRecord> {
		self.refresh_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenRefresher::refresh`] with an explicit issuance instant.
	pub async fn refresh_at(&self, now: OffsetDateTime) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.issue_and_store(now)).await;

		obs::record_result(KIND, &result);

		result
	}

	async fn issue_and_store(&self, now: OffsetDateTime) -> Result<TokenRecord> {
		let result = async {
			let credentials = store::read_credentials(self.store.as_ref(), &self.keys).await?;
			let issued = self
				.issuer
				.issue(&credentials)
				.await
				.map_err(|e| Error::RefreshFailed(Box::new(e)))?;
			let record = TokenRecord::builder()
				.issued_at(now)
				.expires_in(issued.ttl())
				.access_token(issued.access_token)
				.build()
				.map_err(ConfigError::from)?;

			store::write_token(self.store.as_ref(), &self.keys, &record).await?;

			Ok(record)
		}
		.await;

		match &result {
			Ok(_) => self.metrics.record_issued(),
			Err(_) => self.metrics.record_failure(),
		}

		result
	}
}
impl Debug for TokenRefresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("keys", &self.keys)
			.field("metrics", &self.metrics)
			.finish()
	}
}

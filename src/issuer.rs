//! Token issuer contract used by the refresh orchestrator.

// self
use crate::{_prelude::*, auth::ClientCredentials};

/// Boxed future returned by [`TokenIssuer::issue`].
pub type IssueFuture<'a> = Pin<Box<dyn Future<Output = Result<IssuedToken>> + 'a + Send>>;

/// Freshly issued bearer token and its lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
	/// Bearer token returned by the token endpoint.
	pub access_token: String,
	/// Seconds until the token expires.
	pub ttl_seconds: i64,
}
impl IssuedToken {
	/// Longest lifetime accepted from a token endpoint (one year).
	pub const MAX_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

	/// Pairs a token with its TTL.
	pub fn new(access_token: impl Into<String>, ttl_seconds: i64) -> Self {
		Self { access_token: access_token.into(), ttl_seconds }
	}

	/// TTL as a [`Duration`].
	pub fn ttl(&self) -> Duration {
		Duration::seconds(self.ttl_seconds)
	}
}
impl Debug for IssuedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedToken")
			.field("access_token", &"<redacted>")
			.field("ttl_seconds", &self.ttl_seconds)
			.finish()
	}
}

/// Exchanges client credentials for a bearer token.
///
/// Implementations perform a single attempt; retry policy belongs to the caller.
pub trait TokenIssuer
where
	Self: Send + Sync,
{
	/// Requests a new token for `credentials`.
	fn issue<'a>(&'a self, credentials: &'a ClientCredentials) -> IssueFuture<'a>;
}

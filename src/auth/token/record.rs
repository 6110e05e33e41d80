//! Cached access token record, its freshness state, and the record builder.

// self
use crate::{_prelude::*, auth::token::secret::Secret};

/// Result of reading the cached token at a given instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenState {
	/// A token exists and `expires_at` is still in the future.
	Fresh(TokenRecord),
	/// A token exists but `expires_at` has passed.
	Stale(TokenRecord),
	/// No usable token is stored.
	Absent,
}
impl TokenState {
	/// Classifies an optional record against `now`.
	pub fn classify(record: Option<TokenRecord>, now: OffsetDateTime) -> Self {
		match record {
			Some(record) if record.is_expired_at(now) => Self::Stale(record),
			Some(record) => Self::Fresh(record),
			None => Self::Absent,
		}
	}

	/// Returns the cached record only when it is still usable.
	pub fn fresh(self) -> Option<TokenRecord> {
		match self {
			Self::Fresh(record) => Some(record),
			Self::Stale(_) | Self::Absent => None,
		}
	}

	/// Stable label used in spans and log events.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Fresh(_) => "fresh",
			Self::Stale(_) => "stale",
			Self::Absent => "absent",
		}
	}
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when a relative expiry lands outside the representable date range.
	#[error("Expiry of {seconds} seconds is out of range.")]
	ExpiryOutOfRange {
		/// Relative expiry that overflowed.
		seconds: i64,
	},
}

/// The single shared access token and its absolute expiration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Bearer token presented to the catalog API.
	pub access_token: Secret,
	/// Issuance instant when the record came from a refresh in this process.
	pub issued_at: Option<OffsetDateTime>,
	/// Absolute expiration instant.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Returns a builder for records.
	pub fn builder() -> TokenRecordBuilder {
		TokenRecordBuilder::default()
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Time left before expiry at `instant`, clamped to zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("access_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug, Default)]
pub struct TokenRecordBuilder {
	access_token: Option<Secret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(Secret::new(token));

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	///
	/// A relative expiry is anchored at `issued_at`, defaulting to the current clock.
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let (issued_at, expires_at) = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => (self.issued_at, instant),
			(None, Some(delta)) => {
				let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
				let expires_at = issued_at.checked_add(delta).ok_or(
					TokenRecordBuilderError::ExpiryOutOfRange { seconds: delta.whole_seconds() },
				)?;

				(Some(issued_at), expires_at)
			},
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord { access_token, issued_at, expires_at })
	}
}

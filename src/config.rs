//! Relay configuration: upstream endpoints, parameter prefix, and outbound timeout.

// std
use std::{env, net::IpAddr, time::Duration as StdDuration};
// self
use crate::{_prelude::*, error::ConfigError, store::ParameterKeys};

/// Validated relay configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
	/// OAuth token endpoint used for the client-credentials grant.
	pub token_endpoint: Url,
	/// Catalog API base URL; proxied paths are appended to it.
	pub api_base: Url,
	/// Prefix under which credential store parameters live.
	pub parameter_prefix: String,
	/// Timeout applied to every outbound HTTP call, in seconds.
	pub timeout_secs: u64,
	/// Remote dispatch endpoint used by the user-playlists entry point, if any.
	pub invoke_endpoint: Option<Url>,
}
impl RelayConfig {
	/// Default OAuth token endpoint.
	pub const DEFAULT_TOKEN_ENDPOINT: &'static str = "https://accounts.spotify.com/api/token";
	/// Default catalog API base URL.
	pub const DEFAULT_API_BASE: &'static str = "https://api.spotify.com/v1";
	/// Default outbound timeout in seconds.
	pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
	/// Largest accepted outbound timeout in seconds.
	pub const MAX_TIMEOUT_SECS: u64 = 120;

	const ENV_TOKEN_ENDPOINT: &'static str = "CATALOG_RELAY_TOKEN_ENDPOINT";
	const ENV_API_BASE: &'static str = "CATALOG_RELAY_API_BASE";
	const ENV_PARAMETER_PREFIX: &'static str = "CATALOG_RELAY_PARAMETER_PREFIX";
	const ENV_TIMEOUT_SECS: &'static str = "CATALOG_RELAY_TIMEOUT_SECS";
	const ENV_INVOKE_ENDPOINT: &'static str = "CATALOG_RELAY_INVOKE_ENDPOINT";

	/// Creates a new builder seeded with the defaults.
	pub fn builder() -> RelayConfigBuilder {
		RelayConfigBuilder::default()
	}

	/// Loads the configuration from `CATALOG_RELAY_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Loads the configuration through an arbitrary variable lookup; unset variables keep their
	/// defaults.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut builder = Self::builder();

		if let Some(raw) = lookup(Self::ENV_TOKEN_ENDPOINT) {
			builder = builder.token_endpoint(parse_url("token", &raw)?);
		}
		if let Some(raw) = lookup(Self::ENV_API_BASE) {
			builder = builder.api_base(parse_url("api base", &raw)?);
		}
		if let Some(raw) = lookup(Self::ENV_PARAMETER_PREFIX) {
			builder = builder.parameter_prefix(raw);
		}
		if let Some(raw) = lookup(Self::ENV_TIMEOUT_SECS) {
			let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidTimeout {
				value: raw.clone(),
				max: Self::MAX_TIMEOUT_SECS,
			})?;

			builder = builder.timeout_secs(secs);
		}
		if let Some(raw) = lookup(Self::ENV_INVOKE_ENDPOINT).filter(|raw| !raw.trim().is_empty()) {
			builder = builder.invoke_endpoint(parse_url("invoke", &raw)?);
		}

		builder.build()
	}

	/// Outbound timeout as a standard duration for HTTP clients.
	pub fn timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.timeout_secs)
	}

	/// Store key layout derived from [`RelayConfig::parameter_prefix`].
	pub fn parameter_keys(&self) -> ParameterKeys {
		ParameterKeys::with_prefix(&self.parameter_prefix)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("token", &self.token_endpoint)?;
		validate_endpoint("api base", &self.api_base)?;

		if let Some(invoke) = self.invoke_endpoint.as_ref() {
			validate_endpoint("invoke", invoke)?;
		}

		validate_prefix(&self.parameter_prefix)?;

		if !(1..=Self::MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
			return Err(ConfigError::InvalidTimeout {
				value: self.timeout_secs.to_string(),
				max: Self::MAX_TIMEOUT_SECS,
			});
		}

		Ok(())
	}
}
impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			token_endpoint: default_url(Self::DEFAULT_TOKEN_ENDPOINT),
			api_base: default_url(Self::DEFAULT_API_BASE),
			parameter_prefix: ParameterKeys::DEFAULT_PREFIX.into(),
			timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
			invoke_endpoint: None,
		}
	}
}

/// Builder for [`RelayConfig`] values.
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
	config: RelayConfig,
}
impl RelayConfigBuilder {
	/// Sets the OAuth token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.config.token_endpoint = url;

		self
	}

	/// Sets the catalog API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.config.api_base = url;

		self
	}

	/// Sets the credential store parameter prefix.
	pub fn parameter_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.config.parameter_prefix = prefix.into();

		self
	}

	/// Sets the outbound timeout in seconds.
	pub fn timeout_secs(mut self, secs: u64) -> Self {
		self.config.timeout_secs = secs;

		self
	}

	/// Routes the user-playlists delegation through a remote dispatch endpoint.
	pub fn invoke_endpoint(mut self, url: Url) -> Self {
		self.config.invoke_endpoint = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<RelayConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn default_url(raw: &'static str) -> Url {
	Url::parse(raw).expect("Built-in endpoint constants must parse.")
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() == "https" || (url.scheme() == "http" && is_loopback(url)) {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.map(|ip| ip.is_loopback())
			.unwrap_or(false),
		None => false,
	}
}

fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
	let valid = prefix.len() > 1
		&& prefix.starts_with('/')
		&& !prefix.ends_with('/')
		&& !prefix.chars().any(char::is_whitespace);

	if valid {
		Ok(())
	} else {
		Err(ConfigError::InvalidParameterPrefix { prefix: prefix.to_owned() })
	}
}

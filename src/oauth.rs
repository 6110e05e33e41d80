//! Client-credentials token issuer built on the `oauth2` crate.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId as OAuthClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::ClientCredentials,
	error::{ConfigError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	issuer::{IssueFuture, IssuedToken, TokenIssuer},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type TokenEndpointClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const TARGET: &str = "token endpoint";

/// Maps HTTP transport failures into relay [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a relay error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_metadata: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(TARGET, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => Error::protocol(format!(
				"HTTP client error occurred while calling the token endpoint: {message}"
			)),
			_ => Error::protocol("HTTP client error occurred while calling the token endpoint"),
		}
	}
}

/// Issues tokens with `grant_type=client_credentials` and HTTP Basic client authentication.
pub struct ClientCredentialsIssuer<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	token_url: TokenUrl,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ClientCredentialsIssuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an issuer for `token_endpoint` that reuses the caller's transport + mapper pair.
	pub fn with_http_client(
		token_endpoint: &Url,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidUrl { field: "token", source })?;

		Ok(Self { token_url, http_client: http_client.into(), error_mapper: error_mapper.into() })
	}

	fn oauth_client(&self, credentials: &ClientCredentials) -> TokenEndpointClient {
		BasicClient::new(OAuthClientId::new(credentials.client_id.to_string()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_auth_type(AuthType::BasicAuth)
			.set_token_uri(self.token_url.clone())
	}

	async fn exchange(&self, credentials: &ClientCredentials) -> Result<IssuedToken> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let oauth_client = self.oauth_client(credentials);
		let response = oauth_client
			.exchange_client_credentials()
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;
		let expires_in = response
			.expires_in()
			.ok_or_else(|| Error::protocol("Token endpoint response is missing expires_in"))?
			.as_secs();
		let ttl_seconds = i64::try_from(expires_in)
			.map_err(|_| Error::protocol("The expires_in value exceeds the supported range"))?;

		if ttl_seconds <= 0 {
			return Err(Error::protocol("The expires_in value must be positive"));
		}
		if ttl_seconds > IssuedToken::MAX_TTL_SECONDS {
			return Err(Error::protocol(format!(
				"The expires_in value {ttl_seconds} exceeds the {} second limit",
				IssuedToken::MAX_TTL_SECONDS
			)));
		}

		Ok(IssuedToken::new(response.access_token().secret().to_owned(), ttl_seconds))
	}
}
impl ClientCredentialsIssuer<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an issuer backed by the provided reqwest client and the default error mapper.
	pub fn new(token_endpoint: &Url, http_client: ReqwestHttpClient) -> Result<Self> {
		Self::with_http_client(token_endpoint, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> TokenIssuer for ClientCredentialsIssuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn issue<'a>(&'a self, credentials: &'a ClientCredentials) -> IssueFuture<'a> {
		const KIND: FlowKind = FlowKind::Issue;

		Box::pin(async move {
			let span = FlowSpan::new(KIND, "client_credentials");

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span.instrument(self.exchange(credentials)).await;

			obs::record_result(KIND, &result);

			result
		})
	}
}
impl<C, M> Debug for ClientCredentialsIssuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsIssuer").field("token_url", &self.token_url.as_str()).finish()
	}
}

/// Classifies a reqwest failure against `target` (timeouts, builder errors, network errors).
pub(crate) fn map_reqwest_error(target: &'static str, err: ReqwestError) -> Error {
	if err.is_timeout() {
		return Error::UpstreamTimeout { target };
	}
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	TransportError::network(target, err).into()
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();
	let rejected_status = meta_ref.filter(|m| m.is_failure_status()).and_then(|m| m.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let body = serde_json::to_string(&response)
				.unwrap_or_else(|_| response.error().as_ref().to_owned());

			Error::UpstreamAuth { status: rejected_status.unwrap_or(400), body }
		},
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, body) => match rejected_status {
			Some(status) =>
				Error::UpstreamAuth { status, body: String::from_utf8_lossy(&body).into_owned() },
			None => Error::protocol_with_source(
				format!("Token endpoint returned malformed JSON at `{}`", error.path()),
				error,
			),
		},
		RequestTokenError::Other(message) => match rejected_status {
			Some(status) => Error::UpstreamAuth { status, body: message },
			None => Error::protocol(format!("Token endpoint returned an unexpected response: {message}")),
		},
	}
}

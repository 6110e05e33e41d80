// std
use std::{fmt, future::Future, pin::Pin, sync::Arc};
// crates.io
use parking_lot::Mutex;
use url::Url;
// self
use catalog_relay::{
	auth::{ClientCredentials, ClientId},
	error::{ConfigError, Error, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	issuer::TokenIssuer,
	oauth::{
		ClientCredentialsIssuer, TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	refresh::TokenRefresher,
	store::{MemoryStore, ParameterKeys},
};

#[derive(Debug)]
enum FakeTransportError {
	Unavailable,
}
impl fmt::Display for FakeTransportError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Unavailable => write!(f, "Transport unavailable."),
		}
	}
}
impl std::error::Error for FakeTransportError {}

#[derive(Clone, Copy)]
struct FakeHttpClient {
	status: u16,
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, status: self.status }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	status: u16,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, _request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let status = self.status;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			slot.store(ResponseMetadata { status: Some(status) });

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Unavailable)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<Option<ResponseMetadata>>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded_statuses(&self) -> Vec<Option<u16>> {
		self.metadata.lock().iter().map(|meta| meta.as_ref().and_then(|m| m.status)).collect()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		self.metadata.lock().push(meta.cloned());

		match err {
			HttpClientError::Reqwest(inner) =>
				TransportError::network("token endpoint", *inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => Error::protocol(format!("Unhandled fake transport error: {other:?}")),
		}
	}
}

fn issuer(
	status: u16,
	mapper: RecordingTransportErrorMapper,
) -> ClientCredentialsIssuer<FakeHttpClient, RecordingTransportErrorMapper> {
	ClientCredentialsIssuer::with_http_client(
		&Url::parse("https://accounts.example.com/api/token")
			.expect("Failed to parse mock token endpoint URL."),
		FakeHttpClient { status },
		mapper,
	)
	.expect("Failed to build issuer over the fake transport.")
}

#[tokio::test]
async fn fake_transport_error_reaches_mapper_with_metadata() {
	let mapper = RecordingTransportErrorMapper::default();
	let issuer = issuer(503, mapper.clone());
	let credentials = ClientCredentials::new(
		ClientId::new("fake-client").expect("Failed to build fake client identifier."),
		"fake-secret",
	);
	let err = issuer.issue(&credentials).await.expect_err("Fake transport always fails.");

	assert!(matches!(err, Error::Transport(TransportError::Network { .. })), "{err:?}");
	assert_eq!(mapper.recorded_statuses(), vec![Some(503)]);
}

#[tokio::test]
async fn refresher_wraps_transport_failures() {
	let keys = ParameterKeys::default();
	let store = Arc::new(MemoryStore::with_secure([
		(keys.client_id.clone(), "fake-client"),
		(keys.client_secret.clone(), "fake-secret"),
	]));
	let mapper = RecordingTransportErrorMapper::default();
	let refresher =
		TokenRefresher::new(store.clone(), Arc::new(issuer(502, mapper.clone())), keys.clone());
	let err = refresher.get_valid_token().await.expect_err("Refresh should fail.");

	assert!(
		matches!(err, Error::RefreshFailed(ref cause) if matches!(**cause, Error::Transport(_))),
		"{err:?}"
	);
	assert_eq!(mapper.recorded_statuses(), vec![Some(502)]);
	assert!(store.parameter(&keys.access_token).is_none());
}

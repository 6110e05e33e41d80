//! Client credential pair used for the client-credentials grant.

// self
use crate::auth::{ClientId, Secret};

/// Client id/secret pair provisioned out of band and read from the credential store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredentials {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// OAuth client secret.
	pub client_secret: Secret,
}
impl ClientCredentials {
	/// Pairs an identifier with its secret.
	pub fn new(client_id: ClientId, client_secret: impl Into<String>) -> Self {
		Self { client_id, client_secret: Secret::new(client_secret) }
	}
}

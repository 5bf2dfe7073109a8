//! Token endpoint client authentication strategies.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use url::form_urlencoded;
// self
use crate::{_prelude::*, auth::Secret, response::RegistrationResponse};

const METHOD_NONE: &str = "none";
const METHOD_SECRET_BASIC: &str = "client_secret_basic";
const METHOD_SECRET_POST: &str = "client_secret_post";

/// How the client proves its identity to the token endpoint (RFC 6749 §2.3.1).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "secret", rename_all = "snake_case")]
pub enum ClientAuthentication {
	/// Public client; only `client_id` travels in the request body.
	None,
	/// `client_secret_basic`: credentials in the `Authorization` header.
	ClientSecretBasic(Secret),
	/// `client_secret_post`: credentials in the request body.
	ClientSecretPost(Secret),
}
impl ClientAuthentication {
	/// Selects the strategy a registration response calls for.
	///
	/// Providers that issue a secret without naming a method get
	/// `client_secret_basic`, the RFC 6749 default. A method this crate does
	/// not implement is rejected rather than silently downgraded.
	pub fn for_registration(registration: &RegistrationResponse) -> Result<Self> {
		let Some(secret) = &registration.client_secret else {
			return Ok(Self::None);
		};

		match registration.token_endpoint_auth_method.as_deref() {
			None | Some(METHOD_SECRET_BASIC) => Ok(Self::ClientSecretBasic(secret.clone())),
			Some(METHOD_SECRET_POST) => Ok(Self::ClientSecretPost(secret.clone())),
			Some(METHOD_NONE) => Ok(Self::None),
			Some(method) =>
				Err(Error::UnsupportedAuthenticationMethod { method: method.to_owned() }),
		}
	}

	/// Wire identifier of the strategy.
	pub fn method(&self) -> &'static str {
		match self {
			Self::None => METHOD_NONE,
			Self::ClientSecretBasic(_) => METHOD_SECRET_BASIC,
			Self::ClientSecretPost(_) => METHOD_SECRET_POST,
		}
	}

	/// Headers to attach to the token request, if the strategy uses any.
	pub fn request_headers(&self, client_id: &str) -> Option<Vec<(String, String)>> {
		match self {
			Self::ClientSecretBasic(secret) => {
				// RFC 6749 appendix B: both values are form-urlencoded before
				// entering the Basic credentials.
				let credentials =
					format!("{}:{}", form_encode(client_id), form_encode(secret.expose()));

				Some(vec![(
					"Authorization".to_owned(),
					format!("Basic {}", STANDARD.encode(credentials)),
				)])
			},
			Self::None | Self::ClientSecretPost(_) => None,
		}
	}

	/// Body parameters to attach to the token request.
	pub fn request_parameters(&self, client_id: &str) -> BTreeMap<String, String> {
		let mut params = BTreeMap::new();

		match self {
			Self::None => {
				params.insert("client_id".to_owned(), client_id.to_owned());
			},
			Self::ClientSecretPost(secret) => {
				params.insert("client_id".to_owned(), client_id.to_owned());
				params.insert("client_secret".to_owned(), secret.expose().to_owned());
			},
			Self::ClientSecretBasic(_) => {},
		}

		params
	}
}

fn form_encode(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

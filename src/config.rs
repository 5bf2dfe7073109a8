//! Service configuration and OpenID Connect discovery document handling.

// std
use std::collections::BTreeMap;
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::{GeneralError, ResponseValidationError},
	http::{HttpRequest, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const WELL_KNOWN_PATH: [&str; 2] = [".well-known", "openid-configuration"];

/// Parsed OpenID Connect discovery document.
///
/// The raw JSON object is retained verbatim so serialization round-trips the
/// provider's document byte-for-byte (modulo key ordering, which is made
/// stable by sorting), while the required claims are validated and parsed
/// eagerly at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryDocument {
	raw: BTreeMap<String, Value>,
	issuer: String,
	authorization_endpoint: Url,
	token_endpoint: Url,
	jwks_uri: Url,
	response_types_supported: Vec<String>,
	subject_types_supported: Vec<String>,
	id_token_signing_alg_values_supported: Vec<String>,
	end_session_endpoint: Option<Url>,
	registration_endpoint: Option<Url>,
}
impl DiscoveryDocument {
	/// Validates a raw JSON object against the required discovery claims.
	///
	/// A missing required claim fails with
	/// [`ResponseValidationError::MissingField`] naming the specific key, as
	/// opposed to a generic parse failure.
	pub fn from_map(raw: BTreeMap<String, Value>) -> Result<Self, ResponseValidationError> {
		let issuer = require_str(&raw, "issuer")?.to_owned();
		let authorization_endpoint = require_url(&raw, "authorization_endpoint")?;
		let token_endpoint = require_url(&raw, "token_endpoint")?;
		let jwks_uri = require_url(&raw, "jwks_uri")?;
		let response_types_supported = require_string_array(&raw, "response_types_supported")?;
		let subject_types_supported = require_string_array(&raw, "subject_types_supported")?;
		let id_token_signing_alg_values_supported =
			require_string_array(&raw, "id_token_signing_alg_values_supported")?;
		let end_session_endpoint = optional_url(&raw, "end_session_endpoint")?;
		let registration_endpoint = optional_url(&raw, "registration_endpoint")?;

		Ok(Self {
			raw,
			issuer,
			authorization_endpoint,
			token_endpoint,
			jwks_uri,
			response_types_supported,
			subject_types_supported,
			id_token_signing_alg_values_supported,
			end_session_endpoint,
			registration_endpoint,
		})
	}

	/// Parses and validates a discovery document from its JSON text.
	pub fn from_json(json: &str) -> Result<Self> {
		let deserializer = &mut serde_json::Deserializer::from_str(json);
		let raw: BTreeMap<String, Value> = serde_path_to_error::deserialize(deserializer)
			.map_err(|err| GeneralError::json("discovery", err))?;

		Self::from_map(raw).map_err(|err| GeneralError::InvalidDiscoveryDocument(err).into())
	}

	/// Issuer identifier declared by the provider.
	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	/// Authorization endpoint.
	pub fn authorization_endpoint(&self) -> &Url {
		&self.authorization_endpoint
	}

	/// Token endpoint.
	pub fn token_endpoint(&self) -> &Url {
		&self.token_endpoint
	}

	/// JSON Web Key Set document location.
	pub fn jwks_uri(&self) -> &Url {
		&self.jwks_uri
	}

	/// `response_type` values the provider supports.
	pub fn response_types_supported(&self) -> &[String] {
		&self.response_types_supported
	}

	/// Subject identifier types the provider supports.
	pub fn subject_types_supported(&self) -> &[String] {
		&self.subject_types_supported
	}

	/// ID token signing algorithms the provider supports.
	pub fn id_token_signing_alg_values_supported(&self) -> &[String] {
		&self.id_token_signing_alg_values_supported
	}

	/// RP-initiated logout endpoint, when advertised.
	pub fn end_session_endpoint(&self) -> Option<&Url> {
		self.end_session_endpoint.as_ref()
	}

	/// Dynamic client registration endpoint, when advertised.
	pub fn registration_endpoint(&self) -> Option<&Url> {
		self.registration_endpoint.as_ref()
	}

	/// UserInfo endpoint, when advertised.
	pub fn userinfo_endpoint(&self) -> Option<Url> {
		self.raw
			.get("userinfo_endpoint")
			.and_then(Value::as_str)
			.and_then(|value| Url::parse(value).ok())
	}

	/// Scopes the provider advertises support for.
	pub fn scopes_supported(&self) -> Option<Vec<String>> {
		self.string_array("scopes_supported")
	}

	/// Claims the provider advertises support for.
	pub fn claims_supported(&self) -> Option<Vec<String>> {
		self.string_array("claims_supported")
	}

	/// Looks up any claim from the raw document.
	pub fn claim(&self, key: &str) -> Option<&Value> {
		self.raw.get(key)
	}

	fn string_array(&self, key: &str) -> Option<Vec<String>> {
		self.raw.get(key).and_then(Value::as_array).map(|values| {
			values.iter().filter_map(Value::as_str).map(str::to_owned).collect()
		})
	}
}
impl Serialize for DiscoveryDocument {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		self.raw.serialize(serializer)
	}
}
impl<'de> Deserialize<'de> for DiscoveryDocument {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let raw = <BTreeMap<String, Value>>::deserialize(deserializer)?;

		Self::from_map(raw).map_err(serde::de::Error::custom)
	}
}

/// Immutable endpoint configuration consumed by every flow.
///
/// Invariant: the authorization and token endpoints are always present once a
/// configuration exists; the optional endpoints are validated lazily by the
/// request builders that need them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationServiceConfiguration {
	/// Authorization endpoint used by the authorization code flow.
	pub authorization_endpoint: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Url,
	/// Optional RP-initiated logout endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_session_endpoint: Option<Url>,
	/// Optional dynamic client registration endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_endpoint: Option<Url>,
	/// Discovery document this configuration was derived from, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub discovery: Option<DiscoveryDocument>,
}
impl AuthorizationServiceConfiguration {
	/// Creates a configuration from explicit endpoints.
	pub fn new(authorization_endpoint: Url, token_endpoint: Url) -> Self {
		Self {
			authorization_endpoint,
			token_endpoint,
			end_session_endpoint: None,
			registration_endpoint: None,
			discovery: None,
		}
	}

	/// Sets the end-session endpoint.
	pub fn with_end_session_endpoint(mut self, url: Url) -> Self {
		self.end_session_endpoint = Some(url);

		self
	}

	/// Sets the registration endpoint.
	pub fn with_registration_endpoint(mut self, url: Url) -> Self {
		self.registration_endpoint = Some(url);

		self
	}

	/// Derives a configuration from a validated discovery document.
	pub fn from_discovery(document: DiscoveryDocument) -> Self {
		Self {
			authorization_endpoint: document.authorization_endpoint().clone(),
			token_endpoint: document.token_endpoint().clone(),
			end_session_endpoint: document.end_session_endpoint().cloned(),
			registration_endpoint: document.registration_endpoint().cloned(),
			discovery: Some(document),
		}
	}

	/// Issuer identifier, available only for discovery-derived configurations.
	pub fn issuer(&self) -> Option<&str> {
		self.discovery.as_ref().map(DiscoveryDocument::issuer)
	}

	/// Builds the `{issuer}/.well-known/openid-configuration` URL.
	pub fn well_known_from_issuer(issuer: &Url) -> Result<Url> {
		let mut url = issuer.clone();

		url.path_segments_mut()
			.map_err(|()| Error::invalid_argument("issuer URL cannot be a base"))?
			.pop_if_empty()
			.extend(WELL_KNOWN_PATH);

		Ok(url)
	}

	/// Fetches and validates the discovery document advertised by `issuer`.
	pub async fn fetch_from_issuer<T>(transport: &T, issuer: &Url) -> Result<Self>
	where
		T: ?Sized + HttpTransport,
	{
		let url = Self::well_known_from_issuer(issuer)?;

		Self::fetch_from_url(transport, url).await
	}

	/// Fetches and validates a discovery document from an explicit URL.
	pub async fn fetch_from_url<T>(transport: &T, url: Url) -> Result<Self>
	where
		T: ?Sized + HttpTransport,
	{
		const KIND: FlowKind = FlowKind::Discovery;

		let span = FlowSpan::new(KIND, "fetch_from_url");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = HttpRequest::get(url).header_if_absent("Accept", "application/json");
				let response = transport
					.call(request)
					.await
					.map_err(|source| GeneralError::Network { endpoint: "discovery", source })?;

				if !response.is_success() {
					return Err(GeneralError::ServerError {
						endpoint: "discovery",
						status: response.status,
					}
					.into());
				}

				let deserializer = &mut serde_json::Deserializer::from_slice(&response.body);
				let raw: BTreeMap<String, Value> = serde_path_to_error::deserialize(deserializer)
					.map_err(|err| GeneralError::json("discovery", err))?;
				let document = DiscoveryDocument::from_map(raw)
					.map_err(GeneralError::InvalidDiscoveryDocument)?;

				Ok(Self::from_discovery(document))
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

fn require_str<'a>(
	raw: &'a BTreeMap<String, Value>,
	field: &'static str,
) -> Result<&'a str, ResponseValidationError> {
	raw.get(field)
		.ok_or(ResponseValidationError::MissingField { field })?
		.as_str()
		.ok_or(ResponseValidationError::InvalidField { field, reason: "expected a string".into() })
}

fn require_url(
	raw: &BTreeMap<String, Value>,
	field: &'static str,
) -> Result<Url, ResponseValidationError> {
	let value = require_str(raw, field)?;

	Url::parse(value)
		.map_err(|err| ResponseValidationError::InvalidField { field, reason: err.to_string() })
}

fn optional_url(
	raw: &BTreeMap<String, Value>,
	field: &'static str,
) -> Result<Option<Url>, ResponseValidationError> {
	if !raw.contains_key(field) {
		return Ok(None);
	}

	require_url(raw, field).map(Some)
}

fn require_string_array(
	raw: &BTreeMap<String, Value>,
	field: &'static str,
) -> Result<Vec<String>, ResponseValidationError> {
	let values = raw
		.get(field)
		.ok_or(ResponseValidationError::MissingField { field })?
		.as_array()
		.ok_or_else(|| ResponseValidationError::InvalidField {
			field,
			reason: "expected an array".into(),
		})?;

	values
		.iter()
		.map(|value| {
			value.as_str().map(str::to_owned).ok_or_else(|| ResponseValidationError::InvalidField {
				field,
				reason: "expected an array of strings".into(),
			})
		})
		.collect()
}

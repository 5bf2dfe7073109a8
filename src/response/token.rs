//! Token endpoint response parsing.

// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, clock::Clock, error::GeneralError, request::TokenRequest};

/// Successful token endpoint response.
///
/// Owns the [`TokenRequest`] that produced it, and converts the relative
/// `expires_in` to an absolute instant at parse time so freshness checks never
/// depend on when the response was inspected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
	/// The request this response answers.
	pub request: TokenRequest,
	/// Access token type, typically `Bearer`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Issued access token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<String>,
	/// Absolute access token expiry derived from `expires_in`.
	#[serde(
		default,
		with = "time::serde::timestamp::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub access_token_expires_at: Option<OffsetDateTime>,
	/// Issued ID token, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Issued refresh token, if the provider rotated or granted one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
	/// Granted scope, when the provider narrowed the requested scope.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Response fields outside the protocol vocabulary, stringified.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub additional_parameters: BTreeMap<String, String>,
}
impl TokenResponse {
	/// Parses a token endpoint JSON body against the originating request.
	pub fn from_json(request: TokenRequest, body: &[u8], clock: &dyn Clock) -> Result<Self> {
		let deserializer = &mut serde_json::Deserializer::from_slice(body);
		let wire: WireTokenResponse = serde_path_to_error::deserialize(deserializer)
			.map_err(|err| GeneralError::json("token", err))?;

		Ok(Self::from_wire(request, wire, clock))
	}

	pub(crate) fn from_wire(
		request: TokenRequest,
		wire: WireTokenResponse,
		clock: &dyn Clock,
	) -> Self {
		let access_token_expires_at =
			wire.expires_in.map(|secs| clock.now() + Duration::seconds(secs));
		let additional_parameters = wire
			.extra
			.into_iter()
			.map(|(name, value)| {
				let value = match value {
					Value::String(s) => s,
					other => other.to_string(),
				};

				(name, value)
			})
			.collect();

		Self {
			request,
			token_type: wire.token_type,
			access_token: wire.access_token,
			access_token_expires_at,
			id_token: wire.id_token,
			refresh_token: wire.refresh_token,
			scope: wire.scope,
			additional_parameters,
		}
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTokenResponse {
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	id_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	scope: Option<String>,
	#[serde(flatten)]
	extra: BTreeMap<String, Value>,
}

//! Dynamic client registration response parsing.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	clock::Clock,
	error::{GeneralError, ResponseValidationError},
	request::RegistrationRequest,
};

/// Successful dynamic client registration response.
///
/// Owns the [`RegistrationRequest`] that produced it. When the provider issues
/// a client secret it must also state the secret's lifetime and the
/// registration management credentials, so a confidential registration is
/// never half-usable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationResponse {
	/// The request this response answers.
	pub request: RegistrationRequest,
	/// Issued client identifier.
	pub client_id: String,
	/// When the client identifier was issued.
	#[serde(
		default,
		with = "time::serde::timestamp::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub client_id_issued_at: Option<OffsetDateTime>,
	/// Issued client secret, if the client was registered as confidential.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<Secret>,
	/// Client secret expiry; `None` when the secret never expires.
	#[serde(
		default,
		with = "time::serde::timestamp::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub client_secret_expires_at: Option<OffsetDateTime>,
	/// Token for managing this registration record.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_access_token: Option<String>,
	/// Endpoint for managing this registration record.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_client_uri: Option<Url>,
	/// Token endpoint authentication method the provider registered.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint_auth_method: Option<String>,
	/// Response fields outside the protocol vocabulary, stringified.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub additional_parameters: BTreeMap<String, String>,
}
impl RegistrationResponse {
	/// Parses a registration endpoint JSON body against the originating
	/// request.
	pub fn from_json(request: RegistrationRequest, body: &[u8]) -> Result<Self> {
		let deserializer = &mut serde_json::Deserializer::from_slice(body);
		let wire: WireRegistrationResponse = serde_path_to_error::deserialize(deserializer)
			.map_err(|err| GeneralError::json("registration", err))?;

		Ok(Self::from_wire(request, wire)?)
	}

	pub(crate) fn from_wire(
		request: RegistrationRequest,
		wire: WireRegistrationResponse,
	) -> Result<Self, ResponseValidationError> {
		let client_id =
			wire.client_id.ok_or(ResponseValidationError::MissingField { field: "client_id" })?;

		// A secret without its lifetime and management credentials cannot be
		// used safely, so the whole group is required together.
		if wire.client_secret.is_some() {
			if wire.client_secret_expires_at.is_none() {
				return Err(ResponseValidationError::MissingField {
					field: "client_secret_expires_at",
				});
			}
			if wire.registration_access_token.is_none() {
				return Err(ResponseValidationError::MissingField {
					field: "registration_access_token",
				});
			}
			if wire.registration_client_uri.is_none() {
				return Err(ResponseValidationError::MissingField {
					field: "registration_client_uri",
				});
			}
		}

		let client_id_issued_at = parse_timestamp(wire.client_id_issued_at, "client_id_issued_at")?;
		// A wire value of zero means the secret never expires.
		let client_secret_expires_at = parse_timestamp(
			wire.client_secret_expires_at.filter(|&secs| secs != 0),
			"client_secret_expires_at",
		)?;

		Ok(Self {
			request,
			client_id,
			client_id_issued_at,
			client_secret: wire.client_secret.map(Secret::new),
			client_secret_expires_at,
			registration_access_token: wire.registration_access_token,
			registration_client_uri: wire.registration_client_uri,
			token_endpoint_auth_method: wire.token_endpoint_auth_method,
			additional_parameters: wire
				.extra
				.into_iter()
				.map(|(name, value)| {
					let value = match value {
						Value::String(s) => s,
						other => other.to_string(),
					};

					(name, value)
				})
				.collect(),
		})
	}

	/// Returns `true` when the issued client secret has a finite lifetime and
	/// that lifetime has elapsed.
	pub fn has_client_secret_expired(&self, clock: &dyn Clock) -> bool {
		matches!(self.client_secret_expires_at, Some(at) if at <= clock.now())
	}
}

fn parse_timestamp(
	secs: Option<i64>,
	field: &'static str,
) -> Result<Option<OffsetDateTime>, ResponseValidationError> {
	secs.map(|secs| {
		OffsetDateTime::from_unix_timestamp(secs).map_err(|err| {
			ResponseValidationError::InvalidField { field, reason: err.to_string() }
		})
	})
	.transpose()
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRegistrationResponse {
	#[serde(default)]
	client_id: Option<String>,
	#[serde(default)]
	client_id_issued_at: Option<i64>,
	#[serde(default)]
	client_secret: Option<String>,
	#[serde(default)]
	client_secret_expires_at: Option<i64>,
	#[serde(default)]
	registration_access_token: Option<String>,
	#[serde(default)]
	registration_client_uri: Option<Url>,
	#[serde(default)]
	token_endpoint_auth_method: Option<String>,
	#[serde(flatten)]
	extra: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{clock::FixedClock, config::AuthorizationServiceConfiguration};

	fn test_request() -> RegistrationRequest {
		RegistrationRequest::builder(
			AuthorizationServiceConfiguration::new(
				Url::parse("https://idp.example.com/authorize").expect("Fixture URL should parse."),
				Url::parse("https://idp.example.com/token").expect("Fixture URL should parse."),
			)
			.with_registration_endpoint(
				Url::parse("https://idp.example.com/register").expect("Fixture URL should parse."),
			),
			vec![Url::parse("https://app.example.com/cb").expect("Fixture URL should parse.")],
		)
		.build()
		.expect("Request fixture should build.")
	}

	#[test]
	fn public_client_registration_needs_only_a_client_id() {
		let body = br#"{"client_id": "client-1", "token_endpoint_auth_method": "none"}"#;
		let response = RegistrationResponse::from_json(test_request(), body)
			.expect("Public registration should parse.");

		assert_eq!(response.client_id, "client-1");
		assert!(response.client_secret.is_none());
		assert_eq!(response.token_endpoint_auth_method.as_deref(), Some("none"));
	}

	#[test]
	fn confidential_registration_requires_the_secret_group() {
		let body = br#"{"client_id": "client-1", "client_secret": "s3cret"}"#;
		let err = RegistrationResponse::from_json(test_request(), body)
			.expect_err("Secret without its lifetime should fail.");

		assert!(matches!(
			err,
			Error::Validation(ResponseValidationError::MissingField {
				field: "client_secret_expires_at",
			}),
		));

		let body = br#"{
			"client_id": "client-1",
			"client_secret": "s3cret",
			"client_secret_expires_at": 0,
			"registration_access_token": "rat-1",
			"registration_client_uri": "https://idp.example.com/register/client-1"
		}"#;
		let response = RegistrationResponse::from_json(test_request(), body)
			.expect("Complete confidential registration should parse.");

		assert!(response.client_secret.is_some());
		assert!(response.client_secret_expires_at.is_none(), "Zero expiry means never expires.");
	}

	#[test]
	fn secret_expiry_is_evaluated_against_the_clock() {
		let body = br#"{
			"client_id": "client-1",
			"client_secret": "s3cret",
			"client_secret_expires_at": 1700000000,
			"registration_access_token": "rat-1",
			"registration_client_uri": "https://idp.example.com/register/client-1"
		}"#;
		let response = RegistrationResponse::from_json(test_request(), body)
			.expect("Confidential registration should parse.");
		let clock = FixedClock::new(
			OffsetDateTime::from_unix_timestamp(1_699_999_999).expect("Valid instant."),
		);

		assert!(!response.has_client_secret_expired(&clock));

		clock.advance(Duration::seconds(2));

		assert!(response.has_client_secret_expired(&clock));
	}

	#[test]
	fn missing_client_id_fails_validation() {
		let err = RegistrationResponse::from_json(test_request(), br#"{}"#)
			.expect_err("Missing client id should fail.");

		assert!(matches!(
			err,
			Error::Validation(ResponseValidationError::MissingField { field: "client_id" }),
		));
	}
}

//! Authorization redirect parsing and token exchange derivation.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	error::{AuthorizationRequestError, ResponseValidationError},
	request::{AuthorizationRequest, GrantType, TokenRequest},
};

const KNOWN_REDIRECT_PARAMETERS: &[&str] = &[
	"access_token",
	"code",
	"error",
	"error_description",
	"error_uri",
	"expires_in",
	"id_token",
	"scope",
	"state",
	"token_type",
];

/// Successful authorization endpoint response, parsed from the redirect URI.
///
/// Owns the [`AuthorizationRequest`] that produced it so the follow-up token
/// exchange can be derived via
/// [`create_token_exchange_request`](Self::create_token_exchange_request).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
	/// The request this response answers.
	pub request: AuthorizationRequest,
	/// Authorization code to exchange at the token endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authorization_code: Option<String>,
	/// Echoed anti-CSRF state; always equal to the request's state.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<String>,
	/// Access token, for hybrid/implicit response types.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<String>,
	/// Access token type, when an access token was issued directly.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Absolute access token expiry derived from `expires_in`.
	#[serde(
		default,
		with = "time::serde::timestamp::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub access_token_expires_at: Option<OffsetDateTime>,
	/// ID token, for hybrid/implicit response types.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
	/// Granted scope, when the provider narrowed the requested scope.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Redirect parameters outside the protocol vocabulary.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub additional_parameters: BTreeMap<String, String>,
}
impl AuthorizationResponse {
	/// Parses the provider's redirect URI against the originating request.
	///
	/// An `error` parameter maps to [`Error::Authorization`]; a missing or
	/// mismatched `state` maps to the locally detected
	/// [`AuthorizationRequestError::state_mismatch`]. `expires_in` is converted
	/// to an absolute instant against `clock` at parse time.
	pub fn from_redirect(
		request: AuthorizationRequest,
		redirect: &Url,
		clock: &dyn Clock,
	) -> Result<Self> {
		let mut params: BTreeMap<String, String> = redirect.query_pairs().into_owned().collect();

		if let Some(code) = params.remove("error") {
			return Err(AuthorizationRequestError::from_oauth_parameters(
				code,
				params.remove("error_description"),
				params.remove("error_uri"),
			)
			.into());
		}

		let state = params.remove("state");

		if request.state != state {
			return Err(AuthorizationRequestError::state_mismatch().into());
		}

		let access_token_expires_at = params
			.remove("expires_in")
			.map(|raw| {
				raw.parse::<i64>().map(|secs| clock.now() + Duration::seconds(secs)).map_err(|_| {
					ResponseValidationError::InvalidField {
						field: "expires_in",
						reason: "expected an integer number of seconds".into(),
					}
				})
			})
			.transpose()?;
		let authorization_code = params.remove("code");
		let access_token = params.remove("access_token");
		let token_type = params.remove("token_type");
		let id_token = params.remove("id_token");
		let scope = params.remove("scope");

		params.retain(|name, _| !KNOWN_REDIRECT_PARAMETERS.contains(&name.as_str()));

		Ok(Self {
			request,
			authorization_code,
			state,
			access_token,
			token_type,
			access_token_expires_at,
			id_token,
			scope,
			additional_parameters: params,
		})
	}

	/// Derives the token exchange request for the received authorization code.
	pub fn create_token_exchange_request(&self) -> Result<TokenRequest> {
		self.create_token_exchange_request_with_extra_params(BTreeMap::new())
	}

	/// Derives the token exchange request, carrying provider-specific
	/// parameters into the exchange.
	///
	/// The request's PKCE verifier and nonce travel with the exchange so the
	/// token endpoint can verify possession and the ID token can be validated.
	pub fn create_token_exchange_request_with_extra_params(
		&self,
		additional_parameters: BTreeMap<String, String>,
	) -> Result<TokenRequest> {
		let code = self
			.authorization_code
			.as_ref()
			.ok_or_else(|| Error::illegal_state("authorization response carries no code"))?;
		let mut builder = TokenRequest::builder(
			self.request.configuration.clone(),
			self.request.client_id.clone(),
			GrantType::AuthorizationCode,
		)
		.authorization_code(code)
		.redirect_uri(self.request.redirect_uri.clone())
		.additional_parameters(additional_parameters);

		if let Some(code_verifier) = &self.request.code_verifier {
			builder = builder.code_verifier(code_verifier);
		}
		if let Some(nonce) = &self.request.nonce {
			builder = builder.nonce(nonce);
		}

		Ok(builder.build()?)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{clock::FixedClock, config::AuthorizationServiceConfiguration};

	fn test_request() -> AuthorizationRequest {
		AuthorizationRequest::builder(
			AuthorizationServiceConfiguration::new(
				Url::parse("https://idp.example.com/authorize").expect("Fixture URL should parse."),
				Url::parse("https://idp.example.com/token").expect("Fixture URL should parse."),
			),
			"test_client_id",
			"code",
			Url::parse("https://app.example.com/cb").expect("Redirect URI fixture should parse."),
		)
		.state("state-1")
		.nonce("nonce-1")
		.build()
		.expect("Request fixture should build.")
	}

	fn fixed_clock() -> FixedClock {
		FixedClock::new(OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Valid instant."))
	}

	#[test]
	fn redirect_parses_code_state_and_extras() {
		let request = test_request();
		let redirect = Url::parse(
			"https://app.example.com/cb?code=code-1&state=state-1&scope=openid&expires_in=300&session_state=abc",
		)
		.expect("Redirect fixture should parse.");
		let response = AuthorizationResponse::from_redirect(request, &redirect, &fixed_clock())
			.expect("Redirect should parse into a response.");

		assert_eq!(response.authorization_code.as_deref(), Some("code-1"));
		assert_eq!(response.state.as_deref(), Some("state-1"));
		assert_eq!(response.scope.as_deref(), Some("openid"));
		assert_eq!(
			response.access_token_expires_at.map(OffsetDateTime::unix_timestamp),
			Some(1_700_000_300),
		);
		assert_eq!(
			response.additional_parameters.get("session_state").map(String::as_str),
			Some("abc"),
		);
	}

	#[test]
	fn error_parameter_maps_to_authorization_error() {
		let redirect = Url::parse(
			"https://app.example.com/cb?error=access_denied&error_description=denied&state=state-1",
		)
		.expect("Redirect fixture should parse.");
		let err = AuthorizationResponse::from_redirect(test_request(), &redirect, &fixed_clock())
			.expect_err("Error parameter should map to an error.");

		match err {
			Error::Authorization(inner) => {
				assert_eq!(inner.code, "access_denied");
				assert_eq!(inner.description.as_deref(), Some("denied"));
			},
			other => panic!("Expected an authorization error, got {other:?}."),
		}
	}

	#[test]
	fn state_mismatch_is_detected() {
		let redirect = Url::parse("https://app.example.com/cb?code=code-1&state=wrong")
			.expect("Redirect fixture should parse.");
		let err = AuthorizationResponse::from_redirect(test_request(), &redirect, &fixed_clock())
			.expect_err("Mismatched state should fail.");

		assert!(matches!(err, Error::Authorization(inner) if inner == AuthorizationRequestError::state_mismatch()));

		let redirect = Url::parse("https://app.example.com/cb?code=code-1")
			.expect("Redirect fixture should parse.");
		let err = AuthorizationResponse::from_redirect(test_request(), &redirect, &fixed_clock())
			.expect_err("Missing state should fail.");

		assert!(err.is_authorization_error());
	}

	#[test]
	fn token_exchange_request_carries_verifier_and_nonce() {
		let request = test_request();
		let code_verifier = request.code_verifier.clone();
		let redirect = Url::parse("https://app.example.com/cb?code=code-1&state=state-1")
			.expect("Redirect fixture should parse.");
		let response = AuthorizationResponse::from_redirect(request, &redirect, &fixed_clock())
			.expect("Redirect should parse into a response.");
		let exchange = response
			.create_token_exchange_request()
			.expect("Token exchange request should derive.");

		assert_eq!(exchange.grant_type, GrantType::AuthorizationCode);
		assert_eq!(exchange.authorization_code.as_deref(), Some("code-1"));
		assert_eq!(exchange.code_verifier, code_verifier);
		assert_eq!(exchange.nonce.as_deref(), Some("nonce-1"));
	}

	#[test]
	fn token_exchange_without_code_is_an_illegal_state() {
		let redirect = Url::parse("https://app.example.com/cb?state=state-1")
			.expect("Redirect fixture should parse.");
		let response =
			AuthorizationResponse::from_redirect(test_request(), &redirect, &fixed_clock())
				.expect("Redirect should parse into a response.");
		let err = response
			.create_token_exchange_request()
			.expect_err("Missing code should be an illegal state.");

		assert!(matches!(err, Error::IllegalState { .. }));
	}
}

//! Authorization request construction, PKCE material, and URI serialization.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	config::AuthorizationServiceConfiguration,
	error::RequestBuilderError,
	request::{check_additional_parameters, random_string},
};

/// Parameter names owned by [`AuthorizationRequest`] itself; additional
/// parameters must not collide with these.
pub const RESERVED_AUTHORIZATION_PARAMETERS: &[&str] = &[
	"client_id",
	"code_challenge",
	"code_challenge_method",
	"display",
	"login_hint",
	"nonce",
	"prompt",
	"redirect_uri",
	"response_mode",
	"response_type",
	"scope",
	"state",
];

/// PKCE challenge method identifier for SHA-256 (RFC 7636 S256).
pub const CODE_CHALLENGE_METHOD_S256: &str = "S256";

const STATE_LEN: usize = 32;
const CODE_VERIFIER_LEN: usize = 64;
const CODE_VERIFIER_MIN_LEN: usize = 43;
const CODE_VERIFIER_MAX_LEN: usize = 128;

/// Generates a random anti-CSRF state (or nonce) value.
pub fn generate_state() -> String {
	random_string(STATE_LEN)
}

/// Generates a random PKCE code verifier within the RFC 7636 length bounds.
pub fn generate_code_verifier() -> String {
	random_string(CODE_VERIFIER_LEN)
}

/// Derives the S256 code challenge for a verifier.
pub fn derive_code_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Immutable record of one outbound authorization intent.
///
/// Built once via [`AuthorizationRequestBuilder`], never mutated, and
/// serialized to the provider's authorization URI via [`to_uri`](Self::to_uri)
/// or to JSON for persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
	/// Service configuration the request targets.
	pub configuration: AuthorizationServiceConfiguration,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 `response_type`, typically `code`.
	pub response_type: String,
	/// Redirect URI the provider sends the response to.
	pub redirect_uri: Url,
	/// Space-delimited scope string, if any scopes were requested.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Opaque anti-CSRF value echoed back on the redirect.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<String>,
	/// OpenID Connect nonce echoed inside the ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// PKCE code verifier kept client-side for the token exchange.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code_verifier: Option<String>,
	/// PKCE code challenge sent to the authorization endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code_verifier_challenge: Option<String>,
	/// PKCE code challenge method (`S256`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code_verifier_challenge_method: Option<String>,
	/// OpenID Connect `display` hint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display: Option<String>,
	/// OpenID Connect `login_hint`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub login_hint: Option<String>,
	/// OpenID Connect `prompt` directive.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub prompt: Option<String>,
	/// OAuth 2.0 `response_mode` override.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response_mode: Option<String>,
	/// Provider-specific parameters; never collide with reserved names.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub additional_parameters: BTreeMap<String, String>,
}
impl AuthorizationRequest {
	/// Returns a builder seeded with random state, nonce, and PKCE material.
	pub fn builder(
		configuration: AuthorizationServiceConfiguration,
		client_id: impl Into<String>,
		response_type: impl Into<String>,
		redirect_uri: Url,
	) -> AuthorizationRequestBuilder {
		AuthorizationRequestBuilder::new(
			configuration,
			client_id.into(),
			response_type.into(),
			redirect_uri,
		)
	}

	/// Serializes the request into the provider's authorization URI.
	pub fn to_uri(&self) -> Url {
		let mut url = self.configuration.authorization_endpoint.clone();

		{
			let mut pairs = url.query_pairs_mut();

			pairs.append_pair("redirect_uri", self.redirect_uri.as_str());
			pairs.append_pair("client_id", &self.client_id);
			pairs.append_pair("response_type", &self.response_type);

			for (name, value) in [
				("display", &self.display),
				("login_hint", &self.login_hint),
				("prompt", &self.prompt),
				("state", &self.state),
				("nonce", &self.nonce),
				("scope", &self.scope),
				("response_mode", &self.response_mode),
				("code_challenge", &self.code_verifier_challenge),
				("code_challenge_method", &self.code_verifier_challenge_method),
			] {
				if let Some(value) = value {
					pairs.append_pair(name, value);
				}
			}
			for (name, value) in &self.additional_parameters {
				pairs.append_pair(name, value);
			}
		}

		url
	}
}

/// Builder for [`AuthorizationRequest`].
///
/// State, nonce, and a PKCE S256 pair are generated by default; use the
/// `without_*` methods for providers that cannot handle them.
#[derive(Clone, Debug)]
pub struct AuthorizationRequestBuilder {
	configuration: AuthorizationServiceConfiguration,
	client_id: String,
	response_type: String,
	redirect_uri: Url,
	scope: Option<String>,
	state: Option<String>,
	nonce: Option<String>,
	code_verifier: Option<String>,
	code_verifier_challenge: Option<String>,
	code_verifier_challenge_method: Option<String>,
	display: Option<String>,
	login_hint: Option<String>,
	prompt: Option<String>,
	response_mode: Option<String>,
	additional_parameters: BTreeMap<String, String>,
}
impl AuthorizationRequestBuilder {
	fn new(
		configuration: AuthorizationServiceConfiguration,
		client_id: String,
		response_type: String,
		redirect_uri: Url,
	) -> Self {
		let verifier = generate_code_verifier();
		let challenge = derive_code_challenge(&verifier);

		Self {
			configuration,
			client_id,
			response_type,
			redirect_uri,
			scope: None,
			state: Some(generate_state()),
			nonce: Some(generate_state()),
			code_verifier: Some(verifier),
			code_verifier_challenge: Some(challenge),
			code_verifier_challenge_method: Some(CODE_CHALLENGE_METHOD_S256.into()),
			display: None,
			login_hint: None,
			prompt: None,
			response_mode: None,
			additional_parameters: BTreeMap::new(),
		}
	}

	/// Sets the scope string verbatim.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Joins individual scopes into the space-delimited scope string.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let joined = scopes.into_iter().map(Into::into).collect::<Vec<_>>().join(" ");

		self.scope = if joined.is_empty() { None } else { Some(joined) };

		self
	}

	/// Overrides the generated state value.
	pub fn state(mut self, state: impl Into<String>) -> Self {
		self.state = Some(state.into());

		self
	}

	/// Removes the state parameter entirely.
	pub fn without_state(mut self) -> Self {
		self.state = None;

		self
	}

	/// Overrides the generated nonce value.
	pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
		self.nonce = Some(nonce.into());

		self
	}

	/// Removes the nonce parameter entirely.
	pub fn without_nonce(mut self) -> Self {
		self.nonce = None;

		self
	}

	/// Supplies a caller-managed PKCE verifier; the S256 challenge is derived.
	pub fn code_verifier(mut self, verifier: impl Into<String>) -> Self {
		let verifier = verifier.into();
		let challenge = derive_code_challenge(&verifier);

		self.code_verifier = Some(verifier);
		self.code_verifier_challenge = Some(challenge);
		self.code_verifier_challenge_method = Some(CODE_CHALLENGE_METHOD_S256.into());

		self
	}

	/// Disables PKCE for providers that cannot handle it.
	pub fn without_pkce(mut self) -> Self {
		self.code_verifier = None;
		self.code_verifier_challenge = None;
		self.code_verifier_challenge_method = None;

		self
	}

	/// Sets the OpenID Connect `display` hint.
	pub fn display(mut self, display: impl Into<String>) -> Self {
		self.display = Some(display.into());

		self
	}

	/// Sets the OpenID Connect `login_hint`.
	pub fn login_hint(mut self, login_hint: impl Into<String>) -> Self {
		self.login_hint = Some(login_hint.into());

		self
	}

	/// Sets the OpenID Connect `prompt` directive.
	pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
		self.prompt = Some(prompt.into());

		self
	}

	/// Sets the OAuth 2.0 `response_mode` override.
	pub fn response_mode(mut self, response_mode: impl Into<String>) -> Self {
		self.response_mode = Some(response_mode.into());

		self
	}

	/// Adds one provider-specific parameter.
	pub fn additional_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.additional_parameters.insert(name.into(), value.into());

		self
	}

	/// Replaces all provider-specific parameters.
	pub fn additional_parameters(mut self, params: BTreeMap<String, String>) -> Self {
		self.additional_parameters = params;

		self
	}

	/// Runs every invariant check and produces the immutable request.
	pub fn build(self) -> Result<AuthorizationRequest, RequestBuilderError> {
		if self.client_id.is_empty() {
			return Err(RequestBuilderError::EmptyClientId);
		}
		if self.response_type.is_empty() {
			return Err(RequestBuilderError::EmptyResponseType);
		}
		if let Some(verifier) = &self.code_verifier {
			validate_code_verifier(verifier)?;
		}

		check_additional_parameters(
			&self.additional_parameters,
			RESERVED_AUTHORIZATION_PARAMETERS,
		)?;

		Ok(AuthorizationRequest {
			configuration: self.configuration,
			client_id: self.client_id,
			response_type: self.response_type,
			redirect_uri: self.redirect_uri,
			scope: self.scope,
			state: self.state,
			nonce: self.nonce,
			code_verifier: self.code_verifier,
			code_verifier_challenge: self.code_verifier_challenge,
			code_verifier_challenge_method: self.code_verifier_challenge_method,
			display: self.display,
			login_hint: self.login_hint,
			prompt: self.prompt,
			response_mode: self.response_mode,
			additional_parameters: self.additional_parameters,
		})
	}
}

fn validate_code_verifier(verifier: &str) -> Result<(), RequestBuilderError> {
	if verifier.len() < CODE_VERIFIER_MIN_LEN {
		return Err(RequestBuilderError::InvalidCodeVerifier { reason: "shorter than 43 characters" });
	}
	if verifier.len() > CODE_VERIFIER_MAX_LEN {
		return Err(RequestBuilderError::InvalidCodeVerifier { reason: "longer than 128 characters" });
	}
	if !verifier.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')) {
		return Err(RequestBuilderError::InvalidCodeVerifier {
			reason: "contains characters outside the unreserved set",
		});
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn test_configuration() -> AuthorizationServiceConfiguration {
		AuthorizationServiceConfiguration::new(
			Url::parse("https://idp.example.com/authorize").expect("Fixture URL should parse."),
			Url::parse("https://idp.example.com/token").expect("Fixture URL should parse."),
		)
	}

	fn test_builder() -> AuthorizationRequestBuilder {
		AuthorizationRequest::builder(
			test_configuration(),
			"test_client_id",
			"code",
			Url::parse("https://app.example.com/cb").expect("Redirect URI fixture should parse."),
		)
	}

	#[test]
	fn builder_generates_state_nonce_and_pkce_by_default() {
		let request = test_builder().build().expect("Default builder should succeed.");

		assert!(request.state.is_some());
		assert!(request.nonce.is_some());

		let verifier =
			request.code_verifier.as_deref().expect("Code verifier should be generated.");
		let challenge = request
			.code_verifier_challenge
			.as_deref()
			.expect("Code challenge should be generated.");

		assert_eq!(challenge, derive_code_challenge(verifier));
		assert_eq!(
			request.code_verifier_challenge_method.as_deref(),
			Some(CODE_CHALLENGE_METHOD_S256),
		);
	}

	#[test]
	fn pkce_challenge_matches_rfc7636_appendix_b() {
		// Test vector from RFC 7636 Appendix B.
		assert_eq!(
			derive_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
		);
	}

	#[test]
	fn reserved_additional_parameter_fails_build() {
		let err = test_builder()
			.additional_parameter("scope", "injected")
			.build()
			.expect_err("Reserved parameter should fail the build.");

		assert_eq!(err, RequestBuilderError::ReservedParameter { name: "scope".into() });
	}

	#[test]
	fn empty_client_id_fails_build() {
		let err = AuthorizationRequest::builder(
			test_configuration(),
			"",
			"code",
			Url::parse("https://app.example.com/cb").expect("Redirect URI fixture should parse."),
		)
		.build()
		.expect_err("Empty client id should fail the build.");

		assert_eq!(err, RequestBuilderError::EmptyClientId);
	}

	#[test]
	fn short_code_verifier_fails_build() {
		let err = test_builder()
			.code_verifier("too-short")
			.build()
			.expect_err("Short verifier should fail the build.");

		assert!(matches!(err, RequestBuilderError::InvalidCodeVerifier { .. }));
	}

	#[test]
	fn uri_carries_every_populated_field() {
		let request = test_builder()
			.scopes(["openid", "profile"])
			.state("state-1")
			.nonce("nonce-1")
			.login_hint("user@example.com")
			.additional_parameter("audience", "api://default")
			.build()
			.expect("Builder should succeed.");
		let uri = request.to_uri();
		let query: BTreeMap<String, String> = uri.query_pairs().into_owned().collect();

		assert_eq!(query.get("client_id").map(String::as_str), Some("test_client_id"));
		assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(query.get("scope").map(String::as_str), Some("openid profile"));
		assert_eq!(query.get("state").map(String::as_str), Some("state-1"));
		assert_eq!(query.get("nonce").map(String::as_str), Some("nonce-1"));
		assert_eq!(query.get("login_hint").map(String::as_str), Some("user@example.com"));
		assert_eq!(query.get("audience").map(String::as_str), Some("api://default"));
		assert_eq!(
			query.get("code_challenge_method").map(String::as_str),
			Some(CODE_CHALLENGE_METHOD_S256),
		);
		assert!(query.contains_key("code_challenge"));
		assert!(!query.contains_key("code_verifier"), "Verifier must stay client-side.");
	}

	#[test]
	fn request_round_trips_through_serde() {
		let request = test_builder()
			.scopes(["openid"])
			.additional_parameter("audience", "api://default")
			.build()
			.expect("Builder should succeed.");
		let json = serde_json::to_string(&request).expect("Request should serialize.");
		let back: AuthorizationRequest =
			serde_json::from_str(&json).expect("Request should deserialize.");

		assert_eq!(request, back);
		assert_eq!(json, serde_json::to_string(&back).expect("Round trip should serialize."));
	}
}

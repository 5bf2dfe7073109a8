//! Token endpoint request construction and wire parameter assembly.

// self
use crate::{
	_prelude::*,
	config::AuthorizationServiceConfiguration,
	error::RequestBuilderError,
	request::check_additional_parameters,
};

/// Parameter names owned by [`TokenRequest`] and the client authentication
/// layer; additional parameters must not collide with these.
pub const RESERVED_TOKEN_PARAMETERS: &[&str] = &[
	"client_id",
	"client_secret",
	"code",
	"code_verifier",
	"grant_type",
	"redirect_uri",
	"refresh_token",
	"scope",
];

/// OAuth 2.0 grant type carried by a token request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantType {
	/// `authorization_code` exchange.
	AuthorizationCode,
	/// `refresh_token` grant.
	RefreshToken,
	/// Any other registered grant identifier, carried verbatim.
	Other(String),
}
impl GrantType {
	/// Returns the wire identifier for the grant.
	pub fn as_str(&self) -> &str {
		match self {
			Self::AuthorizationCode => "authorization_code",
			Self::RefreshToken => "refresh_token",
			Self::Other(value) => value,
		}
	}

	/// Classifies a wire identifier.
	pub fn from_wire(value: &str) -> Self {
		match value {
			"authorization_code" => Self::AuthorizationCode,
			"refresh_token" => Self::RefreshToken,
			other => Self::Other(other.to_owned()),
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl Serialize for GrantType {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}
impl<'de> Deserialize<'de> for GrantType {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;

		Ok(Self::from_wire(&value))
	}
}

/// Immutable record of one token endpoint exchange intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRequest {
	/// Service configuration the request targets.
	pub configuration: AuthorizationServiceConfiguration,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Grant type driving the exchange.
	pub grant_type: GrantType,
	/// Authorization code (authorization code grant only).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authorization_code: Option<String>,
	/// Redirect URI used during authorization (authorization code grant only).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub redirect_uri: Option<Url>,
	/// Requested scope string, when narrowing or re-asserting scopes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Refresh token (refresh token grant only).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
	/// PKCE code verifier proving possession of the authorization code.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code_verifier: Option<String>,
	/// Nonce from the originating authorization request, carried forward so
	/// the returned ID token can be validated; never sent on the wire.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// Provider-specific parameters; never collide with reserved names.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub additional_parameters: BTreeMap<String, String>,
}
impl TokenRequest {
	/// Returns a builder for the provided configuration, client, and grant.
	pub fn builder(
		configuration: AuthorizationServiceConfiguration,
		client_id: impl Into<String>,
		grant_type: GrantType,
	) -> TokenRequestBuilder {
		TokenRequestBuilder::new(configuration, client_id.into(), grant_type)
	}

	/// Assembles the url-form-encoded body parameters for the exchange.
	///
	/// Client authentication fields (`client_id`/`client_secret`) are absent
	/// here; the active [`ClientAuthentication`](crate::auth::ClientAuthentication)
	/// strategy supplies them.
	pub fn request_parameters(&self) -> BTreeMap<String, String> {
		let mut params = BTreeMap::new();

		params.insert("grant_type".to_string(), self.grant_type.as_str().to_owned());

		if let Some(code) = &self.authorization_code {
			params.insert("code".to_string(), code.clone());
		}
		if let Some(redirect_uri) = &self.redirect_uri {
			params.insert("redirect_uri".to_string(), redirect_uri.to_string());
		}
		if let Some(code_verifier) = &self.code_verifier {
			params.insert("code_verifier".to_string(), code_verifier.clone());
		}
		if let Some(refresh_token) = &self.refresh_token {
			params.insert("refresh_token".to_string(), refresh_token.clone());
		}
		if let Some(scope) = &self.scope {
			params.insert("scope".to_string(), scope.clone());
		}

		for (name, value) in &self.additional_parameters {
			params.insert(name.clone(), value.clone());
		}

		params
	}
}

/// Builder for [`TokenRequest`].
#[derive(Clone, Debug)]
pub struct TokenRequestBuilder {
	configuration: AuthorizationServiceConfiguration,
	client_id: String,
	grant_type: GrantType,
	authorization_code: Option<String>,
	redirect_uri: Option<Url>,
	scope: Option<String>,
	refresh_token: Option<String>,
	code_verifier: Option<String>,
	nonce: Option<String>,
	additional_parameters: BTreeMap<String, String>,
}
impl TokenRequestBuilder {
	fn new(
		configuration: AuthorizationServiceConfiguration,
		client_id: String,
		grant_type: GrantType,
	) -> Self {
		Self {
			configuration,
			client_id,
			grant_type,
			authorization_code: None,
			redirect_uri: None,
			scope: None,
			refresh_token: None,
			code_verifier: None,
			nonce: None,
			additional_parameters: BTreeMap::new(),
		}
	}

	/// Sets the authorization code to exchange.
	pub fn authorization_code(mut self, code: impl Into<String>) -> Self {
		self.authorization_code = Some(code.into());

		self
	}

	/// Sets the redirect URI the code was delivered to.
	pub fn redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	/// Sets the scope string verbatim.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Sets the refresh token for the refresh grant.
	pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(refresh_token.into());

		self
	}

	/// Sets the PKCE code verifier.
	pub fn code_verifier(mut self, code_verifier: impl Into<String>) -> Self {
		self.code_verifier = Some(code_verifier.into());

		self
	}

	/// Carries the authorization request's nonce for ID token validation.
	pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
		self.nonce = Some(nonce.into());

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

	/// Runs grant-specific invariant checks and produces the immutable request.
	pub fn build(self) -> Result<TokenRequest, RequestBuilderError> {
		if self.client_id.is_empty() {
			return Err(RequestBuilderError::EmptyClientId);
		}

		match self.grant_type {
			GrantType::AuthorizationCode => {
				if self.authorization_code.is_none() {
					return Err(RequestBuilderError::MissingAuthorizationCode);
				}
				if self.redirect_uri.is_none() {
					return Err(RequestBuilderError::MissingRedirectUri);
				}
			},
			GrantType::RefreshToken =>
				if self.refresh_token.is_none() {
					return Err(RequestBuilderError::MissingRefreshToken);
				},
			GrantType::Other(_) => {},
		}

		check_additional_parameters(&self.additional_parameters, RESERVED_TOKEN_PARAMETERS)?;

		Ok(TokenRequest {
			configuration: self.configuration,
			client_id: self.client_id,
			grant_type: self.grant_type,
			authorization_code: self.authorization_code,
			redirect_uri: self.redirect_uri,
			scope: self.scope,
			refresh_token: self.refresh_token,
			code_verifier: self.code_verifier,
			nonce: self.nonce,
			additional_parameters: self.additional_parameters,
		})
	}
}

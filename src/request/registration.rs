//! Dynamic client registration request construction.

// crates.io
use serde_json::{Map as JsonMap, Value, json};
// self
use crate::{
	_prelude::*,
	config::AuthorizationServiceConfiguration,
	error::RequestBuilderError,
	request::check_additional_parameters,
};

/// Parameter names owned by [`RegistrationRequest`] itself; additional
/// parameters must not collide with these.
pub const RESERVED_REGISTRATION_PARAMETERS: &[&str] = &[
	"application_type",
	"grant_types",
	"jwks",
	"jwks_uri",
	"redirect_uris",
	"response_types",
	"subject_type",
	"token_endpoint_auth_method",
];

/// `application_type` value for native clients.
pub const APPLICATION_TYPE_NATIVE: &str = "native";

/// Immutable record of one dynamic client registration intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
	/// Service configuration the request targets; must carry a registration
	/// endpoint.
	pub configuration: AuthorizationServiceConfiguration,
	/// Redirect URIs to register; at least one is required.
	pub redirect_uris: Vec<Url>,
	/// OpenID Connect `application_type`, defaulting to `native`.
	pub application_type: String,
	/// `response_type` values the client will use.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response_types: Option<Vec<String>>,
	/// Grant types the client will use.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub grant_types: Option<Vec<String>>,
	/// Requested subject identifier type.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subject_type: Option<String>,
	/// Requested token endpoint authentication method.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint_auth_method: Option<String>,
	/// Client JSON Web Key Set document location.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwks_uri: Option<Url>,
	/// Inline client JSON Web Key Set.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwks: Option<Value>,
	/// Provider-specific parameters; never collide with reserved names.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub additional_parameters: BTreeMap<String, String>,
}
impl RegistrationRequest {
	/// Returns a builder registering the provided redirect URIs.
	pub fn builder(
		configuration: AuthorizationServiceConfiguration,
		redirect_uris: Vec<Url>,
	) -> RegistrationRequestBuilder {
		RegistrationRequestBuilder::new(configuration, redirect_uris)
	}

	/// Serializes the registration POST body.
	pub fn to_json_body(&self) -> Value {
		let mut body = JsonMap::new();

		body.insert(
			"redirect_uris".into(),
			json!(self.redirect_uris.iter().map(Url::as_str).collect::<Vec<_>>()),
		);
		body.insert("application_type".into(), json!(self.application_type));

		if let Some(response_types) = &self.response_types {
			body.insert("response_types".into(), json!(response_types));
		}
		if let Some(grant_types) = &self.grant_types {
			body.insert("grant_types".into(), json!(grant_types));
		}
		if let Some(subject_type) = &self.subject_type {
			body.insert("subject_type".into(), json!(subject_type));
		}
		if let Some(method) = &self.token_endpoint_auth_method {
			body.insert("token_endpoint_auth_method".into(), json!(method));
		}
		if let Some(jwks_uri) = &self.jwks_uri {
			body.insert("jwks_uri".into(), json!(jwks_uri.as_str()));
		}
		if let Some(jwks) = &self.jwks {
			body.insert("jwks".into(), jwks.clone());
		}

		for (name, value) in &self.additional_parameters {
			body.insert(name.clone(), json!(value));
		}

		Value::Object(body)
	}
}

/// Builder for [`RegistrationRequest`].
#[derive(Clone, Debug)]
pub struct RegistrationRequestBuilder {
	configuration: AuthorizationServiceConfiguration,
	redirect_uris: Vec<Url>,
	application_type: String,
	response_types: Option<Vec<String>>,
	grant_types: Option<Vec<String>>,
	subject_type: Option<String>,
	token_endpoint_auth_method: Option<String>,
	jwks_uri: Option<Url>,
	jwks: Option<Value>,
	additional_parameters: BTreeMap<String, String>,
}
impl RegistrationRequestBuilder {
	fn new(configuration: AuthorizationServiceConfiguration, redirect_uris: Vec<Url>) -> Self {
		Self {
			configuration,
			redirect_uris,
			application_type: APPLICATION_TYPE_NATIVE.into(),
			response_types: None,
			grant_types: None,
			subject_type: None,
			token_endpoint_auth_method: None,
			jwks_uri: None,
			jwks: None,
			additional_parameters: BTreeMap::new(),
		}
	}

	/// Overrides the `application_type`.
	pub fn application_type(mut self, application_type: impl Into<String>) -> Self {
		self.application_type = application_type.into();

		self
	}

	/// Declares the `response_type` values the client will use.
	pub fn response_types<I, S>(mut self, response_types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.response_types = Some(response_types.into_iter().map(Into::into).collect());

		self
	}

	/// Declares the grant types the client will use.
	pub fn grant_types<I, S>(mut self, grant_types: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.grant_types = Some(grant_types.into_iter().map(Into::into).collect());

		self
	}

	/// Requests a subject identifier type.
	pub fn subject_type(mut self, subject_type: impl Into<String>) -> Self {
		self.subject_type = Some(subject_type.into());

		self
	}

	/// Requests a token endpoint authentication method.
	pub fn token_endpoint_auth_method(mut self, method: impl Into<String>) -> Self {
		self.token_endpoint_auth_method = Some(method.into());

		self
	}

	/// Points the provider at the client's JSON Web Key Set.
	pub fn jwks_uri(mut self, jwks_uri: Url) -> Self {
		self.jwks_uri = Some(jwks_uri);

		self
	}

	/// Embeds the client's JSON Web Key Set inline.
	pub fn jwks(mut self, jwks: Value) -> Self {
		self.jwks = Some(jwks);

		self
	}

	/// Adds one provider-specific parameter.
	pub fn additional_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.additional_parameters.insert(name.into(), value.into());

		self
	}

	/// Runs every invariant check and produces the immutable request.
	pub fn build(self) -> Result<RegistrationRequest, RequestBuilderError> {
		if self.redirect_uris.is_empty() {
			return Err(RequestBuilderError::NoRedirectUris);
		}
		if self.configuration.registration_endpoint.is_none() {
			return Err(RequestBuilderError::MissingRegistrationEndpoint);
		}

		check_additional_parameters(&self.additional_parameters, RESERVED_REGISTRATION_PARAMETERS)?;

		Ok(RegistrationRequest {
			configuration: self.configuration,
			redirect_uris: self.redirect_uris,
			application_type: self.application_type,
			response_types: self.response_types,
			grant_types: self.grant_types,
			subject_type: self.subject_type,
			token_endpoint_auth_method: self.token_endpoint_auth_method,
			jwks_uri: self.jwks_uri,
			jwks: self.jwks,
			additional_parameters: self.additional_parameters,
		})
	}
}

//! RP-initiated logout request construction.

// self
use crate::{
	_prelude::*,
	config::AuthorizationServiceConfiguration,
	error::RequestBuilderError,
	request::{check_additional_parameters, random_string},
};

/// Parameter names owned by [`EndSessionRequest`] itself; additional
/// parameters must not collide with these.
pub const RESERVED_END_SESSION_PARAMETERS: &[&str] =
	&["id_token_hint", "post_logout_redirect_uri", "state", "ui_locales"];

/// Immutable record of one RP-initiated logout intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndSessionRequest {
	/// Service configuration the request targets; must carry an end session
	/// endpoint.
	pub configuration: AuthorizationServiceConfiguration,
	/// ID token identifying the session to terminate.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token_hint: Option<String>,
	/// Where the provider should send the user agent after logout.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub post_logout_redirect_uri: Option<Url>,
	/// Opaque value echoed back on the post-logout redirect.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<String>,
	/// Preferred display languages for the logout page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ui_locales: Option<String>,
	/// Provider-specific parameters; never collide with reserved names.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub additional_parameters: BTreeMap<String, String>,
}
impl EndSessionRequest {
	/// Returns a builder seeded with a random `state`.
	pub fn builder(configuration: AuthorizationServiceConfiguration) -> EndSessionRequestBuilder {
		EndSessionRequestBuilder::new(configuration)
	}

	/// Renders the logout URI to open in the user agent.
	///
	/// Returns an error only when the configuration lost its end session
	/// endpoint after the request was built, which deserialization of a
	/// hand-edited snapshot can produce.
	pub fn to_uri(&self) -> Result<Url, RequestBuilderError> {
		let mut uri = self
			.configuration
			.end_session_endpoint
			.clone()
			.ok_or(RequestBuilderError::MissingEndSessionEndpoint)?;

		{
			let mut pairs = uri.query_pairs_mut();

			if let Some(id_token_hint) = &self.id_token_hint {
				pairs.append_pair("id_token_hint", id_token_hint);
			}
			if let Some(post_logout_redirect_uri) = &self.post_logout_redirect_uri {
				pairs.append_pair("post_logout_redirect_uri", post_logout_redirect_uri.as_str());
			}
			if let Some(state) = &self.state {
				pairs.append_pair("state", state);
			}
			if let Some(ui_locales) = &self.ui_locales {
				pairs.append_pair("ui_locales", ui_locales);
			}

			for (name, value) in &self.additional_parameters {
				pairs.append_pair(name, value);
			}
		}

		Ok(uri)
	}
}

/// Builder for [`EndSessionRequest`].
#[derive(Clone, Debug)]
pub struct EndSessionRequestBuilder {
	configuration: AuthorizationServiceConfiguration,
	id_token_hint: Option<String>,
	post_logout_redirect_uri: Option<Url>,
	state: Option<String>,
	ui_locales: Option<String>,
	additional_parameters: BTreeMap<String, String>,
}
impl EndSessionRequestBuilder {
	fn new(configuration: AuthorizationServiceConfiguration) -> Self {
		Self {
			configuration,
			id_token_hint: None,
			post_logout_redirect_uri: None,
			state: Some(random_string(32)),
			ui_locales: None,
			additional_parameters: BTreeMap::new(),
		}
	}

	/// Identifies the session to terminate.
	pub fn id_token_hint(mut self, id_token_hint: impl Into<String>) -> Self {
		self.id_token_hint = Some(id_token_hint.into());

		self
	}

	/// Sets where the provider should return the user agent after logout.
	pub fn post_logout_redirect_uri(mut self, uri: Url) -> Self {
		self.post_logout_redirect_uri = Some(uri);

		self
	}

	/// Replaces the generated `state`.
	pub fn state(mut self, state: impl Into<String>) -> Self {
		self.state = Some(state.into());

		self
	}

	/// Drops the `state` parameter entirely.
	pub fn without_state(mut self) -> Self {
		self.state = None;

		self
	}

	/// Sets the preferred display languages for the logout page.
	pub fn ui_locales(mut self, ui_locales: impl Into<String>) -> Self {
		self.ui_locales = Some(ui_locales.into());

		self
	}

	/// Adds one provider-specific parameter.
	pub fn additional_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.additional_parameters.insert(name.into(), value.into());

		self
	}

	/// Runs every invariant check and produces the immutable request.
	pub fn build(self) -> Result<EndSessionRequest, RequestBuilderError> {
		if self.configuration.end_session_endpoint.is_none() {
			return Err(RequestBuilderError::MissingEndSessionEndpoint);
		}

		check_additional_parameters(&self.additional_parameters, RESERVED_END_SESSION_PARAMETERS)?;

		Ok(EndSessionRequest {
			configuration: self.configuration,
			id_token_hint: self.id_token_hint,
			post_logout_redirect_uri: self.post_logout_redirect_uri,
			state: self.state,
			ui_locales: self.ui_locales,
			additional_parameters: self.additional_parameters,
		})
	}
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
		.with_end_session_endpoint(
			Url::parse("https://idp.example.com/logout").expect("Fixture URL should parse."),
		)
	}

	#[test]
	fn end_session_requires_endpoint() {
		let bare = AuthorizationServiceConfiguration::new(
			Url::parse("https://idp.example.com/authorize").expect("Fixture URL should parse."),
			Url::parse("https://idp.example.com/token").expect("Fixture URL should parse."),
		);
		let err = EndSessionRequest::builder(bare)
			.build()
			.expect_err("Missing end session endpoint should fail the build.");

		assert_eq!(err, RequestBuilderError::MissingEndSessionEndpoint);
	}

	#[test]
	fn logout_uri_carries_all_populated_fields() {
		let request = EndSessionRequest::builder(test_configuration())
			.id_token_hint("header.claims.sig")
			.post_logout_redirect_uri(
				Url::parse("https://app.example.com/bye").expect("Fixture URL should parse."),
			)
			.state("logout-state")
			.ui_locales("en-GB en")
			.additional_parameter("client_id", "client-1")
			.build()
			.expect("Builder should succeed.");
		let uri = request.to_uri().expect("Logout URI should render.");
		let pairs: BTreeMap<_, _> = uri.query_pairs().into_owned().collect();

		assert_eq!(uri.host_str(), Some("idp.example.com"));
		assert_eq!(uri.path(), "/logout");
		assert_eq!(pairs.get("id_token_hint").map(String::as_str), Some("header.claims.sig"));
		assert_eq!(
			pairs.get("post_logout_redirect_uri").map(String::as_str),
			Some("https://app.example.com/bye"),
		);
		assert_eq!(pairs.get("state").map(String::as_str), Some("logout-state"));
		assert_eq!(pairs.get("ui_locales").map(String::as_str), Some("en-GB en"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
	}

	#[test]
	fn state_defaults_to_random_and_can_be_dropped() {
		let with_default =
			EndSessionRequest::builder(test_configuration()).build().expect("Builder should succeed.");

		assert_eq!(with_default.state.as_ref().map(String::len), Some(32));

		let without = EndSessionRequest::builder(test_configuration())
			.without_state()
			.build()
			.expect("Builder should succeed.");

		assert!(without.state.is_none());
	}
}

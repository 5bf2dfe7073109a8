//! Token and registration endpoint exchanges over an injected transport.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::ClientAuthentication,
	clock::Clock,
	error::{GeneralError, TokenRequestError},
	http::{HttpRequest, HttpResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::{GrantType, RegistrationRequest, TokenRequest},
	response::{RegistrationResponse, TokenResponse},
};

/// Executes protocol requests against the provider's endpoints.
///
/// The service is stateless; every call takes the full request so the same
/// instance can serve any number of sessions concurrently.
pub struct AuthorizationService<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
}
impl<T> AuthorizationService<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a service over the provided transport.
	pub fn new(transport: Arc<T>) -> Self {
		Self { transport }
	}

	/// The underlying transport.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Performs a token endpoint exchange (authorization code or refresh).
	///
	/// A JSON body carrying an `error` field maps to [`Error::Token`] whatever
	/// the HTTP status, since providers disagree on the status they pair with
	/// OAuth error bodies. A failure status without such a body maps to
	/// [`GeneralError::ServerError`].
	pub async fn perform_token_request(
		&self,
		request: &TokenRequest,
		client_authentication: &ClientAuthentication,
		clock: &dyn Clock,
	) -> Result<TokenResponse> {
		let kind = match request.grant_type {
			GrantType::RefreshToken => FlowKind::Refresh,
			_ => FlowKind::TokenExchange,
		};
		let span = FlowSpan::new(kind, "perform_token_request");

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let mut params = request.request_parameters();

				params.extend(client_authentication.request_parameters(&request.client_id));

				let body = form_urlencoded::Serializer::new(String::new())
					.extend_pairs(&params)
					.finish();
				let mut http_request = HttpRequest::post(request.configuration.token_endpoint.clone())
					.body(body.into_bytes())
					.header("Content-Type", "application/x-www-form-urlencoded");

				if let Some(headers) = client_authentication.request_headers(&request.client_id) {
					for (name, value) in headers {
						http_request = http_request.header(name, value);
					}
				}

				http_request = http_request.header_if_absent("Accept", "application/json");

				let response = self
					.transport
					.call(http_request)
					.await
					.map_err(|source| GeneralError::Network { endpoint: "token", source })?;

				if let Some(error) = oauth_error_body(&response) {
					return Err(TokenRequestError::from_oauth_parameters(
						error.error,
						error.error_description,
						error.error_uri,
					)
					.into());
				}
				if !response.is_success() {
					return Err(GeneralError::ServerError {
						endpoint: "token",
						status: response.status,
					}
					.into());
				}

				TokenResponse::from_json(request.clone(), &response.body, clock)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
		}

		result
	}

	/// Performs a dynamic client registration exchange.
	///
	/// Registration rejections map to [`GeneralError::RegistrationFailed`];
	/// they are not one of the persisted error categories.
	pub async fn perform_registration_request(
		&self,
		request: &RegistrationRequest,
	) -> Result<RegistrationResponse> {
		const KIND: FlowKind = FlowKind::Registration;

		let span = FlowSpan::new(KIND, "perform_registration_request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let endpoint = request
					.configuration
					.registration_endpoint
					.clone()
					.ok_or_else(|| {
						Error::illegal_state("configuration lost its registration endpoint")
					})?;
				let body = serde_json::to_vec(&request.to_json_body())
					.map_err(|err| Error::invalid_argument(err.to_string()))?;
				let http_request = HttpRequest::post(endpoint)
					.body(body)
					.header("Content-Type", "application/json")
					.header_if_absent("Accept", "application/json");
				let response = self
					.transport
					.call(http_request)
					.await
					.map_err(|source| GeneralError::Network { endpoint: "registration", source })?;

				if let Some(error) = oauth_error_body(&response) {
					return Err(GeneralError::RegistrationFailed {
						code: error.error,
						description: error.error_description,
					}
					.into());
				}
				if !response.is_success() {
					return Err(GeneralError::ServerError {
						endpoint: "registration",
						status: response.status,
					}
					.into());
				}

				RegistrationResponse::from_json(request.clone(), &response.body)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
impl<T> Clone for AuthorizationService<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { transport: self.transport.clone() }
	}
}
impl<T> Debug for AuthorizationService<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AuthorizationService(..)")
	}
}
#[cfg(feature = "reqwest")]
impl Default for AuthorizationService<crate::http::ReqwestTransport> {
	fn default() -> Self {
		Self::new(Arc::new(crate::http::ReqwestTransport::default()))
	}
}

#[derive(Debug, Deserialize)]
struct WireOauthError {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
	#[serde(default)]
	error_uri: Option<String>,
}

fn oauth_error_body(response: &HttpResponse) -> Option<WireOauthError> {
	serde_json::from_slice::<WireOauthError>(&response.body).ok()
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::Mutex as StdMutex;
	// self
	use super::*;
	use crate::{
		clock::FixedClock,
		config::AuthorizationServiceConfiguration,
		error::TokenErrorKind,
		http::TransportFuture,
	};

	struct CannedTransport {
		requests: StdMutex<Vec<HttpRequest>>,
		response: HttpResponse,
	}
	impl CannedTransport {
		fn new(status: u16, body: &str) -> Self {
			Self {
				requests: StdMutex::new(Vec::new()),
				response: HttpResponse { status, body: body.as_bytes().to_vec() },
			}
		}
	}
	impl HttpTransport for CannedTransport {
		fn call(&self, request: HttpRequest) -> TransportFuture<'_> {
			let response = self.response.clone();

			self.requests.lock().expect("Request log should lock.").push(request);

			Box::pin(async move { Ok(response) })
		}
	}

	fn refresh_request() -> TokenRequest {
		TokenRequest::builder(
			AuthorizationServiceConfiguration::new(
				Url::parse("https://idp.example.com/authorize").expect("Fixture URL should parse."),
				Url::parse("https://idp.example.com/token").expect("Fixture URL should parse."),
			),
			"test_client_id",
			GrantType::RefreshToken,
		)
		.refresh_token("refresh-1")
		.build()
		.expect("Request fixture should build.")
	}

	fn fixed_clock() -> FixedClock {
		FixedClock::new(OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Valid instant."))
	}

	#[tokio::test]
	async fn token_request_encodes_body_and_auth_header() {
		let transport = Arc::new(CannedTransport::new(
			200,
			r#"{"token_type": "Bearer", "access_token": "access-1", "expires_in": 60}"#,
		));
		let service = AuthorizationService::new(transport.clone());
		let auth = ClientAuthentication::ClientSecretBasic("test_client_secret".into());
		let response = service
			.perform_token_request(&refresh_request(), &auth, &fixed_clock())
			.await
			.expect("Token request should succeed.");

		assert_eq!(response.access_token.as_deref(), Some("access-1"));

		let requests = transport.requests.lock().expect("Request log should lock.");
		let sent = &requests[0];
		let body = String::from_utf8(sent.body.clone().expect("Body should be present."))
			.expect("Body should be UTF-8.");

		assert!(body.contains("grant_type=refresh_token"));
		assert!(body.contains("refresh_token=refresh-1"));
		assert!(!body.contains("client_secret"), "Basic auth must not leak into the body.");
		assert!(sent.has_header("Authorization"));
	}

	#[tokio::test]
	async fn oauth_error_body_maps_to_token_error() {
		let service = AuthorizationService::new(Arc::new(CannedTransport::new(
			400,
			r#"{"error": "invalid_grant", "error_description": "revoked"}"#,
		)));
		let err = service
			.perform_token_request(
				&refresh_request(),
				&ClientAuthentication::None,
				&fixed_clock(),
			)
			.await
			.expect_err("OAuth error body should map to a token error.");

		match err {
			Error::Token(inner) => {
				assert_eq!(inner.kind, TokenErrorKind::InvalidGrant);
				assert_eq!(inner.description.as_deref(), Some("revoked"));
			},
			other => panic!("Expected a token error, got {other:?}."),
		}
	}

	#[tokio::test]
	async fn failure_status_without_error_body_is_a_server_error() {
		let service =
			AuthorizationService::new(Arc::new(CannedTransport::new(502, "bad gateway")));
		let err = service
			.perform_token_request(
				&refresh_request(),
				&ClientAuthentication::None,
				&fixed_clock(),
			)
			.await
			.expect_err("Unstructured failure should be a server error.");

		assert!(matches!(
			err,
			Error::General(GeneralError::ServerError { endpoint: "token", status: 502 }),
		));
	}
}

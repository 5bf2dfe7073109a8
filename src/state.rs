//! Persisted session state and the fresh-token concurrency contract.

// self
use crate::{
	_prelude::*,
	auth::ClientAuthentication,
	clock::Clock,
	config::AuthorizationServiceConfiguration,
	error::{AuthorizationRequestError, TokenRequestError},
	http::HttpTransport,
	request::{GrantType, TokenRequest},
	response::{AuthorizationResponse, RegistrationResponse, TokenResponse},
	service::AuthorizationService,
};

/// How long before the recorded expiry an access token is already treated as
/// stale, absorbing clock skew and request latency.
pub const DEFAULT_EXPIRY_TOLERANCE: Duration = Duration::seconds(60);

/// Tokens handed to callers of
/// [`perform_action_with_fresh_tokens`](AuthState::perform_action_with_fresh_tokens).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreshTokens {
	/// Current access token, if the session holds one.
	pub access_token: Option<String>,
	/// Current ID token, if the session holds one.
	pub id_token: Option<String>,
}

/// Aggregated session state for one client/provider pair.
///
/// Designed to be shared as `Arc<AuthState>`: every field mutation is a
/// synchronous critical section behind a [`parking_lot::Mutex`], and the
/// refresh single-flight is serialized behind an [`async_lock::Mutex`] so a
/// suspension point never holds the field lock.
///
/// At most one protocol error (authorization or token category) is stored at
/// a time; recording one category clears the other, and any stored error
/// suppresses the token getters until a later update clears it.
#[derive(Debug)]
pub struct AuthState {
	fields: Mutex<StateFields>,
	refresh_guard: AsyncMutex<()>,
	refresh_state: Mutex<RefreshState>,
	expiry_tolerance: Duration,
}
impl AuthState {
	/// Creates an empty, unauthorized state.
	pub fn new() -> Self {
		Self::from_fields(StateFields::default(), DEFAULT_EXPIRY_TOLERANCE)
	}

	/// Creates an empty state pinned to a known service configuration.
	pub fn with_configuration(configuration: AuthorizationServiceConfiguration) -> Self {
		Self::from_fields(
			StateFields { configuration: Some(configuration), ..Default::default() },
			DEFAULT_EXPIRY_TOLERANCE,
		)
	}

	/// Creates a state seeded from a completed authorization redirect.
	pub fn from_authorization_response(response: AuthorizationResponse) -> Self {
		let state = Self::new();

		// Seeding cannot violate the update contract.
		let _ = state.update_after_authorization(Some(response), None);

		state
	}

	/// Overrides the expiry tolerance for this instance.
	pub fn with_expiry_tolerance(mut self, tolerance: Duration) -> Self {
		self.expiry_tolerance = tolerance;

		self
	}

	fn from_fields(fields: StateFields, expiry_tolerance: Duration) -> Self {
		Self {
			fields: Mutex::new(fields),
			refresh_guard: AsyncMutex::new(()),
			refresh_state: Mutex::new(RefreshState::default()),
			expiry_tolerance,
		}
	}

	/// Records the outcome of an authorization flow.
	///
	/// Exactly one of `response`/`error` must be provided. A response replaces
	/// the stored authorization response, clears any stored error, clears the
	/// stale token response, and forces the next token access through a
	/// refresh. An error is persisted only when it is an authorization-request
	/// rejection; ignorable failures (cancellation, network) leave the state
	/// untouched.
	pub fn update_after_authorization(
		&self,
		response: Option<AuthorizationResponse>,
		error: Option<Error>,
	) -> Result<()> {
		if response.is_some() == error.is_some() {
			return Err(Error::invalid_argument(
				"exactly one of response or error must be provided",
			));
		}

		let mut fields = self.fields.lock();

		if let Some(response) = response {
			fields.authorization_response = Some(response);
			fields.authorization_error = None;
			fields.token_response = None;
			fields.token_error = None;
			fields.needs_token_refresh_override = true;

			return Ok(());
		}
		if let Some(Error::Authorization(rejection)) = error {
			fields.authorization_error = Some(rejection);
			fields.token_error = None;
			fields.authorization_response = None;
			fields.token_response = None;
		}

		Ok(())
	}

	/// Records the outcome of a token endpoint exchange.
	///
	/// Exactly one of `response`/`error` must be provided. A response replaces
	/// the stored token response and clears any stored error; the refresh
	/// token is sticky and only replaced when the new response carries one. An
	/// error is persisted only when it is a token-request rejection.
	pub fn update_after_token_response(
		&self,
		response: Option<TokenResponse>,
		error: Option<Error>,
	) -> Result<()> {
		if response.is_some() == error.is_some() {
			return Err(Error::invalid_argument(
				"exactly one of response or error must be provided",
			));
		}

		let mut fields = self.fields.lock();

		if let Some(response) = response {
			if let Some(refresh_token) = &response.refresh_token {
				fields.refresh_token = Some(refresh_token.clone());
			}

			fields.token_response = Some(response);
			fields.token_error = None;
			fields.authorization_error = None;
			fields.needs_token_refresh_override = false;

			return Ok(());
		}
		if let Some(Error::Token(rejection)) = error {
			fields.token_error = Some(rejection);
			fields.authorization_error = None;
		}

		Ok(())
	}

	/// Records a completed dynamic client registration.
	///
	/// Registration has no interaction with the token or authorization state;
	/// it only provides the basis for [`client_authentication`](Self::client_authentication).
	pub fn update_after_registration(&self, response: RegistrationResponse) {
		self.fields.lock().registration_response = Some(response);
	}

	/// Current access token; token responses take precedence over tokens
	/// delivered on the authorization redirect. `None` while a protocol error
	/// is stored.
	pub fn access_token(&self) -> Option<String> {
		self.fields.lock().access_token().map(str::to_owned)
	}

	/// Absolute expiry of the current access token, when known.
	pub fn access_token_expiration(&self) -> Option<OffsetDateTime> {
		self.fields.lock().access_token_expiration()
	}

	/// Current ID token, with the same precedence and error suppression as
	/// [`access_token`](Self::access_token).
	pub fn id_token(&self) -> Option<String> {
		self.fields.lock().id_token().map(str::to_owned)
	}

	/// Sticky refresh token; survives token responses that do not rotate it.
	pub fn refresh_token(&self) -> Option<String> {
		self.fields.lock().refresh_token.clone()
	}

	/// Granted scope of the newest response that declared one.
	pub fn scope(&self) -> Option<String> {
		let fields = self.fields.lock();

		fields
			.token_response
			.as_ref()
			.and_then(|response| response.scope.clone())
			.or_else(|| {
				fields.authorization_response.as_ref().and_then(|response| response.scope.clone())
			})
	}

	/// Service configuration in effect, from the explicit configuration or the
	/// last authorization request.
	pub fn configuration(&self) -> Option<AuthorizationServiceConfiguration> {
		let fields = self.fields.lock();

		fields
			.configuration
			.clone()
			.or_else(|| {
				fields
					.authorization_response
					.as_ref()
					.map(|response| response.request.configuration.clone())
			})
	}

	/// Last successful authorization response.
	pub fn last_authorization_response(&self) -> Option<AuthorizationResponse> {
		self.fields.lock().authorization_response.clone()
	}

	/// Stored authorization rejection, if one is active.
	pub fn last_authorization_error(&self) -> Option<AuthorizationRequestError> {
		self.fields.lock().authorization_error.clone()
	}

	/// Last successful token response.
	pub fn last_token_response(&self) -> Option<TokenResponse> {
		self.fields.lock().token_response.clone()
	}

	/// Stored token rejection, if one is active.
	pub fn last_token_error(&self) -> Option<TokenRequestError> {
		self.fields.lock().token_error.clone()
	}

	/// Last successful registration response.
	pub fn last_registration_response(&self) -> Option<RegistrationResponse> {
		self.fields.lock().registration_response.clone()
	}

	/// Returns `true` when the session holds a usable credential: no stored
	/// protocol error and either an unexpired access token or an ID token.
	///
	/// An access token without a recorded expiry counts as authorized, and the
	/// expiry is compared against `now` directly; the preemptive tolerance
	/// window only drives [`needs_token_refresh`](Self::needs_token_refresh).
	pub fn is_authorized(&self, clock: &dyn Clock) -> bool {
		let fields = self.fields.lock();

		if fields.has_error() {
			return false;
		}

		let access_token_usable = fields.access_token().is_some()
			&& match fields.access_token_expiration() {
				Some(expiry) => clock.now() < expiry,
				None => true,
			};

		access_token_usable || fields.id_token().is_some()
	}

	/// Client authentication strategy derived from the stored registration.
	///
	/// Without a registration the client is treated as public.
	pub fn client_authentication(&self) -> Result<ClientAuthentication> {
		match &self.fields.lock().registration_response {
			Some(registration) => ClientAuthentication::for_registration(registration),
			None => Ok(ClientAuthentication::None),
		}
	}

	/// Returns `true` when the next token access should go through a refresh:
	/// the manual override is set, no access token or expiry is known, or the
	/// expiry lies within the configured tolerance.
	pub fn needs_token_refresh(&self, clock: &dyn Clock) -> bool {
		self.fields.lock().needs_refresh(clock, self.expiry_tolerance)
	}

	/// Sets or clears the manual refresh override.
	pub fn set_needs_token_refresh(&self, needs_refresh: bool) {
		self.fields.lock().needs_token_refresh_override = needs_refresh;
	}

	/// Derives the refresh-token grant request for this session.
	pub fn create_token_refresh_request(&self) -> Result<TokenRequest> {
		self.create_token_refresh_request_with_extra_params(BTreeMap::new())
	}

	/// Derives the refresh-token grant request, carrying provider-specific
	/// parameters.
	pub fn create_token_refresh_request_with_extra_params(
		&self,
		additional_parameters: BTreeMap<String, String>,
	) -> Result<TokenRequest> {
		let fields = self.fields.lock();
		let refresh_token = fields
			.refresh_token
			.clone()
			.ok_or_else(|| Error::illegal_state("no refresh token is available"))?;
		let request = fields
			.authorization_response
			.as_ref()
			.map(|response| &response.request)
			.ok_or_else(|| Error::illegal_state("no authorization response is available"))?;

		Ok(TokenRequest::builder(
			request.configuration.clone(),
			request.client_id.clone(),
			GrantType::RefreshToken,
		)
		.refresh_token(refresh_token)
		.additional_parameters(additional_parameters)
		.build()?)
	}

	/// Hands the caller tokens that are fresh at the time of the call,
	/// refreshing them first when needed.
	///
	/// The concurrency contract: a fresh cached token is returned immediately
	/// with zero network traffic, even under arbitrary concurrency. When a
	/// refresh is needed, exactly one request is in flight per instance;
	/// callers arriving during that window suspend on the guard and adopt the
	/// in-flight outcome, success or failure alike. The outcome is recorded
	/// into the state once, via the
	/// [`update_after_token_response`](Self::update_after_token_response)
	/// rules.
	pub async fn perform_action_with_fresh_tokens<T>(
		&self,
		service: &AuthorizationService<T>,
		client_authentication: &ClientAuthentication,
		additional_parameters: BTreeMap<String, String>,
		clock: &dyn Clock,
	) -> Result<FreshTokens>
	where
		T: ?Sized + HttpTransport,
	{
		// Fast path: never suspends, never touches the network.
		if !self.needs_token_refresh(clock) {
			return self.fresh_tokens();
		}

		let observed_epoch = self.refresh_state.lock().epoch;
		let _guard = self.refresh_guard.lock().await;

		{
			let refresh_state = self.refresh_state.lock();

			// A refresh completed while this caller waited on the guard; its
			// outcome covers this caller too.
			if refresh_state.epoch != observed_epoch
				&& let Some(outcome) = &refresh_state.outcome
			{
				return outcome.clone();
			}
		}

		// The state may have been updated through another path while waiting.
		if !self.needs_token_refresh(clock) {
			return self.fresh_tokens();
		}

		let outcome = self
			.run_refresh(service, client_authentication, additional_parameters, clock)
			.await;

		{
			let mut refresh_state = self.refresh_state.lock();

			refresh_state.epoch = refresh_state.epoch.wrapping_add(1);
			refresh_state.outcome = Some(outcome.clone());
		}

		outcome
	}

	async fn run_refresh<T>(
		&self,
		service: &AuthorizationService<T>,
		client_authentication: &ClientAuthentication,
		additional_parameters: BTreeMap<String, String>,
		clock: &dyn Clock,
	) -> Result<FreshTokens>
	where
		T: ?Sized + HttpTransport,
	{
		let request = self.create_token_refresh_request_with_extra_params(additional_parameters)?;

		match service.perform_token_request(&request, client_authentication, clock).await {
			Ok(response) => {
				self.update_after_token_response(Some(response), None)?;

				self.fresh_tokens()
			},
			Err(err) => {
				self.update_after_token_response(None, Some(err.clone()))?;

				Err(err)
			},
		}
	}

	fn fresh_tokens(&self) -> Result<FreshTokens> {
		let fields = self.fields.lock();
		let tokens = FreshTokens {
			access_token: fields.access_token().map(str::to_owned),
			id_token: fields.id_token().map(str::to_owned),
		};

		if tokens.access_token.is_none() && tokens.id_token.is_none() {
			return Err(Error::illegal_state("no tokens are available"));
		}

		Ok(tokens)
	}
}
impl Default for AuthState {
	fn default() -> Self {
		Self::new()
	}
}
impl Serialize for AuthState {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		let fields = self.fields.lock();
		let snapshot = StateSnapshot {
			configuration: fields.configuration.clone(),
			last_authorization_response: fields.authorization_response.clone(),
			last_authorization_error: fields.authorization_error.clone(),
			last_token_response: fields.token_response.clone(),
			last_token_error: fields.token_error.clone(),
			last_registration_response: fields.registration_response.clone(),
			refresh_token: fields.refresh_token.clone(),
			needs_token_refresh: fields.needs_token_refresh_override,
			expiry_tolerance: self.expiry_tolerance.whole_seconds(),
		};

		snapshot.serialize(serializer)
	}
}
impl<'de> Deserialize<'de> for AuthState {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let snapshot = StateSnapshot::deserialize(deserializer)?;
		let fields = StateFields {
			configuration: snapshot.configuration,
			authorization_response: snapshot.last_authorization_response,
			authorization_error: snapshot.last_authorization_error,
			token_response: snapshot.last_token_response,
			token_error: snapshot.last_token_error,
			registration_response: snapshot.last_registration_response,
			refresh_token: snapshot.refresh_token,
			needs_token_refresh_override: snapshot.needs_token_refresh,
		};

		Ok(Self::from_fields(fields, Duration::seconds(snapshot.expiry_tolerance)))
	}
}

#[derive(Debug, Default)]
struct StateFields {
	configuration: Option<AuthorizationServiceConfiguration>,
	authorization_response: Option<AuthorizationResponse>,
	authorization_error: Option<AuthorizationRequestError>,
	token_response: Option<TokenResponse>,
	token_error: Option<TokenRequestError>,
	registration_response: Option<RegistrationResponse>,
	refresh_token: Option<String>,
	needs_token_refresh_override: bool,
}
impl StateFields {
	fn has_error(&self) -> bool {
		self.authorization_error.is_some() || self.token_error.is_some()
	}

	fn access_token(&self) -> Option<&str> {
		if self.has_error() {
			return None;
		}

		self.token_response
			.as_ref()
			.and_then(|response| response.access_token.as_deref())
			.or_else(|| {
				self.authorization_response
					.as_ref()
					.and_then(|response| response.access_token.as_deref())
			})
	}

	fn access_token_expiration(&self) -> Option<OffsetDateTime> {
		if self.has_error() {
			return None;
		}

		match (&self.token_response, &self.authorization_response) {
			(Some(response), _) if response.access_token.is_some() =>
				response.access_token_expires_at,
			(_, Some(response)) if response.access_token.is_some() =>
				response.access_token_expires_at,
			_ => None,
		}
	}

	fn id_token(&self) -> Option<&str> {
		if self.has_error() {
			return None;
		}

		self.token_response
			.as_ref()
			.and_then(|response| response.id_token.as_deref())
			.or_else(|| {
				self.authorization_response
					.as_ref()
					.and_then(|response| response.id_token.as_deref())
			})
	}

	fn needs_refresh(&self, clock: &dyn Clock, tolerance: Duration) -> bool {
		if self.needs_token_refresh_override {
			return true;
		}
		if self.access_token().is_none() {
			return true;
		}

		match self.access_token_expiration() {
			Some(expiry) => clock.now() >= expiry - tolerance,
			None => true,
		}
	}
}

#[derive(Debug, Default)]
struct RefreshState {
	epoch: u64,
	outcome: Option<Result<FreshTokens>>,
}

#[derive(Serialize, Deserialize)]
struct StateSnapshot {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	configuration: Option<AuthorizationServiceConfiguration>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	last_authorization_response: Option<AuthorizationResponse>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	last_authorization_error: Option<AuthorizationRequestError>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	last_token_response: Option<TokenResponse>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	last_token_error: Option<TokenRequestError>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	last_registration_response: Option<RegistrationResponse>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<String>,
	needs_token_refresh: bool,
	expiry_tolerance: i64,
}

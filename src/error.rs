//! Session-level error taxonomy shared across requests, responses, and auth state.
//!
//! Errors fall into four categories with different persistence rules:
//! [`GeneralError`] values are surfaced to the caller of the failing operation
//! but never stored into [`AuthState`](crate::state::AuthState);
//! [`AuthorizationRequestError`] and [`TokenRequestError`] values represent
//! definitive protocol-level rejections and are persisted by the corresponding
//! state updates; everything else is a structural/precondition failure raised
//! synchronously at construction or validation time.
//!
//! Every type here is `Clone` so a single failed token refresh can be
//! broadcast to every caller coalesced onto the in-flight operation.

// self
use crate::_prelude::*;

/// Session-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical session error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Non-protocol failure; never persisted into auth state.
	#[error(transparent)]
	General(#[from] GeneralError),
	/// Authorization endpoint rejection delivered via the redirect.
	#[error(transparent)]
	Authorization(#[from] AuthorizationRequestError),
	/// Token endpoint rejection.
	#[error(transparent)]
	Token(#[from] TokenRequestError),
	/// Builder precondition violation.
	#[error(transparent)]
	Builder(#[from] RequestBuilderError),
	/// Response or document failed structural validation.
	#[error(transparent)]
	Validation(#[from] ResponseValidationError),
	/// ID token decode or claim validation failure.
	#[error(transparent)]
	IdToken(#[from] IdTokenError),
	/// Transport-level failure (DNS, TCP, TLS, I/O).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Registration response declared a token endpoint auth method this crate
	/// does not implement.
	#[error("Unsupported client authentication method `{method}`.")]
	UnsupportedAuthenticationMethod {
		/// The unrecognized `token_endpoint_auth_method` value.
		method: String,
	},
	/// Operation requires state that has not been established yet.
	#[error("Required state is not present: {reason}.")]
	IllegalState {
		/// What was missing.
		reason: String,
	},
	/// Caller supplied arguments that violate the operation's contract.
	#[error("Invalid argument: {reason}.")]
	InvalidArgument {
		/// Which contract was violated.
		reason: String,
	},
}
impl Error {
	/// Returns `true` for errors in the general category, which auth state
	/// updates ignore rather than persist (network failures, cancellations,
	/// malformed payloads).
	pub fn is_ignorable(&self) -> bool {
		matches!(self, Self::General(_) | Self::Transport(_))
	}

	/// Returns `true` when the error is a persisted authorization-request rejection.
	pub fn is_authorization_error(&self) -> bool {
		matches!(self, Self::Authorization(_))
	}

	/// Returns `true` when the error is a persisted token-request rejection.
	pub fn is_token_error(&self) -> bool {
		matches!(self, Self::Token(_))
	}

	pub(crate) fn illegal_state(reason: impl Into<String>) -> Self {
		Self::IllegalState { reason: reason.into() }
	}

	pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
		Self::InvalidArgument { reason: reason.into() }
	}
}

/// Failures that do not represent a definitive protocol rejection.
#[derive(Clone, Debug, ThisError)]
pub enum GeneralError {
	/// Transport failure while calling an endpoint.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label (`token`, `registration`, `discovery`).
		endpoint: &'static str,
		/// Underlying transport failure.
		#[source]
		source: TransportError,
	},
	/// Endpoint returned JSON that could not be deserialized.
	#[error("The {endpoint} endpoint returned malformed JSON at `{path}`: {message}.")]
	JsonDeserialization {
		/// Endpoint label.
		endpoint: &'static str,
		/// Path into the document where deserialization failed.
		path: String,
		/// Human-readable deserialization failure.
		message: String,
	},
	/// Endpoint returned a failure status without a recognizable OAuth error body.
	#[error("The {endpoint} endpoint returned HTTP {status} without an OAuth error body.")]
	ServerError {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
	},
	/// Fetched discovery document failed structural validation.
	#[error("Discovery document is invalid.")]
	InvalidDiscoveryDocument(#[source] ResponseValidationError),
	/// Registration endpoint rejected the request; not persisted because
	/// registration errors are not one of the stored categories.
	#[error("Registration endpoint rejected the request with `{code}`.")]
	RegistrationFailed {
		/// OAuth `error` code returned by the endpoint.
		code: String,
		/// Optional `error_description`.
		description: Option<String>,
	},
	/// End user cancelled the authorization flow.
	#[error("User cancelled the authorization flow.")]
	UserCancelledAuthFlow,
	/// Embedding application cancelled the authorization flow.
	#[error("Authorization flow was cancelled programmatically.")]
	ProgramCancelledAuthFlow,
}
impl GeneralError {
	pub(crate) fn json(
		endpoint: &'static str,
		err: serde_path_to_error::Error<serde_json::Error>,
	) -> Self {
		Self::JsonDeserialization {
			endpoint,
			path: err.path().to_string(),
			message: err.inner().to_string(),
		}
	}
}

/// Transport-level failures (network, I/O). Payloads are message strings so
/// the error stays `Clone` across coalesced waiters.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error: {message}.")]
	Network {
		/// Transport-specific failure description.
		message: String,
	},
	/// I/O failure surfaced during transport.
	#[error("I/O error: {message}.")]
	Io {
		/// I/O failure description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl Display) -> Self {
		Self::Network { message: src.to_string() }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io { message: e.to_string() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Classified authorization endpoint error codes (RFC 6749 §4.1.2.1), plus the
/// locally detected state mismatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationErrorKind {
	/// `invalid_request`.
	InvalidRequest,
	/// `unauthorized_client`.
	UnauthorizedClient,
	/// `access_denied`.
	AccessDenied,
	/// `unsupported_response_type`.
	UnsupportedResponseType,
	/// `invalid_scope`.
	InvalidScope,
	/// `server_error`.
	ServerError,
	/// `temporarily_unavailable`.
	TemporarilyUnavailable,
	/// Returned `state` did not match the request's anti-CSRF token.
	StateMismatch,
	/// Unrecognized error code; the raw code is preserved alongside.
	Other,
}
impl AuthorizationErrorKind {
	/// Classifies a wire error code.
	pub fn from_code(code: &str) -> Self {
		match code {
			"invalid_request" => Self::InvalidRequest,
			"unauthorized_client" => Self::UnauthorizedClient,
			"access_denied" => Self::AccessDenied,
			"unsupported_response_type" => Self::UnsupportedResponseType,
			"invalid_scope" => Self::InvalidScope,
			"server_error" => Self::ServerError,
			"temporarily_unavailable" => Self::TemporarilyUnavailable,
			_ => Self::Other,
		}
	}
}

/// Authorization endpoint rejection delivered on the redirect URI.
///
/// Persisted into [`AuthState`](crate::state::AuthState) by
/// `update_after_authorization`, so the type round-trips through serde.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Authorization request failed with `{code}`.")]
pub struct AuthorizationRequestError {
	/// Classified error kind.
	pub kind: AuthorizationErrorKind,
	/// Raw OAuth `error` code.
	pub code: String,
	/// Optional `error_description`.
	pub description: Option<String>,
	/// Optional `error_uri`.
	pub uri: Option<String>,
}
impl AuthorizationRequestError {
	/// Builds an error from the redirect's `error`/`error_description`/`error_uri`
	/// parameters.
	pub fn from_oauth_parameters(
		code: impl Into<String>,
		description: Option<String>,
		uri: Option<String>,
	) -> Self {
		let code = code.into();

		Self { kind: AuthorizationErrorKind::from_code(&code), code, description, uri }
	}

	/// Builds the locally detected anti-CSRF state mismatch error.
	pub fn state_mismatch() -> Self {
		Self {
			kind: AuthorizationErrorKind::StateMismatch,
			code: "state_mismatch".into(),
			description: Some("Returned state does not match the authorization request.".into()),
			uri: None,
		}
	}
}

/// Classified token endpoint error codes (RFC 6749 §5.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorKind {
	/// `invalid_request`.
	InvalidRequest,
	/// `invalid_client`.
	InvalidClient,
	/// `invalid_grant`.
	InvalidGrant,
	/// `unauthorized_client`.
	UnauthorizedClient,
	/// `unsupported_grant_type`.
	UnsupportedGrantType,
	/// `invalid_scope`.
	InvalidScope,
	/// Unrecognized error code; the raw code is preserved alongside.
	Other,
}
impl TokenErrorKind {
	/// Classifies a wire error code.
	pub fn from_code(code: &str) -> Self {
		match code {
			"invalid_request" => Self::InvalidRequest,
			"invalid_client" => Self::InvalidClient,
			"invalid_grant" => Self::InvalidGrant,
			"unauthorized_client" => Self::UnauthorizedClient,
			"unsupported_grant_type" => Self::UnsupportedGrantType,
			"invalid_scope" => Self::InvalidScope,
			_ => Self::Other,
		}
	}
}

/// Token endpoint rejection.
///
/// Persisted into [`AuthState`](crate::state::AuthState) by
/// `update_after_token_response`, so the type round-trips through serde.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("Token request failed with `{code}`.")]
pub struct TokenRequestError {
	/// Classified error kind.
	pub kind: TokenErrorKind,
	/// Raw OAuth `error` code.
	pub code: String,
	/// Optional `error_description`.
	pub description: Option<String>,
	/// Optional `error_uri`.
	pub uri: Option<String>,
}
impl TokenRequestError {
	/// Builds an error from the token endpoint's OAuth error body fields.
	pub fn from_oauth_parameters(
		code: impl Into<String>,
		description: Option<String>,
		uri: Option<String>,
	) -> Self {
		let code = code.into();

		Self { kind: TokenErrorKind::from_code(&code), code, description, uri }
	}
}

/// Builder precondition violations raised at `build()` time.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RequestBuilderError {
	/// Client identifier must be a non-empty string.
	#[error("Client id must not be empty.")]
	EmptyClientId,
	/// Response type must be a non-empty string.
	#[error("Response type must not be empty.")]
	EmptyResponseType,
	/// Additional parameter collides with a reserved protocol parameter.
	#[error("Additional parameter `{name}` collides with a reserved parameter name.")]
	ReservedParameter {
		/// The colliding parameter name.
		name: String,
	},
	/// Authorization code grant requires an authorization code.
	#[error("Authorization code exchange requires an authorization code.")]
	MissingAuthorizationCode,
	/// Authorization code grant requires a redirect URI.
	#[error("Authorization code exchange requires a redirect URI.")]
	MissingRedirectUri,
	/// Refresh token grant requires a refresh token.
	#[error("Refresh token grant requires a refresh token.")]
	MissingRefreshToken,
	/// Registration requests need at least one redirect URI.
	#[error("Registration requires at least one redirect URI.")]
	NoRedirectUris,
	/// Registration requests need a registration endpoint on the configuration.
	#[error("Service configuration does not declare a registration endpoint.")]
	MissingRegistrationEndpoint,
	/// End-session requests need an end-session endpoint on the configuration.
	#[error("Service configuration does not declare an end-session endpoint.")]
	MissingEndSessionEndpoint,
	/// PKCE code verifier violates RFC 7636 constraints.
	#[error("Code verifier is invalid: {reason}.")]
	InvalidCodeVerifier {
		/// Which RFC 7636 constraint failed.
		reason: &'static str,
	},
}

/// Structural validation failures for responses and documents.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ResponseValidationError {
	/// A required field is absent.
	#[error("Required field `{field}` is missing.")]
	MissingField {
		/// The missing field name.
		field: &'static str,
	},
	/// A field is present but malformed.
	#[error("Field `{field}` is invalid: {reason}.")]
	InvalidField {
		/// The malformed field name.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
}

/// ID token decode and claim validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdTokenError {
	/// Token structure could not be decoded (segment count, base64, JSON).
	#[error("ID token is malformed: {reason}.")]
	Malformed {
		/// Which structural rule failed.
		reason: &'static str,
	},
	/// A required claim is absent from the claims segment.
	#[error("ID token is missing the required `{claim}` claim.")]
	MissingClaim {
		/// The missing claim name.
		claim: &'static str,
	},
	/// A claim is present but has an unusable value.
	#[error("ID token claim `{claim}` is invalid.")]
	InvalidClaim {
		/// The malformed claim name.
		claim: &'static str,
	},
	/// Issuer claim does not match the discovery document's issuer.
	#[error("ID token issuer does not match the service configuration issuer.")]
	IssuerMismatch,
	/// Issuer is not an https URL.
	#[error("ID token issuer must use https.")]
	InsecureIssuer,
	/// Issuer URL is structurally invalid (host, query, fragment rules).
	#[error("ID token issuer URL is invalid: {reason}.")]
	InvalidIssuer {
		/// Which issuer URL rule failed.
		reason: &'static str,
	},
	/// Expiration is not in the future.
	#[error("ID token has expired.")]
	Expired,
	/// Issued-at is further in the past than the accepted tolerance.
	#[error("ID token issued-at time is outside the accepted tolerance.")]
	IssuedAtOutOfRange,
	/// Nonce does not echo the authorization request's nonce.
	#[error("ID token nonce does not match the request nonce.")]
	NonceMismatch,
	/// Audience does not include the client and no authorized party substitutes.
	#[error("ID token audience does not match the client id.")]
	AudienceMismatch,
	/// Multiple audiences without an authorized party claim naming the client.
	#[error("ID token has multiple audiences but no matching authorized party.")]
	AmbiguousAudience,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn general_errors_are_ignorable() {
		let err: Error = GeneralError::UserCancelledAuthFlow.into();

		assert!(err.is_ignorable());
		assert!(!err.is_authorization_error());
		assert!(!err.is_token_error());
	}

	#[test]
	fn oauth_codes_classify_and_preserve_raw_code() {
		let err = TokenRequestError::from_oauth_parameters("invalid_grant", None, None);

		assert_eq!(err.kind, TokenErrorKind::InvalidGrant);
		assert_eq!(err.code, "invalid_grant");

		let err = TokenRequestError::from_oauth_parameters("slow_down", None, None);

		assert_eq!(err.kind, TokenErrorKind::Other);
		assert_eq!(err.code, "slow_down");

		let err = AuthorizationRequestError::from_oauth_parameters("access_denied", None, None);

		assert_eq!(err.kind, AuthorizationErrorKind::AccessDenied);
	}

	#[test]
	fn persisted_errors_round_trip_through_serde() {
		let err = AuthorizationRequestError::state_mismatch();
		let json = serde_json::to_string(&err).expect("Authorization error should serialize.");
		let back: AuthorizationRequestError =
			serde_json::from_str(&json).expect("Authorization error should deserialize.");

		assert_eq!(err, back);
	}
}

//! ID token decoding and claim validation.
//!
//! Signature verification is delegated to the provider's TLS channel, the
//! standard posture for native clients exchanging codes directly with the
//! token endpoint; what is validated here is the claim set (OpenID Connect
//! Core §3.1.3.7).

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;
// self
use crate::{_prelude::*, clock::Clock, error::IdTokenError, request::TokenRequest};

/// How far in the past an `iat` claim may lie before the token is rejected.
pub const ISSUED_AT_TOLERANCE: Duration = Duration::minutes(10);

/// Decoded ID token claim set.
#[derive(Clone, Debug, PartialEq)]
pub struct IdToken {
	/// `iss` claim.
	pub issuer: String,
	/// `sub` claim.
	pub subject: String,
	/// `aud` claim; a bare string audience becomes a one-element list.
	pub audience: Vec<String>,
	/// `exp` claim as an absolute instant.
	pub expiration: OffsetDateTime,
	/// `iat` claim as an absolute instant.
	pub issued_at: OffsetDateTime,
	/// `nonce` claim, echoed from the authorization request.
	pub nonce: Option<String>,
	/// `azp` (authorized party) claim.
	pub authorized_party: Option<String>,
	/// Every other claim, verbatim.
	pub additional_claims: BTreeMap<String, Value>,
}
impl IdToken {
	/// Decodes the claims segment of a compact JWS serialization.
	pub fn from_compact(compact: &str) -> Result<Self, IdTokenError> {
		let segments = compact.split('.').collect::<Vec<_>>();

		if segments.len() < 2 || segments[0].is_empty() || segments[1].is_empty() {
			return Err(IdTokenError::Malformed {
				reason: "expected at least a header and a claims segment",
			});
		}

		let claims_json = URL_SAFE_NO_PAD
			.decode(segments[1])
			.map_err(|_| IdTokenError::Malformed { reason: "claims segment is not base64url" })?;
		let mut claims: BTreeMap<String, Value> = serde_json::from_slice(&claims_json)
			.map_err(|_| IdTokenError::Malformed { reason: "claims segment is not a JSON object" })?;
		let issuer = take_string(&mut claims, "iss")?;
		let subject = take_string(&mut claims, "sub")?;
		let audience = take_audience(&mut claims)?;
		let expiration = take_timestamp(&mut claims, "exp")?;
		let issued_at = take_timestamp(&mut claims, "iat")?;
		let nonce = take_optional_string(&mut claims, "nonce")?;
		let authorized_party = take_optional_string(&mut claims, "azp")?;

		Ok(Self {
			issuer,
			subject,
			audience,
			expiration,
			issued_at,
			nonce,
			authorized_party,
			additional_claims: claims,
		})
	}

	/// Validates the claim set against the token request that produced it.
	///
	/// Checks run in a fixed order and fail on the first violation: issuer
	/// equality against the discovery issuer, issuer URL structure, expiration,
	/// issued-at recency, nonce echo, audience membership (with `azp`
	/// substitution), and audience ambiguity. `skip_issuer_https_check` loosens
	/// only the https requirement, for test issuers on loopback.
	pub fn validate(
		&self,
		request: &TokenRequest,
		clock: &dyn Clock,
		skip_issuer_https_check: bool,
	) -> Result<()> {
		let expected = request
			.configuration
			.issuer()
			.ok_or_else(|| Error::illegal_state("configuration carries no issuer to validate against"))?;

		if self.issuer != expected {
			return Err(IdTokenError::IssuerMismatch.into());
		}

		let issuer = Url::parse(&self.issuer)
			.map_err(|_| IdTokenError::InvalidIssuer { reason: "not a valid URL" })?;

		if !skip_issuer_https_check && issuer.scheme() != "https" {
			return Err(IdTokenError::InsecureIssuer.into());
		}
		if issuer.host_str().is_none() {
			return Err(IdTokenError::InvalidIssuer { reason: "missing a host" }.into());
		}
		if issuer.query().is_some() || issuer.fragment().is_some() {
			return Err(
				IdTokenError::InvalidIssuer { reason: "must not carry a query or fragment" }.into()
			);
		}

		let now = clock.now().unix_timestamp();

		if self.expiration.unix_timestamp() <= now {
			return Err(IdTokenError::Expired.into());
		}
		if (now - self.issued_at.unix_timestamp()).abs() > ISSUED_AT_TOLERANCE.whole_seconds() {
			return Err(IdTokenError::IssuedAtOutOfRange.into());
		}
		if request.nonce.is_some() && self.nonce != request.nonce {
			return Err(IdTokenError::NonceMismatch.into());
		}

		let client_id = &request.client_id;

		if !self.audience.contains(client_id)
			&& self.authorized_party.as_ref() != Some(client_id)
		{
			return Err(IdTokenError::AudienceMismatch.into());
		}
		// Multiple audiences are acceptable only when `azp` names this client.
		if self.audience.len() > 1 && self.authorized_party.as_ref() != Some(client_id) {
			return Err(IdTokenError::AmbiguousAudience.into());
		}

		Ok(())
	}
}

fn take_string(
	claims: &mut BTreeMap<String, Value>,
	claim: &'static str,
) -> Result<String, IdTokenError> {
	match claims.remove(claim) {
		Some(Value::String(value)) => Ok(value),
		Some(_) => Err(IdTokenError::InvalidClaim { claim }),
		None => Err(IdTokenError::MissingClaim { claim }),
	}
}

fn take_optional_string(
	claims: &mut BTreeMap<String, Value>,
	claim: &'static str,
) -> Result<Option<String>, IdTokenError> {
	match claims.remove(claim) {
		Some(Value::String(value)) => Ok(Some(value)),
		Some(_) => Err(IdTokenError::InvalidClaim { claim }),
		None => Ok(None),
	}
}

fn take_timestamp(
	claims: &mut BTreeMap<String, Value>,
	claim: &'static str,
) -> Result<OffsetDateTime, IdTokenError> {
	let secs = claims
		.remove(claim)
		.ok_or(IdTokenError::MissingClaim { claim })?
		.as_i64()
		.ok_or(IdTokenError::InvalidClaim { claim })?;

	OffsetDateTime::from_unix_timestamp(secs).map_err(|_| IdTokenError::InvalidClaim { claim })
}

fn take_audience(claims: &mut BTreeMap<String, Value>) -> Result<Vec<String>, IdTokenError> {
	const CLAIM: &str = "aud";

	match claims.remove(CLAIM) {
		Some(Value::String(value)) => Ok(vec![value]),
		Some(Value::Array(values)) => values
			.into_iter()
			.map(|value| match value {
				Value::String(value) => Ok(value),
				_ => Err(IdTokenError::InvalidClaim { claim: CLAIM }),
			})
			.collect(),
		Some(_) => Err(IdTokenError::InvalidClaim { claim: CLAIM }),
		None => Err(IdTokenError::MissingClaim { claim: CLAIM }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		clock::FixedClock,
		config::{AuthorizationServiceConfiguration, DiscoveryDocument},
		request::GrantType,
	};

	const NOW: i64 = 1_700_000_000;

	fn encode_token(claims: &Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
		let body = URL_SAFE_NO_PAD.encode(claims.to_string());

		format!("{header}.{body}.sig")
	}

	fn base_claims() -> Value {
		serde_json::json!({
			"iss": "https://idp.example.com",
			"sub": "user-1",
			"aud": "test_client_id",
			"exp": NOW + 3600,
			"iat": NOW,
			"nonce": "nonce-1",
		})
	}

	fn test_request() -> TokenRequest {
		let discovery = DiscoveryDocument::from_json(
			r#"{
				"issuer": "https://idp.example.com",
				"authorization_endpoint": "https://idp.example.com/authorize",
				"token_endpoint": "https://idp.example.com/token",
				"jwks_uri": "https://idp.example.com/jwks",
				"response_types_supported": ["code"],
				"subject_types_supported": ["public"],
				"id_token_signing_alg_values_supported": ["RS256"]
			}"#,
		)
		.expect("Discovery fixture should validate.");

		TokenRequest::builder(
			AuthorizationServiceConfiguration::from_discovery(discovery),
			"test_client_id",
			GrantType::AuthorizationCode,
		)
		.authorization_code("code-1")
		.redirect_uri(Url::parse("https://app.example.com/cb").expect("Fixture should parse."))
		.nonce("nonce-1")
		.build()
		.expect("Request fixture should build.")
	}

	fn fixed_clock() -> FixedClock {
		FixedClock::new(OffsetDateTime::from_unix_timestamp(NOW).expect("Valid instant."))
	}

	#[test]
	fn valid_token_passes_every_check() {
		let token = IdToken::from_compact(&encode_token(&base_claims()))
			.expect("Well-formed token should decode.");

		assert_eq!(token.issuer, "https://idp.example.com");
		assert_eq!(token.audience, vec!["test_client_id".to_owned()]);

		token
			.validate(&test_request(), &fixed_clock(), false)
			.expect("Valid token should validate.");
	}

	#[test]
	fn structural_failures_are_malformed() {
		assert!(matches!(
			IdToken::from_compact("only-one-segment"),
			Err(IdTokenError::Malformed { .. }),
		));
		assert!(matches!(
			IdToken::from_compact("header.!!!not-base64!!!"),
			Err(IdTokenError::Malformed { .. }),
		));
	}

	#[test]
	fn each_required_claim_is_enforced() {
		for claim in ["iss", "sub", "aud", "exp", "iat"] {
			let mut claims = base_claims();

			claims.as_object_mut().expect("Claims fixture should be an object.").remove(claim);

			let err = IdToken::from_compact(&encode_token(&claims))
				.expect_err("Dropping a required claim should fail decoding.");

			assert_eq!(err, IdTokenError::MissingClaim { claim });
		}
	}

	#[test]
	fn authorized_party_disambiguates_multiple_audiences() {
		let mut claims = base_claims();

		claims["aud"] = serde_json::json!(["test_client_id", "other_client"]);
		claims["azp"] = "test_client_id".into();

		let token = IdToken::from_compact(&encode_token(&claims))
			.expect("List audience should decode.");

		assert_eq!(token.audience.len(), 2);

		token
			.validate(&test_request(), &fixed_clock(), false)
			.expect("Matching authorized party should disambiguate.");
	}

	#[test]
	fn ambiguous_audience_without_authorized_party_fails() {
		let mut claims = base_claims();

		claims["aud"] = serde_json::json!(["test_client_id", "other_client"]);

		let token = IdToken::from_compact(&encode_token(&claims))
			.expect("List audience should decode.");
		let err = token
			.validate(&test_request(), &fixed_clock(), false)
			.expect_err("Multiple audiences without azp should fail.");

		assert!(matches!(err, Error::IdToken(IdTokenError::AmbiguousAudience)));
	}

	#[test]
	fn mismatched_authorized_party_does_not_disambiguate() {
		let mut claims = base_claims();

		claims["aud"] = serde_json::json!(["test_client_id", "other_client"]);
		claims["azp"] = "someone_else".into();

		let token = IdToken::from_compact(&encode_token(&claims))
			.expect("List audience should decode.");
		let err = token
			.validate(&test_request(), &fixed_clock(), false)
			.expect_err("Multiple audiences with a foreign azp should fail.");

		assert!(matches!(err, Error::IdToken(IdTokenError::AmbiguousAudience)));
	}

	#[test]
	fn issuer_checks_run_before_time_checks() {
		let mut claims = base_claims();

		claims["iss"] = "https://rogue.example.com".into();
		claims["exp"] = (NOW - 10).into();

		let token = IdToken::from_compact(&encode_token(&claims))
			.expect("Token fixture should decode.");
		let err = token
			.validate(&test_request(), &fixed_clock(), false)
			.expect_err("Mismatched issuer should fail first.");

		assert!(matches!(err, Error::IdToken(IdTokenError::IssuerMismatch)));
	}

	#[test]
	fn expired_and_stale_tokens_are_rejected() {
		let mut claims = base_claims();

		claims["exp"] = NOW.into();

		let token = IdToken::from_compact(&encode_token(&claims))
			.expect("Token fixture should decode.");
		let err = token
			.validate(&test_request(), &fixed_clock(), false)
			.expect_err("Expiration equal to now should fail.");

		assert!(matches!(err, Error::IdToken(IdTokenError::Expired)));

		let mut claims = base_claims();

		claims["iat"] = (NOW - ISSUED_AT_TOLERANCE.whole_seconds() - 1).into();

		let token = IdToken::from_compact(&encode_token(&claims))
			.expect("Token fixture should decode.");
		let err = token
			.validate(&test_request(), &fixed_clock(), false)
			.expect_err("Stale issued-at should fail.");

		assert!(matches!(err, Error::IdToken(IdTokenError::IssuedAtOutOfRange)));
	}

	#[test]
	fn nonce_must_echo_the_request() {
		let mut claims = base_claims();

		claims["nonce"] = "evil".into();

		let token = IdToken::from_compact(&encode_token(&claims))
			.expect("Token fixture should decode.");
		let err = token
			.validate(&test_request(), &fixed_clock(), false)
			.expect_err("Mismatched nonce should fail.");

		assert!(matches!(err, Error::IdToken(IdTokenError::NonceMismatch)));
	}

	#[test]
	fn validation_requires_a_discovery_issuer() {
		let token = IdToken::from_compact(&encode_token(&base_claims()))
			.expect("Token fixture should decode.");
		let request = TokenRequest::builder(
			AuthorizationServiceConfiguration::new(
				Url::parse("https://idp.example.com/authorize").expect("Fixture should parse."),
				Url::parse("https://idp.example.com/token").expect("Fixture should parse."),
			),
			"test_client_id",
			GrantType::AuthorizationCode,
		)
		.authorization_code("code-1")
		.redirect_uri(Url::parse("https://app.example.com/cb").expect("Fixture should parse."))
		.build()
		.expect("Request fixture should build.");
		let err = token
			.validate(&request, &fixed_clock(), false)
			.expect_err("A configuration without an issuer cannot anchor validation.");

		assert!(matches!(err, Error::IllegalState { .. }));
	}

	#[test]
	fn https_check_can_be_skipped_for_test_issuers() {
		let mut claims = base_claims();

		claims["iss"] = "http://127.0.0.1:8080".into();

		let token = IdToken::from_compact(&encode_token(&claims))
			.expect("Token fixture should decode.");
		let discovery = DiscoveryDocument::from_json(
			r#"{
				"issuer": "http://127.0.0.1:8080",
				"authorization_endpoint": "http://127.0.0.1:8080/authorize",
				"token_endpoint": "http://127.0.0.1:8080/token",
				"jwks_uri": "http://127.0.0.1:8080/jwks",
				"response_types_supported": ["code"],
				"subject_types_supported": ["public"],
				"id_token_signing_alg_values_supported": ["RS256"]
			}"#,
		)
		.expect("Loopback discovery fixture should validate.");
		let request = TokenRequest::builder(
			AuthorizationServiceConfiguration::from_discovery(discovery),
			"test_client_id",
			GrantType::AuthorizationCode,
		)
		.authorization_code("code-1")
		.redirect_uri(Url::parse("https://app.example.com/cb").expect("Fixture should parse."))
		.nonce("nonce-1")
		.build()
		.expect("Request fixture should build.");

		let err = token
			.validate(&request, &fixed_clock(), false)
			.expect_err("Plain http issuer should fail by default.");

		assert!(matches!(err, Error::IdToken(IdTokenError::InsecureIssuer)));

		token
			.validate(&request, &fixed_clock(), true)
			.expect("Skipping the https check should allow a loopback issuer.");
	}
}

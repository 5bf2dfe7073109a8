#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use url::Url;
// self
use oidc_session::{
	config::AuthorizationServiceConfiguration,
	error::{Error, GeneralError, ResponseValidationError},
	http::ReqwestTransport,
};

fn discovery_body(base: &str) -> String {
	format!(
		"{{\
			\"issuer\":\"{base}\",\
			\"authorization_endpoint\":\"{base}/authorize\",\
			\"token_endpoint\":\"{base}/token\",\
			\"jwks_uri\":\"{base}/jwks\",\
			\"response_types_supported\":[\"code\"],\
			\"subject_types_supported\":[\"public\"],\
			\"id_token_signing_alg_values_supported\":[\"RS256\"],\
			\"end_session_endpoint\":\"{base}/logout\",\
			\"registration_endpoint\":\"{base}/register\"\
		}}",
	)
}

#[tokio::test]
async fn discovery_fetch_builds_a_complete_configuration() {
	let server = MockServer::start_async().await;
	let base = server.base_url();
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200)
				.header("content-type", "application/json")
				.body(discovery_body(&base));
		})
		.await;
	let issuer = Url::parse(&base).expect("Mock issuer URL should parse successfully.");
	let config = AuthorizationServiceConfiguration::fetch_from_issuer(
		&ReqwestTransport::default(),
		&issuer,
	)
	.await
	.expect("Discovery fetch should succeed.");

	mock.assert_async().await;

	assert_eq!(config.authorization_endpoint.as_str(), format!("{base}/authorize"));
	assert_eq!(config.token_endpoint.as_str(), format!("{base}/token"));
	assert_eq!(
		config.end_session_endpoint.as_ref().map(Url::as_str),
		Some(format!("{base}/logout").as_str()),
	);
	assert_eq!(
		config.registration_endpoint.as_ref().map(Url::as_str),
		Some(format!("{base}/register").as_str()),
	);
	assert_eq!(config.issuer(), Some(base.as_str()));
}

#[tokio::test]
async fn invalid_discovery_document_names_the_missing_claim() {
	let server = MockServer::start_async().await;
	let base = server.base_url();
	let body = discovery_body(&base).replace("\"jwks_uri\"", "\"jwks_uri_renamed\"");
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;
	let issuer = Url::parse(&base).expect("Mock issuer URL should parse successfully.");
	let err = AuthorizationServiceConfiguration::fetch_from_issuer(
		&ReqwestTransport::default(),
		&issuer,
	)
	.await
	.expect_err("Discovery document without jwks_uri should fail validation.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		Error::General(GeneralError::InvalidDiscoveryDocument(
			ResponseValidationError::MissingField { field: "jwks_uri" },
		)),
	));
}

#[tokio::test]
async fn discovery_server_failure_is_a_server_error() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(500).body("boom");
		})
		.await;
	let issuer =
		Url::parse(&server.base_url()).expect("Mock issuer URL should parse successfully.");
	let err = AuthorizationServiceConfiguration::fetch_from_issuer(
		&ReqwestTransport::default(),
		&issuer,
	)
	.await
	.expect_err("Discovery failure status should surface as a server error.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		Error::General(GeneralError::ServerError { endpoint: "discovery", status: 500 }),
	));
}

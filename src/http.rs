//! Transport seam for every outbound HTTP call made by the SDK.
//!
//! The state machine's correctness never depends on the transport internals;
//! [`HttpTransport`] is the narrow interface through which token exchanges,
//! dynamic registration, and discovery fetches travel. The crate ships a
//! reqwest-backed implementation behind the `reqwest` feature, and callers
//! may substitute anything that can execute an [`HttpRequest`].

// std
use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// HTTP methods used by the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// `GET` (discovery documents).
	Get,
	/// `POST` (token and registration endpoints).
	Post,
}

/// Outbound request handed to a transport.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// HTTP method.
	pub method: HttpMethod,
	/// Absolute request URL.
	pub url: Url,
	/// Header name/value pairs in insertion order.
	pub headers: Vec<(String, String)>,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl HttpRequest {
	/// Creates a `GET` request for the provided URL.
	pub fn get(url: Url) -> Self {
		Self { method: HttpMethod::Get, url, headers: Vec::new(), body: None }
	}

	/// Creates a `POST` request for the provided URL.
	pub fn post(url: Url) -> Self {
		Self { method: HttpMethod::Post, url, headers: Vec::new(), body: None }
	}

	/// Appends a header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Appends a header only when no header with the same (case-insensitive)
	/// name is already present.
	pub fn header_if_absent(self, name: &str, value: impl Into<String>) -> Self {
		if self.has_header(name) {
			return self;
		}

		self.header(name, value)
	}

	/// Returns `true` when a header with the provided name exists.
	pub fn has_header(&self, name: &str) -> bool {
		self.headers.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(name))
	}

	/// Attaches a request body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}
}

/// Response returned by a transport.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the body interpreted as UTF-8, replacing invalid sequences.
	pub fn body_string(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Boxed future returned by [`HttpTransport::call`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing SDK requests.
///
/// Implementations must be `Send + Sync + 'static` so an
/// [`AuthorizationService`](crate::service::AuthorizationService) can be
/// shared across tasks, and the returned futures must be `Send` so callers
/// can await them from any executor.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes the request, resolving with the raw response or a transport
	/// failure. Protocol-level errors (OAuth error bodies, non-2xx statuses)
	/// are not this layer's concern; they are mapped by the service facade.
	fn call(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one
/// place. Token requests should not follow redirects, matching OAuth 2.0
/// guidance that token endpoints return results directly instead of
/// delegating to another URI; configure any custom [`ReqwestClient`]
/// accordingly before wrapping it.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn call(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder = match request.method {
				HttpMethod::Get => client.get(request.url),
				HttpMethod::Post => client.post(request.url),
			};

			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(HttpResponse { status, body })
		})
	}
}

//! OAuth 2.0 / OpenID Connect client session SDK - authorization code + PKCE flows, coalesced
//! token refresh, and persistable auth state in one crate built for native and server-side
//! clients.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod browser;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod request;
pub mod response;
pub mod service;
pub mod state;
pub mod version;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{http::ReqwestTransport, service::AuthorizationService};

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs an [`AuthorizationService`] over the insecure test transport.
	pub fn test_authorization_service() -> AuthorizationService<ReqwestTransport> {
		AuthorizationService::new(Arc::new(test_reqwest_transport()))
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

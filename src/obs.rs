//! Optional observability helpers for session flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oidc_session.flow` with the `flow` (operation)
//!   and `stage` (call site) fields.
//! - Enable `metrics` to increment the `oidc_session_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Protocol operations observed by the session layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization request construction and redirect handling.
	Authorization,
	/// Authorization code exchange at the token endpoint.
	TokenExchange,
	/// Refresh token grant at the token endpoint.
	Refresh,
	/// Dynamic client registration.
	Registration,
	/// Discovery document retrieval.
	Discovery,
	/// RP-initiated logout.
	EndSession,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorization => "authorization",
			FlowKind::TokenExchange => "token_exchange",
			FlowKind::Refresh => "refresh",
			FlowKind::Registration => "registration",
			FlowKind::Discovery => "discovery",
			FlowKind::EndSession => "end_session",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a session operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

//! Outbound protocol request value objects.
//!
//! Every request is an immutable record built through a builder that runs all
//! cross-field validation at `build()` time, so no invariant-violating value
//! is ever observable.

pub mod authorization;
pub mod end_session;
pub mod registration;
pub mod token;

pub use authorization::*;
pub use end_session::*;
pub use registration::*;
pub use token::*;

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{_prelude::*, error::RequestBuilderError};

/// Rejects additional parameters whose names collide with reserved protocol
/// parameters.
pub(crate) fn check_additional_parameters(
	params: &BTreeMap<String, String>,
	reserved: &[&str],
) -> Result<(), RequestBuilderError> {
	for name in params.keys() {
		if reserved.contains(&name.as_str()) {
			return Err(RequestBuilderError::ReservedParameter { name: name.clone() });
		}
	}

	Ok(())
}

pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

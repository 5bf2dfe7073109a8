//! Inbound protocol response value objects.
//!
//! Every response owns the request that produced it, so follow-up requests
//! (token exchange, refresh) can be derived without re-supplying client
//! configuration.

pub mod authorization;
pub mod registration;
pub mod token;

pub use authorization::*;
pub use registration::*;
pub use token::*;

//! Client credentials and ID token handling.

pub mod client;
pub mod id_token;
pub mod secret;

pub use client::*;
pub use id_token::*;
pub use secret::*;

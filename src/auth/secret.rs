//! Redacted credential wrapper.

// self
use crate::_prelude::*;

/// Client credential whose value never appears in `Debug`/`Display` output.
///
/// The wrapped value is only reachable through [`expose`](Self::expose), so a
/// secret cannot leak into logs by accident.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Wraps a credential value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Reveals the wrapped value.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Secret(<redacted>)")
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
impl From<String> for Secret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl From<&str> for Secret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_is_redacted_in_debug_and_display() {
		let secret = Secret::new("hunter2");

		assert_eq!(format!("{secret:?}"), "Secret(<redacted>)");
		assert_eq!(secret.to_string(), "<redacted>");
		assert_eq!(secret.expose(), "hunter2");
	}

	#[test]
	fn secret_serializes_transparently() {
		let secret = Secret::new("hunter2");
		let json = serde_json::to_string(&secret).expect("Secret should serialize.");

		assert_eq!(json, r#""hunter2""#);

		let back: Secret = serde_json::from_str(&json).expect("Secret should deserialize.");

		assert_eq!(secret, back);
	}
}

//! Delimited version parsing and ordering used for browser capability matching.

// std
use std::cmp::Ordering;
// self
use crate::_prelude::*;

/// Version parsed from a delimited string such as `72.0.3626.121`.
///
/// Parsing splits on runs of non-digit characters, discards empty or
/// non-numeric fragments, and drops trailing zero components so `"1.0.0"`
/// compares equal to `"1"`. Ordering is lexicographic over the numeric
/// components with a shorter sequence ranking below a longer one sharing the
/// same prefix. There is no error path; garbage input simply yields fewer or
/// zero components, and the empty string parses to the zero version.
#[derive(Clone, Debug, Default)]
pub struct DelimitedVersion {
	components: Vec<u64>,
}
impl DelimitedVersion {
	/// Parses a delimited version string.
	pub fn parse(value: &str) -> Self {
		let mut components = value
			.split(|c: char| !c.is_ascii_digit())
			.filter_map(|fragment| fragment.parse::<u64>().ok())
			.collect::<Vec<_>>();

		while components.last() == Some(&0) {
			components.pop();
		}

		Self { components }
	}

	/// Returns the canonical numeric components (trailing zeros removed).
	pub fn components(&self) -> &[u64] {
		&self.components
	}

	/// Returns `true` for the canonical zero version.
	pub fn is_zero(&self) -> bool {
		self.components.is_empty()
	}
}
impl FromStr for DelimitedVersion {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self::parse(s))
	}
}
impl Ord for DelimitedVersion {
	fn cmp(&self, other: &Self) -> Ordering {
		self.components.cmp(&other.components)
	}
}
impl PartialOrd for DelimitedVersion {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
// Equality is defined by the comparison result rather than derived structural
// equality; canonical form makes the two coincide.
impl PartialEq for DelimitedVersion {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}
impl Eq for DelimitedVersion {}
impl Display for DelimitedVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		if self.components.is_empty() {
			return f.write_str("0");
		}

		let rendered =
			self.components.iter().map(u64::to_string).collect::<Vec<_>>().join(".");

		f.write_str(&rendered)
	}
}

//! Browser capability matching via version ranges.
//!
//! The embedding application decides which installed user agent may host the
//! authorization redirect; this module only models the version gate, not any
//! platform binding.

// self
use crate::{_prelude::*, version::DelimitedVersion};

/// Inclusive version range used to gate a browser capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRange {
	lower: Option<DelimitedVersion>,
	upper: Option<DelimitedVersion>,
}
impl VersionRange {
	/// Range matching every version.
	pub fn any_version() -> Self {
		Self { lower: None, upper: None }
	}

	/// Range matching `version` and anything above it.
	pub fn at_least(version: &str) -> Self {
		Self { lower: Some(DelimitedVersion::parse(version)), upper: None }
	}

	/// Range matching `version` and anything below it.
	pub fn at_most(version: &str) -> Self {
		Self { lower: None, upper: Some(DelimitedVersion::parse(version)) }
	}

	/// Range matching everything between the two versions, inclusive.
	pub fn between(lower: &str, upper: &str) -> Self {
		Self {
			lower: Some(DelimitedVersion::parse(lower)),
			upper: Some(DelimitedVersion::parse(upper)),
		}
	}

	/// Checks whether the provided version falls inside the range.
	pub fn matches(&self, version: &DelimitedVersion) -> bool {
		if let Some(lower) = &self.lower
			&& version < lower
		{
			return false;
		}
		if let Some(upper) = &self.upper
			&& version > upper
		{
			return false;
		}

		true
	}

	/// Convenience wrapper parsing the version string before matching.
	pub fn matches_str(&self, version: &str) -> bool {
		self.matches(&DelimitedVersion::parse(version))
	}
}
impl Display for VersionRange {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match (&self.lower, &self.upper) {
			(None, None) => f.write_str("any version"),
			(Some(lower), None) => write!(f, ">= {lower}"),
			(None, Some(upper)) => write!(f, "<= {upper}"),
			(Some(lower), Some(upper)) => write!(f, "between {lower} and {upper}"),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn any_version_matches_everything() {
		let range = VersionRange::any_version();

		assert!(range.matches_str(""));
		assert!(range.matches_str("0.1"));
		assert!(range.matches_str("537.36"));
	}

	#[test]
	fn bounds_are_inclusive() {
		let range = VersionRange::between("45", "72.0.3626");

		assert!(range.matches_str("45"));
		assert!(range.matches_str("45.0.0"));
		assert!(range.matches_str("72.0.3626"));
		assert!(!range.matches_str("44.9"));
		assert!(!range.matches_str("72.0.3626.121"));
	}

	#[test]
	fn half_open_ranges_match_one_side() {
		assert!(VersionRange::at_least("66").matches_str("67.0.1"));
		assert!(!VersionRange::at_least("66").matches_str("65"));
		assert!(VersionRange::at_most("11.5").matches_str("11.5.0"));
		assert!(!VersionRange::at_most("11.5").matches_str("11.5.1"));
	}
}

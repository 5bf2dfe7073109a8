//! Injectable time source used by every freshness and validity decision.

// self
use crate::_prelude::*;

/// Capability supplying the current instant.
///
/// Token freshness checks, ID token validation, and response timestamping all
/// take `&dyn Clock` so callers can pin time in tests instead of racing the
/// wall clock.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock implementation backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Settable clock for tests and deterministic replay.
#[derive(Debug)]
pub struct FixedClock(Mutex<OffsetDateTime>);
impl FixedClock {
	/// Creates a clock pinned to the provided instant.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(Mutex::new(instant))
	}

	/// Replaces the pinned instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}

	/// Moves the pinned instant forward (or backward with a negative duration).
	pub fn advance(&self, delta: Duration) {
		let mut instant = self.0.lock();

		*instant += delta;
	}
}
impl Clock for FixedClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

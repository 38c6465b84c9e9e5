use std::{fmt, time::Duration};

/// Absolute simulation time, in milliseconds since the host started its game clock.
///
/// Unlike a wall-clock `Instant`, a `GameInstant` is driven by the simulation loop, so
/// tests can advance it deterministically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameInstant {
    millis: u64,
}

impl GameInstant {
    pub const ZERO: GameInstant = GameInstant { millis: 0 };

    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    /// Returns the instant `duration` after this one, saturating at the end of the game clock
    pub fn add_duration(&self, duration: Duration) -> Self {
        let delta = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self {
            millis: self.millis.saturating_add(delta),
        }
    }

    pub fn is_after(&self, other: &GameInstant) -> bool {
        self.millis > other.millis
    }
}

impl fmt::Display for GameInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.millis)
    }
}

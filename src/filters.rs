//! Magnitude filtering.
//!
//! The threshold is purely a display filter: it is applied to the events
//! already fetched and never influences which feed is requested.

use serde::Serialize;

use crate::models::QuakeEvent;

/// Lowest selectable threshold.
pub const MIN_THRESHOLD: f64 = 0.0;

/// Highest selectable threshold.
pub const MAX_THRESHOLD: f64 = 7.0;

/// Slider granularity.
pub const THRESHOLD_STEP: f64 = 0.5;

/// Minimum magnitude for an event to be displayed.
///
/// Always within `[0, 7]` and a multiple of `0.5`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct MagnitudeThreshold(f64);

impl MagnitudeThreshold {
    /// Validate a raw slider value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is outside `[0, 7]` or not on the 0.5 grid.
    pub fn new(value: f64) -> Result<Self, String> {
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&value) {
            return Err(format!(
                "magnitude threshold {value} out of range [{MIN_THRESHOLD}, {MAX_THRESHOLD}]"
            ));
        }
        if (value / THRESHOLD_STEP).fract() != 0.0 {
            return Err(format!(
                "magnitude threshold {value} is not a multiple of {THRESHOLD_STEP}"
            ));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whether an event passes. Unknown magnitudes never pass, at any
    /// threshold including zero.
    #[must_use]
    pub fn admits(self, event: &QuakeEvent) -> bool {
        event.magnitude.is_some_and(|m| m >= self.0)
    }
}

impl std::fmt::Display for MagnitudeThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl std::str::FromStr for MagnitudeThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid magnitude threshold {s:?}: {e}"))?;
        Self::new(value)
    }
}

/// Events at or above `threshold`, in their original order.
#[must_use]
pub fn filter_by_magnitude(
    events: &[QuakeEvent],
    threshold: MagnitudeThreshold,
) -> Vec<&QuakeEvent> {
    events.iter().filter(|e| threshold.admits(e)).collect()
}

/// Number of events [`filter_by_magnitude`] would return.
#[must_use]
pub fn count_matching(events: &[QuakeEvent], threshold: MagnitudeThreshold) -> usize {
    events.iter().filter(|e| threshold.admits(e)).count()
}

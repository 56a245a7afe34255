//! Summary statistics over a fetched event set.

use serde::Serialize;

use crate::models::QuakeEvent;

/// Count, mean and maximum of the known magnitudes in an event set.
///
/// `avg` and `max` are preformatted to two decimals because that is the only
/// way they are ever displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Number of events with a defined magnitude
    pub total: usize,
    pub avg: String,
    pub max: String,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            total: 0,
            avg: "0.00".into(),
            max: "0.00".into(),
        }
    }
}

/// Reduce `events` to a [`StatsSnapshot`]. Events with unknown magnitude are
/// ignored entirely.
#[must_use]
pub fn summarize(events: &[QuakeEvent]) -> StatsSnapshot {
    let magnitudes: Vec<f64> = events.iter().filter_map(|e| e.magnitude).collect();

    if magnitudes.is_empty() {
        return StatsSnapshot::default();
    }

    let total = magnitudes.len();
    #[allow(clippy::cast_precision_loss)]
    let avg = magnitudes.iter().sum::<f64>() / total as f64;
    let max = magnitudes.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    StatsSnapshot {
        total,
        avg: format!("{avg:.2}"),
        max: format!("{max:.2}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::quakes;

    #[test]
    fn test_empty_set() {
        let stats = summarize(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg, "0.00");
        assert_eq!(stats.max, "0.00");
    }

    #[test]
    fn test_only_unknown_magnitudes() {
        let stats = summarize(&quakes(&[None, None]));
        assert_eq!(stats, StatsSnapshot::default());
    }

    #[test]
    fn test_mixed_magnitudes() {
        let stats = summarize(&quakes(&[Some(5.0), None, Some(7.2)]));
        assert_eq!(stats.total, 2);
        assert_eq!(stats.avg, "6.10");
        assert_eq!(stats.max, "7.20");
    }

    #[test]
    fn test_total_counts_defined_magnitudes_only() {
        let events = quakes(&[Some(0.0), None, Some(-0.4), Some(1.0), None]);
        let stats = summarize(&events);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.max, "1.00");
    }

    #[test]
    fn test_single_negative_magnitude() {
        let stats = summarize(&quakes(&[Some(-1.25)]));
        assert_eq!(stats.avg, "-1.25");
        assert_eq!(stats.max, "-1.25");
    }
}

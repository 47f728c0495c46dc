//! Filtering and summing of fetched activities.

use crate::Activity;
use serde::Serialize;

pub const DESK_TREADMILL: &str = "Desk Treadmill";

const MILES_PER_METER: f64 = 0.000621371;

/// Convert meters to statute miles. Presentation only; stored distances stay
/// in meters.
pub fn meters_to_miles(meters: f64) -> f64 {
    meters * MILES_PER_METER
}

/// Whitespace-trimmed exact match on the lowercased activity name.
#[derive(Clone, Debug)]
pub struct NameMatch {
    label: String,
    folded: String,
}

impl NameMatch {
    pub fn new(label: &str) -> Self {
        let label = label.trim().to_string();
        let folded = label.to_lowercase();
        Self { label, folded }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        activity.name.trim().to_lowercase() == self.folded
    }
}

impl Default for NameMatch {
    fn default() -> Self {
        Self::new(DESK_TREADMILL)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    pub match_count: usize,
    pub total_distance_meters: f64,
}

impl AggregateResult {
    pub fn total_distance_miles(&self) -> f64 {
        meters_to_miles(self.total_distance_meters)
    }
}

pub fn aggregate<P>(activities: &[Activity], predicate: P) -> AggregateResult
where
    P: Fn(&Activity) -> bool,
{
    activities
        .iter()
        .filter(|a| predicate(a))
        .fold(AggregateResult::default(), |mut acc, a| {
            acc.match_count += 1;
            acc.total_distance_meters += a.distance;
            acc
        })
}

use crate::utils::constants::{DEFAULT_ANCHOR_HOURS, SECONDS_PER_DAY};
use chrono::{DateTime, Timelike, Utc};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Fixed daily UTC anchor times and the tolerance around them.
///
/// Whether a sample is a "target" is always derived from its timestamp
/// through this schedule; it is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSchedule {
    hours: Vec<u32>,
    tolerance_minutes: i64,
}

impl Default for AnchorSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_ANCHOR_HOURS.to_vec(), 30)
    }
}

impl AnchorSchedule {
    pub fn new(mut hours: Vec<u32>, tolerance_minutes: i64) -> Self {
        hours.retain(|h| *h < 24);
        hours.sort_unstable();
        hours.dedup();
        Self { hours, tolerance_minutes }
    }

    pub fn hours(&self) -> &[u32] {
        &self.hours
    }

    pub fn tolerance_secs(&self) -> i64 {
        self.tolerance_minutes * 60
    }

    /// True when `timestamp` lies within the tolerance of any anchor hour,
    /// measured in whole minutes of the day with wrap-around at midnight.
    pub fn is_target(&self, timestamp: i64) -> bool {
        let Some(dt) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
            return false;
        };
        let minute_of_day = (dt.hour() * 60 + dt.minute()) as i64;

        self.hours.iter().any(|hour| {
            let distance = (minute_of_day - *hour as i64 * 60).abs();
            distance.min(MINUTES_PER_DAY - distance) <= self.tolerance_minutes
        })
    }

    /// Anchor timestamps of the UTC day containing `timestamp`, ascending.
    pub fn anchors_for_day(&self, timestamp: i64) -> Vec<i64> {
        let start_of_day = timestamp.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;
        self.hours.iter().map(|hour| start_of_day + *hour as i64 * 3600).collect()
    }

    /// First anchor strictly after `timestamp`.
    pub fn next_anchor(&self, timestamp: i64) -> Option<i64> {
        self.anchors_for_day(timestamp)
            .into_iter()
            .find(|anchor| *anchor > timestamp)
            .or_else(|| self.anchors_for_day(timestamp + SECONDS_PER_DAY).first().copied())
    }

    /// Anchor nearest to `timestamp`, looking at the neighbouring days too so
    /// that 23:50 resolves to the following midnight.
    pub fn nearest_anchor(&self, timestamp: i64) -> Option<i64> {
        [-SECONDS_PER_DAY, 0, SECONDS_PER_DAY]
            .into_iter()
            .flat_map(|shift| self.anchors_for_day(timestamp + shift))
            .min_by_key(|anchor| (anchor - timestamp).abs())
    }

    /// Anchors of the last `days` days (including today) that lie before `now`
    /// and have no stored target sample within the tolerance. Ascending.
    pub fn missing_anchors(&self, existing: &[i64], now: i64, days: u32) -> Vec<i64> {
        let existing_targets: Vec<i64> = existing.iter().copied().filter(|ts| self.is_target(*ts)).collect();
        let tolerance = self.tolerance_secs();

        let mut missing: Vec<i64> = (0..days as i64)
            .flat_map(|days_back| self.anchors_for_day(now - days_back * SECONDS_PER_DAY))
            .filter(|anchor| *anchor < now)
            .filter(|anchor| !existing_targets.iter().any(|ts| (ts - anchor).abs() < tolerance))
            .collect();

        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

pub fn format_utc(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

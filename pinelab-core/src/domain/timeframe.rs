//! Chart timeframes and the magnifier resolution ladder.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Bar duration of a chart or magnifier series.
///
/// Only the literals the upstream builder can emit are representable;
/// anything else is a user error at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

/// All timeframes, ascending by duration.
pub const ALL_TIMEFRAMES: [Timeframe; 8] = [
    Timeframe::M1,
    Timeframe::M3,
    Timeframe::M5,
    Timeframe::M15,
    Timeframe::M30,
    Timeframe::H1,
    Timeframe::H4,
    Timeframe::D1,
];

/// Resolutions the magnifier may pick from, ascending, in minutes.
const MAGNIFIER_RESOLUTIONS: [u32; 7] = [1, 3, 5, 15, 30, 60, 240];

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown timeframe '{0}' (use 1m, 3m, 5m, 15m, 30m, 1h, 4h or 1d)")]
pub struct TimeframeError(pub String);

impl Timeframe {
    /// Bar duration in minutes.
    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    /// Bar duration in seconds.
    pub fn seconds(self) -> i64 {
        i64::from(self.minutes()) * 60
    }

    pub fn duration(self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// The source literal, e.g. `"1h"`.
    pub fn literal(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    fn from_minutes(minutes: u32) -> Option<Timeframe> {
        ALL_TIMEFRAMES.iter().copied().find(|tf| tf.minutes() == minutes)
    }

    /// Pick the magnifier resolution for this chart timeframe.
    ///
    /// Aims for roughly `target_ticks` sub-bars per chart bar, bounded
    /// above by `1.6 * target_ticks`: the finest even divisor of the chart
    /// duration whose sub-bar count fits under the ceiling wins. Falls
    /// back to 1m when nothing qualifies.
    pub fn magnifier_resolution(self, target_ticks: u32) -> Timeframe {
        let chart_min = self.minutes();
        if chart_min <= 1 {
            return Timeframe::M1;
        }

        let max_ticks = (target_ticks as f64 * 1.6) as u32;
        for res_min in MAGNIFIER_RESOLUTIONS {
            if res_min >= chart_min || chart_min % res_min != 0 {
                continue;
            }
            let ticks = chart_min / res_min;
            if ticks <= max_ticks {
                return Timeframe::from_minutes(res_min).unwrap_or(Timeframe::M1);
            }
        }
        Timeframe::M1
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_TIMEFRAMES
            .iter()
            .copied()
            .find(|tf| tf.literal() == s)
            .ok_or_else(|| TimeframeError(s.to_string()))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> String {
        tf.literal().to_string()
    }
}

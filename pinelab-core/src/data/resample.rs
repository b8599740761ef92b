//! Resampling 1-minute bars to coarser timeframes.

use chrono::TimeZone;
use chrono::Utc;

use crate::domain::{OhlcvFrame, Timeframe};

/// Aggregate to `timeframe` over right-open intervals aligned to the epoch:
/// open first, high max, low min, close last, volume sum. Buckets with no
/// source rows are dropped. A 1m target returns the input unchanged.
pub fn resample(frame: &OhlcvFrame, timeframe: Timeframe) -> OhlcvFrame {
    if timeframe == Timeframe::M1 {
        return frame.clone();
    }

    let secs = timeframe.seconds();
    let mut out = OhlcvFrame::with_capacity(frame.len() / timeframe.minutes() as usize + 1);
    let mut current_bucket: Option<i64> = None;

    for i in 0..frame.len() {
        let bucket = frame.timestamps[i].timestamp().div_euclid(secs);
        if current_bucket == Some(bucket) {
            let last = out.len() - 1;
            out.high[last] = out.high[last].max(frame.high[i]);
            out.low[last] = out.low[last].min(frame.low[i]);
            out.close[last] = frame.close[i];
            out.volume[last] += frame.volume[i];
        } else {
            current_bucket = Some(bucket);
            let ts = Utc.timestamp_opt(bucket * secs, 0).unwrap();
            out.push(
                ts,
                frame.open[i],
                frame.high[i],
                frame.low[i],
                frame.close[i],
                frame.volume[i],
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn minute_frame(n: usize) -> OhlcvFrame {
        let mut frame = OhlcvFrame::with_capacity(n);
        for i in 0..n {
            let ts = Utc.timestamp_opt(i as i64 * 60, 0).unwrap();
            let base = 100.0 + i as f64;
            frame.push(ts, base, base + 2.0, base - 2.0, base + 1.0, 10.0);
        }
        frame
    }

    #[test]
    fn one_minute_is_identity() {
        let frame = minute_frame(10);
        let out = resample(&frame, Timeframe::M1);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn five_minute_aggregation() {
        let frame = minute_frame(10);
        let out = resample(&frame, Timeframe::M5);
        assert_eq!(out.len(), 2);

        // First bucket covers minutes 0..5
        assert_eq!(out.open[0], 100.0);
        assert_eq!(out.high[0], 106.0); // 104 + 2
        assert_eq!(out.low[0], 98.0); // 100 - 2
        assert_eq!(out.close[0], 105.0); // 104 + 1
        assert_eq!(out.volume[0], 50.0);
        assert_eq!(out.timestamps[0].timestamp(), 0);
        assert_eq!(out.timestamps[1].timestamp(), 300);
    }

    #[test]
    fn buckets_align_to_epoch() {
        // Bars starting mid-hour still bucket on hour boundaries
        let mut frame = OhlcvFrame::default();
        for i in 0..120 {
            let ts = Utc.timestamp_opt(1800 + i * 60, 0).unwrap();
            frame.push(ts, 1.0, 2.0, 0.5, 1.5, 1.0);
        }
        let out = resample(&frame, Timeframe::H1);
        assert_eq!(out.len(), 3);
        assert_eq!(out.timestamps[0].timestamp(), 0);
        assert_eq!(out.timestamps[1].timestamp(), 3600);
    }

    #[test]
    fn gaps_produce_no_empty_buckets() {
        let mut frame = OhlcvFrame::default();
        frame.push(Utc.timestamp_opt(0, 0).unwrap(), 1.0, 2.0, 0.5, 1.5, 1.0);
        // Next bar an hour later
        frame.push(Utc.timestamp_opt(3600, 0).unwrap(), 2.0, 3.0, 1.5, 2.5, 1.0);
        let out = resample(&frame, Timeframe::M5);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn resampled_frame_is_well_formed() {
        let frame = minute_frame(123);
        let out = resample(&frame, Timeframe::M15);
        assert!(out.is_well_formed());
    }
}

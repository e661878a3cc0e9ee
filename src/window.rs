use anyhow::Result;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{error, info, warn};

use crate::geo;
use crate::queue::MessageQueue;
use crate::sbs::SbsMessage;
use crate::snapshot;
use crate::state::StateTracker;

/// Samples gathered over one aggregation window and dropped after its
/// snapshot is written.
#[derive(Debug, Default)]
pub struct WindowSamples {
    /// Seconds between consecutive fixes of the same aircraft
    pub time_deltas: Vec<f64>,
    /// Displacement between consecutive fixes, expressed as seconds of
    /// flight at the previously reported ground speed
    pub ratios: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Wall-clock window length in seconds
    pub period_secs: u64,
    /// A stored fix older than this produces no samples
    pub stale_after_secs: i64,
    /// Where each window's report is published
    pub snapshot_path: PathBuf,
}

/// Runs the aggregation side of the pipeline until shutdown.
///
/// Wakes on wall-clock window boundaries, drains what the ingestion task
/// queued up to the boundary, folds it into the per-aircraft state and
/// publishes the window's statistics.
pub async fn run_aggregator(
    config: AggregatorConfig,
    queue: MessageQueue,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let stale_after = TimeDelta::seconds(config.stale_after_secs);
    let mut tracker = StateTracker::new();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let wait = delay_until_boundary(config.period_secs, Utc::now());
        tokio::select! {
            _ = time::sleep(wait) => {}
            _ = shutdown.changed() => break,
        }

        let bound = queue.len().await;
        let batch = queue.drain_up_to(bound).await;
        let samples = collect_samples(&mut tracker, &batch, stale_after);
        info!(
            "window closed: drained {} records, tracking {} aircraft, {} interval samples, {} displacement samples",
            batch.len(),
            tracker.len(),
            samples.time_deltas.len(),
            samples.ratios.len()
        );

        if let Err(e) = snapshot::write(&config.snapshot_path, &samples) {
            error!("snapshot not published: {:#}", e);
        }
    }

    Ok(())
}

/// Time until the next wall-clock boundary of `period_secs`.
///
/// A wake-up landing exactly on a boundary waits a full period, so every
/// boundary closes exactly one window.
fn delay_until_boundary(period_secs: u64, now: DateTime<Utc>) -> Duration {
    let period_ms = period_secs as i64 * 1000;
    let into = now.timestamp_millis().rem_euclid(period_ms);
    Duration::from_millis((period_ms - into) as u64)
}

fn collect_samples(
    tracker: &mut StateTracker,
    batch: &[SbsMessage],
    stale_after: TimeDelta,
) -> WindowSamples {
    let mut samples = WindowSamples::default();
    for msg in batch {
        observe(tracker, msg, stale_after, &mut samples);
    }
    samples
}

/// Folds one record into the tracker, harvesting samples against the
/// previous fix first.
///
/// A sample pair needs a usable fix in the record, a previous fix, a
/// previously reported nonzero ground speed, and a positive fix age below
/// the staleness cutoff. State updates happen regardless, so one odd
/// record cannot wedge an aircraft.
fn observe(
    tracker: &mut StateTracker,
    msg: &SbsMessage,
    stale_after: TimeDelta,
    samples: &mut WindowSamples,
) {
    let state = tracker.get_or_create(&msg.icao);
    let prior_position = state.position;
    let prior_time = state.position_time;
    let prior_speed = state.ground_speed;

    if let Some(position) = msg.position() {
        if let (Some(previous), Some(seen), Some(speed)) = (prior_position, prior_time, prior_speed)
        {
            let age = msg.timestamp.signed_duration_since(seen);
            if speed > 0 && age > TimeDelta::zero() && age < stale_after {
                samples
                    .time_deltas
                    .push(age.num_milliseconds() as f64 / 1000.0);

                let nm_per_second = speed as f64 / 3600.0;
                let ratio = geo::great_circle_nm(&previous, &position) / nm_per_second;
                if ratio.is_finite() {
                    samples.ratios.push(ratio);
                } else {
                    warn!(
                        "non-finite displacement for {}: previous ({}, {}), current ({}, {})",
                        msg.icao,
                        previous.latitude,
                        previous.longitude,
                        position.latitude,
                        position.longitude
                    );
                }
            }
        }
        state.position = Some(position);
        state.position_time = Some(msg.timestamp);
    }
    if let Some(speed) = msg.ground_speed {
        state.ground_speed = Some(speed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::{abort_and_await, Shutdown};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn base_time() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn fix(icao: &str, offset_secs: i64, latitude: f64, longitude: f64) -> SbsMessage {
        SbsMessage {
            timestamp: base_time() + TimeDelta::seconds(offset_secs),
            icao: icao.to_string(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude: Some(10000.0),
            ground_speed: None,
        }
    }

    fn velocity(icao: &str, offset_secs: i64, knots: u32) -> SbsMessage {
        SbsMessage {
            timestamp: base_time() + TimeDelta::seconds(offset_secs),
            icao: icao.to_string(),
            latitude: None,
            longitude: None,
            altitude: None,
            ground_speed: Some(knots),
        }
    }

    fn fold(batch: &[SbsMessage]) -> (StateTracker, WindowSamples) {
        let mut tracker = StateTracker::new();
        let samples = collect_samples(&mut tracker, batch, TimeDelta::seconds(600));
        (tracker, samples)
    }

    #[test]
    fn boundary_waits_mid_period() {
        let now = DateTime::from_timestamp(90, 250_000_000).unwrap();
        assert_eq!(delay_until_boundary(60, now), Duration::from_millis(29_750));
    }

    #[test]
    fn boundary_waits_a_full_period_when_already_aligned() {
        let now = DateTime::from_timestamp(120, 0).unwrap();
        assert_eq!(delay_until_boundary(60, now), Duration::from_secs(60));
    }

    #[test]
    fn boundary_wait_never_exceeds_the_period() {
        let now = DateTime::from_timestamp(9, 999_000_000).unwrap();
        assert_eq!(delay_until_boundary(10, now), Duration::from_millis(1));
    }

    #[test]
    fn displacement_is_measured_in_seconds_of_flight() {
        // 360 knots is 0.1 nm per second; a tenth of a nautical mile is
        // 0.1 minutes of latitude
        let (_, samples) = fold(&[
            fix("4CA1FA", 0, 50.0, 8.0),
            velocity("4CA1FA", 0, 360),
            fix("4CA1FA", 1, 50.0 + 0.1 / 60.0, 8.0),
        ]);
        assert_eq!(samples.time_deltas, [1.0]);
        assert_eq!(samples.ratios.len(), 1);
        assert!((samples.ratios[0] - 1.0).abs() < 0.01, "{:?}", samples.ratios);
    }

    #[test]
    fn a_window_of_three_records_yields_one_sample_pair() {
        let (tracker, samples) = fold(&[
            fix("AB12CD", 0, 50.0, 8.0),
            velocity("AB12CD", 1, 300),
            fix("AB12CD", 29, 50.0 + 1.0 / 60.0, 8.0),
        ]);
        assert_eq!(samples.time_deltas, [29.0]);
        assert_eq!(samples.ratios.len(), 1);
        // one nautical mile at 300 knots is twelve seconds of flight
        assert!((samples.ratios[0] - 12.0).abs() < 0.05, "{:?}", samples.ratios);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn fixes_at_the_staleness_cutoff_produce_no_samples() {
        for (offset, expected) in [(599, 1), (600, 0), (601, 0)] {
            let (tracker, samples) = fold(&[
                fix("4CA1FA", 0, 50.0, 8.0),
                velocity("4CA1FA", 0, 250),
                fix("4CA1FA", offset, 50.1, 8.0),
            ]);
            assert_eq!(samples.time_deltas.len(), expected, "offset {}", offset);
            // the replacement fix is stored either way
            let state = tracker.get("4CA1FA").unwrap();
            assert_eq!(
                state.position_time,
                Some(base_time() + TimeDelta::seconds(offset))
            );
        }
    }

    #[test]
    fn zero_ground_speed_produces_no_samples() {
        let (tracker, samples) = fold(&[
            fix("4CA1FA", 0, 50.0, 8.0),
            velocity("4CA1FA", 0, 0),
            fix("4CA1FA", 10, 50.01, 8.0),
        ]);
        assert!(samples.time_deltas.is_empty());
        assert!(samples.ratios.is_empty());
        assert!(tracker.get("4CA1FA").unwrap().position.is_some());
    }

    #[test]
    fn an_unknown_ground_speed_produces_no_samples() {
        let (_, samples) = fold(&[
            fix("4CA1FA", 0, 50.0, 8.0),
            fix("4CA1FA", 10, 50.01, 8.0),
        ]);
        assert!(samples.time_deltas.is_empty());
    }

    #[test]
    fn velocity_records_alone_never_sample() {
        let (tracker, samples) = fold(&[
            velocity("4CA1FA", 0, 400),
            velocity("4CA1FA", 10, 410),
        ]);
        assert!(samples.time_deltas.is_empty());
        let state = tracker.get("4CA1FA").unwrap();
        assert_eq!(state.ground_speed, Some(410));
        assert_eq!(state.position, None);
    }

    #[test]
    fn a_fix_that_does_not_advance_time_is_not_sampled() {
        for offset in [0, -5] {
            let (tracker, samples) = fold(&[
                fix("4CA1FA", 0, 50.0, 8.0),
                velocity("4CA1FA", 0, 250),
                fix("4CA1FA", offset, 50.1, 8.0),
            ]);
            assert!(samples.time_deltas.is_empty(), "offset {}", offset);
            // state still follows the feed
            assert_eq!(
                tracker.get("4CA1FA").unwrap().position_time,
                Some(base_time() + TimeDelta::seconds(offset))
            );
        }
    }

    #[test]
    fn non_finite_displacement_skips_only_the_ratio() {
        let (_, samples) = fold(&[
            fix("4CA1FA", 0, 50.0, 8.0),
            velocity("4CA1FA", 0, 250),
            fix("4CA1FA", 5, f64::NAN, 8.0),
        ]);
        assert_eq!(samples.time_deltas, [5.0]);
        assert!(samples.ratios.is_empty());
    }

    #[test]
    fn aircraft_are_tracked_independently() {
        let (tracker, samples) = fold(&[
            fix("AAAAAA", 0, 50.0, 8.0),
            velocity("AAAAAA", 0, 360),
            fix("BBBBBB", 1, 40.0, -3.0),
            fix("AAAAAA", 10, 50.05, 8.0),
        ]);
        assert_eq!(tracker.len(), 2);
        assert_eq!(samples.time_deltas, [10.0]);
    }

    #[test]
    fn samples_never_outnumber_the_fixes_in_a_window() {
        let batch = [
            fix("AAAAAA", 0, 50.0, 8.0),
            velocity("AAAAAA", 0, 360),
            fix("AAAAAA", 5, 50.01, 8.0),
            fix("AAAAAA", 10, 50.02, 8.0),
            velocity("BBBBBB", 2, 200),
            fix("BBBBBB", 3, 40.0, -3.0),
            fix("CCCCCC", 4, 45.0, 2.0),
        ];
        let fixes = batch.iter().filter(|m| m.position().is_some()).count();
        let (_, samples) = fold(&batch);
        assert!(samples.time_deltas.len() <= fixes);
        assert!(samples.ratios.len() <= samples.time_deltas.len());
        // only AAAAAA's second and third fixes have a usable prior
        assert_eq!(samples.time_deltas, [5.0, 5.0]);
    }

    #[tokio::test]
    async fn aggregator_publishes_a_snapshot_per_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot");
        let queue = MessageQueue::new();
        for msg in [
            fix("4CA1FA", 0, 50.0, 8.0),
            velocity("4CA1FA", 0, 360),
            fix("4CA1FA", 1, 50.0 + 0.1 / 60.0, 8.0),
        ] {
            queue.push(msg).await;
        }

        let (shutdown, receiver) = Shutdown::new();
        let config = AggregatorConfig {
            period_secs: 2,
            stale_after_secs: 600,
            snapshot_path: path.clone(),
        };
        let mut handle = tokio::spawn(run_aggregator(config, queue.clone(), receiver));

        let mut waited = Duration::ZERO;
        while !path.exists() && waited < Duration::from_secs(5) {
            time::sleep(Duration::from_millis(50)).await;
            waited += Duration::from_millis(50);
        }
        shutdown.trigger();
        abort_and_await(&mut handle).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("ts_n.value 1"), "{}", contents);
        assert!(contents.contains("pos_n.value 1"), "{}", contents);
        assert!(queue.is_empty().await);
    }
}

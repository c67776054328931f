use std::time::Duration;

/// One reporting interval's worth of overflow accounting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverflowReport {
    /// Events drained in the interval that just ended.
    pub count: u64,
    /// Running average in events per second since process start.
    pub average: f64,
}

/// Windowed overflow accounting. The control loop drains the counter once
/// per fixed interval and feeds the count here; totals accumulate
/// monotonically and reset only at process start. A burst inside one
/// interval shows up as one aggregate count; granularity traded for
/// negligible reporting overhead.
#[derive(Debug)]
pub struct OverflowReporter {
    interval: Duration,
    threshold: f64,
    total: u64,
    elapsed: Duration,
}

impl OverflowReporter {
    pub fn new(interval: Duration, threshold: f64) -> Self {
        Self {
            interval,
            threshold,
            total: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Feed one drained interval count. Returns a report when the interval
    /// saw events or the running average is over the threshold.
    pub fn observe(&mut self, count: u64) -> Option<OverflowReport> {
        self.total += count;
        self.elapsed += self.interval;
        let average = self.total as f64 / self.elapsed.as_secs_f64();
        (count > 0 || average > self.threshold).then_some(OverflowReport { count, average })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(2);
    const THRESHOLD: f64 = 0.1;

    #[test]
    fn clean_stream_stays_silent() {
        let mut reporter = OverflowReporter::new(INTERVAL, THRESHOLD);
        for _ in 0..10 {
            assert_eq!(reporter.observe(0), None);
        }
        assert_eq!(reporter.total(), 0);
    }

    #[test]
    fn one_overflow_in_first_window() {
        // 10 periods of 4096 samples at 44100 Hz fit in one 2 s window; one
        // flagged overflow must report count=1, average=0.5/s.
        let mut reporter = OverflowReporter::new(INTERVAL, THRESHOLD);
        let report = reporter.observe(1).expect("events must report");
        assert_eq!(report.count, 1);
        assert!((report.average - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn average_keeps_reporting_until_it_decays() {
        let mut reporter = OverflowReporter::new(INTERVAL, THRESHOLD);
        assert!(reporter.observe(1).is_some());

        // 1 event over 4 s: average 0.25/s, still over threshold with a
        // zero interval count.
        let report = reporter.observe(0).expect("average over threshold");
        assert_eq!(report.count, 0);
        assert!((report.average - 0.25).abs() < f64::EPSILON);

        // Keep draining zeros until elapsed passes 10 s; the average falls
        // to or below 0.1/s and reporting goes quiet.
        assert!(reporter.observe(0).is_some()); // 6 s
        assert!(reporter.observe(0).is_some()); // 8 s
        assert_eq!(reporter.observe(0), None); // 10 s, average down to 0.1
    }

    #[test]
    fn cumulative_total_matches_flagged_periods() {
        let mut reporter = OverflowReporter::new(INTERVAL, THRESHOLD);
        let counts = [0, 3, 0, 1, 2, 0];
        for c in counts {
            let _ = reporter.observe(c);
        }
        assert_eq!(reporter.total(), 6);
        assert_eq!(reporter.elapsed(), Duration::from_secs(12));
    }

    #[test]
    fn burst_in_one_interval_is_one_aggregate_count() {
        let mut reporter = OverflowReporter::new(INTERVAL, THRESHOLD);
        let report = reporter.observe(7).expect("burst must report");
        assert_eq!(report.count, 7);
        assert!((report.average - 3.5).abs() < f64::EPSILON);
    }
}

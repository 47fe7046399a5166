use core::fmt;
use core::time::Duration;

use crate::probe::Probe;

/// A duration displayed truncated to whole microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rtt(pub Duration);

impl fmt::Display for Rtt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros = u64::try_from(self.0.as_micros()).unwrap_or(u64::MAX);
        f.pad(&format!("{:?}", Duration::from_micros(micros)))
    }
}

/// Statistics accumulated over a ping run.
#[derive(Debug, Clone)]
pub struct Statistics {
    /// Size of each ICMP message sent.
    pub size: usize,
    /// The time to live requests were sent with.
    pub ttl: u8,
    /// The sequence number of the last probe recorded.
    pub sequence: Option<u16>,
    successes: u64,
    failures: u64,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl Statistics {
    /// Construct empty statistics.
    pub fn new(size: usize, ttl: u8) -> Self {
        Self {
            size,
            ttl,
            sequence: None,
            successes: 0,
            failures: 0,
            total: Duration::ZERO,
            min: None,
            max: None,
        }
    }

    /// Record the outcome of a probe.
    pub fn record(&mut self, probe: &Probe) {
        self.sequence = Some(probe.sequence);

        let Some(rtt) = probe.rtt() else {
            self.failures += 1;
            return;
        };

        self.successes += 1;
        self.total = self.total.saturating_add(rtt);
        self.min = Some(self.min.map_or(rtt, |min| min.min(rtt)));
        self.max = Some(self.max.map_or(rtt, |max| max.max(rtt)));
    }

    /// Number of probes that were answered.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Number of probes that were not answered.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Number of probes issued.
    pub fn issued(&self) -> u64 {
        self.successes + self.failures
    }

    /// Sum of the round-trip times of all answered probes.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// The shortest round-trip time seen.
    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    /// The longest round-trip time seen.
    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Total round-trip time of answered probes divided by the number of
    /// probes issued, or `None` if nothing was issued.
    pub fn average(&self) -> Option<Duration> {
        let issued = self.issued();

        if issued == 0 {
            return None;
        }

        let nanos = self.total.as_nanos() / u128::from(issued);
        Some(Duration::from_nanos(
            u64::try_from(nanos).unwrap_or(u64::MAX),
        ))
    }

    /// Percentage of issued probes that were not answered, in `0..=100`.
    ///
    /// Zero when nothing was issued.
    pub fn loss(&self) -> f64 {
        let issued = self.issued();

        if issued == 0 {
            return 0.0;
        }

        self.failures as f64 / issued as f64 * 100.0
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---------- Ping Statistics ----------")?;

        write!(f, "Average ")?;

        match self.average() {
            Some(average) => write!(f, "{}", Rtt(average))?,
            None => write!(f, "n/a")?,
        }

        write!(
            f,
            ", Success: {}, Failure: {}, Packet Loss {:.2} %",
            self.successes,
            self.failures,
            self.loss()
        )?;

        if let (Some(min), Some(max)) = (self.min, self.max) {
            write!(f, "\nMinimum {}, Maximum {}", Rtt(min), Rtt(max))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::net::Ipv4Addr;
    use core::time::Duration;

    use super::{Rtt, Statistics};
    use crate::probe::{Probe, ProbeError};
    use crate::testing::echo_reply;

    const DEST: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 1);

    fn answered(sequence: u16, millis: u64) -> Probe {
        Probe {
            sequence,
            elapsed: Duration::from_millis(millis),
            outcome: Ok(echo_reply(DEST, 1, sequence)),
        }
    }

    fn lost(sequence: u16) -> Probe {
        Probe {
            sequence,
            elapsed: Duration::from_secs(3),
            outcome: Err(ProbeError::Timeout(Duration::from_secs(3))),
        }
    }

    #[test]
    fn counters_always_sum_to_issued() {
        let mut stats = Statistics::new(64, 64);

        for sequence in 0..50u16 {
            let probe = if sequence % 3 == 0 {
                lost(sequence)
            } else {
                answered(sequence, u64::from(sequence))
            };

            stats.record(&probe);
            assert_eq!(stats.successes() + stats.failures(), stats.issued());
            assert_eq!(stats.issued(), u64::from(sequence) + 1);

            let loss = stats.loss();
            assert!((0.0..=100.0).contains(&loss));
            assert_eq!(loss == 0.0, stats.failures() == 0);
        }

        assert_eq!(stats.failures(), 17);
        assert_eq!(stats.sequence, Some(49));
    }

    #[test]
    fn nothing_issued() {
        let stats = Statistics::new(64, 64);

        assert_eq!(stats.issued(), 0);
        assert_eq!(stats.average(), None);
        assert_eq!(stats.loss(), 0.0);

        let summary = stats.to_string();
        assert!(summary.contains("Average n/a"));
        assert!(summary.contains("Packet Loss 0.00 %"));
    }

    #[test]
    fn average_excludes_failed_elapsed() {
        let mut stats = Statistics::new(64, 64);
        stats.record(&answered(0, 10));
        stats.record(&lost(1));
        stats.record(&answered(2, 20));
        stats.record(&lost(3));

        assert_eq!(stats.total(), Duration::from_millis(30));
        assert_eq!(stats.average(), Some(Duration::from_micros(7500)));
        assert_eq!(stats.loss(), 50.0);
        assert_eq!(stats.min(), Some(Duration::from_millis(10)));
        assert_eq!(stats.max(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn average_keeps_full_precision() {
        let mut stats = Statistics::new(64, 64);
        stats.record(&answered(0, 1));
        stats.record(&answered(1, 1));
        stats.record(&answered(2, 0));

        assert_eq!(stats.average(), Some(Duration::from_nanos(666_666)));
        assert_eq!(Rtt(stats.average().unwrap()).to_string(), "666µs");
    }

    #[test]
    fn all_lost() {
        let mut stats = Statistics::new(64, 64);

        for sequence in 0..4 {
            stats.record(&lost(sequence));
        }

        assert_eq!(stats.successes(), 0);
        assert_eq!(stats.failures(), 4);
        assert_eq!(stats.loss(), 100.0);
        assert_eq!(stats.average(), Some(Duration::ZERO));
        assert!(!stats.to_string().contains("Minimum"));
    }

    #[test]
    fn rtt_truncates_and_pads() {
        assert_eq!(Rtt(Duration::from_nanos(1_234_567)).to_string(), "1.234ms");
        assert_eq!(format!("{:>8}", Rtt(Duration::from_micros(5))), "     5µs");
    }
}

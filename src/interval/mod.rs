#[cfg(test)]
mod interval_test;

use std::time::Duration;

use rand::Rng;

use crate::config::BandwidthConfig;

/// Session state the report interval depends on.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct IntervalInput {
    pub members: usize,
    pub senders: usize,
    pub we_sent: bool,
    /// Average compound packet size in octets, lower layer headers included.
    pub avg_rtcp_size: f64,
    /// No report sent yet; the floor is halved.
    pub initial: bool,
}

/// IntervalModel computes RTCP transmission intervals as described in
/// RFC 3550 section 6.3.1 and appendix A.7.
pub struct IntervalModel;

impl IntervalModel {
    /// Divisor that compensates the timer reconsideration bias towards
    /// shorter intervals.
    pub const RECONSIDERATION_COMPENSATION: f64 = std::f64::consts::E - 1.5;
    /// Silent members time out after this many deterministic intervals.
    pub const TIMEOUT_MULTIPLIER: u32 = 5;
    /// Senders lose sender status after this many deterministic intervals
    /// without data.
    pub const SENDER_TIMEOUT_MULTIPLIER: u32 = 2;
    /// Conflicting origins are forgotten after this many deterministic
    /// intervals.
    pub const CONFLICT_TIMEOUT_MULTIPLIER: u32 = 10;
    pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);
    /// Deterministic interval used when the session has no bandwidth to
    /// share.
    pub const NO_BANDWIDTH_INTERVAL: Duration = Duration::from_secs(100);
    /// Initial average compound size: a bare RR plus IPv4 and UDP headers.
    pub const INITIAL_AVG_RTCP_SIZE: f64 = 28.0 + 8.0;

    /// deterministic_interval is Td: the interval before randomization.
    pub fn deterministic_interval(input: &IntervalInput, bw: &BandwidthConfig) -> Duration {
        let min = if input.initial {
            bw.min_interval / 2
        } else {
            bw.min_interval
        };

        let mut rtcp_bw = bw.control_bandwidth();
        let mut n = input.members.max(1);
        let senders = input.senders.min(n);

        if senders > 0 && (senders as f64) <= n as f64 * bw.sender_fraction {
            if input.we_sent {
                rtcp_bw *= bw.sender_fraction;
                n = senders;
            } else {
                rtcp_bw *= bw.receiver_fraction();
                n -= senders;
            }
        }

        if rtcp_bw <= 0.0 {
            return Self::NO_BANDWIDTH_INTERVAL.max(min);
        }

        let t = input.avg_rtcp_size * n as f64 / rtcp_bw;
        Duration::from_secs_f64(t).max(min)
    }

    /// compute_interval is T: Td scaled by `random_factor`, which must lie in
    /// [0.5, 1.5), and divided by the compensation constant for senders.
    pub fn compute_interval(
        input: &IntervalInput,
        bw: &BandwidthConfig,
        random_factor: f64,
    ) -> Duration {
        let td = Self::deterministic_interval(input, bw).as_secs_f64();
        let mut t = td * random_factor.clamp(0.5, 1.5);
        if input.we_sent {
            t /= Self::RECONSIDERATION_COMPENSATION;
        }
        Duration::from_secs_f64(t)
    }

    /// Draws a uniform factor in [0.5, 1.5).
    pub fn random_factor<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        rng.random_range(0.5..1.5)
    }

    /// update_avg_size folds one compound packet of `observed_len` octets,
    /// lower layer headers included, into the running average.
    pub fn update_avg_size(avg: f64, observed_len: usize) -> f64 {
        avg * 15.0 / 16.0 + observed_len as f64 / 16.0
    }
}

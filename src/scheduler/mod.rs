
use std::time::{Duration, SystemTime};

use bytes::Bytes;

use crate::interval::IntervalModel;

/// Above this many members a leaving participant backs off before sending
/// BYE (RFC 3550 section 6.3.7).
pub const BYE_BACKOFF_THRESHOLD: usize = 50;

/// ControlState is the lifecycle of the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlState {
    Active,
    /// BYE back-off in progress. `members` counts ourselves plus every
    /// source listed in BYE packets received since leaving started.
    Leaving { reason: Bytes, members: usize },
    Closed,
}

impl ControlState {
    pub fn is_active(&self) -> bool {
        matches!(self, ControlState::Active)
    }

    pub fn is_leaving(&self) -> bool {
        matches!(self, ControlState::Leaving { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ControlState::Closed)
    }
}

/// Outcome of timer reconsideration when the scheduled time is reached.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerDecision {
    Send,
    /// The recomputed interval moved the report to this later time.
    Reschedule(SystemTime),
}

/// ReportSchedule holds the timing state of RFC 3550 section 6.3: tp, tc,
/// tn, pmembers, avg_rtcp_size, we_sent and initial.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSchedule {
    tp: SystemTime,
    tc: SystemTime,
    tn: SystemTime,
    pmembers: usize,
    avg_rtcp_size: f64,
    we_sent: bool,
    initial: bool,
}

fn scale(d: Duration, num: usize, den: usize) -> Duration {
    d.mul_f64(num as f64 / den.max(1) as f64)
}

impl ReportSchedule {
    pub fn new(now: SystemTime) -> Self {
        ReportSchedule {
            tp: now,
            tc: now,
            tn: now,
            pmembers: 1,
            avg_rtcp_size: IntervalModel::INITIAL_AVG_RTCP_SIZE,
            we_sent: false,
            initial: true,
        }
    }

    pub fn t_prev(&self) -> SystemTime {
        self.tp
    }

    pub fn t_current(&self) -> SystemTime {
        self.tc
    }

    pub fn t_next(&self) -> SystemTime {
        self.tn
    }

    pub fn prev_members(&self) -> usize {
        self.pmembers
    }

    pub fn avg_compound_size(&self) -> f64 {
        self.avg_rtcp_size
    }

    pub fn we_sent(&self) -> bool {
        self.we_sent
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub fn set_we_sent(&mut self) {
        self.we_sent = true;
    }

    /// Schedules the next report at `tn`.
    pub fn set_next(&mut self, tn: SystemTime) {
        self.tn = tn;
    }

    pub fn is_due(&self, now: SystemTime) -> bool {
        now >= self.tn
    }

    /// update_avg_size folds a sent or received compound packet, lower layer
    /// headers included, into the average.
    pub fn update_avg_size(&mut self, observed_len: usize) {
        self.avg_rtcp_size = IntervalModel::update_avg_size(self.avg_rtcp_size, observed_len);
    }

    /// reconsider_timer applies timer reconsideration once tn is reached,
    /// given the interval T recomputed from the current state.
    pub fn reconsider_timer(&mut self, now: SystemTime, interval: Duration) -> TimerDecision {
        self.tc = now;
        let due = self.tp + interval;
        if due <= now {
            TimerDecision::Send
        } else {
            self.tn = due;
            TimerDecision::Reschedule(due)
        }
    }

    /// on_report_sent records a transmitted compound packet of `sent_len`
    /// octets. The caller then schedules the next report with `set_next`.
    pub fn on_report_sent(&mut self, now: SystemTime, members: usize, sent_len: usize) {
        self.tp = now;
        self.tc = now;
        self.pmembers = members;
        self.initial = false;
        self.we_sent = false;
        self.update_avg_size(sent_len);
    }

    /// reconsider_growth stretches the pending interval in proportion to
    /// membership growth once members exceed `threshold` times pmembers.
    pub fn reconsider_growth(&mut self, members: usize, threshold: f64, now: SystemTime) -> bool {
        if (members as f64) <= self.pmembers as f64 * threshold {
            return false;
        }

        if let Ok(remaining) = self.tn.duration_since(now) {
            self.tn = now + scale(remaining, members, self.pmembers);
        }
        log::trace!(
            "forward reconsideration {} -> {} members",
            self.pmembers,
            members
        );
        self.pmembers = members;
        true
    }

    /// reverse_reconsider pulls tn and tp towards now when membership shrinks
    /// (RFC 3550 section 6.3.4).
    pub fn reverse_reconsider(&mut self, members: usize, now: SystemTime) -> bool {
        if members >= self.pmembers {
            return false;
        }

        self.tc = now;
        if let Ok(remaining) = self.tn.duration_since(now) {
            self.tn = now + scale(remaining, members, self.pmembers);
        }
        if let Ok(elapsed) = now.duration_since(self.tp) {
            self.tp = now
                .checked_sub(scale(elapsed, members, self.pmembers))
                .unwrap_or(self.tp);
        }
        log::trace!(
            "reverse reconsideration {} -> {} members",
            self.pmembers,
            members
        );
        self.pmembers = members;
        true
    }

    /// restart puts the schedule back to its initial state at `now`, as for
    /// BYE back-off or after an SSRC change. `avg_rtcp_size` replaces the
    /// average when given.
    pub fn restart(&mut self, now: SystemTime, members: usize, avg_rtcp_size: Option<f64>) {
        self.tp = now;
        self.tc = now;
        self.tn = now;
        self.pmembers = members;
        self.initial = true;
        self.we_sent = false;
        if let Some(avg) = avg_rtcp_size {
            self.avg_rtcp_size = avg;
        }
    }
}

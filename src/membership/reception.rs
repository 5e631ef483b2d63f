use std::time::{Duration, SystemTime};

use rtcp::reception_report::{ReceptionReport, MAX_TOTAL_LOST};

use super::sync_source::{RtpPacketInfo, SenderInfo};
use crate::ntp::{compact_ntp, to_compact_duration};

/// Consecutive in-order packets a new source must send before it counts as
/// validated.
pub(crate) const MIN_SEQUENTIAL: u8 = 2;

/// Size of the duplicate detection window, in sequence numbers.
const WINDOW: usize = 128 * 64;

/// Largest forward jump still taken as loss rather than a restart.
pub(crate) const MAX_DROPOUT: u16 = 3000;
/// Largest backward step still taken as a late packet.
pub(crate) const MAX_MISORDER: u16 = 100;

/// ReceptionStats keeps what is needed to fill a report block for one remote
/// sender.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReceptionStats {
    clock_rate: f64,

    probation: u8,
    started: bool,
    packets: Vec<u64>,
    base_seq: u32,
    max_seq: u16,
    cycles: u32,
    /// Sequence number that confirms a jump as a restart, one past the
    /// last jumped-to packet.
    bad_seq: Option<u16>,
    received: u32,
    expected_prior: u32,
    received_prior: u32,

    last_rtp_time_rtp: u32,
    last_rtp_time_time: SystemTime,
    jitter: f64,
}

impl ReceptionStats {
    /// Starts probation at `first`, the first packet seen from the source.
    pub(crate) fn new(clock_rate: u32, first: &RtpPacketInfo, now: SystemTime) -> Self {
        ReceptionStats {
            clock_rate: clock_rate as f64,

            probation: MIN_SEQUENTIAL - 1,
            started: false,
            packets: vec![0u64; WINDOW / 64],
            base_seq: 0,
            max_seq: first.sequence_number,
            cycles: 0,
            bad_seq: None,
            received: 0,
            expected_prior: 0,
            received_prior: 0,

            last_rtp_time_rtp: first.timestamp,
            last_rtp_time_time: now,
            jitter: 0.0,
        }
    }

    fn set_received(&mut self, seq: u16) {
        let pos = (seq as usize) % WINDOW;
        self.packets[pos / 64] |= 1 << (pos % 64);
    }

    fn del_received(&mut self, seq: u16) {
        let pos = (seq as usize) % WINDOW;
        self.packets[pos / 64] &= u64::MAX ^ (1u64 << (pos % 64));
    }

    fn get_received(&self, seq: u16) -> bool {
        let pos = (seq as usize) % WINDOW;
        (self.packets[pos / 64] & (1 << (pos % 64))) != 0
    }

    /// Whether the source has finished probation.
    pub(crate) fn is_valid(&self) -> bool {
        self.started
    }

    pub(crate) fn extended_highest(&self) -> u32 {
        (self.cycles << 16) | self.max_seq as u32
    }

    fn start(&mut self, seq: u16) {
        self.started = true;
        self.packets.iter_mut().for_each(|w| *w = 0);
        self.base_seq = seq as u32;
        self.max_seq = seq;
        self.cycles = 0;
        self.bad_seq = None;
        self.received = 1;
        self.expected_prior = 0;
        self.received_prior = 0;
        self.set_received(seq);
    }

    /// process_rtp accounts one data packet and returns whether the source is
    /// validated afterwards.
    pub(crate) fn process_rtp(&mut self, now: SystemTime, info: &RtpPacketInfo) -> bool {
        let seq = info.sequence_number;

        if !self.started {
            if seq == self.max_seq.wrapping_add(1) {
                self.probation = self.probation.saturating_sub(1);
                self.max_seq = seq;
                if self.probation == 0 {
                    self.start(seq);
                }
            } else {
                self.probation = MIN_SEQUENTIAL - 1;
                self.max_seq = seq;
            }
        } else {
            let delta = seq.wrapping_sub(self.max_seq);
            let counted = if delta == 0 || delta > u16::MAX - MAX_MISORDER + 1 {
                // duplicate or late
                if !self.get_received(seq) {
                    self.set_received(seq);
                    self.received += 1;
                }
                true
            } else if delta < MAX_DROPOUT {
                // set skipped packets as missing
                for i in 1..delta {
                    self.del_received(seq.wrapping_sub(i));
                }
                if seq < self.max_seq {
                    self.cycles += 1;
                }
                self.max_seq = seq;
                self.set_received(seq);
                self.received += 1;
                true
            } else if self.bad_seq == Some(seq) {
                // two sequential packets after a jump: the source restarted
                log::debug!("sequence restart at {seq}");
                self.start(seq);
                true
            } else {
                self.bad_seq = Some(seq.wrapping_add(1));
                false
            };

            if counted {
                // https://tools.ietf.org/html/rfc3550#appendix-A.8
                let transit = info.timestamp.wrapping_sub(self.last_rtp_time_rtp) as i32;
                let d = now
                    .duration_since(self.last_rtp_time_time)
                    .unwrap_or_else(|_| Duration::from_secs(0))
                    .as_secs_f64()
                    * self.clock_rate
                    - transit as f64;
                self.jitter += (d.abs() - self.jitter) / 16.0;
            }
        }

        self.last_rtp_time_rtp = info.timestamp;
        self.last_rtp_time_time = now;

        self.started
    }

    /// generate_report builds the block for `ssrc` and starts a new reporting
    /// interval.
    pub(crate) fn generate_report(
        &mut self,
        ssrc: u32,
        now: SystemTime,
        last_sr: Option<&SenderInfo>,
    ) -> ReceptionReport {
        let expected = self
            .extended_highest()
            .wrapping_sub(self.base_seq)
            .wrapping_add(1);
        let expected_interval = expected.wrapping_sub(self.expected_prior);
        let received_interval = self.received.wrapping_sub(self.received_prior);
        let lost_interval = expected_interval.saturating_sub(received_interval);
        self.expected_prior = expected;
        self.received_prior = self.received;

        let fraction_lost = if expected_interval == 0 || lost_interval == 0 {
            0
        } else {
            ((lost_interval as u64 * 256) / expected_interval as u64).min(255) as u8
        };

        // allow up to 24 bits
        let total_lost = expected.saturating_sub(self.received).min(MAX_TOTAL_LOST);

        let (last_sender_report, delay) = match last_sr {
            Some(sr) => (
                compact_ntp(sr.ntp_time),
                to_compact_duration(now.duration_since(sr.received_at).unwrap_or_default()),
            ),
            None => (0, 0),
        };

        ReceptionReport {
            ssrc,
            fraction_lost,
            total_lost,
            last_sequence_number: self.extended_highest(),
            jitter: self.jitter as u32,
            last_sender_report,
            delay,
        }
    }
}

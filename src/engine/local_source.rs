use std::time::SystemTime;

use bytes::Bytes;
use rtcp::source_description::{SdesType, SourceDescriptionItem};

use crate::config::SdesConfig;

/// LocalSource is the participant this engine speaks for.
#[derive(Debug, Clone)]
pub struct LocalSource {
    pub(crate) ssrc: u32,
    pub(crate) sdes: SdesConfig,
    pub(crate) packet_count: u32,
    pub(crate) octet_count: u32,
    pub(crate) last_report_packet_count: u32,
    pub(crate) control_sent: u64,
    pub(crate) clock_rate: u32,
    pub(crate) initial_timestamp: u32,
    pub(crate) started_at: SystemTime,
}

impl LocalSource {
    pub(crate) fn new(ssrc: u32, sdes: SdesConfig, clock_rate: u32, now: SystemTime) -> Self {
        LocalSource {
            ssrc,
            sdes,
            packet_count: 0,
            octet_count: 0,
            last_report_packet_count: 0,
            control_sent: 0,
            clock_rate,
            initial_timestamp: rand::random::<u32>(),
            started_at: now,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn packet_count(&self) -> u32 {
        self.packet_count
    }

    pub fn octet_count(&self) -> u32 {
        self.octet_count
    }

    /// Number of compound RTCP packets sent with the current SSRC.
    pub fn control_packets_sent(&self) -> u64 {
        self.control_sent
    }

    pub fn sdes(&self) -> &SdesConfig {
        &self.sdes
    }

    pub(crate) fn record_rtp_sent(&mut self, payload_len: usize) {
        self.packet_count = self.packet_count.wrapping_add(1);
        self.octet_count = self.octet_count.wrapping_add(payload_len as u32);
    }

    /// RTP was sent since the last report, so the next one is an SR.
    pub(crate) fn sent_since_last_report(&self) -> bool {
        self.packet_count != self.last_report_packet_count
    }

    pub(crate) fn has_sent_anything(&self) -> bool {
        self.packet_count > 0 || self.control_sent > 0
    }

    pub(crate) fn on_report_sent(&mut self) {
        self.last_report_packet_count = self.packet_count;
        self.control_sent += 1;
    }

    /// RTP timestamp matching wall clock `now` on the local media clock.
    /// Outgoing RTP should be stamped from it so SRs line up with the data.
    pub fn rtp_timestamp(&self, now: SystemTime) -> u32 {
        let elapsed = now.duration_since(self.started_at).unwrap_or_default();
        let ticks = (elapsed.as_secs_f64() * self.clock_rate as f64) as u64;
        self.initial_timestamp.wrapping_add(ticks as u32)
    }

    pub(crate) fn sdes_item(&self, sdes_type: SdesType) -> Option<SourceDescriptionItem> {
        if sdes_type == SdesType::SdesPrivate {
            let (prefix, value) = self.sdes.private.as_ref()?;
            return SourceDescriptionItem::private(prefix.as_bytes(), value.as_bytes()).ok();
        }
        self.sdes.text(sdes_type).map(|text| SourceDescriptionItem {
            sdes_type,
            text: Bytes::copy_from_slice(text.as_bytes()),
        })
    }

    /// renew switches to a fresh SSRC and restarts the sender counters.
    pub(crate) fn renew(&mut self, ssrc: u32, now: SystemTime) {
        self.ssrc = ssrc;
        self.packet_count = 0;
        self.octet_count = 0;
        self.last_report_packet_count = 0;
        self.control_sent = 0;
        self.initial_timestamp = rand::random::<u32>();
        self.started_at = now;
    }
}


use std::time::Duration;

use rtcp::header::{HEADER_LENGTH, SDES_MAX_OCTET_COUNT, SSRC_LENGTH};
use rtcp::sender_report::SenderReport;
use rtcp::source_description::SdesType;
use serde::{Deserialize, Serialize};
use util::marshal::MarshalSize;

use crate::error::{Error, Result};
use crate::interval::IntervalModel;

/// Longest BYE reason; longer reasons are truncated.
pub const MAX_REASON_LENGTH: usize = SDES_MAX_OCTET_COUNT;
/// BYE for one source carrying the longest reason.
pub const MAX_BYE_SIZE: usize =
    HEADER_LENGTH + SSRC_LENGTH + (1 + MAX_REASON_LENGTH).div_ceil(4) * 4;

/// Octets added below RTCP by IPv4 (20) and UDP (8).
pub const DEFAULT_HEADER_OVERHEAD: usize = 28;
pub const DEFAULT_PATH_MTU: usize = 1500;
pub const DEFAULT_CONTROL_FRACTION: f64 = 0.05;
pub const DEFAULT_SENDER_FRACTION: f64 = 0.25;
pub const DEFAULT_MIN_INTERVAL: Duration = IntervalModel::DEFAULT_MIN_INTERVAL;
pub const DEFAULT_LEAVING_DELAY: Duration = Duration::from_micros(1_000_000);
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_MEMBERS: usize = 8192;
pub const DEFAULT_CLOCK_RATE: u32 = 8000;

/// BandwidthConfig describes how much of the session bandwidth the control
/// channel may use and how it is split between senders and receivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthConfig {
    /// Session bandwidth in bits per second.
    pub session_bandwidth: u32,
    /// Share of the session bandwidth given to RTCP.
    pub control_fraction: f64,
    /// Share of the RTCP bandwidth reserved for senders.
    pub sender_fraction: f64,
    /// Floor of the deterministic interval for regular reports; the first
    /// report uses half of it.
    pub min_interval: Duration,
    /// Network and transport header octets counted against every compound
    /// packet, sent or received.
    pub header_overhead: usize,
}

impl Default for BandwidthConfig {
    fn default() -> Self {
        BandwidthConfig {
            session_bandwidth: 64_000,
            control_fraction: DEFAULT_CONTROL_FRACTION,
            sender_fraction: DEFAULT_SENDER_FRACTION,
            min_interval: DEFAULT_MIN_INTERVAL,
            header_overhead: DEFAULT_HEADER_OVERHEAD,
        }
    }
}

impl BandwidthConfig {
    pub fn receiver_fraction(&self) -> f64 {
        1.0 - self.sender_fraction
    }

    /// RTCP bandwidth in octets per second.
    pub fn control_bandwidth(&self) -> f64 {
        self.session_bandwidth as f64 * self.control_fraction / 8.0
    }

    fn validate(&self) -> Result<()> {
        for fraction in [self.control_fraction, self.sender_fraction] {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(Error::ErrInvalidBandwidthFraction(fraction));
            }
        }
        if self.min_interval.is_zero() {
            return Err(Error::ErrInvalidMinInterval);
        }
        Ok(())
    }
}

/// ByeNotification selects how `on_got_goodbye` fires when one BYE packet
/// lists several sources.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByeNotification {
    /// Once for every listed source that had not already left.
    #[default]
    PerSource,
    /// Only for the last listed source, as older stacks did.
    LastSourceOnly,
}

/// SdesConfig holds the local source description. Unset optional items are
/// never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdesConfig {
    pub cname: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub tool: Option<String>,
    pub note: Option<String>,
    /// PRIV item as (prefix, value).
    pub private: Option<(String, String)>,
}

impl Default for SdesConfig {
    fn default() -> Self {
        SdesConfig {
            cname: "user@localhost".to_owned(),
            name: None,
            email: None,
            phone: None,
            location: None,
            tool: Some(format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))),
            note: None,
            private: None,
        }
    }
}

impl SdesConfig {
    /// Text of a configured item, PRIV excluded.
    pub fn text(&self, sdes_type: SdesType) -> Option<&str> {
        let text = match sdes_type {
            SdesType::SdesCname => Some(&self.cname),
            SdesType::SdesName => self.name.as_ref(),
            SdesType::SdesEmail => self.email.as_ref(),
            SdesType::SdesPhone => self.phone.as_ref(),
            SdesType::SdesLocation => self.location.as_ref(),
            SdesType::SdesTool => self.tool.as_ref(),
            SdesType::SdesNote => self.note.as_ref(),
            SdesType::SdesEnd | SdesType::SdesPrivate => None,
        };
        text.map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    /// Optional item types that carry a value, in wire type order.
    pub fn configured_items(&self) -> Vec<SdesType> {
        let mut items: Vec<SdesType> = [
            SdesType::SdesName,
            SdesType::SdesEmail,
            SdesType::SdesPhone,
            SdesType::SdesLocation,
            SdesType::SdesTool,
            SdesType::SdesNote,
        ]
        .into_iter()
        .filter(|t| self.text(*t).is_some())
        .collect();
        if self.private.is_some() {
            items.push(SdesType::SdesPrivate);
        }
        items
    }

    fn validate(&self) -> Result<()> {
        if self.cname.is_empty() {
            return Err(Error::ErrEmptyCname);
        }
        for t in std::iter::once(SdesType::SdesCname).chain(self.configured_items()) {
            let len = match (t, &self.private) {
                (SdesType::SdesPrivate, Some((prefix, value))) => 1 + prefix.len() + value.len(),
                _ => self.text(t).map(str::len).unwrap_or(0),
            };
            if len > SDES_MAX_OCTET_COUNT {
                return Err(Error::ErrSdesItemTooLong(t.to_string()));
            }
        }
        Ok(())
    }

    /// Size of an SDES packet carrying only the CNAME chunk.
    pub(crate) fn cname_packet_size(&self) -> usize {
        // chunk: ssrc, type, length, text, END, then padding to 32 bits
        let chunk = SSRC_LENGTH + 2 + self.cname.len() + 1;
        HEADER_LENGTH + chunk.div_ceil(4) * 4
    }
}

/// SessionConfig is everything an application can tune on one RTCP session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub bandwidth: BandwidthConfig,
    /// Largest datagram the path carries, lower layer headers included.
    pub path_mtu: usize,
    /// How long a source that sent BYE stays in the table.
    pub leaving_delay: Duration,
    /// Bound used by `is_end_to_end_delayed`; None never reports a delay.
    pub end_to_end_delay: Option<Duration>,
    /// Upper bound on how long the control loop waits between ticks.
    pub check_interval: Duration,
    /// Expire sources that stay silent for several report intervals.
    pub silent_timeout: bool,
    /// Table size above which the least recently active source is evicted.
    pub max_members: usize,
    /// Member growth ratio that triggers forward reconsideration.
    pub reconsideration_threshold: f64,
    pub bye_notification: ByeNotification,
    /// Clock rate of the local RTP stream, used for SR timestamps and jitter.
    pub clock_rate: u32,
    pub sdes: SdesConfig,
    /// Fixed local SSRC; picked at random when None.
    pub local_ssrc: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            bandwidth: BandwidthConfig::default(),
            path_mtu: DEFAULT_PATH_MTU,
            leaving_delay: DEFAULT_LEAVING_DELAY,
            end_to_end_delay: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
            silent_timeout: true,
            max_members: DEFAULT_MAX_MEMBERS,
            reconsideration_threshold: 1.0,
            bye_notification: ByeNotification::default(),
            clock_rate: DEFAULT_CLOCK_RATE,
            sdes: SdesConfig::default(),
            local_ssrc: None,
        }
    }
}

impl SessionConfig {
    /// builder returns a SessionConfigBuilder seeded with the defaults.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Octets available to one compound packet.
    pub fn report_budget(&self) -> usize {
        self.path_mtu.saturating_sub(self.bandwidth.header_overhead)
    }

    /// validate rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.bandwidth.validate()?;
        self.sdes.validate()?;

        if self.check_interval.is_zero() {
            return Err(Error::ErrInvalidCheckInterval);
        }
        if !(self.reconsideration_threshold >= 1.0) {
            return Err(Error::ErrInvalidThreshold(self.reconsideration_threshold));
        }
        if self.max_members == 0 {
            return Err(Error::ErrInvalidMemberCap);
        }
        if self.clock_rate == 0 {
            return Err(Error::ErrInvalidClockRate);
        }
        if self.path_mtu <= self.bandwidth.header_overhead {
            return Err(Error::ErrPathMtuTooSmall {
                mtu: self.path_mtu,
                overhead: self.bandwidth.header_overhead,
            });
        }

        let budget = self.report_budget();
        // the leaving report: SR, CNAME and a BYE with the longest reason
        let needed =
            SenderReport::default().marshal_size() + self.sdes.cname_packet_size() + MAX_BYE_SIZE;
        if budget < needed {
            return Err(Error::ErrBudgetTooSmall { budget, needed });
        }

        Ok(())
    }
}

/// SessionConfigBuilder builds a SessionConfig the way the report
/// interceptors are configured.
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// with_session_bandwidth sets the session bandwidth in bits per second.
    pub fn with_session_bandwidth(mut self, bits_per_second: u32) -> Self {
        self.config.bandwidth.session_bandwidth = bits_per_second;
        self
    }

    pub fn with_control_fraction(mut self, fraction: f64) -> Self {
        self.config.bandwidth.control_fraction = fraction;
        self
    }

    pub fn with_sender_fraction(mut self, fraction: f64) -> Self {
        self.config.bandwidth.sender_fraction = fraction;
        self
    }

    /// with_min_interval overrides the 5 second floor.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.config.bandwidth.min_interval = interval;
        self
    }

    pub fn with_header_overhead(mut self, octets: usize) -> Self {
        self.config.bandwidth.header_overhead = octets;
        self
    }

    pub fn with_path_mtu(mut self, mtu: usize) -> Self {
        self.config.path_mtu = mtu;
        self
    }

    pub fn with_leaving_delay(mut self, delay: Duration) -> Self {
        self.config.leaving_delay = delay;
        self
    }

    pub fn with_end_to_end_delay(mut self, delay: Duration) -> Self {
        self.config.end_to_end_delay = Some(delay);
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval = interval;
        self
    }

    pub fn with_silent_timeout(mut self, enabled: bool) -> Self {
        self.config.silent_timeout = enabled;
        self
    }

    pub fn with_max_members(mut self, max_members: usize) -> Self {
        self.config.max_members = max_members;
        self
    }

    pub fn with_reconsideration_threshold(mut self, threshold: f64) -> Self {
        self.config.reconsideration_threshold = threshold;
        self
    }

    pub fn with_bye_notification(mut self, mode: ByeNotification) -> Self {
        self.config.bye_notification = mode;
        self
    }

    pub fn with_clock_rate(mut self, clock_rate: u32) -> Self {
        self.config.clock_rate = clock_rate;
        self
    }

    pub fn with_cname(mut self, cname: impl Into<String>) -> Self {
        self.config.sdes.cname = cname.into();
        self
    }

    /// with_sdes replaces the whole source description.
    pub fn with_sdes(mut self, sdes: SdesConfig) -> Self {
        self.config.sdes = sdes;
        self
    }

    pub fn with_local_ssrc(mut self, ssrc: u32) -> Self {
        self.config.local_ssrc = Some(ssrc);
        self
    }

    /// build validates and returns the configuration.
    pub fn build(self) -> Result<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

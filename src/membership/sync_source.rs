use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::SystemTime;

use bytes::Bytes;
use rtcp::reception_report::ReceptionReport;
use rtcp::source_description::SdesType;

use super::reception::ReceptionStats;

/// Origin is the transport address a packet arrived from. Compared by value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Origin(pub SocketAddr);

impl From<SocketAddr> for Origin {
    fn from(addr: SocketAddr) -> Self {
        Origin(addr)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which of a participant's two flows a packet belongs to. RTP and RTCP use
/// different ports, so each keeps its own stored origin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OriginKind {
    Data,
    Control,
}

/// Endpoint is the stored origin for one flow of a source, plus the origin a
/// single unconfirmed packet claimed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub origin: Option<Origin>,
    pub pending: Option<Origin>,
}

/// Read-only accessors for the RTP header fields the engine cares about.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RtpPacketInfo {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub payload_type: u8,
    pub payload_len: usize,
}

/// Sender information from the most recent SR of a source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SenderInfo {
    pub ntp_time: u64,
    pub rtp_time: u32,
    pub packet_count: u32,
    pub octet_count: u32,
    /// Local time the SR arrived.
    pub received_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub reason: Bytes,
    pub at: SystemTime,
}

/// SyncSource is one participant, local or remote, seen in the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSource {
    pub(crate) ssrc: u32,
    pub(crate) data: Endpoint,
    pub(crate) control: Endpoint,
    pub(crate) last_activity: SystemTime,
    pub(crate) last_data: Option<SystemTime>,
    pub(crate) sender_info: Option<SenderInfo>,
    pub(crate) receiver_info: Option<ReceptionReport>,
    pub(crate) sdes: BTreeMap<SdesType, Bytes>,
    pub(crate) validated: bool,
    pub(crate) is_sender: bool,
    pub(crate) is_local: bool,
    pub(crate) departure: Option<Departure>,
    pub(crate) reception: Option<ReceptionStats>,
}

impl SyncSource {
    pub(crate) fn new(ssrc: u32, now: SystemTime) -> Self {
        SyncSource {
            ssrc,
            data: Endpoint::default(),
            control: Endpoint::default(),
            last_activity: now,
            last_data: None,
            sender_info: None,
            receiver_info: None,
            sdes: BTreeMap::new(),
            validated: false,
            is_sender: false,
            is_local: false,
            departure: None,
            reception: None,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn endpoint(&self, kind: OriginKind) -> &Endpoint {
        match kind {
            OriginKind::Data => &self.data,
            OriginKind::Control => &self.control,
        }
    }

    pub(crate) fn endpoint_mut(&mut self, kind: OriginKind) -> &mut Endpoint {
        match kind {
            OriginKind::Data => &mut self.data,
            OriginKind::Control => &mut self.control,
        }
    }

    /// Stored origin of the given flow.
    pub fn origin(&self, kind: OriginKind) -> Option<Origin> {
        self.endpoint(kind).origin
    }

    pub fn last_activity(&self) -> SystemTime {
        self.last_activity
    }

    pub fn sender_info(&self) -> Option<&SenderInfo> {
        self.sender_info.as_ref()
    }

    /// The last report block this source sent about the local source.
    pub fn receiver_info(&self) -> Option<&ReceptionReport> {
        self.receiver_info.as_ref()
    }

    pub fn sdes_item(&self, sdes_type: SdesType) -> Option<&Bytes> {
        self.sdes.get(&sdes_type)
    }

    pub fn cname(&self) -> Option<&Bytes> {
        self.sdes_item(SdesType::SdesCname)
    }

    /// Validated sources passed RTP probation or sent an RTCP report.
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn is_sender(&self) -> bool {
        self.is_sender
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn departure(&self) -> Option<&Departure> {
        self.departure.as_ref()
    }

    pub fn has_departed(&self) -> bool {
        self.departure.is_some()
    }
}

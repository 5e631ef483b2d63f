
use std::any::Any;

use bytes::{Buf, BufMut, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::reception_report::*;
use crate::util::*;

type Result<T> = std::result::Result<T, util::Error>;

/// Sender SSRC plus the 20 octets of sender info.
pub(crate) const SR_HEADER_LENGTH: usize = 24;

/// SenderReport (SR, RFC 3550 section 6.4.1): transmission statistics of an
/// active sender followed by its reception report blocks.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct SenderReport {
    pub ssrc: u32,
    /// 64-bit NTP wallclock time at which the report was built.
    pub ntp_time: u64,
    /// The same instant on the RTP media clock.
    pub rtp_time: u32,
    /// RTP packets sent since the source started.
    pub packet_count: u32,
    /// RTP payload octets sent since the source started.
    pub octet_count: u32,
    pub reports: Vec<ReceptionReport>,
    /// Profile specific extension, passed through untouched.
    pub profile_extensions: Bytes,
}

impl Packet for SenderReport {
    fn packet_type(&self) -> PacketType {
        PacketType::SenderReport
    }

    fn count(&self) -> usize {
        self.reports.len()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

impl MarshalSize for SenderReport {
    fn marshal_size(&self) -> usize {
        align32(
            HEADER_LENGTH
                + SR_HEADER_LENGTH
                + self.reports.len() * RECEPTION_REPORT_LENGTH
                + self.profile_extensions.len(),
        )
    }
}

impl Marshal for SenderReport {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        ReceptionReport::check_all(&self.reports)?;

        encode(self, buf, |mut body| {
            let len = body.len();
            body.put_u32(self.ssrc);
            body.put_u64(self.ntp_time);
            body.put_u32(self.rtp_time);
            body.put_u32(self.packet_count);
            body.put_u32(self.octet_count);
            for report in &self.reports {
                report.put(&mut body);
            }
            body.put_slice(&self.profile_extensions);
            Ok(len - body.len())
        })
    }
}

impl Unmarshal for SenderReport {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let (header, mut body) = decode(raw_packet, PacketType::SenderReport)?;
        let blocks = header.count as usize;
        if body.remaining() < SR_HEADER_LENGTH + blocks * RECEPTION_REPORT_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let ssrc = body.get_u32();
        let ntp_time = body.get_u64();
        let rtp_time = body.get_u32();
        let packet_count = body.get_u32();
        let octet_count = body.get_u32();
        let reports = (0..blocks)
            .map(|_| ReceptionReport::unmarshal(&mut body))
            .collect::<Result<Vec<_>>>()?;

        Ok(SenderReport {
            ssrc,
            ntp_time,
            rtp_time,
            packet_count,
            octet_count,
            reports,
            profile_extensions: body,
        })
    }
}

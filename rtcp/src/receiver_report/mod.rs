
use std::any::Any;

use bytes::{Buf, BufMut, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::reception_report::*;
use crate::util::*;

type Result<T> = std::result::Result<T, util::Error>;

/// ReceiverReport (RR, RFC 3550 section 6.4.2): reception report blocks from
/// a participant that did not send RTP since its previous report.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReceptionReport>,
    /// Profile specific extension, passed through untouched.
    pub profile_extensions: Bytes,
}

impl Packet for ReceiverReport {
    fn packet_type(&self) -> PacketType {
        PacketType::ReceiverReport
    }

    fn count(&self) -> usize {
        self.reports.len()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

impl MarshalSize for ReceiverReport {
    fn marshal_size(&self) -> usize {
        align32(
            HEADER_LENGTH
                + SSRC_LENGTH
                + self.reports.len() * RECEPTION_REPORT_LENGTH
                + self.profile_extensions.len(),
        )
    }
}

impl Marshal for ReceiverReport {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        ReceptionReport::check_all(&self.reports)?;

        encode(self, buf, |mut body| {
            let len = body.len();
            body.put_u32(self.ssrc);
            for report in &self.reports {
                report.put(&mut body);
            }
            body.put_slice(&self.profile_extensions);
            Ok(len - body.len())
        })
    }
}

impl Unmarshal for ReceiverReport {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let (header, mut body) = decode(raw_packet, PacketType::ReceiverReport)?;
        let blocks = header.count as usize;
        if body.remaining() < SSRC_LENGTH + blocks * RECEPTION_REPORT_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let ssrc = body.get_u32();
        let reports = (0..blocks)
            .map(|_| ReceptionReport::unmarshal(&mut body))
            .collect::<Result<Vec<_>>>()?;

        Ok(ReceiverReport {
            ssrc,
            reports,
            profile_extensions: body,
        })
    }
}

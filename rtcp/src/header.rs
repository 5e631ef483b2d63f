use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;

/// RTCP packet types of RFC 3550 section 12.1. Anything else decodes as
/// `Unsupported` and is carried as a raw packet.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    #[default]
    Unsupported = 0,
    SenderReport = 200,
    ReceiverReport = 201,
    SourceDescription = 202,
    Goodbye = 203,
    ApplicationDefined = 204,
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PacketType::Unsupported => "Unsupported",
            PacketType::SenderReport => "SR",
            PacketType::ReceiverReport => "RR",
            PacketType::SourceDescription => "SDES",
            PacketType::Goodbye => "BYE",
            PacketType::ApplicationDefined => "APP",
        })
    }
}

impl From<u8> for PacketType {
    fn from(b: u8) -> Self {
        [
            PacketType::SenderReport,
            PacketType::ReceiverReport,
            PacketType::SourceDescription,
            PacketType::Goodbye,
            PacketType::ApplicationDefined,
        ]
        .into_iter()
        .find(|t| *t as u8 == b)
        .unwrap_or(PacketType::Unsupported)
    }
}

pub const RTP_VERSION: u8 = 2;

const VERSION_BITS: u8 = 0b1100_0000;
const PADDING_BIT: u8 = 0b0010_0000;
const COUNT_BITS: u8 = 0b0001_1111;

pub const HEADER_LENGTH: usize = 4;
/// Largest value of the five bit count field.
pub const COUNT_MAX: usize = COUNT_BITS as usize;
pub const SSRC_LENGTH: usize = 4;
/// Largest SDES item text, and largest BYE reason.
pub const SDES_MAX_OCTET_COUNT: usize = u8::MAX as usize;

/// The four octet header in front of every RTCP packet.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct Header {
    /// Padding octets follow the payload, the last one holding their count.
    pub padding: bool,
    /// Report, chunk or source count, or the APP subtype.
    pub count: u8,
    pub packet_type: PacketType,
    /// Packet length in 32-bit words minus one, header and padding included.
    pub length: u16,
}

impl Header {
    /// Total size on the wire of the packet this header describes.
    pub fn packet_size(&self) -> usize {
        (self.length as usize + 1) * 4
    }

    fn first_octet(&self) -> u8 {
        let mut b0 = RTP_VERSION << VERSION_BITS.trailing_zeros();
        if self.padding {
            b0 |= PADDING_BIT;
        }
        b0 | (self.count & COUNT_BITS)
    }
}

impl MarshalSize for Header {
    fn marshal_size(&self) -> usize {
        HEADER_LENGTH
    }
}

impl Marshal for Header {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        if self.count as usize > COUNT_MAX {
            return Err(Error::InvalidHeader.into());
        }
        if buf.len() < HEADER_LENGTH {
            return Err(Error::BufferTooShort.into());
        }

        buf.put_u8(self.first_octet());
        buf.put_u8(self.packet_type as u8);
        buf.put_u16(self.length);
        Ok(HEADER_LENGTH)
    }
}

impl Unmarshal for Header {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self, util::Error>
    where
        Self: Sized,
        B: Buf,
    {
        if raw_packet.remaining() < HEADER_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let b0 = raw_packet.get_u8();
        if (b0 & VERSION_BITS) >> VERSION_BITS.trailing_zeros() != RTP_VERSION {
            return Err(Error::BadVersion.into());
        }

        Ok(Header {
            padding: b0 & PADDING_BIT != 0,
            count: b0 & COUNT_BITS,
            packet_type: raw_packet.get_u8().into(),
            length: raw_packet.get_u16(),
        })
    }
}

/// Reads the raw packet type octet of the header at the front of `raw`,
/// without validating anything. Used to report types this crate does not know.
pub fn raw_packet_type(raw: &[u8]) -> Option<u8> {
    raw.get(1).copied()
}

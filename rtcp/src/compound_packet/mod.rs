#[cfg(test)]
mod compound_packet_test;

use bytes::Bytes;
use util::marshal::Unmarshal;

use crate::application_defined::ApplicationDefined;
use crate::error::{Error, Result};
use crate::goodbye::Goodbye;
use crate::header::*;
use crate::packet::Packet;
use crate::raw_packet::RawPacket;
use crate::receiver_report::ReceiverReport;
use crate::sender_report::SenderReport;
use crate::source_description::{SdesType, SourceDescription};

/// One sub-packet of a received compound datagram, still in wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPacket {
    pub header: Header,
    /// The whole sub-packet, header included.
    pub raw: Bytes,
}

impl SubPacket {
    /// Raw packet type octet, kept even for types `PacketType` does not know.
    pub fn raw_type(&self) -> u8 {
        raw_packet_type(&self.raw).unwrap_or(0)
    }

    /// First 32-bit word after the header: the sender SSRC for SR, RR and APP,
    /// the first chunk SSRC for SDES, the first listed source for BYE.
    pub fn first_ssrc(&self) -> Option<u32> {
        let b = self.raw.get(HEADER_LENGTH..HEADER_LENGTH + SSRC_LENGTH)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn decode<P>(&self) -> Result<P>
    where
        P: Unmarshal,
    {
        Ok(P::unmarshal(&mut self.raw.clone())?)
    }

    /// Decodes into the packet type named by the header; unknown types
    /// come back as a `RawPacket`.
    pub fn to_packet(&self) -> Result<Box<dyn Packet + Send + Sync>> {
        Ok(match self.header.packet_type {
            PacketType::SenderReport => Box::new(self.decode::<SenderReport>()?),
            PacketType::ReceiverReport => Box::new(self.decode::<ReceiverReport>()?),
            PacketType::SourceDescription => Box::new(self.decode::<SourceDescription>()?),
            PacketType::Goodbye => Box::new(self.decode::<Goodbye>()?),
            PacketType::ApplicationDefined => Box::new(self.decode::<ApplicationDefined>()?),
            PacketType::Unsupported => Box::new(self.decode::<RawPacket>()?),
        })
    }
}

/// CompoundReader walks a received compound datagram sub-packet by sub-packet,
/// trusting nothing but the declared length fields.
///
/// A header that cannot be read, or whose length runs past the end of the
/// datagram, yields one error and ends the iteration. Everything yielded
/// before it stays valid.
#[derive(Debug, Clone)]
pub struct CompoundReader {
    raw: Bytes,
    offset: usize,
    done: bool,
}

impl CompoundReader {
    pub fn new(raw: Bytes) -> Self {
        CompoundReader {
            raw,
            offset: 0,
            done: false,
        }
    }

    /// Total datagram length.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl Iterator for CompoundReader {
    type Item = Result<SubPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.raw.len() {
            return None;
        }

        let rest = self.raw.slice(self.offset..);
        let header = match Header::unmarshal(&mut rest.clone()) {
            Ok(h) => h,
            Err(err) => {
                self.done = true;
                return Some(Err(err.into()));
            }
        };

        let size = header.packet_size();
        if size > rest.len() {
            self.done = true;
            return Some(Err(Error::PacketTooShort));
        }

        self.offset += size;
        Some(Ok(SubPacket {
            header,
            raw: rest.slice(..size),
        }))
    }
}

/// validate checks the RFC 3550 rules for a compound packet this stack sends:
/// it starts with an SR or RR and carries an SDES CNAME.
pub fn validate(packets: &[Box<dyn Packet + Send + Sync>]) -> Result<()> {
    let first = packets.first().ok_or(Error::EmptyCompound)?;

    let first_is_report = first.as_any().downcast_ref::<SenderReport>().is_some()
        || first.as_any().downcast_ref::<ReceiverReport>().is_some();
    if !first_is_report {
        return Err(Error::BadFirstPacket);
    }

    for pkt in &packets[1..] {
        if let Some(sdes) = pkt.as_any().downcast_ref::<SourceDescription>() {
            let has_cname = sdes
                .chunks
                .iter()
                .any(|c| c.item(SdesType::SdesCname).is_some());
            if has_cname {
                return Ok(());
            }
        }
    }

    Err(Error::MissingCname)
}

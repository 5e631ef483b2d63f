#[cfg(test)]
mod goodbye_test;

use std::any::Any;

use bytes::{Buf, BufMut, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::util::*;

type Result<T> = std::result::Result<T, util::Error>;

/// Goodbye (BYE, RFC 3550 section 6.6): the listed sources are leaving.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct Goodbye {
    pub sources: Vec<u32>,
    /// Optional reason for leaving, at most 255 octets.
    pub reason: Bytes,
}

impl Goodbye {
    fn reason_size(&self) -> usize {
        if self.reason.is_empty() {
            0
        } else {
            1 + self.reason.len()
        }
    }
}

impl Packet for Goodbye {
    fn packet_type(&self) -> PacketType {
        PacketType::Goodbye
    }

    fn count(&self) -> usize {
        self.sources.len()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

impl MarshalSize for Goodbye {
    fn marshal_size(&self) -> usize {
        align32(HEADER_LENGTH + self.sources.len() * SSRC_LENGTH + self.reason_size())
    }
}

impl Marshal for Goodbye {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        if self.sources.len() > COUNT_MAX {
            return Err(Error::TooManySources.into());
        }
        if self.reason.len() > SDES_MAX_OCTET_COUNT {
            return Err(Error::ReasonTooLong.into());
        }

        // a reason that does not end on a word boundary is followed by null
        // octets, not RTCP padding
        encode(self, buf, |mut body| {
            let len = body.len();
            self.sources.iter().for_each(|s| body.put_u32(*s));
            if !self.reason.is_empty() {
                body.put_u8(self.reason.len() as u8);
                body.put_slice(&self.reason);
            }
            Ok(len - body.len())
        })
    }
}

impl Unmarshal for Goodbye {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let (header, mut body) = decode(raw_packet, PacketType::Goodbye)?;
        let count = header.count as usize;
        if body.remaining() < count * SSRC_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let sources = (0..count).map(|_| body.get_u32()).collect();
        let reason = match body.first().copied() {
            None => Bytes::new(),
            Some(n) if 1 + n as usize <= body.len() => body.slice(1..1 + n as usize),
            Some(_) => return Err(Error::PacketTooShort.into()),
        };

        Ok(Goodbye { sources, reason })
    }
}

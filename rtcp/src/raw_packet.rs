use std::any::Any;

use bytes::{Buf, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;

/// A packet of a type this crate does not decode, kept in wire form so it
/// can be reported or forwarded as is.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct RawPacket(pub Bytes);

impl RawPacket {
    /// The type octet as it appeared on the wire.
    pub fn raw_type(&self) -> Option<u8> {
        raw_packet_type(&self.0)
    }
}

impl Packet for RawPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Unsupported
    }

    fn count(&self) -> usize {
        self.header().count as usize
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn header(&self) -> Header {
        Header::unmarshal(&mut self.0.clone()).unwrap_or_default()
    }
}

impl MarshalSize for RawPacket {
    fn marshal_size(&self) -> usize {
        self.0.len()
    }
}

impl Marshal for RawPacket {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize, util::Error> {
        let out = buf
            .get_mut(..self.0.len())
            .ok_or(Error::BufferTooShort)?;
        out.copy_from_slice(&self.0);
        Ok(self.0.len())
    }
}

impl Unmarshal for RawPacket {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self, util::Error>
    where
        Self: Sized,
        B: Buf,
    {
        let raw = raw_packet.copy_to_bytes(raw_packet.remaining());
        let size = Header::unmarshal(&mut raw.clone())?.packet_size();
        if size > raw.len() {
            return Err(Error::PacketTooShort.into());
        }
        Ok(RawPacket(raw.slice(..size)))
    }
}

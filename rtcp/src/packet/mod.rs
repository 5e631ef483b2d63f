
use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use util::marshal::Marshal;

use crate::compound_packet::CompoundReader;
use crate::error::{Error, Result};
use crate::header::{Header, PacketType};

/// Packet is one RTCP packet of a compound datagram.
///
/// Implementors describe their header through `packet_type` and `count`;
/// the length field follows from the marshalled size.
pub trait Packet: Marshal + fmt::Debug + Send + Sync {
    fn packet_type(&self) -> PacketType;

    /// Value of the five bit count field.
    fn count(&self) -> usize;

    fn as_any(&self) -> &(dyn Any + Send + Sync);

    fn header(&self) -> Header {
        Header {
            padding: false,
            count: self.count() as u8,
            packet_type: self.packet_type(),
            length: (self.marshal_size() / 4).saturating_sub(1) as u16,
        }
    }
}

/// marshal concatenates `packets` into one compound datagram.
pub fn marshal(packets: &[Box<dyn Packet + Send + Sync>]) -> Result<Bytes> {
    let size = packets.iter().map(|p| p.marshal_size()).sum();
    let mut out = BytesMut::with_capacity(size);
    for p in packets {
        out.put(p.marshal()?);
    }
    Ok(out.freeze())
}

/// unmarshal decodes every packet of a compound datagram and fails on the
/// first bad one. `CompoundReader` keeps what precedes a bad packet instead.
pub fn unmarshal<B>(raw_data: &mut B) -> Result<Vec<Box<dyn Packet + Send + Sync>>>
where
    B: Buf,
{
    let raw = raw_data.copy_to_bytes(raw_data.remaining());
    if raw.is_empty() {
        return Err(Error::InvalidHeader);
    }

    CompoundReader::new(raw)
        .map(|sub| sub.and_then(|sub| sub.to_packet()))
        .collect()
}

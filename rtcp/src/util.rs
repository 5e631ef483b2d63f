use bytes::{Buf, Bytes};
use util::marshal::{Marshal, Unmarshal};

use crate::error::Error;
use crate::header::{Header, PacketType};
use crate::packet::Packet;

/// Rounds `len` up to the next 32-bit boundary.
pub(crate) fn align32(len: usize) -> usize {
    len.div_ceil(4) * 4
}

/// encode writes the header of `packet`, lets `body` fill in what follows
/// and zero fills up to the aligned size. `body` returns the octets it wrote.
pub(crate) fn encode<P, F>(packet: &P, buf: &mut [u8], body: F) -> Result<usize, util::Error>
where
    P: Packet + ?Sized,
    F: FnOnce(&mut [u8]) -> Result<usize, util::Error>,
{
    let size = packet.marshal_size();
    if buf.len() < size {
        return Err(Error::BufferTooShort.into());
    }

    let n = packet.header().marshal_to(buf)?;
    let written = n + body(&mut buf[n..size])?;
    buf[written..size].fill(0);
    Ok(size)
}

/// decode reads a header of type `want` and returns it together with the
/// packet body, RTCP padding removed.
pub(crate) fn decode<B>(raw_packet: &mut B, want: PacketType) -> Result<(Header, Bytes), Error>
where
    B: Buf,
{
    let header = Header::unmarshal(raw_packet)?;
    if header.packet_type != want {
        return Err(Error::WrongType);
    }
    let body = read_body(&header, raw_packet)?;
    Ok((header, body))
}

/// read_body pulls the body of the packet described by `header` out of
/// `raw_packet`, dropping RTCP padding when the padding bit is set.
pub(crate) fn read_body<B>(header: &Header, raw_packet: &mut B) -> Result<Bytes, Error>
where
    B: Buf,
{
    let body_len = header.length as usize * 4;
    if raw_packet.remaining() < body_len {
        return Err(Error::PacketTooShort);
    }
    let body = raw_packet.copy_to_bytes(body_len);

    if !header.padding {
        return Ok(body);
    }

    // the last padding octet counts the padding, itself included
    match body.last().map(|&n| n as usize) {
        Some(n) if n > 0 && n <= body.len() => Ok(body.slice(..body.len() - n)),
        _ => Err(Error::WrongPadding),
    }
}

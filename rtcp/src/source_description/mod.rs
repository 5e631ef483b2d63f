#[cfg(test)]
mod source_description_test;

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::util::*;

type Result<T> = std::result::Result<T, util::Error>;

/// Type and length octets in front of every item.
const SDES_ITEM_OVERHEAD: usize = 2;

/// SDES item types of RFC 3550 section 6.5. `SdesEnd` terminates the item
/// list of a chunk and is never a real item.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SdesType {
    #[default]
    SdesEnd = 0,
    SdesCname = 1,
    SdesName = 2,
    SdesEmail = 3,
    SdesPhone = 4,
    SdesLocation = 5,
    SdesTool = 6,
    SdesNote = 7,
    SdesPrivate = 8,
}

const SDES_TYPES: [SdesType; 9] = [
    SdesType::SdesEnd,
    SdesType::SdesCname,
    SdesType::SdesName,
    SdesType::SdesEmail,
    SdesType::SdesPhone,
    SdesType::SdesLocation,
    SdesType::SdesTool,
    SdesType::SdesNote,
    SdesType::SdesPrivate,
];

impl SdesType {
    /// None for item types this crate does not know.
    pub fn from_wire(b: u8) -> Option<SdesType> {
        SDES_TYPES.get(b as usize).copied()
    }
}

impl fmt::Display for SdesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SdesType::SdesEnd => "END",
            SdesType::SdesCname => "CNAME",
            SdesType::SdesName => "NAME",
            SdesType::SdesEmail => "EMAIL",
            SdesType::SdesPhone => "PHONE",
            SdesType::SdesLocation => "LOC",
            SdesType::SdesTool => "TOOL",
            SdesType::SdesNote => "NOTE",
            SdesType::SdesPrivate => "PRIV",
        })
    }
}

impl From<u8> for SdesType {
    fn from(b: u8) -> Self {
        SdesType::from_wire(b).unwrap_or(SdesType::SdesEnd)
    }
}

/// One item of a chunk. The text is raw octets; RFC 3550 asks for UTF-8 but
/// nothing here relies on it.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct SourceDescriptionItem {
    pub sdes_type: SdesType,
    pub text: Bytes,
}

impl SourceDescriptionItem {
    /// Builds a PRIV item: one octet of prefix length, the prefix, then the value.
    pub fn private(prefix: &[u8], value: &[u8]) -> std::result::Result<Self, Error> {
        let len = 1 + prefix.len() + value.len();
        if len > SDES_MAX_OCTET_COUNT {
            return Err(Error::SdesTextTooLong);
        }
        let mut text = BytesMut::with_capacity(len);
        text.put_u8(prefix.len() as u8);
        text.put_slice(prefix);
        text.put_slice(value);
        Ok(SourceDescriptionItem {
            sdes_type: SdesType::SdesPrivate,
            text: text.freeze(),
        })
    }

    /// Splits a PRIV item into (prefix, value). None for other types or a
    /// prefix length pointing past the text.
    pub fn private_parts(&self) -> Option<(Bytes, Bytes)> {
        if self.sdes_type != SdesType::SdesPrivate {
            return None;
        }
        let prefix_len = *self.text.first()? as usize;
        if 1 + prefix_len > self.text.len() {
            return None;
        }
        Some((
            self.text.slice(1..1 + prefix_len),
            self.text.slice(1 + prefix_len..),
        ))
    }

    fn check(&self) -> std::result::Result<(), Error> {
        if self.sdes_type == SdesType::SdesEnd {
            return Err(Error::SdesMissingType);
        }
        if self.text.len() > SDES_MAX_OCTET_COUNT {
            return Err(Error::SdesTextTooLong);
        }
        Ok(())
    }
}

/// The items describing one source. On the wire the item list ends with a
/// null octet and the chunk is zero filled to a word boundary.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct SourceDescriptionChunk {
    pub source: u32,
    pub items: Vec<SourceDescriptionItem>,
}

impl SourceDescriptionChunk {
    /// Returns the text of the first item of the given type.
    pub fn item(&self, sdes_type: SdesType) -> Option<&Bytes> {
        self.items
            .iter()
            .find(|it| it.sdes_type == sdes_type)
            .map(|it| &it.text)
    }

    fn items_len(&self) -> usize {
        self.items
            .iter()
            .map(|it| SDES_ITEM_OVERHEAD + it.text.len())
            .sum()
    }

    fn size(&self) -> usize {
        align32(SSRC_LENGTH + self.items_len() + 1)
    }

    fn put<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.source);
        for it in &self.items {
            buf.put_u8(it.sdes_type as u8);
            buf.put_u8(it.text.len() as u8);
            buf.put_slice(&it.text);
        }
        // terminating null plus fill
        buf.put_bytes(0, self.size() - SSRC_LENGTH - self.items_len());
    }

    /// Reads one chunk. Item text is copied by its declared length only;
    /// items of unknown type are skipped.
    fn read(body: &mut Bytes) -> std::result::Result<Self, Error> {
        if body.remaining() < SSRC_LENGTH + 1 {
            return Err(Error::PacketTooShort);
        }

        let start = body.remaining();
        let source = body.get_u32();
        let mut items = vec![];
        loop {
            if !body.has_remaining() {
                return Err(Error::PacketTooShort);
            }
            let raw_type = body.get_u8();
            if raw_type == SdesType::SdesEnd as u8 {
                break;
            }

            if !body.has_remaining() {
                return Err(Error::PacketTooShort);
            }
            let len = body.get_u8() as usize;
            if body.remaining() < len {
                return Err(Error::PacketTooShort);
            }
            let text = body.split_to(len);
            if let Some(sdes_type) = SdesType::from_wire(raw_type) {
                items.push(SourceDescriptionItem { sdes_type, text });
            }
        }

        let read = start - body.remaining();
        let fill = align32(read) - read;
        if body.remaining() < fill {
            return Err(Error::PacketTooShort);
        }
        body.advance(fill);

        Ok(SourceDescriptionChunk { source, items })
    }
}

/// SourceDescription (SDES, RFC 3550 section 6.5).
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct SourceDescription {
    pub chunks: Vec<SourceDescriptionChunk>,
}

impl SourceDescription {
    /// A single chunk carrying the CNAME of `source`.
    pub fn with_cname(source: u32, cname: Bytes) -> Self {
        SourceDescription {
            chunks: vec![SourceDescriptionChunk {
                source,
                items: vec![SourceDescriptionItem {
                    sdes_type: SdesType::SdesCname,
                    text: cname,
                }],
            }],
        }
    }
}

impl Packet for SourceDescription {
    fn packet_type(&self) -> PacketType {
        PacketType::SourceDescription
    }

    fn count(&self) -> usize {
        self.chunks.len()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

impl MarshalSize for SourceDescription {
    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + self.chunks.iter().map(|c| c.size()).sum::<usize>()
    }
}

impl Marshal for SourceDescription {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        if self.chunks.len() > COUNT_MAX {
            return Err(Error::TooManyChunks.into());
        }
        self.chunks
            .iter()
            .flat_map(|c| c.items.iter())
            .try_for_each(SourceDescriptionItem::check)?;

        encode(self, buf, |mut body| {
            let len = body.len();
            for chunk in &self.chunks {
                chunk.put(&mut body);
            }
            Ok(len - body.len())
        })
    }
}

impl Unmarshal for SourceDescription {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let (header, mut body) = decode(raw_packet, PacketType::SourceDescription)?;

        let chunks = (0..header.count)
            .map(|_| SourceDescriptionChunk::read(&mut body))
            .collect::<std::result::Result<Vec<_>, Error>>()?;

        Ok(SourceDescription { chunks })
    }
}

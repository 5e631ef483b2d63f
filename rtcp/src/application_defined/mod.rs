#[cfg(test)]
mod application_defined_test;

use std::any::Any;

use bytes::{Buf, BufMut, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::util::*;

type Result<T> = std::result::Result<T, util::Error>;

pub(crate) const APP_NAME_LENGTH: usize = 4;

/// ApplicationDefined (APP, RFC 3550 section 6.7). The payload is opaque to
/// this crate and handed to the application as is.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct ApplicationDefined {
    /// Carried in the count field, so at most 31.
    pub sub_type: u8,
    pub ssrc: u32,
    /// Four ASCII characters naming the application.
    pub name: [u8; APP_NAME_LENGTH],
    /// Must be a multiple of four octets long.
    pub data: Bytes,
}

impl Packet for ApplicationDefined {
    fn packet_type(&self) -> PacketType {
        PacketType::ApplicationDefined
    }

    fn count(&self) -> usize {
        self.sub_type as usize
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}

impl MarshalSize for ApplicationDefined {
    fn marshal_size(&self) -> usize {
        HEADER_LENGTH + SSRC_LENGTH + APP_NAME_LENGTH + self.data.len()
    }
}

impl Marshal for ApplicationDefined {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        if self.sub_type as usize > COUNT_MAX {
            return Err(Error::InvalidSubType.into());
        }
        if self.data.len() % 4 != 0 {
            return Err(Error::WrongPadding.into());
        }

        encode(self, buf, |mut body| {
            let len = body.len();
            body.put_u32(self.ssrc);
            body.put_slice(&self.name);
            body.put_slice(&self.data);
            Ok(len - body.len())
        })
    }
}

impl Unmarshal for ApplicationDefined {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        let (header, mut body) = decode(raw_packet, PacketType::ApplicationDefined)?;
        if body.remaining() < SSRC_LENGTH + APP_NAME_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let ssrc = body.get_u32();
        let mut name = [0u8; APP_NAME_LENGTH];
        body.copy_to_slice(&mut name);

        Ok(ApplicationDefined {
            sub_type: header.count,
            ssrc,
            name,
            data: body,
        })
    }
}

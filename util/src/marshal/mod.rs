
use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Exact size in octets of the wire form.
pub trait MarshalSize {
    fn marshal_size(&self) -> usize;
}

/// Writes the wire form into a caller supplied buffer.
pub trait Marshal: MarshalSize {
    /// Returns the number of octets written. Fails without writing a
    /// partial packet if `buf` is shorter than `marshal_size`.
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize>;

    /// Marshals into a fresh buffer of exactly `marshal_size` octets.
    fn marshal(&self) -> Result<Bytes> {
        let size = self.marshal_size();
        let mut buf = BytesMut::zeroed(size);
        let n = self.marshal_to(&mut buf)?;
        if n != size {
            return Err(Error::ErrMarshalSizeMismatch(n, size));
        }
        Ok(buf.freeze())
    }
}

pub trait Unmarshal: MarshalSize {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf;
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("total lost does not fit 24 bits")]
    InvalidTotalLost,
    #[error("invalid header")]
    InvalidHeader,
    #[error("empty compound packet")]
    EmptyCompound,
    #[error("first packet in compound must be SR or RR")]
    BadFirstPacket,
    #[error("compound missing SDES with CNAME")]
    MissingCname,
    /// More report blocks than the count field holds.
    #[error("too many reports")]
    TooManyReports,
    #[error("too many chunks")]
    TooManyChunks,
    #[error("too many sources")]
    TooManySources,
    /// Input ended before the declared length.
    #[error("packet too short to be read")]
    PacketTooShort,
    #[error("buffer too short to be written")]
    BufferTooShort,
    #[error("wrong packet type")]
    WrongType,
    #[error("SDES text must be at most 255 octets")]
    SdesTextTooLong,
    /// An item with type END where a real item was expected.
    #[error("SDES item missing type")]
    SdesMissingType,
    #[error("BYE reason must be at most 255 octets")]
    ReasonTooLong,
    #[error("invalid packet version")]
    BadVersion,
    /// Padding bit set but the padding count is zero or too large.
    #[error("invalid padding value")]
    WrongPadding,
    #[error("APP subtype must be < 32")]
    InvalidSubType,

    #[error("{0}")]
    Util(util::Error),

    #[error("{0}")]
    Other(String),
}

// Codec errors travel through the `Marshal` traits wrapped in `util::Error`;
// unwrap them again on the way back so callers can match on them.
impl From<util::Error> for Error {
    fn from(e: util::Error) -> Self {
        match e {
            util::Error::Std(util::StdError(boxed)) => match boxed.downcast::<Error>() {
                Ok(err) => *err,
                Err(boxed) => Error::Util(util::Error::Std(util::StdError(boxed))),
            },
            other => Error::Util(other),
        }
    }
}

impl From<Error> for util::Error {
    fn from(e: Error) -> Self {
        util::Error::from_std(e)
    }
}

impl PartialEq<util::Error> for Error {
    fn eq(&self, other: &util::Error) -> bool {
        if let Some(down) = other.downcast_ref::<Error>() {
            return self == down;
        }
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_survives_util_round_trip() {
        let wrapped: util::Error = Error::PacketTooShort.into();
        assert_eq!(Error::PacketTooShort, wrapped);
        assert_eq!(Error::from(wrapped), Error::PacketTooShort);

        let foreign = util::Error::ErrTimeout;
        assert_eq!(Error::from(foreign), Error::Util(util::Error::ErrTimeout));
    }
}

#![warn(rust_2018_idioms)]

//! Transport and codec plumbing shared by the RTCP crates.

#[cfg(feature = "conn")]
pub mod conn;
#[cfg(feature = "marshal")]
pub mod marshal;

mod error;

#[cfg(feature = "conn")]
pub use crate::conn::Conn;
pub use crate::error::{Error, IoError, Result, StdError};
#[cfg(feature = "marshal")]
pub use crate::marshal::{Marshal, MarshalSize, Unmarshal};

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

// re-export sub-crates
pub use rtcp;
pub use util;

pub mod collision;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod interval;
pub mod membership;
pub mod mock;
pub mod ntp;
pub mod report;
pub mod scheduler;
pub mod session;

pub use config::{BandwidthConfig, ByeNotification, SdesConfig, SessionConfig};
pub use engine::RtcpEngine;
pub use error::{Error, Result};
pub use handler::{AvpHandler, RtcpHandler};
pub use membership::{Origin, OriginKind, RtpPacketInfo};
pub use report::{ProcessOutcome, RejectReason};
pub use session::{RtcpProtector, RtpSession, RtpSessionBuilder};

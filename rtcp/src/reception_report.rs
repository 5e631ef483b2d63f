use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;

pub(crate) const RECEPTION_REPORT_LENGTH: usize = 24;

/// Largest value the 24 bit cumulative lost field can carry.
pub const MAX_TOTAL_LOST: u32 = (1 << 24) - 1;

/// ReceptionReport is one report block of an SR or RR: reception statistics
/// about a single source (RFC 3550 section 6.4.1).
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct ReceptionReport {
    /// The source this block is about.
    pub ssrc: u32,
    /// Loss since the previous report, in 1/256 units.
    pub fraction_lost: u8,
    /// Cumulative loss, 24 bits on the wire.
    pub total_lost: u32,
    /// Highest sequence number, cycle count in the upper 16 bits.
    pub last_sequence_number: u32,
    /// Interarrival jitter in RTP timestamp units.
    pub jitter: u32,
    /// LSR: middle 32 bits of the NTP timestamp of the last SR, 0 if none.
    pub last_sender_report: u32,
    /// DLSR: time since that SR arrived, in 1/65536 s.
    pub delay: u32,
}

impl ReceptionReport {
    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.total_lost > MAX_TOTAL_LOST {
            return Err(Error::InvalidTotalLost);
        }
        Ok(())
    }

    /// Writes the block without checks; callers run `check` first.
    pub(crate) fn put<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);
        buf.put_uint(u64::from(self.total_lost), 3);
        buf.put_u32(self.last_sequence_number);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sender_report);
        buf.put_u32(self.delay);
    }

    pub(crate) fn check_all(reports: &[ReceptionReport]) -> Result<(), Error> {
        if reports.len() > crate::header::COUNT_MAX {
            return Err(Error::TooManyReports);
        }
        reports.iter().try_for_each(ReceptionReport::check)
    }
}

impl MarshalSize for ReceptionReport {
    fn marshal_size(&self) -> usize {
        RECEPTION_REPORT_LENGTH
    }
}

impl Marshal for ReceptionReport {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        if buf.len() < RECEPTION_REPORT_LENGTH {
            return Err(Error::BufferTooShort.into());
        }
        self.check()?;
        self.put(&mut buf);
        Ok(RECEPTION_REPORT_LENGTH)
    }
}

impl Unmarshal for ReceptionReport {
    fn unmarshal<B>(raw_packet: &mut B) -> Result<Self, util::Error>
    where
        Self: Sized,
        B: Buf,
    {
        if raw_packet.remaining() < RECEPTION_REPORT_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        Ok(ReceptionReport {
            ssrc: raw_packet.get_u32(),
            fraction_lost: raw_packet.get_u8(),
            total_lost: raw_packet.get_uint(3) as u32,
            last_sequence_number: raw_packet.get_u32(),
            jitter: raw_packet.get_u32(),
            last_sender_report: raw_packet.get_u32(),
            delay: raw_packet.get_u32(),
        })
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_reception_report_total_lost_bounds() {
        let report = ReceptionReport {
            ssrc: 0x0102_0304,
            total_lost: MAX_TOTAL_LOST,
            ..Default::default()
        };
        let data = report.marshal().expect("max total lost must marshal");
        assert_eq!(&data[4..8], &[0x00, 0xff, 0xff, 0xff]);

        let overflow = ReceptionReport {
            total_lost: MAX_TOTAL_LOST + 1,
            ..Default::default()
        };
        match overflow.marshal() {
            Err(err) => assert_eq!(Error::InvalidTotalLost, err),
            Ok(_) => panic!("total lost above 24 bits must not marshal"),
        }
    }

    #[test]
    fn test_reception_report_unmarshal() {
        const BLOCK: [u8; RECEPTION_REPORT_LENGTH] = [
            0x00, 0x00, 0x30, 0x39, // ssrc 12345
            0x40, 0x00, 0x01, 0x2c, // 25% lost, 300 total
            0x00, 0x02, 0x03, 0xe8, // 2 cycles, seq 1000
            0x00, 0x00, 0x00, 0x50, // jitter 80
            0x12, 0x34, 0x56, 0x78, // lsr
            0x00, 0x01, 0x80, 0x00, // dlsr 1.5 s
        ];
        let mut data = Bytes::from_static(&BLOCK);
        let report = ReceptionReport::unmarshal(&mut data).expect("valid block");
        assert_eq!(
            report,
            ReceptionReport {
                ssrc: 12345,
                fraction_lost: 64,
                total_lost: 300,
                last_sequence_number: (2 << 16) | 1000,
                jitter: 80,
                last_sender_report: 0x1234_5678,
                delay: 98304,
            }
        );
        assert_eq!(&report.marshal().expect("marshal")[..], &BLOCK[..]);

        let mut short = Bytes::from_static(&[0xbc, 0x5e]);
        assert!(ReceptionReport::unmarshal(&mut short).is_err());
    }
}

use std::time::SystemTime;

use bytes::Bytes;
use rtcp::goodbye::Goodbye;
use rtcp::header::{COUNT_MAX, HEADER_LENGTH, SSRC_LENGTH};
use rtcp::packet::Packet;
use rtcp::receiver_report::ReceiverReport;
use rtcp::reception_report::ReceptionReport;
use rtcp::sender_report::SenderReport;
use rtcp::source_description::{
    SdesType, SourceDescription, SourceDescriptionChunk, SourceDescriptionItem,
};
use util::marshal::MarshalSize;

use crate::engine::local_source::LocalSource;
use crate::error::{Error, Result};
use crate::membership::MembershipTable;
use crate::ntp::system_time_to_ntp;

const RECEPTION_REPORT_LENGTH: usize = 24;
const RR_LENGTH: usize = HEADER_LENGTH + SSRC_LENGTH;

/// What goes into one outgoing compound packet besides the report blocks.
pub struct ReportContext<'a> {
    pub local: &'a LocalSource,
    pub now: SystemTime,
    /// Optional SDES item sent along with CNAME, dropped if it does not fit.
    pub extra_sdes: Option<SdesType>,
    pub goodbye: Option<Goodbye>,
}

/// BuiltReport is one marshaled compound packet.
#[derive(Debug)]
pub struct BuiltReport {
    pub raw: Bytes,
    pub packets: Vec<Box<dyn Packet + Send + Sync>>,
    /// Sources that got a report block, in wire order.
    pub reported: Vec<u32>,
    /// Sources left for a later report for lack of space.
    pub deferred: usize,
}

/// ReportBuilder assembles compound packets that fit in `budget` octets.
///
/// Report blocks rotate: when not every sender fits, the next report starts
/// where the previous one stopped.
#[derive(Debug, Default, Clone)]
pub struct ReportBuilder {
    budget: usize,
    cursor: u32,
}

impl ReportBuilder {
    pub fn new(budget: usize) -> Self {
        ReportBuilder { budget, cursor: 0 }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// build assembles SR or RR, any further RRs needed for report blocks,
    /// the local SDES chunk and, when asked for, a BYE.
    pub fn build(
        &mut self,
        ctx: &ReportContext<'_>,
        membership: &mut MembershipTable,
    ) -> Result<BuiltReport> {
        let local = ctx.local;
        let is_sender = local.sent_since_last_report();
        let first_len = if is_sender {
            SenderReport::default().marshal_size()
        } else {
            RR_LENGTH
        };

        let cname = SourceDescriptionItem {
            sdes_type: SdesType::SdesCname,
            text: Bytes::copy_from_slice(local.sdes.cname.as_bytes()),
        };
        let mut sdes = SourceDescription {
            chunks: vec![SourceDescriptionChunk {
                source: local.ssrc,
                items: vec![cname],
            }],
        };
        let bye_len = ctx.goodbye.as_ref().map_or(0, |b| b.marshal_size());

        let needed = first_len + sdes.marshal_size() + bye_len;
        if needed > self.budget {
            return Err(Error::ErrBudgetTooSmall {
                budget: self.budget,
                needed,
            });
        }

        if let Some(item) = ctx.extra_sdes.and_then(|t| local.sdes_item(t)) {
            sdes.chunks[0].items.push(item);
            if first_len + sdes.marshal_size() + bye_len > self.budget {
                log::trace!("dropping SDES item that does not fit the report");
                sdes.chunks[0].items.pop();
            }
        }

        let mut room = self.budget - first_len - sdes.marshal_size() - bye_len;

        // how many blocks fit in the leading report, then in extra RRs
        let candidates = self.candidates(membership);
        let mut sizes = vec![(room / RECEPTION_REPORT_LENGTH)
            .min(COUNT_MAX)
            .min(candidates.len())];
        room -= sizes[0] * RECEPTION_REPORT_LENGTH;
        let mut packed = sizes[0];
        while packed < candidates.len() && room >= RR_LENGTH + RECEPTION_REPORT_LENGTH {
            let n = ((room - RR_LENGTH) / RECEPTION_REPORT_LENGTH)
                .min(COUNT_MAX)
                .min(candidates.len() - packed);
            room -= RR_LENGTH + n * RECEPTION_REPORT_LENGTH;
            packed += n;
            sizes.push(n);
        }

        let reported = candidates[..packed].to_vec();
        let deferred = candidates.len() - packed;
        self.cursor = candidates.get(packed).copied().unwrap_or(0);

        let mut blocks: Vec<ReceptionReport> = Vec::with_capacity(packed);
        for ssrc in &reported {
            if let Some(source) = membership.get_mut(*ssrc) {
                if let Some(stats) = source.reception.as_mut() {
                    blocks.push(stats.generate_report(*ssrc, ctx.now, source.sender_info.as_ref()));
                }
            }
        }

        let mut packets: Vec<Box<dyn Packet + Send + Sync>> = vec![];
        let mut blocks = blocks.into_iter();
        for (i, n) in sizes.into_iter().enumerate() {
            let reports: Vec<ReceptionReport> = blocks.by_ref().take(n).collect();
            if i == 0 && is_sender {
                packets.push(Box::new(SenderReport {
                    ssrc: local.ssrc,
                    ntp_time: system_time_to_ntp(ctx.now),
                    rtp_time: local.rtp_timestamp(ctx.now),
                    packet_count: local.packet_count,
                    octet_count: local.octet_count,
                    reports,
                    profile_extensions: Bytes::new(),
                }));
            } else {
                packets.push(Box::new(ReceiverReport {
                    ssrc: local.ssrc,
                    reports,
                    profile_extensions: Bytes::new(),
                }));
            }
        }
        packets.push(Box::new(sdes));
        if let Some(goodbye) = &ctx.goodbye {
            packets.push(Box::new(goodbye.clone()));
        }

        let raw = rtcp::packet::marshal(&packets)?;
        Ok(BuiltReport {
            raw,
            packets,
            reported,
            deferred,
        })
    }

    /// Remote senders with reception statistics, ordered so the rotation
    /// starts at the cursor.
    fn candidates(&self, membership: &MembershipTable) -> Vec<u32> {
        let mut ssrcs: Vec<u32> = membership
            .iter()
            .filter(|s| !s.is_local() && !s.has_departed() && s.is_sender())
            .filter(|s| s.reception.as_ref().is_some_and(|r| r.is_valid()))
            .map(|s| s.ssrc())
            .collect();
        ssrcs.sort_unstable();

        let start = ssrcs.partition_point(|ssrc| *ssrc < self.cursor);
        ssrcs.rotate_left(start);
        ssrcs
    }
}

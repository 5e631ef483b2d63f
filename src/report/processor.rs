use std::time::SystemTime;

use bytes::Bytes;
use rtcp::application_defined::ApplicationDefined;
use rtcp::compound_packet::{CompoundReader, SubPacket};
use rtcp::goodbye::Goodbye;
use rtcp::header::PacketType;
use rtcp::receiver_report::ReceiverReport;
use rtcp::reception_report::ReceptionReport;
use rtcp::sender_report::SenderReport;
use rtcp::source_description::{SdesType, SourceDescription};

use crate::collision::{Action, CollisionResolver};
use crate::config::ByeNotification;
use crate::handler::RtcpHandler;
use crate::membership::{MembershipTable, Origin, OriginKind, SenderInfo};
use crate::scheduler::ReportSchedule;

/// Why a sub-packet was not applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Framing or body could not be decoded.
    MalformedHeader,
    UnknownPacketType,
    /// The collision check discarded the packet's source.
    SsrcRejected,
}

/// The local SSRC was replaced after a collision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SsrcChange {
    pub old: u32,
    pub new: u32,
    pub origin: Origin,
}

/// What processing one compound packet did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Sub-packets applied to the membership table.
    pub accepted: usize,
    /// Reasons for sub-packets skipped, in wire order.
    pub skipped: Vec<RejectReason>,
    pub new_sources: Vec<u32>,
    /// Sources whose first BYE was in this packet.
    pub departed: Vec<u32>,
    /// SSRCs listed in BYE packets, known or not.
    pub bye_sources: usize,
    /// At least one SDES chunk carried a CNAME.
    pub cname_present: bool,
    pub collision: Option<SsrcChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// At least part of the packet was applied, or nothing in it was
    /// invalid.
    Accepted(ProcessSummary),
    /// Nothing could be applied; the reason of the first failure.
    Rejected(RejectReason),
}

impl ProcessOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProcessOutcome::Accepted(_))
    }

    pub fn summary(&self) -> Option<&ProcessSummary> {
        match self {
            ProcessOutcome::Accepted(summary) => Some(summary),
            ProcessOutcome::Rejected(_) => None,
        }
    }
}

/// Everything the processor reads or updates while applying one packet.
pub struct ProcessContext<'a> {
    pub membership: &'a mut MembershipTable,
    pub resolver: &'a mut CollisionResolver,
    pub schedule: &'a mut ReportSchedule,
    pub handler: &'a mut dyn RtcpHandler,
    pub bye_notification: ByeNotification,
    pub header_overhead: usize,
    /// While leaving only BYE packets are looked at.
    pub leaving: bool,
}

/// ReportProcessor applies received compound RTCP packets.
pub struct ReportProcessor;

impl ReportProcessor {
    /// process applies the sub-packets of `compound` in wire order. A framing
    /// error stops at that point; what came before stays applied.
    pub fn process(
        ctx: &mut ProcessContext<'_>,
        compound: Bytes,
        origin: Origin,
        now: SystemTime,
    ) -> ProcessOutcome {
        if compound.is_empty() {
            return ProcessOutcome::Rejected(RejectReason::MalformedHeader);
        }

        let mut summary = ProcessSummary::default();
        ctx.schedule
            .update_avg_size(compound.len() + ctx.header_overhead);

        for sub in CompoundReader::new(compound) {
            let sub = match sub {
                Ok(sub) => sub,
                Err(err) => {
                    log::debug!("abandoning rest of compound packet from {}: {}", origin, err);
                    summary.skipped.push(RejectReason::MalformedHeader);
                    break;
                }
            };

            if ctx.leaving && sub.header.packet_type != PacketType::Goodbye {
                continue;
            }

            let result = match sub.header.packet_type {
                PacketType::SenderReport => Self::process_sr(ctx, &sub, origin, now, &mut summary),
                PacketType::ReceiverReport => {
                    Self::process_rr(ctx, &sub, origin, now, &mut summary)
                }
                PacketType::SourceDescription => {
                    Self::process_sdes(ctx, &sub, origin, now, &mut summary)
                }
                PacketType::Goodbye => Self::process_bye(ctx, &sub, origin, now, &mut summary),
                PacketType::ApplicationDefined => {
                    Self::process_app(ctx, &sub, origin, now, &mut summary)
                }
                PacketType::Unsupported => {
                    log::trace!("skipping RTCP packet type {}", sub.raw_type());
                    Err(RejectReason::UnknownPacketType)
                }
            };

            match result {
                Ok(()) => summary.accepted += 1,
                Err(reason) => summary.skipped.push(reason),
            }
        }

        if !ctx.leaving && !summary.departed.is_empty() {
            let members = ctx.membership.count_members();
            ctx.schedule.reverse_reconsider(members, now);
        }

        match summary.skipped.first() {
            Some(reason) if summary.accepted == 0 => ProcessOutcome::Rejected(*reason),
            _ => ProcessOutcome::Accepted(summary),
        }
    }

    /// admit runs the collision check for one SSRC. Returns false when the
    /// packet must be ignored. Unknown sources are created only when
    /// `create` is set.
    fn admit(
        ctx: &mut ProcessContext<'_>,
        ssrc: u32,
        create: bool,
        origin: Origin,
        now: SystemTime,
        summary: &mut ProcessSummary,
    ) -> Option<bool> {
        if !create && !ctx.membership.contains(ssrc) {
            return None;
        }

        let (source, is_new) =
            ctx.membership
                .lookup_or_create(ssrc, OriginKind::Control, Some(origin), now);
        match ctx
            .resolver
            .check(source, is_new, OriginKind::Control, origin, now)
        {
            Action::Accept => {}
            Action::Discard => return None,
            Action::ResolveCollision => {
                let new = ctx.membership.unused_ssrc();
                ctx.membership.set_local(new, now);
                if let Some(old) = ctx.membership.get_mut(ssrc) {
                    old.control.origin = Some(origin);
                }
                summary.collision = Some(SsrcChange {
                    old: ssrc,
                    new,
                    origin,
                });
            }
        }

        for change in ctx.resolver.take_origin_changes() {
            if let Some(source) = ctx.membership.get(change.ssrc) {
                ctx.handler
                    .on_origin_changed(source, change.kind, change.previous);
            }
        }

        ctx.membership.mark_active(ssrc, now);
        if is_new {
            summary.new_sources.push(ssrc);
            if let Some(source) = ctx.membership.get(ssrc) {
                ctx.handler.on_new_source(source);
            }
        }
        Some(is_new)
    }

    fn store_report_blocks(
        ctx: &mut ProcessContext<'_>,
        ssrc: u32,
        reports: &[ReceptionReport],
    ) {
        let local = ctx.membership.local_ssrc();
        let about_us = reports
            .iter()
            .find(|r| Some(r.ssrc) == local)
            .cloned();
        if let Some(source) = ctx.membership.get_mut(ssrc) {
            source.validated = true;
            if about_us.is_some() {
                source.receiver_info = about_us;
            }
        }
    }

    fn process_sr(
        ctx: &mut ProcessContext<'_>,
        sub: &SubPacket,
        origin: Origin,
        now: SystemTime,
        summary: &mut ProcessSummary,
    ) -> Result<(), RejectReason> {
        let sr: SenderReport = decode(sub)?;
        Self::admit(ctx, sr.ssrc, true, origin, now, summary).ok_or(RejectReason::SsrcRejected)?;

        Self::store_report_blocks(ctx, sr.ssrc, &sr.reports);
        if let Some(source) = ctx.membership.get_mut(sr.ssrc) {
            source.sender_info = Some(SenderInfo {
                ntp_time: sr.ntp_time,
                rtp_time: sr.rtp_time,
                packet_count: sr.packet_count,
                octet_count: sr.octet_count,
                received_at: now,
            });
        }

        if let Some(source) = ctx.membership.get(sr.ssrc) {
            ctx.handler.on_got_sr(source, &sr);
            if !sr.profile_extensions.is_empty() {
                ctx.handler
                    .on_rr_sr_extension(source, &sr.profile_extensions);
            }
        }
        Ok(())
    }

    fn process_rr(
        ctx: &mut ProcessContext<'_>,
        sub: &SubPacket,
        origin: Origin,
        now: SystemTime,
        summary: &mut ProcessSummary,
    ) -> Result<(), RejectReason> {
        let rr: ReceiverReport = decode(sub)?;
        Self::admit(ctx, rr.ssrc, true, origin, now, summary).ok_or(RejectReason::SsrcRejected)?;

        Self::store_report_blocks(ctx, rr.ssrc, &rr.reports);
        if let Some(source) = ctx.membership.get(rr.ssrc) {
            ctx.handler.on_got_rr(source, &rr);
            if !rr.profile_extensions.is_empty() {
                ctx.handler
                    .on_rr_sr_extension(source, &rr.profile_extensions);
            }
        }
        Ok(())
    }

    fn process_sdes(
        ctx: &mut ProcessContext<'_>,
        sub: &SubPacket,
        origin: Origin,
        now: SystemTime,
        summary: &mut ProcessSummary,
    ) -> Result<(), RejectReason> {
        let sdes: SourceDescription = decode(sub)?;

        let mut applied = 0;
        for chunk in &sdes.chunks {
            if Self::admit(ctx, chunk.source, true, origin, now, summary).is_none() {
                continue;
            }
            applied += 1;

            let has_cname = chunk.item(SdesType::SdesCname).is_some();
            if has_cname {
                summary.cname_present = true;
            } else {
                log::debug!("SDES chunk for ssrc {} carries no CNAME", chunk.source);
            }

            if let Some(source) = ctx.membership.get_mut(chunk.source) {
                for item in &chunk.items {
                    source.sdes.insert(item.sdes_type, item.text.clone());
                }
            }
            if let Some(source) = ctx.membership.get(chunk.source) {
                ctx.handler.on_got_sdes_chunk(source, chunk);
            }
        }

        if applied == 0 && !sdes.chunks.is_empty() {
            return Err(RejectReason::SsrcRejected);
        }
        Ok(())
    }

    fn process_bye(
        ctx: &mut ProcessContext<'_>,
        sub: &SubPacket,
        origin: Origin,
        now: SystemTime,
        summary: &mut ProcessSummary,
    ) -> Result<(), RejectReason> {
        let bye: Goodbye = decode(sub)?;
        summary.bye_sources += bye.sources.len();

        let mut departed = vec![];
        for ssrc in &bye.sources {
            // a repeated BYE leaves a departed source untouched
            if ctx
                .membership
                .get(*ssrc)
                .is_some_and(|source| source.has_departed())
            {
                continue;
            }
            if Self::admit(ctx, *ssrc, false, origin, now, summary).is_none() {
                continue;
            }
            if ctx.membership.record_departure(*ssrc, bye.reason.clone(), now) {
                departed.push(*ssrc);
            }
        }

        let notify: &[u32] = match ctx.bye_notification {
            ByeNotification::PerSource => &departed,
            ByeNotification::LastSourceOnly => match departed.last() {
                Some(_) => &departed[departed.len() - 1..],
                None => &[],
            },
        };
        for ssrc in notify {
            if let Some(source) = ctx.membership.get(*ssrc) {
                ctx.handler.on_got_goodbye(source, &bye.reason);
            }
        }

        summary.departed.extend(departed);
        Ok(())
    }

    fn process_app(
        ctx: &mut ProcessContext<'_>,
        sub: &SubPacket,
        origin: Origin,
        now: SystemTime,
        summary: &mut ProcessSummary,
    ) -> Result<(), RejectReason> {
        let app: ApplicationDefined = decode(sub)?;
        Self::admit(ctx, app.ssrc, true, origin, now, summary).ok_or(RejectReason::SsrcRejected)?;

        if let Some(source) = ctx.membership.get(app.ssrc) {
            ctx.handler.on_got_app(source, &app);
        }
        Ok(())
    }
}

fn decode<P: util::marshal::Unmarshal>(sub: &SubPacket) -> Result<P, RejectReason> {
    sub.decode::<P>().map_err(|err| {
        log::debug!("skipping malformed {} packet: {}", sub.header.packet_type, err);
        RejectReason::MalformedHeader
    })
}


pub mod local_source;

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use rtcp::goodbye::Goodbye;
use rtcp::header::HEADER_LENGTH;
use rtcp::reception_report::ReceptionReport;
use util::marshal::MarshalSize;

use crate::collision::{Action, CollisionResolver};
use crate::config::{SessionConfig, MAX_REASON_LENGTH};
use crate::error::{Error, Result};
use crate::handler::{AvpHandler, RtcpHandler};
use crate::interval::{IntervalInput, IntervalModel};
use crate::membership::reception::ReceptionStats;
use crate::membership::{MembershipTable, Origin, OriginKind, RtpPacketInfo, SenderInfo};
use crate::ntp::ntp_to_system_time;
use crate::report::{
    ProcessContext, ProcessOutcome, ReportBuilder, ReportContext, ReportProcessor,
};
use crate::scheduler::{ControlState, ReportSchedule, TimerDecision, BYE_BACKOFF_THRESHOLD};
use local_source::LocalSource;

const COLLISION_REASON: &[u8] = b"SSRC collision";

/// RtcpEngine is the RTCP control channel of one RTP session.
///
/// It performs no I/O and reads no clock: the caller passes the current time
/// to every operation, feeds received control packets to `handle_control`,
/// calls `handle_timeout` once `poll_timeout` has passed and sends whatever
/// `poll_transmit` hands out.
pub struct RtcpEngine {
    config: SessionConfig,
    handler: Box<dyn RtcpHandler>,
    local: LocalSource,
    membership: MembershipTable,
    resolver: CollisionResolver,
    schedule: ReportSchedule,
    builder: ReportBuilder,
    state: ControlState,
    outgoing: VecDeque<Bytes>,
}

impl RtcpEngine {
    /// new creates an engine with the default RTP/AVP handler.
    pub fn new(config: SessionConfig, now: SystemTime) -> Result<Self> {
        Self::with_handler(config, Box::<AvpHandler>::default(), now)
    }

    /// with_handler validates `config` and schedules the first report.
    pub fn with_handler(
        config: SessionConfig,
        handler: Box<dyn RtcpHandler>,
        now: SystemTime,
    ) -> Result<Self> {
        config.validate()?;

        let mut membership = MembershipTable::new(config.max_members);
        let ssrc = config.local_ssrc.unwrap_or_else(|| membership.unused_ssrc());
        membership.set_local(ssrc, now);

        let local = LocalSource::new(ssrc, config.sdes.clone(), config.clock_rate, now);
        let builder = ReportBuilder::new(config.report_budget());

        let mut engine = RtcpEngine {
            config,
            handler,
            local,
            membership,
            resolver: CollisionResolver::new(),
            schedule: ReportSchedule::new(now),
            builder,
            state: ControlState::Active,
            outgoing: VecDeque::new(),
        };
        let interval = engine.next_interval();
        engine.schedule.set_next(now + interval);
        log::debug!(
            "rtcp engine started with ssrc {}, first report in {:?}",
            ssrc,
            interval
        );

        Ok(engine)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local_ssrc(&self) -> u32 {
        self.local.ssrc()
    }

    pub fn local_source(&self) -> &LocalSource {
        &self.local
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn schedule(&self) -> &ReportSchedule {
        &self.schedule
    }

    pub fn membership(&self) -> &MembershipTable {
        &self.membership
    }

    /// Current member count, ourselves included.
    pub fn members(&self) -> usize {
        self.membership.count_members()
    }

    pub fn senders(&self) -> usize {
        self.membership.count_senders()
    }

    /// Sender info of the last SR received from `ssrc`.
    pub fn sender_info(&self, ssrc: u32) -> Option<&SenderInfo> {
        self.membership.get(ssrc)?.sender_info()
    }

    /// What `ssrc` last reported about our stream.
    pub fn receiver_info(&self, ssrc: u32) -> Option<&ReceptionReport> {
        self.membership.get(ssrc)?.receiver_info()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// record_rtp_sent accounts one RTP packet sent with the local SSRC.
    pub fn record_rtp_sent(&mut self, payload_len: usize, now: SystemTime) -> Result<()> {
        if !self.state.is_active() {
            return Err(Error::ErrSessionClosed);
        }

        self.local.record_rtp_sent(payload_len);
        self.schedule.set_we_sent();
        if let Some(source) = self.membership.get_mut(self.local.ssrc()) {
            source.is_sender = true;
            source.last_data = Some(now);
            source.last_activity = now;
        }
        Ok(())
    }

    /// record_rtp_received accounts one RTP packet received from `origin`.
    /// Returns false when the packet was discarded by the collision check or
    /// the session is not active.
    pub fn record_rtp_received(
        &mut self,
        info: &RtpPacketInfo,
        origin: Origin,
        now: SystemTime,
    ) -> bool {
        if !self.state.is_active() {
            return false;
        }

        let (source, is_new) =
            self.membership
                .lookup_or_create(info.ssrc, OriginKind::Data, Some(origin), now);
        match self
            .resolver
            .check(source, is_new, OriginKind::Data, origin, now)
        {
            Action::Accept => {}
            Action::Discard => return false,
            Action::ResolveCollision => {
                let new = self.membership.unused_ssrc();
                self.membership.set_local(new, now);
                if let Some(old) = self.membership.get_mut(info.ssrc) {
                    old.data.origin = Some(origin);
                }
                self.renew_local_ssrc(info.ssrc, new, now);
                return false;
            }
        }
        self.notify_origin_changes();

        let clock_rate = self.config.clock_rate;
        if let Some(source) = self.membership.get_mut(info.ssrc) {
            let valid = match source.reception.as_mut() {
                Some(stats) => stats.process_rtp(now, info),
                None => {
                    source.reception = Some(ReceptionStats::new(clock_rate, info, now));
                    false
                }
            };
            if valid {
                source.validated = true;
                source.is_sender = true;
            }
            source.last_data = Some(now);
        }
        self.membership.mark_active(info.ssrc, now);

        if is_new {
            if let Some(source) = self.membership.get(info.ssrc) {
                self.handler.on_new_source(source);
            }
        }
        self.after_membership_change(now);
        true
    }

    /// handle_control applies one received compound RTCP packet.
    pub fn handle_control(
        &mut self,
        compound: Bytes,
        origin: Origin,
        now: SystemTime,
    ) -> Result<ProcessOutcome> {
        if self.state.is_closed() {
            return Err(Error::ErrSessionClosed);
        }

        let leaving = self.state.is_leaving();
        let mut ctx = ProcessContext {
            membership: &mut self.membership,
            resolver: &mut self.resolver,
            schedule: &mut self.schedule,
            handler: self.handler.as_mut(),
            bye_notification: self.config.bye_notification,
            header_overhead: self.config.bandwidth.header_overhead,
            leaving,
        };
        let outcome = ReportProcessor::process(&mut ctx, compound, origin, now);

        if let ProcessOutcome::Accepted(summary) = &outcome {
            if let ControlState::Leaving { members, .. } = &mut self.state {
                *members += summary.bye_sources;
            }
            if let Some(change) = summary.collision {
                self.renew_local_ssrc(change.old, change.new, now);
            }
        }
        if !leaving {
            self.after_membership_change(now);
        }

        Ok(outcome)
    }

    /// handle_timeout runs expiry and, once the report is due, timer
    /// reconsideration and transmission.
    pub fn handle_timeout(&mut self, now: SystemTime) -> Result<()> {
        if self.state.is_closed() {
            return Ok(());
        }
        if self.state.is_active() {
            self.expire(now);
        }

        if !self.schedule.is_due(now) {
            return Ok(());
        }

        let interval = self.next_interval();
        match self.schedule.reconsider_timer(now, interval) {
            TimerDecision::Reschedule(next) => {
                log::trace!("report rescheduled to {:?} by timer reconsideration", next);
                Ok(())
            }
            TimerDecision::Send => {
                match std::mem::replace(&mut self.state, ControlState::Closed) {
                    ControlState::Leaving { reason, .. } => self.queue_bye(reason, now),
                    state => {
                        self.state = state;
                        self.send_report(now)
                    }
                }
            }
        }
    }

    /// The time `handle_timeout` should be called next, None once closed.
    pub fn poll_timeout(&self) -> Option<SystemTime> {
        if self.state.is_closed() {
            None
        } else {
            Some(self.schedule.t_next())
        }
    }

    /// Next compound packet to transmit.
    pub fn poll_transmit(&mut self) -> Option<Bytes> {
        self.outgoing.pop_front()
    }

    /// leave starts the departure of the local source. In small sessions the
    /// BYE is queued right away; above `BYE_BACKOFF_THRESHOLD` members it is
    /// sent under reconsideration, counting only other leaving members.
    pub fn leave(&mut self, mut reason: Bytes, now: SystemTime) -> Result<()> {
        match self.state {
            ControlState::Closed => return Err(Error::ErrSessionClosed),
            ControlState::Leaving { .. } => return Ok(()),
            ControlState::Active => {}
        }
        reason.truncate(MAX_REASON_LENGTH);

        if !self.local.has_sent_anything() {
            log::debug!("leaving without BYE, nothing was sent");
            self.state = ControlState::Closed;
            return Ok(());
        }

        let members = self.membership.count_members();
        if members <= BYE_BACKOFF_THRESHOLD {
            self.state = ControlState::Closed;
            return self.queue_bye(reason, now);
        }

        let bye_size = RTCP_RR_SIZE
            + self.config.sdes.cname_packet_size()
            + Goodbye {
                sources: vec![self.local.ssrc()],
                reason: reason.clone(),
            }
            .marshal_size()
            + self.config.bandwidth.header_overhead;
        self.state = ControlState::Leaving { reason, members: 1 };
        self.schedule.restart(now, 1, Some(bye_size as f64));
        let interval = self.next_interval();
        self.schedule.set_next(now + interval);
        log::debug!("{} members, BYE backed off by {:?}", members, interval);
        Ok(())
    }

    /// abort closes the session without sending BYE.
    pub fn abort(&mut self) {
        self.state = ControlState::Closed;
        self.outgoing.clear();
    }

    /// is_end_to_end_delayed maps `rtp_timestamp` of `ssrc` to wall clock
    /// through its last SR and tells whether the packet is older than the
    /// configured end-to-end delay. False when either is unknown.
    pub fn is_end_to_end_delayed(&self, ssrc: u32, rtp_timestamp: u32, now: SystemTime) -> bool {
        let (Some(bound), Some(sr)) = (self.config.end_to_end_delay, self.sender_info(ssrc)) else {
            return false;
        };

        let offset = rtp_timestamp.wrapping_sub(sr.rtp_time) as i32 as f64
            / self.config.clock_rate as f64;
        let sr_time = ntp_to_system_time(sr.ntp_time);
        let sent = if offset >= 0.0 {
            sr_time.checked_add(Duration::from_secs_f64(offset))
        } else {
            sr_time.checked_sub(Duration::from_secs_f64(-offset))
        };

        match sent {
            Some(sent) => now.duration_since(sent).unwrap_or_default() > bound,
            None => false,
        }
    }

    fn interval_input(&self) -> IntervalInput {
        match &self.state {
            ControlState::Leaving { members, .. } => IntervalInput {
                members: *members,
                senders: 0,
                we_sent: false,
                avg_rtcp_size: self.schedule.avg_compound_size(),
                initial: self.schedule.is_initial(),
            },
            _ => IntervalInput {
                members: self.membership.count_members(),
                senders: self.membership.count_senders(),
                we_sent: self.schedule.we_sent(),
                avg_rtcp_size: self.schedule.avg_compound_size(),
                initial: self.schedule.is_initial(),
            },
        }
    }

    fn next_interval(&mut self) -> Duration {
        let input = self.interval_input();
        self.handler
            .compute_interval(&input, &self.config.bandwidth)
    }

    /// Td of the current state, the unit of all timeouts.
    fn deterministic_interval(&self) -> Duration {
        let input = IntervalInput {
            initial: false,
            ..self.interval_input()
        };
        IntervalModel::deterministic_interval(&input, &self.config.bandwidth)
    }

    fn expire(&mut self, now: SystemTime) {
        let td = self.deterministic_interval();

        let timeout = self
            .config
            .silent_timeout
            .then(|| td * IntervalModel::TIMEOUT_MULTIPLIER);
        let removed = self
            .membership
            .expire(now, timeout, self.config.leaving_delay);
        self.membership
            .expire_senders(now, td * IntervalModel::SENDER_TIMEOUT_MULTIPLIER);
        self.resolver
            .purge(now, td * IntervalModel::CONFLICT_TIMEOUT_MULTIPLIER);

        if !removed.is_empty() {
            log::debug!("{} sources timed out", removed.len());
            let members = self.membership.count_members();
            self.schedule.reverse_reconsider(members, now);
        }
    }

    fn send_report(&mut self, now: SystemTime) -> Result<()> {
        let configured = self.local.sdes().configured_items();
        let extra_sdes = self.handler.schedule_sdes_item(&configured);
        let ctx = ReportContext {
            local: &self.local,
            now,
            extra_sdes,
            goodbye: None,
        };
        let report = self.builder.build(&ctx, &mut self.membership)?;
        if report.deferred > 0 {
            log::trace!(
                "{} report blocks deferred to the next report",
                report.deferred
            );
        }

        let was_sender = self.local.sent_since_last_report();
        if let Some(source) = self.membership.get_mut(self.local.ssrc()) {
            source.is_sender = was_sender;
        }
        self.local.on_report_sent();

        let members = self.membership.count_members();
        self.schedule.on_report_sent(
            now,
            members,
            report.raw.len() + self.config.bandwidth.header_overhead,
        );
        self.outgoing.push_back(report.raw);

        let interval = self.next_interval();
        self.schedule.set_next(now + interval);
        Ok(())
    }

    fn queue_bye(&mut self, reason: Bytes, now: SystemTime) -> Result<()> {
        let ctx = ReportContext {
            local: &self.local,
            now,
            extra_sdes: None,
            goodbye: Some(Goodbye {
                sources: vec![self.local.ssrc()],
                reason,
            }),
        };
        let report = self.builder.build(&ctx, &mut self.membership)?;
        self.local.on_report_sent();
        self.outgoing.push_back(report.raw);
        log::debug!("BYE queued for ssrc {}", self.local.ssrc());
        Ok(())
    }

    /// renew_local_ssrc finishes a collision once the membership table
    /// already holds `new` as the local source.
    fn renew_local_ssrc(&mut self, old: u32, new: u32, now: SystemTime) {
        log::warn!("ssrc collision, changing local ssrc {} to {}", old, new);

        if self.local.has_sent_anything() {
            let reason = Bytes::from_static(COLLISION_REASON);
            if let Err(err) = self.queue_bye(reason, now) {
                log::warn!("failed to build BYE for ssrc {}: {}", old, err);
            }
        }
        if let Some(source) = self.membership.get_mut(old) {
            source.is_sender = false;
        }

        self.local.renew(new, now);
        let members = self.membership.count_members();
        self.schedule.restart(now, members, None);
        let interval = self.next_interval();
        self.schedule.set_next(now + interval);

        self.handler.on_ssrc_collision(old, new);
    }

    fn notify_origin_changes(&mut self) {
        for change in self.resolver.take_origin_changes() {
            if let Some(source) = self.membership.get(change.ssrc) {
                self.handler
                    .on_origin_changed(source, change.kind, change.previous);
            }
        }
    }

    /// Reports evictions and applies forward reconsideration.
    fn after_membership_change(&mut self, now: SystemTime) {
        for ssrc in self.membership.take_evicted() {
            self.handler.on_membership_overflow(ssrc);
        }

        let members = self.membership.count_members();
        self.schedule
            .reconsider_growth(members, self.config.reconsideration_threshold, now);
    }
}

/// Size of an RR without report blocks.
const RTCP_RR_SIZE: usize = HEADER_LENGTH + 4;

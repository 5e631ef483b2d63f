use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rtcp::application_defined::ApplicationDefined;
use rtcp::receiver_report::ReceiverReport;
use rtcp::sender_report::SenderReport;
use rtcp::source_description::{SdesType, SourceDescriptionChunk};

use crate::config::BandwidthConfig;
use crate::interval::{IntervalInput, IntervalModel};
use crate::membership::{Origin, OriginKind, SyncSource};
use crate::report::sdes::SdesScheduler;

/// RtcpHandler is the profile-specific policy plugged into the engine.
///
/// Interval computation and SDES scheduling must be provided; every other
/// hook is a notification with an empty default.
pub trait RtcpHandler: Send {
    /// compute_interval returns the randomized interval T for `input`.
    fn compute_interval(&mut self, input: &IntervalInput, bw: &BandwidthConfig) -> Duration;

    /// schedule_sdes_item picks the optional item to send along with CNAME
    /// in the next report, out of the `configured` ones.
    fn schedule_sdes_item(&mut self, configured: &[SdesType]) -> Option<SdesType>;

    /// A source was added to the membership table.
    fn on_new_source(&mut self, _source: &SyncSource) {}

    fn on_got_sr(&mut self, _source: &SyncSource, _sr: &SenderReport) {}

    fn on_got_rr(&mut self, _source: &SyncSource, _rr: &ReceiverReport) {}

    fn on_got_sdes_chunk(&mut self, _source: &SyncSource, _chunk: &SourceDescriptionChunk) {}

    /// APP payloads are passed through uninterpreted.
    fn on_got_app(&mut self, _source: &SyncSource, _app: &ApplicationDefined) {}

    /// Profile-specific extension octets that followed the report blocks of
    /// an SR or RR.
    fn on_rr_sr_extension(&mut self, _source: &SyncSource, _extension: &Bytes) {}

    /// A source announced its departure.
    fn on_got_goodbye(&mut self, _source: &SyncSource, _reason: &Bytes) {}

    /// Our SSRC collided with another participant and was replaced.
    fn on_ssrc_collision(&mut self, _old_ssrc: u32, _new_ssrc: u32) {}

    /// A remote source moved to a new transport address.
    fn on_origin_changed(
        &mut self,
        _source: &SyncSource,
        _kind: OriginKind,
        _previous: Option<Origin>,
    ) {
    }

    /// The member cap forced `evicted_ssrc` out of the table.
    fn on_membership_overflow(&mut self, _evicted_ssrc: u32) {}
}

/// AvpHandler is the RTP/AVP profile default: the RFC 3550 interval and a
/// round robin over the optional SDES items.
pub struct AvpHandler {
    rng: StdRng,
    sdes: SdesScheduler,
}

impl Default for AvpHandler {
    fn default() -> Self {
        AvpHandler {
            rng: StdRng::from_os_rng(),
            sdes: SdesScheduler::default(),
        }
    }
}

impl AvpHandler {
    /// with_seed makes the interval randomization reproducible.
    pub fn with_seed(seed: u64) -> Self {
        AvpHandler {
            rng: StdRng::seed_from_u64(seed),
            sdes: SdesScheduler::default(),
        }
    }
}

impl RtcpHandler for AvpHandler {
    fn compute_interval(&mut self, input: &IntervalInput, bw: &BandwidthConfig) -> Duration {
        let factor = IntervalModel::random_factor(&mut self.rng);
        IntervalModel::compute_interval(input, bw, factor)
    }

    fn schedule_sdes_item(&mut self, configured: &[SdesType]) -> Option<SdesType> {
        self.sdes.schedule_next_sdes_item(configured)
    }
}


pub(crate) mod reception;
mod sync_source;

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
pub use sync_source::{
    Departure, Endpoint, Origin, OriginKind, RtpPacketInfo, SenderInfo, SyncSource,
};

/// MembershipTable is the authoritative map from SSRC to participant.
///
/// Capacity is capped: once `max_members` entries exist, admitting a new
/// source evicts the least recently active remote one. Evicted SSRCs are kept
/// until `take_evicted` so the caller can report the overflow.
#[derive(Debug)]
pub struct MembershipTable {
    sources: HashMap<u32, SyncSource>,
    local: Option<u32>,
    max_members: usize,
    evicted: Vec<u32>,
}

impl MembershipTable {
    pub fn new(max_members: usize) -> Self {
        MembershipTable {
            sources: HashMap::new(),
            local: None,
            max_members: max_members.max(1),
            evicted: vec![],
        }
    }

    /// lookup_or_create returns the entry for `ssrc`, creating it when
    /// unknown. A new entry records `origin` for the given flow.
    pub fn lookup_or_create(
        &mut self,
        ssrc: u32,
        kind: OriginKind,
        origin: Option<Origin>,
        now: SystemTime,
    ) -> (&mut SyncSource, bool) {
        let is_new = !self.sources.contains_key(&ssrc);
        if is_new && self.sources.len() >= self.max_members {
            self.evict_least_recent();
        }

        let source = self.sources.entry(ssrc).or_insert_with(|| {
            let mut source = SyncSource::new(ssrc, now);
            source.endpoint_mut(kind).origin = origin;
            source
        });
        (source, is_new)
    }

    fn evict_least_recent(&mut self) {
        let victim = self
            .sources
            .values()
            .filter(|s| !s.is_local)
            .min_by_key(|s| s.last_activity)
            .map(|s| s.ssrc);

        if let Some(ssrc) = victim {
            log::warn!(
                "membership table full ({} entries), evicting ssrc {}",
                self.sources.len(),
                ssrc
            );
            self.sources.remove(&ssrc);
            self.evicted.push(ssrc);
        }
    }

    /// SSRCs evicted by the member cap since the last call.
    pub fn take_evicted(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.evicted)
    }

    pub fn get(&self, ssrc: u32) -> Option<&SyncSource> {
        self.sources.get(&ssrc)
    }

    pub(crate) fn get_mut(&mut self, ssrc: u32) -> Option<&mut SyncSource> {
        self.sources.get_mut(&ssrc)
    }

    pub fn contains(&self, ssrc: u32) -> bool {
        self.sources.contains_key(&ssrc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncSource> {
        self.sources.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut SyncSource> {
        self.sources.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn local_ssrc(&self) -> Option<u32> {
        self.local
    }

    /// set_local makes `ssrc` the local source. A previous local entry, if
    /// any, stays in the table as a remote source.
    pub fn set_local(&mut self, ssrc: u32, now: SystemTime) {
        if let Some(old) = self.local.and_then(|old| self.sources.get_mut(&old)) {
            old.is_local = false;
        }
        let (source, _) = self.lookup_or_create(ssrc, OriginKind::Control, None, now);
        source.is_local = true;
        source.validated = true;
        self.local = Some(ssrc);
    }

    /// Picks a fresh SSRC not present in the table.
    pub(crate) fn unused_ssrc(&self) -> u32 {
        loop {
            let ssrc = rand::random::<u32>();
            if !self.sources.contains_key(&ssrc) {
                return ssrc;
            }
        }
    }

    /// mark_active refreshes the activity timestamp of `ssrc`.
    pub fn mark_active(&mut self, ssrc: u32, now: SystemTime) -> bool {
        match self.sources.get_mut(&ssrc) {
            Some(source) => {
                if now > source.last_activity {
                    source.last_activity = now;
                }
                true
            }
            None => false,
        }
    }

    /// record_departure marks `ssrc` as leaving without removing it. Returns
    /// true only for the first BYE seen for the source.
    pub fn record_departure(&mut self, ssrc: u32, reason: Bytes, now: SystemTime) -> bool {
        match self.sources.get_mut(&ssrc) {
            Some(source) if source.departure.is_none() && !source.is_local => {
                source.departure = Some(Departure { reason, at: now });
                source.is_sender = false;
                true
            }
            _ => false,
        }
    }

    /// expire removes remote sources silent for longer than `timeout` (when
    /// given) and departed sources whose leaving delay has passed.
    pub fn expire(
        &mut self,
        now: SystemTime,
        timeout: Option<Duration>,
        leaving_delay: Duration,
    ) -> Vec<u32> {
        let elapsed = |since: SystemTime| now.duration_since(since).unwrap_or_default();

        let removed: Vec<u32> = self
            .sources
            .values()
            .filter(|s| !s.is_local)
            .filter(|s| match (&s.departure, timeout) {
                (Some(departure), _) => elapsed(departure.at) >= leaving_delay,
                (None, Some(timeout)) => elapsed(s.last_activity) > timeout,
                (None, None) => false,
            })
            .map(|s| s.ssrc)
            .collect();

        for ssrc in &removed {
            log::trace!("expiring ssrc {}", ssrc);
            self.sources.remove(ssrc);
        }
        removed
    }

    /// expire_senders clears the sender flag of sources that sent no data
    /// within `timeout`.
    pub fn expire_senders(&mut self, now: SystemTime, timeout: Duration) {
        for source in self.sources.values_mut().filter(|s| !s.is_local) {
            let stale = source
                .last_data
                .map_or(true, |t| now.duration_since(t).unwrap_or_default() > timeout);
            if source.is_sender && stale {
                source.is_sender = false;
            }
        }
    }

    /// count_members counts every source that has not sent BYE, the local one
    /// included.
    pub fn count_members(&self) -> usize {
        self.sources.values().filter(|s| !s.has_departed()).count()
    }

    /// count_senders counts sources currently sending RTP. The local source
    /// counts while its sender flag is set.
    pub fn count_senders(&self) -> usize {
        self.sources
            .values()
            .filter(|s| s.is_sender && !s.has_departed())
            .count()
    }
}

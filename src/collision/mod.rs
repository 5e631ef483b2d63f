
use std::time::{Duration, SystemTime};

use crate::membership::{Origin, OriginKind, SyncSource};

/// What to do with a packet after the SSRC collision and loop check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Accept,
    Discard,
    /// Another participant uses our SSRC: the local SSRC must change.
    ResolveCollision,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Conflict {
    origin: Origin,
    last_seen: SystemTime,
}

/// An origin change confirmed by the second packet from the new origin.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OriginChange {
    pub ssrc: u32,
    pub kind: OriginKind,
    pub previous: Option<Origin>,
    pub current: Origin,
}

/// CollisionResolver implements the collision and loop detection of
/// RFC 3550 section 8.2.
///
/// Remote sources keep their stored origin until two consecutive packets
/// confirm a new one, so two sources sharing an SSRC cannot take the entry
/// from each other on every packet. Origins seen with our own SSRC go on a
/// conflict list: the first packet from such an origin is a collision, the
/// following ones are treated as our own traffic looping back.
#[derive(Debug, Default)]
pub struct CollisionResolver {
    conflicts: Vec<Conflict>,
    changes: Vec<OriginChange>,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// check classifies one packet claiming `source`'s SSRC from `origin`.
    pub fn check(
        &mut self,
        source: &mut SyncSource,
        is_new: bool,
        kind: OriginKind,
        origin: Origin,
        now: SystemTime,
    ) -> Action {
        if source.is_local() {
            return self.check_local(source.ssrc(), origin, now);
        }

        let ssrc = source.ssrc();
        let endpoint = source.endpoint_mut(kind);
        let current = endpoint.origin;
        match current {
            _ if is_new => {
                endpoint.origin = Some(origin);
                Action::Accept
            }
            None => {
                endpoint.origin = Some(origin);
                endpoint.pending = None;
                Action::Accept
            }
            Some(stored) if stored == origin => {
                endpoint.pending = None;
                Action::Accept
            }
            Some(stored) if endpoint.pending == Some(origin) => {
                log::debug!(
                    "ssrc {} {:?} origin moved from {} to {}",
                    ssrc,
                    kind,
                    stored,
                    origin
                );
                endpoint.origin = Some(origin);
                endpoint.pending = None;
                self.changes.push(OriginChange {
                    ssrc,
                    kind,
                    previous: Some(stored),
                    current: origin,
                });
                Action::Accept
            }
            Some(stored) => {
                log::debug!(
                    "ssrc {} claimed from {} while stored at {}, waiting for confirmation",
                    ssrc,
                    origin,
                    stored
                );
                endpoint.pending = Some(origin);
                Action::Discard
            }
        }
    }

    fn check_local(&mut self, ssrc: u32, origin: Origin, now: SystemTime) -> Action {
        if let Some(conflict) = self.conflicts.iter_mut().find(|c| c.origin == origin) {
            log::trace!("looped packet with local ssrc {} from {}", ssrc, origin);
            conflict.last_seen = now;
            return Action::Discard;
        }

        log::warn!("local ssrc {} collides with a participant at {}", ssrc, origin);
        self.conflicts.push(Conflict {
            origin,
            last_seen: now,
        });
        Action::ResolveCollision
    }

    /// Whether packets with our SSRC from `origin` are treated as a loop.
    pub fn is_conflicting(&self, origin: Origin) -> bool {
        self.conflicts.iter().any(|c| c.origin == origin)
    }

    /// purge forgets conflicting origins not seen for `timeout`.
    pub fn purge(&mut self, now: SystemTime, timeout: Duration) {
        self.conflicts
            .retain(|c| now.duration_since(c.last_seen).unwrap_or_default() <= timeout);
    }

    /// Origin changes confirmed since the last call.
    pub fn take_origin_changes(&mut self) -> Vec<OriginChange> {
        std::mem::take(&mut self.changes)
    }
}

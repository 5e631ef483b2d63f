use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP era 0 epoch (1900) and the unix epoch.
const NTP_UNIX_OFFSET: u64 = 0x83AA_7E80;

/// system_time_to_ntp converts wall clock time to a 64-bit NTP timestamp
/// (32.32 fixed point seconds since 1900).
pub fn system_time_to_ntp(t: SystemTime) -> u64 {
    let since_epoch = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = since_epoch.as_secs() + NTP_UNIX_OFFSET;
    let frac = ((since_epoch.subsec_nanos() as u64) << 32) / 1_000_000_000;
    (secs << 32) | frac
}

/// ntp_to_system_time is the inverse of `system_time_to_ntp`. Timestamps
/// before the unix epoch map to the epoch.
pub fn ntp_to_system_time(ntp: u64) -> SystemTime {
    let secs = (ntp >> 32).saturating_sub(NTP_UNIX_OFFSET);
    let nanos = ((ntp & 0xFFFF_FFFF) * 1_000_000_000) >> 32;
    UNIX_EPOCH
        .checked_add(Duration::new(secs, nanos as u32))
        .unwrap_or(UNIX_EPOCH)
}

/// The middle 32 bits of an NTP timestamp, as carried in LSR and compared
/// against DLSR.
pub fn compact_ntp(ntp: u64) -> u32 {
    (ntp >> 16) as u32
}

/// A duration in units of 1/65536 seconds, saturating at u32::MAX.
pub fn to_compact_duration(d: Duration) -> u32 {
    let units = d.as_secs_f64() * 65536.0;
    if units >= u32::MAX as f64 {
        u32::MAX
    } else {
        units as u32
    }
}

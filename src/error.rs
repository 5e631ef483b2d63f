use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// ErrBudgetTooSmall indicates that not even the leading report and the
    /// CNAME chunk fit in the per-packet size budget.
    #[error("report budget of {budget} octets is too small, need at least {needed}")]
    ErrBudgetTooSmall { budget: usize, needed: usize },

    /// ErrInvalidBandwidthFraction indicates a control or sender fraction
    /// outside of (0, 1).
    #[error("bandwidth fraction {0} must lie strictly between 0 and 1")]
    ErrInvalidBandwidthFraction(f64),

    /// ErrInvalidMinInterval indicates a minimum report interval that would
    /// produce non-positive intervals.
    #[error("minimum report interval must be positive")]
    ErrInvalidMinInterval,

    #[error("check interval must be positive")]
    ErrInvalidCheckInterval,

    #[error("reconsideration threshold {0} must be at least 1")]
    ErrInvalidThreshold(f64),

    #[error("member cap must allow at least one member")]
    ErrInvalidMemberCap,

    #[error("RTP clock rate must be positive")]
    ErrInvalidClockRate,

    /// ErrEmptyCname indicates a session configured without a canonical name.
    #[error("CNAME must not be empty")]
    ErrEmptyCname,

    #[error("SDES {0} item exceeds 255 octets")]
    ErrSdesItemTooLong(String),

    /// ErrPathMtuTooSmall indicates a path MTU that does not even cover the
    /// lower layer headers.
    #[error("path MTU {mtu} does not exceed header overhead {overhead}")]
    ErrPathMtuTooSmall { mtu: usize, overhead: usize },

    /// ErrSessionClosed indicates an operation on a session that already
    /// left or was aborted.
    #[error("session closed")]
    ErrSessionClosed,

    #[error("session already started")]
    ErrSessionStarted,

    #[error("{0}")]
    Rtcp(#[from] rtcp::Error),
    #[error("{0}")]
    Util(#[from] util::Error),
}


pub mod builder;
pub mod processor;
pub mod sdes;

pub use builder::{BuiltReport, ReportBuilder, ReportContext};
pub use processor::{
    ProcessContext, ProcessOutcome, ProcessSummary, RejectReason, ReportProcessor, SsrcChange,
};
pub use sdes::SdesScheduler;

//! Core engine: claim analysis, reply polling, settlement, feedback and
//! outreach posts.

pub mod analyzer;
pub mod dates;
pub mod feedback;
pub mod introduction;
pub mod poller;
pub mod retry;
pub mod settler;
pub mod task;

pub use analyzer::{Analysis, MarketAnalyzer};
pub use poller::{PollerSettings, ReplyPoller};
pub use task::PollerHandle;

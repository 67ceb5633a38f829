//! Exchange wire protocol: message types and envelope parsing.
//!
//! The protocol modeled here is a single exchange's kline/depth-diff
//! WebSocket feed plus its 24hr-ticker REST endpoint; see `messages.rs` for
//! the tolerant field-name handling the upstream frames require.

pub mod messages;
pub mod types;

pub use messages::{InboundMessage, parse_frame};
pub use types::{DepthDiff, KlineSnapshot, LevelUpdate, SubscriptionMessage, TickerStat};

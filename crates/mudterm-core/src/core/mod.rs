//! Core module: UI-agnostic session and relay runtime.
//!
//! This module contains:
//! - `transcript`: Bounded message log
//! - `relay`: Background bus subscriber and hand-off queue
//! - `channels`: Player/room identity and the current subscription set
//! - `gateway`: Command round trips to the game server
//! - `session`: `GameSession`, which ties the above together
//! - `format`: Table layout for inventory/equipment output
//! - `interrupt`: Ctrl+C handling

pub mod channels;
pub mod format;
pub mod gateway;
pub mod interrupt;
pub mod relay;
pub mod session;
pub mod transcript;

pub use channels::{ChannelManager, SubscriptionSet};
pub use gateway::CommandGateway;
pub use relay::{InboundMessage, Relay, RelayEvent, SubscriptionTarget};
pub use session::{GameSession, SessionOptions};
pub use transcript::{Category, Transcript, TranscriptEntry};

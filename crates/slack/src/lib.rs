//! Slack Integration - inbound event model and Web API client
//!
//! This crate owns everything Slack-shaped:
//! - **Events** (`events`) - Events API payload parsing and the
//!   reduction to the quest-event vocabulary
//! - **Client** (`client`) - reqwest Web API adapter implementing the
//!   core `ChatApi` contract (messages, DMs, identity, lookups)
//!
//! Chat failures are non-fatal by contract: callers log and continue.

pub mod client;
pub mod events;

pub use client::SlackClient;
pub use events::{parse_event, InboundEvent};

//! Agent Orchestration - intent resolution and action dispatch
//!
//! The pipeline for one inbound mention:
//!
//! ```text
//! text → normalize → fast path ─────────────────────────┐
//!                  └→ intent selector → skill executor ─┤→ reply
//!                                     └→ general reply ─┘
//! ```
//!
//! Native skill handlers (points dispatcher, content factory) are bound
//! through a static registry; skills without one run on the generic
//! model-driven path. The job monitor and quest tracker share the same
//! collaborator contracts and run detached from request handling.

pub mod agent;
pub mod content;
pub mod dispatch;
pub mod executor;
pub mod extract;
pub mod fastpath;
pub mod format;
pub mod intent;
pub mod llm;
pub mod monitor;
pub mod normalize;
pub mod quests;
pub mod reply;

#[cfg(test)]
pub(crate) mod testutil;

pub use agent::{Agent, AgentReply};
pub use content::ContentFactoryHandler;
pub use dispatch::{resolve_action, ActionDispatcher, CanonicalAction};
pub use executor::{HandlerRegistry, SkillExecutor, SkillHandler};
pub use fastpath::{match_fast_command, FastCommand, FastPath};
pub use intent::IntentSelector;
pub use llm::{ChatMessage, ChatOutcome, LlmClient, Role, TokenUsage};
pub use monitor::{JobMonitor, MonitorOutcome, MonitorSettings, ProgressSink};
pub use quests::QuestTracker;

//! HTTP adapters for the core's collaborator contracts: the community
//! backend (`PointsApi`), the article generation pipeline (`JobApi`),
//! and the model providers (`LlmClient`).
//!
//! Everything here is a thin reqwest translation layer; behavior and
//! policy live in `joey-core` and `joey-agent`.

pub mod jobs;
pub mod llm;
pub mod points;

pub use jobs::JobServiceClient;
pub use llm::{build_llm_client, AnthropicClient, OpenAiCompatClient};
pub use points::PointsHttpClient;

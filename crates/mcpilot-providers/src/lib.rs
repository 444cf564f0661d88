//! LLM provider layer for mcpilot.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`] — streaming + one-shot completion trait
//! - [`registry`] — static specs for the supported providers + matching logic
//! - [`http_provider::HttpProvider`] — generic OpenAI-compatible HTTP client
//! - [`sse`] — decodes `text/event-stream` bodies into [`mcpilot_core::StreamDelta`]s
//! - [`http_provider::create_provider`] — convenience builder from model name + config

pub mod http_provider;
pub mod registry;
pub mod sse;
pub mod traits;

pub use http_provider::{create_provider, HttpProvider};
pub use registry::{ProviderConfig, ProviderSpec, PROVIDERS};
pub use traits::{DeltaStream, LlmProvider, LlmRequestConfig};

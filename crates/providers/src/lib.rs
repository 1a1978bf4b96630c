//! LLM provider implementations and the provider gateway for SwarmForge.
//!
//! All vendor clients implement the `swarmforge_core::Provider` trait.
//! The [`ProviderGateway`] walks an ordered fallback chain over them.

pub mod anthropic;
pub mod gateway;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use gateway::{GatewayBuilder, ProviderEntry, ProviderGateway, ProviderStatus};
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;

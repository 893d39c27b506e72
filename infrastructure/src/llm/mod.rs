//! LLM adapters.

mod openai_gateway;
mod sse;

pub use openai_gateway::{
    GatewaySettings, OpenAiCompatibleGateway, default_base_url, normalize_base_url,
};

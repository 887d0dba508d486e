//! Remote LLM provider implementations.
//!
//! - **OpenAI** - `gpt-4o-mini` for command parsing, `gpt-4o` for code generation

pub mod openai;

pub use openai::OpenAiClient;

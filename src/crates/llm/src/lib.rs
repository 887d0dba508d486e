//! LLM integration for DevForge.
//!
//! - [`CommandParser`] turns plain English into an [`devforge_core::ActionRequest`]
//! - [`LlmCodeGenerator`] backs the `generate_code` task
//! - [`remote::OpenAiClient`] talks to any OpenAI-compatible `/chat/completions` endpoint
//!
//! # Example
//!
//! ```rust,ignore
//! use devforge_core::config::LlmConfig;
//! use llm::{CommandParser, ParsedCommand};
//!
//! let parser = CommandParser::from_settings(&LlmConfig::default())?;
//! match parser.parse("install java 17").await? {
//!     ParsedCommand::Action(request) => println!("{:?}", request),
//!     ParsedCommand::ServerInfo => println!("server info"),
//! }
//! ```

pub mod chat;
pub mod codegen;
pub mod config;
pub mod error;
pub mod parser;
pub mod remote;

pub use chat::{ChatMessage, ChatModel, ChatRequest, ChatResponse, Role};
pub use codegen::LlmCodeGenerator;
pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result, MISSING_OPENAI_KEY};
pub use parser::{CommandParser, ParsedCommand};

//! Chat completion and embedding providers.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub(crate) mod retry;
pub(crate) mod sse;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{ChatStream, LlmProvider, Message, Role};

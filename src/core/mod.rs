//! 核心层：错误分类、重试策略与回合编排

pub mod error;
pub mod orchestrator;
pub mod recovery;

pub use error::AiError;
pub use orchestrator::{Agent, TurnReply};
pub use recovery::{classify_message, classify_openai, classify_status, RetryPolicy};

//! Provider 层：chat-completion 与嵌入的抽象及实现（OpenAI 兼容 / Mock）

pub mod embedding;
pub mod mock;
pub mod openai;
pub mod traits;

pub use embedding::{EmbeddingProvider, OpenAiEmbedder};
pub use mock::{FailingChatClient, FailingEmbedder, MockChatClient, MockEmbedder};
pub use openai::{OpenAiChatClient, TokenUsage};
pub use traits::{ChatClient, ChatOutcome};

//! 记忆层：消息类型、会话与偏好、访客画像启发式、对话记忆持久化

pub mod conversation;
pub mod message;
pub mod profile;
pub mod session;

pub use conversation::{
    ContextRef, ConversationMemory, InMemoryMemoryStore, JsonMemoryStore, MemoryStore,
};
pub use message::{Message, Role, ToolCall};
pub use profile::{extract_interests, extract_topics, greeting_at, personalized_greeting};
pub use session::{
    ConversationStyle, InMemorySessionStore, Preferences, PreferencesUpdate, Session,
    SessionManager, SessionStore,
};

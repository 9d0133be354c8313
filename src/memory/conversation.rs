//! 对话记忆持久化
//!
//! 按会话 id 持久化消息序列与「本轮参考了哪些检索块」的 context 列表，
//! 用于跨进程恢复与答案溯源。文件实现为每会话一个 JSON 文件。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::AiError;
use crate::memory::Message;

/// 一条检索溯源记录：哪个域、哪个来源路径、相关度多少
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextRef {
    /// 检索域（code / documentation / blog）
    pub kind: String,
    /// 来源文档路径
    pub path: String,
    /// 相似度分数
    pub relevance: f32,
}

/// 会话键控的持久化记忆：镜像消息序列 + 检索溯源
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationMemory {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub context: Vec<ContextRef>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationMemory {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            context: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// 追加一轮对话（用户 + 助手）及其检索溯源
    pub fn record_turn(
        &mut self,
        user: Message,
        assistant: Message,
        context: Vec<ContextRef>,
    ) {
        self.messages.push(user);
        self.messages.push(assistant);
        self.context.extend(context);
        self.updated_at = Utc::now();
    }
}

/// 记忆仓库接口：按会话 id 读写
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationMemory>, AiError>;

    async fn save(&self, memory: &ConversationMemory) -> Result<(), AiError>;
}

/// 内存实现（测试与单进程部署用）
#[derive(Default)]
pub struct InMemoryMemoryStore {
    records: RwLock<HashMap<String, ConversationMemory>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationMemory>, AiError> {
        Ok(self.records.read().await.get(session_id).cloned())
    }

    async fn save(&self, memory: &ConversationMemory) -> Result<(), AiError> {
        self.records
            .write()
            .await
            .insert(memory.session_id.clone(), memory.clone());
        Ok(())
    }
}

/// 文件实现：目录下每会话一个 JSON 文件，父目录不存在时自动创建
#[derive(Debug)]
pub struct JsonMemoryStore {
    dir: PathBuf,
}

impl JsonMemoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn file_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_id(session_id)))
    }

    fn load_file(&self, session_id: &str) -> anyhow::Result<Option<ConversationMemory>> {
        let path = self.file_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let memory = serde_json::from_str(&data)?;
        Ok(Some(memory))
    }

    fn save_file(&self, memory: &ConversationMemory) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_path(&memory.session_id);
        std::fs::write(&path, serde_json::to_string_pretty(memory)?)?;
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for JsonMemoryStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationMemory>, AiError> {
        self.load_file(session_id)
            .map_err(|e| AiError::Session(format!("load memory for {session_id}: {e}")))
    }

    async fn save(&self, memory: &ConversationMemory) -> Result<(), AiError> {
        self.save_file(memory)
            .map_err(|e| AiError::Session(format!("save memory for {}: {e}", memory.session_id)))
    }
}

/// 会话 id 中的特殊字符不能进文件名
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

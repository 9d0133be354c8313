//! Mock 后端（测试用，无需 API）
//!
//! MockChatClient 按脚本回复，可在第一次 propose 时发出一个工具调用，
//! 便于离线跑通两阶段协议；MockEmbedder 用确定性的词袋哈希向量，
//! 相同文本得到完全一致的向量（相似度 1.0）。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::AiError;
use crate::llm::{ChatClient, ChatOutcome, EmbeddingProvider};
use crate::memory::{Message, ToolCall};
use crate::tools::ToolDefinition;

const MOCK_DIM: usize = 64;

/// 确定性词袋嵌入：每个小写词散列进固定桶
#[derive(Clone, Debug, Default)]
pub struct MockEmbedder;

impl MockEmbedder {
    /// 同步版本，供测试直接构造存储行
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; MOCK_DIM];
        for word in text.to_lowercase().split_whitespace() {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in word.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            vector[(hash % MOCK_DIM as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        Ok(self.vector_for(text))
    }
}

/// 总是失败的嵌入后端，用于错误路径测试
#[derive(Clone, Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, AiError> {
        Err(AiError::Embedding("mock embedder is down".to_string()))
    }
}

/// 脚本化 chat 客户端
#[derive(Default)]
pub struct MockChatClient {
    /// propose 无工具调用时返回的正文
    pub propose_reply: String,
    /// finalize 返回的正文
    pub final_reply: String,
    /// 配置后第一次 propose 发出该工具调用 (name, raw JSON args)
    pub tool_call: Option<(String, String)>,
    proposals: AtomicUsize,
    /// 最近一次 propose 收到的消息（供测试断言 grounding 注入）
    last_messages: Mutex<Vec<Message>>,
}

impl MockChatClient {
    pub fn replying(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self {
            propose_reply: reply.clone(),
            final_reply: reply,
            ..Default::default()
        }
    }

    pub fn with_tool_call(
        name: impl Into<String>,
        arguments: impl Into<String>,
        final_reply: impl Into<String>,
    ) -> Self {
        Self {
            propose_reply: String::new(),
            final_reply: final_reply.into(),
            tool_call: Some((name.into(), arguments.into())),
            ..Default::default()
        }
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<Message> {
        self.last_messages.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn propose(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ChatOutcome, AiError> {
        let n = self.proposals.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().expect("mock lock") = messages.to_vec();

        if n == 0 {
            if let Some((name, arguments)) = &self.tool_call {
                return Ok(ChatOutcome {
                    content: self.propose_reply.clone(),
                    tool_calls: vec![ToolCall {
                        id: "call_1".to_string(),
                        name: name.clone(),
                        arguments: arguments.clone(),
                    }],
                });
            }
        }
        Ok(ChatOutcome {
            content: self.propose_reply.clone(),
            tool_calls: Vec::new(),
        })
    }

    async fn finalize(&self, _messages: &[Message]) -> Result<String, AiError> {
        Ok(self.final_reply.clone())
    }
}

/// 总是返回同一错误的 chat 客户端，用于重试与回退路径测试
pub struct FailingChatClient {
    pub error: AiError,
    pub attempts: AtomicUsize,
}

impl FailingChatClient {
    pub fn new(error: AiError) -> Self {
        Self {
            error,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for FailingChatClient {
    async fn propose(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<ChatOutcome, AiError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    async fn finalize(&self, _messages: &[Message]) -> Result<String, AiError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

//! Provider 抽象
//!
//! 两阶段工具调用协议的 provider 无关接口：propose 提交对话与工具目录，
//! 允许 provider 发出零或多个工具调用；finalize 用补全了工具结果的对话
//! 换取面向用户的最终回答。任何合规的 chat-completion 后端都可替换接入。

use async_trait::async_trait;

use crate::core::AiError;
use crate::memory::{Message, ToolCall};
use crate::tools::ToolDefinition;

/// 第一阶段的产出：正文与 provider 发出的工具调用（可为空）
#[derive(Clone, Debug, Default)]
pub struct ChatOutcome {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Chat-completion 客户端接口
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// 第一阶段：提交对话 + 完整工具目录；provider 可发出工具调用
    async fn propose(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ChatOutcome, AiError>;

    /// 第二阶段：对话已追加工具结果消息，换取最终回答
    async fn finalize(&self, messages: &[Message]) -> Result<String, AiError>;

    /// 累计 token 使用 (prompt, completion, total)；默认无统计
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

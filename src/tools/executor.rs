//! 两阶段工具执行
//!
//! 第一阶段 propose 携带工具目录，provider 可能提出若干工具调用；
//! executor 逐个解析并分派，把结果以 tool 消息回写，再 finalize 取最终回答。
//! provider 不发工具调用时短路返回，不追加任何消息。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::AiError;
use crate::llm::ChatClient;
use crate::memory::Message;
use crate::tools::ToolRegistry;

/// 解析后的工具调用（arguments 已从原始 JSON 字符串解出）
#[derive(Clone, Debug)]
pub struct ParsedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// 一轮两阶段交互的结果
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub content: String,
    /// 实际执行的工具调用次数
    pub tool_invocations: usize,
}

/// 对话末尾是否是带工具调用的 assistant 消息
pub fn should_call_function(messages: &[Message]) -> bool {
    messages
        .last()
        .map(|m| m.role == crate::memory::Role::Assistant && !m.tool_calls.is_empty())
        .unwrap_or(false)
}

/// 从 assistant 消息解出首个工具调用；参数不是合法 JSON 时返回 None
pub fn extract_function_call(message: &Message) -> Option<ParsedToolCall> {
    let call = message.tool_calls.first()?;
    let arguments = serde_json::from_str(&call.arguments).ok()?;
    Some(ParsedToolCall {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments,
    })
}

/// 驱动两阶段协议的 executor，持有注册表
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 跑完整的一轮：propose，必要时执行工具并 finalize。
    /// messages 会被原地扩展（assistant 提案 + tool 结果）；无工具调用时不改动。
    pub async fn run_turn(
        &self,
        chat: &dyn ChatClient,
        messages: &mut Vec<Message>,
    ) -> Result<TurnOutcome, AiError> {
        let tools = self.registry.definitions();
        let outcome = chat.propose(messages, &tools).await?;

        if outcome.tool_calls.is_empty() {
            return Ok(TurnOutcome {
                content: outcome.content,
                tool_invocations: 0,
            });
        }

        messages.push(Message::assistant_with_calls(
            outcome.content,
            outcome.tool_calls.clone(),
        ));

        let mut invocations = 0;
        for call in &outcome.tool_calls {
            let arguments: Value = match serde_json::from_str(&call.arguments) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        tool = %call.name,
                        error = %e,
                        "skipping tool call with malformed arguments"
                    );
                    continue;
                }
            };

            let started = Instant::now();
            let result = self
                .registry
                .call_function(&call.name, arguments.clone())
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(output) => {
                    tracing::info!(
                        event = "tool_call",
                        tool = %call.name,
                        ok = true,
                        duration_ms,
                        args = %preview(&call.arguments),
                        outcome = %preview(output),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        event = "tool_call",
                        tool = %call.name,
                        ok = false,
                        duration_ms,
                        args = %preview(&call.arguments),
                        error = %e,
                    );
                }
            }

            let output = result?;
            invocations += 1;
            messages.push(Message::tool(call.id.clone(), output));
        }

        let content = chat.finalize(messages).await?;
        Ok(TurnOutcome {
            content,
            tool_invocations: invocations,
        })
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

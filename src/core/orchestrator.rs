//! 回合编排
//!
//! process_turn 把一轮对话串起来：取会话、三域检索注入 grounding、
//! 两阶段工具调用、首轮问候、兴趣抽取与记忆持久化。对调用方 infallible：
//! 可重试错误按策略退避重试，耗尽后降级为该错误的固定回退文案。

use std::sync::Arc;

use crate::core::{AiError, RetryPolicy};
use crate::llm::ChatClient;
use crate::memory::{
    extract_interests, extract_topics, personalized_greeting, ContextRef, ConversationMemory,
    MemoryStore, Message, Role, SessionManager,
};
use crate::retrieval::{ComprehensiveResults, RetrievalService, SearchResult};
use crate::tools::ToolExecutor;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for this site. \
Answer using the provided context when it is relevant, and say so when it is not. \
Use the available tools when they can answer the question better.";

/// 一轮对话的产出
#[derive(Clone, Debug)]
pub struct TurnReply {
    pub reply: String,
    pub tool_invocations: usize,
}

pub struct Agent {
    chat: Arc<dyn ChatClient>,
    retrieval: Arc<RetrievalService>,
    sessions: Arc<SessionManager>,
    memory: Arc<dyn MemoryStore>,
    executor: ToolExecutor,
    retry: RetryPolicy,
    system_prompt: String,
}

impl Agent {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        retrieval: Arc<RetrievalService>,
        sessions: Arc<SessionManager>,
        memory: Arc<dyn MemoryStore>,
        executor: ToolExecutor,
    ) -> Self {
        Self {
            chat,
            retrieval,
            sessions,
            memory,
            executor,
            retry: RetryPolicy::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// 处理一轮用户输入。永不向调用方返回 Err：内部失败降级为回退文案。
    pub async fn process_turn(&self, session_id: &str, text: &str) -> TurnReply {
        let session = match self.sessions.get_or_create(session_id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(session = %session_id, error = %e, "session lookup failed");
                return TurnReply {
                    reply: e.fallback_text().to_string(),
                    tool_invocations: 0,
                };
            }
        };
        let first_turn = session.messages.is_empty();

        let mut attempt = 0;
        let (content, invocations, context) = loop {
            match self.run_grounded(&session.messages, text).await {
                Ok(outcome) => break outcome,
                Err(e) => {
                    attempt += 1;
                    if self.retry.should_retry(&e, attempt) {
                        tracing::warn!(
                            session = %session_id,
                            attempt,
                            error = %e,
                            "turn failed, retrying"
                        );
                        self.retry.backoff(&e).await;
                        continue;
                    }
                    tracing::error!(session = %session_id, attempt, error = %e, "turn failed");
                    break (e.fallback_text().to_string(), 0, Vec::new());
                }
            }
        };

        let reply = if first_turn {
            let greeting = personalized_greeting(&session.preferences);
            format!("{greeting}\n\n{content}")
        } else {
            content
        };

        self.remember(session_id, text, &reply, context).await;

        TurnReply {
            reply,
            tool_invocations: invocations,
        }
    }

    /// 检索 grounding + 两阶段工具协议；返回 (回答, 工具调用数, 溯源)
    async fn run_grounded(
        &self,
        history: &[Message],
        text: &str,
    ) -> Result<(String, usize, Vec<ContextRef>), AiError> {
        let results = self.retrieval.comprehensive_search(text).await?;
        let context = context_refs(&results);

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(Message::system(self.system_prompt.clone()));
        if let Some(grounding) = grounding_message(&results) {
            messages.push(grounding);
        }
        messages.extend_from_slice(history);
        messages.push(Message::user(text));

        let outcome = self.executor.run_turn(self.chat.as_ref(), &mut messages).await?;
        Ok((outcome.content, outcome.tool_invocations, context))
    }

    /// 回合收尾：抽兴趣并入偏好、追加消息、写持久化记忆。
    /// 这里的失败只记日志，回答已经产出，不再影响调用方。
    async fn remember(
        &self,
        session_id: &str,
        user_text: &str,
        reply: &str,
        context: Vec<ContextRef>,
    ) {
        let user_message = Message::user(user_text);
        let probe = [user_message.clone()];
        let interests = extract_interests(&probe);
        let topics = extract_topics(&probe);
        if let Err(e) = self
            .sessions
            .merge_extracted(session_id, interests, topics)
            .await
        {
            tracing::warn!(session = %session_id, error = %e, "preference merge failed");
        }

        if let Err(e) = self.sessions.add_message(session_id, Role::User, user_text).await {
            tracing::warn!(session = %session_id, error = %e, "recording user message failed");
        }
        if let Err(e) = self
            .sessions
            .add_message(session_id, Role::Assistant, reply)
            .await
        {
            tracing::warn!(session = %session_id, error = %e, "recording reply failed");
        }

        let mut record = match self.memory.load(session_id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => ConversationMemory::new(session_id),
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "memory load failed");
                ConversationMemory::new(session_id)
            }
        };
        record.record_turn(user_message, Message::assistant(reply), context);
        if let Err(e) = self.memory.save(&record).await {
            tracing::warn!(session = %session_id, error = %e, "memory save failed");
        }
    }
}

/// 每个域取最相关的一条作为溯源记录
fn context_refs(results: &ComprehensiveResults) -> Vec<ContextRef> {
    let mut refs = Vec::new();
    let mut push_top = |kind: &str, domain: &[SearchResult]| {
        if let Some(top) = domain.first() {
            refs.push(ContextRef {
                kind: kind.to_string(),
                path: top.metadata.source_path.clone(),
                relevance: top.similarity,
            });
        }
    };
    push_top("code", &results.code);
    push_top("documentation", &results.documentation);
    push_top("blog", &results.blog);
    refs
}

/// 把三域结果拼成一条 system 消息；全空则不注入
fn grounding_message(results: &ComprehensiveResults) -> Option<Message> {
    if results.is_empty() {
        return None;
    }

    let mut sections = Vec::new();
    let mut push_section = |label: &str, domain: &[SearchResult]| {
        if domain.is_empty() {
            return;
        }
        let body = domain
            .iter()
            .map(|r| format!("[{}] {}", r.metadata.source_path, r.content))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("## {label}\n{body}"));
    };
    push_section("Code", &results.code);
    push_section("Documentation", &results.documentation);
    push_section("Blog posts", &results.blog);

    Some(Message::system(format!(
        "Relevant site context retrieved for this question:\n\n{}",
        sections.join("\n\n")
    )))
}

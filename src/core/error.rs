//! AI 错误分类体系
//!
//! Provider / 存储 / 工具的所有失败统一收敛为 AiError，每种错误携带固定的用户可见
//! 回退文案（fallback_text）；编排器永远不把原始错误抛给调用方，只返回回退文案。

use std::time::Duration;

use thiserror::Error;

/// 统一错误分类：编排器据此决定重试还是回退
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// Provider 通用失败（可重试）
    #[error("API error: {0}")]
    Api(String),

    /// Provider 限流（可重试，退避更久）
    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// 传输层 / 连接失败（可重试）
    #[error("Network error: {0}")]
    Network(String),

    /// Provider 拒绝请求格式（不可重试）
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 输入超出 provider 上下文上限（不可重试）
    #[error("Context too long: {0}")]
    ContextTooLong(String),

    /// 工具执行抛错（不可重试，直接回退）
    #[error("Function call failed: {0}")]
    FunctionCallFailed(String),

    /// 会话查找 / 更新失败
    #[error("Session error: {0}")]
    Session(String),

    /// 嵌入 provider 失败
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// 未分类错误
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AiError {
    /// 只有 Api / RateLimit / Network 允许整轮重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::Api(_) | AiError::RateLimit(_) | AiError::Network(_)
        )
    }

    /// 每类错误的固定退避时长；对不可重试类仅在调用方强行重试时才有意义
    pub fn retry_delay(&self) -> Duration {
        match self {
            AiError::RateLimit(_) => Duration::from_millis(5000),
            AiError::Network(_) => Duration::from_millis(2000),
            _ => Duration::from_millis(1000),
        }
    }

    /// 用户可见回退文案：重试耗尽或不可重试时作为助手回复返回
    pub fn fallback_text(&self) -> &'static str {
        match self {
            AiError::Api(_) => {
                "I'm having trouble reaching my knowledge service right now. Please try again in a moment."
            }
            AiError::RateLimit(_) => {
                "I'm answering a lot of questions right now. Please wait a moment and ask again."
            }
            AiError::Network(_) => {
                "I'm having network trouble at the moment. Please try again shortly."
            }
            AiError::InvalidRequest(_) => {
                "I couldn't process that request. Could you rephrase your question?"
            }
            AiError::ContextTooLong(_) => {
                "Our conversation has gotten quite long. Could you start a fresh question?"
            }
            AiError::FunctionCallFailed(_) => {
                "I tried to look that up but something went wrong. Please try again."
            }
            AiError::Session(_) => {
                "I lost track of our conversation. Please refresh and try again."
            }
            AiError::Embedding(_) => {
                "I couldn't process that content right now. Please try again later."
            }
            AiError::Unknown(_) => "Something unexpected happened. Please try again.",
        }
    }
}

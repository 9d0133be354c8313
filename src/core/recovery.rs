//! 错误分类与重试策略
//!
//! 将 provider 报告的状态码 / OpenAIError 映射为统一的 AiError；
//! RetryPolicy 持有尝试次数上限（默认 3 次）并按错误类型退避。

use async_openai::error::OpenAIError;

use crate::core::AiError;

/// 按 HTTP 状态码分类：429 限流，4xx 区分上下文超限与非法请求，5xx 视为通用 API 失败。
/// 直接暴露状态码的后端（自建 HTTP 客户端等）从这里接入；
/// async-openai 的错误不带状态码，走 classify_openai。
pub fn classify_status(status: u16, message: &str) -> AiError {
    match status {
        429 => AiError::RateLimit(message.to_string()),
        400 | 413 | 422 => {
            if mentions_context_limit(message) {
                AiError::ContextTooLong(message.to_string())
            } else {
                AiError::InvalidRequest(message.to_string())
            }
        }
        401 | 403 => AiError::InvalidRequest(message.to_string()),
        500..=599 => AiError::Api(message.to_string()),
        _ => AiError::Api(message.to_string()),
    }
}

/// 将 async-openai 的错误映射为 AiError；传输层错误归 Network，其余按消息内容归类
pub fn classify_openai(err: &OpenAIError) -> AiError {
    match err {
        OpenAIError::Reqwest(e) => AiError::Network(e.to_string()),
        OpenAIError::ApiError(api) => classify_message(&api.message),
        OpenAIError::InvalidArgument(msg) => AiError::InvalidRequest(msg.clone()),
        other => classify_message(&other.to_string()),
    }
}

/// 按错误消息内容归类：限流、上下文超限、非法请求，兜底为通用 API 失败
pub fn classify_message(message: &str) -> AiError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("429")
    {
        AiError::RateLimit(message.to_string())
    } else if mentions_context_limit(message) {
        AiError::ContextTooLong(message.to_string())
    } else if lower.contains("invalid_request") || lower.contains("invalid request") {
        AiError::InvalidRequest(message.to_string())
    } else if lower.contains("connection") || lower.contains("timed out") {
        AiError::Network(message.to_string())
    } else {
        AiError::Api(message.to_string())
    }
}

fn mentions_context_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("context length")
        || lower.contains("context_length")
        || lower.contains("maximum context")
        || lower.contains("token limit")
}

/// 重试策略：调用方负责限定尝试次数；退避时长由错误类型决定
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 单轮对话的最大尝试次数（含首次）
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// attempt 为已完成的尝试次数；只有可重试错误且未达上限时才继续
    pub fn should_retry(&self, err: &AiError, attempt: u32) -> bool {
        err.is_retryable() && attempt < self.max_attempts
    }

    /// 按错误类型退避
    pub async fn backoff(&self, err: &AiError) {
        tokio::time::sleep(err.retry_delay()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify_429_is_rate_limit() {
        let err = classify_status(429, "too many requests");
        assert!(matches!(err, AiError::RateLimit(_)));
        assert!(err.is_retryable());
        assert_eq!(err.retry_delay(), Duration::from_millis(5000));
    }

    #[test]
    fn test_classify_400_invalid_request() {
        let err = classify_status(400, "missing field 'messages'");
        assert!(matches!(err, AiError::InvalidRequest(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_400_context_too_long() {
        let err = classify_status(400, "this model's maximum context length is 8192 tokens");
        assert!(matches!(err, AiError::ContextTooLong(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_500_is_api_error() {
        let err = classify_status(500, "internal server error");
        assert!(matches!(err, AiError::Api(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_message_rate_limit() {
        let err = classify_message("Rate limit reached for gpt-4o-mini");
        assert!(matches!(err, AiError::RateLimit(_)));
    }

    #[test]
    fn test_classify_message_fallthrough() {
        let err = classify_message("model overloaded");
        assert!(matches!(err, AiError::Api(_)));
    }

    #[test]
    fn test_retry_policy_caps_attempts() {
        let policy = RetryPolicy::default();
        let err = AiError::Network("reset".into());
        assert!(policy.should_retry(&err, 1));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
    }

    #[test]
    fn test_retry_policy_rejects_non_retryable() {
        let policy = RetryPolicy::default();
        let err = AiError::FunctionCallFailed("stats".into());
        assert!(!policy.should_retry(&err, 1));
    }
}

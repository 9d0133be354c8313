//! 嵌入 provider：调用 OpenAI 兼容的 /embeddings 端点
//!
//! 返回定长向量；provider 不可达或拒绝输入一律归为 EmbeddingError。

use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use crate::core::AiError;

/// 嵌入提供方接口
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 文本编码为定长向量；失败为 EmbeddingError
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError>;
}

/// 使用 async-openai 的 embeddings 实现；base_url 可指向任意兼容端点
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AiError::Embedding("empty input text".to_string()));
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .build()
            .map_err(|e| AiError::Embedding(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| AiError::Embedding(e.to_string()))?;

        let vector = response
            .data
            .first()
            .map(|e| e.embedding.clone())
            .unwrap_or_default();
        if vector.is_empty() {
            return Err(AiError::Embedding(
                "provider returned no embedding data".to_string(),
            ));
        }
        Ok(vector)
    }
}

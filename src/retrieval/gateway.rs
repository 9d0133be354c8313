//! 嵌入与向量存储网关（写路径）
//!
//! 生成嵌入并把 (content, metadata, vector) 作为一个整体落库；更新按 path 同时
//! 替换 content 与向量；删除按 path 级联。批量写不保证原子性，逐块返回结果，
//! 由调用方决定如何处理部分失败。

use std::sync::Arc;

use crate::core::AiError;
use crate::ingest::DocumentChunk;
use crate::llm::EmbeddingProvider;
use crate::retrieval::store::{StoredChunk, VectorStore};

pub struct EmbeddingGateway {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// 文本编码为向量；provider 不可达或拒绝输入时为 EmbeddingError
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let vector = self.embedder.embed(text).await?;
        if vector.is_empty() {
            return Err(AiError::Embedding(
                "provider returned an empty embedding".to_string(),
            ));
        }
        Ok(vector)
    }

    /// 生成嵌入并落库；存储错误原样向上传播，不吞掉
    pub async fn store_chunk(&self, chunk: DocumentChunk) -> Result<(), AiError> {
        let embedding = self.embed(&chunk.content).await?;
        self.store
            .insert(StoredChunk {
                content: chunk.content,
                metadata: chunk.metadata,
                embedding,
            })
            .await
    }

    /// 逐块 store；返回与入参等长的逐项结果，单块失败不阻断后续块
    pub async fn batch_store(&self, chunks: Vec<DocumentChunk>) -> Vec<Result<(), AiError>> {
        let mut results = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let path = chunk.metadata.source_path.clone();
            let index = chunk.metadata.chunk_index;
            let result = self.store_chunk(chunk).await;
            if let Err(ref e) = result {
                tracing::warn!(path = %path, chunk_index = index, error = %e, "chunk store failed");
            }
            results.push(result);
        }
        results
    }

    /// 为既有 path 重新生成向量，同时覆盖 content 与向量；返回受影响行数
    pub async fn update_embedding(
        &self,
        path: &str,
        new_content: &str,
    ) -> Result<usize, AiError> {
        let embedding = self.embed(new_content).await?;
        let updated = self
            .store
            .update_by_path(path, new_content.to_string(), embedding)
            .await?;
        if updated == 0 {
            tracing::warn!(path = %path, "update_embedding matched no stored chunks");
        }
        Ok(updated)
    }

    /// 按 path 级联删除所有块
    pub async fn delete_by_path(&self, path: &str) -> Result<usize, AiError> {
        self.store.delete_by_path(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::chunk_document;
    use crate::llm::mock::{FailingEmbedder, MockEmbedder};
    use crate::retrieval::store::InMemoryVectorStore;

    fn gateway_with(embedder: Arc<dyn EmbeddingProvider>) -> (EmbeddingGateway, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new());
        (EmbeddingGateway::new(embedder, store.clone()), store)
    }

    #[tokio::test]
    async fn test_store_chunk_persists_vector() {
        let (gateway, store) = gateway_with(Arc::new(MockEmbedder::default()));
        let chunks = chunk_document("docs/a.md", "hello vector world", 1000, 0);
        gateway.store_chunk(chunks[0].clone()).await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_embedding_error() {
        let (gateway, _) = gateway_with(Arc::new(FailingEmbedder));
        let chunks = chunk_document("docs/a.md", "text", 1000, 0);
        let err = gateway.store_chunk(chunks[0].clone()).await.unwrap_err();
        assert!(matches!(err, AiError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_batch_store_reports_per_chunk() {
        let (gateway, store) = gateway_with(Arc::new(MockEmbedder::default()));
        let content = "x".repeat(250);
        let chunks = chunk_document("docs/a.md", &content, 100, 20);
        let expected = chunks.len();

        let results = gateway.batch_store(chunks).await;
        assert_eq!(results.len(), expected);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(store.len().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_update_embedding_rewrites_path() {
        let (gateway, store) = gateway_with(Arc::new(MockEmbedder::default()));
        let chunks = chunk_document("docs/a.md", "original", 1000, 0);
        gateway.store_chunk(chunks[0].clone()).await.unwrap();

        let updated = gateway
            .update_embedding("docs/a.md", "replacement")
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(store.len().await.unwrap(), 1);
    }
}

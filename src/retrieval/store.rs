//! 向量存储契约与内存实现
//!
//! 按 path 键控插入 / 更新 / 级联删除，相似度检索接收
//! (查询向量, match_count, match_threshold) 并返回带相似度分数的行。

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::AiError;
use crate::ingest::ChunkMetadata;

/// 一条已落库的块：内容、元数据与向量作为一个整体写入
#[derive(Clone, Debug)]
pub struct StoredChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

/// 相似度检索返回的行
#[derive(Clone, Debug)]
pub struct ScoredRow {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub similarity: f32,
}

/// 向量存储接口：内存实现之外可接 pgvector / sqlite-vec 等后端
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 原子写入一条 (content, metadata, vector)
    async fn insert(&self, chunk: StoredChunk) -> Result<(), AiError>;

    /// 覆盖某 path 下所有块的 content 与向量（两者一起替换），返回受影响行数
    async fn update_by_path(
        &self,
        path: &str,
        content: String,
        embedding: Vec<f32>,
    ) -> Result<usize, AiError>;

    /// 删除某 path 下所有块（级联，不按单块），返回删除行数
    async fn delete_by_path(&self, path: &str) -> Result<usize, AiError>;

    /// 相似度检索：按分数降序，过滤低于 match_threshold 的行，至多 match_count 条
    async fn similarity_search(
        &self,
        query: &[f32],
        match_count: usize,
        match_threshold: f32,
    ) -> Result<Vec<ScoredRow>, AiError>;

    async fn len(&self) -> Result<usize, AiError>;
}

/// 余弦相似度，负值截断到 0（分数约定在 [0, 1] 区间）
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).max(0.0)
    }
}

/// 内存实现：RwLock 保护的行表
#[derive(Default)]
pub struct InMemoryVectorStore {
    rows: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, chunk: StoredChunk) -> Result<(), AiError> {
        self.rows.write().await.push(chunk);
        Ok(())
    }

    async fn update_by_path(
        &self,
        path: &str,
        content: String,
        embedding: Vec<f32>,
    ) -> Result<usize, AiError> {
        let mut rows = self.rows.write().await;
        let mut updated = 0;
        for row in rows.iter_mut().filter(|r| r.metadata.source_path == path) {
            row.content = content.clone();
            row.embedding = embedding.clone();
            row.metadata.updated_at = chrono::Utc::now();
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_by_path(&self, path: &str) -> Result<usize, AiError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| r.metadata.source_path != path);
        Ok(before - rows.len())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        match_count: usize,
        match_threshold: f32,
    ) -> Result<Vec<ScoredRow>, AiError> {
        let rows = self.rows.read().await;
        let mut scored: Vec<ScoredRow> = rows
            .iter()
            .map(|row| ScoredRow {
                content: row.content.clone(),
                metadata: row.metadata.clone(),
                similarity: cosine_similarity(query, &row.embedding),
            })
            .filter(|row| row.similarity >= match_threshold)
            .collect();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(match_count);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize, AiError> {
        Ok(self.rows.read().await.len())
    }
}

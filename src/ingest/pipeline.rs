//! 摄取管线：文件 / 目录 -> 分块 -> 嵌入 -> 向量库
//!
//! 重复摄取同一 path 会先按 path 清掉旧块再写新块，保证检索结果不混入
//! 过期版本。目录摄取逐文件独立处理，单个文件失败只记入报告，不中断整体。

use std::path::Path;
use std::sync::Arc;

use walkdir::WalkDir;

use crate::core::AiError;
use crate::ingest::chunker::chunk_document;
use crate::retrieval::EmbeddingGateway;

/// 默认分块参数
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// 目录摄取汇总
#[derive(Clone, Debug, Default)]
pub struct IngestReport {
    /// 成功处理的文件数
    pub files: usize,
    /// 落库的块总数
    pub chunks_stored: usize,
    /// (path, 错误描述)，含读文件失败与整块失败的文件
    pub failures: Vec<(String, String)>,
}

pub struct DocumentIngestor {
    gateway: Arc<EmbeddingGateway>,
    chunk_size: usize,
    chunk_overlap: usize,
    /// 目录扫描接受的扩展名（小写，无点）
    extensions: Vec<String>,
}

impl DocumentIngestor {
    pub fn new(gateway: Arc<EmbeddingGateway>) -> Self {
        Self {
            gateway,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            extensions: vec![
                "md".to_string(),
                "markdown".to_string(),
                "txt".to_string(),
            ],
        }
    }

    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// 摄取单个文件内容；source_path 用作存储键。返回落库块数。
    pub async fn ingest_content(
        &self,
        source_path: &str,
        content: &str,
    ) -> Result<usize, AiError> {
        // 重复摄取：先清旧块
        let removed = self.gateway.delete_by_path(source_path).await?;
        if removed > 0 {
            tracing::debug!(path = %source_path, removed, "replaced previously ingested chunks");
        }

        let chunks = chunk_document(source_path, content, self.chunk_size, self.chunk_overlap);
        if chunks.is_empty() {
            tracing::debug!(path = %source_path, "nothing to ingest");
            return Ok(0);
        }

        let total = chunks.len();
        let results = self.gateway.batch_store(chunks).await;
        let stored = results.iter().filter(|r| r.is_ok()).count();
        if stored < total {
            tracing::warn!(path = %source_path, stored, total, "partial ingest");
        } else {
            tracing::info!(path = %source_path, chunks = stored, "ingested");
        }
        Ok(stored)
    }

    /// 从磁盘读取并摄取
    pub async fn ingest_file(&self, path: &Path) -> Result<usize, AiError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AiError::Unknown(format!("read {}: {e}", path.display())))?;
        self.ingest_content(&path.to_string_lossy(), &content).await
    }

    /// 递归摄取目录下所有匹配扩展名的文件
    pub async fn ingest_directory(&self, root: &Path) -> IngestReport {
        let mut report = IngestReport::default();

        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| self.extensions.iter().any(|x| x == &e.to_lowercase()))
                .unwrap_or(false);
            if !matches {
                continue;
            }

            match self.ingest_file(path).await {
                Ok(stored) => {
                    report.files += 1;
                    report.chunks_stored += stored;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "file ingest failed");
                    report
                        .failures
                        .push((path.to_string_lossy().into_owned(), e.to_string()));
                }
            }
        }

        tracing::info!(
            files = report.files,
            chunks = report.chunks_stored,
            failures = report.failures.len(),
            "directory ingest complete"
        );
        report
    }
}

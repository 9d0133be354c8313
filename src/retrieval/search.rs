//! 域感知检索服务（读路径）
//!
//! 在向量存储之上做相似度检索：严格按分数降序、过滤低于 min_similarity 的结果、
//! 截断到 max_results。三个域包装各自带固定前缀与相似度下限，
//! comprehensive_search 三路并发扇出后按域名归并。

use std::sync::Arc;

use crate::core::AiError;
use crate::ingest::{ChunkMetadata, DocType};
use crate::llm::EmbeddingProvider;
use crate::retrieval::store::VectorStore;

/// 检索参数；域包装会覆盖 doc_type 与 min_similarity
#[derive(Clone, Debug)]
pub struct SearchOptions {
    pub match_count: usize,
    pub match_threshold: f32,
    pub doc_type: Option<DocType>,
    pub min_similarity: f32,
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            match_count: 10,
            match_threshold: 0.3,
            doc_type: None,
            min_similarity: 0.5,
            max_results: 5,
        }
    }
}

/// 检索调参：域相似度下限用于压制非结构化文本里的低置信噪声
#[derive(Clone, Debug)]
pub struct RetrievalTuning {
    pub base: SearchOptions,
    pub code_floor: f32,
    pub documentation_floor: f32,
    pub blog_floor: f32,
}

impl Default for RetrievalTuning {
    fn default() -> Self {
        Self {
            base: SearchOptions::default(),
            code_floor: 0.6,
            documentation_floor: 0.5,
            blog_floor: 0.5,
        }
    }
}

/// 检索结果：只在查询时产生，不落库
#[derive(Clone, Debug)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub similarity: f32,
}

/// 三域并发检索的归并结果，按域名键控，域之间无顺序依赖
#[derive(Clone, Debug, Default)]
pub struct ComprehensiveResults {
    pub code: Vec<SearchResult>,
    pub documentation: Vec<SearchResult>,
    pub blog: Vec<SearchResult>,
}

impl ComprehensiveResults {
    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.documentation.is_empty() && self.blog.is_empty()
    }
}

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    tuning: RetrievalTuning,
}

impl RetrievalService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self::with_tuning(embedder, store, RetrievalTuning::default())
    }

    pub fn with_tuning(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        tuning: RetrievalTuning,
    ) -> Self {
        Self {
            embedder,
            store,
            tuning,
        }
    }

    /// 相似度检索：降序、按 min_similarity 过滤、截断到 max_results
    pub async fn search_similar_documents(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, AiError> {
        let query_vector = self.embedder.embed(query).await?;
        let rows = self
            .store
            .similarity_search(&query_vector, options.match_count, options.match_threshold)
            .await?;

        let mut results: Vec<SearchResult> = rows
            .into_iter()
            .filter(|row| match options.doc_type {
                Some(doc_type) => row.metadata.doc_type == doc_type,
                None => true,
            })
            .filter(|row| row.similarity >= options.min_similarity)
            .map(|row| SearchResult {
                content: row.content,
                metadata: row.metadata,
                similarity: row.similarity,
            })
            .collect();

        // 存储层已排序；此处再断言一次降序约定
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(options.max_results);
        Ok(results)
    }

    fn domain_options(&self, doc_type: DocType, floor: f32) -> SearchOptions {
        SearchOptions {
            doc_type: Some(doc_type),
            min_similarity: self.tuning.base.min_similarity.max(floor),
            ..self.tuning.base.clone()
        }
    }

    /// 代码域：前缀 "Code context: "，下限 0.6
    pub async fn search_code_context(&self, query: &str) -> Result<Vec<SearchResult>, AiError> {
        let options = self.domain_options(DocType::Project, self.tuning.code_floor);
        self.search_similar_documents(&format!("Code context: {query}"), &options)
            .await
    }

    /// 文档域：前缀 "Documentation: "，下限 0.5
    pub async fn search_documentation(&self, query: &str) -> Result<Vec<SearchResult>, AiError> {
        let options =
            self.domain_options(DocType::Documentation, self.tuning.documentation_floor);
        self.search_similar_documents(&format!("Documentation: {query}"), &options)
            .await
    }

    /// 博客域：前缀 "Blog post: "，下限 0.5
    pub async fn search_blog_posts(&self, query: &str) -> Result<Vec<SearchResult>, AiError> {
        let options = self.domain_options(DocType::Blog, self.tuning.blog_floor);
        self.search_similar_documents(&format!("Blog post: {query}"), &options)
            .await
    }

    /// 三域并发扇出 / 扇入；任一域失败则整体失败，交由上层分类处理
    pub async fn comprehensive_search(
        &self,
        query: &str,
    ) -> Result<ComprehensiveResults, AiError> {
        let (code, documentation, blog) = tokio::join!(
            self.search_code_context(query),
            self.search_documentation(query),
            self.search_blog_posts(query),
        );
        Ok(ComprehensiveResults {
            code: code?,
            documentation: documentation?,
            blog: blog?,
        })
    }
}

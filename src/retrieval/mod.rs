//! 检索层：向量存储契约、嵌入网关（写路径）、域感知检索服务（读路径）

pub mod gateway;
pub mod search;
pub mod store;

pub use gateway::EmbeddingGateway;
pub use search::{
    ComprehensiveResults, RetrievalService, RetrievalTuning, SearchOptions, SearchResult,
};
pub use store::{cosine_similarity, InMemoryVectorStore, ScoredRow, StoredChunk, VectorStore};

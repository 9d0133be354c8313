//! 内容摄取：front matter 解析、滑动窗口分块与文件/目录管线

pub mod chunker;
pub mod pipeline;

pub use chunker::{
    chunk_document, chunk_text, parse_front_matter, resolve_doc_type, ChunkMetadata, DocType,
    DocumentChunk, FrontMatter,
};
pub use pipeline::{
    DocumentIngestor, IngestReport, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
};

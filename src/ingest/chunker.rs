//! 文档分块与元数据推导
//!
//! 定长滑窗分块（UTF-8 安全，按字符计）：相邻块精确重叠 overlap 个字符，
//! 末块可短于 size；空文档产出空序列。元数据按文档推导一次，
//! chunk_index / total_chunks 逐块填充。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 文档类型：按路径一次性判定，所有按类型分支处都穷尽匹配
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Blog,
    Project,
    Tutorial,
    Documentation,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Blog => "blog",
            DocType::Project => "project",
            DocType::Tutorial => "tutorial",
            DocType::Documentation => "documentation",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 块级元数据：同一文档的所有块共享除 chunk_index / total_chunks 外的字段
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_type: DocType,
    pub tags: BTreeSet<String>,
    pub source_path: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// 一个待嵌入的文档块
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// 定长滑窗分块：覆盖全文；len <= size 时恰好一块；空输入零块。
/// len > size 时块数 = ceil((len - overlap) / (size - overlap))。
pub fn chunk_text(content: &str, size: usize, overlap: usize) -> Vec<String> {
    if size == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = content.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= size {
        return vec![content.to_string()];
    }

    // overlap >= size 会原地踏步
    let step = size - overlap.min(size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// 路径判定文档类型，首个命中优先：
/// blog 路径前缀 > 文档（docs 目录 / README / 通用标记扩展名）> tutorial 子串 > 默认 project
pub fn resolve_doc_type(path: &str) -> DocType {
    let lower = path.replace('\\', "/").to_lowercase();

    if lower.starts_with("blog/") || lower.contains("/blog/") || lower.starts_with("content/blog")
    {
        return DocType::Blog;
    }

    let file_name = lower.rsplit('/').next().unwrap_or(&lower);
    if lower.starts_with("docs/")
        || lower.contains("/docs/")
        || file_name.starts_with("readme")
        || lower.ends_with(".md")
        || lower.ends_with(".markdown")
    {
        return DocType::Documentation;
    }

    if lower.contains("tutorial") {
        return DocType::Tutorial;
    }

    DocType::Project
}

/// 解析出的头部键值块
#[derive(Clone, Debug, Default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub tags: BTreeSet<String>,
}

/// 解析开头的 `---` 包围的 key: value 块；没有时返回默认值与原文。
/// tags 支持 `a, b` 与 `[a, b]` 两种写法。
pub fn parse_front_matter(content: &str) -> (FrontMatter, &str) {
    let mut front = FrontMatter::default();

    let Some(rest) = content.strip_prefix("---") else {
        return (front, content);
    };
    let Some(end) = rest.find("\n---") else {
        return (front, content);
    };

    let header = &rest[..end];
    for line in header.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "title" => {
                let title = value.trim_matches(['"', '\'']);
                if !title.is_empty() {
                    front.title = Some(title.to_string());
                }
            }
            "tags" => {
                let list = value.trim_start_matches('[').trim_end_matches(']');
                front.tags = list
                    .split(',')
                    .map(|t| t.trim().trim_matches(['"', '\'']).to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            _ => {}
        }
    }

    let body = rest[end + "\n---".len()..].trim_start_matches('\n');
    (front, body)
}

/// 整文档处理：解析头部块、推导类型与标题、分块并逐块填充元数据
pub fn chunk_document(
    source_path: &str,
    content: &str,
    size: usize,
    overlap: usize,
) -> Vec<DocumentChunk> {
    let (front, body) = parse_front_matter(content);
    let doc_type = resolve_doc_type(source_path);
    let title = front.title.unwrap_or_else(|| source_path.to_string());
    let now = Utc::now();

    let pieces = chunk_text(body, size, overlap);
    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| DocumentChunk {
            content: piece,
            metadata: ChunkMetadata {
                doc_type,
                tags: front.tags.clone(),
                source_path: source_path.to_string(),
                title: title.clone(),
                created_at: now,
                updated_at: now,
                chunk_index: index,
                total_chunks: total,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_yields_no_chunks() {
        assert!(chunk_text("", 100, 20).is_empty());
    }

    #[test]
    fn test_short_content_is_single_chunk() {
        let chunks = chunk_text("short text", 100, 20);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn test_chunk_count_matches_formula() {
        // len=10, size=4, overlap=1 -> step=3 -> ceil(9/3)=3 块
        let chunks = chunk_text("abcdefghij", 4, 1);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_chunks_cover_all_characters() {
        let content: String = ('a'..='z').cycle().take(503).collect();
        let chunks = chunk_text(&content, 100, 25);

        // 重建原文：每块去掉与前一块重叠的前 overlap 个字符
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.push_str(&chunk.chars().skip(25).collect::<String>());
        }
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        let content: String = ('0'..='9').cycle().take(50).collect();
        let chunks = chunk_text(&content, 20, 5);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(20 - 5).collect();
            let head: String = pair[1].chars().take(5).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_utf8_safe_chunking() {
        let content = "日本語のテキスト。".repeat(30);
        let chunks = chunk_text(&content, 50, 10);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
    }

    #[test]
    fn test_doc_type_precedence() {
        // blog 前缀优先于 .md 扩展名
        assert_eq!(resolve_doc_type("content/blog/post.md"), DocType::Blog);
        assert_eq!(resolve_doc_type("blog/2024/hello.md"), DocType::Blog);
        assert_eq!(resolve_doc_type("docs/setup.md"), DocType::Documentation);
        assert_eq!(resolve_doc_type("README.md"), DocType::Documentation);
        assert_eq!(resolve_doc_type("guides/notes.markdown"), DocType::Documentation);
        assert_eq!(resolve_doc_type("tutorials/intro.txt"), DocType::Tutorial);
        assert_eq!(resolve_doc_type("src/lib.rs"), DocType::Project);
    }

    #[test]
    fn test_front_matter_tags_and_title() {
        let content = "---\ntitle: Hello World\ntags: rust, async, [web]\n---\nBody text here.";
        let (front, body) = parse_front_matter(content);
        assert_eq!(front.title.as_deref(), Some("Hello World"));
        assert!(front.tags.contains("rust"));
        assert!(front.tags.contains("async"));
        assert_eq!(body, "Body text here.");
    }

    #[test]
    fn test_front_matter_bracket_list() {
        let content = "---\ntags: [a, b, c]\n---\nx";
        let (front, _) = parse_front_matter(content);
        assert_eq!(front.tags.len(), 3);
    }

    #[test]
    fn test_missing_front_matter_defaults() {
        let (front, body) = parse_front_matter("just a plain document");
        assert!(front.title.is_none());
        assert!(front.tags.is_empty());
        assert_eq!(body, "just a plain document");
    }

    #[test]
    fn test_chunk_document_metadata() {
        let content = format!("---\ntitle: Post\ntags: rust\n---\n{}", "x".repeat(250));
        let chunks = chunk_document("content/blog/post.md", &content, 100, 20);

        assert!(chunks.len() > 1);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, i);
            assert_eq!(chunk.metadata.total_chunks, total);
            assert!(chunk.metadata.chunk_index < chunk.metadata.total_chunks);
            assert_eq!(chunk.metadata.doc_type, DocType::Blog);
            assert_eq!(chunk.metadata.title, "Post");
            assert_eq!(chunk.metadata.source_path, "content/blog/post.md");
        }
    }

    #[test]
    fn test_chunk_document_title_defaults_to_path() {
        let chunks = chunk_document("src/main.rs", "fn main() {}", 100, 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.title, "src/main.rs");
        assert_eq!(chunks[0].metadata.doc_type, DocType::Project);
        assert!(chunks[0].metadata.tags.is_empty());
    }
}

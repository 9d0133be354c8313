//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DOCENT__*` 覆盖
//! （双下划线表示嵌套，如 `DOCENT__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub retrieval: RetrievalSection,
    pub ingest: IngestSection,
    pub session: SessionSection,
    pub agent: AgentSection,
}

/// [llm] 段：OpenAI 兼容端点与模型选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 不设置时走官方端点
    pub base_url: Option<String>,
    pub model: String,
    pub embedding_model: String,
    /// 不设置时回退到环境变量 OPENAI_API_KEY
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
        }
    }
}

/// [retrieval] 段：相似度检索参数与各域下限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub match_count: usize,
    pub match_threshold: f32,
    pub min_similarity: f32,
    pub max_results: usize,
    pub code_floor: f32,
    pub documentation_floor: f32,
    pub blog_floor: f32,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            match_count: 10,
            match_threshold: 0.3,
            min_similarity: 0.5,
            max_results: 5,
            code_floor: 0.6,
            documentation_floor: 0.5,
            blog_floor: 0.5,
        }
    }
}

/// [ingest] 段：分块参数与目录扫描的扩展名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extensions: Vec<String>,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            extensions: vec!["md".into(), "markdown".into(), "txt".into()],
        }
    }
}

/// [session] 段：会话保留时长
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// 超过该时长未更新的会话会被清理扫描删除
    pub max_age_hours: i64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self { max_age_hours: 24 }
    }
}

/// [agent] 段：重试与系统提示词
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_attempts: u32,
    /// 不设置时用内置提示词
    pub system_prompt: Option<String>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            system_prompt: None,
        }
    }
}

/// 从 config 目录加载配置，环境变量 DOCENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DOCENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DOCENT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载（调用方决定是否用新配置重建组件）
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.retrieval.match_count, 10);
        assert!((cfg.retrieval.match_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.ingest.chunk_size, 1000);
        assert_eq!(cfg.ingest.chunk_overlap, 200);
        assert_eq!(cfg.session.max_age_hours, 24);
        assert_eq!(cfg.agent.max_attempts, 3);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[retrieval]\nmax_results = 8\n\n[llm]\nmodel = \"gpt-4o\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.retrieval.max_results, 8);
        assert_eq!(cfg.llm.model, "gpt-4o");
        // 未覆盖的键保持默认
        assert_eq!(cfg.ingest.chunk_size, 1000);
    }
}

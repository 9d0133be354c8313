//! Docent - 站点检索增强对话助手
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、重试策略与回合编排
//! - **ingest**: 内容分块与文件 / 目录摄取管线
//! - **llm**: chat-completion 与嵌入抽象及实现（OpenAI 兼容 / Mock）
//! - **memory**: 会话、偏好、兴趣抽取与持久化对话记忆
//! - **observability**: tracing 初始化
//! - **retrieval**: 向量存储、嵌入网关与三域检索
//! - **tools**: 工具注册表、两阶段执行器与内置工具

pub mod config;
pub mod core;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod retrieval;
pub mod tools;

pub use crate::core::{Agent, AiError, RetryPolicy, TurnReply};

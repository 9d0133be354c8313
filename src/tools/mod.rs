//! 工具系统：注册表、两阶段执行器与内置工具

pub mod executor;
pub mod registry;
pub mod stats;

pub use executor::{
    extract_function_call, should_call_function, ParsedToolCall, ToolExecutor, TurnOutcome,
};
pub use registry::{Tool, ToolDefinition, ToolRegistry};
pub use stats::{SiteStats, SiteStatsTool, StaticStatsSource, StatsSource};

//! 站点统计工具
//!
//! 聚合浏览、点赞、评论与文章数，供助手回答"这个站现在怎么样"。
//! 数据来源抽象成 StatsSource，生产接数据库或 API，测试用静态源。

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::Tool;

/// 站点汇总指标
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SiteStats {
    pub total_views: u64,
    pub total_likes: u64,
    pub total_comments: u64,
    pub post_count: u64,
}

/// 指标来源接口
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch(&self) -> Result<SiteStats, String>;
}

/// 固定数值的来源，测试与演示用
#[derive(Clone, Debug, Default)]
pub struct StaticStatsSource {
    pub stats: SiteStats,
}

impl StaticStatsSource {
    pub fn new(stats: SiteStats) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl StatsSource for StaticStatsSource {
    async fn fetch(&self) -> Result<SiteStats, String> {
        Ok(self.stats.clone())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SiteStatsArgs {
    /// 只取单项指标：views / likes / comments / posts，缺省返回全部
    metric: Option<String>,
}

/// get_site_stats 工具
pub struct SiteStatsTool {
    source: Box<dyn StatsSource>,
}

impl SiteStatsTool {
    pub fn new(source: impl StatsSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl Tool for SiteStatsTool {
    fn name(&self) -> &str {
        "get_site_stats"
    }

    fn description(&self) -> &str {
        "Get aggregate site statistics: total views, likes, comments and post count. \
         Optionally pass a metric name (views, likes, comments, posts) for a single value."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schema_for!(SiteStatsArgs)).unwrap_or_else(|_| {
            serde_json::json!({"type": "object", "properties": {}, "required": []})
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: SiteStatsArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        let stats = self.source.fetch().await?;

        let payload = match args.metric.as_deref() {
            Some("views") => serde_json::json!({"total_views": stats.total_views}),
            Some("likes") => serde_json::json!({"total_likes": stats.total_likes}),
            Some("comments") => serde_json::json!({"total_comments": stats.total_comments}),
            Some("posts") => serde_json::json!({"post_count": stats.post_count}),
            Some(other) => return Err(format!("unknown metric: {other}")),
            None => serde_json::to_value(&stats).map_err(|e| e.to_string())?,
        };
        serde_json::to_string(&payload).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tool() -> SiteStatsTool {
        SiteStatsTool::new(StaticStatsSource::new(SiteStats {
            total_views: 1200,
            total_likes: 88,
            total_comments: 31,
            post_count: 14,
        }))
    }

    #[tokio::test]
    async fn test_all_metrics() {
        let tool = sample_tool();
        let out = tool.execute(serde_json::json!({})).await.unwrap();
        let parsed: SiteStats = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.total_views, 1200);
        assert_eq!(parsed.post_count, 14);
    }

    #[tokio::test]
    async fn test_single_metric() {
        let tool = sample_tool();
        let out = tool
            .execute(serde_json::json!({"metric": "likes"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["total_likes"], 88);
    }

    #[tokio::test]
    async fn test_unknown_metric_rejected() {
        let tool = sample_tool();
        let err = tool
            .execute(serde_json::json!({"metric": "stars"}))
            .await
            .unwrap_err();
        assert!(err.contains("stars"));
    }

    #[test]
    fn test_schema_is_object() {
        let tool = sample_tool();
        let schema = tool.parameters_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("metric").is_some());
    }
}
